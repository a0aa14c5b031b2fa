// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("server returned status {status} for {url}")]
	Status { status: u16, url: String },

	#[error("gave up after {attempts} attempts: {last_error}")]
	RetriesExhausted { attempts: u32, last_error: String },

	#[error("worker has not been initialized")]
	NotInitialized,
}

impl FetchError {
	/// Whether another attempt might succeed. Client errors (4xx) are
	/// treated as permanent; everything else as transient.
	pub fn is_retryable(&self) -> bool {
		match self {
			FetchError::Http(_) => true,
			FetchError::Status { status, .. } => *status >= 500,
			FetchError::RetriesExhausted { .. } | FetchError::NotInitialized => false,
		}
	}
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_errors_are_retryable_client_errors_are_not() {
		let server = FetchError::Status { status: 503, url: "http://x/api".into() };
		let client = FetchError::Status { status: 404, url: "http://x/api".into() };
		assert!(server.is_retryable());
		assert!(!client.is_retryable());
		assert!(!FetchError::NotInitialized.is_retryable());
	}
}
