// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::protocol::RequestId;

/// Errors surfaced when talking to a worker over its message channel.
#[derive(Debug, Error)]
pub enum WorkerError {
	/// The worker did not respond within the deadline. The request may
	/// still complete on the worker side; callers that care should send
	/// a cancel notification for `request_id`.
	#[error("worker request {request_id} timed out after {timeout_ms}ms")]
	Timeout { request_id: RequestId, timeout_ms: u64 },

	/// The worker's channel is gone, typically because the worker task
	/// exited or was never started.
	#[error("worker channel closed")]
	ChannelClosed,

	/// The worker processed the request and reported a failure.
	#[error("worker reported error: {0}")]
	Remote(String),
}

impl WorkerError {
	/// Whether the request may be safely retried against a restarted
	/// worker. Remote failures are not retried blindly since the worker
	/// may have partially applied the request.
	pub fn is_retryable(&self) -> bool {
		matches!(self, WorkerError::Timeout { .. } | WorkerError::ChannelClosed)
	}
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeout_and_closed_are_retryable() {
		assert!(WorkerError::Timeout { request_id: 7, timeout_ms: 500 }.is_retryable());
		assert!(WorkerError::ChannelClosed.is_retryable());
		assert!(!WorkerError::Remote("db locked".into()).is_retryable());
	}

	#[test]
	fn display_includes_request_id() {
		let err = WorkerError::Timeout { request_id: 42, timeout_ms: 500 };
		assert!(err.to_string().contains("42"));
		assert!(err.to_string().contains("500ms"));
	}
}
