// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("cache entry corrupt: {0}")]
	Corrupt(#[from] serde_json::Error),

	#[error("invalid timestamp in store: {0}")]
	Timestamp(String),

	#[error("store operation timed out")]
	Timeout,

	#[error("request was cancelled")]
	Cancelled,
}

pub type Result<T> = std::result::Result<T, StoreError>;
