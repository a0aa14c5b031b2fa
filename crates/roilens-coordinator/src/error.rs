// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
	#[error(transparent)]
	Worker(#[from] roilens_core::WorkerError),

	#[error("settings file error: {0}")]
	SettingsIo(#[from] std::io::Error),

	#[error("settings file corrupt: {0}")]
	SettingsFormat(#[from] serde_json::Error),

	#[error("initialization failed recently, retry deferred for {remaining_secs}s")]
	InitBackoff { remaining_secs: i64 },

	#[error("initialization timed out")]
	InitTimeout,
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
