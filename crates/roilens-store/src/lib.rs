// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistent store worker for the ROI execution cache: a SQLite-backed
//! repository for per-job execution lists and job ROI statuses, exposed
//! through the worker message protocol.

pub mod error;
pub mod repository;
pub mod worker;

pub use error::{Result, StoreError};
pub use repository::{CacheRepository, CleanupStats, SqliteCacheRepository};
pub use worker::{spawn, StoreConfig, StoreEvent, StoreHandle, StoreRequest, StoreResponse};
