// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fetch worker for the ROI execution cache: paginated execution
//! retrieval, ROI metric probing, and the bounded concurrency pool that
//! throttles outbound requests.

pub mod api;
pub mod error;
pub mod pool;
pub mod worker;

pub use api::{ApiClient, ApiConfig, FetchWindow, RoiProbe, PAGE_SIZE};
pub use error::{FetchError, Result};
pub use pool::{ConcurrencyPool, PoolMetrics, DEFAULT_POOL_LIMIT};
pub use worker::{
	spawn, FetchEvent, FetchHandle, FetchRequest, FetchResponse, ProcessSummary, WorkerStatus,
	BATCH_SIZE,
};
