// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared foundation for the ROI execution cache: domain types, the
//! date-range planner, and the worker message protocol used between the
//! coordinator and its fetch/store workers.

pub mod channel;
pub mod error;
pub mod model;
pub mod protocol;
pub mod range;

pub use channel::{duplex, CallerEndpoint, Endpoint, WorkerEndpoint, WorkerHandle};
pub use error::{Result, WorkerError};
pub use model::{
	merge_executions, CacheEntry, CacheEntryMeta, DataInfo, Execution, ExecutionId,
	ExecutionStatus, ExecutionsResult, JobId, JobRoiStatusEntry,
};
pub use protocol::{Outbound, RequestEnvelope, RequestId, ResponseEnvelope, ResponsePayload};
pub use range::{filter_by_range, plan_fetch, CachedWindow, DateRange, FetchPlan};
