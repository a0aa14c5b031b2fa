// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The persistent store worker task.
//!
//! Wraps the SQLite repository behind the worker message protocol. The
//! database is opened lazily on the first operation that needs it;
//! concurrent first requests share the single open attempt. Callers can
//! cancel an in-flight request by id, in which case its reply is
//! silently dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use roilens_core::channel::{duplex, WorkerEndpoint, WorkerHandle};
use roilens_core::model::{CacheEntry, CacheEntryMeta, JobId, JobRoiStatusEntry};
use roilens_core::protocol::{Outbound, RequestId, ResponseEnvelope};

use crate::error::{Result, StoreError};
use crate::repository::{CacheRepository, SqliteCacheRepository};

#[derive(Debug, Clone)]
pub struct StoreConfig {
	/// SQLite connection URL, e.g. `sqlite:///var/lib/roilens/cache.db`
	/// or `sqlite::memory:`.
	pub database_url: String,
}

/// Requests accepted by the store worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreRequest {
	/// Opens the database eagerly. Optional; any other operation opens
	/// it on demand.
	Init,
	GetExecutions {
		key: String,
		#[serde(default)]
		metadata_only: bool,
	},
	SetExecutions {
		entry: CacheEntry,
	},
	DeleteExecutions {
		key: String,
	},
	ListExecutions,
	GetJobStatus {
		job_id: JobId,
	},
	SetJobStatus {
		job_id: JobId,
		has_roi: bool,
	},
	ListJobStatuses,
	Cleanup {
		max_age_hours: i64,
	},
	HealthCheck,
	/// Marks an in-flight request as cancelled so its reply is dropped.
	Cancel {
		request_id: RequestId,
	},
}

/// Successful replies from the store worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreResponse {
	Ready,
	ExecutionsEntry { entry: Option<CacheEntry> },
	ExecutionsMeta { meta: Option<CacheEntryMeta> },
	ExecutionsListed { entries: Vec<CacheEntryMeta> },
	JobStatus { entry: Option<JobRoiStatusEntry> },
	JobStatusListed { entries: Vec<JobRoiStatusEntry> },
	Saved,
	Deleted,
	CleanupDone { removed_entries: u64, removed_executions: u64 },
	Healthy {
		healthy: bool,
		collections: Vec<String>,
		active_requests: usize,
	},
	Cancelled,
}

/// Store workers emit no unsolicited events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {}

pub type StoreHandle = WorkerHandle<StoreRequest, StoreResponse, StoreEvent>;

pub fn spawn(config: StoreConfig) -> StoreHandle {
	let (caller, worker) = duplex();
	tokio::spawn(run(config, worker));
	WorkerHandle::new(caller)
}

/// Deadline on individual database reads, independent of whatever
/// timeout the caller put on the request itself.
const DB_OP_TIMEOUT: Duration = Duration::from_secs(5);

struct Shared {
	config: StoreConfig,
	repo: OnceCell<SqliteCacheRepository>,
	in_flight: Mutex<HashSet<RequestId>>,
	cancelled: Mutex<HashSet<RequestId>>,
}

impl Shared {
	/// Lazily opened repository. The `OnceCell` serializes concurrent
	/// first opens into a single connection attempt.
	async fn repo(&self) -> Result<&SqliteCacheRepository> {
		self.repo
			.get_or_try_init(|| SqliteCacheRepository::connect(&self.config.database_url))
			.await
	}
}

/// Worker main loop. Exits when the caller side hangs up.
pub async fn run(config: StoreConfig, endpoint: WorkerEndpoint<StoreRequest, StoreResponse, StoreEvent>) {
	let (tx, mut rx) = endpoint.split();
	let shared = Arc::new(Shared {
		config,
		repo: OnceCell::new(),
		in_flight: Mutex::new(HashSet::new()),
		cancelled: Mutex::new(HashSet::new()),
	});

	while let Some(envelope) = rx.recv().await {
		let tx = tx.clone();
		let shared = Arc::clone(&shared);
		shared.in_flight.lock().await.insert(envelope.id);
		tokio::spawn(async move {
			let request_id = envelope.id;
			let reply = match handle_request(&shared, envelope.request).await {
				Ok(response) => ResponseEnvelope::ok(request_id, response),
				Err(err) => {
					warn!(request_id, error = %err, "store request failed");
					ResponseEnvelope::error(request_id, err.to_string())
				}
			};
			shared.in_flight.lock().await.remove(&request_id);
			if shared.cancelled.lock().await.remove(&request_id) {
				debug!(request_id, "dropping reply for cancelled request");
				return;
			}
			let _ = tx.send(Outbound::Response(reply));
		});
	}
	debug!("store worker channel closed, exiting");
}

async fn handle_request(shared: &Shared, request: StoreRequest) -> Result<StoreResponse> {
	match request {
		StoreRequest::Init => {
			shared.repo().await?;
			Ok(StoreResponse::Ready)
		}
		StoreRequest::GetExecutions { key, metadata_only } => {
			let repo = shared.repo().await?;
			if metadata_only {
				let meta = tokio::time::timeout(DB_OP_TIMEOUT, repo.get_execution_meta(&key))
					.await
					.map_err(|_| StoreError::Timeout)??;
				Ok(StoreResponse::ExecutionsMeta { meta })
			} else {
				let entry = tokio::time::timeout(DB_OP_TIMEOUT, repo.get_execution_entry(&key))
					.await
					.map_err(|_| StoreError::Timeout)??;
				Ok(StoreResponse::ExecutionsEntry { entry })
			}
		}
		StoreRequest::SetExecutions { entry } => {
			shared.repo().await?.put_execution_entry(&entry).await?;
			Ok(StoreResponse::Saved)
		}
		StoreRequest::DeleteExecutions { key } => {
			shared.repo().await?.delete_execution_entry(&key).await?;
			Ok(StoreResponse::Deleted)
		}
		StoreRequest::ListExecutions => {
			let entries = shared.repo().await?.list_execution_entries().await?;
			Ok(StoreResponse::ExecutionsListed { entries })
		}
		StoreRequest::GetJobStatus { job_id } => {
			let entry = shared.repo().await?.get_job_status(&job_id).await?;
			Ok(StoreResponse::JobStatus { entry })
		}
		StoreRequest::SetJobStatus { job_id, has_roi } => {
			let entry = JobRoiStatusEntry { id: job_id, has_roi, timestamp: Utc::now() };
			shared.repo().await?.put_job_status(&entry).await?;
			Ok(StoreResponse::Saved)
		}
		StoreRequest::ListJobStatuses => {
			let entries = shared.repo().await?.list_job_statuses().await?;
			Ok(StoreResponse::JobStatusListed { entries })
		}
		StoreRequest::Cleanup { max_age_hours } => {
			let cutoff = Utc::now() - ChronoDuration::hours(max_age_hours);
			let stats = shared.repo().await?.cleanup(cutoff).await?;
			Ok(StoreResponse::CleanupDone {
				removed_entries: stats.removed_entries,
				removed_executions: stats.removed_executions,
			})
		}
		StoreRequest::HealthCheck => {
			let healthy = match shared.repo().await {
				Ok(repo) => repo.health_check().await.is_ok(),
				Err(err) => {
					warn!(error = %err, "store health check could not open database");
					false
				}
			};
			Ok(StoreResponse::Healthy {
				healthy,
				collections: vec!["job_cache".to_string(), "execution_cache".to_string()],
				// Exclude the health check itself.
				active_requests: shared.in_flight.lock().await.len().saturating_sub(1),
			})
		}
		StoreRequest::Cancel { request_id } => {
			// A cancel only matters while its request is in flight; one
			// arriving after the reply went out must not pin the id in
			// the cancelled set forever.
			if shared.in_flight.lock().await.contains(&request_id) {
				shared.cancelled.lock().await.insert(request_id);
			} else {
				debug!(request_id, "ignoring cancel for completed request");
			}
			Ok(StoreResponse::Cancelled)
		}
	}
}
