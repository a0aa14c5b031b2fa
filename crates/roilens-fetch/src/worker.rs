// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The fetch worker task.
//!
//! Runs as a background task behind a [`WorkerHandle`]. Each incoming
//! request is handled on its own subtask so a long paginated fetch never
//! blocks a metrics query; outbound metric probes are throttled by the
//! shared [`ConcurrencyPool`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use roilens_core::channel::{duplex, WorkerEndpoint, WorkerHandle};
use roilens_core::model::{merge_executions, Execution, JobId};
use roilens_core::protocol::{Outbound, ResponseEnvelope};
use roilens_core::range::DateRange;

use crate::api::{ApiClient, ApiConfig, FetchWindow, RoiProbe};
use crate::error::{FetchError, Result};
use crate::pool::{ConcurrencyPool, PoolMetrics, DEFAULT_POOL_LIMIT};

/// Executions annotated per round of parallel metric probes.
pub const BATCH_SIZE: usize = 50;

/// Requests accepted by the fetch worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FetchRequest {
	Init {
		base_url: String,
		auth_token: Option<String>,
		concurrency: Option<usize>,
	},
	FetchExecutions {
		job_id: JobId,
		range: Option<DateRange>,
		recent_days: u64,
	},
	CheckJobRoiStatus {
		job_id: JobId,
	},
	ProcessExecutions {
		job_id: JobId,
		executions: Vec<Execution>,
	},
	GetMetrics,
}

/// Successful replies from the fetch worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FetchResponse {
	Initialized,
	ExecutionsFetched {
		results: Vec<Execution>,
		total_executions: i64,
	},
	RoiStatusChecked {
		job_id: JobId,
		has_roi: bool,
	},
	ExecutionsProcessed {
		results: Vec<Execution>,
		summary: ProcessSummary,
	},
	Metrics {
		status: WorkerStatus,
		uptime_secs: u64,
		requests_processed: u64,
		errors: u64,
		pool: PoolMetrics,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerStatus {
	Ok,
	Uninitialized,
}

/// Unsolicited progress reports emitted while annotating executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FetchEvent {
	Progress {
		job_id: JobId,
		processed: usize,
		total: usize,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
	/// Distinct executions submitted for annotation.
	pub total: usize,
	/// How many were actually probed before any early stop.
	pub processed: usize,
	pub with_roi: usize,
	/// Set when a probe 404ed, meaning ROI capture is off for the job.
	pub roi_disabled: bool,
}

pub type FetchHandle = WorkerHandle<FetchRequest, FetchResponse, FetchEvent>;

/// Spawns the fetch worker and returns its handle. The worker starts
/// unconfigured; every operation except `Init` fails until an `Init`
/// request arrives.
pub fn spawn() -> FetchHandle {
	let (caller, worker) = duplex();
	tokio::spawn(run(worker));
	WorkerHandle::new(caller)
}

struct WorkerState {
	client: Option<ApiClient>,
	pool: Arc<ConcurrencyPool>,
}

struct Counters {
	started: Instant,
	requests: AtomicU64,
	errors: AtomicU64,
}

type OutboundTx = UnboundedSender<Outbound<FetchResponse, FetchEvent>>;

/// Worker main loop. Exits when the caller side hangs up.
pub async fn run(endpoint: WorkerEndpoint<FetchRequest, FetchResponse, FetchEvent>) {
	let (tx, mut rx) = endpoint.split();
	let state = Arc::new(RwLock::new(WorkerState {
		client: None,
		pool: Arc::new(ConcurrencyPool::new(DEFAULT_POOL_LIMIT)),
	}));
	let counters = Arc::new(Counters {
		started: Instant::now(),
		requests: AtomicU64::new(0),
		errors: AtomicU64::new(0),
	});

	while let Some(envelope) = rx.recv().await {
		let tx = tx.clone();
		let state = Arc::clone(&state);
		let counters = Arc::clone(&counters);
		tokio::spawn(async move {
			counters.requests.fetch_add(1, Ordering::Relaxed);
			let request_id = envelope.id;
			let reply = match handle_request(&state, &counters, &tx, envelope.request).await {
				Ok(response) => ResponseEnvelope::ok(request_id, response),
				Err(err) => {
					counters.errors.fetch_add(1, Ordering::Relaxed);
					ResponseEnvelope::error(request_id, err.to_string())
				}
			};
			let _ = tx.send(Outbound::Response(reply));
		});
	}
	debug!("fetch worker channel closed, exiting");
}

async fn handle_request(
	state: &RwLock<WorkerState>,
	counters: &Counters,
	tx: &OutboundTx,
	request: FetchRequest,
) -> Result<FetchResponse> {
	match request {
		FetchRequest::Init { base_url, auth_token, concurrency } => {
			let client = ApiClient::new(&ApiConfig { base_url, auth_token })?;
			let limit = concurrency.unwrap_or(DEFAULT_POOL_LIMIT);
			let mut state = state.write().await;
			state.client = Some(client);
			state.pool = Arc::new(ConcurrencyPool::new(limit));
			info!(concurrency = limit, "fetch worker initialized");
			Ok(FetchResponse::Initialized)
		}
		FetchRequest::FetchExecutions { job_id, range, recent_days } => {
			let client = client(state).await?;
			let window = match range {
				Some(range) => FetchWindow::Range(range),
				None => FetchWindow::RecentDays(recent_days),
			};
			let (results, total_executions) = client.fetch_executions(&job_id, window).await?;
			Ok(FetchResponse::ExecutionsFetched { results, total_executions })
		}
		FetchRequest::CheckJobRoiStatus { job_id } => {
			let client = client(state).await?;
			let has_roi = check_job_roi_status(&client, &job_id).await;
			Ok(FetchResponse::RoiStatusChecked { job_id, has_roi })
		}
		FetchRequest::ProcessExecutions { job_id, executions } => {
			let (client, pool) = {
				let state = state.read().await;
				let client = state.client.clone().ok_or(FetchError::NotInitialized)?;
				(client, Arc::clone(&state.pool))
			};
			let (results, summary) =
				process_executions(&client, &pool, tx, &job_id, executions).await;
			Ok(FetchResponse::ExecutionsProcessed { results, summary })
		}
		FetchRequest::GetMetrics => {
			let state = state.read().await;
			let status = if state.client.is_some() {
				WorkerStatus::Ok
			} else {
				WorkerStatus::Uninitialized
			};
			Ok(FetchResponse::Metrics {
				status,
				uptime_secs: counters.started.elapsed().as_secs(),
				requests_processed: counters.requests.load(Ordering::Relaxed),
				errors: counters.errors.load(Ordering::Relaxed),
				pool: state.pool.metrics(),
			})
		}
	}
}

async fn client(state: &RwLock<WorkerState>) -> Result<ApiClient> {
	state.read().await.client.clone().ok_or(FetchError::NotInitialized)
}

/// Cheap job-level ROI probe: look at the latest succeeded execution and
/// see whether its metrics document exists and carries hours. Any
/// failure degrades to "no ROI" rather than an error, so a flaky server
/// never blocks the dashboard.
#[instrument(skip(client), fields(job_id = %job_id))]
async fn check_job_roi_status(client: &ApiClient, job_id: &JobId) -> bool {
	let latest = match client.latest_succeeded_execution(job_id).await {
		Ok(Some(execution)) => execution,
		Ok(None) => return false,
		Err(err) => {
			warn!(job_id = %job_id, error = %err, "roi status listing failed");
			return false;
		}
	};
	match client.roi_metrics(&latest.href).await {
		Ok(RoiProbe::Hours(_)) => true,
		Ok(RoiProbe::NoData) | Ok(RoiProbe::Disabled) => false,
		Err(err) => {
			warn!(job_id = %job_id, error = %err, "roi status probe failed");
			false
		}
	}
}

/// Annotates executions with ROI data in batches.
///
/// Executions are deduplicated by id (later submissions win) and probed
/// in batches of [`BATCH_SIZE`], each batch fanned out through the pool.
/// The first execution of each batch is probed up front: a 404 there
/// means ROI capture is disabled for the job, so already-annotated
/// batches are kept and the rest skipped. A 404 seen mid-batch finishes
/// that batch and then stops the same way.
async fn process_executions(
	client: &ApiClient,
	pool: &Arc<ConcurrencyPool>,
	tx: &OutboundTx,
	job_id: &JobId,
	executions: Vec<Execution>,
) -> (Vec<Execution>, ProcessSummary) {
	let deduped = merge_executions(Vec::new(), executions);
	let total = deduped.len();
	let mut results: Vec<Execution> = Vec::with_capacity(total);
	let mut with_roi = 0usize;
	let mut roi_disabled = false;

	for batch in deduped.chunks(BATCH_SIZE) {
		let first_probe = match client.roi_metrics(&batch[0].href).await {
			Ok(RoiProbe::Disabled) => {
				info!(
					job_id = %job_id,
					annotated = results.len(),
					"roi metrics disabled for job, stopping annotation"
				);
				roi_disabled = true;
				break;
			}
			Ok(probe) => probe,
			Err(err) => {
				warn!(job_id = %job_id, error = %err, "roi probe failed for batch head");
				RoiProbe::NoData
			}
		};

		let probes = futures::future::join_all(batch.iter().enumerate().map(|(i, execution)| {
			let client = client.clone();
			let pool = Arc::clone(pool);
			let href = execution.href.clone();
			async move {
				if i == 0 {
					first_probe
				} else {
					pool.run(async { client.roi_metrics(&href).await })
						.await
						.unwrap_or(RoiProbe::NoData)
				}
			}
		}))
		.await;

		let mut batch_disabled = false;
		for (execution, probe) in batch.iter().zip(probes) {
			let mut execution = execution.clone();
			match probe {
				RoiProbe::Hours(hours) => {
					execution.roi_hours = hours;
					execution.has_roi = true;
					with_roi += 1;
				}
				RoiProbe::NoData => {
					execution.roi_hours = 0.0;
					execution.has_roi = false;
				}
				RoiProbe::Disabled => {
					execution.roi_hours = 0.0;
					execution.has_roi = false;
					batch_disabled = true;
				}
			}
			results.push(execution);
		}

		let _ = tx.send(Outbound::Event(FetchEvent::Progress {
			job_id: job_id.clone(),
			processed: results.len(),
			total,
		}));

		if batch_disabled {
			roi_disabled = true;
			break;
		}
	}

	let summary = ProcessSummary {
		total,
		processed: results.len(),
		with_roi,
		roi_disabled,
	};
	debug!(job_id = %job_id, ?summary, "execution annotation finished");
	(results, summary)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};
	use roilens_core::model::ExecutionStatus;
	use std::time::Duration;
	use wiremock::matchers::{method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	async fn init_worker(server: &MockServer) -> FetchHandle {
		let handle = spawn();
		let response = handle
			.request(
				FetchRequest::Init {
					base_url: server.uri(),
					auth_token: None,
					concurrency: Some(4),
				},
				Duration::from_secs(1),
			)
			.await
			.unwrap();
		assert_eq!(response, FetchResponse::Initialized);
		handle
	}

	fn execution(id: i64, server: &MockServer) -> Execution {
		Execution {
			id,
			job_id: JobId::new("j1"),
			status: ExecutionStatus::Succeeded,
			started_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
			href: format!("{}/api/execution/{id}", server.uri()),
			roi_hours: 0.0,
			has_roi: false,
		}
	}

	fn mount_metrics(server: &MockServer, id: i64, template: ResponseTemplate) -> Mock {
		Mock::given(method("GET"))
			.and(path(format!("/api/execution/{id}/roimetrics/data")))
			.respond_with(template)
	}

	#[tokio::test]
	async fn requests_before_init_are_rejected() {
		let handle = spawn();
		let err = handle
			.request(
				FetchRequest::CheckJobRoiStatus { job_id: JobId::new("j1") },
				Duration::from_secs(1),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, roilens_core::WorkerError::Remote(ref m) if m.contains("initialized")));
	}

	#[tokio::test]
	async fn fetch_executions_uses_recent_filter_without_range() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/job/j1/executions"))
			.and(query_param("recentFilter", "10d"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 1 },
				"executions": [{
					"id": 1,
					"href": format!("{}/api/execution/1", server.uri()),
					"status": "succeeded",
					"date-started": { "date": "2026-03-10T09:00:00Z" }
				}]
			})))
			.mount(&server)
			.await;

		let handle = init_worker(&server).await;
		let response = handle
			.request(
				FetchRequest::FetchExecutions {
					job_id: JobId::new("j1"),
					range: None,
					recent_days: 10,
				},
				Duration::from_secs(5),
			)
			.await
			.unwrap();
		match response {
			FetchResponse::ExecutionsFetched { results, total_executions } => {
				assert_eq!(results.len(), 1);
				assert_eq!(total_executions, 1);
			}
			other => panic!("unexpected response: {other:?}"),
		}
	}

	#[tokio::test]
	async fn roi_status_check_degrades_to_false() {
		let server = MockServer::start().await;
		// No succeeded executions at all.
		Mock::given(method("GET"))
			.and(path("/job/empty/executions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 0 },
				"executions": []
			})))
			.mount(&server)
			.await;

		let handle = init_worker(&server).await;
		let response = handle
			.request(
				FetchRequest::CheckJobRoiStatus { job_id: JobId::new("empty") },
				Duration::from_secs(5),
			)
			.await
			.unwrap();
		assert_eq!(
			response,
			FetchResponse::RoiStatusChecked { job_id: JobId::new("empty"), has_roi: false }
		);
	}

	#[tokio::test]
	async fn roi_status_check_sees_hours() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/job/j1/executions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 5 },
				"executions": [{
					"id": 7,
					"href": format!("{}/api/execution/7", server.uri()),
					"status": "succeeded",
					"date-started": { "date": "2026-03-10T09:00:00Z" }
				}]
			})))
			.mount(&server)
			.await;
		mount_metrics(&server, 7, ResponseTemplate::new(200).set_body_json(serde_json::json!({ "hours": 1.5 })))
			.mount(&server)
			.await;

		let handle = init_worker(&server).await;
		let response = handle
			.request(
				FetchRequest::CheckJobRoiStatus { job_id: JobId::new("j1") },
				Duration::from_secs(5),
			)
			.await
			.unwrap();
		assert_eq!(
			response,
			FetchResponse::RoiStatusChecked { job_id: JobId::new("j1"), has_roi: true }
		);
	}

	#[tokio::test]
	async fn process_annotates_and_dedupes() {
		let server = MockServer::start().await;
		mount_metrics(&server, 1, ResponseTemplate::new(200).set_body_json(serde_json::json!({ "hours": 2.0 })))
			.mount(&server)
			.await;
		mount_metrics(&server, 2, ResponseTemplate::new(200).set_body_json(serde_json::json!({ "note": "none" })))
			.mount(&server)
			.await;

		let handle = init_worker(&server).await;
		// Execution 1 submitted twice; it must only be probed once.
		let executions = vec![
			execution(1, &server),
			execution(2, &server),
			execution(1, &server),
		];
		let response = handle
			.request(
				FetchRequest::ProcessExecutions { job_id: JobId::new("j1"), executions },
				Duration::from_secs(5),
			)
			.await
			.unwrap();
		match response {
			FetchResponse::ExecutionsProcessed { results, summary } => {
				assert_eq!(results.len(), 2);
				assert!(results[0].has_roi);
				assert_eq!(results[0].roi_hours, 2.0);
				assert!(!results[1].has_roi);
				assert_eq!(summary, ProcessSummary {
					total: 2,
					processed: 2,
					with_roi: 1,
					roi_disabled: false,
				});
			}
			other => panic!("unexpected response: {other:?}"),
		}
	}

	#[tokio::test]
	async fn disabled_probe_stops_annotation() {
		let server = MockServer::start().await;
		mount_metrics(&server, 1, ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let handle = init_worker(&server).await;
		let response = handle
			.request(
				FetchRequest::ProcessExecutions {
					job_id: JobId::new("j1"),
					executions: vec![execution(1, &server), execution(2, &server)],
				},
				Duration::from_secs(5),
			)
			.await
			.unwrap();
		match response {
			FetchResponse::ExecutionsProcessed { results, summary } => {
				assert!(results.is_empty());
				assert!(summary.roi_disabled);
				assert_eq!(summary.total, 2);
				assert_eq!(summary.processed, 0);
			}
			other => panic!("unexpected response: {other:?}"),
		}
	}

	#[tokio::test]
	async fn progress_events_report_batch_totals() {
		let server = MockServer::start().await;
		for id in 1..=3 {
			mount_metrics(
				&server,
				id,
				ResponseTemplate::new(200).set_body_json(serde_json::json!({ "hours": 1.0 })),
			)
			.mount(&server)
			.await;
		}

		let handle = init_worker(&server).await;
		let mut events = handle.subscribe();
		let executions = (1..=3).map(|id| execution(id, &server)).collect();
		handle
			.request(
				FetchRequest::ProcessExecutions { job_id: JobId::new("j1"), executions },
				Duration::from_secs(5),
			)
			.await
			.unwrap();

		// Three executions fit one batch, so a single progress event.
		assert_eq!(
			events.recv().await.unwrap(),
			FetchEvent::Progress { job_id: JobId::new("j1"), processed: 3, total: 3 }
		);
	}

	#[tokio::test]
	async fn metrics_reports_pool_counters() {
		let server = MockServer::start().await;
		let handle = init_worker(&server).await;
		let response = handle
			.request(FetchRequest::GetMetrics, Duration::from_secs(1))
			.await
			.unwrap();
		match response {
			FetchResponse::Metrics { status, requests_processed, errors, pool, .. } => {
				assert_eq!(status, WorkerStatus::Ok);
				// Init plus this metrics request.
				assert_eq!(requests_processed, 2);
				assert_eq!(errors, 0);
				assert_eq!(pool.limit, 4);
				assert_eq!(pool.processed, 0);
			}
			other => panic!("unexpected response: {other:?}"),
		}
	}
}
