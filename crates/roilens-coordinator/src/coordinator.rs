// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The cache coordinator.
//!
//! Front door for the dashboard: answers "which executions with ROI does
//! this set of jobs have in this window" by combining the persistent
//! cache with targeted fetches, keeping every network and store call
//! behind its own deadline. Cache reads that blow their (short) deadline
//! degrade to a miss; fetch failures for one job never fail the batch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use roilens_core::model::{
	merge_executions, CacheEntry, Execution, ExecutionStatus, ExecutionsResult, JobId,
};
use roilens_core::range::{filter_by_range, plan_fetch, CachedWindow, DateRange, FetchPlan};
use roilens_core::WorkerError;
use roilens_fetch::{FetchEvent, FetchHandle, FetchRequest, FetchResponse};
use roilens_store::{StoreConfig, StoreHandle, StoreRequest, StoreResponse};

use crate::error::{CoordinatorError, Result};
use crate::registry::RoiRegistry;
use crate::settings::{Settings, SettingsStore};

/// Cached data older than this is discarded entirely.
pub const CACHE_TTL_HOURS: i64 = 24;
/// Cached data younger than this is trusted even for trailing days.
pub const FRESHNESS_HOURS: i64 = 8;
/// How often the cleanup sweep is allowed to run.
pub const CLEANUP_INTERVAL_HOURS: i64 = 96;

const INIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const INIT_RETRY_DELAY_SECS: i64 = 300;
const STORE_GET_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);
const STORE_SET_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
const JOB_STATUS_GET_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(150);
const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const PROCESS_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
const ROI_STATUS_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const MAINTENANCE_TICK: std::time::Duration = std::time::Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
	pub base_url: String,
	pub auth_token: Option<String>,
	/// SQLite URL for the persistent cache.
	pub database_url: String,
	pub settings_path: PathBuf,
	/// Metric probe parallelism; `None` uses the worker default.
	pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOutcome {
	pub removed_entries: u64,
	pub removed_executions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
	pub store_healthy: bool,
	pub fetch_connected: bool,
}

struct InitState {
	initialized: bool,
	last_failure: Option<DateTime<Utc>>,
}

/// Tracks in-flight dashboard requests so maintenance can yield to them.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::SeqCst);
		Self(counter)
	}
}

impl Drop for PendingGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

struct Annotated {
	results: Vec<Execution>,
	total: i64,
	roi_disabled: bool,
}

pub struct CacheCoordinator {
	config: CoordinatorConfig,
	fetch: RwLock<FetchHandle>,
	store: RwLock<StoreHandle>,
	settings: SettingsStore,
	registry: RoiRegistry,
	init: Mutex<InitState>,
	pending: AtomicUsize,
	last_cleanup: Mutex<Option<DateTime<Utc>>>,
}

impl CacheCoordinator {
	pub async fn new(config: CoordinatorConfig) -> Self {
		let settings = SettingsStore::load(&config.settings_path).await;
		let store = roilens_store::spawn(StoreConfig { database_url: config.database_url.clone() });
		Self {
			fetch: RwLock::new(roilens_fetch::spawn()),
			store: RwLock::new(store),
			settings,
			registry: RoiRegistry::new(ChronoDuration::hours(CACHE_TTL_HOURS)),
			init: Mutex::new(InitState { initialized: false, last_failure: None }),
			pending: AtomicUsize::new(0),
			last_cleanup: Mutex::new(None),
			config,
		}
	}

	pub fn settings(&self) -> &SettingsStore {
		&self.settings
	}

	/// Progress events from the fetch worker while it annotates batches.
	/// Receivers stay bound to the worker that was live at subscription
	/// time; resubscribe after [`Self::reinitialize`].
	pub async fn subscribe_progress(&self) -> broadcast::Receiver<FetchEvent> {
		self.fetch.read().await.subscribe()
	}

	/// Initializes both workers exactly once. Concurrent callers
	/// coalesce onto the same attempt; after a failure, further
	/// attempts are refused until the retry delay has passed.
	async fn ensure_initialized(&self) -> Result<()> {
		let mut init = self.init.lock().await;
		if init.initialized {
			return Ok(());
		}
		if let Some(failed_at) = init.last_failure {
			let since = Utc::now() - failed_at;
			if since < ChronoDuration::seconds(INIT_RETRY_DELAY_SECS) {
				return Err(CoordinatorError::InitBackoff {
					remaining_secs: INIT_RETRY_DELAY_SECS - since.num_seconds(),
				});
			}
		}
		match tokio::time::timeout(INIT_TIMEOUT, self.run_init()).await {
			Ok(Ok(())) => {
				init.initialized = true;
				init.last_failure = None;
				info!("coordinator initialized");
				Ok(())
			}
			Ok(Err(err)) => {
				init.last_failure = Some(Utc::now());
				Err(err)
			}
			Err(_) => {
				init.last_failure = Some(Utc::now());
				Err(CoordinatorError::InitTimeout)
			}
		}
	}

	// The fetch worker is initialized first so direct fetching keeps
	// working when only the store side fails.
	async fn run_init(&self) -> Result<()> {
		self.fetch
			.read()
			.await
			.request(
				FetchRequest::Init {
					base_url: self.config.base_url.clone(),
					auth_token: self.config.auth_token.clone(),
					concurrency: self.config.concurrency,
				},
				INIT_TIMEOUT,
			)
			.await?;
		self.store.read().await.request(StoreRequest::Init, INIT_TIMEOUT).await?;

		// Warm the registry from persisted statuses so known-negative
		// jobs are skipped from the first render on.
		match self.store.read().await.request(StoreRequest::ListJobStatuses, STORE_SET_TIMEOUT).await
		{
			Ok(StoreResponse::JobStatusListed { entries }) => {
				self.registry.warm(entries, Utc::now()).await;
			}
			Ok(other) => warn!(response = ?other, "unexpected job status listing"),
			Err(err) => warn!(error = %err, "could not warm roi registry"),
		}
		Ok(())
	}

	/// Resolves executions with ROI annotations for a set of jobs.
	///
	/// With `range` of `None` the window defaults to the configured
	/// `queryMax` days ending today. A job whose fetch fails contributes
	/// an empty list. When initialization fails the cache is bypassed
	/// and every job is fetched directly, so the dashboard still renders
	/// with a broken store.
	#[instrument(skip(self, job_ids), fields(jobs = job_ids.len()))]
	pub async fn get_executions_with_roi(
		&self,
		job_ids: &[JobId],
		range: Option<DateRange>,
	) -> Result<HashMap<JobId, Vec<Execution>>> {
		let _guard = PendingGuard::enter(&self.pending);
		let settings = self.settings.get().await;
		let now = Utc::now();
		let requested =
			range.unwrap_or_else(|| DateRange::last_days(settings.query_max.max(1), now));

		if let Err(err) = self.ensure_initialized().await {
			warn!(error = %err, "cache unavailable, fetching directly");
			return Ok(self
				.direct_executions(job_ids, requested, range.is_none(), &settings)
				.await);
		}

		let mut results = HashMap::new();
		for job_id in job_ids {
			let executions = match self
				.job_executions(job_id, requested, range.is_none(), &settings, now)
				.await
			{
				Ok(executions) => executions,
				Err(err) => {
					warn!(job_id = %job_id, error = %err, "job resolution failed, returning empty");
					Vec::new()
				}
			};
			results.insert(job_id.clone(), executions);
		}
		Ok(results)
	}

	/// Same resolution as [`Self::get_executions_with_roi`], flattened
	/// into one list ordered newest first.
	pub async fn get_all_executions(
		&self,
		job_ids: &[JobId],
		range: Option<DateRange>,
	) -> Result<Vec<Execution>> {
		let by_job = self.get_executions_with_roi(job_ids, range).await?;
		let mut executions = ExecutionsResult::ByJob(by_job).flatten();
		executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
		Ok(executions)
	}

	/// Cache-bypassing fallback: every job is fetched and annotated
	/// directly, with per-job failures yielding empties.
	async fn direct_executions(
		&self,
		job_ids: &[JobId],
		requested: DateRange,
		implicit_range: bool,
		settings: &Settings,
	) -> HashMap<JobId, Vec<Execution>> {
		let fetch_range = (!implicit_range).then_some(requested);
		let mut results = HashMap::new();
		for job_id in job_ids {
			let executions = match self
				.fetch_and_annotate(job_id, fetch_range, settings.query_max)
				.await
			{
				Ok(annotated) => {
					let mut visible = filter_by_range(&annotated.results, requested);
					visible.retain(|e| {
						e.status == ExecutionStatus::Succeeded
							&& (settings.show_no_roi || e.is_reportable())
					});
					visible
				}
				Err(err) => {
					warn!(job_id = %job_id, error = %err, "direct fetch failed, returning empty");
					Vec::new()
				}
			};
			results.insert(job_id.clone(), executions);
		}
		results
	}

	async fn job_executions(
		&self,
		job_id: &JobId,
		requested: DateRange,
		implicit_range: bool,
		settings: &Settings,
		now: DateTime<Utc>,
	) -> Result<Vec<Execution>> {
		// Once the initial cache build has completed, every render also
		// refetches today's window so same-day executions show up
		// without waiting out the freshness threshold.
		let refresh_today = settings.initial_cache_complete;

		if !settings.show_no_roi
			&& !refresh_today
			&& self.registry.get(job_id, now).await == Some(false)
		{
			debug!(job_id = %job_id, "skipping job known to have no roi");
			return Ok(Vec::new());
		}

		let key = job_id.cache_key();
		let cached = self.store_get_entry(&key).await.filter(|entry| {
			let expired = entry.age(now) >= ChronoDuration::hours(CACHE_TTL_HOURS);
			if expired {
				debug!(job_id = %job_id, "ignoring expired cache entry");
			}
			!expired
		});

		let window = cached.as_ref().map(|entry| CachedWindow {
			range: entry.date_range,
			age_hours: entry.age(now).num_hours(),
		});
		let mut plan = plan_fetch(requested, window, FRESHNESS_HOURS, now.date_naive());
		if refresh_today {
			plan = without_trailing_refetch(plan);
		}
		debug!(job_id = %job_id, ?plan, "fetch plan resolved");

		let (entry, built_fresh) = match (plan, cached) {
			(FetchPlan::UseCache, Some(entry)) => (entry, false),
			(FetchPlan::FetchDelta { older, newer }, Some(entry)) => {
				(self.extend_entry(job_id, &key, entry, [older, newer], now).await?, false)
			}
			(FetchPlan::FetchRecent(recent), Some(entry)) => {
				(self.extend_entry(job_id, &key, entry, [Some(recent), None], now).await?, false)
			}
			_ => (
				self.build_entry(job_id, &key, requested, implicit_range, settings.query_max, now)
					.await?,
				true,
			),
		};

		// A full build already fetched today; anything served from or
		// extended around an existing entry gets the today refresh,
		// growing the covered window by union with today.
		let entry = if refresh_today && !built_fresh {
			self.extend_entry(job_id, &key, entry, [Some(DateRange::today(now)), None], now)
				.await?
		} else {
			entry
		};

		let mut visible = filter_by_range(&entry.data, requested);
		visible.retain(|e| {
			e.status == ExecutionStatus::Succeeded
				&& (settings.show_no_roi || e.is_reportable())
		});
		Ok(visible)
	}

	/// Full fetch for a job with nothing usable in the cache.
	async fn build_entry(
		&self,
		job_id: &JobId,
		key: &str,
		requested: DateRange,
		implicit_range: bool,
		query_max: u64,
		now: DateTime<Utc>,
	) -> Result<CacheEntry> {
		// An implicit window uses the server's recent-days shorthand so
		// results match what the dashboard would see natively.
		let fetch_range = (!implicit_range).then_some(requested);
		let annotated = self.fetch_and_annotate(job_id, fetch_range, query_max).await?;
		let has_roi = any_succeeded_with_roi(&annotated.results);
		let entry = CacheEntry {
			id: key.to_string(),
			job_id: job_id.clone(),
			data: annotated.results,
			timestamp: now,
			date_range: Some(requested),
			has_roi,
			total_executions: annotated.total,
		};
		self.write_back(&entry).await;
		self.record_job_status(job_id, has_roi, now).await;
		Ok(entry)
	}

	/// Fetches the uncovered gaps and merges them into the cached entry.
	/// The covered window grows to the union of old coverage and the
	/// fetched gaps, never shrinking what was already known.
	async fn extend_entry(
		&self,
		job_id: &JobId,
		key: &str,
		entry: CacheEntry,
		gaps: [Option<DateRange>; 2],
		now: DateTime<Utc>,
	) -> Result<CacheEntry> {
		let mut fresh = Vec::new();
		let mut covered = entry.date_range;
		let mut total = entry.total_executions;
		let mut roi_disabled = false;

		for gap in gaps.into_iter().flatten() {
			let annotated = self.fetch_and_annotate(job_id, Some(gap), 0).await?;
			// The server reports its current total with every page, so
			// the last fetch carries the freshest count.
			total = annotated.total;
			roi_disabled |= annotated.roi_disabled;
			fresh.extend(annotated.results);
			covered = Some(covered.map_or(gap, |c| c.union(&gap)));
		}

		let fresh_has_roi = any_succeeded_with_roi(&fresh);
		let has_roi = entry.has_roi || fresh_has_roi;
		let updated = CacheEntry {
			id: key.to_string(),
			job_id: job_id.clone(),
			data: merge_executions(entry.data, fresh),
			timestamp: now,
			date_range: covered,
			has_roi,
			total_executions: total,
		};
		self.write_back(&updated).await;
		if roi_disabled || fresh_has_roi {
			self.record_job_status(job_id, has_roi, now).await;
		}
		Ok(updated)
	}

	async fn fetch_and_annotate(
		&self,
		job_id: &JobId,
		range: Option<DateRange>,
		recent_days: u64,
	) -> Result<Annotated> {
		let response = self
			.fetch
			.read()
			.await
			.request(
				FetchRequest::FetchExecutions { job_id: job_id.clone(), range, recent_days },
				FETCH_TIMEOUT,
			)
			.await?;
		let (results, total) = match response {
			FetchResponse::ExecutionsFetched { results, total_executions } => {
				(results, total_executions)
			}
			other => return Err(unexpected(&other)),
		};
		if results.is_empty() {
			return Ok(Annotated { results, total, roi_disabled: false });
		}

		let response = self
			.fetch
			.read()
			.await
			.request(
				FetchRequest::ProcessExecutions { job_id: job_id.clone(), executions: results },
				PROCESS_TIMEOUT,
			)
			.await?;
		match response {
			FetchResponse::ExecutionsProcessed { results, summary } => Ok(Annotated {
				results,
				total,
				roi_disabled: summary.roi_disabled,
			}),
			other => Err(unexpected(&other)),
		}
	}

	/// Cache read with a short deadline. A slow or failing store
	/// degrades to a miss; on timeout the in-flight read is cancelled so
	/// its eventual result is discarded.
	async fn store_get_entry(&self, key: &str) -> Option<CacheEntry> {
		let request =
			StoreRequest::GetExecutions { key: key.to_string(), metadata_only: false };
		let store = self.store.read().await;
		match store.request(request, STORE_GET_TIMEOUT).await {
			Ok(StoreResponse::ExecutionsEntry { entry }) => entry,
			Ok(other) => {
				warn!(key, response = ?other, "unexpected cache read response");
				None
			}
			Err(WorkerError::Timeout { request_id, .. }) => {
				let _ = store.notify(StoreRequest::Cancel { request_id });
				warn!(key, "cache read timed out, treating as miss");
				None
			}
			Err(err) => {
				warn!(key, error = %err, "cache read failed, treating as miss");
				None
			}
		}
	}

	/// Best-effort cache write; a failed write costs a refetch later,
	/// not the current result.
	async fn write_back(&self, entry: &CacheEntry) {
		let request = StoreRequest::SetExecutions { entry: entry.clone() };
		if let Err(err) = self.store.read().await.request(request, STORE_SET_TIMEOUT).await {
			warn!(key = %entry.id, error = %err, "cache write failed");
		}
	}

	async fn record_job_status(&self, job_id: &JobId, has_roi: bool, now: DateTime<Utc>) {
		self.registry.set(job_id.clone(), has_roi, now).await;
		let request = StoreRequest::SetJobStatus { job_id: job_id.clone(), has_roi };
		if let Err(err) = self.store.read().await.request(request, STORE_SET_TIMEOUT).await {
			warn!(job_id = %job_id, error = %err, "job status write failed");
		}
	}

	/// Whether a job has ROI capture enabled, answering from the
	/// registry, then the persisted status, then a live probe. Degrades
	/// to `false` when nothing can be reached, and remembers that answer
	/// so a flapping server is not probed on every render.
	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn check_job_roi_status(&self, job_id: &JobId) -> bool {
		let _guard = PendingGuard::enter(&self.pending);
		if let Err(err) = self.ensure_initialized().await {
			warn!(job_id = %job_id, error = %err, "roi status check without initialization");
			return false;
		}
		let now = Utc::now();

		if let Some(known) = self.registry.get(job_id, now).await {
			return known;
		}

		let store_response = self
			.store
			.read()
			.await
			.request(StoreRequest::GetJobStatus { job_id: job_id.clone() }, JOB_STATUS_GET_TIMEOUT)
			.await;
		match store_response {
			Ok(StoreResponse::JobStatus { entry: Some(status) })
				if now - status.timestamp < ChronoDuration::hours(CACHE_TTL_HOURS) =>
			{
				self.registry.set(job_id.clone(), status.has_roi, now).await;
				return status.has_roi;
			}
			Err(WorkerError::Timeout { request_id, .. }) => {
				let _ = self.store.read().await.notify(StoreRequest::Cancel { request_id });
			}
			_ => {}
		}

		let probe = self
			.fetch
			.read()
			.await
			.request(FetchRequest::CheckJobRoiStatus { job_id: job_id.clone() }, ROI_STATUS_TIMEOUT)
			.await;
		match probe {
			Ok(FetchResponse::RoiStatusChecked { has_roi, .. }) => {
				self.record_job_status(job_id, has_roi, now).await;
				has_roi
			}
			Ok(other) => {
				warn!(job_id = %job_id, response = ?other, "unexpected roi status response");
				self.registry.set(job_id.clone(), false, now).await;
				false
			}
			Err(err) => {
				warn!(job_id = %job_id, error = %err, "roi status check failed");
				self.registry.set(job_id.clone(), false, now).await;
				false
			}
		}
	}

	/// Builds (or tops up) the cache for every given job, then marks the
	/// initial build complete so later loads trust cached history.
	pub async fn prime_cache(
		&self,
		job_ids: &[JobId],
	) -> Result<HashMap<JobId, Vec<Execution>>> {
		let results = self.get_executions_with_roi(job_ids, None).await?;
		self.settings
			.update(|s| {
				s.initial_cache_complete = true;
				s.cache_timestamp = Some(Utc::now());
			})
			.await?;
		info!(jobs = job_ids.len(), "initial cache build complete");
		Ok(results)
	}

	/// Runs the cleanup sweep when due. Skipped entirely while dashboard
	/// requests are in flight, and rate-limited to once per interval.
	pub async fn run_maintenance(&self) -> Result<Option<CleanupOutcome>> {
		if self.pending.load(Ordering::SeqCst) > 0 {
			debug!("maintenance deferred, requests in flight");
			return Ok(None);
		}
		let now = Utc::now();
		let mut last = self.last_cleanup.lock().await;
		let due = last
			.map_or(true, |t| now - t >= ChronoDuration::hours(CLEANUP_INTERVAL_HOURS));
		if !due {
			return Ok(None);
		}

		let settings = self.settings.get().await;
		let retention_hours = settings.query_max.max(1) as i64 * 24;
		let response = self
			.store
			.read()
			.await
			.request(StoreRequest::Cleanup { max_age_hours: retention_hours }, STORE_SET_TIMEOUT)
			.await?;
		*last = Some(now);
		match response {
			StoreResponse::CleanupDone { removed_entries, removed_executions } => {
				Ok(Some(CleanupOutcome { removed_entries, removed_executions }))
			}
			other => Err(unexpected(&other)),
		}
	}

	/// Periodic upkeep: health-checks the workers, respawns them when
	/// wedged, and runs the cleanup sweep when due. Aborting the
	/// returned handle stops the loop.
	pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
		let coordinator = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(MAINTENANCE_TICK);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			// The first interval tick completes immediately; consume it
			// so upkeep starts one full tick after spawn.
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let report = coordinator.health_check().await;
				if !report.store_healthy || !report.fetch_connected {
					warn!(?report, "unhealthy worker detected, respawning");
					if let Err(err) = coordinator.reinitialize().await {
						warn!(error = %err, "reinitialization failed");
						continue;
					}
				}
				match coordinator.run_maintenance().await {
					Ok(Some(outcome)) => info!(
						removed_entries = outcome.removed_entries,
						removed_executions = outcome.removed_executions,
						"cleanup sweep finished"
					),
					Ok(None) => {}
					Err(err) => warn!(error = %err, "cleanup sweep failed"),
				}
			}
		})
	}

	pub async fn health_check(&self) -> HealthReport {
		let store_healthy = matches!(
			self.store.read().await.request(StoreRequest::HealthCheck, STORE_SET_TIMEOUT).await,
			Ok(StoreResponse::Healthy { healthy: true, .. })
		);
		HealthReport { store_healthy, fetch_connected: self.fetch.read().await.is_connected() }
	}

	/// Tears down and respawns both workers, then re-runs
	/// initialization. Used when a health check reports a wedged worker.
	pub async fn reinitialize(&self) -> Result<()> {
		info!("reinitializing workers");
		*self.fetch.write().await = roilens_fetch::spawn();
		*self.store.write().await = roilens_store::spawn(StoreConfig {
			database_url: self.config.database_url.clone(),
		});
		self.registry.clear().await;
		{
			let mut init = self.init.lock().await;
			init.initialized = false;
			init.last_failure = None;
		}
		self.ensure_initialized().await
	}
}

/// Collapses the trailing-day parts of a plan when today's window is
/// being refetched anyway: the newer gap and the stale-recent refetch
/// are superseded by that refresh.
fn without_trailing_refetch(plan: FetchPlan) -> FetchPlan {
	match plan {
		FetchPlan::FetchDelta { older: None, .. } => FetchPlan::UseCache,
		FetchPlan::FetchDelta { older, .. } => FetchPlan::FetchDelta { older, newer: None },
		FetchPlan::FetchRecent(_) => FetchPlan::UseCache,
		other => other,
	}
}

/// Entry-level ROI flag: only executions that both succeeded and carry
/// ROI data count.
fn any_succeeded_with_roi(executions: &[Execution]) -> bool {
	executions.iter().any(|e| e.status == ExecutionStatus::Succeeded && e.has_roi)
}

fn unexpected<T: std::fmt::Debug>(response: &T) -> CoordinatorError {
	CoordinatorError::Worker(WorkerError::Remote(format!(
		"unexpected worker response: {response:?}"
	)))
}
