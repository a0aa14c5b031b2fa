// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client for the job execution API.
//!
//! Two endpoints matter here: the per-job execution listing (paginated,
//! filterable by date window) and the per-execution ROI metrics
//! document. Transient failures are retried with a linear backoff;
//! client errors are surfaced immediately.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use roilens_core::model::{Execution, ExecutionId, ExecutionStatus, JobId};
use roilens_core::range::DateRange;

use crate::error::{FetchError, Result};

pub const USER_AGENT: &str = concat!("roilens/", env!("CARGO_PKG_VERSION"));

/// Executions per listing page.
pub const PAGE_SIZE: i64 = 500;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
	pub base_url: String,
	pub auth_token: Option<String>,
}

/// Outcome of probing an execution's ROI metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoiProbe {
	/// Metrics exist and report this many hours saved.
	Hours(f64),
	/// Metrics endpoint answered but recorded no hours.
	NoData,
	/// The endpoint 404s: ROI capture is not enabled for this job.
	Disabled,
}

/// Which executions to list for a job.
#[derive(Debug, Clone, Copy)]
pub enum FetchWindow {
	/// Explicit day window, expanded to full-day UTC bounds.
	Range(DateRange),
	/// The server-side `recentFilter` shorthand for the last N days.
	RecentDays(u64),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
	http: reqwest::Client,
	base_url: String,
	auth_token: Option<String>,
	page_size: i64,
}

impl ApiClient {
	pub fn new(config: &ApiConfig) -> Result<Self> {
		let http = reqwest::Client::builder()
			.user_agent(USER_AGENT)
			.timeout(HTTP_TIMEOUT)
			.build()?;
		Ok(Self {
			http,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			auth_token: config.auth_token.clone(),
			page_size: PAGE_SIZE,
		})
	}

	#[cfg(test)]
	fn with_page_size(mut self, page_size: i64) -> Self {
		self.page_size = page_size;
		self
	}

	/// Lists every execution of `job_id` inside `window`, following
	/// pagination until the reported total is reached. Returns the
	/// executions plus the server-reported total.
	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn fetch_executions(
		&self,
		job_id: &JobId,
		window: FetchWindow,
	) -> Result<(Vec<Execution>, i64)> {
		let mut collected = Vec::new();
		let mut offset = 0i64;
		loop {
			let page = self.executions_page_with_retry(job_id, window, offset).await?;
			let total = page.paging.total;
			let count = page.executions.len() as i64;
			collected.extend(
				page.executions
					.into_iter()
					.map(|e| e.into_execution(job_id.clone())),
			);
			offset += count;
			if count == 0 || offset >= total {
				debug!(job_id = %job_id, fetched = collected.len(), total, "execution listing complete");
				return Ok((collected, total));
			}
		}
	}

	/// Most recent succeeded execution, if the job has one.
	pub async fn latest_succeeded_execution(&self, job_id: &JobId) -> Result<Option<Execution>> {
		let url = self.executions_url(job_id);
		let request = self
			.get(&url)
			.query(&[("max", "1"), ("statusFilter", "succeeded")]);
		let page: ExecutionsPage = self.send_json(request, &url).await?;
		Ok(page
			.executions
			.into_iter()
			.next()
			.map(|e| e.into_execution(job_id.clone())))
	}

	/// Fetches the ROI metrics document linked from an execution.
	///
	/// A 404 means the ROI plugin is not active for this job at all,
	/// which callers use to short-circuit further probing; a document
	/// without an `hours` field just means this execution recorded no
	/// savings.
	#[instrument(skip(self))]
	pub async fn roi_metrics(&self, href: &str) -> Result<RoiProbe> {
		let url = format!("{}/roimetrics/data", href.trim_end_matches('/'));
		let response = self.get(&url).send().await?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(RoiProbe::Disabled);
		}
		if !response.status().is_success() {
			return Err(FetchError::Status { status: response.status().as_u16(), url });
		}
		let body: serde_json::Value = response.json().await?;
		Ok(match body.get("hours").and_then(|v| v.as_f64()) {
			Some(hours) => RoiProbe::Hours(hours),
			None => RoiProbe::NoData,
		})
	}

	async fn executions_page_with_retry(
		&self,
		job_id: &JobId,
		window: FetchWindow,
		offset: i64,
	) -> Result<ExecutionsPage> {
		let mut last_error = None;
		for attempt in 1..=MAX_ATTEMPTS {
			match self.executions_page(job_id, window, offset).await {
				Ok(page) => return Ok(page),
				Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
					warn!(
						job_id = %job_id,
						offset,
						attempt,
						error = %err,
						"execution page fetch failed, retrying"
					);
					tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
					last_error = Some(err);
				}
				Err(err) if err.is_retryable() => last_error = Some(err),
				Err(err) => return Err(err),
			}
		}
		Err(FetchError::RetriesExhausted {
			attempts: MAX_ATTEMPTS,
			last_error: last_error
				.map(|e| e.to_string())
				.unwrap_or_else(|| "unknown".to_string()),
		})
	}

	async fn executions_page(
		&self,
		job_id: &JobId,
		window: FetchWindow,
		offset: i64,
	) -> Result<ExecutionsPage> {
		let url = self.executions_url(job_id);
		let mut request = self.get(&url).query(&[
			("max", self.page_size.to_string()),
			("offset", offset.to_string()),
		]);
		request = match window {
			FetchWindow::Range(range) => request.query(&[
				("begin", format!("{}T00:00:00Z", range.begin)),
				("end", format!("{}T23:59:59Z", range.end)),
			]),
			FetchWindow::RecentDays(days) => {
				request.query(&[("recentFilter", format!("{days}d"))])
			}
		};
		self.send_json(request, &url).await
	}

	fn executions_url(&self, job_id: &JobId) -> String {
		format!("{}/job/{}/executions", self.base_url, job_id)
	}

	fn get(&self, url: &str) -> reqwest::RequestBuilder {
		let mut request = self.http.get(url).header("Accept", "application/json");
		if let Some(token) = &self.auth_token {
			request = request.header("X-Api-Token", token);
		}
		request
	}

	async fn send_json<T: serde::de::DeserializeOwned>(
		&self,
		request: reqwest::RequestBuilder,
		url: &str,
	) -> Result<T> {
		let response = request.send().await?;
		if !response.status().is_success() {
			return Err(FetchError::Status {
				status: response.status().as_u16(),
				url: url.to_string(),
			});
		}
		Ok(response.json().await?)
	}
}

#[derive(Debug, Deserialize)]
struct ExecutionsPage {
	paging: Paging,
	#[serde(default)]
	executions: Vec<ApiExecution>,
}

#[derive(Debug, Deserialize)]
struct Paging {
	total: i64,
}

#[derive(Debug, Deserialize)]
struct ApiExecution {
	id: ExecutionId,
	href: String,
	status: String,
	#[serde(rename = "date-started")]
	date_started: DateStarted,
}

#[derive(Debug, Deserialize)]
struct DateStarted {
	date: DateTime<Utc>,
}

impl ApiExecution {
	fn into_execution(self, job_id: JobId) -> Execution {
		Execution {
			id: self.id,
			job_id,
			status: ExecutionStatus::from(self.status),
			started_at: self.date_started.date,
			href: self.href,
			roi_hours: 0.0,
			has_roi: false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn client(server: &MockServer) -> ApiClient {
		ApiClient::new(&ApiConfig {
			base_url: format!("{}/", server.uri()),
			auth_token: Some("secret-token".to_string()),
		})
		.unwrap()
	}

	fn execution_json(id: i64, server: &MockServer) -> serde_json::Value {
		serde_json::json!({
			"id": id,
			"href": format!("{}/api/execution/{id}", server.uri()),
			"status": "succeeded",
			"date-started": { "date": "2026-03-10T08:00:00Z" }
		})
	}

	#[tokio::test]
	async fn fetch_follows_pagination() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/job/web-deploy/executions"))
			.and(query_param("offset", "0"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 3 },
				"executions": [execution_json(1, &server), execution_json(2, &server)]
			})))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/job/web-deploy/executions"))
			.and(query_param("offset", "2"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 3 },
				"executions": [execution_json(3, &server)]
			})))
			.mount(&server)
			.await;

		let client = client(&server).with_page_size(2);
		let (executions, total) = client
			.fetch_executions(&JobId::new("web-deploy"), FetchWindow::RecentDays(10))
			.await
			.unwrap();
		assert_eq!(total, 3);
		assert_eq!(
			executions.iter().map(|e| e.id).collect::<Vec<_>>(),
			vec![1, 2, 3]
		);
		assert_eq!(executions[0].job_id, JobId::new("web-deploy"));
		assert!(!executions[0].has_roi);
	}

	#[tokio::test]
	async fn range_window_uses_full_day_bounds() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/job/j1/executions"))
			.and(query_param("begin", "2026-03-01T00:00:00Z"))
			.and(query_param("end", "2026-03-05T23:59:59Z"))
			.and(header("X-Api-Token", "secret-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 0 },
				"executions": []
			})))
			.expect(1)
			.mount(&server)
			.await;

		let range = DateRange::new("2026-03-01".parse().unwrap(), "2026-03-05".parse().unwrap());
		let (executions, total) = client(&server)
			.fetch_executions(&JobId::new("j1"), FetchWindow::Range(range))
			.await
			.unwrap();
		assert!(executions.is_empty());
		assert_eq!(total, 0);
	}

	#[tokio::test]
	async fn transient_server_error_is_retried() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/job/j1/executions"))
			.respond_with(ResponseTemplate::new(503))
			.up_to_n_times(2)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/job/j1/executions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 1 },
				"executions": [execution_json(5, &server)]
			})))
			.mount(&server)
			.await;

		let (executions, _) = client(&server)
			.fetch_executions(&JobId::new("j1"), FetchWindow::RecentDays(10))
			.await
			.unwrap();
		assert_eq!(executions.len(), 1);
	}

	#[tokio::test]
	async fn not_found_listing_is_not_retried() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/job/gone/executions"))
			.respond_with(ResponseTemplate::new(404))
			.expect(1)
			.mount(&server)
			.await;

		let err = client(&server)
			.fetch_executions(&JobId::new("gone"), FetchWindow::RecentDays(10))
			.await
			.unwrap_err();
		assert!(matches!(err, FetchError::Status { status: 404, .. }));
	}

	#[tokio::test]
	async fn roi_metrics_distinguishes_absent_from_present() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/execution/1/roimetrics/data"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(serde_json::json!({ "hours": 2.5 })),
			)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/execution/2/roimetrics/data"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/execution/3/roimetrics/data"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(serde_json::json!({ "other": true })),
			)
			.mount(&server)
			.await;

		let client = client(&server);
		let base = server.uri();
		assert_eq!(
			client.roi_metrics(&format!("{base}/api/execution/1")).await.unwrap(),
			RoiProbe::Hours(2.5)
		);
		assert_eq!(
			client.roi_metrics(&format!("{base}/api/execution/2")).await.unwrap(),
			RoiProbe::Disabled
		);
		assert_eq!(
			client.roi_metrics(&format!("{base}/api/execution/3")).await.unwrap(),
			RoiProbe::NoData
		);
	}

	#[tokio::test]
	async fn latest_succeeded_execution_queries_status_filter() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/job/j1/executions"))
			.and(query_param("max", "1"))
			.and(query_param("statusFilter", "succeeded"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"paging": { "total": 12 },
				"executions": [execution_json(9, &server)]
			})))
			.mount(&server)
			.await;

		let latest = client(&server)
			.latest_succeeded_execution(&JobId::new("j1"))
			.await
			.unwrap();
		assert_eq!(latest.unwrap().id, 9);
	}
}
