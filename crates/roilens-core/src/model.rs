// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Domain types shared by the fetch worker, the persistent store, and the
//! cache coordinator.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::range::DateRange;

/// Identifier of a job definition on the remote server.
///
/// Job ids come from user-controlled input and are sanitized before being
/// used as a cache key, see [`JobId::cache_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Sanitized form safe to use as a storage key. Characters outside
	/// `[A-Za-z0-9-]` are replaced with `_`; an empty id maps to
	/// `"unknown"`.
	pub fn cache_key(&self) -> String {
		if self.0.is_empty() {
			return "unknown".to_string();
		}
		self.0
			.chars()
			.map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
			.collect()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for JobId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for JobId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// Numeric execution identifier assigned by the remote server.
pub type ExecutionId = i64;

/// Lifecycle state of a job execution as reported by the server.
///
/// Unknown states round-trip through [`ExecutionStatus::Other`] rather
/// than failing deserialization, since the server can grow new states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
	Succeeded,
	Failed,
	Aborted,
	Running,
	Scheduled,
	Other(String),
}

impl ExecutionStatus {
	pub fn as_str(&self) -> &str {
		match self {
			ExecutionStatus::Succeeded => "succeeded",
			ExecutionStatus::Failed => "failed",
			ExecutionStatus::Aborted => "aborted",
			ExecutionStatus::Running => "running",
			ExecutionStatus::Scheduled => "scheduled",
			ExecutionStatus::Other(s) => s,
		}
	}
}

impl From<String> for ExecutionStatus {
	fn from(s: String) -> Self {
		match s.as_str() {
			"succeeded" => ExecutionStatus::Succeeded,
			"failed" => ExecutionStatus::Failed,
			"aborted" => ExecutionStatus::Aborted,
			"running" => ExecutionStatus::Running,
			"scheduled" => ExecutionStatus::Scheduled,
			_ => ExecutionStatus::Other(s),
		}
	}
}

impl From<ExecutionStatus> for String {
	fn from(s: ExecutionStatus) -> Self {
		s.as_str().to_string()
	}
}

/// A single job execution with its ROI annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
	pub id: ExecutionId,
	pub job_id: JobId,
	pub status: ExecutionStatus,
	#[serde(rename = "dateStarted")]
	pub started_at: DateTime<Utc>,
	/// API permalink for this execution, used to derive the ROI metrics
	/// endpoint.
	pub href: String,
	/// Hours saved as reported by the ROI metrics endpoint. Zero when
	/// the execution has no metrics.
	pub roi_hours: f64,
	pub has_roi: bool,
}

impl Execution {
	/// Whether this execution should be included in dashboard results:
	/// completed successfully and carrying a usable ROI signal.
	pub fn is_reportable(&self) -> bool {
		self.status == ExecutionStatus::Succeeded && (self.has_roi || self.roi_hours > 0.0)
	}
}

/// Merge freshly fetched executions into a cached list, deduplicating by
/// execution id. A fresh execution replaces the cached one in place;
/// genuinely new executions are appended in fetch order.
pub fn merge_executions(cached: Vec<Execution>, fresh: Vec<Execution>) -> Vec<Execution> {
	let mut merged = cached;
	let mut index: HashMap<ExecutionId, usize> =
		merged.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
	for exec in fresh {
		match index.get(&exec.id) {
			Some(&i) => merged[i] = exec,
			None => {
				index.insert(exec.id, merged.len());
				merged.push(exec);
			}
		}
	}
	merged
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Execution>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum OneOrMany {
		Many(Vec<Execution>),
		One(Execution),
	}
	Ok(match OneOrMany::deserialize(deserializer)? {
		OneOrMany::Many(v) => v,
		OneOrMany::One(e) => vec![e],
	})
}

/// A persisted per-job execution cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
	/// Storage key, the sanitized job id.
	pub id: String,
	pub job_id: JobId,
	/// Older entries were written with a bare object instead of a list;
	/// both shapes decode into a list.
	#[serde(deserialize_with = "one_or_many")]
	pub data: Vec<Execution>,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub date_range: Option<DateRange>,
	pub has_roi: bool,
	#[serde(default)]
	pub total_executions: i64,
}

impl CacheEntry {
	/// Age of this entry relative to `now`.
	pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
		now - self.timestamp
	}
}

/// Lightweight projection of a cache entry, used when the caller only
/// needs to know whether data exists without paying to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryMeta {
	pub id: String,
	pub timestamp: DateTime<Utc>,
	pub data_info: DataInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
	pub has_data: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub length: Option<usize>,
}

/// Persisted record of whether a job has ever produced ROI metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRoiStatusEntry {
	pub id: JobId,
	pub has_roi: bool,
	pub timestamp: DateTime<Utc>,
}

/// Result shape for a multi-job fetch: either grouped per job or a single
/// flat list across all requested jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionsResult {
	ByJob(HashMap<JobId, Vec<Execution>>),
	Flat(Vec<Execution>),
}

impl ExecutionsResult {
	pub fn flatten(self) -> Vec<Execution> {
		match self {
			ExecutionsResult::Flat(v) => v,
			ExecutionsResult::ByJob(map) => map.into_values().flatten().collect(),
		}
	}

	pub fn total_len(&self) -> usize {
		match self {
			ExecutionsResult::Flat(v) => v.len(),
			ExecutionsResult::ByJob(map) => map.values().map(Vec::len).sum(),
		}
	}

	/// Groups a flat list by owning job; already-grouped results pass
	/// through unchanged.
	pub fn into_by_job(self) -> HashMap<JobId, Vec<Execution>> {
		match self {
			ExecutionsResult::ByJob(map) => map,
			ExecutionsResult::Flat(list) => {
				let mut map: HashMap<JobId, Vec<Execution>> = HashMap::new();
				for execution in list {
					map.entry(execution.job_id.clone()).or_default().push(execution);
				}
				map
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn exec(id: ExecutionId, roi_hours: f64) -> Execution {
		Execution {
			id,
			job_id: JobId::new("job-1"),
			status: ExecutionStatus::Succeeded,
			started_at: Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
			href: format!("https://rd.example.com/api/execution/{id}"),
			roi_hours,
			has_roi: roi_hours > 0.0,
		}
	}

	#[test]
	fn cache_key_sanitizes_non_alphanumeric() {
		assert_eq!(JobId::new("deploy/prod v2").cache_key(), "deploy_prod_v2");
		assert_eq!(JobId::new("a-b-c").cache_key(), "a-b-c");
		assert_eq!(JobId::new("").cache_key(), "unknown");
	}

	#[test]
	fn unknown_status_round_trips() {
		let status: ExecutionStatus = serde_json::from_str("\"timedout\"").unwrap();
		assert_eq!(status, ExecutionStatus::Other("timedout".to_string()));
		assert_eq!(serde_json::to_string(&status).unwrap(), "\"timedout\"");
	}

	#[test]
	fn merge_replaces_in_place_and_appends_new() {
		let cached = vec![exec(1, 0.0), exec(2, 1.5)];
		let fresh = vec![exec(1, 3.0), exec(3, 0.5)];
		let merged = merge_executions(cached, fresh);
		assert_eq!(merged.len(), 3);
		assert_eq!(merged[0].id, 1);
		assert_eq!(merged[0].roi_hours, 3.0);
		assert_eq!(merged[1].id, 2);
		assert_eq!(merged[2].id, 3);
	}

	#[test]
	fn reportable_requires_success_and_roi_signal() {
		let mut e = exec(1, 0.0);
		assert!(!e.is_reportable());
		e.has_roi = true;
		assert!(e.is_reportable());
		e.has_roi = false;
		e.roi_hours = 0.25;
		assert!(e.is_reportable());
		e.status = ExecutionStatus::Failed;
		assert!(!e.is_reportable());
	}

	#[test]
	fn cache_entry_accepts_single_object_data() {
		let json = serde_json::json!({
			"id": "job-1",
			"jobId": "job-1",
			"data": {
				"id": 9,
				"jobId": "job-1",
				"status": "succeeded",
				"dateStarted": "2026-03-10T12:00:00Z",
				"href": "https://rd.example.com/api/execution/9",
				"roiHours": 2.0,
				"hasRoi": true
			},
			"timestamp": "2026-03-10T13:00:00Z",
			"hasRoi": true
		});
		let entry: CacheEntry = serde_json::from_value(json).unwrap();
		assert_eq!(entry.data.len(), 1);
		assert_eq!(entry.data[0].id, 9);
		assert_eq!(entry.total_executions, 0);
		assert!(entry.date_range.is_none());
	}

	#[test]
	fn executions_result_flattens_both_shapes() {
		let flat = ExecutionsResult::Flat(vec![exec(1, 0.0)]);
		assert_eq!(flat.total_len(), 1);

		let mut by_job = HashMap::new();
		by_job.insert(JobId::new("a"), vec![exec(1, 0.0), exec(2, 0.0)]);
		by_job.insert(JobId::new("b"), vec![exec(3, 0.0)]);
		let grouped = ExecutionsResult::ByJob(by_job);
		assert_eq!(grouped.total_len(), 3);
		assert_eq!(grouped.flatten().len(), 3);
	}

	#[test]
	fn flat_result_groups_by_owning_job() {
		let mut other = exec(9, 0.0);
		other.job_id = JobId::new("job-2");
		let flat = ExecutionsResult::Flat(vec![exec(1, 1.0), exec(2, 0.0), other]);

		let by_job = flat.into_by_job();
		assert_eq!(by_job[&JobId::new("job-1")].len(), 2);
		assert_eq!(by_job[&JobId::new("job-2")].len(), 1);
	}
}
