// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the execution and job-status caches.
//!
//! Execution lists are stored as JSON blobs keyed by sanitized job id,
//! alongside the covered date window; job ROI statuses are a flat table.
//! Timestamps are RFC 3339 strings in UTC.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use roilens_core::model::{CacheEntry, CacheEntryMeta, DataInfo, JobId, JobRoiStatusEntry};
use roilens_core::range::DateRange;

use crate::error::{Result, StoreError};

/// Rows affected by a cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
	pub removed_entries: u64,
	pub removed_executions: u64,
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
	async fn get_execution_entry(&self, key: &str) -> Result<Option<CacheEntry>>;
	async fn get_execution_meta(&self, key: &str) -> Result<Option<CacheEntryMeta>>;
	async fn put_execution_entry(&self, entry: &CacheEntry) -> Result<()>;
	async fn delete_execution_entry(&self, key: &str) -> Result<()>;
	async fn list_execution_entries(&self) -> Result<Vec<CacheEntryMeta>>;

	async fn get_job_status(&self, id: &JobId) -> Result<Option<JobRoiStatusEntry>>;
	async fn put_job_status(&self, entry: &JobRoiStatusEntry) -> Result<()>;
	async fn list_job_statuses(&self) -> Result<Vec<JobRoiStatusEntry>>;

	/// Drops executions started before `cutoff` from every entry,
	/// narrowing each entry's covered window to the survivors and
	/// deleting entries left empty. Job statuses written before the
	/// cutoff are dropped too.
	async fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<CleanupStats>;

	async fn health_check(&self) -> Result<()>;
}

pub struct SqliteCacheRepository {
	pool: SqlitePool,
}

impl SqliteCacheRepository {
	/// Opens (creating if needed) the cache database and ensures the
	/// schema exists. The pool is capped at a single connection; the
	/// worker is the only writer and in-memory databases live and die
	/// with their connection.
	pub async fn connect(url: &str) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await?;

		sqlx::query(
			"CREATE TABLE IF NOT EXISTS execution_cache (
				id TEXT PRIMARY KEY,
				job_id TEXT NOT NULL,
				data TEXT NOT NULL,
				timestamp TEXT NOT NULL,
				range_begin TEXT,
				range_end TEXT,
				has_roi INTEGER NOT NULL DEFAULT 0,
				total_executions INTEGER NOT NULL DEFAULT 0
			)",
		)
		.execute(&pool)
		.await?;
		sqlx::query(
			"CREATE TABLE IF NOT EXISTS job_cache (
				id TEXT PRIMARY KEY,
				has_roi INTEGER NOT NULL DEFAULT 0,
				timestamp TEXT NOT NULL
			)",
		)
		.execute(&pool)
		.await?;

		info!(url, "cache database ready");
		Ok(Self { pool })
	}
}

#[derive(sqlx::FromRow)]
struct ExecutionCacheRow {
	id: String,
	job_id: String,
	data: String,
	timestamp: String,
	range_begin: Option<String>,
	range_end: Option<String>,
	has_roi: bool,
	total_executions: i64,
}

impl ExecutionCacheRow {
	fn into_entry(self) -> Result<CacheEntry> {
		let date_range = match (self.range_begin, self.range_end) {
			(Some(begin), Some(end)) => Some(DateRange::new(
				parse_date(&begin)?,
				parse_date(&end)?,
			)),
			_ => None,
		};
		Ok(CacheEntry {
			id: self.id,
			job_id: JobId::new(self.job_id),
			data: serde_json::from_str(&self.data)?,
			timestamp: parse_timestamp(&self.timestamp)?,
			date_range,
			has_roi: self.has_roi,
			total_executions: self.total_executions,
		})
	}

	fn into_meta(self) -> Result<CacheEntryMeta> {
		// Counting via a thin value parse avoids decoding full
		// execution structs for metadata-only reads.
		let values: Vec<serde_json::Value> = serde_json::from_str(&self.data)?;
		Ok(CacheEntryMeta {
			id: self.id,
			timestamp: parse_timestamp(&self.timestamp)?,
			data_info: DataInfo {
				has_data: !values.is_empty(),
				length: Some(values.len()),
			},
		})
	}
}

#[derive(sqlx::FromRow)]
struct JobCacheRow {
	id: String,
	has_roi: bool,
	timestamp: String,
}

impl JobCacheRow {
	fn into_entry(self) -> Result<JobRoiStatusEntry> {
		Ok(JobRoiStatusEntry {
			id: JobId::new(self.id),
			has_roi: self.has_roi,
			timestamp: parse_timestamp(&self.timestamp)?,
		})
	}
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| StoreError::Timestamp(format!("{raw}: {e}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
	raw.parse()
		.map_err(|e| StoreError::Timestamp(format!("{raw}: {e}")))
}

#[async_trait]
impl CacheRepository for SqliteCacheRepository {
	async fn get_execution_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
		let row = sqlx::query_as::<_, ExecutionCacheRow>(
			"SELECT id, job_id, data, timestamp, range_begin, range_end, has_roi, total_executions
			 FROM execution_cache WHERE id = ?",
		)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;
		row.map(ExecutionCacheRow::into_entry).transpose()
	}

	async fn get_execution_meta(&self, key: &str) -> Result<Option<CacheEntryMeta>> {
		let row = sqlx::query_as::<_, ExecutionCacheRow>(
			"SELECT id, job_id, data, timestamp, range_begin, range_end, has_roi, total_executions
			 FROM execution_cache WHERE id = ?",
		)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;
		row.map(ExecutionCacheRow::into_meta).transpose()
	}

	async fn put_execution_entry(&self, entry: &CacheEntry) -> Result<()> {
		sqlx::query(
			"INSERT INTO execution_cache
				(id, job_id, data, timestamp, range_begin, range_end, has_roi, total_executions)
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			 ON CONFLICT(id) DO UPDATE SET
				job_id = excluded.job_id,
				data = excluded.data,
				timestamp = excluded.timestamp,
				range_begin = excluded.range_begin,
				range_end = excluded.range_end,
				has_roi = excluded.has_roi,
				total_executions = excluded.total_executions",
		)
		.bind(&entry.id)
		.bind(entry.job_id.as_str())
		.bind(serde_json::to_string(&entry.data)?)
		.bind(entry.timestamp.to_rfc3339())
		.bind(entry.date_range.map(|r| r.begin.to_string()))
		.bind(entry.date_range.map(|r| r.end.to_string()))
		.bind(entry.has_roi)
		.bind(entry.total_executions)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn delete_execution_entry(&self, key: &str) -> Result<()> {
		sqlx::query("DELETE FROM execution_cache WHERE id = ?")
			.bind(key)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	async fn list_execution_entries(&self) -> Result<Vec<CacheEntryMeta>> {
		let rows = sqlx::query_as::<_, ExecutionCacheRow>(
			"SELECT id, job_id, data, timestamp, range_begin, range_end, has_roi, total_executions
			 FROM execution_cache ORDER BY id",
		)
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(ExecutionCacheRow::into_meta).collect()
	}

	async fn get_job_status(&self, id: &JobId) -> Result<Option<JobRoiStatusEntry>> {
		let row = sqlx::query_as::<_, JobCacheRow>(
			"SELECT id, has_roi, timestamp FROM job_cache WHERE id = ?",
		)
		.bind(id.as_str())
		.fetch_optional(&self.pool)
		.await?;
		row.map(JobCacheRow::into_entry).transpose()
	}

	async fn put_job_status(&self, entry: &JobRoiStatusEntry) -> Result<()> {
		sqlx::query(
			"INSERT INTO job_cache (id, has_roi, timestamp) VALUES (?, ?, ?)
			 ON CONFLICT(id) DO UPDATE SET
				has_roi = excluded.has_roi,
				timestamp = excluded.timestamp",
		)
		.bind(entry.id.as_str())
		.bind(entry.has_roi)
		.bind(entry.timestamp.to_rfc3339())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn list_job_statuses(&self) -> Result<Vec<JobRoiStatusEntry>> {
		let rows = sqlx::query_as::<_, JobCacheRow>(
			"SELECT id, has_roi, timestamp FROM job_cache ORDER BY id",
		)
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(JobCacheRow::into_entry).collect()
	}

	#[instrument(skip(self))]
	async fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<CleanupStats> {
		let mut stats = CleanupStats::default();

		let rows = sqlx::query_as::<_, ExecutionCacheRow>(
			"SELECT id, job_id, data, timestamp, range_begin, range_end, has_roi, total_executions
			 FROM execution_cache",
		)
		.fetch_all(&self.pool)
		.await?;

		for row in rows {
			let entry = row.into_entry()?;
			let before = entry.data.len();
			let retained: Vec<_> = entry
				.data
				.iter()
				.filter(|e| e.started_at >= cutoff)
				.cloned()
				.collect();
			if retained.len() == before {
				continue;
			}
			stats.removed_executions += (before - retained.len()) as u64;

			if retained.is_empty() {
				self.delete_execution_entry(&entry.id).await?;
				stats.removed_entries += 1;
				debug!(key = %entry.id, "dropped emptied cache entry");
				continue;
			}

			// Narrow the covered window to what actually survived, so
			// the planner refetches trimmed days instead of trusting a
			// stale range.
			let mut min = retained[0].started_at.date_naive();
			let mut max = min;
			for day in retained.iter().skip(1).map(|e| e.started_at.date_naive()) {
				min = min.min(day);
				max = max.max(day);
			}
			let narrowed = CacheEntry {
				total_executions: retained.len() as i64,
				data: retained,
				date_range: Some(DateRange::new(min, max)),
				..entry
			};
			self.put_execution_entry(&narrowed).await?;
		}

		let statuses = self.list_job_statuses().await?;
		for status in statuses {
			if status.timestamp < cutoff {
				sqlx::query("DELETE FROM job_cache WHERE id = ?")
					.bind(status.id.as_str())
					.execute(&self.pool)
					.await?;
				stats.removed_entries += 1;
			}
		}

		info!(
			removed_entries = stats.removed_entries,
			removed_executions = stats.removed_executions,
			"cache cleanup complete"
		);
		Ok(stats)
	}

	async fn health_check(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}
}
