// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory registry of per-job ROI status.
//!
//! Sits in front of the persistent job-status table so repeated
//! dashboard renders never re-query jobs already known to have ROI
//! capture disabled. Entries expire after the cache TTL.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use roilens_core::model::{JobId, JobRoiStatusEntry};

#[derive(Debug, Clone, Copy)]
struct RegistryEntry {
	has_roi: bool,
	checked_at: DateTime<Utc>,
}

pub struct RoiRegistry {
	entries: Mutex<HashMap<JobId, RegistryEntry>>,
	ttl: Duration,
}

impl RoiRegistry {
	pub fn new(ttl: Duration) -> Self {
		Self { entries: Mutex::new(HashMap::new()), ttl }
	}

	/// Known ROI status for `id`, or `None` when unknown or expired.
	pub async fn get(&self, id: &JobId, now: DateTime<Utc>) -> Option<bool> {
		let entries = self.entries.lock().await;
		entries
			.get(id)
			.filter(|e| now - e.checked_at < self.ttl)
			.map(|e| e.has_roi)
	}

	pub async fn set(&self, id: JobId, has_roi: bool, now: DateTime<Utc>) {
		self.entries
			.lock()
			.await
			.insert(id, RegistryEntry { has_roi, checked_at: now });
	}

	/// Seeds the registry from persisted statuses, skipping entries
	/// older than the TTL.
	pub async fn warm(&self, statuses: Vec<JobRoiStatusEntry>, now: DateTime<Utc>) {
		let mut entries = self.entries.lock().await;
		let mut seeded = 0usize;
		for status in statuses {
			if now - status.timestamp < self.ttl {
				entries.insert(
					status.id,
					RegistryEntry { has_roi: status.has_roi, checked_at: status.timestamp },
				);
				seeded += 1;
			}
		}
		debug!(seeded, "roi registry warmed from store");
	}

	pub async fn clear(&self) {
		self.entries.lock().await.clear();
	}
}
