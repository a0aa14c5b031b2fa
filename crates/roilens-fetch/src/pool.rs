// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded concurrency pool for outbound metric fetches.
//!
//! Tasks queue FIFO behind a fair semaphore so burst submissions (one
//! probe per execution in a batch) cannot starve each other or flood the
//! server. The pool also keeps running counters for diagnostics.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::trace;

pub const DEFAULT_POOL_LIMIT: usize = 10;

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMetrics {
	pub limit: usize,
	pub active: usize,
	pub peak: usize,
	pub enqueued: u64,
	pub processed: u64,
	pub average_wait_ms: u64,
}

pub struct ConcurrencyPool {
	semaphore: Arc<Semaphore>,
	limit: usize,
	active: AtomicUsize,
	peak: AtomicUsize,
	enqueued: AtomicU64,
	processed: AtomicU64,
	total_wait_ms: AtomicU64,
}

impl ConcurrencyPool {
	pub fn new(limit: usize) -> Self {
		let limit = limit.max(1);
		Self {
			semaphore: Arc::new(Semaphore::new(limit)),
			limit,
			active: AtomicUsize::new(0),
			peak: AtomicUsize::new(0),
			enqueued: AtomicU64::new(0),
			processed: AtomicU64::new(0),
			total_wait_ms: AtomicU64::new(0),
		}
	}

	/// Runs `task` once a slot frees up. Waiters are served in
	/// submission order.
	pub async fn run<F, T>(&self, task: F) -> T
	where
		F: Future<Output = T>,
	{
		self.enqueued.fetch_add(1, Ordering::Relaxed);
		let queued_at = Instant::now();
		// The semaphore is owned by the pool and never closed.
		let _permit = self
			.semaphore
			.acquire()
			.await
			.expect("pool semaphore closed");
		let waited_ms = queued_at.elapsed().as_millis() as u64;
		self.total_wait_ms.fetch_add(waited_ms, Ordering::Relaxed);

		let now_active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
		self.peak.fetch_max(now_active, Ordering::Relaxed);
		trace!(active = now_active, waited_ms, "pool slot acquired");

		let result = task.await;

		self.active.fetch_sub(1, Ordering::Relaxed);
		self.processed.fetch_add(1, Ordering::Relaxed);
		result
	}

	pub fn metrics(&self) -> PoolMetrics {
		let processed = self.processed.load(Ordering::Relaxed);
		let total_wait_ms = self.total_wait_ms.load(Ordering::Relaxed);
		PoolMetrics {
			limit: self.limit,
			active: self.active.load(Ordering::Relaxed),
			peak: self.peak.load(Ordering::Relaxed),
			enqueued: self.enqueued.load(Ordering::Relaxed),
			processed,
			average_wait_ms: if processed == 0 { 0 } else { total_wait_ms / processed },
		}
	}
}

impl Default for ConcurrencyPool {
	fn default() -> Self {
		Self::new(DEFAULT_POOL_LIMIT)
	}
}
