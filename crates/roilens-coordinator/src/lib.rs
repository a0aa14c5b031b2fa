// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache coordinator for the ROI execution dashboard.
//!
//! Owns the fetch and store workers, decides per job whether cached
//! data suffices or which gaps to fetch, and keeps an in-memory ROI
//! status registry plus persisted dashboard settings.

pub mod coordinator;
pub mod error;
pub mod registry;
pub mod settings;

pub use coordinator::{
	CacheCoordinator, CleanupOutcome, CoordinatorConfig, HealthReport, CACHE_TTL_HOURS,
	CLEANUP_INTERVAL_HOURS, FRESHNESS_HOURS,
};
pub use error::{CoordinatorError, Result};
pub use registry::RoiRegistry;
pub use settings::{Settings, SettingsStore, DEFAULT_HOURLY_COST, DEFAULT_QUERY_MAX_DAYS};
