// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted dashboard settings.
//!
//! Stored as a single JSON document, written atomically via a temp file
//! rename so a crash mid-write never leaves a torn settings file. A
//! missing or unreadable file falls back to defaults rather than
//! failing the dashboard.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;

pub const DEFAULT_QUERY_MAX_DAYS: u64 = 10;
pub const DEFAULT_HOURLY_COST: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
	/// How many days of executions a default query covers.
	pub query_max: u64,
	/// Dollar value of one saved hour, used by the dashboard totals.
	pub hourly_cost: f64,
	/// Whether jobs without any ROI signal are listed.
	pub show_no_roi: bool,
	/// Set once the initial full cache build has completed; later loads
	/// only top up recent days.
	pub initial_cache_complete: bool,
	/// When the initial cache build finished.
	pub cache_timestamp: Option<DateTime<Utc>>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			query_max: DEFAULT_QUERY_MAX_DAYS,
			hourly_cost: DEFAULT_HOURLY_COST,
			show_no_roi: false,
			initial_cache_complete: false,
			cache_timestamp: None,
		}
	}
}

pub struct SettingsStore {
	path: PathBuf,
	state: RwLock<Settings>,
}

impl SettingsStore {
	/// Loads settings from `path`, falling back to defaults when the
	/// file is missing or unreadable.
	pub async fn load(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let state = match tokio::fs::read(&path).await {
			Ok(bytes) => match serde_json::from_slice(&bytes) {
				Ok(settings) => settings,
				Err(err) => {
					warn!(path = %path.display(), error = %err, "settings file corrupt, using defaults");
					Settings::default()
				}
			},
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
			Err(err) => {
				warn!(path = %path.display(), error = %err, "settings file unreadable, using defaults");
				Settings::default()
			}
		};
		Self { path, state: RwLock::new(state) }
	}

	pub async fn get(&self) -> Settings {
		self.state.read().await.clone()
	}

	/// Applies `mutate` and persists the result atomically.
	pub async fn update<F>(&self, mutate: F) -> Result<Settings>
	where
		F: FnOnce(&mut Settings),
	{
		let mut state = self.state.write().await;
		mutate(&mut state);
		let snapshot = state.clone();
		write_atomic(&self.path, &snapshot).await?;
		debug!(path = %self.path.display(), "settings saved");
		Ok(snapshot)
	}
}

async fn write_atomic(path: &Path, settings: &Settings) -> Result<()> {
	if let Some(parent) = path.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}
	let tmp = path.with_extension("json.tmp");
	let bytes = serde_json::to_vec_pretty(settings)?;
	tokio::fs::write(&tmp, &bytes).await?;
	tokio::fs::rename(&tmp, path).await?;
	Ok(())
}
