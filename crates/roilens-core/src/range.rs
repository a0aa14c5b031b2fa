// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Date-range arithmetic and the cache-versus-fetch planner.
//!
//! Ranges are inclusive calendar-day windows. The planner decides, for a
//! requested window and whatever is already cached, which (if any) days
//! must be fetched from the server.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Execution;

/// Inclusive calendar-day window, `begin <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
	pub begin: NaiveDate,
	pub end: NaiveDate,
}

impl DateRange {
	/// Builds a range, swapping the bounds if they arrive reversed.
	pub fn new(begin: NaiveDate, end: NaiveDate) -> Self {
		if begin <= end {
			Self { begin, end }
		} else {
			Self { begin: end, end: begin }
		}
	}

	pub fn single(day: NaiveDate) -> Self {
		Self { begin: day, end: day }
	}

	/// Today's single-day range in UTC.
	pub fn today(now: DateTime<Utc>) -> Self {
		Self::single(now.date_naive())
	}

	/// The last `days` calendar days ending today, inclusive.
	pub fn last_days(days: u64, now: DateTime<Utc>) -> Self {
		let end = now.date_naive();
		let begin = end - Days::new(days.saturating_sub(1));
		Self { begin, end }
	}

	/// Smallest range covering both `self` and `other`.
	pub fn union(&self, other: &DateRange) -> DateRange {
		DateRange {
			begin: self.begin.min(other.begin),
			end: self.end.max(other.end),
		}
	}

	/// Whether `other` fits inside this range, allowing each bound to
	/// fall short by up to `tolerance_days`. Tolerance absorbs timezone
	/// drift between the clock that wrote the cache and the caller's.
	pub fn contains_with_tolerance(&self, other: &DateRange, tolerance_days: u64) -> bool {
		let flex = Days::new(tolerance_days);
		other.begin + flex >= self.begin && other.end <= self.end + flex
	}

	pub fn contains_day(&self, day: NaiveDate) -> bool {
		day >= self.begin && day <= self.end
	}
}

/// What to fetch for a requested window, given the cached coverage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
	/// Cache fully covers the request, no network needed.
	UseCache,
	/// Nothing cached for this job, fetch the whole requested window.
	FetchFull,
	/// Cache covers the middle; fetch days before and/or after it.
	FetchDelta {
		older: Option<DateRange>,
		newer: Option<DateRange>,
	},
	/// Entry exists but carries no coverage metadata and has gone stale;
	/// refresh a short recent window instead of guessing.
	FetchRecent(DateRange),
}

/// Cached coverage for one job as seen by the planner.
#[derive(Debug, Clone, Copy)]
pub struct CachedWindow {
	/// Covered days, `None` for legacy entries written without range
	/// metadata.
	pub range: Option<DateRange>,
	pub age_hours: i64,
}

/// Decides what to fetch for `requested` given the cached coverage.
///
/// A gap past the cached end is only fetched once the entry is at least
/// `freshness_hours` old; a just-written cache is trusted for the tail so
/// repeated dashboard loads do not hammer the server for today's data.
pub fn plan_fetch(
	requested: DateRange,
	cached: Option<CachedWindow>,
	freshness_hours: i64,
	today: NaiveDate,
) -> FetchPlan {
	let Some(window) = cached else {
		return FetchPlan::FetchFull;
	};

	match window.range {
		Some(covered) => {
			if covered.contains_with_tolerance(&requested, 1) {
				return FetchPlan::UseCache;
			}
			let older = (requested.begin < covered.begin).then(|| DateRange {
				begin: requested.begin,
				end: covered.begin - Days::new(1),
			});
			let newer = (requested.end > covered.end && window.age_hours >= freshness_hours)
				.then(|| DateRange {
					begin: covered.end + Days::new(1),
					end: requested.end,
				});
			if older.is_none() && newer.is_none() {
				FetchPlan::UseCache
			} else {
				FetchPlan::FetchDelta { older, newer }
			}
		}
		None => {
			if window.age_hours >= freshness_hours {
				FetchPlan::FetchRecent(DateRange {
					begin: today - Days::new(1),
					end: requested.end.max(today),
				})
			} else {
				FetchPlan::UseCache
			}
		}
	}
}

/// Keeps only executions whose start day falls inside `range`.
pub fn filter_by_range(executions: &[Execution], range: DateRange) -> Vec<Execution> {
	executions
		.iter()
		.filter(|e| range.contains_day(e.started_at.date_naive()))
		.cloned()
		.collect()
}
