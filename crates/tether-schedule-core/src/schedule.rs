// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The schedule handle consulted by resource tasks.

use std::fmt;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ScheduleError};
use crate::expr::ExprDataset;
use crate::jitter::{JitterSource, ThreadJitter};
use crate::planner;

/// A parsed schedule expression.
///
/// Parsing happens once, in [`Schedule::new`]. A parse error is kept on
/// the value and returned by every evaluation, so a broken expression keeps
/// failing the same way until its configuration is replaced.
#[derive(Debug, Clone)]
pub struct Schedule {
	raw: String,
	parsed: Result<ExprDataset>,
}

/// Inputs of [`Schedule::next`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NextOptions {
	/// Search from this instant. Defaults to the local wall clock now.
	pub reference: Option<NaiveDateTime>,
	/// Previous execution, for interval enforcement. `None` means never run.
	pub last: Option<NaiveDateTime>,
}

impl NextOptions {
	pub fn at(reference: NaiveDateTime) -> Self {
		Self {
			reference: Some(reference),
			last: None,
		}
	}

	pub fn with_last(mut self, last: NaiveDateTime) -> Self {
		self.last = Some(last);
		self
	}
}

/// The next allowed execution and the interval of the window allowing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
	pub at: NaiveDateTime,
	pub interval: Duration,
}

impl Schedule {
	pub fn new(raw: impl Into<String>) -> Self {
		let raw = raw.into();
		let parsed = ExprDataset::parse(&raw);
		if let Err(e) = &parsed {
			debug!(raw = %raw, error = %e, "schedule expression rejected");
		}
		Self { raw, parsed }
	}

	/// Like [`Schedule::new`], but fail right away on an invalid expression.
	pub fn parse(raw: impl Into<String>) -> Result<Self> {
		let schedule = Self::new(raw);
		schedule.dataset()?;
		Ok(schedule)
	}

	pub fn raw(&self) -> &str {
		&self.raw
	}

	pub fn dataset(&self) -> Result<&ExprDataset> {
		self.parsed.as_ref().map_err(Clone::clone)
	}

	/// The expression never allows anything: empty, or exclusions only.
	pub fn is_never(&self) -> bool {
		self.parsed
			.as_ref()
			.is_ok_and(|dataset| dataset.inclusions().next().is_none())
	}

	/// May the task run at `tm`, and after what jitter delay.
	pub fn test(&self, tm: NaiveDateTime) -> Result<Duration> {
		self.test_with(tm, None, &mut ThreadJitter)
	}

	/// Like [`Schedule::test`], also enforcing each window's minimum
	/// interval since `last`.
	pub fn test_with_last(&self, tm: NaiveDateTime, last: NaiveDateTime) -> Result<Duration> {
		self.test_with(tm, Some(last), &mut ThreadJitter)
	}

	/// Evaluate the inclusion clauses at `tm`, drawing jitter from `jitter`.
	///
	/// Exclusion clauses are not consulted; see [`Schedule::check`].
	pub fn test_with(
		&self,
		tm: NaiveDateTime,
		last: Option<NaiveDateTime>,
		jitter: &mut dyn JitterSource,
	) -> Result<Duration> {
		let dataset = self.dataset()?;
		let mut reasons = Vec::new();
		for clause in dataset.inclusions() {
			match clause.test(tm, last, jitter) {
				Ok(delay) => return Ok(delay),
				Err(ScheduleError::NotAllowed { reasons: clause_reasons }) => {
					reasons.extend(clause_reasons)
				}
				Err(e) => return Err(e),
			}
		}
		if reasons.is_empty() {
			reasons.push("no inclusion clause".to_string());
		}
		Err(ScheduleError::NotAllowed { reasons })
	}

	/// The combined decision: an inclusion clause allows `tm` and no
	/// exclusion clause matches it.
	pub fn check(
		&self,
		tm: NaiveDateTime,
		last: Option<NaiveDateTime>,
		jitter: &mut dyn JitterSource,
	) -> Result<Duration> {
		let delay = self.test_with(tm, last, jitter)?;
		match self.dataset()?.excluded_for(tm) {
			Some(remaining) => Err(ScheduleError::Excluded { remaining }),
			None => Ok(delay),
		}
	}

	/// The first instant at or after the reference that the schedule allows
	/// and no exclusion denies.
	///
	/// The search covers the rest of the reference year and the following
	/// year. `Ok(None)` means nothing was found within that bound.
	pub fn next(&self, options: NextOptions) -> Result<Option<Occurrence>> {
		let dataset = self.dataset()?;
		let reference = options
			.reference
			.unwrap_or_else(|| Local::now().naive_local());
		Ok(planner::next(dataset, reference, options.last))
	}
}

impl fmt::Display for Schedule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.raw)
	}
}
