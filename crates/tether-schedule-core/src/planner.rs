// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Forward search for the next allowed instant.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use tracing::trace;

use crate::calendar::month_days;
use crate::expr::{ExprData, ExprDataset};
use crate::schedule::Occurrence;
use crate::timerange;

/// Upper bound on exclusion shifts within one day. Each shift moves at
/// least one second forward.
const MAX_DRIFTS_PER_DAY: usize = 86_400;

/// Outcome of evaluating one clause from a start instant within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
	Accept(Occurrence),
	NextDay,
}

/// Outcome of validating an accepted instant against the exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exclusion {
	Clear,
	Drift(NaiveDateTime),
	NextDay,
}

pub(crate) fn next(
	dataset: &ExprDataset,
	reference: NaiveDateTime,
	last: Option<NaiveDateTime>,
) -> Option<Occurrence> {
	let mut best: Option<Occurrence> = None;
	for clause in dataset.inclusions() {
		let Some(found) = next_for_clause(clause, dataset, reference, last) else {
			continue;
		};
		if best.map_or(true, |b| found.at < b.at) {
			best = Some(found);
		}
	}
	best
}

fn next_for_clause(
	clause: &ExprData,
	dataset: &ExprDataset,
	reference: NaiveDateTime,
	last: Option<NaiveDateTime>,
) -> Option<Occurrence> {
	let ref_date = reference.date();
	for year in ref_date.year()..=ref_date.year() + 1 {
		for &month in &clause.months {
			let same_month = year == ref_date.year() && month == ref_date.month();
			if year == ref_date.year() && month < ref_date.month() {
				continue;
			}
			let first_day = if same_month { ref_date.day() } else { 1 };
			for day in first_day..=month_days(year, month) {
				let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
					continue;
				};
				let start = if date == ref_date {
					reference
				} else {
					date.and_time(NaiveTime::MIN)
				};
				if let Some(found) = search_day(clause, dataset, start, last) {
					return Some(found);
				}
			}
		}
	}
	trace!(clause = %clause.raw, reference = %reference, "no occurrence within search bound");
	None
}

/// Find the first instant of `start`'s day, at or after `start`, allowed by
/// the clause and clear of exclusions.
fn search_day(
	clause: &ExprData,
	dataset: &ExprDataset,
	mut start: NaiveDateTime,
	last: Option<NaiveDateTime>,
) -> Option<Occurrence> {
	for _ in 0..MAX_DRIFTS_PER_DAY {
		let candidate = match step(clause, start, last) {
			Step::Accept(candidate) => candidate,
			Step::NextDay => return None,
		};
		match exclusion(dataset, candidate.at) {
			Exclusion::Clear => return Some(candidate),
			Exclusion::Drift(to) => {
				trace!(clause = %clause.raw, from = %candidate.at, to = %to, "excluded, drifting");
				start = to;
			}
			Exclusion::NextDay => return None,
		}
	}
	None
}

fn step(clause: &ExprData, start: NaiveDateTime, last: Option<NaiveDateTime>) -> Step {
	if clause.reject_date(start.date()).is_some() {
		return Step::NextDay;
	}
	match timerange::earliest_on_day(&clause.timeranges, start, last) {
		Some((at, tr)) => Step::Accept(Occurrence {
			at,
			interval: tr.interval,
		}),
		None => Step::NextDay,
	}
}

fn exclusion(dataset: &ExprDataset, at: NaiveDateTime) -> Exclusion {
	let Some(remaining) = dataset.excluded_for(at) else {
		return Exclusion::Clear;
	};
	let shifted = i64::try_from(remaining.as_secs())
		.ok()
		.and_then(TimeDelta::try_seconds)
		.and_then(|delta| at.checked_add_signed(delta));
	match shifted {
		Some(to) if to.date() == at.date() => Exclusion::Drift(to),
		_ => Exclusion::NextDay,
	}
}
