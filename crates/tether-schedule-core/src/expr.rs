// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parsed schedule clauses.
//!
//! A clause reads `[!]<timeranges> [<days> [<weeks> [<months>]]]`. A
//! schedule is either a single clause or a JSON array of clause strings.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::calendar::{resolve, weekday_occurrences, Universe};
use crate::error::{Result, ScheduleError};
use crate::jitter::JitterSource;
use crate::timerange::{self, Timerange};

/// A weekday, optionally pinned to its n-th occurrence in the month.
///
/// `monthday == 0` matches every such weekday, `n > 0` the n-th occurrence
/// and `n < 0` the n-th occurrence counted from the end of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
	pub weekday: u32,
	pub monthday: i32,
}

impl Day {
	/// Resolve a negative occurrence against a concrete month. Returns
	/// `None` when the month has fewer occurrences than requested.
	pub fn contextualize(&self, year: i32, month: u32) -> Option<Day> {
		if self.monthday >= 0 {
			return Some(*self);
		}
		let occurrences = weekday_occurrences(year, month, self.weekday) as i32;
		let monthday = occurrences + self.monthday + 1;
		(monthday >= 1).then_some(Day {
			weekday: self.weekday,
			monthday,
		})
	}

	/// Whether `date` matches this day. The day must already be
	/// contextualized for the month of `date`.
	fn matches(&self, date: NaiveDate) -> bool {
		if date.weekday().number_from_monday() != self.weekday {
			return false;
		}
		self.monthday == 0 || (date.day() - 1) / 7 + 1 == self.monthday as u32
	}
}

/// One parsed clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprData {
	pub timeranges: Vec<Timerange>,
	pub days: Vec<Day>,
	pub weeks: BTreeSet<u32>,
	pub months: BTreeSet<u32>,
	pub raw: String,
	pub exclude: bool,
}

impl ExprData {
	/// Parse one clause. Missing trailing fields default to `*`.
	pub fn parse(clause: &str) -> Result<Self> {
		let clause = clause.trim();
		let (exclude, body) = match clause.strip_prefix('!') {
			Some(body) => (true, body),
			None => (false, clause),
		};

		let fields: Vec<&str> = body.split_whitespace().collect();
		if fields.len() > 4 {
			return Err(ScheduleError::invalid(format!(
				"'{clause}' has {} fields, at most 4 allowed",
				fields.len()
			)));
		}
		let field = |index: usize| fields.get(index).copied().unwrap_or("*");

		let timeranges =
			timerange::parse_timeranges(field(0)).map_err(|e| e.in_field("timerange"))?;
		let days = parse_days(field(1)).map_err(|e| e.in_field("day"))?;
		let weeks = resolve(field(2), &Universe::WEEKS).map_err(|e| e.in_field("week"))?;
		let months = resolve(field(3), &Universe::MONTHS).map_err(|e| e.in_field("month"))?;

		Ok(Self {
			timeranges,
			days,
			weeks,
			months,
			raw: clause.to_string(),
			exclude,
		})
	}

	/// The days rule resolved against the month of `date`.
	pub fn contextualized_days(&self, date: NaiveDate) -> Vec<Day> {
		self.days
			.iter()
			.filter_map(|day| day.contextualize(date.year(), date.month()))
			.collect()
	}

	/// Why `date` is outside this clause's calendar, if it is.
	pub(crate) fn reject_date(&self, date: NaiveDate) -> Option<String> {
		if !self.months.contains(&date.month()) {
			return Some(format!("month {} not allowed", date.month()));
		}
		let week = date.iso_week().week();
		if !self.weeks.contains(&week) {
			return Some(format!("week {week} not allowed"));
		}
		if !self
			.contextualized_days(date)
			.iter()
			.any(|day| day.matches(date))
		{
			return Some(format!("day {} not allowed", date.format("%a %d")));
		}
		None
	}

	/// Evaluate this clause at `tm`, returning the jitter delay.
	pub(crate) fn test(
		&self,
		tm: NaiveDateTime,
		last: Option<NaiveDateTime>,
		jitter: &mut dyn JitterSource,
	) -> Result<Duration> {
		if let Some(reason) = self.reject_date(tm.date()) {
			return Err(ScheduleError::not_allowed(format!("'{}': {reason}", self.raw)));
		}
		let tr = timerange::open_at(&self.timeranges, tm, last)
			.map_err(|reason| ScheduleError::not_allowed(format!("'{}': {reason}", self.raw)))?;
		Ok(tr.delay(tm, jitter))
	}

	/// Time left before this clause stops matching `tm`, when it matches.
	/// Intervals do not apply: an exclusion holds for its whole window.
	pub(crate) fn matching_remaining(&self, tm: NaiveDateTime) -> Option<Duration> {
		if self.reject_date(tm.date()).is_some() {
			return None;
		}
		self.timeranges
			.iter()
			.filter(|tr| tr.includes(tm))
			.map(|tr| tr.remaining(tm))
			.max()
	}
}

/// All clauses of one schedule, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExprDataset(Vec<ExprData>);

impl ExprDataset {
	/// Parse a schedule. An empty string is the "never" schedule.
	pub fn parse(raw: &str) -> Result<Self> {
		let raw = raw.trim();
		if raw.is_empty() {
			return Ok(Self::default());
		}

		let clauses = match serde_json::from_str::<Vec<String>>(raw) {
			Ok(clauses) => clauses,
			Err(_) => vec![raw.to_string()],
		};

		let mut data = Vec::with_capacity(clauses.len());
		for clause in &clauses {
			if clause.trim().is_empty() {
				continue;
			}
			data.push(ExprData::parse(clause)?);
		}
		Ok(Self(data))
	}

	pub fn iter(&self) -> impl Iterator<Item = &ExprData> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn inclusions(&self) -> impl Iterator<Item = &ExprData> {
		self.0.iter().filter(|clause| !clause.exclude)
	}

	pub fn exclusions(&self) -> impl Iterator<Item = &ExprData> {
		self.0.iter().filter(|clause| clause.exclude)
	}

	/// Time left before every exclusion matching `tm` lifts, if any does.
	pub fn excluded_for(&self, tm: NaiveDateTime) -> Option<Duration> {
		self.exclusions()
			.filter_map(|clause| clause.matching_remaining(tm))
			.max()
	}
}

/// Parse a comma separated `<weekdays>[:<monthday>]` field.
fn parse_days(field: &str) -> Result<Vec<Day>> {
	let field = field.trim();
	if field.is_empty() || field == "*" {
		return Ok((1..=7)
			.map(|weekday| Day {
				weekday,
				monthday: 0,
			})
			.collect());
	}

	let mut days = Vec::new();
	for spec in field.split(',') {
		let (weekdays, monthday) = match spec.split_once(':') {
			Some((_, monthday)) if monthday.contains(':') => {
				return Err(ScheduleError::invalid(format!("too many ':' in '{spec}'")));
			}
			Some((weekdays, monthday)) => (weekdays, parse_monthday(monthday)?),
			None if spec.trim().is_empty() => {
				return Err(ScheduleError::invalid(format!("empty day in '{field}'")));
			}
			None => (spec, 0),
		};
		for weekday in resolve(weekdays, &Universe::WEEKDAYS)? {
			let day = Day { weekday, monthday };
			if !days.contains(&day) {
				days.push(day);
			}
		}
	}
	Ok(days)
}

fn parse_monthday(token: &str) -> Result<i32> {
	let monthday = match token.trim().to_ascii_lowercase().as_str() {
		"first" | "1st" => 1,
		"second" | "2nd" => 2,
		"third" | "3rd" => 3,
		"fourth" | "4th" => 4,
		"fifth" | "5th" => 5,
		"last" => -1,
		other => other
			.parse::<i32>()
			.map_err(|_| ScheduleError::invalid(format!("unknown monthday '{token}'")))?,
	};
	if !(-5..=5).contains(&monthday) {
		return Err(ScheduleError::invalid(format!(
			"monthday '{token}' out of range -5..5"
		)));
	}
	Ok(monthday)
}
