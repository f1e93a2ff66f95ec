// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Clock-time windows within a day.

use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::jitter::JitterSource;

const DAY_SECS: u32 = 86_400;

/// A window of the day, `begin` and `end` inclusive, as offsets from
/// midnight. `begin > end` denotes a window crossing midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timerange {
	pub begin: Duration,
	pub end: Duration,
	/// Minimum spacing between two executions.
	pub interval: Duration,
	/// Eligible for a jitter delay.
	pub probabilistic: bool,
}

impl Timerange {
	/// The whole day, at most once a day.
	pub fn full_day() -> Self {
		Self {
			begin: Duration::ZERO,
			end: Duration::from_secs(u64::from(DAY_SECS - 1)),
			interval: Duration::from_secs(u64::from(DAY_SECS)),
			probabilistic: false,
		}
	}

	pub fn wraps(&self) -> bool {
		self.begin > self.end
	}

	fn begin_secs(&self) -> u32 {
		self.begin.as_secs() as u32
	}

	fn end_secs(&self) -> u32 {
		self.end.as_secs() as u32
	}

	/// Window length, counting both bounds.
	pub fn length(&self) -> Duration {
		let (begin, end) = (self.begin_secs(), self.end_secs());
		let secs = if begin > end {
			DAY_SECS - begin + end + 1
		} else {
			end - begin + 1
		};
		Duration::from_secs(u64::from(secs))
	}

	pub fn includes(&self, tm: NaiveDateTime) -> bool {
		self.includes_secs(tm.num_seconds_from_midnight())
	}

	fn includes_secs(&self, secs: u32) -> bool {
		let (begin, end) = (self.begin_secs(), self.end_secs());
		if begin <= end {
			begin <= secs && secs <= end
		} else {
			secs >= begin || secs <= end
		}
	}

	/// The window opens at or after `tm`'s time of day.
	pub fn after(&self, tm: NaiveDateTime) -> bool {
		self.begin_secs() >= tm.num_seconds_from_midnight()
	}

	/// Seconds from `secs` to the window end, following the window past
	/// midnight when it wraps.
	fn secs_to_end(&self, secs: u32) -> i64 {
		let (begin, end) = (i64::from(self.begin_secs()), i64::from(self.end_secs()));
		let mut now = i64::from(secs);
		let mut end_abs = end;
		if begin > end {
			end_abs += i64::from(DAY_SECS);
			if now <= end {
				now += i64::from(DAY_SECS);
			}
		}
		end_abs - now
	}

	/// Time left until the window closes, counted so that `tm + remaining`
	/// is the first instant past the window.
	pub fn remaining(&self, tm: NaiveDateTime) -> Duration {
		let secs = self.secs_to_end(tm.num_seconds_from_midnight()) + 1;
		Duration::from_secs(secs.max(0) as u64)
	}

	/// Jitter delay for an execution at `tm`.
	///
	/// Zero unless the window is probabilistic and expected to fire once per
	/// cycle; otherwise uniform over the time left in the window.
	pub fn delay(&self, tm: NaiveDateTime, jitter: &mut dyn JitterSource) -> Duration {
		if !self.probabilistic {
			return Duration::ZERO;
		}
		let remaining = self.secs_to_end(tm.num_seconds_from_midnight()) - 1;
		if remaining < 1 || self.interval < self.length() {
			return Duration::ZERO;
		}
		Duration::from_secs_f64(remaining as f64 * jitter.unit())
	}

	/// Apply the minimum interval to a candidate instant inside this window.
	///
	/// Returns the candidate itself when far enough from `last`, the
	/// shifted instant `last + interval` when it still falls in this window
	/// on the same day, and `None` when the window is spent for this cycle.
	pub fn eligible_from(
		&self,
		candidate: NaiveDateTime,
		last: Option<NaiveDateTime>,
	) -> Option<NaiveDateTime> {
		let Some(last) = last else {
			return Some(candidate);
		};
		if elapsed_at_least(candidate, last, self.interval) {
			return Some(candidate);
		}
		let shifted = last.checked_add_signed(delta(self.interval)?)?;
		(shifted.date() == candidate.date() && shifted >= candidate && self.includes(shifted))
			.then_some(shifted)
	}

	fn opening_on(&self, tm: NaiveDateTime) -> NaiveDateTime {
		tm.date().and_time(NaiveTime::MIN) + TimeDelta::seconds(i64::from(self.begin_secs()))
	}
}

pub(crate) fn elapsed_at_least(tm: NaiveDateTime, last: NaiveDateTime, interval: Duration) -> bool {
	(tm - last).to_std().is_ok_and(|elapsed| elapsed >= interval)
}

fn delta(duration: Duration) -> Option<TimeDelta> {
	i64::try_from(duration.as_secs())
		.ok()
		.and_then(TimeDelta::try_seconds)
}

/// Windows in evaluation order: tightest interval first, then earliest
/// opening.
pub(crate) fn sorted(ranges: &[Timerange]) -> Vec<Timerange> {
	let mut sorted = ranges.to_vec();
	sorted.sort_by_key(|tr| (tr.interval, tr.begin));
	sorted
}

/// The window allowing an execution exactly at `tm`.
pub(crate) fn open_at(
	ranges: &[Timerange],
	tm: NaiveDateTime,
	last: Option<NaiveDateTime>,
) -> std::result::Result<Timerange, String> {
	let mut too_soon = false;
	for tr in sorted(ranges) {
		if !tr.includes(tm) {
			continue;
		}
		match last {
			Some(last) if !elapsed_at_least(tm, last, tr.interval) => too_soon = true,
			_ => return Ok(tr),
		}
	}
	if too_soon {
		Err("last run too recent for the interval".to_string())
	} else {
		Err("outside time ranges".to_string())
	}
}

/// The earliest instant at or after `start`, on the same day, that some
/// window accepts.
pub(crate) fn earliest_on_day(
	ranges: &[Timerange],
	start: NaiveDateTime,
	last: Option<NaiveDateTime>,
) -> Option<(NaiveDateTime, Timerange)> {
	let mut best: Option<(NaiveDateTime, Timerange)> = None;
	for tr in sorted(ranges) {
		let open_now = tr.includes(start).then_some(start);
		// A wrapping window still open from last night reopens this evening.
		let opening = (tr.after(start) && (open_now.is_none() || tr.wraps()))
			.then(|| tr.opening_on(start));
		let Some(at) = [open_now, opening]
			.into_iter()
			.flatten()
			.find_map(|candidate| tr.eligible_from(candidate, last))
		else {
			continue;
		};
		if best.map_or(true, |(found, _)| at < found) {
			best = Some((at, tr));
		}
	}
	best
}

/// Parse a comma separated timerange field.
pub(crate) fn parse_timeranges(field: &str) -> Result<Vec<Timerange>> {
	let mut ranges = Vec::new();
	for spec in field.split(',') {
		if let Some(tr) = parse_timerange(spec)? {
			ranges.push(tr);
		}
	}
	Ok(ranges)
}

/// Parse one `[~]window[@interval]` spec. `@0` disables the window.
fn parse_timerange(spec: &str) -> Result<Option<Timerange>> {
	let spec = spec.trim();
	let (probabilistic, rest) = match spec.strip_prefix('~') {
		Some(rest) => (true, rest),
		None => (false, spec),
	};

	let (window, interval) = match rest.split_once('@') {
		Some((_, interval)) if interval.contains('@') => {
			return Err(ScheduleError::invalid(format!("too many '@' in '{spec}'")));
		}
		Some((window, interval)) => (window, Some(parse_interval(interval)?)),
		None => (rest, None),
	};
	if interval == Some(Duration::ZERO) {
		return Ok(None);
	}

	let (begin, end) = match window {
		"" | "*" => (0, DAY_SECS - 1),
		window => match window.split_once('-') {
			Some((_, end)) if end.contains('-') => {
				return Err(ScheduleError::invalid(format!("too many '-' in '{spec}'")));
			}
			Some((begin, end)) => (parse_clock(begin)?, parse_clock(end)?),
			None => {
				let at = parse_clock(window)?;
				(at, at)
			}
		},
	};

	let mut tr = Timerange {
		begin: Duration::from_secs(u64::from(begin)),
		end: Duration::from_secs(u64::from(end)),
		interval: Duration::ZERO,
		probabilistic,
	};
	let length = tr.length();
	tr.interval = interval.unwrap_or(length);
	if length <= Duration::from_secs(1) {
		tr.probabilistic = false;
	}
	Ok(Some(tr))
}

/// Parse `HH:MM[:SS]` into seconds since midnight.
fn parse_clock(clock: &str) -> Result<u32> {
	let invalid = || ScheduleError::invalid(format!("bad time '{clock}', expected HH:MM[:SS]"));
	let parts: Vec<&str> = clock.trim().split(':').collect();
	let (hours, minutes, seconds) = match parts.as_slice() {
		[h, m] => (*h, *m, "0"),
		[h, m, s] => (*h, *m, *s),
		_ => return Err(invalid()),
	};
	let hours: u32 = hours.parse().map_err(|_| invalid())?;
	let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
	let seconds: u32 = seconds.parse().map_err(|_| invalid())?;
	if hours > 23 || minutes > 59 || seconds > 59 {
		return Err(invalid());
	}
	Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Parse an interval: a bare integer counts minutes, anything else is a
/// duration such as `90s`, `2h` or `1h30m`.
fn parse_interval(interval: &str) -> Result<Duration> {
	let interval = interval.trim();
	if let Ok(minutes) = interval.parse::<u64>() {
		return minutes
			.checked_mul(60)
			.map(Duration::from_secs)
			.ok_or_else(|| ScheduleError::invalid(format!("interval '{interval}' too large")));
	}
	humantime::parse_duration(interval)
		.map_err(|e| ScheduleError::invalid(format!("bad interval '{interval}': {e}")))
}
