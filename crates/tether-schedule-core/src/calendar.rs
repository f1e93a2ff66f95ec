// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Calendar token resolution.
//!
//! Turns symbolic tokens such as `mon-fri`, `nov-feb` or `*%2+1` into the
//! set of integers they denote within a universe (weekdays, ISO weeks,
//! months).

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use crate::error::{Result, ScheduleError};

const MONTH_NAMES: &[(&str, u32)] = &[
	("jan", 1),
	("january", 1),
	("feb", 2),
	("february", 2),
	("mar", 3),
	("march", 3),
	("apr", 4),
	("april", 4),
	("may", 5),
	("jun", 6),
	("june", 6),
	("jul", 7),
	("july", 7),
	("aug", 8),
	("august", 8),
	("sep", 9),
	("september", 9),
	("oct", 10),
	("october", 10),
	("nov", 11),
	("november", 11),
	("dec", 12),
	("december", 12),
];

const WEEKDAY_NAMES: &[(&str, u32)] = &[
	("mon", 1),
	("monday", 1),
	("tue", 2),
	("tuesday", 2),
	("wed", 3),
	("wednesday", 3),
	("thu", 4),
	("thursday", 4),
	("fri", 5),
	("friday", 5),
	("sat", 6),
	("saturday", 6),
	("sun", 7),
	("sunday", 7),
];

/// The set of values a calendar field can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Universe {
	pub name: &'static str,
	pub min: u32,
	pub max: u32,
	names: &'static [(&'static str, u32)],
	modulo: bool,
}

impl Universe {
	/// Weekdays, 1 = Monday through 7 = Sunday.
	pub const WEEKDAYS: Universe = Universe {
		name: "weekday",
		min: 1,
		max: 7,
		names: WEEKDAY_NAMES,
		modulo: false,
	};

	/// ISO-8601 week numbers.
	///
	/// Week 53 only exists in long years, so including it in every year's
	/// universe never matches a date it should not.
	pub const WEEKS: Universe = Universe {
		name: "week",
		min: 1,
		max: 53,
		names: &[],
		modulo: true,
	};

	pub const MONTHS: Universe = Universe {
		name: "month",
		min: 1,
		max: 12,
		names: MONTH_NAMES,
		modulo: true,
	};

	pub fn all(&self) -> BTreeSet<u32> {
		(self.min..=self.max).collect()
	}

	fn lookup(&self, token: &str) -> Result<u32> {
		let token = token.trim().to_ascii_lowercase();
		if let Ok(value) = token.parse::<u32>() {
			if (self.min..=self.max).contains(&value) {
				return Ok(value);
			}
			return Err(ScheduleError::invalid(format!(
				"{} '{token}' out of range {}-{}",
				self.name, self.min, self.max
			)));
		}
		self.names
			.iter()
			.find(|(name, _)| *name == token)
			.map(|(_, value)| *value)
			.ok_or_else(|| ScheduleError::invalid(format!("unknown {} name '{token}'", self.name)))
	}
}

/// Resolve a calendar expression against a universe.
///
/// `*` and the empty string denote the whole universe. Comma separated
/// sub-specs are unioned, `low-high` ranges wrap through the universe
/// maximum when `low > high`, and a trailing `%n` or `%n+shift` keeps the
/// values where `(v + shift) mod n == 0`.
pub fn resolve(spec: &str, universe: &Universe) -> Result<BTreeSet<u32>> {
	let spec = spec.trim();
	let (base, modulo) = match spec.split_once('%') {
		Some((base, modulo)) => (base, Some(modulo)),
		None => (spec, None),
	};

	let mut values = resolve_base(base, universe)?;

	if let Some(modulo) = modulo {
		if !universe.modulo {
			return Err(ScheduleError::invalid(format!(
				"modulo not supported on {} expression '{spec}'",
				universe.name
			)));
		}
		if modulo.contains('%') {
			return Err(ScheduleError::invalid(format!(
				"only one '%' allowed in '{spec}'"
			)));
		}
		let (divisor, shift) = parse_modulo(modulo, spec)?;
		values.retain(|value| (i64::from(*value) + shift).rem_euclid(divisor) == 0);
	}

	Ok(values)
}

fn resolve_base(base: &str, universe: &Universe) -> Result<BTreeSet<u32>> {
	if base.is_empty() || base == "*" {
		return Ok(universe.all());
	}

	let mut values = BTreeSet::new();
	for sub in base.split(',') {
		let bounds: Vec<&str> = sub.split('-').collect();
		match bounds.as_slice() {
			[single] if !single.trim().is_empty() => {
				values.insert(universe.lookup(single)?);
			}
			[low, high] => {
				let low = universe.lookup(low)?;
				let high = universe.lookup(high)?;
				if low <= high {
					values.extend(low..=high);
				} else {
					values.extend(low..=universe.max);
					values.extend(universe.min..=high);
				}
			}
			[_] => {
				return Err(ScheduleError::invalid(format!(
					"empty {} in '{base}'",
					universe.name
				)));
			}
			_ => {
				return Err(ScheduleError::invalid(format!(
					"too many '-' in {} range '{sub}'",
					universe.name
				)));
			}
		}
	}
	Ok(values)
}

fn parse_modulo(modulo: &str, spec: &str) -> Result<(i64, i64)> {
	let (divisor, shift) = match modulo.split_once('+') {
		Some((divisor, shift)) => (divisor, Some(shift)),
		None => (modulo, None),
	};

	let divisor: i64 = divisor
		.trim()
		.parse()
		.map_err(|_| ScheduleError::invalid(format!("bad modulo '{divisor}' in '{spec}'")))?;
	if divisor <= 0 {
		return Err(ScheduleError::invalid(format!(
			"modulo must be positive in '{spec}'"
		)));
	}

	let shift: i64 = match shift {
		Some(shift) => shift
			.trim()
			.parse()
			.map_err(|_| ScheduleError::invalid(format!("bad modulo shift '{shift}' in '{spec}'")))?,
		None => 0,
	};

	Ok((divisor, shift))
}

/// Number of days in a month, leap-year aware. Returns 0 for an invalid
/// month.
pub fn month_days(year: i32, month: u32) -> u32 {
	let (next_year, next_month) = if month == 12 {
		(year + 1, 1)
	} else {
		(year, month + 1)
	};
	match (
		NaiveDate::from_ymd_opt(year, month, 1),
		NaiveDate::from_ymd_opt(next_year, next_month, 1),
	) {
		(Some(first), Some(next)) => (next - first).num_days() as u32,
		_ => 0,
	}
}

/// The last ISO week number of a year: 52 or 53.
///
/// December 28th always falls in the last ISO week of its year, unlike
/// December 31st which may already belong to week 1 of the next year.
pub fn last_iso_week(year: i32) -> u32 {
	NaiveDate::from_ymd_opt(year, 12, 28)
		.map(|date| date.iso_week().week())
		.unwrap_or(52)
}

/// Occurrences of `weekday` (1 = Monday) in a month.
pub(crate) fn weekday_occurrences(year: i32, month: u32, weekday: u32) -> u32 {
	let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
		return 0;
	};
	let first_weekday = first.weekday().number_from_monday();
	let first_match = 1 + (weekday + 7 - first_weekday) % 7;
	let len = month_days(year, month);
	if first_match > len {
		return 0;
	}
	(len - first_match) / 7 + 1
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn set(values: &[u32]) -> BTreeSet<u32> {
		values.iter().copied().collect()
	}

	#[test]
	fn test_star_and_empty_resolve_to_universe() {
		assert_eq!(resolve("*", &Universe::MONTHS).unwrap(), Universe::MONTHS.all());
		assert_eq!(resolve("", &Universe::WEEKDAYS).unwrap(), set(&[1, 2, 3, 4, 5, 6, 7]));
	}

	#[test]
	fn test_names_are_case_insensitive() {
		assert_eq!(resolve("Mon", &Universe::WEEKDAYS).unwrap(), set(&[1]));
		assert_eq!(resolve("FRIDAY", &Universe::WEEKDAYS).unwrap(), set(&[5]));
		assert_eq!(resolve("September", &Universe::MONTHS).unwrap(), set(&[9]));
	}

	#[test]
	fn test_union_and_ranges() {
		assert_eq!(
			resolve("mon-wed,sat", &Universe::WEEKDAYS).unwrap(),
			set(&[1, 2, 3, 6])
		);
		assert_eq!(resolve("10-12", &Universe::WEEKS).unwrap(), set(&[10, 11, 12]));
	}

	#[test]
	fn test_range_wraps_through_year_end() {
		assert_eq!(
			resolve("nov-feb", &Universe::MONTHS).unwrap(),
			set(&[1, 2, 11, 12])
		);
		assert_eq!(resolve("sat-mon", &Universe::WEEKDAYS).unwrap(), set(&[1, 6, 7]));
	}

	#[test]
	fn test_modulo_filters() {
		assert_eq!(
			resolve("*%2", &Universe::MONTHS).unwrap(),
			set(&[2, 4, 6, 8, 10, 12])
		);
		assert_eq!(
			resolve("*%2+1", &Universe::MONTHS).unwrap(),
			set(&[1, 3, 5, 7, 9, 11])
		);
		assert_eq!(resolve("%6", &Universe::MONTHS).unwrap(), set(&[6, 12]));
		assert_eq!(resolve("jan-jun%3", &Universe::MONTHS).unwrap(), set(&[3, 6]));
	}

	#[test]
	fn test_invalid_tokens() {
		assert!(resolve("foo", &Universe::MONTHS).unwrap_err().is_invalid());
		assert!(resolve("13", &Universe::MONTHS).unwrap_err().is_invalid());
		assert!(resolve("0", &Universe::WEEKDAYS).unwrap_err().is_invalid());
		assert!(resolve("jan-feb-mar", &Universe::MONTHS).unwrap_err().is_invalid());
		assert!(resolve("*%2%3", &Universe::MONTHS).unwrap_err().is_invalid());
		assert!(resolve("*%x", &Universe::MONTHS).unwrap_err().is_invalid());
		assert!(resolve("*%2+y", &Universe::MONTHS).unwrap_err().is_invalid());
		assert!(resolve("*%0", &Universe::MONTHS).unwrap_err().is_invalid());
		assert!(resolve("mon%2", &Universe::WEEKDAYS).unwrap_err().is_invalid());
		assert!(resolve("mon,,tue", &Universe::WEEKDAYS).unwrap_err().is_invalid());
	}

	#[test]
	fn test_invalid_message_names_token() {
		let err = resolve("jan,foo", &Universe::MONTHS).unwrap_err();
		assert!(err.to_string().contains("'foo'"), "{err}");
	}

	#[test]
	fn test_month_days() {
		assert_eq!(month_days(2024, 2), 29);
		assert_eq!(month_days(2023, 2), 28);
		assert_eq!(month_days(2000, 2), 29);
		assert_eq!(month_days(1900, 2), 28);
		assert_eq!(month_days(2015, 1), 31);
		assert_eq!(month_days(2015, 4), 30);
		assert_eq!(month_days(2015, 12), 31);
		assert_eq!(month_days(2015, 13), 0);
	}

	#[test]
	fn test_last_iso_week() {
		assert_eq!(last_iso_week(2015), 53);
		assert_eq!(last_iso_week(2020), 53);
		assert_eq!(last_iso_week(2023), 52);
		assert_eq!(last_iso_week(2024), 52);
	}

	#[test]
	fn test_weekday_occurrences() {
		// January 2015 starts on a Thursday and has 31 days.
		assert_eq!(weekday_occurrences(2015, 1, 4), 5);
		assert_eq!(weekday_occurrences(2015, 1, 6), 5);
		assert_eq!(weekday_occurrences(2015, 1, 7), 4);
		// February 2015 has exactly four of each weekday.
		for weekday in 1..=7 {
			assert_eq!(weekday_occurrences(2015, 2, weekday), 4);
		}
	}

	proptest! {
		#[test]
		fn month_days_matches_last_valid_date(year in 1900i32..2200, month in 1u32..=12) {
			let len = month_days(year, month);
			prop_assert!(NaiveDate::from_ymd_opt(year, month, len).is_some());
			prop_assert!(NaiveDate::from_ymd_opt(year, month, len + 1).is_none());
		}

		#[test]
		fn resolved_values_stay_in_universe(low in 1u32..=12, high in 1u32..=12) {
			let values = resolve(&format!("{low}-{high}"), &Universe::MONTHS).unwrap();
			prop_assert!(values.iter().all(|v| (1..=12).contains(v)));
			prop_assert!(values.contains(&low));
			prop_assert!(values.contains(&high));
		}
	}
}
