// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end scenarios through the public schedule surface.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tether_schedule_core::{NextOptions, NoJitter, Schedule, ScheduleError};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
	NaiveDate::from_ymd_opt(y, m, d)
		.unwrap()
		.and_hms_opt(h, min, s)
		.unwrap()
}

#[test]
fn empty_schedule_is_never() {
	let schedule = Schedule::new("");
	assert!(schedule.test(at(2015, 2, 27, 10, 0, 0)).unwrap_err().is_not_allowed());
	assert_eq!(
		schedule
			.next(NextOptions::at(at(2015, 2, 27, 10, 0, 0)))
			.unwrap(),
		None
	);
}

#[test]
fn daily_window_then_next_day() {
	let schedule = Schedule::parse("09:00-09:20").unwrap();
	let now = at(2015, 2, 27, 10, 0, 0);
	assert!(schedule.test(now).unwrap_err().is_not_allowed());

	let next = schedule
		.next(NextOptions::at(now).with_last(at(2015, 2, 27, 9, 5, 0)))
		.unwrap()
		.unwrap();
	assert_eq!(next.at, at(2015, 2, 28, 9, 0, 0));
}

#[test]
fn midnight_crossing_window() {
	let schedule = Schedule::parse("09:20-09:00").unwrap();
	assert!(schedule.test(at(2015, 2, 27, 10, 0, 0)).is_ok());
}

#[test]
fn friday_only() {
	let schedule = Schedule::parse("* fri").unwrap();
	assert!(schedule.test(at(2015, 10, 9, 10, 0, 0)).is_ok());
	assert!(schedule.test(at(2015, 10, 8, 10, 0, 0)).is_err());
}

#[test]
fn last_day_rule() {
	let schedule = Schedule::parse("* :last").unwrap();
	assert!(schedule.test(at(2015, 1, 31, 10, 0, 0)).is_ok());
}

#[test]
fn interval_in_minutes() {
	let schedule = Schedule::parse("@10").unwrap();
	let err = schedule
		.test_with_last(at(2015, 2, 27, 10, 0, 0), at(2015, 2, 27, 9, 52, 0))
		.unwrap_err();
	assert!(err.is_not_allowed());
}

#[test]
fn exclusion_precedence() {
	let schedule = Schedule::parse(r#"["~08:00-18:00 mon-fri", "!12:00-14:00 fri"]"#).unwrap();
	let friday_noon = at(2015, 10, 9, 12, 30, 0);

	// `test` answers for the inclusion windows alone.
	assert!(schedule.test(friday_noon).is_ok());

	match schedule.check(friday_noon, None, &mut NoJitter) {
		Err(ScheduleError::Excluded { remaining }) => {
			assert_eq!(remaining, Duration::from_secs(90 * 60 + 1));
		}
		other => panic!("expected Excluded, got {other:?}"),
	}

	let next = schedule
		.next(NextOptions::at(friday_noon))
		.unwrap()
		.unwrap();
	assert_eq!(next.at, at(2015, 10, 9, 14, 0, 1));
}

#[test]
fn dataset_introspection() {
	let schedule = Schedule::parse("~00:00-06:00@1h mon-fri 1-26 *%2").unwrap();
	let dataset = schedule.dataset().unwrap();
	assert_eq!(dataset.len(), 1);

	let clause = dataset.iter().next().unwrap();
	assert_eq!(clause.timeranges.len(), 1);
	assert!(clause.timeranges[0].probabilistic);
	assert_eq!(clause.timeranges[0].interval, Duration::from_secs(3600));
	assert_eq!(clause.days.len(), 5);
	assert_eq!(clause.weeks.len(), 26);
	assert_eq!(clause.months.iter().copied().collect::<Vec<_>>(), vec![2, 4, 6, 8, 10, 12]);

	let json = serde_json::to_value(dataset).unwrap();
	assert!(json.is_array());
}

#[test]
fn malformed_expressions_return_errors() {
	for raw in [
		"* * * * *",
		"24:00",
		"* monday-friday-sunday",
		"* * * jan%",
		"* * 0",
		"[\"09:00\", \"* xyz\"]",
		"~@",
	] {
		let schedule = Schedule::new(raw);
		let err = schedule.test(at(2015, 2, 27, 10, 0, 0)).unwrap_err();
		assert!(err.is_invalid(), "{raw}: {err}");
	}
}

#[test]
fn concurrent_evaluation() {
	let schedule = std::sync::Arc::new(Schedule::parse("~*@1h").unwrap());
	let handles: Vec<_> = (0..8)
		.map(|i| {
			let schedule = std::sync::Arc::clone(&schedule);
			std::thread::spawn(move || {
				let tm = at(2015, 2, 27, i, 0, 0);
				schedule.test(tm).is_ok()
			})
		})
		.collect();
	for handle in handles {
		assert!(handle.join().unwrap());
	}
}
