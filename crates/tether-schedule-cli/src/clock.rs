// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Conversions between absolute instants and wall-clock time in the
//! configured timezone.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const WALL_FORMATS: &[&str] = &[
	"%Y-%m-%d %H:%M:%S",
	"%Y-%m-%dT%H:%M:%S",
	"%Y-%m-%d %H:%M",
	"%Y-%m-%dT%H:%M",
];

pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now_wall(tz: Tz) -> NaiveDateTime {
	to_wall(Utc::now(), tz)
}

pub fn to_wall(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
	instant.with_timezone(&tz).naive_local()
}

/// Map a wall-clock time back to an instant. In a DST fold the earlier
/// instant is used.
pub fn to_utc(wall: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
	match tz.from_local_datetime(&wall).earliest() {
		Some(local) => Ok(local.with_timezone(&Utc)),
		None => bail!("{wall} does not exist in {tz}"),
	}
}

/// Parse a command-line time. RFC 3339 input carries its own offset and is
/// converted to `tz`; anything else is read as wall-clock time in `tz`.
pub fn parse_wall(input: &str, tz: Tz) -> Result<NaiveDateTime> {
	let input = input.trim();
	if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
		return Ok(to_wall(instant.with_timezone(&Utc), tz));
	}
	for format in WALL_FORMATS {
		if let Ok(wall) = NaiveDateTime::parse_from_str(input, format) {
			return Ok(wall);
		}
	}
	bail!("unrecognised time '{input}', expected e.g. '2015-02-27 10:00:00' or RFC 3339")
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;

	fn wall(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
		NaiveDate::from_ymd_opt(y, m, d)
			.unwrap()
			.and_hms_opt(h, min, s)
			.unwrap()
	}

	#[test]
	fn test_parse_wall_formats() {
		let tz = chrono_tz::UTC;
		assert_eq!(
			parse_wall("2015-02-27 10:00:00", tz).unwrap(),
			wall(2015, 2, 27, 10, 0, 0)
		);
		assert_eq!(
			parse_wall("2015-02-27T10:00", tz).unwrap(),
			wall(2015, 2, 27, 10, 0, 0)
		);
		assert!(parse_wall("yesterday", tz).is_err());
	}

	#[test]
	fn test_rfc3339_converted_to_zone() {
		let tz = chrono_tz::Europe::Paris;
		assert_eq!(
			parse_wall("2015-02-27T09:00:00Z", tz).unwrap(),
			wall(2015, 2, 27, 10, 0, 0)
		);
	}

	#[test]
	fn test_round_trip_through_utc() {
		let tz = chrono_tz::America::New_York;
		let local = wall(2015, 7, 1, 8, 30, 0);
		let instant = to_utc(local, tz).unwrap();
		assert_eq!(instant.to_rfc3339(), "2015-07-01T12:30:00+00:00");
		assert_eq!(to_wall(instant, tz), local);
	}

	#[test]
	fn test_spring_forward_gap_rejected() {
		// 02:30 does not exist in New York on 2015-03-08.
		let tz = chrono_tz::America::New_York;
		assert!(to_utc(wall(2015, 3, 8, 2, 30, 0), tz).is_err());
	}
}
