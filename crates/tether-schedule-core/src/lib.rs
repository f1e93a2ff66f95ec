// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule expressions for tether resource tasks.
//!
//! Every recurring task (sync, status poll, run) carries a schedule
//! expression such as `"~00:00-06:00@1h mon-fri"`. This crate provides:
//!
//! - [`Schedule`]: a parsed expression, built once at configuration time
//! - [`Schedule::test`]: may the task run at this instant, and after what
//!   jitter delay
//! - [`Schedule::next`]: the next instant the expression allows, taking the
//!   last run and exclusion clauses into account
//!
//! # Usage
//!
//! ```
//! use chrono::NaiveDate;
//! use tether_schedule_core::{NextOptions, Schedule};
//!
//! let schedule = Schedule::parse("09:00-09:20").unwrap();
//! let reference = NaiveDate::from_ymd_opt(2015, 2, 27)
//! 	.unwrap()
//! 	.and_hms_opt(10, 0, 0)
//! 	.unwrap();
//!
//! assert!(schedule.test(reference).is_err());
//!
//! let next = schedule
//! 	.next(NextOptions::at(reference))
//! 	.unwrap()
//! 	.expect("an occurrence within the search bound");
//! assert_eq!(next.at.to_string(), "2015-02-28 09:00:00");
//! ```

pub mod calendar;
pub mod error;
pub mod expr;
pub mod jitter;
mod planner;
pub mod schedule;
pub mod timerange;

pub use calendar::{last_iso_week, month_days, resolve, Universe};
pub use error::{Result, ScheduleError};
pub use expr::{Day, ExprData, ExprDataset};
pub use jitter::{JitterSource, NoJitter, ThreadJitter};
pub use schedule::{NextOptions, Occurrence, Schedule};
pub use timerange::Timerange;
