// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommand implementations. Output goes to the given writer; logs go to
//! stderr.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDateTime, TimeDelta};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use tether_schedule_config::ScheduleConfig;
use tether_schedule_core::{
	JitterSource, NextOptions, NoJitter, Occurrence, Schedule, ScheduleError, ThreadJitter,
};

use crate::clock::{self, DISPLAY_FORMAT};
use crate::state::LastRunStore;

/// What to evaluate: an expression given inline or a configured entry.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Target {
	/// Schedule expression, e.g. '~00:00-06:00 mon-fri'
	#[arg(conflicts_with = "entry", required_unless_present = "entry")]
	pub expression: Option<String>,

	/// Name of a configured entry
	#[arg(short, long)]
	pub entry: Option<String>,
}

/// Outcome of `test`, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Allowed,
	Denied,
}

pub struct Runtime {
	pub config: ScheduleConfig,
	pub tz: Tz,
}

impl Runtime {
	pub fn new(config: ScheduleConfig) -> Result<Self> {
		let tz = config.scheduler.tz()?;
		Ok(Self { config, tz })
	}

	fn schedule(&self, target: &Target) -> Result<Schedule> {
		match (&target.entry, &target.expression) {
			(Some(name), _) => Ok(self.config.entry(name)?.schedule()),
			(None, Some(raw)) => Ok(Schedule::new(raw.as_str())),
			(None, None) => bail!("either an expression or --entry is required"),
		}
	}

	fn wall(&self, at: Option<&str>) -> Result<NaiveDateTime> {
		match at {
			Some(input) => clock::parse_wall(input, self.tz),
			None => Ok(clock::now_wall(self.tz)),
		}
	}

	fn last_run(&self, target: &Target, last: Option<&str>) -> Result<Option<NaiveDateTime>> {
		if let Some(input) = last {
			return clock::parse_wall(input, self.tz).map(Some);
		}
		match &target.entry {
			Some(name) => Ok(self
				.store()
				.read(name)?
				.map(|instant| clock::to_wall(instant, self.tz))),
			None => Ok(None),
		}
	}

	fn jitter(&self) -> Box<dyn JitterSource> {
		if self.config.scheduler.jitter {
			Box::new(ThreadJitter)
		} else {
			Box::new(NoJitter)
		}
	}

	pub fn store(&self) -> LastRunStore {
		LastRunStore::new(&self.config.scheduler.state_dir)
	}
}

pub fn test(
	rt: &Runtime,
	target: &Target,
	at: Option<&str>,
	last: Option<&str>,
	inclusions_only: bool,
	out: &mut dyn Write,
) -> Result<Verdict> {
	let schedule = rt.schedule(target)?;
	let tm = rt.wall(at)?;
	let last = rt.last_run(target, last)?;
	let mut jitter = rt.jitter();

	let decision = if inclusions_only {
		schedule.test_with(tm, last, jitter.as_mut())
	} else {
		schedule.check(tm, last, jitter.as_mut())
	};
	debug!(schedule = %schedule, tm = %tm, ?last, ?decision, "evaluated schedule");

	match decision {
		Ok(delay) => {
			writeln!(out, "allowed, delay {}", format_duration(delay))?;
			Ok(Verdict::Allowed)
		}
		Err(ScheduleError::Invalid(message)) => bail!("invalid schedule '{schedule}': {message}"),
		Err(denied) => {
			writeln!(out, "{denied}")?;
			Ok(Verdict::Denied)
		}
	}
}

pub fn next(
	rt: &Runtime,
	target: &Target,
	at: Option<&str>,
	last: Option<&str>,
	count: usize,
	out: &mut dyn Write,
) -> Result<()> {
	let schedule = rt.schedule(target)?;
	let mut options = NextOptions {
		reference: Some(rt.wall(at)?),
		last: rt.last_run(target, last)?,
	};

	for _ in 0..count.max(1) {
		let Some(found) = schedule
			.next(options)
			.with_context(|| format!("invalid schedule '{schedule}'"))?
		else {
			writeln!(out, "no further occurrence")?;
			break;
		};
		writeln!(
			out,
			"{}  interval {}",
			found.at.format(DISPLAY_FORMAT),
			format_duration(found.interval)
		)?;
		options = NextOptions {
			reference: found.at.checked_add_signed(TimeDelta::seconds(1)),
			last: Some(found.at),
		};
		if options.reference.is_none() {
			break;
		}
	}
	Ok(())
}

pub fn show(rt: &Runtime, target: &Target, out: &mut dyn Write) -> Result<()> {
	let schedule = rt.schedule(target)?;
	let dataset = schedule
		.dataset()
		.with_context(|| format!("invalid schedule '{schedule}'"))?;
	serde_json::to_writer_pretty(&mut *out, dataset)?;
	writeln!(out)?;
	Ok(())
}

/// One line of the schedule table.
#[derive(Debug, Clone, Serialize)]
pub struct TableRow {
	pub name: String,
	pub action: String,
	pub definition: String,
	pub last: Option<NaiveDateTime>,
	pub next: Option<NaiveDateTime>,
	#[serde(serialize_with = "serialize_duration")]
	pub interval: Option<Duration>,
}

pub fn table_rows(rt: &Runtime, at: Option<&str>) -> Result<Vec<TableRow>> {
	let reference = rt.wall(at)?;
	let store = rt.store();

	let mut rows = Vec::with_capacity(rt.config.entries.len());
	for (name, entry) in &rt.config.entries {
		let last = store
			.read(name)?
			.map(|instant| clock::to_wall(instant, rt.tz));
		let found: Option<Occurrence> = entry
			.schedule()
			.next(NextOptions {
				reference: Some(reference),
				last,
			})
			.with_context(|| format!("entry '{name}'"))?;
		rows.push(TableRow {
			name: name.clone(),
			action: entry.action.clone(),
			definition: entry.definition.clone(),
			last,
			next: found.map(|o| o.at),
			interval: found.map(|o| o.interval),
		});
	}
	Ok(rows)
}

pub fn table(rt: &Runtime, at: Option<&str>, json: bool, out: &mut dyn Write) -> Result<()> {
	let rows = table_rows(rt, at)?;
	if json {
		serde_json::to_writer_pretty(&mut *out, &rows)?;
		writeln!(out)?;
		return Ok(());
	}

	writeln!(
		out,
		"{:<20} {:<12} {:<19} {:<19} {:<12} DEFINITION",
		"NAME", "ACTION", "LAST", "NEXT", "INTERVAL"
	)?;
	for row in rows {
		writeln!(
			out,
			"{:<20} {:<12} {:<19} {:<19} {:<12} {}",
			row.name,
			row.action,
			display_time(row.last),
			display_time(row.next),
			row.interval.map(format_duration).unwrap_or_else(|| "-".to_string()),
			row.definition
		)?;
	}
	Ok(())
}

pub fn mark(rt: &Runtime, entry: &str, at: Option<&str>, out: &mut dyn Write) -> Result<()> {
	rt.config.entry(entry)?;
	let wall = rt.wall(at)?;
	let instant = clock::to_utc(wall, rt.tz)?;
	rt.store().record(entry, instant)?;
	info!(entry, at = %wall, "marked entry as run");
	writeln!(out, "{entry} last run {}", wall.format(DISPLAY_FORMAT))?;
	Ok(())
}

fn display_time(tm: Option<NaiveDateTime>) -> String {
	tm.map(|t| t.format(DISPLAY_FORMAT).to_string())
		.unwrap_or_else(|| "-".to_string())
}

fn format_duration(d: Duration) -> String {
	if d.is_zero() {
		return "0s".to_string();
	}
	humantime::format_duration(d).to_string()
}

fn serialize_duration<S>(d: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: serde::Serializer,
{
	match d {
		Some(d) => serializer.serialize_some(&format_duration(*d)),
		None => serializer.serialize_none(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;
	use tether_schedule_config::{ConfigLayer, EntryConfig};

	fn runtime(dir: &TempDir, entries: &[(&str, &str)]) -> Runtime {
		let mut config = ScheduleConfig::from_layer(ConfigLayer::default()).unwrap();
		config.scheduler.jitter = false;
		config.scheduler.state_dir = dir.path().to_path_buf();
		for (name, definition) in entries {
			config.entries.insert(
				name.to_string(),
				EntryConfig {
					definition: definition.to_string(),
					action: "sync".to_string(),
				},
			);
		}
		Runtime::new(config).unwrap()
	}

	fn expr(raw: &str) -> Target {
		Target {
			expression: Some(raw.to_string()),
			entry: None,
		}
	}

	fn entry(name: &str) -> Target {
		Target {
			expression: None,
			entry: Some(name.to_string()),
		}
	}

	fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
		let mut buf = Vec::new();
		f(&mut buf).unwrap();
		String::from_utf8(buf).unwrap()
	}

	#[test]
	fn test_allowed_and_denied() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[]);
		let mut out = Vec::new();

		let verdict = test(
			&rt,
			&expr("09:20-09:00"),
			Some("2015-02-27 10:00:00"),
			None,
			false,
			&mut out,
		)
		.unwrap();
		assert_eq!(verdict, Verdict::Allowed);
		assert_eq!(String::from_utf8(out).unwrap(), "allowed, delay 0s\n");

		let mut out = Vec::new();
		let verdict = test(
			&rt,
			&expr("09:00-09:20"),
			Some("2015-02-27 10:00:00"),
			None,
			false,
			&mut out,
		)
		.unwrap();
		assert_eq!(verdict, Verdict::Denied);
		assert!(String::from_utf8(out).unwrap().starts_with("not allowed"));
	}

	#[test]
	fn test_exclusions_respected_unless_inclusions_only() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[]);
		let target = expr(r#"["*", "!12:00-13:00"]"#);

		let mut out = Vec::new();
		let verdict = test(&rt, &target, Some("2015-02-27 12:30:00"), None, false, &mut out).unwrap();
		assert_eq!(verdict, Verdict::Denied);
		assert!(String::from_utf8(out).unwrap().starts_with("excluded"));

		let mut out = Vec::new();
		let verdict = test(&rt, &target, Some("2015-02-27 12:30:00"), None, true, &mut out).unwrap();
		assert_eq!(verdict, Verdict::Allowed);
	}

	#[test]
	fn test_invalid_expression_is_error() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[]);
		let result = test(
			&rt,
			&expr("* notaday"),
			Some("2015-02-27 10:00:00"),
			None,
			false,
			&mut Vec::new(),
		);
		assert!(result.is_err());
	}

	#[test]
	fn test_next_lists_occurrences() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[]);
		let text = output(|out| {
			next(
				&rt,
				&expr("09:00-09:20"),
				Some("2015-02-27 10:00:00"),
				None,
				3,
				out,
			)
		});
		let lines: Vec<_> = text.lines().collect();
		assert_eq!(
			lines,
			vec![
				"2015-02-28 09:00:00  interval 20m 1s",
				"2015-03-01 09:00:00  interval 20m 1s",
				"2015-03-02 09:00:00  interval 20m 1s",
			]
		);
	}

	#[test]
	fn test_next_reports_exhaustion() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[]);
		let text = output(|out| next(&rt, &expr(""), Some("2015-02-27 10:00:00"), None, 1, out));
		assert_eq!(text, "no further occurrence\n");
	}

	#[test]
	fn test_show_dumps_dataset() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[("nightly", "02:00 mon-fri")]);
		let text = output(|out| show(&rt, &entry("nightly"), out));
		let value: serde_json::Value = serde_json::from_str(&text).unwrap();
		assert_eq!(value.as_array().unwrap().len(), 1);
	}

	#[test]
	fn test_mark_feeds_table() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[("nightly", "@1h")]);

		let rows = table_rows(&rt, Some("2015-02-27 10:00:00")).unwrap();
		assert_eq!(rows[0].last, None);
		assert_eq!(
			rows[0].next.unwrap().to_string(),
			"2015-02-27 10:00:00"
		);

		output(|out| mark(&rt, "nightly", Some("2015-02-27 09:30:00"), out));
		let rows = table_rows(&rt, Some("2015-02-27 10:00:00")).unwrap();
		assert_eq!(rows[0].last.unwrap().to_string(), "2015-02-27 09:30:00");
		assert_eq!(
			rows[0].next.unwrap().to_string(),
			"2015-02-27 10:30:00"
		);

		let text = output(|out| table(&rt, Some("2015-02-27 10:00:00"), false, out));
		assert!(text.lines().nth(1).unwrap().starts_with("nightly"));
	}

	#[test]
	fn test_entry_last_run_used_by_test() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[("status", "@10")]);
		output(|out| mark(&rt, "status", Some("2015-02-27 09:52:00"), out));

		let verdict = test(
			&rt,
			&entry("status"),
			Some("2015-02-27 10:00:00"),
			None,
			false,
			&mut Vec::new(),
		)
		.unwrap();
		assert_eq!(verdict, Verdict::Denied);
	}

	#[test]
	fn test_mark_unknown_entry_fails() {
		let dir = TempDir::new().unwrap();
		let rt = runtime(&dir, &[]);
		assert!(mark(&rt, "ghost", None, &mut Vec::new()).is_err());
	}
}
