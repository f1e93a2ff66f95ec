// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use tether_schedule_core::Schedule;

use crate::layer::*;
use crate::ConfigError;

pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/tether/schedule";
pub const DEFAULT_ACTION: &str = "run";

/// The final, validated schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
	pub scheduler: SchedulerConfig,
	pub logging: LoggingConfig,
	pub entries: BTreeMap<String, EntryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
	/// IANA zone in which wall-clock windows are read.
	pub timezone: String,
	/// Draw a random delay inside probabilistic windows.
	pub jitter: bool,
	/// Where last-run timestamps are kept.
	pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
	pub level: LogLevel,
	pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Error,
	Warn,
	#[default]
	Info,
	Debug,
	Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
	Compact,
}

/// A named schedule gating one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
	pub definition: String,
	pub action: String,
}

impl EntryConfig {
	pub fn schedule(&self) -> Schedule {
		Schedule::new(self.definition.as_str())
	}
}

impl SchedulerConfig {
	pub fn tz(&self) -> Result<Tz, ConfigError> {
		self.timezone.parse::<Tz>().map_err(|_| {
			ConfigError::invalid_value(
				"scheduler.timezone",
				format!("unknown timezone '{}'", self.timezone),
			)
		})
	}
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			timezone: DEFAULT_TIMEZONE.to_string(),
			jitter: true,
			state_dir: PathBuf::from(DEFAULT_STATE_DIR),
		}
	}
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: LogLevel::Info,
			format: LogFormat::Pretty,
		}
	}
}

impl ScheduleConfig {
	/// Build runtime config from a merged layer, applying defaults.
	pub fn from_layer(layer: ConfigLayer) -> Result<Self, ConfigError> {
		let scheduler = build_scheduler_config(layer.scheduler);
		let logging = build_logging_config(layer.logging)?;

		let mut entries = BTreeMap::new();
		for (name, entry) in layer.entries.unwrap_or_default().entries {
			let definition = entry
				.definition
				.ok_or_else(|| ConfigError::missing_field(format!("entries.{name}.definition")))?;
			let action = entry.action.unwrap_or_else(|| DEFAULT_ACTION.to_string());
			entries.insert(name, EntryConfig { definition, action });
		}

		Ok(Self {
			scheduler,
			logging,
			entries,
		})
	}

	pub fn entry(&self, name: &str) -> Result<&EntryConfig, ConfigError> {
		self.entries
			.get(name)
			.ok_or_else(|| ConfigError::invalid_value("entry", format!("no entry named '{name}'")))
	}
}

fn build_scheduler_config(layer: Option<SchedulerLayer>) -> SchedulerConfig {
	let layer = layer.unwrap_or_default();
	let defaults = SchedulerConfig::default();
	SchedulerConfig {
		timezone: layer.timezone.unwrap_or(defaults.timezone),
		jitter: layer.jitter.unwrap_or(defaults.jitter),
		state_dir: layer.state_dir.unwrap_or(defaults.state_dir),
	}
}

fn build_logging_config(layer: Option<LoggingLayer>) -> Result<LoggingConfig, ConfigError> {
	let layer = layer.unwrap_or_default();
	Ok(LoggingConfig {
		level: parse_log_level(layer.level.as_deref())?,
		format: parse_log_format(layer.format.as_deref())?,
	})
}

fn parse_log_level(s: Option<&str>) -> Result<LogLevel, ConfigError> {
	match s {
		None => Ok(LogLevel::Info),
		Some("error") => Ok(LogLevel::Error),
		Some("warn") => Ok(LogLevel::Warn),
		Some("info") => Ok(LogLevel::Info),
		Some("debug") => Ok(LogLevel::Debug),
		Some("trace") => Ok(LogLevel::Trace),
		Some(other) => Err(ConfigError::invalid_value(
			"logging.level",
			format!("unknown level '{other}'"),
		)),
	}
}

fn parse_log_format(s: Option<&str>) -> Result<LogFormat, ConfigError> {
	match s {
		None => Ok(LogFormat::Pretty),
		Some("pretty") => Ok(LogFormat::Pretty),
		Some("json") => Ok(LogFormat::Json),
		Some("compact") => Ok(LogFormat::Compact),
		Some(other) => Err(ConfigError::invalid_value(
			"logging.format",
			format!("unknown format '{other}'"),
		)),
	}
}
