// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: files, environment, CLI, defaults.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::layer::*;
use crate::ConfigError;

/// Prefix of every environment variable this crate reads.
pub const ENV_PREFIX: &str = "TETHER_";

/// Environment variables of this form each define one schedule entry.
pub const ENV_ENTRY_PREFIX: &str = "TETHER_SCHEDULE_ENTRY_";

pub const SYSTEM_CONFIG_FILE: &str = "/etc/tether/schedule.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	SystemFile = 20,
	CustomFile = 30,
	Environment = 50,
	Cli = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	fn precedence(&self) -> Precedence;

	/// Load configuration layer from this source
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading defaults");
		// Defaults are applied when the runtime config is built.
		Ok(ConfigLayer::default())
	}
}

/// File-based configuration source (TOML).
pub struct FileSource {
	path: PathBuf,
	precedence: Precedence,
	name: &'static str,
}

impl FileSource {
	/// System config: /etc/tether/schedule.toml
	pub fn system() -> Self {
		Self {
			path: PathBuf::from(SYSTEM_CONFIG_FILE),
			precedence: Precedence::SystemFile,
			name: "system-config",
		}
	}

	/// A file named on the command line.
	pub fn custom(path: PathBuf) -> Self {
		Self {
			path,
			precedence: Precedence::CustomFile,
			name: "custom-config",
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		self.precedence
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), source = self.name, "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Recognised variables: `TETHER_SCHEDULE_TIMEZONE`, `TETHER_SCHEDULE_JITTER`,
/// `TETHER_SCHEDULE_STATE_DIR`, `TETHER_LOG_LEVEL`, `TETHER_LOG_FORMAT`, and
/// `TETHER_SCHEDULE_ENTRY_<NAME>` holding the definition of entry `<name>`.
pub struct EnvSource;

impl EnvSource {
	/// Build a layer from an explicit set of variables.
	pub fn layer_from_vars<I>(vars: I) -> Result<ConfigLayer, ConfigError>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		let mut layer = ConfigLayer::default();

		for (key, value) in vars {
			if !key.starts_with(ENV_PREFIX) {
				continue;
			}

			let value = value.trim().to_string();
			if value.is_empty() {
				continue;
			}

			trace!(key = %key, "processing env var");

			match key.as_str() {
				"TETHER_SCHEDULE_TIMEZONE" => {
					scheduler(&mut layer).timezone = Some(value);
				}
				"TETHER_SCHEDULE_JITTER" => {
					scheduler(&mut layer).jitter = Some(parse_bool(&key, &value)?);
				}
				"TETHER_SCHEDULE_STATE_DIR" => {
					scheduler(&mut layer).state_dir = Some(PathBuf::from(value));
				}
				"TETHER_LOG_LEVEL" => {
					logging(&mut layer).level = Some(value);
				}
				"TETHER_LOG_FORMAT" => {
					logging(&mut layer).format = Some(value);
				}
				_ => {
					if let Some(name) = key.strip_prefix(ENV_ENTRY_PREFIX) {
						if !name.is_empty() {
							layer.entry_mut(&name.to_ascii_lowercase()).definition = Some(value);
						}
					}
				}
			}
		}

		Ok(layer)
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Self::layer_from_vars(std::env::vars())
	}
}

/// Overrides given as command-line flags.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub timezone: Option<String>,
	pub jitter: Option<bool>,
	pub state_dir: Option<PathBuf>,
	pub log_level: Option<String>,
	pub log_format: Option<String>,
}

/// CLI arguments source.
pub struct CliSource {
	overrides: CliOverrides,
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading CLI overrides");
		let overrides = self.overrides.clone();
		let mut layer = ConfigLayer::default();

		if overrides.timezone.is_some() || overrides.jitter.is_some() || overrides.state_dir.is_some()
		{
			layer.scheduler = Some(SchedulerLayer {
				timezone: overrides.timezone,
				jitter: overrides.jitter,
				state_dir: overrides.state_dir,
			});
		}
		if overrides.log_level.is_some() || overrides.log_format.is_some() {
			layer.logging = Some(LoggingLayer {
				level: overrides.log_level,
				format: overrides.log_format,
			});
		}

		Ok(layer)
	}
}

fn scheduler(layer: &mut ConfigLayer) -> &mut SchedulerLayer {
	layer.scheduler.get_or_insert_with(SchedulerLayer::default)
}

fn logging(layer: &mut ConfigLayer) -> &mut LoggingLayer {
	layer.logging.get_or_insert_with(LoggingLayer::default)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
	match value.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(ConfigError::invalid_value(
			key,
			format!("expected a boolean, got '{value}'"),
		)),
	}
}
