// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for named schedule entries.
//!
//! Sources, lowest precedence first: built-in defaults,
//! `/etc/tether/schedule.toml`, a file named on the command line,
//! `TETHER_*` environment variables, then command-line overrides.
//!
//! ```toml
//! [scheduler]
//! timezone = "Europe/Paris"
//!
//! [entries.sync_all]
//! definition = '["~00:00-06:00 mon-fri", "!* * * dec"]'
//! action = "sync"
//! ```

mod error;
mod layer;
mod registry;
mod runtime;
mod sources;
mod validation;

use std::path::PathBuf;

pub use error::ConfigError;
pub use layer::{ConfigLayer, EntriesLayer, EntryLayer, LoggingLayer, SchedulerLayer};
pub use registry::ConfigRegistry;
pub use runtime::{
	EntryConfig, LogFormat, LogLevel, LoggingConfig, ScheduleConfig, SchedulerConfig,
	DEFAULT_ACTION, DEFAULT_STATE_DIR, DEFAULT_TIMEZONE,
};
pub use sources::{
	CliOverrides, CliSource, ConfigSource, DefaultsSource, EnvSource, FileSource, Precedence,
	ENV_ENTRY_PREFIX, ENV_PREFIX, SYSTEM_CONFIG_FILE,
};
pub use validation::validate_config;

/// Load configuration from the standard sources.
pub fn load_config() -> Result<ScheduleConfig, ConfigError> {
	load_config_with_cli(None, CliOverrides::default())
}

/// Load configuration, adding an optional config file and CLI overrides.
pub fn load_config_with_cli(
	file: Option<PathBuf>,
	cli: CliOverrides,
) -> Result<ScheduleConfig, ConfigError> {
	let mut registry = ConfigRegistry::new();
	registry.register(Box::new(DefaultsSource));
	registry.register(Box::new(FileSource::system()));
	if let Some(path) = file {
		registry.register(Box::new(FileSource::custom(path)));
	}
	registry.register(Box::new(EnvSource));
	registry.register(Box::new(CliSource::new(cli)));
	registry.load()
}
