// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration registry - manages sources and merges layers.

use tracing::{debug, info};

use crate::layer::ConfigLayer;
use crate::runtime::ScheduleConfig;
use crate::sources::ConfigSource;
use crate::validation::validate_config;
use crate::ConfigError;

/// Registry that manages configuration sources and merges them.
pub struct ConfigRegistry {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigRegistry {
	pub fn new() -> Self {
		Self {
			sources: Vec::new(),
		}
	}

	/// Register a configuration source.
	pub fn register(&mut self, source: Box<dyn ConfigSource>) {
		debug!(source = source.name(), precedence = ?source.precedence(), "registering config source");
		self.sources.push(source);
	}

	/// Load configuration from all sources, merge, and validate.
	///
	/// Sources are merged lowest precedence first. A source that fails to
	/// load fails the whole load: a half-read schedule file must not be
	/// mistaken for an empty one.
	pub fn load(&self) -> Result<ScheduleConfig, ConfigError> {
		let mut sorted_sources: Vec<_> = self.sources.iter().collect();
		sorted_sources.sort_by_key(|s| s.precedence());

		info!(
			source_count = sorted_sources.len(),
			"loading configuration from sources"
		);

		let mut merged = ConfigLayer::default();
		for source in &sorted_sources {
			let layer = source.load()?;
			debug!(source = source.name(), "merging config layer");
			merged.merge(layer);
		}

		let config = ScheduleConfig::from_layer(merged)?;
		validate_config(&config)?;

		info!(
			timezone = %config.scheduler.timezone,
			entry_count = config.entries.len(),
			log_level = ?config.logging.level,
			"configuration loaded successfully"
		);

		Ok(config)
	}

	pub fn source_count(&self) -> usize {
		self.sources.len()
	}
}

impl Default for ConfigRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sources::{CliOverrides, CliSource, DefaultsSource, EnvSource, FileSource};
	use std::io::Write;
	use tempfile::NamedTempFile;

	struct StaticEnv(Vec<(String, String)>);

	impl ConfigSource for StaticEnv {
		fn name(&self) -> &'static str {
			"static-env"
		}
		fn precedence(&self) -> crate::Precedence {
			crate::Precedence::Environment
		}
		fn load(&self) -> Result<ConfigLayer, ConfigError> {
			EnvSource::layer_from_vars(self.0.clone())
		}
	}

	#[test]
	fn test_registry_registers_sources() {
		let mut registry = ConfigRegistry::new();
		assert_eq!(registry.source_count(), 0);

		registry.register(Box::new(DefaultsSource));
		assert_eq!(registry.source_count(), 1);
	}

	#[test]
	fn test_registry_loads_with_defaults() {
		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(DefaultsSource));

		let config = registry.load().unwrap();
		assert_eq!(config.scheduler.timezone, "UTC");
	}

	/// Registration order does not matter; precedence does.
	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[scheduler]
timezone = "Europe/Paris"

[entries.nightly]
definition = "02:00"
action = "backup"
"#
		)
		.unwrap();

		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(CliSource::new(CliOverrides {
			timezone: Some("Asia/Tokyo".to_string()),
			..Default::default()
		})));
		registry.register(Box::new(StaticEnv(vec![(
			"TETHER_SCHEDULE_ENTRY_NIGHTLY".to_string(),
			"03:00".to_string(),
		)])));
		registry.register(Box::new(FileSource::custom(file.path().to_path_buf())));
		registry.register(Box::new(DefaultsSource));

		let config = registry.load().unwrap();
		assert_eq!(config.scheduler.timezone, "Asia/Tokyo");
		let nightly = config.entry("nightly").unwrap();
		assert_eq!(nightly.definition, "03:00");
		assert_eq!(nightly.action, "backup");
	}

	#[test]
	fn test_invalid_entry_fails_load() {
		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(StaticEnv(vec![(
			"TETHER_SCHEDULE_ENTRY_BROKEN".to_string(),
			"25:00".to_string(),
		)])));

		assert!(matches!(
			registry.load(),
			Err(ConfigError::InvalidSchedule { .. })
		));
	}
}
