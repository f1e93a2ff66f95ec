// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use tracing::warn;

use crate::runtime::ScheduleConfig;
use crate::ConfigError;

/// Validate the configuration.
pub fn validate_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
	config.scheduler.tz()?;
	validate_entries(config)?;
	Ok(())
}

fn validate_entries(config: &ScheduleConfig) -> Result<(), ConfigError> {
	for (name, entry) in &config.entries {
		if !is_valid_entry_name(name) {
			return Err(ConfigError::invalid_value(
				format!("entries.{name}"),
				"entry names may only contain a-z, 0-9, '_', '-' and '.'",
			));
		}

		let schedule = entry.schedule();
		if let Err(source) = schedule.dataset() {
			return Err(ConfigError::InvalidSchedule {
				entry: name.clone(),
				source,
			});
		}

		if schedule.is_never() {
			warn!(entry = %name, "schedule has no inclusion clause and will never run");
		}
		if entry.action.trim().is_empty() {
			return Err(ConfigError::invalid_value(
				format!("entries.{name}.action"),
				"action cannot be empty",
			));
		}
	}
	Ok(())
}

fn is_valid_entry_name(name: &str) -> bool {
	!name.is_empty()
		&& name
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
}
