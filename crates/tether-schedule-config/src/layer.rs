// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer for merging from multiple sources.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Partial configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
	#[serde(default)]
	pub scheduler: Option<SchedulerLayer>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
	#[serde(default)]
	pub entries: Option<EntriesLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerLayer {
	#[serde(default)]
	pub timezone: Option<String>,
	#[serde(default)]
	pub jitter: Option<bool>,
	#[serde(default)]
	pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntriesLayer {
	#[serde(flatten)]
	pub entries: BTreeMap<String, EntryLayer>,
}

/// One named schedule entry: the task it gates and when it may run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryLayer {
	#[serde(default)]
	pub definition: Option<String>,
	#[serde(default)]
	pub action: Option<String>,
}

impl ConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ConfigLayer) {
		merge_option(&mut self.scheduler, other.scheduler, SchedulerLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
		merge_option(&mut self.entries, other.entries, EntriesLayer::merge);
	}

	pub(crate) fn entry_mut(&mut self, name: &str) -> &mut EntryLayer {
		self.entries
			.get_or_insert_with(EntriesLayer::default)
			.entries
			.entry(name.to_string())
			.or_default()
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

impl SchedulerLayer {
	fn merge(&mut self, other: SchedulerLayer) {
		if other.timezone.is_some() {
			self.timezone = other.timezone;
		}
		if other.jitter.is_some() {
			self.jitter = other.jitter;
		}
		if other.state_dir.is_some() {
			self.state_dir = other.state_dir;
		}
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
	}
}

impl EntriesLayer {
	fn merge(&mut self, other: EntriesLayer) {
		for (name, entry) in other.entries {
			match self.entries.get_mut(&name) {
				Some(existing) => existing.merge(entry),
				None => {
					self.entries.insert(name, entry);
				}
			}
		}
	}
}

impl EntryLayer {
	fn merge(&mut self, other: EntryLayer) {
		if other.definition.is_some() {
			self.definition = other.definition;
		}
		if other.action.is_some() {
			self.action = other.action;
		}
	}
}
