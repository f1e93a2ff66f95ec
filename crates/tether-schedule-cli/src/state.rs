// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Last-run timestamps, one file per entry.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

const SUFFIX: &str = "last";

pub struct LastRunStore {
	dir: PathBuf,
}

impl LastRunStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	fn path(&self, entry: &str) -> PathBuf {
		self.dir.join(format!("{entry}.{SUFFIX}"))
	}

	/// The recorded last run of `entry`, or `None` if it never ran.
	pub fn read(&self, entry: &str) -> Result<Option<DateTime<Utc>>> {
		let path = self.path(entry);
		let content = match fs::read_to_string(&path) {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				debug!(entry, path = %path.display(), "no last run recorded");
				return Ok(None);
			}
			Err(e) => {
				return Err(e).with_context(|| format!("reading {}", path.display()));
			}
		};
		let last = DateTime::parse_from_rfc3339(content.trim())
			.with_context(|| format!("malformed timestamp in {}", path.display()))?;
		Ok(Some(last.with_timezone(&Utc)))
	}

	/// Record a run of `entry` at `at`, replacing any previous record.
	pub fn record(&self, entry: &str, at: DateTime<Utc>) -> Result<()> {
		fs::create_dir_all(&self.dir)
			.with_context(|| format!("creating state directory {}", self.dir.display()))?;

		let path = self.path(entry);
		let tmp = path.with_extension(format!("{SUFFIX}.tmp"));
		let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
		fs::write(&tmp, format!("{stamp}\n"))
			.with_context(|| format!("writing {}", tmp.display()))?;
		fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;

		debug!(entry, at = %stamp, "recorded last run");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use tempfile::TempDir;

	#[test]
	fn test_missing_record_is_none() {
		let dir = TempDir::new().unwrap();
		let store = LastRunStore::new(dir.path());
		assert!(store.read("nightly").unwrap().is_none());
	}

	#[test]
	fn test_record_then_read() {
		let dir = TempDir::new().unwrap();
		let state_dir = dir.path().join("nested");
		let store = LastRunStore::new(&state_dir);
		let at = Utc.with_ymd_and_hms(2015, 2, 27, 9, 5, 0).unwrap();

		store.record("nightly", at).unwrap();
		assert_eq!(store.read("nightly").unwrap(), Some(at));

		let later = Utc.with_ymd_and_hms(2015, 2, 28, 9, 0, 0).unwrap();
		store.record("nightly", later).unwrap();
		assert_eq!(store.read("nightly").unwrap(), Some(later));
		assert_eq!(
			fs::read_to_string(state_dir.join("nightly.last")).unwrap(),
			"2015-02-28T09:00:00Z\n"
		);
	}

	#[test]
	fn test_malformed_record_is_error() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("nightly.last"), "last tuesday").unwrap();
		let store = LastRunStore::new(dir.path());
		assert!(store.read("nightly").is_err());
	}
}
