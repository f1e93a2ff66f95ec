// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for schedule evaluation.

use std::time::Duration;

use thiserror::Error;

/// Result type for schedule operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Outcomes of parsing and evaluating a schedule expression.
///
/// Only `Invalid` denotes a broken configuration. `NotAllowed` and
/// `Excluded` are ordinary decisions that callers use for control flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
	#[error("invalid schedule expression: {0}")]
	Invalid(String),

	#[error("not allowed: {}", .reasons.join("; "))]
	NotAllowed { reasons: Vec<String> },

	#[error("excluded for another {}s", .remaining.as_secs())]
	Excluded { remaining: Duration },
}

impl ScheduleError {
	pub fn invalid(message: impl Into<String>) -> Self {
		Self::Invalid(message.into())
	}

	pub fn not_allowed(reason: impl Into<String>) -> Self {
		Self::NotAllowed {
			reasons: vec![reason.into()],
		}
	}

	/// Prefix an `Invalid` message with the field it was found in.
	pub(crate) fn in_field(self, field: &str) -> Self {
		match self {
			Self::Invalid(message) => Self::Invalid(format!("{field} field: {message}")),
			other => other,
		}
	}

	pub fn is_invalid(&self) -> bool {
		matches!(self, Self::Invalid(_))
	}

	pub fn is_not_allowed(&self) -> bool {
		matches!(self, Self::NotAllowed { .. })
	}

	pub fn is_excluded(&self) -> bool {
		matches!(self, Self::Excluded { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_in_field_prefixes_invalid_only() {
		let err = ScheduleError::invalid("unknown name 'foo'").in_field("days");
		assert_eq!(
			err.to_string(),
			"invalid schedule expression: days field: unknown name 'foo'"
		);

		let err = ScheduleError::not_allowed("outside").in_field("days");
		assert!(err.is_not_allowed());
	}

	#[test]
	fn test_not_allowed_joins_reasons() {
		let err = ScheduleError::NotAllowed {
			reasons: vec!["a".to_string(), "b".to_string()],
		};
		assert_eq!(err.to_string(), "not allowed: a; b");
	}
}
