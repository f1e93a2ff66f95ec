// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Random sources for jitter delays.

/// Source of uniformly distributed values in `[0, 1)`.
pub trait JitterSource {
	fn unit(&mut self) -> f64;
}

/// Draws from `fastrand`'s thread-local generator.
///
/// Each thread owns an independently seeded generator, so concurrent
/// evaluations neither contend on a lock nor share a seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadJitter;

impl JitterSource for ThreadJitter {
	fn unit(&mut self) -> f64 {
		fastrand::f64()
	}
}

/// Always zero: probabilistic windows fire immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
	fn unit(&mut self) -> f64 {
		0.0
	}
}

impl JitterSource for fastrand::Rng {
	fn unit(&mut self) -> f64 {
		self.f64()
	}
}
