// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! tether-sched - operator tool for schedule expressions
//!
//! Validates and inspects schedule expressions, decides whether a task may
//! run at a given instant, lists upcoming occurrences, and prints the
//! schedule table of the entries in the configuration.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tether_schedule_config::{load_config_with_cli, CliOverrides, LogFormat, LoggingConfig};

mod clock;
mod commands;
mod state;

use commands::{Runtime, Target, Verdict};

/// tether-sched - inspect and evaluate schedules
#[derive(Parser, Debug)]
#[command(name = "tether-sched", version, about, long_about = None)]
struct Args {
	/// Path to custom configuration file
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Timezone for wall-clock windows (overrides config)
	#[arg(long)]
	timezone: Option<String>,

	/// Disable the random delay inside probabilistic windows
	#[arg(long)]
	no_jitter: bool,

	/// Directory holding last-run timestamps (overrides config)
	#[arg(long)]
	state_dir: Option<PathBuf>,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	/// Output logs as JSON (overrides config)
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Decide whether the task may run now or at --at
	Test {
		#[command(flatten)]
		target: Target,

		/// Instant to evaluate instead of now
		#[arg(long)]
		at: Option<String>,

		/// Previous run; defaults to the entry's recorded last run
		#[arg(long)]
		last: Option<String>,

		/// Ignore exclusion clauses
		#[arg(long)]
		inclusions_only: bool,
	},

	/// List the next allowed occurrences
	Next {
		#[command(flatten)]
		target: Target,

		#[arg(long)]
		at: Option<String>,

		#[arg(long)]
		last: Option<String>,

		/// Number of occurrences to list
		#[arg(short = 'n', long, default_value = "1")]
		count: usize,
	},

	/// Print the parsed expression as JSON
	Show {
		#[command(flatten)]
		target: Target,
	},

	/// Print last and next run of every configured entry
	Table {
		#[arg(long)]
		at: Option<String>,

		/// Emit JSON instead of a table
		#[arg(long)]
		json: bool,
	},

	/// Record that an entry ran now or at --at
	Mark {
		entry: String,

		#[arg(long)]
		at: Option<String>,
	},
}

fn log_level_to_tracing(level: tether_schedule_config::LogLevel) -> tracing::Level {
	use tether_schedule_config::LogLevel;
	match level {
		LogLevel::Trace => tracing::Level::TRACE,
		LogLevel::Debug => tracing::Level::DEBUG,
		LogLevel::Info => tracing::Level::INFO,
		LogLevel::Warn => tracing::Level::WARN,
		LogLevel::Error => tracing::Level::ERROR,
	}
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(format!("tether={}", log_level_to_tracing(logging.level))));

	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(io::stderr))
				.init();
		}
		LogFormat::Compact => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(io::stderr))
				.init();
		}
	}
}

fn run(args: Args) -> Result<Verdict> {
	let overrides = CliOverrides {
		timezone: args.timezone,
		jitter: args.no_jitter.then_some(false),
		state_dir: args.state_dir,
		log_level: args.log_level,
		log_format: args.json_logs.then(|| "json".to_string()),
	};
	let config = load_config_with_cli(args.config, overrides).context("loading configuration")?;
	init_tracing(&config.logging);
	debug!(command = ?args.command, "starting");

	let rt = Runtime::new(config)?;
	let stdout = io::stdout();
	let mut out = stdout.lock();

	match args.command {
		Command::Test {
			target,
			at,
			last,
			inclusions_only,
		} => commands::test(
			&rt,
			&target,
			at.as_deref(),
			last.as_deref(),
			inclusions_only,
			&mut out,
		),
		Command::Next {
			target,
			at,
			last,
			count,
		} => commands::next(&rt, &target, at.as_deref(), last.as_deref(), count, &mut out)
			.map(|()| Verdict::Allowed),
		Command::Show { target } => {
			commands::show(&rt, &target, &mut out).map(|()| Verdict::Allowed)
		}
		Command::Table { at, json } => {
			commands::table(&rt, at.as_deref(), json, &mut out).map(|()| Verdict::Allowed)
		}
		Command::Mark { entry, at } => {
			commands::mark(&rt, &entry, at.as_deref(), &mut out).map(|()| Verdict::Allowed)
		}
	}
}

fn main() -> ExitCode {
	let args = Args::parse();
	match run(args) {
		Ok(Verdict::Allowed) => ExitCode::SUCCESS,
		Ok(Verdict::Denied) => ExitCode::from(1),
		Err(e) => {
			eprintln!("error: {e:#}");
			ExitCode::from(2)
		}
	}
}
