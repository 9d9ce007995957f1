//! Command-line surface for the `anarcast-proxy` binary.
use std::path::PathBuf;

use clap::Parser;

/// Content-addressed, erasure-coded block proxy.
#[derive(Parser, Debug)]
#[command(name = "anarcast-proxy", version)]
pub struct Cli {
	/// Hostname of the inform server to discover storage servers from
	pub inform_server: String,

	/// Configuration file (overrides defaults; the positional
	/// inform-server host still takes precedence over the file's value)
	#[arg(short = 'c', long = "config")]
	pub config: Option<PathBuf>,
}
