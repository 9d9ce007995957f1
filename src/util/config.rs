//! Contains type and functions related to the anarcast proxy configuration file
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

/// Represent the whole configuration
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
	/// Hostname of the inform server consulted at startup to discover
	/// the initial set of storage servers
	pub inform_server: String,
	/// Port on which the inform server listens
	#[serde(default = "default_inform_port")]
	pub inform_port: u16,

	/// Address to bind for the client-facing proxy port
	#[serde(default = "default_proxy_bind_addr")]
	pub proxy_bind_addr: SocketAddr,

	/// Port on which storage servers listen
	#[serde(default = "default_anarcast_port")]
	pub anarcast_port: u16,

	/// Path to the memory-mapped graph catalogue file. When absent, a
	/// deterministic synthetic catalogue is generated in-process instead
	/// (useful for tests and for a zero-config trial run).
	pub graph_file: Option<PathBuf>,

	/// Maximum number of in-flight connections per scatter/gather session
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
}

fn default_inform_port() -> u16 {
	7342
}
fn default_proxy_bind_addr() -> SocketAddr {
	"0.0.0.0:9748".parse().unwrap()
}
fn default_anarcast_port() -> u16 {
	9209
}
fn default_concurrency() -> usize {
	8
}

/// Builds a `Config` with every field at its default except
/// `inform_server`, for the common case of running with no config file at
/// all — just the positional inform-server host the CLI takes.
pub fn default_config(inform_server: String) -> Config {
	Config {
		inform_server,
		inform_port: default_inform_port(),
		proxy_bind_addr: default_proxy_bind_addr(),
		anarcast_port: default_anarcast_port(),
		graph_file: None,
		concurrency: default_concurrency(),
	}
}

/// Read and parse configuration
pub fn read_config(config_file: PathBuf) -> Result<Config, Error> {
	let mut file = std::fs::OpenOptions::new()
		.read(true)
		.open(config_file.as_path())?;

	let mut config = String::new();
	file.read_to_string(&mut config)?;

	Ok(toml::from_str(&config)?)
}
