//! `anarcast-proxy`: splits payloads into erasure-coded blocks, scatters
//! them across a cluster discovered from an inform server, and gathers
//! them back on request.
#[macro_use]
extern crate tracing;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use anarcast_graph::GraphCatalogue;
use anarcast_ring::Membership;
use anarcast_util::config::{default_config, read_config};

mod cli;
mod handler;
mod server;

use cli::Cli;
use handler::ProxyContext;

fn main() -> ExitCode {
	let cli = Cli::parse();
	tracing_subscriber::fmt::init();

	let rt = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => {
			eprintln!("failed to start tokio runtime: {}", e);
			return ExitCode::from(1);
		}
	};
	rt.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
	let mut config = match &cli.config {
		Some(path) => match read_config(path.clone()) {
			Ok(config) => config,
			Err(e) => {
				error!("failed to read configuration file: {}", e);
				return ExitCode::from(2);
			}
		},
		None => default_config(cli.inform_server.clone()),
	};
	config.inform_server = cli.inform_server;

	let catalogue = match &config.graph_file {
		Some(path) => match GraphCatalogue::load(path) {
			Ok(catalogue) => catalogue,
			Err(e) => {
				error!("failed to load graph catalogue from {}: {}", path.display(), e);
				return ExitCode::from(1);
			}
		},
		None => {
			warn!("no graph_file configured; using a synthetic in-memory catalogue");
			GraphCatalogue::synthetic()
		}
	};

	let membership = Membership::new();
	info!("discovering storage servers from {}:{}...", config.inform_server, config.inform_port);
	if let Err(e) = anarcast_ring::inform::run(&config.inform_server, config.inform_port, &membership).await {
		error!("inform client failed: {}", e);
		return ExitCode::from(1);
	}

	let ctx = Arc::new(ProxyContext {
		catalogue,
		membership,
		anarcast_port: config.anarcast_port,
		concurrency: config.concurrency,
	});

	tokio::select! {
		result = server::run(config.proxy_bind_addr, ctx) => {
			match result {
				Ok(()) => ExitCode::from(0),
				Err(e) => {
					error!("proxy server failed: {}", e);
					ExitCode::from(1)
				}
			}
		}
		_ = tokio::signal::ctrl_c() => {
			info!("received shutdown signal, exiting");
			ExitCode::from(0)
		}
	}
}
