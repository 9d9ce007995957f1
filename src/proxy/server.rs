//! The accept loop: one listening socket, one freshly spawned, fully
//! detached task per accepted connection.
use std::sync::Arc;

use tokio::net::TcpListener;

use anarcast_util::error::{Error, Result};

use crate::handler::{handle_connection, ProxyContext};

pub async fn run(bind_addr: std::net::SocketAddr, ctx: Arc<ProxyContext>) -> Result<()> {
	let listener = TcpListener::bind(bind_addr).await.map_err(Error::Io)?;
	info!("proxy listening on {}", bind_addr);

	loop {
		let (stream, peer) = listener.accept().await.map_err(Error::Io)?;
		let ctx = ctx.clone();
		tokio::spawn(async move {
			debug!("accepted connection from {}", peer);
			if let Err(e) = handle_connection(stream, &ctx).await {
				warn!("session with {} aborted: {}", peer, e);
			}
		});
	}
}
