//! The inform client: a one-shot TCP read of 4-byte server addresses that
//! seeds the membership tree at proxy startup.
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use anarcast_util::error::{Error, Result};

use crate::membership::Membership;

/// Connects to `host:port` (DNS resolution is performed by `TcpStream`),
/// reads 4-byte big-endian addresses until the peer closes the connection,
/// and calls [`Membership::add`] for each. A read that stops partway
/// through an address is fatal. Reading zero addresses is not an error —
/// callers should warn and proceed with an empty (or pre-seeded) tree.
pub async fn run(host: &str, port: u16, membership: &Membership) -> Result<usize> {
	let mut stream = TcpStream::connect((host, port)).await.map_err(Error::Io)?;
	info!("inform client: connected to {}:{}", host, port);

	let mut count = 0usize;
	let mut buf = [0u8; 4];
	let mut filled = 0usize;

	loop {
		let n = stream.read(&mut buf[filled..]).await.map_err(Error::Io)?;
		if n == 0 {
			if filled != 0 {
				return Err(Error::Message(
					"inform server closed connection mid-address".into(),
				));
			}
			break;
		}
		filled += n;
		if filled == buf.len() {
			let addr = u32::from_be_bytes(buf);
			membership.add(addr).await?;
			count += 1;
			filled = 0;
		}
	}

	if count == 0 {
		warn!("inform client: read zero server addresses");
	} else {
		info!("inform client: seeded {} servers", count);
	}

	Ok(count)
}

#[cfg(test)]
mod test {
	use super::*;
	use tokio::io::AsyncWriteExt;
	use tokio::net::TcpListener;

	#[tokio::test]
	async fn reads_addresses_until_close() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let server = tokio::spawn(async move {
			let (mut sock, _) = listener.accept().await.unwrap();
			for a in [1u32, 2, 3] {
				sock.write_all(&a.to_be_bytes()).await.unwrap();
			}
			sock.shutdown().await.unwrap();
		});

		let membership = Membership::new();
		let count = run(&addr.ip().to_string(), addr.port(), &membership).await.unwrap();
		server.await.unwrap();

		assert_eq!(count, 3);
		assert_eq!(membership.len().await, 3);
	}

	#[tokio::test]
	async fn partial_address_at_close_is_fatal() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let server = tokio::spawn(async move {
			let (mut sock, _) = listener.accept().await.unwrap();
			sock.write_all(&[1, 2]).await.unwrap();
			sock.shutdown().await.unwrap();
		});

		let membership = Membership::new();
		let result = run(&addr.ip().to_string(), addr.port(), &membership).await;
		server.await.unwrap();

		assert!(result.is_err());
	}

	#[tokio::test]
	async fn zero_addresses_is_not_an_error() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let server = tokio::spawn(async move {
			let (sock, _) = listener.accept().await.unwrap();
			drop(sock);
		});

		let membership = Membership::new();
		let count = run(&addr.ip().to_string(), addr.port(), &membership).await.unwrap();
		server.await.unwrap();

		assert_eq!(count, 0);
	}
}
