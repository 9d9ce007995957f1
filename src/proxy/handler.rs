//! Per-connection client protocol: a freshly accepted socket is either an
//! insert (`'i'`) or a request (`'r'`) session, run to completion with no
//! synchronization with any other connection.
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use anarcast_coding::{compute_sizing, decode, encode, Key};
use anarcast_graph::GraphCatalogue;
use anarcast_ring::Membership;
use anarcast_util::error::{Error, Result};

/// Everything a connection handler needs, shared read-only (beyond the
/// membership tree's own internal locking) across every worker.
pub struct ProxyContext {
	pub catalogue: GraphCatalogue,
	pub membership: Membership,
	pub anarcast_port: u16,
	pub concurrency: usize,
}

/// Reads the one-byte session tag and dispatches to the insert or request
/// handler. Any error aborts the session; the caller is responsible for
/// logging and closing the socket.
pub async fn handle_connection(mut stream: TcpStream, ctx: &ProxyContext) -> Result<()> {
	let mut tag = [0u8; 1];
	stream.read_exact(&mut tag).await.map_err(Error::Io)?;

	match tag[0] {
		b'i' => handle_insert(stream, ctx).await,
		b'r' => handle_request(stream, ctx).await,
		other => Err(Error::Message(format!("unknown client session tag 0x{:02x}", other))),
	}
}

async fn read_u32(stream: &mut TcpStream) -> Result<u32> {
	let mut buf = [0u8; 4];
	stream.read_exact(&mut buf).await.map_err(Error::Io)?;
	Ok(u32::from_be_bytes(buf))
}

async fn handle_insert(mut stream: TcpStream, ctx: &ProxyContext) -> Result<()> {
	let datalength = read_u32(&mut stream).await?;
	let mut payload = vec![0u8; datalength as usize];
	stream.read_exact(&mut payload).await.map_err(Error::Io)?;

	let encoded = encode(&ctx.catalogue, &payload)?;
	let key_bytes = encoded.key.to_bytes();

	stream
		.write_all(&encoded.key.keylen().to_be_bytes())
		.await
		.map_err(Error::Io)?;
	stream.write_all(&datalength.to_be_bytes()).await.map_err(Error::Io)?;
	stream.write_all(&key_bytes[4..]).await.map_err(Error::Io)?;
	stream.shutdown().await.map_err(Error::Io)?;

	// The client already owns the key; a scatter failure must not be
	// reported back to it (there is nothing left to report it to).
	if let Err(e) = anarcast_net::scatter_encoded(&ctx.membership, ctx.anarcast_port, &encoded, ctx.concurrency).await {
		warn!("insert: scatter did not complete: {}", e);
	}

	Ok(())
}

async fn handle_request(mut stream: TcpStream, ctx: &ProxyContext) -> Result<()> {
	let keylen = read_u32(&mut stream).await?;
	anarcast_coding::key::validate_keylen(keylen)?;
	let datalength = read_u32(&mut stream).await?;

	let mut hash_bytes = vec![0u8; (keylen - 4) as usize];
	stream.read_exact(&mut hash_bytes).await.map_err(Error::Io)?;

	let (sizing, _graph) = compute_sizing(&ctx.catalogue, datalength as u64)?;
	let key = Key::from_bytes(datalength, &hash_bytes, sizing.dbc as usize)?;

	let blocks: Vec<Option<Bytes>> =
		anarcast_net::gather_for_key(&ctx.membership, ctx.anarcast_port, sizing.blocksize, &key, ctx.concurrency).await?;
	let payload = decode(&ctx.catalogue, &key, &blocks, sizing.blocksize)?;

	stream.write_all(&datalength.to_be_bytes()).await.map_err(Error::Io)?;
	stream.write_all(&payload).await.map_err(Error::Io)?;
	stream.shutdown().await.map_err(Error::Io)?;

	Ok(())
}

#[cfg(test)]
mod test {
	use std::collections::HashMap;
	use std::net::SocketAddr;
	use std::sync::Arc;

	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;
	use tokio::sync::Mutex;

	use anarcast_util::data::{hash, Hash};

	use super::*;

	/// A minimal in-memory stand-in for a storage server: stores whatever
	/// blocks are sent to it and serves them back by hash, per §6's
	/// proxy<->storage-server protocol.
	async fn spawn_mock_storage_server() -> SocketAddr {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let store: Arc<Mutex<HashMap<Hash, Vec<u8>>>> = Arc::new(Mutex::new(HashMap::new()));

		tokio::spawn(async move {
			loop {
				let (mut sock, _) = match listener.accept().await {
					Ok(x) => x,
					Err(_) => return,
				};
				let store = store.clone();
				tokio::spawn(async move {
					let mut tag = [0u8; 1];
					if sock.read_exact(&mut tag).await.is_err() {
						return;
					}
					match tag[0] {
						b'i' => {
							let mut len = [0u8; 4];
							if sock.read_exact(&mut len).await.is_err() {
								return;
							}
							let blocksize = u32::from_be_bytes(len) as usize;
							let mut body = vec![0u8; blocksize];
							if sock.read_exact(&mut body).await.is_err() {
								return;
							}
							let h = hash(&body);
							store.lock().await.insert(h, body);
						}
						b'r' => {
							let mut want = [0u8; 20];
							if sock.read_exact(&mut want).await.is_err() {
								return;
							}
							let target = Hash::from_slice(&want).unwrap();
							let found = store.lock().await.get(&target).cloned();
							match found {
								Some(body) => {
									let _ = sock.write_all(&(body.len() as u32).to_be_bytes()).await;
									let _ = sock.write_all(&body).await;
								}
								None => {
									// Not found: close without writing anything.
								}
							}
						}
						_ => {}
					}
				});
			}
		});

		addr
	}

	async fn spawn_proxy(ctx: Arc<ProxyContext>) -> SocketAddr {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			loop {
				let (stream, _) = match listener.accept().await {
					Ok(x) => x,
					Err(_) => return,
				};
				let ctx = ctx.clone();
				tokio::spawn(async move {
					let _ = handle_connection(stream, &ctx).await;
				});
			}
		});
		addr
	}

	async fn client_insert(proxy_addr: SocketAddr, payload: &[u8]) -> (u32, u32, Vec<u8>) {
		let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
		stream.write_all(&[b'i']).await.unwrap();
		stream.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
		stream.write_all(payload).await.unwrap();

		let keylen = read_u32(&mut stream).await.unwrap();
		let datalength = read_u32(&mut stream).await.unwrap();
		let mut hash_bytes = vec![0u8; (keylen - 4) as usize];
		stream.read_exact(&mut hash_bytes).await.unwrap();
		(keylen, datalength, hash_bytes)
	}

	async fn client_request(proxy_addr: SocketAddr, keylen: u32, datalength: u32, hash_bytes: &[u8]) -> Vec<u8> {
		let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
		stream.write_all(&[b'r']).await.unwrap();
		stream.write_all(&keylen.to_be_bytes()).await.unwrap();
		stream.write_all(&datalength.to_be_bytes()).await.unwrap();
		stream.write_all(hash_bytes).await.unwrap();

		let got_datalength = read_u32(&mut stream).await.unwrap();
		let mut payload = vec![0u8; got_datalength as usize];
		stream.read_exact(&mut payload).await.unwrap();
		payload
	}

	/// Drives the client protocol end to end over real TCP loopback: insert
	/// a payload, then echo the `keylen` the proxy returned straight back
	/// into a request, exactly as §6 describes and §8 scenario 1 requires.
	/// This is the round trip that `validate_keylen` previously broke for
	/// every well-formed key.
	#[tokio::test]
	async fn insert_then_request_round_trips_over_loopback() {
		let storage_addr = spawn_mock_storage_server().await;
		let storage_port = storage_addr.port();

		let membership = Membership::new();
		let ip_as_u32 = match storage_addr.ip() {
			std::net::IpAddr::V4(v4) => u32::from(v4),
			_ => unreachable!(),
		};
		membership.add(ip_as_u32).await.unwrap();

		let ctx = Arc::new(ProxyContext {
			catalogue: GraphCatalogue::synthetic(),
			membership,
			anarcast_port: storage_port,
			concurrency: 8,
		});
		let proxy_addr = spawn_proxy(ctx).await;

		let payload = b"hello";
		let (keylen, datalength, hash_bytes) = client_insert(proxy_addr, payload).await;
		assert_eq!(datalength, payload.len() as u32);

		let returned = client_request(proxy_addr, keylen, datalength, &hash_bytes).await;
		assert_eq!(returned, payload);
	}
}
