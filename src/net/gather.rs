//! The gather engine: fetches as many blocks as are reachable and
//! hash-verified, restarting against the successor on transient failures
//! and leaving a block unfetched (never restarted) on a clean "don't have
//! it" response or a corrupt read.
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use anarcast_coding::Key;
use anarcast_ring::Membership;
use anarcast_util::data::{hash, Hash};
use anarcast_util::error::{Error, Result};

use crate::wire::{connect, read_u32_or_absent, FixedRead};

pub const CONCURRENCY: usize = 8;

enum FetchOutcome {
	Found(Bytes),
	NotFound,
}

/// Fetches `hashes[i]` for every `i`, routing each through `membership`,
/// holding at most `concurrency` connections in flight at once. The
/// returned vector has one slot per hash: `Some(bytes)` if the block was
/// received and verified, `None` otherwise. Never fails outright except
/// when the membership tree itself becomes empty mid-gather.
pub async fn gather(
	membership: &Membership,
	port: u16,
	blocksize: usize,
	hashes: &[Hash],
	concurrency: usize,
) -> Result<Vec<Option<Bytes>>> {
	let mut out: Vec<Option<Bytes>> = vec![None; hashes.len()];

	let mut pending = 0..hashes.len();
	let mut in_flight = FuturesUnordered::new();

	for _ in 0..concurrency.max(1) {
		match pending.next() {
			Some(i) => in_flight.push(fetch_indexed(membership, port, blocksize, i, hashes[i])),
			None => break,
		}
	}

	while let Some((i, result)) = in_flight.next().await {
		out[i] = result?;
		if let Some(next) = pending.next() {
			in_flight.push(fetch_indexed(membership, port, blocksize, next, hashes[next]));
		}
	}

	Ok(out)
}

/// Convenience wrapper: gather every block a [`Key`] names, in wire order.
pub async fn gather_for_key(
	membership: &Membership,
	port: u16,
	blocksize: usize,
	key: &Key,
	concurrency: usize,
) -> Result<Vec<Option<Bytes>>> {
	let hashes: Vec<Hash> = key.all_block_hashes().copied().collect();
	gather(membership, port, blocksize, &hashes, concurrency).await
}

async fn fetch_indexed(
	membership: &Membership,
	port: u16,
	blocksize: usize,
	index: usize,
	hash: Hash,
) -> (usize, Result<Option<Bytes>>) {
	(index, fetch_one(membership, port, blocksize, hash).await)
}

async fn fetch_one(membership: &Membership, port: u16, blocksize: usize, target: Hash) -> Result<Option<Bytes>> {
	loop {
		let addr = membership.route(target).await?;
		match try_fetch(addr, port, blocksize, target).await {
			Ok(FetchOutcome::Found(b)) => return Ok(Some(b)),
			Ok(FetchOutcome::NotFound) => return Ok(None),
			Err(e) => {
				warn!("gather: fetch from {:08x} failed ({}), evicting and re-routing", addr, e);
				let _ = membership.remove_by_address(addr).await;
			}
		}
	}
}

async fn try_fetch(addr: u32, port: u16, blocksize: usize, target: Hash) -> Result<FetchOutcome> {
	let mut stream = connect(addr, port).await?;
	stream.write_all(&[b'r']).await.map_err(Error::Io)?;
	stream.write_all(target.as_slice()).await.map_err(Error::Io)?;

	let dlen = match read_u32_or_absent(&mut stream).await? {
		FixedRead::Absent => return Ok(FetchOutcome::NotFound),
		FixedRead::Present(bytes) => u32::from_be_bytes(bytes),
	};
	if dlen as usize != blocksize {
		return Ok(FetchOutcome::NotFound);
	}

	let mut body = vec![0u8; blocksize];
	stream.read_exact(&mut body).await.map_err(Error::Io)?;

	if hash(&body) == target {
		Ok(FetchOutcome::Found(Bytes::from(body)))
	} else {
		warn!("gather: block {} failed hash verification", target);
		Ok(FetchOutcome::NotFound)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tokio::net::TcpListener;

	async fn start_source(body: Vec<u8>) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let handle = tokio::spawn(async move {
			let (mut sock, _) = listener.accept().await.unwrap();
			let mut tag = [0u8; 1];
			sock.read_exact(&mut tag).await.unwrap();
			assert_eq!(tag[0], b'r');
			let mut want = [0u8; 20];
			sock.read_exact(&mut want).await.unwrap();
			sock.write_all(&(body.len() as u32).to_be_bytes()).await.unwrap();
			sock.write_all(&body).await.unwrap();
		});
		(addr, handle)
	}

	#[tokio::test]
	async fn gather_fetches_and_verifies() {
		let membership = Membership::new();
		let body = b"a block of data".to_vec();
		let (addr, handle) = start_source(body.clone()).await;
		let ip_as_u32 = match addr.ip() {
			std::net::IpAddr::V4(v4) => u32::from(v4),
			_ => unreachable!(),
		};
		membership.add(ip_as_u32).await.unwrap();

		let h = hash(&body);
		let out = gather(&membership, addr.port(), body.len(), &[h], CONCURRENCY).await.unwrap();
		handle.await.unwrap();

		assert_eq!(out[0].as_deref(), Some(body.as_slice()));
	}

	#[tokio::test]
	async fn absent_block_is_not_found_without_restart() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let handle = tokio::spawn(async move {
			let (sock, _) = listener.accept().await.unwrap();
			drop(sock); // closes immediately: zero bytes at the length stage
		});

		let membership = Membership::new();
		let ip_as_u32 = match addr.ip() {
			std::net::IpAddr::V4(v4) => u32::from(v4),
			_ => unreachable!(),
		};
		membership.add(ip_as_u32).await.unwrap();

		let h = hash(b"missing");
		let out = gather(&membership, addr.port(), 7, &[h], CONCURRENCY).await.unwrap();
		handle.await.unwrap();

		assert!(out[0].is_none());
		assert_eq!(membership.len().await, 1, "absent block must not evict the server");
	}
}
