//! The scatter engine: pushes every non-skipped block to its routed
//! server, restarting against the successor on any write failure.
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::AsyncWriteExt;

use anarcast_coding::Encoded;
use anarcast_ring::Membership;
use anarcast_util::data::Hash;
use anarcast_util::error::{Error, Result};

use crate::wire::connect;

/// Connections in flight at once, across the whole scatter call.
pub const CONCURRENCY: usize = 8;

/// Pushes `blocks[i]` to `route(hashes[i])` for every `i` not masked by
/// `skip`, holding at most `concurrency` connections in flight at once.
/// Returns once every non-skipped block has been transmitted in full; a
/// server that fails mid-write is evicted from `membership` and the block
/// is restarted against the new successor, without limit.
pub async fn scatter(
	membership: &Membership,
	port: u16,
	blocksize: usize,
	blocks: &[Bytes],
	hashes: &[Hash],
	skip: Option<&[bool]>,
	concurrency: usize,
) -> Result<()> {
	let indices: Vec<usize> = (0..blocks.len())
		.filter(|&i| !skip.map(|s| s[i]).unwrap_or(false))
		.collect();

	let mut pending = indices.into_iter();
	let mut in_flight = FuturesUnordered::new();

	for _ in 0..concurrency.max(1) {
		match pending.next() {
			Some(i) => in_flight.push(insert_one(membership, port, blocksize, blocks[i].clone(), hashes[i])),
			None => break,
		}
	}

	while let Some(result) = in_flight.next().await {
		result?;
		if let Some(i) = pending.next() {
			in_flight.push(insert_one(membership, port, blocksize, blocks[i].clone(), hashes[i]));
		}
	}

	Ok(())
}

/// Convenience wrapper for the common case: scatter every block an
/// [`Encoded`] payload produced, none skipped.
pub async fn scatter_encoded(membership: &Membership, port: u16, encoded: &Encoded, concurrency: usize) -> Result<()> {
	let hashes: Vec<Hash> = encoded.key.all_block_hashes().copied().collect();
	scatter(membership, port, encoded.blocksize, &encoded.blocks, &hashes, None, concurrency).await
}

async fn insert_one(membership: &Membership, port: u16, blocksize: usize, block: Bytes, hash: Hash) -> Result<()> {
	loop {
		let addr = membership.route(hash).await?;
		match try_insert(addr, port, blocksize, &block).await {
			Ok(()) => return Ok(()),
			Err(e) => {
				warn!("scatter: write to {:08x} failed ({}), evicting and re-routing", addr, e);
				let _ = membership.remove_by_address(addr).await;
			}
		}
	}
}

async fn try_insert(addr: u32, port: u16, blocksize: usize, block: &[u8]) -> Result<()> {
	let mut stream = connect(addr, port).await?;
	stream.write_all(&[b'i']).await.map_err(Error::Io)?;
	stream
		.write_all(&(blocksize as u32).to_be_bytes())
		.await
		.map_err(Error::Io)?;
	stream.write_all(block).await.map_err(Error::Io)?;
	Ok(())
}
