//! Encode: payload -> (key, data blocks, check blocks).
//! Decode: key + whatever blocks survived -> payload, repairing missing
//! data blocks from check blocks where the graph permits it.
use std::convert::TryInto;

use bytes::Bytes;

use anarcast_graph::GraphCatalogue;
use anarcast_util::data::hash;
use anarcast_util::error::{Error, Result};

use crate::key::Key;
use crate::sizing::compute_sizing;

/// The result of encoding a payload: the key plus the `dbc + cbc` blocks
/// in wire order (data blocks first, then check blocks).
pub struct Encoded {
	pub key: Key,
	pub blocksize: usize,
	pub blocks: Vec<Bytes>,
}

/// XORs `src` into `dst`, word-at-a-time with a byte tail; the result is
/// identical to a plain byte-wise XOR.
fn xor_into(dst: &mut [u8], src: &[u8]) {
	debug_assert_eq!(dst.len(), src.len());
	const WORD: usize = 8;
	let n_words = dst.len() / WORD;

	for i in 0..n_words {
		let off = i * WORD;
		let d = u64::from_ne_bytes(dst[off..off + WORD].try_into().unwrap());
		let s = u64::from_ne_bytes(src[off..off + WORD].try_into().unwrap());
		dst[off..off + WORD].copy_from_slice(&(d ^ s).to_ne_bytes());
	}
	for i in n_words * WORD..dst.len() {
		dst[i] ^= src[i];
	}
}

/// Encodes `payload` into data and check blocks using the graph selected
/// for its length.
pub fn encode(catalogue: &GraphCatalogue, payload: &[u8]) -> Result<Encoded> {
	let datalength = payload.len() as u64;
	let (sizing, graph) = compute_sizing(catalogue, datalength)?;

	let mut buf = vec![0u8; sizing.total];
	buf[0..payload.len()].copy_from_slice(payload);

	let (data_part, check_part) = buf.split_at_mut(sizing.dlen);
	for c in 0..sizing.cbc as usize {
		let check_block = &mut check_part[c * sizing.blocksize..(c + 1) * sizing.blocksize];
		for d in 0..sizing.dbc as usize {
			if graph.edge(d, c) {
				let data_block = &data_part[d * sizing.blocksize..(d + 1) * sizing.blocksize];
				xor_into(check_block, data_block);
			}
		}
	}

	let plain_hash = hash(payload);

	let mut data_hashes = Vec::with_capacity(sizing.dbc as usize);
	for d in 0..sizing.dbc as usize {
		let start = d * sizing.blocksize;
		data_hashes.push(hash(&buf[start..start + sizing.blocksize]));
	}
	let mut check_hashes = Vec::with_capacity(sizing.cbc as usize);
	for c in 0..sizing.cbc as usize {
		let start = sizing.dlen + c * sizing.blocksize;
		check_hashes.push(hash(&buf[start..start + sizing.blocksize]));
	}

	let key = Key::from_parts(payload.len() as u32, plain_hash, data_hashes, check_hashes);

	let buf = Bytes::from(buf);
	let mut blocks = Vec::with_capacity(sizing.dbc as usize + sizing.cbc as usize);
	for i in 0..(sizing.dbc as usize + sizing.cbc as usize) {
		blocks.push(buf.slice(i * sizing.blocksize..(i + 1) * sizing.blocksize));
	}

	Ok(Encoded {
		key,
		blocksize: sizing.blocksize,
		blocks,
	})
}

/// Attempts to reconstruct the payload from whatever blocks are present.
/// `blocks[i]` is `Some(bytes)` for every block that was fetched and
/// individually hash-verified by the gather engine; `None` otherwise.
/// `blocks` must have exactly `key.block_count()` entries, each of length
/// `blocksize` when present.
pub fn decode(catalogue: &GraphCatalogue, key: &Key, blocks: &[Option<Bytes>], blocksize: usize) -> Result<Bytes> {
	let dbc = key.dbc();
	let cbc = key.cbc();
	if blocks.len() != dbc + cbc {
		return Err(Error::Message("block count does not match key".into()));
	}

	let graph = catalogue.lookup(dbc as u16)?;

	let mut data: Vec<Option<Vec<u8>>> = blocks[0..dbc]
		.iter()
		.map(|b| b.as_ref().map(|x| x.to_vec()))
		.collect();

	loop {
		if data.iter().all(|d| d.is_some()) {
			break;
		}

		let mut progressed = false;
		for d in 0..dbc {
			if data[d].is_some() {
				continue;
			}
			for c in 0..cbc {
				if !graph.edge(d, c) {
					continue;
				}
				let check = match &blocks[dbc + c] {
					Some(b) => b,
					None => continue,
				};
				let peers = graph.peers_of_check(c);
				if !peers.iter().filter(|&&p| p != d).all(|&p| data[p].is_some()) {
					continue;
				}

				let mut reconstructed = check.to_vec();
				for &p in peers.iter().filter(|&&p| p != d) {
					xor_into(&mut reconstructed, data[p].as_ref().unwrap());
				}
				data[d] = Some(reconstructed);
				progressed = true;
				break;
			}
		}

		if !progressed {
			return Err(Error::Unrecoverable);
		}
	}

	let mut payload = Vec::with_capacity(dbc * blocksize);
	for d in data {
		payload.extend_from_slice(&d.unwrap());
	}
	payload.truncate(key.datalength as usize);

	if hash(&payload) != key.plain_hash {
		return Err(Error::PayloadIntegrity);
	}

	Ok(Bytes::from(payload))
}
