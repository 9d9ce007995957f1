//! The key: the self-describing identifier of a stored payload.
//!
//! `key = datalength(u32, big-endian) ‖ H_plain ‖ H_d[0..dbc) ‖ H_c[0..cbc)`
use anarcast_util::data::{Hash, HASH_LEN};
use anarcast_util::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
	pub datalength: u32,
	pub plain_hash: Hash,
	pub data_hashes: Vec<Hash>,
	pub check_hashes: Vec<Hash>,
}

impl Key {
	pub fn dbc(&self) -> usize {
		self.data_hashes.len()
	}

	pub fn cbc(&self) -> usize {
		self.check_hashes.len()
	}

	/// Total number of blocks (data + check) this key describes.
	pub fn block_count(&self) -> usize {
		self.dbc() + self.cbc()
	}

	/// Length in bytes of the encoded key, per the wire format.
	pub fn keylen(&self) -> u32 {
		4 + (1 + self.block_count() as u32) * HASH_LEN as u32
	}

	/// All block hashes in wire order: data hashes first, then check hashes.
	pub fn all_block_hashes(&self) -> impl Iterator<Item = &Hash> {
		self.data_hashes.iter().chain(self.check_hashes.iter())
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(self.keylen() as usize);
		out.extend_from_slice(&self.datalength.to_be_bytes());
		out.extend_from_slice(self.plain_hash.as_slice());
		for h in self.all_block_hashes() {
			out.extend_from_slice(h.as_slice());
		}
		out
	}

	/// Parses a key from `datalength` (already read separately off the
	/// wire, per §6's client protocol) and the `keylen - 4` hash bytes
	/// that follow it. `dbc` and `cbc` are recovered implicitly from how
	/// many hashes follow, which requires the caller to also know the
	/// split point (the data/check boundary) — callers that only have
	/// the raw key bytes should use [`Key::from_bytes`] together with a
	/// graph catalogue to recover `dbc`/`cbc` from `datalength`.
	pub fn from_parts(datalength: u32, plain_hash: Hash, data_hashes: Vec<Hash>, check_hashes: Vec<Hash>) -> Key {
		Key {
			datalength,
			plain_hash,
			data_hashes,
			check_hashes,
		}
	}

	/// Parses a full key buffer (`datalength ‖ hashes`) given the number
	/// of data blocks expected (derived from `datalength` via the sizing
	/// rules). `hash_bytes.len()` must equal `(1 + dbc + cbc) * 20`.
	pub fn from_bytes(datalength: u32, hash_bytes: &[u8], dbc: usize) -> Result<Key> {
		if hash_bytes.len() < HASH_LEN || (hash_bytes.len() - HASH_LEN) % HASH_LEN != 0 {
			return Err(Error::BadKeyLength(4 + hash_bytes.len() as u32));
		}
		let total_hashes = (hash_bytes.len() - HASH_LEN) / HASH_LEN;
		if dbc > total_hashes {
			return Err(Error::Message("key too short for declared data block count".into()));
		}
		let cbc = total_hashes - dbc;

		let plain_hash = Hash::from_slice(&hash_bytes[0..HASH_LEN]).unwrap();
		let mut data_hashes = Vec::with_capacity(dbc);
		let mut check_hashes = Vec::with_capacity(cbc);
		for i in 0..dbc {
			let off = HASH_LEN + i * HASH_LEN;
			data_hashes.push(Hash::from_slice(&hash_bytes[off..off + HASH_LEN]).unwrap());
		}
		for i in 0..cbc {
			let off = HASH_LEN + (dbc + i) * HASH_LEN;
			check_hashes.push(Hash::from_slice(&hash_bytes[off..off + HASH_LEN]).unwrap());
		}

		Ok(Key {
			datalength,
			plain_hash,
			data_hashes,
			check_hashes,
		})
	}
}

/// Validates a raw `keylen` value as received on the client protocol.
/// `keylen` counts the 4-byte `datalength` prefix plus the hash vector, so
/// it is the hash-vector portion (`keylen - 4`) that must be a positive
/// multiple of 20 — `keylen` itself is never a multiple of 20 for a
/// well-formed key (`keylen = 4 + (1+dbc+cbc)*20`).
pub fn validate_keylen(keylen: u32) -> Result<()> {
	if keylen <= 4 + HASH_LEN as u32 || (keylen - 4) % HASH_LEN as u32 != 0 {
		return Err(Error::BadKeyLength(keylen));
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use anarcast_util::data::hash;

	#[test]
	fn keylen_matches_formula() {
		let key = Key::from_parts(5, hash(b"x"), vec![hash(b"a")], vec![hash(b"b"), hash(b"c")]);
		assert_eq!(key.keylen(), 4 + (1 + 1 + 2) * 20);
	}

	#[test]
	fn round_trips_through_bytes() {
		let key = Key::from_parts(
			123,
			hash(b"plain"),
			vec![hash(b"d0"), hash(b"d1")],
			vec![hash(b"c0")],
		);
		let bytes = key.to_bytes();
		let parsed = Key::from_bytes(123, &bytes[4..], 2).unwrap();
		assert_eq!(parsed, key);
	}

	#[test]
	fn validate_keylen_rejects_short_or_misaligned() {
		assert!(validate_keylen(20).is_err());
		assert!(validate_keylen(21).is_err());
		assert!(validate_keylen(24).is_err());
		assert!(validate_keylen(40).is_err());
	}

	#[test]
	fn validate_keylen_accepts_real_key_lengths() {
		// dbc=1, cbc=0: keylen = 4 + (1+1+0)*20.
		assert!(validate_keylen(44).is_ok());
		// The spec's own "hello" scenario: dbc=1, cbc=1.
		let key = Key::from_parts(5, hash(b"x"), vec![hash(b"d")], vec![hash(b"c")]);
		assert!(validate_keylen(key.keylen()).is_ok());
	}
}
