//! The 20-byte digest type and the pure hash primitive `H`.
//!
//! The hash primitive itself is an external collaborator per the design:
//! callers only rely on it being a fixed-width, deterministic function of
//! the input bytes. We pick SHA-1 because `HASH_LEN` is fixed at 20 bytes
//! throughout the wire protocol, matching the original system's digest
//! width exactly.
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};

pub const HASH_LEN: usize = 20;

/// A 20-byte opaque digest, totally ordered by unsigned lexicographic compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
	pub const ZERO: Hash = Hash([0u8; HASH_LEN]);
	pub const MAX: Hash = Hash([0xFFu8; HASH_LEN]);

	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	pub fn from_slice(s: &[u8]) -> Option<Hash> {
		if s.len() != HASH_LEN {
			return None;
		}
		let mut b = [0u8; HASH_LEN];
		b.copy_from_slice(s);
		Some(Hash(b))
	}
}

impl AsRef<[u8]> for Hash {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl From<[u8; HASH_LEN]> for Hash {
	fn from(b: [u8; HASH_LEN]) -> Hash {
		Hash(b)
	}
}

impl PartialOrd for Hash {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Hash {
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.cmp(&other.0)
	}
}

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", hex::encode(&self.0[..4]))
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", hex::encode(self.0))
	}
}

/// `H(bytes) -> digest`, the pure hashing primitive the whole design is
/// built atop.
pub fn hash(bytes: &[u8]) -> Hash {
	let mut hasher = Sha1::new();
	hasher.update(bytes);
	let out = hasher.finalize();
	let mut b = [0u8; HASH_LEN];
	b.copy_from_slice(&out);
	Hash(b)
}

/// Hash of a 32-bit server address, using its network-order (big-endian)
/// byte representation — this is the byte layout the inform server
/// delivers, and it must stay fixed for routing to be stable.
pub fn hash_address(addr: u32) -> Hash {
	hash(&addr.to_be_bytes())
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn hash_is_deterministic_and_20_bytes() {
		let a = hash(b"hello");
		let b = hash(b"hello");
		assert_eq!(a, b);
		assert_eq!(a.as_slice().len(), HASH_LEN);
	}

	#[test]
	fn hash_ordering_is_lexicographic() {
		let a = Hash([0, 0, 0]
			.iter()
			.chain(std::iter::repeat(&0).take(17))
			.cloned()
			.collect::<Vec<u8>>()
			.try_into()
			.unwrap());
		let b = Hash::MAX;
		assert!(a < b);
	}

	#[test]
	fn address_hash_is_stable_across_calls() {
		assert_eq!(hash_address(0x01020304), hash_address(0x01020304));
	}
}
