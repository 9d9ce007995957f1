//! Error types shared by every anarcast crate.
//!
//! Mirrors the taxonomy the design settled on: I/O transient, protocol,
//! integrity, resource and invariant errors all flow through this single
//! enum so that callers can match on `ErrorKind` to decide whether to
//! abort a session, evict a server, or simply log and move on.
use err_derive::Error;

use crate::data::Hash;

/// Coarse classification of an [`Error`], used by callers that need to
/// decide policy (abort session? evict server? fatal?) without matching
/// on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Io,
	Protocol,
	Integrity,
	Resource,
	Invariant,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(display = "I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "malformed key: {}", _0)]
	Message(String),

	#[error(display = "key length {} is not 4 plus a positive multiple of 20", _0)]
	BadKeyLength(u32),

	#[error(display = "no graph available for {} data blocks", _0)]
	GraphUnavailable(u16),

	#[error(display = "storage server reported block length {}, expected {}", got, expected)]
	BlockLengthMismatch { got: u32, expected: u32 },

	#[error(display = "block {} could not be hash-verified", _0)]
	CorruptBlock(Hash),

	#[error(display = "payload hash mismatch after reconstruction")]
	PayloadIntegrity,

	#[error(display = "too many data blocks are missing to reconstruct the payload")]
	Unrecoverable,

	#[error(display = "membership tree is empty")]
	EmptyMembership,

	#[error(display = "duplicate server address in membership tree")]
	DuplicateAddress,

	#[error(display = "address not present in membership tree")]
	UnknownAddress,

	#[error(display = "TOML error: {}", _0)]
	Toml(#[error(source)] toml::de::Error),
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Io(_) => ErrorKind::Io,
			Error::Message(_) | Error::BadKeyLength(_) | Error::GraphUnavailable(_)
			| Error::BlockLengthMismatch { .. } => ErrorKind::Protocol,
			Error::CorruptBlock(_) | Error::PayloadIntegrity | Error::Unrecoverable => {
				ErrorKind::Integrity
			}
			Error::EmptyMembership | Error::DuplicateAddress | Error::UnknownAddress => {
				ErrorKind::Invariant
			}
			Error::Toml(_) => ErrorKind::Resource,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
