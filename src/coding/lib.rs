//! The erasure-coding pipeline: payload <-> (key, data blocks, check blocks).
pub mod codec;
pub mod key;
pub mod sizing;

pub use codec::{decode, encode, Encoded};
pub use key::Key;
pub use sizing::{compute_sizing, Sizing};
