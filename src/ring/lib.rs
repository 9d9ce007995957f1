//! Consistent-hashing membership: the AVL-balanced routing tree, the
//! concurrency-safe handle around it, and the inform client that seeds it.
#[macro_use]
extern crate tracing;

pub mod inform;
pub mod membership;
pub mod tree;

pub use membership::Membership;
pub use tree::Ring;
