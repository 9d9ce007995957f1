//! Scatter and gather: the two engines that move blocks between the proxy
//! and the storage servers the membership tree routes to.
#[macro_use]
extern crate tracing;

pub mod gather;
pub mod scatter;
mod wire;

pub use gather::{gather, gather_for_key};
pub use scatter::{scatter, scatter_encoded};
