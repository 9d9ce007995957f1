//! Utility crate shared by every anarcast crate: error types, the digest
//! primitive, and configuration-file parsing.
#[macro_use]
extern crate tracing;

pub mod config;
pub mod data;
pub mod error;
