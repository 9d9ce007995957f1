//! The legacy FCP text-line bridge: a thin, self-contained serializer for
//! `ClientPut` requests and a parser for the named response messages. This
//! is a parallel insert path kept for compatibility; nothing in the coding
//! pipeline, membership tree, or scatter/gather engines depends on it.
#[macro_use]
extern crate tracing;

pub mod request;
pub mod response;

pub use request::ClientPutRequest;
pub use response::{parse, FcpResponse};
