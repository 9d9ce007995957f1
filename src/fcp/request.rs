//! Serializes the `ClientPut` request line: a fixed key=value header block
//! terminated by a bare `Data\n` line, after which the raw payload bytes
//! follow directly on the wire (no further framing).
use std::io::{self, Write};

/// A legacy `ClientPut` insert request. `hops_to_live` and `data_length`
/// are rendered in hexadecimal, matching the original client's `%x`/`%lx`
/// format specifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPutRequest {
	pub remove_local_key: bool,
	pub uri: String,
	pub hops_to_live: u32,
	pub data_length: u64,
}

impl ClientPutRequest {
	/// Renders the header block, including the trailing `Data\n` line but
	/// not the payload bytes that follow it on the wire.
	pub fn render(&self) -> String {
		format!(
			"ClientPut\nRemoveLocalKey={}\nURI={}\nHopsToLive={:x}\nDataLength={:x}\nData\n",
			if self.remove_local_key { "true" } else { "false" },
			self.uri,
			self.hops_to_live,
			self.data_length,
		)
	}

	pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
		w.write_all(self.render().as_bytes())
	}
}
