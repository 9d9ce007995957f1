//! Shared per-connection wire primitives used by both engines: opening a
//! connection to a routed server address and the "read 4 bytes or a clean
//! close" helper the gather protocol's length stage needs.
use std::io;
use std::net::Ipv4Addr;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use anarcast_util::error::{Error, Result};

/// Storage-server addresses are 32-bit IPv4 values; the storage port is
/// fixed cluster-wide and supplied by the caller's configuration.
pub async fn connect(addr: u32, port: u16) -> Result<TcpStream> {
	let ip = Ipv4Addr::from(addr);
	TcpStream::connect((ip, port)).await.map_err(Error::Io)
}

/// The outcome of reading a fixed-size field that may legitimately be
/// absent: a clean close before any byte arrives is `Absent`; a close
/// partway through is a hard I/O error, not `Absent`.
pub enum FixedRead {
	Absent,
	Present([u8; 4]),
}

pub async fn read_u32_or_absent(stream: &mut TcpStream) -> Result<FixedRead> {
	let mut buf = [0u8; 4];
	let mut filled = 0usize;
	loop {
		let n = stream.read(&mut buf[filled..]).await.map_err(Error::Io)?;
		if n == 0 {
			if filled == 0 {
				return Ok(FixedRead::Absent);
			}
			return Err(Error::Io(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				"connection closed mid-field",
			)));
		}
		filled += n;
		if filled == buf.len() {
			return Ok(FixedRead::Present(buf));
		}
	}
}
