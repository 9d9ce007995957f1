//! Parses the small set of named FCP response messages: a first line
//! naming the message, zero or more `Key=Value` lines, terminated by either
//! a bare `EndMessage` line or (for `Success`/`KeyCollision`, which the
//! original client reads no further fields from before moving on) simply
//! the next message boundary.
use std::collections::HashMap;
use std::io::BufRead;

use anarcast_util::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FcpResponse {
	Success { uri: String },
	KeyCollision { uri: String },
	Restarted,
	Pending,
	RouteNotFound { unreachable: u32, restarted: u32, rejected: u32 },
	FormatError { reason: String },
	Failed { reason: String },
	SegmentHeader { fec_algorithm: String, file_length: u64, offset: u64 },
	BlocksEncoded { block_count: u32 },
	DataChunk { length: u32 },
	MadeMetadata,
}

/// Reads one response message from `r`: the message-name line, then
/// `Key=Value` lines up to and including `EndMessage`.
pub fn parse<R: BufRead>(r: &mut R) -> Result<FcpResponse> {
	let name = read_line(r)?;
	let mut fields = HashMap::new();
	loop {
		let line = read_line(r)?;
		if line == "EndMessage" || line.is_empty() {
			break;
		}
		if let Some((k, v)) = line.split_once('=') {
			fields.insert(k.to_string(), v.to_string());
		}
	}
	build(&name, fields)
}

fn read_line<R: BufRead>(r: &mut R) -> Result<String> {
	let mut line = String::new();
	let n = r
		.read_line(&mut line)
		.map_err(Error::Io)?;
	if n == 0 {
		return Err(Error::Message("connection closed while reading FCP response".into()));
	}
	Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}

fn build(name: &str, mut fields: HashMap<String, String>) -> Result<FcpResponse> {
	let take = |fields: &mut HashMap<String, String>, key: &str| fields.remove(key).unwrap_or_default();
	let take_u32 = |fields: &mut HashMap<String, String>, key: &str| {
		u32::from_str_radix(&take(fields, key), 16).unwrap_or(0)
	};
	let take_u64 = |fields: &mut HashMap<String, String>, key: &str| {
		u64::from_str_radix(&take(fields, key), 16).unwrap_or(0)
	};

	Ok(match name {
		"Success" => FcpResponse::Success { uri: take(&mut fields, "URI") },
		"KeyCollision" => FcpResponse::KeyCollision { uri: take(&mut fields, "URI") },
		"Restarted" => FcpResponse::Restarted,
		"Pending" => FcpResponse::Pending,
		"RouteNotFound" => FcpResponse::RouteNotFound {
			unreachable: take_u32(&mut fields, "Unreachable"),
			restarted: take_u32(&mut fields, "Restarted"),
			rejected: take_u32(&mut fields, "Rejected"),
		},
		"FormatError" => FcpResponse::FormatError { reason: take(&mut fields, "Reason") },
		"Failed" => FcpResponse::Failed { reason: take(&mut fields, "Reason") },
		"SegmentHeader" => FcpResponse::SegmentHeader {
			fec_algorithm: take(&mut fields, "FECAlgorithm"),
			file_length: take_u64(&mut fields, "FileLength"),
			offset: take_u64(&mut fields, "Offset"),
		},
		"BlocksEncoded" => FcpResponse::BlocksEncoded {
			block_count: take_u32(&mut fields, "BlockCount"),
		},
		"DataChunk" => FcpResponse::DataChunk {
			length: take_u32(&mut fields, "Length"),
		},
		"MadeMetadata" => FcpResponse::MadeMetadata,
		other => return Err(Error::Message(format!("unknown FCP response message: {}", other))),
	})
}
