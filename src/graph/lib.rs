//! The graph catalogue: `GRAPHCOUNT` precomputed bipartite XOR graphs,
//! one per possible data-block count, memory-mapped from a file laid out
//! as consecutive `dbc: u16, cbc: u16, bits: [u8]` records.
#[macro_use]
extern crate tracing;

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use anarcast_util::error::{Error, Result};

/// Number of precomputed graphs in the catalogue; graph at index `i`
/// (0-based) covers payloads needing `i + 1` data blocks.
pub const GRAPHCOUNT: usize = 512;

enum GraphBits {
	Mapped { mmap: Arc<Mmap>, offset: usize, len: usize },
	Owned(Vec<u8>),
}

impl GraphBits {
	fn get(&self, idx: usize) -> u8 {
		match self {
			GraphBits::Mapped { mmap, offset, .. } => mmap[offset + idx],
			GraphBits::Owned(v) => v[idx],
		}
	}
}

/// One bipartite graph: `dbc` data blocks, `cbc` check blocks, and a
/// `dbc x cbc` bit matrix packed row-major, most-significant bit first.
pub struct Graph {
	pub dbc: u16,
	pub cbc: u16,
	bits: GraphBits,
}

impl Graph {
	/// `edge(d, c) == true` iff check block `c` XORs in data block `d`.
	pub fn edge(&self, d: usize, c: usize) -> bool {
		debug_assert!(d < self.dbc as usize && c < self.cbc as usize);
		let n = d * self.cbc as usize + c;
		let byte = self.bits.get(n / 8);
		(byte & (0x80 >> (n % 8))) != 0
	}

	/// All data blocks that check block `c` covers.
	pub fn peers_of_check(&self, c: usize) -> Vec<usize> {
		(0..self.dbc as usize).filter(|&d| self.edge(d, c)).collect()
	}

	/// All check blocks that data block `d` contributes to.
	pub fn checks_of_data(&self, d: usize) -> Vec<usize> {
		(0..self.cbc as usize).filter(|&c| self.edge(d, c)).collect()
	}
}

/// `GRAPHCOUNT` graphs, indexed by data-block count minus one, loaded
/// once at process start and immutable thereafter.
pub struct GraphCatalogue {
	graphs: Vec<Graph>,
}

impl GraphCatalogue {
	/// Opens the graph file and memory-maps it for the process lifetime.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<GraphCatalogue> {
		let file = File::open(path.as_ref())?;
		// Safety: the graph file is treated as read-only and is not expected
		// to be truncated or mutated concurrently by another process.
		let mmap = unsafe { Mmap::map(&file)? };
		let mmap = Arc::new(mmap);

		let mut graphs = Vec::with_capacity(GRAPHCOUNT);
		let mut pos = 0usize;
		for _ in 0..GRAPHCOUNT {
			if pos + 4 > mmap.len() {
				return Err(Error::Message("graph file truncated".into()));
			}
			let dbc = u16::from_le_bytes([mmap[pos], mmap[pos + 1]]);
			let cbc = u16::from_le_bytes([mmap[pos + 2], mmap[pos + 3]]);
			pos += 4;

			let nbits = dbc as usize * cbc as usize;
			let nbytes = (nbits + 7) / 8;
			if pos + nbytes > mmap.len() {
				return Err(Error::Message("graph file truncated".into()));
			}

			graphs.push(Graph {
				dbc,
				cbc,
				bits: GraphBits::Mapped {
					mmap: mmap.clone(),
					offset: pos,
					len: nbytes,
				},
			});
			pos += nbytes;
		}

		info!("Loaded {} graphs from graph file", graphs.len());
		Ok(GraphCatalogue { graphs })
	}

	/// Builds a deterministic, in-memory catalogue without requiring a
	/// graph file on disk: check block `c` covers data blocks `{2c, 2c+1}`.
	/// Used for tests and for zero-config operation.
	pub fn synthetic() -> GraphCatalogue {
		let mut graphs = Vec::with_capacity(GRAPHCOUNT);
		for i in 0..GRAPHCOUNT {
			let dbc = (i + 1) as u16;
			let cbc = std::cmp::max(1, (dbc as usize + 1) / 2) as u16;
			let nbits = dbc as usize * cbc as usize;
			let mut bytes = vec![0u8; (nbits + 7) / 8];
			for d in 0..dbc as usize {
				let c = d / 2;
				let n = d * cbc as usize + c;
				bytes[n / 8] |= 0x80 >> (n % 8);
			}
			graphs.push(Graph {
				dbc,
				cbc,
				bits: GraphBits::Owned(bytes),
			});
		}
		GraphCatalogue { graphs }
	}

	/// Returns the graph whose `dbc` field equals `dbc`.
	pub fn lookup(&self, dbc: u16) -> Result<&Graph> {
		if dbc == 0 || dbc as usize > GRAPHCOUNT {
			return Err(Error::GraphUnavailable(dbc));
		}
		Ok(&self.graphs[dbc as usize - 1])
	}
}
