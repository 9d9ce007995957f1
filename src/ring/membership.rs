//! The shared, concurrency-safe handle to a [`Ring`]. Routing is a read;
//! add/remove are writes; `tokio::sync::RwLock` gives routing many
//! concurrent readers while an add or an eviction-triggered removal holds
//! the tree exclusively, matching the single-writer/multi-reader policy the
//! design calls for.
use std::sync::Arc;

use tokio::sync::RwLock;

use anarcast_util::data::Hash;
use anarcast_util::error::Result;

use crate::tree::Ring;

/// Cheaply cloneable handle shared by every worker task.
#[derive(Clone)]
pub struct Membership {
	inner: Arc<RwLock<Ring>>,
}

impl Membership {
	pub fn new() -> Membership {
		Membership {
			inner: Arc::new(RwLock::new(Ring::new())),
		}
	}

	pub async fn add(&self, address: u32) -> Result<()> {
		let mut guard = self.inner.write().await;
		let result = guard.add(address);
		if result.is_ok() {
			info!("membership: added server {:08x}", address);
		}
		result
	}

	pub async fn remove_by_address(&self, address: u32) -> Result<()> {
		let mut guard = self.inner.write().await;
		let result = guard.remove_by_address(address);
		if result.is_ok() {
			info!("membership: evicted server {:08x}", address);
		}
		result
	}

	pub async fn route(&self, hash: Hash) -> Result<u32> {
		let guard = self.inner.read().await;
		guard.route(hash)
	}

	pub async fn len(&self) -> usize {
		self.inner.read().await.len()
	}
}

impl Default for Membership {
	fn default() -> Membership {
		Membership::new()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn add_route_evict_round_trip() {
		let m = Membership::new();
		for addr in 1..10u32 {
			m.add(addr).await.unwrap();
		}
		assert_eq!(m.len().await, 9);

		let h = anarcast_util::data::hash_address(123);
		let routed = m.route(h).await.unwrap();
		m.remove_by_address(routed).await.unwrap();
		let rerouted = m.route(h).await.unwrap();
		assert_ne!(routed, rerouted);
		assert_eq!(m.len().await, 8);
	}

	#[tokio::test]
	async fn concurrent_routers_see_a_consistent_tree() {
		let m = Membership::new();
		for addr in 1..50u32 {
			m.add(addr).await.unwrap();
		}

		let mut tasks = Vec::new();
		for i in 0..16u32 {
			let m = m.clone();
			tasks.push(tokio::spawn(async move {
				let h = anarcast_util::data::hash_address(i);
				m.route(h).await.unwrap()
			}));
		}
		for t in tasks {
			t.await.unwrap();
		}
	}
}
