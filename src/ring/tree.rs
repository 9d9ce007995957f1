//! The membership tree itself: an AVL-balanced BST of `(address, H(address))`
//! pairs, keyed by hash, supporting `add`, `remove_by_address` and `route`
//! (successor-with-wraparound).
//!
//! Nodes live in a flat arena (`Vec<Slot>`) addressed by index rather than
//! behind `Box`/raw pointers, so rotations splice indices in place instead of
//! cloning subtrees — the arena is the safe-Rust answer to the source's
//! pointer-stack walk.
use std::cmp::Ordering;

use anarcast_util::data::{hash_address, Hash};
use anarcast_util::error::{Error, Result};

struct Node {
	addr: u32,
	hash: Hash,
	left: Option<usize>,
	right: Option<usize>,
	height: i32,
}

enum Slot {
	Occupied(Node),
	Free,
}

/// A height-balanced binary search tree of storage-server addresses, keyed
/// by `H(address)`. Pure and synchronous; [`crate::membership::Membership`]
/// adds the single-writer/multi-reader guard around it.
#[derive(Default)]
pub struct Ring {
	slots: Vec<Slot>,
	free: Vec<usize>,
	root: Option<usize>,
	len: usize,
}

impl Ring {
	pub fn new() -> Ring {
		Ring::default()
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	fn node(&self, idx: usize) -> &Node {
		match &self.slots[idx] {
			Slot::Occupied(n) => n,
			Slot::Free => panic!("anarcast_ring: dangling index into freed slot"),
		}
	}

	fn node_mut(&mut self, idx: usize) -> &mut Node {
		match &mut self.slots[idx] {
			Slot::Occupied(n) => n,
			Slot::Free => panic!("anarcast_ring: dangling index into freed slot"),
		}
	}

	fn alloc(&mut self, node: Node) -> usize {
		if let Some(idx) = self.free.pop() {
			self.slots[idx] = Slot::Occupied(node);
			idx
		} else {
			self.slots.push(Slot::Occupied(node));
			self.slots.len() - 1
		}
	}

	fn free_slot(&mut self, idx: usize) {
		self.slots[idx] = Slot::Free;
		self.free.push(idx);
	}

	fn height(&self, idx: Option<usize>) -> i32 {
		idx.map(|i| self.node(i).height).unwrap_or(0)
	}

	fn update_height(&mut self, idx: usize) {
		let (l, r) = (self.node(idx).left, self.node(idx).right);
		let h = 1 + self.height(l).max(self.height(r));
		self.node_mut(idx).height = h;
	}

	fn balance_factor(&self, idx: usize) -> i32 {
		self.height(self.node(idx).left) - self.height(self.node(idx).right)
	}

	/// Left rotation, pivoting on `idx`'s right child.
	fn rotate_left(&mut self, idx: usize) -> usize {
		let pivot = self.node(idx).right.expect("rotate_left needs a right child");
		let pivot_left = self.node(pivot).left;
		self.node_mut(idx).right = pivot_left;
		self.node_mut(pivot).left = Some(idx);
		self.update_height(idx);
		self.update_height(pivot);
		pivot
	}

	/// Right rotation, pivoting on `idx`'s left child.
	fn rotate_right(&mut self, idx: usize) -> usize {
		let pivot = self.node(idx).left.expect("rotate_right needs a left child");
		let pivot_right = self.node(pivot).right;
		self.node_mut(idx).left = pivot_right;
		self.node_mut(pivot).right = Some(idx);
		self.update_height(idx);
		self.update_height(pivot);
		pivot
	}

	/// Restores the AVL balance invariant at `idx`, assuming both children
	/// are already balanced. Returns the (possibly new) subtree root.
	fn rebalance(&mut self, idx: usize) -> usize {
		self.update_height(idx);
		let bf = self.balance_factor(idx);

		if bf > 1 {
			let left = self.node(idx).left.unwrap();
			if self.balance_factor(left) < 0 {
				let new_left = self.rotate_left(left);
				self.node_mut(idx).left = Some(new_left);
			}
			self.rotate_right(idx)
		} else if bf < -1 {
			let right = self.node(idx).right.unwrap();
			if self.balance_factor(right) > 0 {
				let new_right = self.rotate_right(right);
				self.node_mut(idx).right = Some(new_right);
			}
			self.rotate_left(idx)
		} else {
			idx
		}
	}

	/// Adds `address` to the tree. Fatal (`DuplicateAddress`) if its hash is
	/// already present.
	pub fn add(&mut self, address: u32) -> Result<()> {
		let hash = hash_address(address);
		self.root = Some(self.insert(self.root, address, hash)?);
		self.len += 1;
		Ok(())
	}

	fn insert(&mut self, idx: Option<usize>, addr: u32, hash: Hash) -> Result<usize> {
		let idx = match idx {
			None => {
				return Ok(self.alloc(Node {
					addr,
					hash,
					left: None,
					right: None,
					height: 1,
				}))
			}
			Some(idx) => idx,
		};

		match hash.cmp(&self.node(idx).hash) {
			Ordering::Equal => return Err(Error::DuplicateAddress),
			Ordering::Less => {
				let left = self.node(idx).left;
				let new_left = self.insert(left, addr, hash)?;
				self.node_mut(idx).left = Some(new_left);
			}
			Ordering::Greater => {
				let right = self.node(idx).right;
				let new_right = self.insert(right, addr, hash)?;
				self.node_mut(idx).right = Some(new_right);
			}
		}

		Ok(self.rebalance(idx))
	}

	/// Removes the server with the given `address`. Fatal (`UnknownAddress`)
	/// if it is not present.
	pub fn remove_by_address(&mut self, address: u32) -> Result<()> {
		let hash = hash_address(address);
		let root = self.root.ok_or(Error::UnknownAddress)?;
		self.root = self.remove(root, hash)?;
		self.len -= 1;
		Ok(())
	}

	fn remove(&mut self, idx: usize, target: Hash) -> Result<Option<usize>> {
		let new_subtree = match target.cmp(&self.node(idx).hash) {
			Ordering::Less => {
				let left = self.node(idx).left.ok_or(Error::UnknownAddress)?;
				let new_left = self.remove(left, target)?;
				self.node_mut(idx).left = new_left;
				Some(idx)
			}
			Ordering::Greater => {
				let right = self.node(idx).right.ok_or(Error::UnknownAddress)?;
				let new_right = self.remove(right, target)?;
				self.node_mut(idx).right = new_right;
				Some(idx)
			}
			Ordering::Equal => {
				let (left, right) = (self.node(idx).left, self.node(idx).right);
				match (left, right) {
					(None, None) => {
						self.free_slot(idx);
						None
					}
					(Some(l), None) => {
						self.free_slot(idx);
						Some(l)
					}
					(None, Some(r)) => {
						self.free_slot(idx);
						Some(r)
					}
					(Some(_), Some(r)) => {
						let succ = self.min_index(r);
						let (succ_addr, succ_hash) = (self.node(succ).addr, self.node(succ).hash);
						let new_right = self.remove(r, succ_hash)?;
						self.node_mut(idx).addr = succ_addr;
						self.node_mut(idx).hash = succ_hash;
						self.node_mut(idx).right = new_right;
						Some(idx)
					}
				}
			}
		};

		Ok(new_subtree.map(|i| self.rebalance(i)))
	}

	fn min_index(&self, mut idx: usize) -> usize {
		while let Some(l) = self.node(idx).left {
			idx = l;
		}
		idx
	}

	/// Returns the server whose key is the smallest hash `>= hash`, wrapping
	/// to the minimum key if `hash` exceeds every key in the tree. Fatal
	/// (`EmptyMembership`) if the tree is empty.
	pub fn route(&self, hash: Hash) -> Result<u32> {
		let root = self.root.ok_or(Error::EmptyMembership)?;

		let mut cur = Some(root);
		let mut best: Option<usize> = None;
		while let Some(idx) = cur {
			let node = self.node(idx);
			if node.hash >= hash {
				best = Some(idx);
				cur = node.left;
			} else {
				cur = node.right;
			}
		}

		let chosen = best.unwrap_or_else(|| self.min_index(root));
		Ok(self.node(chosen).addr)
	}

	/// In-order `(address, hash)` pairs, smallest hash first. Used by tests.
	pub fn in_order(&self) -> Vec<(u32, Hash)> {
		let mut out = Vec::with_capacity(self.len);
		self.in_order_rec(self.root, &mut out);
		out
	}

	fn in_order_rec(&self, idx: Option<usize>, out: &mut Vec<(u32, Hash)>) {
		if let Some(idx) = idx {
			let node = self.node(idx);
			self.in_order_rec(node.left, out);
			out.push((node.addr, node.hash));
			self.in_order_rec(node.right, out);
		}
	}

	/// Checks the BST-order and AVL-balance invariants hold everywhere,
	/// returning the tree height. Used by tests only.
	#[cfg(test)]
	pub(crate) fn check_invariants(&self) -> i32 {
		self.check_rec(self.root).0
	}

	#[cfg(test)]
	fn check_rec(&self, idx: Option<usize>) -> (i32, Option<Hash>, Option<Hash>) {
		match idx {
			None => (0, None, None),
			Some(idx) => {
				let node = self.node(idx);
				let (lh, lmin, lmax) = self.check_rec(node.left);
				let (rh, rmin, rmax) = self.check_rec(node.right);
				if let Some(lmax) = lmax {
					assert!(lmax < node.hash, "left subtree must precede node");
				}
				if let Some(rmin) = rmin {
					assert!(rmin > node.hash, "right subtree must follow node");
				}
				assert!((lh - rh).abs() <= 1, "AVL balance invariant violated");
				(1 + lh.max(rh), lmin.or(Some(node.hash)), rmax.or(Some(node.hash)))
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn add_then_route_returns_the_only_server() {
		let mut ring = Ring::new();
		ring.add(1).unwrap();
		assert_eq!(ring.route(Hash::ZERO).unwrap(), 1);
		assert_eq!(ring.route(Hash::MAX).unwrap(), 1);
	}

	#[test]
	fn duplicate_address_is_rejected() {
		let mut ring = Ring::new();
		ring.add(7).unwrap();
		assert!(matches!(ring.add(7), Err(Error::DuplicateAddress)));
	}

	#[test]
	fn remove_unknown_address_is_rejected() {
		let mut ring = Ring::new();
		ring.add(1).unwrap();
		assert!(matches!(ring.remove_by_address(2), Err(Error::UnknownAddress)));
	}

	#[test]
	fn route_on_empty_tree_is_fatal() {
		let ring = Ring::new();
		assert!(matches!(ring.route(Hash::ZERO), Err(Error::EmptyMembership)));
	}

	#[test]
	fn routing_locality_picks_least_hash_above() {
		let mut ring = Ring::new();
		for addr in 1..20u32 {
			ring.add(addr).unwrap();
		}
		let order = ring.in_order();
		for window in order.windows(2) {
			let (lo_addr, lo_hash) = window[0];
			let (hi_addr, _hi_hash) = window[1];
			// Routing exactly at lo_hash must return lo_addr, never hi_addr.
			assert_eq!(ring.route(lo_hash).unwrap(), lo_addr);
			let _ = hi_addr;
		}
		ring.check_invariants();
	}

	#[test]
	fn routing_wraps_to_minimum_past_the_maximum_hash() {
		let mut ring = Ring::new();
		ring.add(1).unwrap();
		ring.add(2).unwrap();
		ring.add(3).unwrap();
		let order = ring.in_order();
		let min_addr = order[0].0;
		assert_eq!(ring.route(Hash::MAX).unwrap(), min_addr);
	}

	#[test]
	fn routing_is_stable_when_membership_is_unchanged() {
		let mut ring = Ring::new();
		for addr in 1..10u32 {
			ring.add(addr).unwrap();
		}
		let h = hash_address(42);
		let a = ring.route(h).unwrap();
		let b = ring.route(h).unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn eviction_reroutes_to_the_successor() {
		let mut ring = Ring::new();
		for addr in 1..10u32 {
			ring.add(addr).unwrap();
		}
		let h = hash_address(999);
		let routed = ring.route(h).unwrap();
		ring.remove_by_address(routed).unwrap();
		let rerouted = ring.route(h).unwrap();
		assert_ne!(routed, rerouted);
	}

	#[test]
	fn balance_holds_after_many_inserts_and_removals() {
		let mut ring = Ring::new();
		for addr in 0..500u32 {
			ring.add(addr).unwrap();
		}
		ring.check_invariants();
		for addr in (0..500u32).step_by(2) {
			ring.remove_by_address(addr).unwrap();
		}
		ring.check_invariants();
		assert_eq!(ring.len(), 250);
	}

	proptest::proptest! {
		#[test]
		fn arbitrary_insert_remove_sequences_stay_balanced(
			adds in proptest::collection::hash_set(0u32..2000, 1..200),
		) {
			let mut ring = Ring::new();
			for &addr in &adds {
				ring.add(addr).unwrap();
			}
			ring.check_invariants();
			proptest::prop_assert_eq!(ring.len(), adds.len());

			let mut removed = 0;
			for &addr in adds.iter().take(adds.len() / 2) {
				ring.remove_by_address(addr).unwrap();
				removed += 1;
			}
			ring.check_invariants();
			proptest::prop_assert_eq!(ring.len(), adds.len() - removed);
		}
	}
}
