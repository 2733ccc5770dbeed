use std::collections::{BTreeMap, BTreeSet, HashMap};

use infermesh_common::{MeshError, Result};

/// Default number of virtual nodes per worker.
///
/// More virtual nodes smooth the key distribution at the cost of ring
/// memory and slower add/remove. 150 keeps placement variance low for
/// small fleets.
pub const DEFAULT_VIRTUAL_NODES: usize = 150;

/// 32-bit FNV-1a over a byte string.
///
/// The ring hash must be deterministic and stable across processes: ring
/// placement is the only thing that keeps cache residency local to a
/// worker across restarts, so a per-process seeded hasher would defeat
/// the design.
fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Consistent hash ring mapping opaque string keys to worker identifiers.
///
/// Each worker is inserted as `virtual_nodes` entries hashed from
/// `"{worker}#{i}"`. A key maps to the worker owning the first ring hash
/// at or after the key's hash, wrapping from the top of the hash space
/// back to the bottom.
///
/// The ring itself is a plain structure; the owner serializes access
/// (the gateway router keeps it behind an `RwLock`), so `locate` always
/// observes a consistent snapshot.
pub struct HashRing {
    /// Ring position -> worker, ordered by position
    entries: BTreeMap<u32, String>,
    virtual_nodes: usize,
}

impl HashRing {
    /// Creates an empty ring with [`DEFAULT_VIRTUAL_NODES`] per worker.
    pub fn new() -> Self {
        Self::with_virtual_nodes(DEFAULT_VIRTUAL_NODES)
    }

    /// Creates an empty ring with a custom virtual node count.
    pub fn with_virtual_nodes(virtual_nodes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            virtual_nodes,
        }
    }

    /// Adds a worker, inserting one ring entry per virtual node.
    pub fn add(&mut self, worker: &str) {
        for i in 0..self.virtual_nodes {
            let vnode = format!("{}#{}", worker, i);
            self.entries.insert(fnv1a(vnode.as_bytes()), worker.to_string());
        }
    }

    /// Removes every entry owned by `worker`.
    pub fn remove(&mut self, worker: &str) {
        self.entries.retain(|_, w| w != worker);
    }

    /// Maps a key to its worker.
    ///
    /// Finds the smallest ring position at or after the key's hash,
    /// wrapping to the first entry when the key hashes past the last
    /// position.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::EmptyRing`] when no worker has been added.
    pub fn locate(&self, key: &str) -> Result<String> {
        if self.entries.is_empty() {
            return Err(MeshError::EmptyRing);
        }

        let hash = fnv1a(key.as_bytes());
        let worker = self
            .entries
            .range(hash..)
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(_, worker)| worker.clone())
            .expect("non-empty ring has a first entry");
        Ok(worker)
    }

    /// Distinct workers currently on the ring, in sorted order.
    pub fn workers(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.entries.values().collect();
        set.into_iter().cloned().collect()
    }

    /// Counts how many of `keys` map to each worker.
    ///
    /// Diagnostic helper for inspecting placement skew.
    pub fn distribution(&self, keys: &[String]) -> HashMap<String, usize> {
        let mut dist = HashMap::new();
        for key in keys {
            if let Ok(worker) = self.locate(key) {
                *dist.entry(worker).or_insert(0) += 1;
            }
        }
        dist
    }

    /// Total ring entries (virtual nodes), for diagnostics.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_vectors() {
        // Published FNV-1a/32 test vectors; stability across processes is
        // part of the contract.
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_empty_ring_locate_fails() {
        let ring = HashRing::new();
        assert!(matches!(ring.locate("req-1"), Err(MeshError::EmptyRing)));
    }

    #[test]
    fn test_locate_returns_an_added_worker() {
        let mut ring = HashRing::new();
        ring.add("localhost:9001");
        ring.add("localhost:9002");
        ring.add("localhost:9003");

        let workers = ring.workers();
        for i in 0..200 {
            let worker = ring.locate(&format!("req-{}", i)).unwrap();
            assert!(workers.contains(&worker));
        }
    }

    #[test]
    fn test_single_worker_owns_everything() {
        let mut ring = HashRing::new();
        ring.add("only");
        for i in 0..50 {
            assert_eq!(ring.locate(&format!("key-{}", i)).unwrap(), "only");
        }
    }

    #[test]
    fn test_virtual_node_count() {
        let mut ring = HashRing::with_virtual_nodes(10);
        ring.add("a");
        assert_eq!(ring.entry_count(), 10);
        ring.add("b");
        assert_eq!(ring.entry_count(), 20);
        ring.remove("a");
        assert_eq!(ring.entry_count(), 10);
        assert_eq!(ring.workers(), vec!["b".to_string()]);
    }

    #[test]
    fn test_remove_and_re_add_restores_placement() {
        let mut ring = HashRing::new();
        ring.add("A");
        ring.add("B");
        ring.add("C");

        let original = ring.locate("req-42").unwrap();

        ring.remove(&original);
        let fallback = ring.locate("req-42").unwrap();
        assert_ne!(fallback, original);
        assert!(ring.workers().contains(&fallback));

        ring.add(&original);
        assert_eq!(ring.locate("req-42").unwrap(), original);
    }

    #[test]
    fn test_removal_only_moves_keys_from_the_removed_arc() {
        let mut ring = HashRing::new();
        ring.add("A");
        ring.add("B");
        ring.add("C");

        let keys: Vec<String> = (0..500).map(|i| format!("req-{}", i)).collect();
        let before: Vec<String> = keys.iter().map(|k| ring.locate(k).unwrap()).collect();

        ring.remove("B");

        for (key, owner) in keys.iter().zip(&before) {
            if owner != "B" {
                assert_eq!(&ring.locate(key).unwrap(), owner);
            } else {
                assert_ne!(ring.locate(key).unwrap(), "B");
            }
        }
    }

    #[test]
    fn test_adding_a_worker_relocates_a_bounded_share() {
        let mut ring = HashRing::new();
        for w in ["w1", "w2", "w3"] {
            ring.add(w);
        }

        let keys: Vec<String> = (0..1000).map(|i| format!("req-{}", i)).collect();
        let before: Vec<String> = keys.iter().map(|k| ring.locate(k).unwrap()).collect();

        ring.add("w4");
        let mut moved = 0;
        for (key, owner) in keys.iter().zip(&before) {
            if ring.locate(key).unwrap() != *owner {
                moved += 1;
            }
        }

        // Expectation is ~1/4 of keys; allow generous slack for hash noise.
        assert!(moved > 0, "a new worker should take over some keys");
        assert!(moved < 500, "relocated {} of 1000 keys, expected ~250", moved);

        // Every moved key must have moved onto the new worker.
        for (key, owner) in keys.iter().zip(&before) {
            let now = ring.locate(key).unwrap();
            if &now != owner {
                assert_eq!(now, "w4");
            }
        }
    }

    #[test]
    fn test_distribution_covers_all_workers() {
        let mut ring = HashRing::new();
        ring.add("A");
        ring.add("B");
        ring.add("C");

        let keys: Vec<String> = (0..3000).map(|i| format!("req-{}", i)).collect();
        let dist = ring.distribution(&keys);

        assert_eq!(dist.len(), 3);
        assert_eq!(dist.values().sum::<usize>(), 3000);
        // With 150 vnodes each, no worker should see wildly skewed load.
        for (worker, count) in &dist {
            assert!(
                *count > 300,
                "worker {} got only {} of 3000 keys",
                worker,
                count
            );
        }
    }

    #[test]
    fn test_workers_distinct_and_sorted() {
        let mut ring = HashRing::new();
        ring.add("b");
        ring.add("a");
        ring.add("c");
        assert_eq!(
            ring.workers(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
