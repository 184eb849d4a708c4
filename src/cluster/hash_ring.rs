//! Consistent-hash ring (C4): `replicas` virtual nodes per physical node,
//! CRC32/IEEE hashed, kept in a sorted array with a side table mapping a
//! virtual-node hash back to its owning node. Grounded on
//! `original_source/lib/consistentHash/consistenthash.go`'s `NodeMap`
//! (`AddNode`/`PickNode` over a single hash per node); this spec extends it
//! with `replicas` virtual nodes per node and `remove_node`, neither of
//! which the original commits to.

/// Sorted by `hash`; duplicates are possible in principle (two different
/// `node#i` strings colliding) but vanishingly unlikely at the scale this
/// crate targets.
pub struct HashRing {
    replicas: usize,
    entries: Vec<(u32, String)>,
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        HashRing { replicas, entries: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert `replicas` virtual-node hashes for `node` and re-sort.
    pub fn add_node(&mut self, node: &str) {
        for i in 0..self.replicas {
            let hash = crc32fast::hash(format!("{node}#{i}").as_bytes());
            self.entries.push((hash, node.to_string()));
        }
        self.entries.sort_by_key(|(hash, _)| *hash);
    }

    /// Drop every virtual-node hash belonging to `node`.
    pub fn remove_node(&mut self, node: &str) {
        self.entries.retain(|(_, n)| n != node);
    }

    /// The node owning `key`: the smallest virtual-node hash `>= hash(key)`,
    /// wrapping to index 0 if `key` hashes past every entry. Ties (an exact
    /// hash match) resolve to the first entry in sort order, which
    /// `partition_point` already gives.
    pub fn pick(&self, key: &[u8]) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = crc32fast::hash(key);
        let idx = self.entries.partition_point(|(h, _)| *h < hash);
        let idx = if idx == self.entries.len() { 0 } else { idx };
        Some(&self.entries[idx].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_picks_nothing() {
        let ring = HashRing::new(4);
        assert_eq!(ring.pick(b"k"), None);
    }

    #[test]
    fn single_node_always_wins() {
        let mut ring = HashRing::new(4);
        ring.add_node("a");
        assert_eq!(ring.pick(b"anything"), Some("a"));
        assert_eq!(ring.pick(b"else"), Some("a"));
    }

    #[test]
    fn remove_node_drops_all_its_virtual_nodes() {
        let mut ring = HashRing::new(8);
        ring.add_node("a");
        ring.add_node("b");
        ring.remove_node("a");
        assert_eq!(ring.entries.iter().filter(|(_, n)| n == "a").count(), 0);
        assert_eq!(ring.pick(b"k"), Some("b"));
    }

    #[test]
    fn pick_is_deterministic_for_same_key() {
        let mut ring = HashRing::new(16);
        ring.add_node("a");
        ring.add_node("b");
        ring.add_node("c");
        let first = ring.pick(b"stable-key").map(str::to_string);
        let second = ring.pick(b"stable-key").map(str::to_string);
        assert_eq!(first, second);
    }
}
