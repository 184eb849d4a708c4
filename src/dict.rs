//! Keyspace dictionary (C2): a concurrent mapping from key to value-entity
//! with atomic conditional writes. Backed by `dashmap::DashMap` so that
//! `put`/`put_if_absent`/`put_if_exists`/`remove` are each a single
//! per-shard-locked operation rather than a hand-rolled global mutex.

use bytes::Bytes;
use dashmap::DashMap;
use rand::seq::IteratorRandom;

use crate::obj::Value;

/// One logical database: a concurrent key -> value-entity map.
#[derive(Default)]
pub struct Keyspace {
    map: DashMap<Bytes, Value>,
}

impl Keyspace {
    pub fn new() -> Self {
        Keyspace { map: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.map.get(key).map(|v| v.clone())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Unconditional write. Returns 1 if `key` was newly inserted, 0 if it
    /// replaced an existing value.
    pub fn put(&self, key: Bytes, value: Value) -> i64 {
        match self.map.insert(key, value) {
            Some(_) => 0,
            None => 1,
        }
    }

    /// Insert only if absent. Returns 1 on insert, 0 if `key` already existed
    /// (in which case the existing value is left untouched).
    pub fn put_if_absent(&self, key: Bytes, value: Value) -> i64 {
        use dashmap::mapref::entry::Entry;
        match self.map.entry(key) {
            Entry::Occupied(_) => 0,
            Entry::Vacant(e) => {
                e.insert(value);
                1
            }
        }
    }

    /// Replace only if present. Returns 1 on replace, 0 if `key` was absent.
    pub fn put_if_exists(&self, key: Bytes, value: Value) -> i64 {
        use dashmap::mapref::entry::Entry;
        match self.map.entry(key) {
            Entry::Occupied(mut e) => {
                e.insert(value);
                1
            }
            Entry::Vacant(_) => 0,
        }
    }

    /// Mutate the value at `key` in place, inserting `default()` first if
    /// absent. Used by the list/hash/set command handlers, which need to
    /// grow a container that may or may not already exist without a
    /// clone-out/clone-back round trip.
    pub fn mutate_or_insert<R>(
        &self,
        key: &Bytes,
        default: impl FnOnce() -> Value,
        f: impl FnOnce(&mut Value) -> R,
    ) -> R {
        let mut entry = self.map.entry(key.clone()).or_insert_with(default);
        f(entry.value_mut())
    }

    /// Mutate the value at `key` in place if present; `None` if absent.
    pub fn mutate_if_exists<R>(&self, key: &[u8], f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let mut entry = self.map.get_mut(key)?;
        Some(f(entry.value_mut()))
    }

    /// Returns 1 if `key` was present and removed, 0 if absent.
    pub fn remove(&self, key: &[u8]) -> i64 {
        match self.map.remove(key) {
            Some(_) => 1,
            None => 0,
        }
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn keys(&self) -> Vec<Bytes> {
        self.map.iter().map(|e| e.key().clone()).collect()
    }

    /// Visit every entry; `consumer` returns whether iteration should
    /// continue. May observe any linearization of concurrent writes; never
    /// panics even if the map mutates during iteration.
    pub fn for_each(&self, mut consumer: impl FnMut(&Bytes, &Value) -> bool) {
        for entry in self.map.iter() {
            if !consumer(entry.key(), entry.value()) {
                break;
            }
        }
    }

    /// Up to `n` keys, duplicates allowed, no distinctness guarantee.
    pub fn random_keys(&self, n: usize) -> Vec<Bytes> {
        if n == 0 || self.map.is_empty() {
            return Vec::new();
        }
        let mut rng = rand::thread_rng();
        (0..n)
            .filter_map(|_| self.map.iter().choose(&mut rng).map(|e| e.key().clone()))
            .collect()
    }

    /// Up to `n` distinct keys.
    pub fn random_distinct_keys(&self, n: usize) -> Vec<Bytes> {
        let mut rng = rand::thread_rng();
        self.map.iter().map(|e| e.key().clone()).choose_multiple(&mut rng, n)
    }

    /// Entry point for `RENAME`/`RENAMENX`: atomically move `src`'s value to
    /// `dst`. Returns `None` if `src` is absent.
    pub fn rename(&self, src: &[u8], dst: Bytes) -> Option<()> {
        let value = self.map.remove(src)?.1;
        self.map.insert(dst, value);
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::Str(Bytes::copy_from_slice(v.as_bytes()))
    }

    #[test]
    fn put_reports_new_vs_replace() {
        let ks = Keyspace::new();
        assert_eq!(ks.put(Bytes::from_static(b"k"), s("a")), 1);
        assert_eq!(ks.put(Bytes::from_static(b"k"), s("b")), 0);
        assert_eq!(ks.get(b"k"), Some(s("b")));
    }

    #[test]
    fn put_if_absent_and_put_if_exists() {
        let ks = Keyspace::new();
        assert_eq!(ks.put_if_absent(Bytes::from_static(b"k"), s("a")), 1);
        assert_eq!(ks.put_if_absent(Bytes::from_static(b"k"), s("b")), 0);
        assert_eq!(ks.get(b"k"), Some(s("a")));

        assert_eq!(ks.put_if_exists(Bytes::from_static(b"k"), s("c")), 1);
        assert_eq!(ks.get(b"k"), Some(s("c")));
        assert_eq!(ks.put_if_exists(Bytes::from_static(b"missing"), s("x")), 0);
        assert!(!ks.contains(b"missing"));
    }

    #[test]
    fn remove_reports_presence() {
        let ks = Keyspace::new();
        ks.put(Bytes::from_static(b"k"), s("a"));
        assert_eq!(ks.remove(b"k"), 1);
        assert_eq!(ks.remove(b"k"), 0);
    }

    #[test]
    fn rename_moves_value_and_clears_source() {
        let ks = Keyspace::new();
        ks.put(Bytes::from_static(b"src"), s("v"));
        assert!(ks.rename(b"src", Bytes::from_static(b"dst")).is_some());
        assert!(!ks.contains(b"src"));
        assert_eq!(ks.get(b"dst"), Some(s("v")));
        assert!(ks.rename(b"nope", Bytes::from_static(b"x")).is_none());
    }

    #[test]
    fn for_each_can_stop_early() {
        let ks = Keyspace::new();
        for i in 0..5 {
            ks.put(Bytes::copy_from_slice(format!("k{i}").as_bytes()), s("v"));
        }
        let mut seen = 0;
        ks.for_each(|_, _| {
            seen += 1;
            seen < 3
        });
        assert_eq!(seen, 3);
    }
}
