//! Database engine data side: an ordered, fixed-size sequence of keyspaces.
//! Created at startup, never resized, destroyed with the server.

use crate::dict::Keyspace;

pub struct Db {
    keyspaces: Vec<Keyspace>,
}

impl Db {
    pub fn new(num_databases: usize) -> Self {
        let mut keyspaces = Vec::with_capacity(num_databases);
        for _ in 0..num_databases {
            keyspaces.push(Keyspace::new());
        }
        Db { keyspaces }
    }

    pub fn len(&self) -> usize {
        self.keyspaces.len()
    }

    pub fn keyspace(&self, index: usize) -> &Keyspace {
        &self.keyspaces[index]
    }

    /// Clears every keyspace, used by a cluster-wide `FLUSHDB` and by
    /// graceful shutdown.
    pub fn clear_all(&self) {
        for ks in &self.keyspaces {
            ks.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::obj::Value;

    #[test]
    fn keyspaces_are_independent() {
        let db = Db::new(16);
        assert_eq!(db.len(), 16);
        db.keyspace(0).put(Bytes::from_static(b"k"), Value::Str(Bytes::from_static(b"v")));
        assert!(db.keyspace(0).contains(b"k"));
        assert!(!db.keyspace(1).contains(b"k"));
    }

    #[test]
    fn clear_all_empties_every_keyspace() {
        let db = Db::new(2);
        db.keyspace(0).put(Bytes::from_static(b"k"), Value::Str(Bytes::from_static(b"v")));
        db.keyspace(1).put(Bytes::from_static(b"k"), Value::Str(Bytes::from_static(b"v")));
        db.clear_all();
        assert!(db.keyspace(0).is_empty());
        assert!(db.keyspace(1).is_empty());
    }
}
