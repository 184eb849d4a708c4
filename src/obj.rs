//! Value entity (C3): a tagged variant carrying exactly one of the four
//! container kinds. Typed accessors return `WRONGTYPE` on a tag mismatch
//! without mutating anything, the way the teacher's `RedisObject` enum
//! dispatches on its own tag.

use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashSet;

use crate::error::RedisError;
use crate::list::PagedList;

/// A hash confined to the value of one key: same ordered-map contract as
/// the keyspace dictionary, but field-uniqueness only (no atomic
/// conditional writes needed — callers already hold exclusive access via
/// the enclosing `Value`).
pub type Hash = IndexMap<Bytes, Bytes>;

/// A set confined to the value of one key.
pub type Set = HashSet<Bytes>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(Bytes),
    Hash(Hash),
    List(#[doc(hidden)] ListHandle),
    Set(Set),
}

/// `PagedList` has no `PartialEq`/`Clone` (pages aren't meant to be diffed
/// or duplicated); tests compare lists by snapshotting `range(0, -1)`
/// instead, so `Value` wraps it behind a newtype that only needs `Eq` for
/// the derive to compile over the other variants' identity, never actually
/// invoked in practice since command handlers match on the tag directly.
#[derive(Debug)]
pub struct ListHandle(pub PagedList);

impl PartialEq for ListHandle {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}
impl Eq for ListHandle {}

impl Clone for ListHandle {
    fn clone(&self) -> Self {
        let mut l = PagedList::new();
        for item in self.0.iter() {
            l.push_back(item.clone());
        }
        ListHandle(l)
    }
}

/// Intersection of a variadic group of sets (spec.md §4.3's set
/// combinators). No required command currently surfaces this, but it's
/// part of the set container's contract.
pub fn set_intersect(sets: &[&Set]) -> Set {
    match sets.split_first() {
        None => Set::new(),
        Some((first, rest)) => first.iter().filter(|m| rest.iter().all(|s| s.contains(*m))).cloned().collect(),
    }
}

pub fn set_union(sets: &[&Set]) -> Set {
    sets.iter().flat_map(|s| s.iter().cloned()).collect()
}

/// `sets[0]` minus every member appearing in any of `sets[1..]`.
pub fn set_diff(sets: &[&Set]) -> Set {
    match sets.split_first() {
        None => Set::new(),
        Some((first, rest)) => first.iter().filter(|m| !rest.iter().any(|s| s.contains(*m))).cloned().collect(),
    }
}

impl Value {
    /// The Redis-standard lowercase type name used by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
            Value::Set(_) => "set",
        }
    }

    pub fn new_list() -> Value {
        Value::List(ListHandle(PagedList::new()))
    }

    pub fn as_str(&self) -> Result<&Bytes, RedisError> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(RedisError::WrongType),
        }
    }

    pub fn as_hash(&self) -> Result<&Hash, RedisError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(RedisError::WrongType),
        }
    }

    pub fn as_hash_mut(&mut self) -> Result<&mut Hash, RedisError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(RedisError::WrongType),
        }
    }

    pub fn as_list(&self) -> Result<&PagedList, RedisError> {
        match self {
            Value::List(l) => Ok(&l.0),
            _ => Err(RedisError::WrongType),
        }
    }

    pub fn as_list_mut(&mut self) -> Result<&mut PagedList, RedisError> {
        match self {
            Value::List(l) => Ok(&mut l.0),
            _ => Err(RedisError::WrongType),
        }
    }

    pub fn as_set(&self) -> Result<&Set, RedisError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(RedisError::WrongType),
        }
    }

    pub fn as_set_mut(&mut self) -> Result<&mut Set, RedisError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(RedisError::WrongType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_matches_tag() {
        assert_eq!(Value::Str(Bytes::from_static(b"x")).type_name(), "string");
        assert_eq!(Value::Hash(Hash::new()).type_name(), "hash");
        assert_eq!(Value::new_list().type_name(), "list");
        assert_eq!(Value::Set(Set::new()).type_name(), "set");
    }

    #[test]
    fn wrong_type_accessor_does_not_panic() {
        let v = Value::Str(Bytes::from_static(b"x"));
        assert!(matches!(v.as_hash(), Err(RedisError::WrongType)));
        assert!(matches!(v.as_list(), Err(RedisError::WrongType)));
        assert!(matches!(v.as_set(), Err(RedisError::WrongType)));
    }

    #[test]
    fn set_combinators_match_venn_semantics() {
        let a: Set = [b("x"), b("y"), b("z")].into_iter().collect();
        let b_: Set = [b("y"), b("z"), b("w")].into_iter().collect();
        assert_eq!(set_intersect(&[&a, &b_]), [b("y"), b("z")].into_iter().collect());
        assert_eq!(set_union(&[&a, &b_]), [b("x"), b("y"), b("z"), b("w")].into_iter().collect());
        assert_eq!(set_diff(&[&a, &b_]), [b("x")].into_iter().collect());
    }

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn hash_preserves_insertion_order() {
        let mut h = Hash::new();
        h.insert(Bytes::from_static(b"z"), Bytes::from_static(b"1"));
        h.insert(Bytes::from_static(b"a"), Bytes::from_static(b"2"));
        let keys: Vec<&Bytes> = h.keys().collect();
        assert_eq!(keys, vec![&Bytes::from_static(b"z"), &Bytes::from_static(b"a")]);
    }
}
