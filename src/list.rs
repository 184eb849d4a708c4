//! Paged doubly-linked list (C3): the backing store for the `list`
//! container. A `VecDeque` of fixed-capacity pages gives amortized O(1)
//! push-back and cache-local iteration without a per-element allocation, the
//! way a pure node-linked list would require.

use bytes::Bytes;
use std::collections::VecDeque;

/// Page size must be even; 1024 matches the recommendation.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

struct Page {
    items: Vec<Bytes>,
}

/// A list of byte strings, indexable by signed integer (Redis semantics:
/// negative indices count from the tail).
pub struct PagedList {
    pages: VecDeque<Page>,
    page_size: usize,
    len: usize,
}

impl Default for PagedList {
    fn default() -> Self {
        Self::new()
    }
}

impl PagedList {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        assert!(page_size >= 2 && page_size % 2 == 0, "page size must be even and >= 2");
        PagedList { pages: VecDeque::new(), page_size, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// O(1) amortized push onto the tail.
    pub fn push_back(&mut self, v: Bytes) {
        match self.pages.back_mut() {
            Some(p) if p.items.len() < self.page_size => p.items.push(v),
            _ => self.pages.push_back(Page { items: vec![v] }),
        }
        self.len += 1;
    }

    /// O(1) amortized push onto the head.
    pub fn push_front(&mut self, v: Bytes) {
        match self.pages.front_mut() {
            Some(p) if p.items.len() < self.page_size => p.items.insert(0, v),
            _ => self.pages.push_front(Page { items: vec![v] }),
        }
        self.len += 1;
    }

    /// Locate the (page index, offset within page) holding global index `i`.
    fn locate(&self, i: usize) -> Option<(usize, usize)> {
        let mut remaining = i;
        for (pi, page) in self.pages.iter().enumerate() {
            if remaining < page.items.len() {
                return Some((pi, remaining));
            }
            remaining -= page.items.len();
        }
        None
    }

    /// Insert `v` at global index `i`, shifting later elements back.
    /// O(pageCount + pageSize): if the target page is full, split it in
    /// half and place `v` in the appropriate half; the tail half becomes a
    /// new page inserted right after the current one.
    pub fn insert(&mut self, i: usize, v: Bytes) {
        if i >= self.len {
            self.push_back(v);
            return;
        }
        let (pi, off) = self.locate(i).expect("index within bounds");
        let page = &mut self.pages[pi];
        if page.items.len() < self.page_size {
            page.items.insert(off, v);
        } else {
            let mid = page.items.len() / 2;
            let tail: Vec<Bytes> = page.items.split_off(mid);
            self.pages.insert(pi + 1, Page { items: tail });
            if off <= mid {
                self.pages[pi].items.insert(off, v);
            } else {
                self.pages[pi + 1].items.insert(off - mid, v);
            }
        }
        self.len += 1;
    }

    /// Remove and return the element at global index `i`. Deleting the last
    /// element of a page removes the page entirely.
    pub fn remove(&mut self, i: usize) -> Option<Bytes> {
        let (pi, off) = self.locate(i)?;
        let page = &mut self.pages[pi];
        let v = page.items.remove(off);
        if page.items.is_empty() {
            self.pages.remove(pi);
        }
        self.len -= 1;
        Some(v)
    }

    pub fn remove_last(&mut self) -> Option<Bytes> {
        if self.len == 0 {
            return None;
        }
        self.remove(self.len - 1)
    }

    pub fn pop_front(&mut self) -> Option<Bytes> {
        let page = self.pages.front_mut()?;
        let v = page.items.remove(0);
        if page.items.is_empty() {
            self.pages.pop_front();
        }
        self.len -= 1;
        Some(v)
    }

    pub fn pop_back(&mut self) -> Option<Bytes> {
        self.remove_last()
    }

    pub fn get(&self, i: usize) -> Option<&Bytes> {
        let (pi, off) = self.locate(i)?;
        Some(&self.pages[pi].items[off])
    }

    pub fn set(&mut self, i: usize, v: Bytes) -> bool {
        match self.locate(i) {
            Some((pi, off)) => {
                self.pages[pi].items[off] = v;
                true
            }
            None => false,
        }
    }

    /// Normalize a possibly-negative, possibly-out-of-range LRANGE-style
    /// `start`/`stop` pair (inclusive on both ends) into a clamped
    /// half-open `[start, stop)` range over the current length.
    fn clamp_range(&self, start: i64, stop: i64) -> (usize, usize) {
        let len = self.len as i64;
        if len == 0 {
            return (0, 0);
        }
        let start = if start < -len {
            0
        } else if start < 0 {
            len + start
        } else {
            start
        };
        let mut stop = if stop < -len {
            0
        } else if stop < 0 {
            len + stop + 1
        } else if stop < len {
            stop + 1
        } else {
            len
        };
        if stop < start {
            stop = start;
        }
        (start.min(len) as usize, stop.min(len) as usize)
    }

    /// `[start, stop]` inclusive, Redis-style signed indices, clamped.
    pub fn range(&self, start: i64, stop: i64) -> Vec<Bytes> {
        let (lo, hi) = self.clamp_range(start, stop);
        let mut out = Vec::with_capacity(hi.saturating_sub(lo));
        let mut idx = 0usize;
        'outer: for page in &self.pages {
            for item in &page.items {
                if idx >= hi {
                    break 'outer;
                }
                if idx >= lo {
                    out.push(item.clone());
                }
                idx += 1;
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn push_back_and_range() {
        let mut l = PagedList::new();
        for c in ["a", "b", "c"] {
            l.push_back(b(c));
        }
        assert_eq!(l.range(0, -1), vec![b("a"), b("b"), b("c")]);
    }

    #[test]
    fn push_front_reverses_order() {
        let mut l = PagedList::new();
        for c in ["a", "b", "c"] {
            l.push_front(b(c));
        }
        assert_eq!(l.range(0, -1), vec![b("c"), b("b"), b("a")]);
    }

    #[test]
    fn insert_splits_full_page() {
        let mut l = PagedList::with_page_size(2);
        l.push_back(b("a"));
        l.push_back(b("b"));
        // page is full; insert in the middle forces a split
        l.insert(1, b("x"));
        assert_eq!(l.len(), 3);
        assert_eq!(l.range(0, -1), vec![b("a"), b("x"), b("b")]);
    }

    #[test]
    fn remove_drops_empty_page() {
        let mut l = PagedList::with_page_size(2);
        l.push_back(b("a"));
        assert_eq!(l.remove(0), Some(b("a")));
        assert_eq!(l.len(), 0);
        assert!(l.pages.is_empty());
    }

    #[test]
    fn clamp_range_matches_glossary_semantics() {
        let mut l = PagedList::new();
        for c in ["a", "b", "c", "d", "e"] {
            l.push_back(b(c));
        }
        assert_eq!(l.range(-100, -1), vec![b("a"), b("b"), b("c"), b("d"), b("e")]);
        assert_eq!(l.range(1, 2), vec![b("b"), b("c")]);
        assert_eq!(l.range(-2, -1), vec![b("d"), b("e")]);
        assert_eq!(l.range(3, 1), Vec::<Bytes>::new());
    }

    #[test]
    fn pop_front_and_back() {
        let mut l = PagedList::new();
        for c in ["a", "b", "c"] {
            l.push_back(b(c));
        }
        assert_eq!(l.pop_front(), Some(b("a")));
        assert_eq!(l.pop_back(), Some(b("c")));
        assert_eq!(l.range(0, -1), vec![b("b")]);
    }
}
