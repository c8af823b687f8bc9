use std::cmp::Ordering;
use std::fmt;
use serde::{Deserialize, Serialize};
use crate::range::range::{cmp_lower, Range};

/// Ordered set of disjoint, non-connected ranges.
///
/// Adding a range coalesces it with every member it touches, so a key is
/// covered by at most one member and `span` is cheap.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSet<K> {
    ranges: Vec<Range<K>>,
}

impl<K: Ord + Clone> RangeSet<K> {
    pub fn new() -> Self {
        RangeSet { ranges: Vec::new() }
    }

    pub fn all() -> Self {
        RangeSet::of(Range::all())
    }

    pub fn of(range: Range<K>) -> Self {
        let mut set = RangeSet::new();
        set.add(range);
        set
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range<K>> {
        self.ranges.iter()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Union with a single range.
    pub fn add(&mut self, range: Range<K>) {
        if range.is_empty() {
            return;
        }

        let mut merged = range;
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for existing in self.ranges.drain(..) {
            if existing.is_connected(&merged) {
                merged = merged.span(&existing);
            } else {
                kept.push(existing);
            }
        }

        let at = kept.partition_point(|r| cmp_lower(r.lower(), merged.lower()) == Ordering::Less);
        kept.insert(at, merged);
        self.ranges = kept;
    }

    pub fn add_all(&mut self, other: &RangeSet<K>) {
        for range in other.iter() {
            self.add(range.clone());
        }
    }

    /// Difference with a single range.
    pub fn remove(&mut self, range: &Range<K>) {
        if range.is_empty() || self.ranges.is_empty() {
            return;
        }
        if range.is_all() {
            self.ranges.clear();
            return;
        }

        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for existing in self.ranges.drain(..) {
            kept.extend(existing.difference(range));
        }
        self.ranges = kept;
    }

    pub fn remove_all(&mut self, other: &RangeSet<K>) {
        for range in other.iter() {
            self.remove(range);
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.ranges.iter().any(|r| r.contains(key))
    }

    pub fn encloses(&self, range: &Range<K>) -> bool {
        range.is_empty() || self.ranges.iter().any(|r| r.encloses(range))
    }

    /// True when the set covers the whole key space.
    pub fn encloses_all(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_all()
    }

    pub fn intersects(&self, range: &Range<K>) -> bool {
        self.ranges.iter().any(|r| r.intersects(range))
    }

    /// Smallest single range enclosing every member.
    pub fn span(&self) -> Option<Range<K>> {
        let first = self.ranges.first()?;
        let last = self.ranges.last()?;
        Some(first.span(last))
    }

    /// This set collapsed to its span.
    pub fn to_span(&self) -> RangeSet<K> {
        match self.span() {
            Some(span) => RangeSet::of(span),
            None => RangeSet::new(),
        }
    }
}

impl<K: Ord + Clone> Default for RangeSet<K> {
    fn default() -> Self {
        RangeSet::new()
    }
}

impl<K: Ord + Clone> From<Range<K>> for RangeSet<K> {
    fn from(range: Range<K>) -> Self {
        RangeSet::of(range)
    }
}

impl<K: Ord + Clone> FromIterator<Range<K>> for RangeSet<K> {
    fn from_iter<I: IntoIterator<Item = Range<K>>>(iter: I) -> Self {
        let mut set = RangeSet::new();
        for range in iter {
            set.add(range);
        }
        set
    }
}

impl<'a, K> IntoIterator for &'a RangeSet<K> {
    type Item = &'a Range<K>;
    type IntoIter = std::slice::Iter<'a, Range<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl<K: fmt::Debug> fmt::Debug for RangeSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ranges.iter()).finish()
    }
}
