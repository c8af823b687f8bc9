use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use crate::buffer::DataBuffer;
use crate::core::types::{Field, Fields, Key, Value};
use crate::range::{Range, RangeSet};

/// Deleted key ranges, per field plus a wildcard slot for "every field".
///
/// A tombstone never holds values. Within one generation it only grows:
/// deletions are unioned in until the generation is retired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, F: Serialize + Ord",
    deserialize = "K: Deserialize<'de>, F: Deserialize<'de> + Ord"
))]
pub struct RangeTombstone<K, F> {
    fields: BTreeMap<F, RangeSet<K>>,
    wildcard: RangeSet<K>,
}

impl<K: Key, F: Field> RangeTombstone<K, F> {
    pub fn new() -> Self {
        RangeTombstone {
            fields: BTreeMap::new(),
            wildcard: RangeSet::new(),
        }
    }

    /// Records `ranges` as deleted for the selected fields.
    pub fn delete(&mut self, fields: &Fields<F>, ranges: &RangeSet<K>) {
        if ranges.is_empty() {
            return;
        }
        match fields {
            Fields::All => self.wildcard.add_all(ranges),
            Fields::Only(fields) => {
                for field in fields {
                    self.fields.entry(field.clone()).or_default().add_all(ranges);
                }
            }
        }
    }

    /// Records the full key space as deleted for each field.
    pub fn delete_fields(&mut self, fields: &BTreeSet<F>) {
        for field in fields {
            let deleted = self.fields.entry(field.clone()).or_default();
            deleted.clear();
            deleted.add(Range::all());
        }
    }

    /// Records `ranges` as deleted for every field.
    pub fn delete_ranges(&mut self, ranges: &RangeSet<K>) {
        self.wildcard.add_all(ranges);
    }

    pub fn reset(&mut self) {
        self.fields.clear();
        self.wildcard.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.wildcard.is_empty() && self.fields.values().all(RangeSet::is_empty)
    }

    /// Union of both tombstones.
    pub fn merge(&mut self, other: &RangeTombstone<K, F>) {
        self.wildcard.add_all(&other.wildcard);
        for (field, ranges) in &other.fields {
            self.fields.entry(field.clone()).or_default().add_all(ranges);
        }
    }

    pub fn wildcard(&self) -> &RangeSet<K> {
        &self.wildcard
    }

    pub fn field(&self, field: &F) -> Option<&RangeSet<K>> {
        self.fields.get(field)
    }

    /// True when `key` of `field` is suppressed by this tombstone.
    pub fn is_deleted(&self, field: &F, key: &K) -> bool {
        self.wildcard.contains(key)
            || self.fields.get(field).is_some_and(|ranges| ranges.contains(key))
    }

    /// True when every key of `field` is deleted.
    pub fn drops_field(&self, field: &F) -> bool {
        self.wildcard.encloses_all() || self.fields.get(field).is_some_and(RangeSet::encloses_all)
    }

    /// Applies the deletions to `buffer`.
    pub fn playback_buffer<V: Value>(&self, buffer: &DataBuffer<K, F, V>) {
        if !self.wildcard.is_empty() {
            buffer.remove_ranges(&self.wildcard);
        }

        let mut dropped = BTreeSet::new();
        for (field, ranges) in &self.fields {
            if ranges.encloses_all() {
                dropped.insert(field.clone());
            } else if !ranges.is_empty() {
                buffer.remove(&Fields::only([field.clone()]), ranges);
            }
        }
        if !dropped.is_empty() {
            buffer.remove_fields(&dropped);
        }
    }

    /// Drops schema entries whose field is deleted over the full key space.
    pub fn playback_schema<T>(&self, schema: &mut BTreeMap<F, T>) {
        if self.wildcard.encloses_all() {
            schema.clear();
            return;
        }
        for (field, ranges) in &self.fields {
            if ranges.encloses_all() {
                schema.remove(field);
            }
        }
    }

    /// Shrinks a key coverage set by the ranges deleted from every field.
    ///
    /// Per-field deletions leave coverage alone since other fields may still
    /// hold keys in those ranges.
    pub fn playback_ranges(&self, ranges: &mut RangeSet<K>) {
        ranges.remove_all(&self.wildcard);
    }
}

impl<K: Key, F: Field> Default for RangeTombstone<K, F> {
    fn default() -> Self {
        RangeTombstone::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> DataBuffer<i64, char, i64> {
        let buffer = DataBuffer::new();
        for key in 0..10 {
            buffer.put('a', key, key);
            buffer.put('b', key, key * 10);
        }
        buffer
    }

    #[test]
    fn wildcard_deletes_every_field() {
        let mut tombstone = RangeTombstone::new();
        tombstone.delete(&Fields::All, &RangeSet::of(Range::closed_open(0, 5)));
        let buffer = buffer();
        tombstone.playback_buffer(&buffer);
        assert_eq!(buffer.ranges(), RangeSet::of(Range::closed(5, 9)));
        assert_eq!(buffer.len(), 10);
        assert!(tombstone.is_deleted(&'z', &3));
    }

    #[test]
    fn field_delete_only_touches_that_field() {
        let mut tombstone = RangeTombstone::new();
        tombstone.delete(&Fields::only(['a']), &RangeSet::of(Range::at_least(8)));
        let buffer = buffer();
        tombstone.playback_buffer(&buffer);
        assert_eq!(buffer.get(&'a', &8), None);
        assert_eq!(buffer.get(&'b', &8), Some(80));
        assert!(!tombstone.is_deleted(&'b', &9));
    }

    #[test]
    fn full_key_space_drops_field_and_schema_entry() {
        let mut tombstone = RangeTombstone::new();
        tombstone.delete_fields(&['b'].into_iter().collect());
        let buffer = buffer();
        tombstone.playback_buffer(&buffer);
        assert_eq!(buffer.fields(), ['a'].into_iter().collect());
        assert!(tombstone.drops_field(&'b'));
        assert!(!tombstone.drops_field(&'a'));

        let mut schema: BTreeMap<char, String> =
            [('a', "long".to_string()), ('b', "long".to_string())].into_iter().collect();
        tombstone.playback_schema(&mut schema);
        assert_eq!(schema.keys().copied().collect::<Vec<_>>(), vec!['a']);
    }

    #[test]
    fn partial_delete_keeps_schema_entry() {
        let mut tombstone = RangeTombstone::<i64, char>::new();
        tombstone.delete(&Fields::only(['a']), &RangeSet::of(Range::closed(0, 100)));
        let mut schema: BTreeMap<char, String> = [('a', "long".to_string())].into_iter().collect();
        tombstone.playback_schema(&mut schema);
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn playback_ranges_uses_wildcard_only() {
        let mut tombstone = RangeTombstone::<i64, char>::new();
        tombstone.delete(&Fields::only(['a']), &RangeSet::of(Range::closed(0, 10)));
        tombstone.delete_ranges(&RangeSet::of(Range::closed_open(0, 5)));
        let mut coverage = RangeSet::of(Range::closed(0, 10));
        tombstone.playback_ranges(&mut coverage);
        assert_eq!(coverage, RangeSet::of(Range::closed(5, 10)));
    }

    #[test]
    fn merge_is_union() {
        let mut left = RangeTombstone::<i64, char>::new();
        left.delete(&Fields::only(['a']), &RangeSet::of(Range::closed(0, 1)));
        let mut right = RangeTombstone::new();
        right.delete(&Fields::only(['a']), &RangeSet::of(Range::closed(5, 6)));
        right.delete_ranges(&RangeSet::of(Range::at_least(100)));
        left.merge(&right);
        assert!(left.is_deleted(&'a', &0));
        assert!(left.is_deleted(&'a', &6));
        assert!(left.is_deleted(&'b', &100));
        assert!(!left.is_empty());
    }
}
