use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use crate::buffer::DataBuffer;
use crate::core::error::{Error, Result};
use crate::core::types::{Field, Fields, Key, SchemaType, Value};
use crate::range::{Range, RangeSet};
use crate::tombstone::RangeTombstone;

/// One generation of in-memory state: rows, the deletions it shadows older
/// generations with, and the declared field types.
#[derive(Debug)]
pub struct Generation<K, F, V, T> {
    pub buffer: DataBuffer<K, F, V>,
    pub tombstone: RangeTombstone<K, F>,
    pub schema: BTreeMap<F, T>,
}

impl<K: Key, F: Field, V: Value, T: SchemaType> Generation<K, F, V, T> {
    pub fn new() -> Self {
        Generation {
            buffer: DataBuffer::new(),
            tombstone: RangeTombstone::new(),
            schema: BTreeMap::new(),
        }
    }

    /// Nothing to persist.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.tombstone.is_empty() && self.schema.is_empty()
    }

    /// Records field types. Re-declaring a field with another type fails
    /// and leaves the generation untouched.
    pub fn declare(&mut self, schema: &BTreeMap<F, T>) -> Result<()> {
        check_schema(&self.schema, schema, "write generation")?;
        self.schema.extend(schema.iter().map(|(f, t)| (f.clone(), t.clone())));
        Ok(())
    }

    /// Applies a deletion: purges this generation's rows and schema entries
    /// and keeps the deletion for older generations.
    pub fn delete(&mut self, deletion: &RangeTombstone<K, F>) {
        deletion.playback_buffer(&self.buffer);
        deletion.playback_schema(&mut self.schema);
        self.tombstone.merge(deletion);
    }

    /// Layers this generation over `target`, which holds everything older.
    pub fn replay_onto(&self, target: &DataBuffer<K, F, V>, fields: &Fields<F>, range: &Range<K>) -> Result<()> {
        self.tombstone.playback_buffer(target);
        target.put_rows(&mut self.buffer.scan_rows(fields, range))?;
        Ok(())
    }

    /// Layers this generation's schema over `target`.
    pub fn replay_schema(&self, target: &mut BTreeMap<F, T>) -> Result<()> {
        self.tombstone.playback_schema(target);
        merge_schema(target, &self.schema, "in-memory generation")
    }

    /// Single generation equivalent to `older` followed by `self`.
    pub fn fold_over(self, older: &Generation<K, F, V, T>) -> Generation<K, F, V, T> {
        let buffer = older.buffer.deep_clone();
        self.tombstone.playback_buffer(&buffer);
        buffer.merge_from(&self.buffer);

        let mut tombstone = older.tombstone.clone();
        tombstone.merge(&self.tombstone);

        let mut schema = older.schema.clone();
        self.tombstone.playback_schema(&mut schema);
        schema.extend(self.schema);

        Generation { buffer, tombstone, schema }
    }
}

impl<K: Key, F: Field, V: Value, T: SchemaType> Default for Generation<K, F, V, T> {
    fn default() -> Self {
        Generation::new()
    }
}

/// State guarded by the flushed lock.
#[derive(Debug)]
pub struct FlushedState<K, F, V, T> {
    /// Retired generation not yet known to be on disk.
    pub generation: Option<Arc<Generation<K, F, V, T>>>,
    /// Span covered by everything retired so far.
    pub ranges: RangeSet<K>,
    /// Field types of everything retired so far.
    pub schema: BTreeMap<F, T>,
}

impl<K: Key, F: Field, V: Value, T: SchemaType> FlushedState<K, F, V, T> {
    pub fn new(ranges: RangeSet<K>, schema: BTreeMap<F, T>) -> Self {
        FlushedState {
            generation: None,
            ranges,
            schema,
        }
    }

    /// Accounts for a generation leaving the write side.
    pub fn retire(&mut self, generation: &Generation<K, F, V, T>) {
        generation.tombstone.playback_ranges(&mut self.ranges);
        self.ranges.add_all(&generation.buffer.ranges());
        self.ranges = self.ranges.to_span();

        generation.tombstone.playback_schema(&mut self.schema);
        self.schema.extend(generation.schema.iter().map(|(f, t)| (f.clone(), t.clone())));
    }

    pub fn reset(&mut self) {
        self.generation = None;
        self.ranges.clear();
        self.schema.clear();
    }
}

/// Fails when `incoming` gives a field in `existing` another type.
pub fn check_schema<F: Field, T: SchemaType>(
    existing: &BTreeMap<F, T>,
    incoming: &BTreeMap<F, T>,
    origin: impl Display,
) -> Result<()> {
    for (field, ty) in incoming {
        if let Some(current) = existing.get(field) {
            if current != ty {
                return Err(Error::schema_conflict(format!(
                    "field {:?} is {:?} but {} declares {:?}",
                    field, current, origin, ty
                )));
            }
        }
    }
    Ok(())
}

pub fn merge_schema<F: Field, T: SchemaType>(
    target: &mut BTreeMap<F, T>,
    incoming: &BTreeMap<F, T>,
    origin: impl Display,
) -> Result<()> {
    check_schema(target, incoming, origin)?;
    target.extend(incoming.iter().map(|(f, t)| (f.clone(), t.clone())));
    Ok(())
}
