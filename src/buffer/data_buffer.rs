use std::collections::{BTreeMap, BTreeSet};
use parking_lot::RwLock;
use crate::core::error::Result;
use crate::core::types::{Field, Fields, Key, Value};
use crate::range::{Range, RangeSet};
use crate::scanner::{BoxScanner, ColumnScanner, ColumnUnionRowScanner, IterScanner, RowScanner, Scanner};

type Column<K, V> = BTreeMap<K, V>;

/// In-memory multi-column store: `field -> (key -> value)`.
///
/// Readers run concurrently, writers are serialised by the inner lock.
/// Ordering of two writers racing on the same field and key is up to the
/// caller.
pub struct DataBuffer<K, F, V> {
    columns: RwLock<BTreeMap<F, Column<K, V>>>,
}

impl<K: Key, F: Field, V: Value> DataBuffer<K, F, V> {
    pub fn new() -> Self {
        DataBuffer {
            columns: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert-or-overwrite from a row-major scanner. Returns entries written.
    pub fn put_rows<S, R>(&self, rows: &mut S) -> Result<usize>
    where
        S: Scanner<K, R> + ?Sized,
        R: Scanner<F, V>,
    {
        let mut written = 0;
        while rows.advance()? {
            let Some((key, mut row)) = rows.take_current() else {
                continue;
            };
            let mut cells = Vec::new();
            while row.advance()? {
                if let Some(cell) = row.take_current() {
                    cells.push(cell);
                }
            }
            row.close();

            written += cells.len();
            let mut columns = self.columns.write();
            for (field, value) in cells {
                columns.entry(field).or_default().insert(key.clone(), value);
            }
        }
        rows.close();
        Ok(written)
    }

    /// Insert-or-overwrite from a column-major scanner. Returns entries written.
    pub fn put_columns<S, C>(&self, columns: &mut S) -> Result<usize>
    where
        S: Scanner<F, C> + ?Sized,
        C: Scanner<K, V>,
    {
        let mut written = 0;
        while columns.advance()? {
            let Some((field, mut column)) = columns.take_current() else {
                continue;
            };
            let mut cells = Vec::new();
            while column.advance()? {
                if let Some(cell) = column.take_current() {
                    cells.push(cell);
                }
            }
            column.close();

            if cells.is_empty() {
                continue;
            }
            written += cells.len();
            self.columns.write().entry(field).or_default().extend(cells);
        }
        columns.close();
        Ok(written)
    }

    pub fn put(&self, field: F, key: K, value: V) {
        self.columns.write().entry(field).or_default().insert(key, value);
    }

    pub fn get(&self, field: &F, key: &K) -> Option<V> {
        self.columns.read().get(field).and_then(|column| column.get(key)).cloned()
    }

    /// Clears `ranges` in each selected field.
    pub fn remove(&self, fields: &Fields<F>, ranges: &RangeSet<K>) {
        if ranges.is_empty() {
            return;
        }
        let mut columns = self.columns.write();
        for (field, column) in columns.iter_mut() {
            if !fields.contains(field) {
                continue;
            }
            for range in ranges.iter() {
                remove_range(column, range);
            }
        }
        columns.retain(|_, column| !column.is_empty());
    }

    /// Drops whole fields.
    pub fn remove_fields(&self, fields: &BTreeSet<F>) {
        let mut columns = self.columns.write();
        for field in fields {
            columns.remove(field);
        }
    }

    /// Clears `ranges` across every field.
    pub fn remove_ranges(&self, ranges: &RangeSet<K>) {
        self.remove(&Fields::All, ranges);
    }

    pub fn remove_all(&self) {
        self.columns.write().clear();
    }

    pub fn fields(&self) -> BTreeSet<F> {
        self.columns.read().keys().cloned().collect()
    }

    /// Closed span from the smallest to the largest key of any field.
    pub fn ranges(&self) -> RangeSet<K> {
        let columns = self.columns.read();
        let min = columns.values().filter_map(|c| c.keys().next()).min();
        let max = columns.values().filter_map(|c| c.keys().next_back()).max();
        match (min, max) {
            (Some(min), Some(max)) => RangeSet::of(Range::closed(min.clone(), max.clone())),
            _ => RangeSet::new(),
        }
    }

    /// Number of stored entries across all fields.
    pub fn len(&self) -> usize {
        self.columns.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.read().values().all(BTreeMap::is_empty)
    }

    pub fn scan_rows(&self, fields: &Fields<F>, range: &Range<K>) -> RowScanner<K, F, V> {
        Box::new(ColumnUnionRowScanner::new(self.sub_scanners(fields, range)))
    }

    pub fn scan_columns(&self, fields: &Fields<F>, range: &Range<K>) -> ColumnScanner<K, F, V> {
        IterScanner::boxed(self.sub_scanners(fields, range))
    }

    /// Overwrites this buffer with every entry of `other`.
    pub fn merge_from(&self, other: &DataBuffer<K, F, V>) {
        let incoming = other.columns.read().clone();
        let mut columns = self.columns.write();
        for (field, column) in incoming {
            columns.entry(field).or_default().extend(column);
        }
    }

    pub fn deep_clone(&self) -> DataBuffer<K, F, V> {
        DataBuffer {
            columns: RwLock::new(self.columns.read().clone()),
        }
    }

    /// Owned copy of the selected slice, one materialised column per field.
    pub fn snapshot(&self, fields: &Fields<F>, range: &Range<K>) -> BTreeMap<F, Vec<(K, V)>> {
        let columns = self.columns.read();
        let mut snapshot = BTreeMap::new();
        if range.is_empty() {
            return snapshot;
        }
        for (field, column) in columns.iter() {
            if !fields.contains(field) {
                continue;
            }
            let entries: Vec<(K, V)> = column
                .range(range.as_bounds())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !entries.is_empty() {
                snapshot.insert(field.clone(), entries);
            }
        }
        snapshot
    }

    fn sub_scanners(&self, fields: &Fields<F>, range: &Range<K>) -> Vec<(F, BoxScanner<K, V>)> {
        self.snapshot(fields, range)
            .into_iter()
            .map(|(field, entries)| (field, IterScanner::boxed(entries)))
            .collect()
    }
}

impl<K: Key, F: Field, V: Value> Default for DataBuffer<K, F, V> {
    fn default() -> Self {
        DataBuffer::new()
    }
}

impl<K, F: std::fmt::Debug, V> std::fmt::Debug for DataBuffer<K, F, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns = self.columns.read();
        f.debug_struct("DataBuffer")
            .field("fields", &columns.keys().collect::<Vec<_>>())
            .field("entries", &columns.values().map(BTreeMap::len).sum::<usize>())
            .finish()
    }
}

fn remove_range<K: Key, V>(column: &mut Column<K, V>, range: &Range<K>) {
    if range.is_all() {
        column.clear();
        return;
    }
    if range.is_empty() {
        return;
    }
    let doomed: Vec<K> = column.range(range.as_bounds()).map(|(k, _)| k.clone()).collect();
    for key in doomed {
        column.remove(&key);
    }
}
