use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use crate::buffer::DataBuffer;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Field, Fields, Key, SchemaType, Value};
use crate::db::flusher::{FlushJob, FlushPermit, FlushWorker, PermitGuard};
use crate::db::generation::{check_schema, merge_schema, FlushedState, Generation};
use crate::range::{Range, RangeSet};
use crate::scanner::{BatchScanner, ChainScanner, ColumnScanner, RowScanner, Scanner};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::{SegmentFile, SegmentLayout};
use crate::storage::read_writer::{ReadWriter, SegmentReadWriter};
use crate::storage::sequence::SequenceGenerator;
use crate::tombstone::RangeTombstone;

const FLUSH_THREAD_NAME: &str = "onetier-flush";

/// State shared with the flush thread.
struct Shared<K, F, V, T, RW> {
    config: Config,
    layout: SegmentLayout,
    read_writer: RW,
    sequence: SequenceGenerator,
    permit: FlushPermit,
    // Lock order: permit, then flushed, then written
    flushed: RwLock<FlushedState<K, F, V, T>>,
    written: RwLock<Generation<K, F, V, T>>,
    inserted: AtomicUsize,
    closed: AtomicBool,
}

/// Single-tier storage engine: one in-memory write generation, at most one
/// generation being flushed, and a directory of immutable segments.
///
/// Writes land in the write generation. Once `flush_threshold` entries have
/// been inserted the generation is retired and a background thread persists
/// it as the next segment. Reads merge segments oldest to newest, then the
/// flushing generation, then the write generation, so later data wins and
/// every generation's tombstone suppresses what came before it.
pub struct OneTierDatabase<K, F, V, T, RW = SegmentReadWriter>
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
    RW: ReadWriter<K, F, V, T>,
{
    shared: Arc<Shared<K, F, V, T, RW>>,
    swap_lock: Mutex<()>,
    worker: Mutex<FlushWorker<FlushJob<K, F, V, T>>>,
    file_lock: Mutex<Option<FileLock>>,
}

impl<K, F, V, T> OneTierDatabase<K, F, V, T, SegmentReadWriter>
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
{
    /// Opens with the built-in segment codec configured from `config`.
    pub fn with_config(config: Config) -> Result<Self> {
        let read_writer = SegmentReadWriter::from_config(&config);
        OneTierDatabase::open(config, read_writer)
    }
}

impl<K, F, V, T, RW> OneTierDatabase<K, F, V, T, RW>
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
    RW: ReadWriter<K, F, V, T>,
{
    /// Binds to `config.storage_path`, creating it if needed.
    ///
    /// Takes the directory lock, removes temp files of interrupted flushes
    /// and rebuilds the covered range and schema from segment metadata.
    /// Conflicting field types across segments fail the open.
    pub fn open(config: Config, read_writer: RW) -> Result<Self> {
        let layout = SegmentLayout::new(config.storage_path.clone(), read_writer.extension());
        layout.create_dir()?;
        let file_lock = FileLock::acquire(&layout)?;

        let cleaned = layout.clean_temp_files()?;
        if cleaned > 0 {
            warn!(dir = %layout.base_dir.display(), files = cleaned, "removed unfinished segments");
        }

        let segments = layout.list_segments()?;
        let (ranges, schema) = load_disk_state::<K, F, V, T, RW>(&read_writer, &segments)?;
        let sequence = SequenceGenerator::after(segments.first().map(|s| s.sequence))?;

        info!(
            dir = %layout.base_dir.display(),
            segments = segments.len(),
            next_sequence = sequence.peek(),
            "opened database"
        );

        let shared = Arc::new(Shared {
            config,
            layout,
            read_writer,
            sequence,
            permit: FlushPermit::new(),
            flushed: RwLock::new(FlushedState::new(ranges, schema)),
            written: RwLock::new(Generation::new()),
            inserted: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });

        let flusher = shared.clone();
        let worker = FlushWorker::spawn(FLUSH_THREAD_NAME, move |job| flusher.run_flush(job))?;

        Ok(OneTierDatabase {
            shared,
            swap_lock: Mutex::new(()),
            worker: Mutex::new(worker),
            file_lock: Mutex::new(Some(file_lock)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Inserts or overwrites row-major data. `schema` declares the types of
    /// the written fields. Returns the number of entries written.
    pub fn upsert_rows<S, R>(&self, rows: S, schema: &BTreeMap<F, T>) -> Result<usize>
    where
        S: Scanner<K, R>,
        R: Scanner<F, V>,
    {
        self.ensure_open()?;
        let mut batches: BatchScanner<K, F, V, R, S> =
            BatchScanner::new(rows, self.shared.config.write_batch_size);
        let mut total = 0;
        while batches.advance()? {
            let Some((_, mut batch)) = batches.take_current() else {
                continue;
            };
            self.check_before_writing()?;
            total += self.shared.apply(schema, |buffer| buffer.put_rows(&mut batch))?;
        }
        batches.close();
        Ok(total)
    }

    /// Inserts or overwrites column-major data. Same contract as `upsert_rows`.
    pub fn upsert_columns<S, C>(&self, columns: S, schema: &BTreeMap<F, T>) -> Result<usize>
    where
        S: Scanner<F, C>,
        C: Scanner<K, V>,
    {
        self.ensure_open()?;
        let mut batches: BatchScanner<F, K, V, C, S> =
            BatchScanner::new(columns, self.shared.config.write_batch_size);
        let mut total = 0;
        while batches.advance()? {
            let Some((_, mut batch)) = batches.take_current() else {
                continue;
            };
            self.check_before_writing()?;
            total += self.shared.apply(schema, |buffer| buffer.put_columns(&mut batch))?;
        }
        batches.close();
        Ok(total)
    }

    /// Retires the write generation once `flush_threshold` entries went in.
    ///
    /// Blocks while another flush is in flight. The disk write itself runs
    /// on the flush thread.
    pub fn check_before_writing(&self) -> Result<()> {
        self.ensure_open()?;
        let threshold = self.shared.config.flush_threshold;
        if self.shared.inserted.load(Ordering::Acquire) < threshold {
            return Ok(());
        }

        let _swap = self.swap_lock.lock();
        if self.shared.inserted.load(Ordering::Acquire) < threshold {
            return Ok(());
        }

        let permit = self.shared.permit.acquire()?;
        self.ensure_open()?;

        match self.shared.retire_write_generation(permit) {
            Some(job) => {
                info!(sequence = job.sequence, entries = job.generation.buffer.len(), "flush triggered");
                self.worker.lock().submit(job)
            }
            None => Ok(()),
        }
    }

    /// Deletes `ranges` of the selected fields.
    pub fn delete(&self, fields: &Fields<F>, ranges: &RangeSet<K>) -> Result<()> {
        let mut deletion = RangeTombstone::new();
        deletion.delete(fields, ranges);
        self.apply_deletion(deletion)
    }

    /// Deletes whole fields.
    pub fn delete_rows(&self, fields: &BTreeSet<F>) -> Result<()> {
        let mut deletion = RangeTombstone::new();
        deletion.delete_fields(fields);
        self.apply_deletion(deletion)
    }

    /// Deletes `ranges` across every field.
    pub fn delete_columns(&self, ranges: &RangeSet<K>) -> Result<()> {
        let mut deletion = RangeTombstone::new();
        deletion.delete_ranges(ranges);
        self.apply_deletion(deletion)
    }

    pub fn delete_all(&self) -> Result<()> {
        self.delete_columns(&RangeSet::all())
    }

    fn apply_deletion(&self, deletion: RangeTombstone<K, F>) -> Result<()> {
        self.ensure_open()?;
        if deletion.is_empty() {
            return Ok(());
        }
        let _flushed = self.shared.flushed.read();
        let mut written = self.shared.written.write();
        self.ensure_open()?;
        written.delete(&deletion);
        debug!(?deletion, "recorded deletion");
        Ok(())
    }

    /// Merged row-major view of `fields` over `range`.
    pub fn query(&self, fields: &Fields<F>, range: &Range<K>) -> Result<RowScanner<K, F, V>> {
        self.ensure_open()?;
        let merged = self.shared.merge(fields, range)?;
        Ok(merged.scan_rows(fields, range))
    }

    /// Rows of `fields` over every member of `ranges`, in key order.
    pub fn query_ranges(&self, fields: &Fields<F>, ranges: &RangeSet<K>) -> Result<RowScanner<K, F, V>> {
        self.ensure_open()?;
        let Some(span) = ranges.span() else {
            return Ok(Box::new(ChainScanner::new(Vec::new())));
        };
        let merged = self.shared.merge(fields, &span)?;
        let parts: Vec<RowScanner<K, F, V>> = ranges
            .iter()
            .map(|range| merged.scan_rows(fields, range))
            .collect();
        Ok(Box::new(ChainScanner::new(parts)))
    }

    pub fn scan(&self, fields: &Fields<F>, range: &Range<K>) -> Result<RowScanner<K, F, V>> {
        self.query(fields, range)
    }

    /// Merged column-major view of `fields` over `range`.
    pub fn query_columns(&self, fields: &Fields<F>, range: &Range<K>) -> Result<ColumnScanner<K, F, V>> {
        self.ensure_open()?;
        let merged = self.shared.merge(fields, range)?;
        Ok(merged.scan_columns(fields, range))
    }

    /// Single span covering every key that may hold data.
    pub fn ranges(&self) -> Result<RangeSet<K>> {
        self.ensure_open()?;
        let flushed = self.shared.flushed.read();
        let written = self.shared.written.read();
        let mut ranges = flushed.ranges.clone();
        written.tombstone.playback_ranges(&mut ranges);
        ranges.add_all(&written.buffer.ranges());
        Ok(ranges.to_span())
    }

    /// Field types, from segment metadata plus the in-memory generations.
    pub fn schema(&self) -> Result<BTreeMap<F, T>> {
        self.ensure_open()?;
        let flushed = self.shared.flushed.read();
        let segments = self.shared.layout.list_segments()?;
        let (_, mut schema) = load_disk_state::<K, F, V, T, RW>(&self.shared.read_writer, &segments)?;

        if let Some(generation) = &flushed.generation {
            generation.replay_schema(&mut schema)?;
        }
        self.shared.written.read().replay_schema(&mut schema)?;
        Ok(schema)
    }

    /// Drops all data in memory and on disk. Waits for an in-flight flush.
    pub fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        let _permit = self.shared.permit.acquire()?;
        let mut flushed = self.shared.flushed.write();
        let mut written = self.shared.written.write();
        self.ensure_open()?;

        *written = Generation::new();
        flushed.reset();
        self.shared.inserted.store(0, Ordering::Release);
        let removed = self.shared.layout.remove_all_segments()?;
        self.shared.sequence.reset(SequenceGenerator::START);

        info!(dir = %self.shared.layout.base_dir.display(), removed, "cleared database");
        Ok(())
    }

    /// Persists what is left in memory as one final segment, stops the flush
    /// thread and releases the directory.
    ///
    /// Persistence failures are logged, not returned. Closing twice is an
    /// error, as is any other call after close.
    pub fn close(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Error::new(ErrorKind::InvalidState, "database is already closed".to_string()));
        }

        {
            let _permit = self.shared.permit.acquire()?;
            let mut flushed = self.shared.flushed.write();
            let mut written = self.shared.written.write();
            if self.shared.closed.swap(true, Ordering::AcqRel) {
                return Err(Error::new(ErrorKind::InvalidState, "database is already closed".to_string()));
            }

            let outgoing = mem::take(&mut *written);
            let remaining = match flushed.generation.take() {
                Some(failed) => outgoing.fold_over(&failed),
                None => outgoing,
            };

            if !self.shared.config.flush_on_close {
                if !remaining.is_empty() {
                    warn!(entries = remaining.buffer.len(), "closing without flush, in-memory data dropped");
                }
            } else if !remaining.is_empty() {
                let sequence = self.shared.sequence.next();
                match self.shared.persist(sequence, &remaining) {
                    Ok(path) => info!(path = %path.display(), sequence, "final flush complete"),
                    Err(e) => error!(sequence, error = %e, "final flush failed"),
                }
            }
        }

        self.worker.lock().shutdown();
        self.file_lock.lock().take();
        info!(dir = %self.shared.layout.base_dir.display(), "closed database");
        Ok(())
    }

    /// Blocks until no flush is in flight.
    pub fn await_flush(&self) -> Result<()> {
        self.ensure_open()?;
        drop(self.shared.permit.acquire()?);
        Ok(())
    }

    /// Entries inserted into the write generation since it was installed.
    pub fn pending_inserts(&self) -> usize {
        self.shared.inserted.load(Ordering::Acquire)
    }

    /// Segment files, newest first.
    pub fn segments(&self) -> Result<Vec<PathBuf>> {
        self.ensure_open()?;
        let _flushed = self.shared.flushed.read();
        Ok(self
            .shared
            .layout
            .list_segments()?
            .into_iter()
            .map(|segment| segment.path)
            .collect())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        self.shared.ensure_open()
    }
}

impl<K, F, V, T, RW> Drop for OneTierDatabase<K, F, V, T, RW>
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
    RW: ReadWriter<K, F, V, T>,
{
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!(error = %e, "close on drop failed");
        }
    }
}

impl<K, F, V, T, RW> Shared<K, F, V, T, RW>
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
    RW: ReadWriter<K, F, V, T>,
{
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        Ok(())
    }

    /// Runs one ingestion batch against the write generation.
    fn apply<W>(&self, schema: &BTreeMap<F, T>, write: W) -> Result<usize>
    where
        W: FnOnce(&DataBuffer<K, F, V>) -> Result<usize>,
    {
        let flushed = self.flushed.read();
        let mut written = self.written.write();
        self.ensure_open()?;

        if !schema.is_empty() {
            // A field dropped in this generation may come back with a new type
            let retired: BTreeMap<F, T> = schema
                .keys()
                .filter(|field| !written.schema.contains_key(*field))
                .filter(|field| !written.tombstone.drops_field(field))
                .filter_map(|field| flushed.schema.get_key_value(field))
                .map(|(f, t)| (f.clone(), t.clone()))
                .collect();
            check_schema(&retired, schema, "upsert")?;
            written.declare(schema)?;
        }

        let count = write(&written.buffer)?;
        self.inserted.fetch_add(count, Ordering::AcqRel);
        Ok(count)
    }

    /// Swaps in a fresh write generation and hands the old one, folded over
    /// any generation whose flush failed, to the flush thread.
    fn retire_write_generation(&self, permit: PermitGuard) -> Option<FlushJob<K, F, V, T>> {
        let mut flushed = self.flushed.write();
        let mut written = self.written.write();

        let outgoing = mem::take(&mut *written);
        self.inserted.store(0, Ordering::Release);
        flushed.retire(&outgoing);

        let generation = match flushed.generation.take() {
            Some(failed) => {
                warn!("retrying generation from failed flush");
                outgoing.fold_over(&failed)
            }
            None if outgoing.is_empty() => return None,
            None => outgoing,
        };

        let generation = Arc::new(generation);
        flushed.generation = Some(generation.clone());
        Some(FlushJob {
            sequence: self.sequence.next(),
            generation,
            permit,
        })
    }

    fn run_flush(&self, job: FlushJob<K, F, V, T>) {
        let FlushJob { sequence, generation, permit } = job;
        match self.persist(sequence, &generation) {
            Ok(path) => {
                let mut flushed = self.flushed.write();
                if flushed.generation.as_ref().is_some_and(|live| Arc::ptr_eq(live, &generation)) {
                    flushed.generation = None;
                }
                info!(
                    path = %path.display(),
                    sequence,
                    entries = generation.buffer.len(),
                    "flush complete"
                );
            }
            Err(e) => {
                error!(sequence, error = %e, "flush failed, generation kept in memory");
            }
        }
        drop(permit);
    }

    /// Writes `generation` to a temp file and renames it to segment `sequence`.
    fn persist(&self, sequence: u64, generation: &Generation<K, F, V, T>) -> Result<PathBuf> {
        let temp = self.layout.temp_path(sequence);
        let path = self.layout.segment_path(sequence);

        let written = self
            .read_writer
            .write(&temp, &generation.buffer, &generation.tombstone, &generation.schema)
            .and_then(|()| fs::rename(&temp, &path).map_err(Error::from));

        if let Err(e) = written {
            match fs::remove_file(&temp) {
                Ok(()) => {}
                Err(rm) if rm.kind() == io::ErrorKind::NotFound => {}
                Err(rm) => warn!(path = %temp.display(), error = %rm, "failed to remove temp file"),
            }
            return Err(e);
        }

        debug!(from = %temp.display(), to = %path.display(), "renamed segment");
        Ok(path)
    }

    /// Folds every generation into one read buffer, oldest first.
    fn merge(&self, fields: &Fields<F>, range: &Range<K>) -> Result<DataBuffer<K, F, V>> {
        let merged = DataBuffer::new();
        if range.is_empty() {
            return Ok(merged);
        }

        let flushed = self.flushed.read();
        let segments = self.layout.list_segments()?;
        for segment in segments.iter().rev() {
            let (mut rows, tombstone) = self.read_writer.read(&segment.path, fields, range)?;
            tombstone.playback_buffer(&merged);
            merged.put_rows(&mut rows)?;
        }

        if let Some(generation) = &flushed.generation {
            generation.replay_onto(&merged, fields, range)?;
        }
        self.written.read().replay_onto(&merged, fields, range)?;

        debug!(segments = segments.len(), entries = merged.len(), "merged read buffer");
        Ok(merged)
    }
}

/// Covered span and schema of the segments, from metadata only.
fn load_disk_state<K, F, V, T, RW>(
    read_writer: &RW,
    segments: &[SegmentFile],
) -> Result<(RangeSet<K>, BTreeMap<F, T>)>
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
    RW: ReadWriter<K, F, V, T>,
{
    let mut ranges = RangeSet::new();
    let mut schema = BTreeMap::new();

    for segment in segments.iter().rev() {
        let meta = read_writer.read_meta(&segment.path)?;

        meta.tombstone.playback_ranges(&mut ranges);
        if let Some(range) = meta.range {
            ranges.add(range);
        }

        meta.tombstone.playback_schema(&mut schema);
        merge_schema(&mut schema, &meta.schema, format!("segment {}", segment.path.display()))?;
    }

    Ok((ranges.to_span(), schema))
}
