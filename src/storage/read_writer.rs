use std::collections::BTreeMap;
use std::path::Path;
use crate::buffer::DataBuffer;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{Field, Fields, Key, SchemaType, Value};
use crate::range::Range;
use crate::scanner::{ColumnUnionRowScanner, IterScanner, RowScanner};
use crate::storage::segment::{CompressionType, SegmentMeta};
use crate::storage::segment_reader::SegmentReader;
use crate::storage::segment_writer::SegmentWriter;
use crate::tombstone::RangeTombstone;

/// Persists generations as immutable segment files and reads them back.
///
/// Implementations only deal with single files; naming, renaming and
/// ordering belong to the database.
pub trait ReadWriter<K, F, V, T>: Send + Sync + 'static
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
{
    /// File extension of finished segments, without the dot.
    fn extension(&self) -> &str {
        "seg"
    }

    fn write(
        &self,
        path: &Path,
        buffer: &DataBuffer<K, F, V>,
        tombstone: &RangeTombstone<K, F>,
        schema: &BTreeMap<F, T>,
    ) -> Result<()>;

    /// Covered key range, schema and embedded tombstone, without row data.
    fn read_meta(&self, path: &Path) -> Result<SegmentMeta<K, F, T>>;

    /// Rows of the requested slice plus the segment's embedded tombstone.
    fn read(
        &self,
        path: &Path,
        fields: &Fields<F>,
        range: &Range<K>,
    ) -> Result<(RowScanner<K, F, V>, RangeTombstone<K, F>)>;
}

/// Default codec: checksummed bincode blocks with optional compression.
#[derive(Debug, Clone)]
pub struct SegmentReadWriter {
    compression: CompressionType,
    sync: bool,
}

impl SegmentReadWriter {
    pub fn new(compression: CompressionType) -> Self {
        SegmentReadWriter {
            compression,
            sync: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        SegmentReadWriter {
            compression: config.compression,
            sync: config.sync_segments,
        }
    }
}

impl Default for SegmentReadWriter {
    fn default() -> Self {
        SegmentReadWriter::new(CompressionType::Lz4)
    }
}

impl<K, F, V, T> ReadWriter<K, F, V, T> for SegmentReadWriter
where
    K: Key,
    F: Field,
    V: Value,
    T: SchemaType,
{
    fn write(
        &self,
        path: &Path,
        buffer: &DataBuffer<K, F, V>,
        tombstone: &RangeTombstone<K, F>,
        schema: &BTreeMap<F, T>,
    ) -> Result<()> {
        SegmentWriter::new(self.compression, self.sync).write(path, buffer, tombstone, schema)?;
        Ok(())
    }

    fn read_meta(&self, path: &Path) -> Result<SegmentMeta<K, F, T>> {
        SegmentReader::open(path)?.read_meta()
    }

    fn read(
        &self,
        path: &Path,
        fields: &Fields<F>,
        range: &Range<K>,
    ) -> Result<(RowScanner<K, F, V>, RangeTombstone<K, F>)> {
        let mut reader = SegmentReader::open(path)?;
        let meta: SegmentMeta<K, F, T> = reader.read_meta()?;

        let mut columns = Vec::new();
        if !range.is_empty() {
            for (field, entries) in reader.read_columns::<K, F, V>()? {
                if !fields.contains(&field) {
                    continue;
                }
                let entries: Vec<(K, V)> = entries
                    .into_iter()
                    .filter(|(key, _)| range.contains(key))
                    .collect();
                if !entries.is_empty() {
                    columns.push((field, IterScanner::boxed(entries)));
                }
            }
        }

        Ok((Box::new(ColumnUnionRowScanner::new(columns)), meta.tombstone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::range::RangeSet;
    use crate::scanner::collect_nested;
    use std::fs;

    type Rw = dyn ReadWriter<i64, String, String, String>;

    fn sample() -> (DataBuffer<i64, String, String>, RangeTombstone<i64, String>, BTreeMap<String, String>) {
        let buffer = DataBuffer::new();
        for key in 0..20 {
            buffer.put("a".to_string(), key, format!("a{key}"));
        }
        buffer.put("b".to_string(), 7, "b7".to_string());

        let mut tombstone = RangeTombstone::new();
        tombstone.delete(&Fields::only(["c".to_string()]), &RangeSet::of(Range::at_most(3)));

        let schema = [
            ("a".to_string(), "string".to_string()),
            ("b".to_string(), "string".to_string()),
            ("gone".to_string(), "long".to_string()),
        ]
        .into_iter()
        .collect();
        (buffer, tombstone, schema)
    }

    #[test]
    fn meta_is_readable_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.seg");
        let (buffer, tombstone, schema) = sample();
        let rw: &Rw = &SegmentReadWriter::new(CompressionType::Zstd);
        rw.write(&path, &buffer, &tombstone, &schema).unwrap();

        let meta = rw.read_meta(&path).unwrap();
        assert_eq!(meta.range, Some(Range::closed(0, 19)));
        assert_eq!(meta.entries, 21);
        assert_eq!(meta.tombstone, tombstone);
        assert_eq!(meta.schema.keys().cloned().collect::<Vec<_>>(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn read_slices_fields_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.seg");
        let (buffer, tombstone, schema) = sample();
        let rw: &Rw = &SegmentReadWriter::default();
        rw.write(&path, &buffer, &tombstone, &schema).unwrap();

        let (mut rows, read_tombstone) = rw
            .read(&path, &Fields::All, &Range::closed(6, 8))
            .unwrap();
        let rows = collect_nested(&mut rows).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].0, 7);
        assert_eq!(rows[1].1.len(), 2);
        assert_eq!(read_tombstone, tombstone);

        let (mut rows, _) = rw
            .read(&path, &Fields::only(["b".to_string()]), &Range::all())
            .unwrap();
        assert_eq!(collect_nested(&mut rows).unwrap(), vec![(7, vec![("b".to_string(), "b7".to_string())])]);
    }

    #[test]
    fn corrupted_data_block_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.seg");
        let (buffer, tombstone, schema) = sample();
        let rw: &Rw = &SegmentReadWriter::new(CompressionType::None);
        rw.write(&path, &buffer, &tombstone, &schema).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(rw.read_meta(&path).is_ok());
        let err = rw.read(&path, &Fields::All, &Range::all()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn oversized_block_lengths_are_rejected() {
        use crate::storage::segment::SegmentHeader;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.seg");
        let (buffer, tombstone, schema) = sample();
        let rw: &Rw = &SegmentReadWriter::new(CompressionType::Lz4);
        rw.write(&path, &buffer, &tombstone, &schema).unwrap();
        let pristine = fs::read(&path).unwrap();

        // Raw bit rot in data_len trips the header checksum
        let mut bytes = pristine.clone();
        bytes[20..28].copy_from_slice(&(1u64 << 62).to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        assert_eq!(rw.read_meta(&path).err().unwrap().kind(), ErrorKind::Corrupted);
        let err = rw.read(&path, &Fields::All, &Range::all()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupted);

        // A consistently sealed header still cannot claim more bytes than the file holds
        let mut header: SegmentHeader =
            bincode::deserialize(&pristine[..SegmentHeader::SIZE]).unwrap();
        header.data_len = 1 << 62;
        header.seal().unwrap();
        let mut bytes = bincode::serialize(&header).unwrap();
        bytes.extend_from_slice(&pristine[SegmentHeader::SIZE..]);
        fs::write(&path, &bytes).unwrap();
        assert!(rw.read_meta(&path).is_ok());
        let err = rw.read(&path, &Fields::All, &Range::all()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupted);

        let mut header: SegmentHeader =
            bincode::deserialize(&pristine[..SegmentHeader::SIZE]).unwrap();
        header.meta_len = u32::MAX;
        header.seal().unwrap();
        let mut bytes = bincode::serialize(&header).unwrap();
        bytes.extend_from_slice(&pristine[SegmentHeader::SIZE..]);
        fs::write(&path, &bytes).unwrap();
        assert_eq!(rw.read_meta(&path).err().unwrap().kind(), ErrorKind::Corrupted);
    }
}
