use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use chrono::Utc;
use crate::buffer::DataBuffer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Field, Fields, Key, SchemaType, Value};
use crate::range::Range;
use crate::storage::segment::{checksum, CompressionType, SegmentHeader, SegmentMeta};
use crate::tombstone::RangeTombstone;

/// Serialises one buffer + tombstone snapshot into a segment file.
pub struct SegmentWriter {
    pub compression: CompressionType,
    pub sync: bool,
}

impl SegmentWriter {
    pub fn new(compression: CompressionType, sync: bool) -> Self {
        SegmentWriter { compression, sync }
    }

    // [ HEADER (lengths, checksums, compression) ] <- byte 0, fixed size
    // [ META  (range, schema, tombstone)         ] <- bincode
    // [ DATA  (field -> sorted (key, value) list) ] <- bincode, compressed
    pub fn write<K, F, V, T>(
        &self,
        path: &Path,
        buffer: &DataBuffer<K, F, V>,
        tombstone: &RangeTombstone<K, F>,
        schema: &BTreeMap<F, T>,
    ) -> Result<SegmentHeader>
    where
        K: Key,
        F: Field,
        V: Value,
        T: SchemaType,
    {
        let columns = buffer.snapshot(&Fields::All, &Range::all());
        let entries: usize = columns.values().map(Vec::len).sum();

        // Only the types of fields that made it into the segment are recorded
        let schema: BTreeMap<F, T> = schema
            .iter()
            .filter(|(field, _)| columns.contains_key(*field))
            .map(|(field, ty)| (field.clone(), ty.clone()))
            .collect();

        let meta = SegmentMeta {
            range: buffer.ranges().span(),
            schema,
            tombstone: tombstone.clone(),
            entries: entries as u64,
            created_at: Utc::now(),
        };

        let meta_data = bincode::serialize(&meta)?;
        let raw_data = bincode::serialize(&columns)?;
        let data = self.compression.compress(&raw_data)?;

        let mut header = SegmentHeader::new(self.compression);
        header.meta_len = u32::try_from(meta_data.len()).map_err(|_| {
            Error::new(ErrorKind::InvalidArgument, "Segment metadata too large".to_string())
        })?;
        header.meta_checksum = checksum(&meta_data);
        header.data_len = data.len() as u64;
        header.data_checksum = checksum(&data);
        header.seal()?;

        let header_data = bincode::serialize(&header)?;
        debug_assert_eq!(header_data.len(), SegmentHeader::SIZE);

        let mut file = File::create(path)?;
        file.write_all(&header_data)?;
        file.write_all(&meta_data)?;
        file.write_all(&data)?;
        if self.sync {
            file.sync_all()?;
        }

        Ok(header)
    }
}
