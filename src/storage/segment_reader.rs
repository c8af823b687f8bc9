use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use crate::core::error::{Error, Result};
use crate::core::types::{Field, Key, SchemaType, Value};
use crate::storage::segment::{checksum, SegmentHeader, SegmentMeta};

/// Opened segment file, positioned right after the header.
pub struct SegmentReader {
    pub path: PathBuf,
    pub header: SegmentHeader,
    reader: BufReader<File>,
    // Bytes left after the header, bounds every block length read from it
    remaining: u64,
}

impl SegmentReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < SegmentHeader::SIZE as u64 {
            return Err(Error::corrupted(format!("Truncated segment {}", path.display())));
        }
        let mut reader = BufReader::new(file);

        let mut header_buf = vec![0u8; SegmentHeader::SIZE];
        reader.read_exact(&mut header_buf)?;
        let header: SegmentHeader = bincode::deserialize(&header_buf)?;
        header.validate()?;

        Ok(SegmentReader {
            path: path.to_path_buf(),
            header,
            reader,
            remaining: file_len - SegmentHeader::SIZE as u64,
        })
    }

    /// Reads the metadata block. Row data is left on disk.
    pub fn read_meta<K, F, T>(&mut self) -> Result<SegmentMeta<K, F, T>>
    where
        K: Key,
        F: Field,
        T: SchemaType,
    {
        let block = self.read_block(u64::from(self.header.meta_len), self.header.meta_checksum)?;
        Ok(bincode::deserialize(&block)?)
    }

    /// Reads the data block. Must be called after `read_meta`.
    pub fn read_columns<K, F, V>(&mut self) -> Result<BTreeMap<F, Vec<(K, V)>>>
    where
        K: Key,
        F: Field,
        V: Value,
    {
        let block = self.read_block(self.header.data_len, self.header.data_checksum)?;
        let raw = self.header.compression.decompress(&block)?;
        Ok(bincode::deserialize(&raw)?)
    }

    fn read_block(&mut self, len: u64, expected: u32) -> Result<Vec<u8>> {
        if len > self.remaining {
            return Err(Error::corrupted(format!(
                "Block of {} bytes overruns {}",
                len,
                self.path.display()
            )));
        }
        // Fits in memory: bounded by the file size
        let mut block = vec![0u8; len as usize];
        self.reader.read_exact(&mut block)?;
        self.remaining -= len;
        if checksum(&block) != expected {
            return Err(Error::corrupted(format!(
                "Checksum mismatch in {}",
                self.path.display()
            )));
        }
        Ok(block)
    }
}
