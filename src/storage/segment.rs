use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::range::Range;
use crate::tombstone::RangeTombstone;

/// Everything about a segment except its rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, F: Serialize + Ord, T: Serialize",
    deserialize = "K: Deserialize<'de>, F: Deserialize<'de> + Ord, T: Deserialize<'de>"
))]
pub struct SegmentMeta<K, F, T> {
    /// Closed span of the keys stored in the segment, `None` when it holds no rows.
    pub range: Option<Range<K>>,
    pub schema: BTreeMap<F, T>,
    pub tombstone: RangeTombstone<K, F>,
    pub entries: u64,
    pub created_at: DateTime<Utc>,
}

/// Fixed-size segment file header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub compression: CompressionType,
    pub meta_len: u32,
    pub meta_checksum: u32,   // CRC32 of the meta block
    pub data_len: u64,
    pub data_checksum: u32,   // CRC32 of the (compressed) data block
    pub header_checksum: u32, // CRC32 of the fields above
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Lz4,      // Fast, ratio 2-3x
    Zstd,     // Better ratio, slower
}

impl SegmentHeader {
    pub const MAGIC: [u8; 4] = *b"OTSG";
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 36; // bincode fixint encoding of the fields above

    pub fn new(compression: CompressionType) -> Self {
        SegmentHeader {
            magic: Self::MAGIC,
            version: Self::VERSION,
            compression,
            meta_len: 0,
            meta_checksum: 0,
            data_len: 0,
            data_checksum: 0,
            header_checksum: 0,
        }
    }

    fn compute_checksum(&self) -> Result<u32> {
        let mut unsealed = self.clone();
        unsealed.header_checksum = 0;
        Ok(checksum(&bincode::serialize(&unsealed)?))
    }

    /// Fills in `header_checksum` once every other field is final.
    pub fn seal(&mut self) -> Result<()> {
        self.header_checksum = self.compute_checksum()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(Error::corrupted("Bad segment magic".to_string()));
        }
        if self.version != Self::VERSION {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("Incompatible segment version {}", self.version),
            ));
        }
        if self.header_checksum != self.compute_checksum()? {
            return Err(Error::corrupted("Segment header checksum mismatch".to_string()));
        }
        Ok(())
    }
}

impl CompressionType {
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        let compressed = match self {
            CompressionType::None => data.to_vec(),
            CompressionType::Lz4 => lz4_flex::compress_prepend_size(data),
            CompressionType::Zstd => zstd::encode_all(data, 3)?, // Level 3 is balanced
        };
        Ok(compressed)
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        let raw = match self {
            CompressionType::None => data.to_vec(),
            CompressionType::Lz4 => lz4_flex::decompress_size_prepended(data)?,
            CompressionType::Zstd => zstd::decode_all(data)?,
        };
        Ok(raw)
    }
}

pub fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
