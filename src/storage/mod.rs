pub mod layout;
pub mod sequence;
pub mod file_lock;
pub mod segment;
pub mod segment_writer;
pub mod segment_reader;
pub mod read_writer;

pub use layout::{SegmentFile, SegmentLayout};
pub use read_writer::{ReadWriter, SegmentReadWriter};
pub use segment::{CompressionType, SegmentMeta};
pub use sequence::SequenceGenerator;
