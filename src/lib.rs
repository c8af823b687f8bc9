pub mod core;
pub mod range;
pub mod scanner;
pub mod buffer;
pub mod tombstone;
pub mod storage;
pub mod db;

pub use crate::buffer::DataBuffer;
pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{Field, Fields, Key, SchemaType, Value};
pub use crate::db::OneTierDatabase;
pub use crate::range::{Range, RangeSet};
pub use crate::scanner::{BoxScanner, ChainScanner, ColumnScanner, IterScanner, RowScanner, Scanner};
pub use crate::storage::{CompressionType, ReadWriter, SegmentReadWriter};
pub use crate::tombstone::RangeTombstone;

/*
┌──────────────────────────────────────── ONETIER LAYOUT ─────────────────────────────────────────┐
│                                                                                                  │
│  ┌─────────────────────────────── struct OneTierDatabase ───────────────────────────────────┐  │
│  │ shared: Arc<Shared>                    // State visible to the flush thread               │  │
│  │   ├─ config: Config                    // Thresholds, compression, close behaviour        │  │
│  │   ├─ layout: SegmentLayout             // <N>.seg, <N>.seg.tmp, .lock                      │  │
│  │   ├─ read_writer: RW                   // Segment codec (ReadWriter)                       │  │
│  │   ├─ sequence: SequenceGenerator       // Next segment number                              │  │
│  │   ├─ permit: FlushPermit               // At most one flush in flight                      │  │
│  │   ├─ flushed: RwLock<FlushedState>     // Flushing generation, covered span, schema        │  │
│  │   ├─ written: RwLock<Generation>       // Write buffer, tombstone, declared schema         │  │
│  │   └─ inserted: AtomicUsize             // Entries since the last swap                      │  │
│  │ swap_lock: Mutex<()>                   // Double-checked swap                              │  │
│  │ worker: Mutex<FlushWorker>             // "onetier-flush" thread                           │  │
│  │ file_lock: Mutex<Option<FileLock>>     // Exclusive directory ownership                    │  │
│  └──────────────────────────────────────────────────────────────────────────────────────────┘  │
│                                                                                                  │
│   WRITE   upsert ──► BatchScanner ──► check_before_writing ──► written.buffer                    │
│                                              │ threshold reached                                 │
│                                              ▼                                                   │
│   SWAP    permit ─► flushed.write ─► written.write ─► Arc<Generation> ─► FlushJob ─► worker      │
│                                                                                 │                │
│   FLUSH   ReadWriter::write(<N>.seg.tmp) ─► rename(<N>.seg) ─► flushed.generation = None ◄┘     │
│                                                                                                  │
│   READ    segments (oldest ─► newest) ─► flushing generation ─► write generation ─► Scanner      │
│           each step: tombstone playback, then rows on top                                        │
│                                                                                                  │
└──────────────────────────────────────────────────────────────────────────────────────────────────┘
*/
