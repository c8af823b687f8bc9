use std::sync::atomic::{AtomicU64, Ordering};
use crate::core::error::{Error, ErrorKind, Result};

/// Hands out segment sequence numbers. Later numbers name newer segments.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    pub const START: u64 = 0;

    pub fn new(start: u64) -> Self {
        SequenceGenerator {
            next: AtomicU64::new(start),
        }
    }

    /// Continues after the highest sequence found on disk.
    pub fn after(last: Option<u64>) -> Result<Self> {
        let start = match last {
            None => Self::START,
            Some(last) => last.checked_add(1).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidState,
                    format!("Segment sequence exhausted after {}", last),
                )
            })?,
        };
        Ok(SequenceGenerator::new(start))
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    pub fn reset(&self, start: u64) {
        self.next.store(start, Ordering::SeqCst);
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        SequenceGenerator::new(Self::START)
    }
}
