use std::collections::VecDeque;
use crate::core::error::Result;
use crate::scanner::scanner::{BoxScanner, Scanner};

/// Drains its parts one after another. Keys stay ordered as long as the
/// parts cover ascending, disjoint key ranges.
pub struct ChainScanner<K, V> {
    parts: VecDeque<BoxScanner<K, V>>,
}

impl<K, V> ChainScanner<K, V> {
    pub fn new(parts: impl IntoIterator<Item = BoxScanner<K, V>>) -> Self {
        ChainScanner {
            parts: parts.into_iter().collect(),
        }
    }
}

impl<K, V> Scanner<K, V> for ChainScanner<K, V> {
    fn advance(&mut self) -> Result<bool> {
        while let Some(part) = self.parts.front_mut() {
            if part.advance()? {
                return Ok(true);
            }
            if let Some(mut done) = self.parts.pop_front() {
                done.close();
            }
        }
        Ok(false)
    }

    fn current(&mut self) -> Option<(&K, &mut V)> {
        self.parts.front_mut()?.current()
    }

    fn take_current(&mut self) -> Option<(K, V)> {
        self.parts.front_mut()?.take_current()
    }

    fn close(&mut self) {
        for mut part in self.parts.drain(..) {
            part.close();
        }
    }
}
