use crate::core::error::Result;
use crate::scanner::iter::IterScanner;
use crate::scanner::scanner::{BoxScanner, Scanner};

/// Splits a nested scanner into bounded batches.
///
/// Each batch is keyed by the number of inner entries it holds and carries
/// at most `batch_size` outer entries or inner entries, whichever limit is
/// hit first. Inner scanners are drained while batching.
pub struct BatchScanner<A, B, V, R, S> {
    source: S,
    batch_size: usize,
    current: Option<(usize, BoxScanner<A, BoxScanner<B, V>>)>,
    _marker: std::marker::PhantomData<fn() -> (A, B, V, R)>,
}

impl<A, B, V, R, S> BatchScanner<A, B, V, R, S>
where
    A: Send + 'static,
    B: Send + 'static,
    V: Send + 'static,
{
    pub fn new(source: S, batch_size: usize) -> Self {
        BatchScanner {
            source,
            batch_size: batch_size.max(1),
            current: None,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<A, B, V, S, R> Scanner<usize, BoxScanner<A, BoxScanner<B, V>>> for BatchScanner<A, B, V, R, S>
where
    A: Send + 'static,
    B: Send + 'static,
    V: Send + 'static,
    S: Scanner<A, R>,
    R: Scanner<B, V>,
{
    fn advance(&mut self) -> Result<bool> {
        let mut batch = Vec::new();
        let mut entries = 0usize;

        while entries < self.batch_size && batch.len() < self.batch_size {
            if !self.source.advance()? {
                break;
            }
            let Some((outer, mut inner)) = self.source.take_current() else {
                continue;
            };
            let mut cells = Vec::new();
            while inner.advance()? {
                if let Some(cell) = inner.take_current() {
                    cells.push(cell);
                }
            }
            inner.close();
            entries += cells.len();
            batch.push((outer, IterScanner::boxed(cells)));
        }

        if batch.is_empty() {
            self.current = None;
            return Ok(false);
        }
        self.current = Some((entries, IterScanner::boxed(batch)));
        Ok(true)
    }

    fn current(&mut self) -> Option<(&usize, &mut BoxScanner<A, BoxScanner<B, V>>)> {
        self.current.as_mut().map(|(k, v)| (&*k, v))
    }

    fn take_current(&mut self) -> Option<(usize, BoxScanner<A, BoxScanner<B, V>>)> {
        self.current.take()
    }

    fn close(&mut self) {
        self.source.close();
        self.current = None;
    }
}
