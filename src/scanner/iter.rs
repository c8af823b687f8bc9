use crate::core::error::Result;
use crate::scanner::scanner::{BoxScanner, Scanner};

/// Adapts any `(key, value)` iterator, typically an ordered map iterator or
/// a materialised `Vec`.
pub struct IterScanner<I, K, V> {
    iter: I,
    current: Option<(K, V)>,
    closed: bool,
}

impl<I, K, V> IterScanner<I, K, V>
where
    I: Iterator<Item = (K, V)>,
{
    pub fn new(iter: I) -> Self {
        IterScanner {
            iter,
            current: None,
            closed: false,
        }
    }
}

impl<K, V> IterScanner<std::vec::IntoIter<(K, V)>, K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    pub fn boxed(entries: Vec<(K, V)>) -> BoxScanner<K, V> {
        Box::new(IterScanner::new(entries.into_iter()))
    }
}

impl<I, K, V> Scanner<K, V> for IterScanner<I, K, V>
where
    I: Iterator<Item = (K, V)>,
{
    fn advance(&mut self) -> Result<bool> {
        if self.closed {
            self.current = None;
            return Ok(false);
        }
        self.current = self.iter.next();
        Ok(self.current.is_some())
    }

    fn current(&mut self) -> Option<(&K, &mut V)> {
        self.current.as_mut().map(|(k, v)| (&*k, v))
    }

    fn take_current(&mut self) -> Option<(K, V)> {
        self.current.take()
    }

    fn close(&mut self) {
        self.closed = true;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scanner::collect_entries;
    use std::collections::BTreeMap;

    #[test]
    fn walks_map_in_order() {
        let map: BTreeMap<i64, &str> = [(3, "c"), (1, "a"), (2, "b")].into_iter().collect();
        let mut scanner = IterScanner::new(map.into_iter());
        assert!(scanner.current().is_none());
        assert!(scanner.advance().unwrap());
        assert_eq!(scanner.current().map(|(k, v)| (*k, *v)), Some((1, "a")));
        assert_eq!(collect_entries(&mut scanner).unwrap(), vec![(2, "b"), (3, "c")]);
    }

    #[test]
    fn close_stops_iteration() {
        let mut scanner = IterScanner::boxed(vec![(1, 1), (2, 2)]);
        assert!(scanner.advance().unwrap());
        scanner.close();
        assert!(!scanner.advance().unwrap());
        assert!(scanner.current().is_none());
    }
}
