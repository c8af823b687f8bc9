use crate::core::error::Result;
use crate::scanner::iter::IterScanner;
use crate::scanner::scanner::{BoxScanner, Scanner};

/// Turns a set of per-field column scanners into one row-major scanner.
///
/// Each row holds every field whose column has an entry at that key, in the
/// order the columns were given.
pub struct ColumnUnionRowScanner<K, F, V> {
    columns: Vec<(F, BoxScanner<K, V>)>,
    heads: Vec<Option<(K, V)>>,
    primed: bool,
    current: Option<(K, BoxScanner<F, V>)>,
}

impl<K, F, V> ColumnUnionRowScanner<K, F, V>
where
    K: Ord + Clone + Send + 'static,
    F: Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new(columns: impl IntoIterator<Item = (F, BoxScanner<K, V>)>) -> Self {
        let columns: Vec<_> = columns.into_iter().collect();
        let heads = columns.iter().map(|_| None).collect();
        ColumnUnionRowScanner {
            columns,
            heads,
            primed: false,
            current: None,
        }
    }

    fn pull(column: &mut BoxScanner<K, V>) -> Result<Option<(K, V)>> {
        if column.advance()? {
            Ok(column.take_current())
        } else {
            Ok(None)
        }
    }
}

impl<K, F, V> Scanner<K, BoxScanner<F, V>> for ColumnUnionRowScanner<K, F, V>
where
    K: Ord + Clone + Send + 'static,
    F: Clone + Send + 'static,
    V: Send + 'static,
{
    fn advance(&mut self) -> Result<bool> {
        if !self.primed {
            for (i, (_, column)) in self.columns.iter_mut().enumerate() {
                self.heads[i] = Self::pull(column)?;
            }
            self.primed = true;
        }

        let next_key = self.heads.iter().flatten().map(|(k, _)| k).min().cloned();
        let Some(key) = next_key else {
            self.current = None;
            return Ok(false);
        };

        let mut row = Vec::new();
        for (i, (field, column)) in self.columns.iter_mut().enumerate() {
            let at_key = matches!(&self.heads[i], Some((k, _)) if *k == key);
            if !at_key {
                continue;
            }
            if let Some((_, value)) = self.heads[i].take() {
                row.push((field.clone(), value));
            }
            self.heads[i] = Self::pull(column)?;
        }

        self.current = Some((key, IterScanner::boxed(row)));
        Ok(true)
    }

    fn current(&mut self) -> Option<(&K, &mut BoxScanner<F, V>)> {
        self.current.as_mut().map(|(k, v)| (&*k, v))
    }

    fn take_current(&mut self) -> Option<(K, BoxScanner<F, V>)> {
        self.current.take()
    }

    fn close(&mut self) {
        for (_, column) in self.columns.iter_mut() {
            column.close();
        }
        for head in self.heads.iter_mut() {
            *head = None;
        }
        self.primed = true;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scanner::collect_nested;

    #[test]
    fn unions_columns_by_key() {
        let columns = vec![
            ("a", IterScanner::boxed(vec![(1, 10), (3, 30)])),
            ("b", IterScanner::boxed(vec![(2, 20), (3, 31)])),
        ];
        let mut rows = ColumnUnionRowScanner::new(columns);
        let rows = collect_nested(&mut rows).unwrap();
        assert_eq!(
            rows,
            vec![
                (1, vec![("a", 10)]),
                (2, vec![("b", 20)]),
                (3, vec![("a", 30), ("b", 31)]),
            ]
        );
    }

    #[test]
    fn no_columns_means_no_rows() {
        let mut rows = ColumnUnionRowScanner::<i64, &str, i64>::new(Vec::new());
        assert!(!rows.advance().unwrap());
    }
}
