use crate::core::error::Result;

/// Pull-based cursor over ordered `(key, value)` entries.
///
/// A fresh scanner is positioned before its first entry; call `advance`
/// before reading. Values may themselves be scanners, which is how row-major
/// (`key -> field -> value`) and column-major (`field -> key -> value`) data
/// is passed around.
pub trait Scanner<K, V> {
    /// Moves to the next entry. Returns `false` once exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Entry under the cursor, `None` before the first `advance`, after the
    /// last one, or after the entry was taken.
    fn current(&mut self) -> Option<(&K, &mut V)>;

    /// Moves the current entry out of the scanner.
    fn take_current(&mut self) -> Option<(K, V)>;

    /// Releases resources early. Further `advance` calls return `false`.
    fn close(&mut self) {}
}

impl<K, V, S> Scanner<K, V> for Box<S>
where
    S: Scanner<K, V> + ?Sized,
{
    fn advance(&mut self) -> Result<bool> {
        (**self).advance()
    }

    fn current(&mut self) -> Option<(&K, &mut V)> {
        (**self).current()
    }

    fn take_current(&mut self) -> Option<(K, V)> {
        (**self).take_current()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

pub type BoxScanner<K, V> = Box<dyn Scanner<K, V> + Send>;

/// `key -> (field -> value)`
pub type RowScanner<K, F, V> = BoxScanner<K, BoxScanner<F, V>>;

/// `field -> (key -> value)`
pub type ColumnScanner<K, F, V> = BoxScanner<F, BoxScanner<K, V>>;

/// Drains a flat scanner.
pub fn collect_entries<K, V, S>(scanner: &mut S) -> Result<Vec<(K, V)>>
where
    S: Scanner<K, V> + ?Sized,
{
    let mut entries = Vec::new();
    while scanner.advance()? {
        if let Some(entry) = scanner.take_current() {
            entries.push(entry);
        }
    }
    scanner.close();
    Ok(entries)
}

/// Drains a nested scanner into owned vectors.
pub fn collect_nested<A, B, V, S, R>(scanner: &mut S) -> Result<Vec<(A, Vec<(B, V)>)>>
where
    S: Scanner<A, R> + ?Sized,
    R: Scanner<B, V>,
{
    let mut entries = Vec::new();
    while scanner.advance()? {
        if let Some((outer, mut inner)) = scanner.take_current() {
            entries.push((outer, collect_entries(&mut inner)?));
        }
    }
    scanner.close();
    Ok(entries)
}
