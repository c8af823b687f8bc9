use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use serde::{Deserialize, Serialize};

/// Interval over the key space. Either end may be closed, open or unbounded.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range<K> {
    lower: Bound<K>,
    upper: Bound<K>,
}

impl<K: Ord> Range<K> {
    pub fn new(lower: Bound<K>, upper: Bound<K>) -> Self {
        Range { lower, upper }
    }

    pub fn all() -> Self {
        Range::new(Unbounded, Unbounded)
    }

    /// `[lower, upper]`
    pub fn closed(lower: K, upper: K) -> Self {
        Range::new(Included(lower), Included(upper))
    }

    /// `(lower, upper)`
    pub fn open(lower: K, upper: K) -> Self {
        Range::new(Excluded(lower), Excluded(upper))
    }

    /// `[lower, upper)`
    pub fn closed_open(lower: K, upper: K) -> Self {
        Range::new(Included(lower), Excluded(upper))
    }

    /// `(lower, upper]`
    pub fn open_closed(lower: K, upper: K) -> Self {
        Range::new(Excluded(lower), Included(upper))
    }

    pub fn at_least(lower: K) -> Self {
        Range::new(Included(lower), Unbounded)
    }

    pub fn greater_than(lower: K) -> Self {
        Range::new(Excluded(lower), Unbounded)
    }

    pub fn at_most(upper: K) -> Self {
        Range::new(Unbounded, Included(upper))
    }

    pub fn less_than(upper: K) -> Self {
        Range::new(Unbounded, Excluded(upper))
    }

    pub fn singleton(key: K) -> Self
    where
        K: Clone,
    {
        Range::closed(key.clone(), key)
    }

    pub fn lower(&self) -> &Bound<K> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<K> {
        &self.upper
    }

    pub fn into_bounds(self) -> (Bound<K>, Bound<K>) {
        (self.lower, self.upper)
    }

    /// Borrowed bounds in the shape `BTreeMap::range` expects.
    /// Callers must check `is_empty` first, `BTreeMap::range` panics on inverted bounds.
    pub fn as_bounds(&self) -> (Bound<&K>, Bound<&K>) {
        (self.lower.as_ref(), self.upper.as_ref())
    }

    pub fn is_all(&self) -> bool {
        matches!((&self.lower, &self.upper), (Unbounded, Unbounded))
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Unbounded, _) | (_, Unbounded) => false,
            (Included(a), Included(b)) => a > b,
            (Included(a), Excluded(b))
            | (Excluded(a), Included(b))
            | (Excluded(a), Excluded(b)) => a >= b,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        let above_lower = match &self.lower {
            Unbounded => true,
            Included(l) => l <= key,
            Excluded(l) => l < key,
        };
        let below_upper = match &self.upper {
            Unbounded => true,
            Included(u) => key <= u,
            Excluded(u) => key < u,
        };
        above_lower && below_upper
    }

    /// True when every key of `other` is also in `self`.
    pub fn encloses(&self, other: &Range<K>) -> bool {
        if other.is_empty() {
            return true;
        }
        cmp_lower(&self.lower, &other.lower) != Ordering::Greater
            && cmp_upper(&other.upper, &self.upper) != Ordering::Greater
    }

    /// True when the union of both ranges is itself a single range.
    pub fn is_connected(&self, other: &Range<K>) -> bool {
        let lower = max_lower(&self.lower, &other.lower);
        let upper = min_upper(&self.upper, &other.upper);
        match (lower, upper) {
            (Unbounded, _) | (_, Unbounded) => true,
            (Included(a), Included(b))
            | (Included(a), Excluded(b))
            | (Excluded(a), Included(b)) => a <= b,
            (Excluded(a), Excluded(b)) => a < b,
        }
    }
}

impl<K: Ord + Clone> Range<K> {
    pub fn intersects(&self, other: &Range<K>) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Largest range enclosed by both. May be empty.
    pub fn intersection(&self, other: &Range<K>) -> Range<K> {
        Range::new(
            max_lower(&self.lower, &other.lower).clone(),
            min_upper(&self.upper, &other.upper).clone(),
        )
    }

    /// Smallest range enclosing both.
    pub fn span(&self, other: &Range<K>) -> Range<K> {
        let lower = if cmp_lower(&self.lower, &other.lower) == Ordering::Greater {
            &other.lower
        } else {
            &self.lower
        };
        let upper = if cmp_upper(&self.upper, &other.upper) == Ordering::Less {
            &other.upper
        } else {
            &self.upper
        };
        Range::new(lower.clone(), upper.clone())
    }

    /// Parts of `self` not covered by `other`, in key order.
    pub fn difference(&self, other: &Range<K>) -> Vec<Range<K>> {
        if !self.intersects(other) {
            return vec![self.clone()];
        }

        let mut pieces = Vec::with_capacity(2);
        if let Some(upper) = flip(&other.lower) {
            let below = self.intersection(&Range::new(Unbounded, upper));
            if !below.is_empty() {
                pieces.push(below);
            }
        }
        if let Some(lower) = flip(&other.upper) {
            let above = self.intersection(&Range::new(lower, Unbounded));
            if !above.is_empty() {
                pieces.push(above);
            }
        }
        pieces
    }
}

impl<K: fmt::Debug> fmt::Debug for Range<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Unbounded => write!(f, "(-inf")?,
            Included(k) => write!(f, "[{:?}", k)?,
            Excluded(k) => write!(f, "({:?}", k)?,
        }
        write!(f, "..")?;
        match &self.upper {
            Unbounded => write!(f, "+inf)"),
            Included(k) => write!(f, "{:?}]", k),
            Excluded(k) => write!(f, "{:?})", k),
        }
    }
}

/// Orders two lower bounds by the first key they admit.
pub(crate) fn cmp_lower<K: Ord>(a: &Bound<K>, b: &Bound<K>) -> Ordering {
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Less,
        (_, Unbounded) => Ordering::Greater,
        (Included(x), Included(y)) | (Excluded(x), Excluded(y)) => x.cmp(y),
        (Included(x), Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Excluded(x), Included(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

/// Orders two upper bounds by the last key they admit.
pub(crate) fn cmp_upper<K: Ord>(a: &Bound<K>, b: &Bound<K>) -> Ordering {
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Greater,
        (_, Unbounded) => Ordering::Less,
        (Included(x), Included(y)) | (Excluded(x), Excluded(y)) => x.cmp(y),
        (Included(x), Excluded(y)) => x.cmp(y).then(Ordering::Greater),
        (Excluded(x), Included(y)) => x.cmp(y).then(Ordering::Less),
    }
}

fn max_lower<'a, K: Ord>(a: &'a Bound<K>, b: &'a Bound<K>) -> &'a Bound<K> {
    if cmp_lower(a, b) == Ordering::Less { b } else { a }
}

fn min_upper<'a, K: Ord>(a: &'a Bound<K>, b: &'a Bound<K>) -> &'a Bound<K> {
    if cmp_upper(a, b) == Ordering::Greater { b } else { a }
}

// The bound on the other side of an endpoint: `[x` becomes `x)`, `(x` becomes `x]`.
fn flip<K: Clone>(bound: &Bound<K>) -> Option<Bound<K>> {
    match bound {
        Unbounded => None,
        Included(k) => Some(Excluded(k.clone())),
        Excluded(k) => Some(Included(k.clone())),
    }
}
