use std::collections::BTreeSet;
use std::fmt::Debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Row position, usually a timestamp.
pub trait Key: Ord + Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Key for T where T: Ord + Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Column identifier.
pub trait Field: Ord + Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Field for T where T: Ord + Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

pub trait Value: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Value for T where T: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Type tag attached to a field in segment metadata.
pub trait SchemaType: Clone + Eq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> SchemaType for T where T: Clone + Eq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Field selection. `All` is the wildcard that stands for every field,
/// including ones not written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fields<F> {
    All,
    Only(BTreeSet<F>),
}

impl<F: Ord> Fields<F> {
    pub fn only(fields: impl IntoIterator<Item = F>) -> Self {
        Fields::Only(fields.into_iter().collect())
    }

    pub fn contains(&self, field: &F) -> bool {
        match self {
            Fields::All => true,
            Fields::Only(fields) => fields.contains(field),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Fields::All)
    }
}

impl<F: Ord> From<BTreeSet<F>> for Fields<F> {
    fn from(fields: BTreeSet<F>) -> Self {
        Fields::Only(fields)
    }
}

impl<F: Ord> FromIterator<F> for Fields<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Fields::only(iter)
    }
}
