//! Paged query results and the collection envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Projection, Resource};
use crate::error::StorageResult;

/// One page of query results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Offset of the first item within the full result.
    pub offset: u32,

    /// The items in this page.
    pub items: Vec<T>,

    /// Number of matches before paging, when the provider knows it.
    pub total: Option<u64>,
}

impl<T> Page<T> {
    /// Creates a new page.
    pub fn new(offset: u32, items: Vec<T>) -> Self {
        Self {
            offset,
            items,
            total: None,
        }
    }

    /// Creates an empty page.
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Sets the total match count.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Returns true if this page has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maps the items to a different type.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            offset: self.offset,
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E: Resource> Page<E> {
    /// Serializes the page in the given projection.
    pub fn to_envelope(&self, projection: Projection) -> StorageResult<CollectionEnvelope> {
        let col = self
            .items
            .iter()
            .map(|item| item.project(projection))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(CollectionEnvelope {
            offset: self.offset,
            col,
            total: self.total,
        })
    }
}

/// Wire form of a collection: `{"offset": n, "col": [...]}`.
///
/// `value` is accepted in place of `col` when reading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionEnvelope {
    #[serde(default)]
    pub offset: u32,

    #[serde(default, alias = "value")]
    pub col: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl CollectionEnvelope {
    /// Decodes every item into an entity.
    pub fn into_page<E: Resource>(self) -> StorageResult<Page<E>> {
        let items = self
            .col
            .into_iter()
            .map(E::from_json)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Page {
            offset: self.offset,
            items,
            total: self.total,
        })
    }
}
