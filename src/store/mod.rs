//! Versioned document storage - the only layer that touches the backing store.
//!
//! Every document carries a version that increases by one on each committed
//! write. Conditional writes (`update`) succeed only when the caller's
//! expected version still matches, which is the optimistic concurrency
//! primitive the counter transaction is built on.

mod in_memory;
mod transaction;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use in_memory::InMemoryDocumentStore;
pub use transaction::run_transaction;

/// Trait for types that can be persisted in a [`DocumentStore`].
///
/// Usually derived with `#[derive(Document)]`.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// The collection name for this document type (e.g. "receipt_counters", "orders").
    const COLLECTION: &'static str;

    /// Returns the unique identifier of this document within its collection.
    fn id(&self) -> &str;
}

/// A document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another writer committed between our read and our write.
    #[error("concurrency conflict on {collection}:{id} (expected version {expected}, actual {actual})")]
    Conflict {
        collection: String,
        id: String,
        expected: u64,
        actual: u64,
    },
    #[error("document not found: {collection}:{id}")]
    NotFound { collection: String, id: String },
    /// The backend cannot be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("document serialization error: {0}")]
    Serde(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub(crate) fn not_found<D: Document>(id: &str) -> Self {
        StoreError::NotFound {
            collection: D::COLLECTION.to_string(),
            id: id.to_string(),
        }
    }
}

/// Abstract versioned document storage.
///
/// Implementations talk to the real backend; [`InMemoryDocumentStore`] backs
/// tests and single-process deployments.
pub trait DocumentStore: Send + Sync {
    /// Get a document by ID. Returns None if not found.
    fn get<D: Document>(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError>;

    /// Insert a new document. Fails with `Conflict` if it already exists.
    fn insert<D: Document>(&self, doc: &D) -> Result<Versioned<D>, StoreError>;

    /// Unconditional insert-or-replace.
    fn upsert<D: Document>(&self, doc: &D) -> Result<Versioned<D>, StoreError>;

    /// Replace an existing document only if it is still at `expected_version`.
    fn update<D: Document>(&self, doc: &D, expected_version: u64) -> Result<Versioned<D>, StoreError>;

    /// Enumerate every document of a collection matching a predicate, in the
    /// store's natural iteration order.
    fn find<D: Document>(
        &self,
        predicate: &dyn Fn(&D) -> bool,
    ) -> Result<Vec<Versioned<D>>, StoreError>;
}
