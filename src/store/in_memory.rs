//! InMemoryDocumentStore - BTreeMap-backed document store for tests and single-process use.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::{Document, DocumentStore, StoreError, Versioned};

struct StoredDocument {
    bytes: Vec<u8>,
    version: u64,
}

/// In-memory document store.
///
/// Storage key is `"COLLECTION:id"`; iteration follows key order, so `find`
/// returns documents sorted by id. Clone-friendly via Arc.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    storage: Arc<RwLock<BTreeMap<String, StoredDocument>>>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    fn encode<D: Document>(doc: &D) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(doc).map_err(|e| StoreError::Serde(e.to_string()))
    }

    fn decode<D: Document>(bytes: &[u8]) -> Result<D, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serde(e.to_string()))
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("lock poisoned".into())
}

impl DocumentStore for InMemoryDocumentStore {
    fn get<D: Document>(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        let key = Self::make_key(D::COLLECTION, id);
        let storage = self.storage.read().map_err(poisoned)?;

        match storage.get(&key) {
            Some(stored) => Ok(Some(Versioned {
                data: Self::decode(&stored.bytes)?,
                version: stored.version,
            })),
            None => Ok(None),
        }
    }

    fn insert<D: Document>(&self, doc: &D) -> Result<Versioned<D>, StoreError> {
        let key = Self::make_key(D::COLLECTION, doc.id());
        let bytes = Self::encode(doc)?;

        let mut storage = self.storage.write().map_err(poisoned)?;
        if let Some(existing) = storage.get(&key) {
            return Err(StoreError::Conflict {
                collection: D::COLLECTION.to_string(),
                id: doc.id().to_string(),
                expected: 0,
                actual: existing.version,
            });
        }

        storage.insert(key, StoredDocument { bytes, version: 1 });
        Ok(Versioned {
            data: doc.clone(),
            version: 1,
        })
    }

    fn upsert<D: Document>(&self, doc: &D) -> Result<Versioned<D>, StoreError> {
        let key = Self::make_key(D::COLLECTION, doc.id());
        let bytes = Self::encode(doc)?;

        let mut storage = self.storage.write().map_err(poisoned)?;
        let version = storage.get(&key).map(|s| s.version + 1).unwrap_or(1);
        storage.insert(key, StoredDocument { bytes, version });

        Ok(Versioned {
            data: doc.clone(),
            version,
        })
    }

    fn update<D: Document>(&self, doc: &D, expected_version: u64) -> Result<Versioned<D>, StoreError> {
        let key = Self::make_key(D::COLLECTION, doc.id());
        let bytes = Self::encode(doc)?;

        let mut storage = self.storage.write().map_err(poisoned)?;
        let actual = storage
            .get(&key)
            .map(|s| s.version)
            .ok_or_else(|| StoreError::not_found::<D>(doc.id()))?;

        if actual != expected_version {
            return Err(StoreError::Conflict {
                collection: D::COLLECTION.to_string(),
                id: doc.id().to_string(),
                expected: expected_version,
                actual,
            });
        }

        let version = actual + 1;
        storage.insert(key, StoredDocument { bytes, version });
        Ok(Versioned {
            data: doc.clone(),
            version,
        })
    }

    fn find<D: Document>(
        &self,
        predicate: &dyn Fn(&D) -> bool,
    ) -> Result<Vec<Versioned<D>>, StoreError> {
        let prefix = format!("{}:", D::COLLECTION);
        let storage = self.storage.read().map_err(poisoned)?;

        let mut results = Vec::new();
        for (_, stored) in storage
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
        {
            let data: D = Self::decode(&stored.bytes)?;
            if predicate(&data) {
                results.push(Versioned {
                    data,
                    version: stored.version,
                });
            }
        }
        Ok(results)
    }
}
