use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::Resource;

/// How the idempotency gate treats a record whose id is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdCollision {
    /// Last writer wins.
    Overwrite,
    /// The stored record is returned as an idempotent replay.
    ReturnExisting,
}

/// Result of [`ResourceStore::create`].
#[derive(Debug, Clone)]
pub struct Created<R> {
    pub record: R,
    /// True when the gate short-circuited to a record that was already stored.
    pub existing: bool,
}

#[derive(Debug)]
struct Inner<R> {
    records: HashMap<String, R>,
    /// idempotency key → record id
    keys: HashMap<String, String>,
}

/// In-memory resource map plus its idempotency index.
///
/// Cheap to clone: every clone shares the same maps. Both maps sit behind one
/// lock so the key check and the insert are a single atomic step.
#[derive(Debug)]
pub struct ResourceStore<R> {
    inner: Arc<RwLock<Inner<R>>>,
}

impl<R> Clone for ResourceStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resource> Default for ResourceStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> ResourceStore<R> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                records: HashMap::new(),
                keys: HashMap::new(),
            })),
        }
    }

    /// Idempotency gate.
    ///
    /// A key that maps to a live record returns that record. A key whose
    /// record has since been removed is stale and counts as a miss. On a miss
    /// the record gets an id from `generate_id` when it has none, is marked
    /// accepted, and is stored together with its key.
    pub async fn create(
        &self,
        mut record: R,
        on_collision: IdCollision,
        generate_id: impl FnOnce() -> String,
    ) -> Created<R> {
        let mut inner = self.inner.write().await;

        if let Some(key) = record.idempotency_key() {
            if let Some(existing) = inner.keys.get(key).and_then(|id| inner.records.get(id)) {
                return Created {
                    record: existing.clone(),
                    existing: true,
                };
            }
        }

        if record.id().is_empty() {
            record.assign_id(generate_id());
        } else if on_collision == IdCollision::ReturnExisting {
            if let Some(existing) = inner.records.get(record.id()) {
                return Created {
                    record: existing.clone(),
                    existing: true,
                };
            }
        }

        record.mark_accepted();
        let id = record.id().to_string();
        if inner.records.contains_key(&id) {
            inner.keys.retain(|_, mapped| mapped.as_str() != id);
        }
        if let Some(key) = record.idempotency_key() {
            inner.keys.insert(key.to_string(), id.clone());
        }
        inner.records.insert(id, record.clone());

        Created {
            record,
            existing: false,
        }
    }

    pub async fn get(&self, id: &str) -> Option<R> {
        self.inner.read().await.records.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<R> {
        self.inner.read().await.records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Applies `f` to the stored record and returns the updated copy, or
    /// `None` when `id` is not stored.
    pub async fn update<F>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut R),
    {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(id)?;
        f(record);
        Some(record.clone())
    }

    /// Removes the record and every idempotency key pointing at it.
    pub async fn remove(&self, id: &str) -> Option<R> {
        let mut inner = self.inner.write().await;
        let removed = inner.records.remove(id)?;
        inner.keys.retain(|_, mapped| mapped.as_str() != id);
        Some(removed)
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.records.clear();
        inner.keys.clear();
    }

    #[cfg(test)]
    pub(crate) async fn key_count(&self) -> usize {
        self.inner.read().await.keys.len()
    }
}
