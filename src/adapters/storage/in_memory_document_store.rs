//! In-Memory Document Store Adapter
//!
//! Versioned JSON documents with optimistic compare-and-swap. Useful for
//! testing, the demo binary, and as the reference behaviour for real
//! backends.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ports::{DocumentKey, DocumentStore, StoreError, Transform, TransformFn};

const DEFAULT_CONFLICT_RETRIES: usize = 5;

#[derive(Debug, Clone)]
struct VersionedDocument {
    value: Value,
    version: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<DocumentKey, VersionedDocument>,
    faults: VecDeque<StoreError>,
    writes: usize,
    transform_calls: usize,
}

/// In-memory document store
///
/// `atomic_transform` reads a snapshot, runs the transform without holding
/// the lock, and commits only if the version is unchanged. Conflicts are
/// retried a bounded number of times, after which `StoreError::Contention`
/// is returned.
#[derive(Debug, Clone)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<StoreState>>,
    conflict_retries: usize,
}

impl InMemoryDocumentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    /// Create a store that retries CAS conflicts `retries` times.
    pub fn with_conflict_retries(retries: usize) -> Self {
        Self {
            conflict_retries: retries.max(1),
            ..Self::new()
        }
    }

    // === Test Helpers ===

    /// Queue an error returned by the next store operation.
    pub async fn fail_next(&self, error: StoreError) {
        self.state.lock().await.faults.push_back(error);
    }

    /// Queue the same error for the next `count` operations.
    pub async fn fail_next_n(&self, count: usize, error: StoreError) {
        let mut state = self.state.lock().await;
        for _ in 0..count {
            state.faults.push_back(error.clone());
        }
    }

    /// Number of committed writes.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Number of times a transform callback was invoked.
    pub async fn transform_calls(&self) -> usize {
        self.state.lock().await.transform_calls
    }

    /// Insert or replace a document directly, bypassing fault injection.
    pub async fn seed(&self, key: DocumentKey, value: Value) {
        let mut state = self.state.lock().await;
        let version = state.documents.get(&key).map(|d| d.version + 1).unwrap_or(1);
        state.documents.insert(key, VersionedDocument { value, version });
    }

    async fn take_fault(&self) -> Result<(), StoreError> {
        match self.state.lock().await.faults.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_into(target: &mut Value, partial: Value) {
    match (target, partial) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (field, value) in fields {
                existing.insert(field, value);
            }
        }
        (target, partial) => *target = partial,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn atomic_transform(
        &self,
        key: &DocumentKey,
        transform: &mut TransformFn<'_>,
    ) -> Result<Option<Value>, StoreError> {
        for attempt in 1..=self.conflict_retries {
            self.take_fault().await?;

            let snapshot = {
                let mut state = self.state.lock().await;
                state.transform_calls += 1;
                state.documents.get(key).cloned()
            };

            // Let concurrent writers interleave between read and commit
            tokio::task::yield_now().await;

            let next = match transform(snapshot.as_ref().map(|d| d.value.clone()))? {
                Transform::Keep => return Ok(snapshot.map(|d| d.value)),
                Transform::Commit(next) => next,
            };

            let mut state = self.state.lock().await;
            let current_version = state.documents.get(key).map(|d| d.version);
            let read_version = snapshot.as_ref().map(|d| d.version);
            if current_version == read_version {
                let version = read_version.unwrap_or(0) + 1;
                state.documents.insert(
                    key.clone(),
                    VersionedDocument {
                        value: next.clone(),
                        version,
                    },
                );
                state.writes += 1;
                return Ok(Some(next));
            }

            tracing::debug!(key = %key, attempt, "Document changed during transform, retrying");
        }

        Err(StoreError::Contention(key.to_string()))
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<Value>, StoreError> {
        self.take_fault().await?;
        let state = self.state.lock().await;
        Ok(state.documents.get(key).map(|d| d.value.clone()))
    }

    async fn set(&self, key: &DocumentKey, partial: Value, merge: bool) -> Result<(), StoreError> {
        self.take_fault().await?;
        let mut state = self.state.lock().await;
        let entry = state
            .documents
            .entry(key.clone())
            .or_insert_with(|| VersionedDocument {
                value: Value::Object(Default::default()),
                version: 0,
            });
        if merge {
            merge_into(&mut entry.value, partial);
        } else {
            entry.value = partial;
        }
        entry.version += 1;
        state.writes += 1;
        Ok(())
    }
}
