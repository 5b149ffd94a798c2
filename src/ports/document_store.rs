//! DocumentStore port - remote JSON document storage.
//!
//! The ledger needs one transactional primitive, `atomic_transform`, and two
//! plain calls, `get` and `set`, for status-only syncs that do not need the
//! idempotency guard. Compare-and-swap and conflict retry belong to the
//! implementation; callers only see the committed result or an error.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::domain::foundation::UserId;

/// Location of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    collection: &'static str,
    id: String,
}

impl DocumentKey {
    const LEDGER_COLLECTION: &'static str = "credit_ledgers";

    /// Key of a user's ledger record.
    pub fn ledger(user_id: &UserId) -> Self {
        Self {
            collection: Self::LEDGER_COLLECTION,
            id: user_id.as_str().to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// What a transform decided to do with the document it was given.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Replace the document with this value.
    Commit(Value),
    /// Leave the document as it is; nothing is written.
    Keep,
}

/// Errors from the document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("write contention on {0}")]
    Contention(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid document at {key}: {reason}")]
    InvalidDocument { key: String, reason: String },

    #[error("transform aborted: {0}")]
    Aborted(String),
}

impl StoreError {
    /// True for contention and availability errors worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Contention(_)
                | StoreError::DeadlineExceeded(_)
                | StoreError::Unavailable(_)
                | StoreError::ResourceExhausted(_)
        )
    }
}

/// Transform callback. May run more than once when the store retries a
/// conflicting write, so it must not have effects beyond its return value
/// and captured outcome.
pub type TransformFn<'a> =
    dyn FnMut(Option<Value>) -> Result<Transform, StoreError> + Send + 'a;

/// Port for the remote document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Atomically reads the document, passes it to `transform`, and writes
    /// the result if the document did not change in between.
    ///
    /// Returns the document as it stands after the call.
    async fn atomic_transform(
        &self,
        key: &DocumentKey,
        transform: &mut TransformFn<'_>,
    ) -> Result<Option<Value>, StoreError>;

    /// Reads a document without any transactional guarantee.
    async fn get(&self, key: &DocumentKey) -> Result<Option<Value>, StoreError>;

    /// Writes a document. With `merge` the top-level fields of `partial` are
    /// merged into the existing document; otherwise it is replaced.
    async fn set(&self, key: &DocumentKey, partial: Value, merge: bool) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn DocumentStore) {}

    #[test]
    fn ledger_key_renders_as_path() {
        let key = DocumentKey::ledger(&UserId::new("user-1").unwrap());
        assert_eq!(key.to_string(), "credit_ledgers/user-1");
        assert_eq!(key.id(), "user-1");
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Contention("k".into()).is_transient());
        assert!(StoreError::DeadlineExceeded("k".into()).is_transient());
        assert!(StoreError::Unavailable("k".into()).is_transient());
        assert!(StoreError::ResourceExhausted("k".into()).is_transient());
        assert!(!StoreError::PermissionDenied("k".into()).is_transient());
        assert!(!StoreError::Aborted("k".into()).is_transient());
    }
}
