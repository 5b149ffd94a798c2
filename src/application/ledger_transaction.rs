//! CreditLedgerTransaction - atomic, idempotent writes to the credit ledger.
//!
//! Every operation is a single read-modify-write through
//! [`DocumentStore::atomic_transform`]. The store owns compare-and-swap;
//! this layer owns idempotency and the bounded retry on transient store
//! errors. A failed operation never leaves a partial write behind.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{CreditConfig, LedgerConfig};
use crate::domain::billing::{CreditError, LedgerChange, LedgerDecision, LedgerRecord, StatusPatch};
use crate::domain::foundation::{PurchaseId, Timestamp, UserId};
use crate::ports::{DocumentKey, DocumentStore, StoreError, Transform};

/// Result of [`CreditLedgerTransaction::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Balance after the call.
    pub credits: i64,
    /// True when the purchase id had already been applied.
    pub already_processed: bool,
    /// True when a write was committed.
    pub written: bool,
    /// True when the committed write flipped the premium flag.
    pub premium_changed: bool,
    /// The record as stored after the call.
    pub record: LedgerRecord,
}

impl ApplyOutcome {
    /// Purchase id of the change this call committed, if it had one.
    pub fn purchase_id(&self) -> Option<&PurchaseId> {
        if !self.written {
            return None;
        }
        self.record
            .purchase_history
            .last()
            .and_then(|entry| entry.purchase_id.as_ref())
    }
}

/// What a transaction step wants done with the document.
enum Step<T> {
    Write(LedgerRecord, T),
    Keep(T),
}

/// Executes ledger changes against the document store.
pub struct CreditLedgerTransaction {
    store: Arc<dyn DocumentStore>,
    credits: CreditConfig,
    ledger: LedgerConfig,
}

impl CreditLedgerTransaction {
    pub fn new(store: Arc<dyn DocumentStore>, credits: CreditConfig, ledger: LedgerConfig) -> Self {
        Self {
            store,
            credits,
            ledger,
        }
    }

    pub fn credit_config(&self) -> &CreditConfig {
        &self.credits
    }

    pub fn ledger_config(&self) -> &LedgerConfig {
        &self.ledger
    }

    /// Applies a billing change exactly once per purchase id.
    ///
    /// A repeated purchase id returns the stored balance with
    /// `already_processed` set. A status-only sync that changes nothing
    /// returns the stored record without writing.
    pub async fn apply(
        &self,
        user_id: &UserId,
        change: &LedgerChange,
    ) -> Result<ApplyOutcome, CreditError> {
        let credits = &self.credits;
        let ledger = &self.ledger;

        let outcome = self
            .transact(user_id, |current| {
                let now = Timestamp::now();
                let was_premium = current.as_ref().is_some_and(|r| r.is_premium);
                match LedgerRecord::plan(current.as_ref(), change, credits, ledger, now)? {
                    LedgerDecision::AlreadyProcessed => {
                        let record = current.unwrap_or_else(|| LedgerRecord::empty(now));
                        Ok(Step::Keep(ApplyOutcome {
                            credits: record.credits,
                            already_processed: true,
                            written: false,
                            premium_changed: false,
                            record,
                        }))
                    }
                    LedgerDecision::Unchanged => {
                        let record = current.unwrap_or_else(|| LedgerRecord::empty(now));
                        Ok(Step::Keep(ApplyOutcome {
                            credits: record.credits,
                            already_processed: false,
                            written: false,
                            premium_changed: false,
                            record,
                        }))
                    }
                    LedgerDecision::Commit(next) => Ok(Step::Write(
                        next.clone(),
                        ApplyOutcome {
                            credits: next.credits,
                            already_processed: false,
                            written: true,
                            premium_changed: next.is_premium != was_premium,
                            record: next,
                        },
                    )),
                }
            })
            .await?;

        if outcome.already_processed {
            tracing::info!(
                user_id = %user_id,
                purchase_id = ?change.purchase_id.as_ref().map(|id| id.as_str()),
                "Purchase already processed, skipping"
            );
        } else if !outcome.written {
            tracing::debug!(user_id = %user_id, "Status sync unchanged, skipping write");
        } else {
            tracing::info!(
                user_id = %user_id,
                credits = outcome.credits,
                status = %outcome.record.status,
                "Ledger updated"
            );
        }

        Ok(outcome)
    }

    /// Removes `cost` credits. Fails without writing when the balance is short.
    pub async fn deduct(&self, user_id: &UserId, cost: i64) -> Result<LedgerRecord, CreditError> {
        self.transact(user_id, |current| {
            let mut record = current.ok_or_else(|| CreditError::not_found(user_id.clone()))?;
            record.deduct(cost, Timestamp::now())?;
            Ok(Step::Write(record.clone(), record))
        })
        .await
    }

    /// Adds `amount` credits back to an existing ledger.
    pub async fn refund(&self, user_id: &UserId, amount: i64) -> Result<LedgerRecord, CreditError> {
        self.transact(user_id, |current| {
            let mut record = current.ok_or_else(|| CreditError::not_found(user_id.clone()))?;
            record.refund(amount, Timestamp::now());
            Ok(Step::Write(record.clone(), record))
        })
        .await
    }

    /// Reads the ledger without a transaction.
    pub async fn read(&self, user_id: &UserId) -> Result<Option<LedgerRecord>, CreditError> {
        let key = DocumentKey::ledger(user_id);
        let document = self.store.get(&key).await.map_err(map_store_error)?;
        document.map(|value| decode(&key, value)).transpose()
    }

    /// Merge-writes status fields only. Credits are never touched.
    pub async fn merge_status(&self, user_id: &UserId, patch: &StatusPatch) -> Result<(), CreditError> {
        let key = DocumentKey::ledger(user_id);
        let partial = serde_json::to_value(patch)
            .map_err(|e| CreditError::unknown(format!("Failed to encode status patch: {}", e)))?;
        self.store
            .set(&key, partial, true)
            .await
            .map_err(map_store_error)?;

        tracing::info!(user_id = %user_id, "Status fields merged");
        Ok(())
    }

    /// Runs `step` inside an atomic transform, retrying transient store
    /// errors with linear backoff up to `max_attempts` attempts in total.
    async fn transact<T, F>(&self, user_id: &UserId, mut step: F) -> Result<T, CreditError>
    where
        T: Send,
        F: FnMut(Option<LedgerRecord>) -> Result<Step<T>, CreditError> + Send,
    {
        let key = DocumentKey::ledger(user_id);
        let max_attempts = self.ledger.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let mut outcome: Option<Result<T, CreditError>> = None;

            let result = self
                .store
                .atomic_transform(&key, &mut |current: Option<Value>| {
                    let current = match current.map(|value| decode(&key, value)).transpose() {
                        Ok(current) => current,
                        Err(err) => {
                            let reason = err.to_string();
                            outcome = Some(Err(err));
                            return Err(StoreError::Aborted(reason));
                        }
                    };

                    match step(current) {
                        Ok(Step::Keep(value)) => {
                            outcome = Some(Ok(value));
                            Ok(Transform::Keep)
                        }
                        Ok(Step::Write(next, value)) => match serde_json::to_value(&next) {
                            Ok(document) => {
                                outcome = Some(Ok(value));
                                Ok(Transform::Commit(document))
                            }
                            Err(e) => {
                                let reason = format!("Failed to encode ledger record: {}", e);
                                outcome = Some(Err(CreditError::unknown(reason.clone())));
                                Err(StoreError::Aborted(reason))
                            }
                        },
                        Err(err) => {
                            let reason = err.to_string();
                            outcome = Some(Err(err));
                            Err(StoreError::Aborted(reason))
                        }
                    }
                })
                .await;

            match result {
                Ok(_) => {
                    return outcome.unwrap_or_else(|| {
                        Err(CreditError::unknown("Transform finished without an outcome"))
                    });
                }
                Err(StoreError::Aborted(reason)) => {
                    return match outcome {
                        Some(Err(err)) => Err(err),
                        _ => Err(CreditError::unknown(reason)),
                    };
                }
                Err(err) if err.is_transient() => {
                    if attempt < max_attempts {
                        let backoff = self.ledger.backoff_for(attempt);
                        tracing::warn!(
                            user_id = %user_id,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %err,
                            "Transient store error, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(map_store_error(err)),
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "store unavailable".to_string());
        tracing::error!(user_id = %user_id, attempts = max_attempts, "Ledger transaction gave up: {}", reason);
        Err(CreditError::transient_store(reason))
    }
}

fn decode(key: &DocumentKey, value: Value) -> Result<LedgerRecord, CreditError> {
    serde_json::from_value(value)
        .map_err(|e| CreditError::unknown(format!("Corrupt ledger document {}: {}", key, e)))
}

fn map_store_error(err: StoreError) -> CreditError {
    if err.is_transient() {
        CreditError::transient_store(err.to_string())
    } else {
        CreditError::unknown(err.to_string())
    }
}
