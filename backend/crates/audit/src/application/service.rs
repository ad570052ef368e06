//! Audit Service
//!
//! The one piece of shared mutable state in the subsystem: the chain plus
//! the pending queue, owned by an explicitly constructed service that is
//! injected into handlers. All mutations go through the internal mutex;
//! seals additionally pass a non-reentrant busy flag so two triggers can
//! never race for the same sequence number.

use crate::application::config::AuditConfig;
use crate::domain::chain::{Chain, ChainReport};
use crate::domain::entities::OperationRecord;
use crate::domain::repository::BlockRepository;
use crate::domain::services;
use crate::domain::value_objects::OperationKind;
use crate::error::{AuditError, AuditResult};
use chrono::Utc;
use platform::crypto::constant_time_eq;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Input DTO for recording an operation
#[derive(Debug, Clone)]
pub struct RecordOperationInput {
    pub kind: OperationKind,
    pub actor_id: String,
    pub subject_table: String,
    pub subject_id: String,
    pub before_state: Option<Value>,
    pub after_state: Value,
    pub metadata: Option<Value>,
}

impl RecordOperationInput {
    fn validate(&self) -> AuditResult<()> {
        if self.actor_id.trim().is_empty() {
            return Err(AuditError::Validation("actorId must not be empty".into()));
        }
        if self.subject_table.trim().is_empty() {
            return Err(AuditError::Validation(
                "subjectTable must not be empty".into(),
            ));
        }
        if self.subject_id.trim().is_empty() {
            return Err(AuditError::Validation("subjectId must not be empty".into()));
        }
        if self.after_state.is_null() {
            return Err(AuditError::Validation("afterState must not be null".into()));
        }
        Ok(())
    }
}

/// Outcome of an integrity verification. A mismatch is a normal result,
/// not an error; the two failure reasons are always kept distinct.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub reason: Option<String>,
}

/// Read-only snapshot of the chain and queue
#[derive(Debug, Clone)]
pub struct ChainStats {
    pub chain_length: u64,
    pub pending_count: usize,
    pub last_hash: String,
    pub is_valid: bool,
    pub total_records: u64,
}

/// Summary of a freshly sealed block
#[derive(Debug, Clone)]
pub struct SealedBlockSummary {
    pub sequence_number: u64,
    pub hash: String,
    pub record_count: usize,
}

/// What caused a seal attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealTrigger {
    BatchSize,
    Interval,
    Forced,
}

impl std::fmt::Display for SealTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SealTrigger::BatchSize => "batch-size",
            SealTrigger::Interval => "interval",
            SealTrigger::Forced => "forced",
        };
        write!(f, "{s}")
    }
}

struct AuditState {
    chain: Chain,
    pending: Vec<OperationRecord>,
    /// Batch drained for the seal currently in flight. Records here are
    /// older than anything in `pending` and must stay visible to
    /// verification until the block is appended or the seal aborts.
    in_flight: Vec<OperationRecord>,
    /// Busy flag: at most one seal in flight. A second trigger while this
    /// is set is a no-op and its records stay queued.
    sealing: bool,
}

/// The audit log service: chain + pending queue behind one lock.
pub struct AuditService<R>
where
    R: BlockRepository + Send + Sync + 'static,
{
    state: Arc<Mutex<AuditState>>,
    repo: Arc<R>,
    config: Arc<AuditConfig>,
}

impl<R> Clone for AuditService<R>
where
    R: BlockRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            repo: Arc::clone(&self.repo),
            config: Arc::clone(&self.config),
        }
    }
}

impl<R> AuditService<R>
where
    R: BlockRepository + Send + Sync + 'static,
{
    /// Construct the service, rehydrating the chain from the repository.
    /// An empty store mints and persists a fresh genesis block.
    pub async fn bootstrap(repo: Arc<R>, config: Arc<AuditConfig>) -> AuditResult<Self> {
        let blocks = repo.load_blocks().await?;
        let chain = if blocks.is_empty() {
            let chain = Chain::bootstrap(config.difficulty);
            repo.save_block(chain.latest()).await?;
            tracing::info!(hash = %chain.latest().hash, "minted genesis block");
            chain
        } else {
            let chain = Chain::from_blocks(blocks)?;
            tracing::info!(chain_length = chain.len(), "rehydrated audit chain");
            chain
        };

        Ok(Self {
            state: Arc::new(Mutex::new(AuditState {
                chain,
                pending: Vec::new(),
                in_flight: Vec::new(),
                sealing: false,
            })),
            repo,
            config,
        })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    // A poisoned lock means a panic inside a critical section; the state
    // itself is still structurally sound, so keep serving.
    fn lock_state(&self) -> MutexGuard<'_, AuditState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one operation into the pending queue.
    ///
    /// Synchronous contract: once this returns the record is durable in the
    /// queue. Sealing, when triggered by batch size, happens on a background
    /// task and never blocks the caller.
    pub fn record(&self, input: RecordOperationInput) -> AuditResult<Uuid> {
        input.validate()?;

        let record = OperationRecord::new(
            input.kind,
            input.actor_id,
            input.subject_table,
            input.subject_id,
            input.before_state,
            input.after_state,
            input.metadata,
        );
        let operation_id = record.id;

        let batch_full = {
            let mut state = self.lock_state();
            state.pending.push(record);
            state.pending.len() >= self.config.max_batch_size && !state.sealing
        };

        tracing::debug!(operation_id = %operation_id, "operation queued");

        if batch_full {
            self.spawn_seal(SealTrigger::BatchSize);
        }

        Ok(operation_id)
    }

    /// Number of unsealed records: queued plus any batch currently being
    /// mined.
    pub fn pending_count(&self) -> usize {
        let state = self.lock_state();
        state.pending.len() + state.in_flight.len()
    }

    /// Drain the queue and seal one block, off the current task.
    fn spawn_seal(&self, trigger: SealTrigger) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(err) = service.seal_once(trigger).await {
                tracing::error!(error = %err, trigger = %trigger, "background seal failed");
            }
        });
    }

    /// Drain the entire pending queue into one block and append it.
    ///
    /// Returns `Ok(None)` when there is nothing to do: either the queue is
    /// empty or another seal is already in flight (in which case the
    /// triggering records stay queued for the next opportunity).
    pub async fn seal_once(&self, trigger: SealTrigger) -> AuditResult<Option<SealedBlockSummary>> {
        let (records, sequence_number, previous_hash) = {
            let mut state = self.lock_state();
            if state.sealing {
                tracing::debug!(trigger = %trigger, "seal already in flight, skipping");
                return Ok(None);
            }
            if state.pending.is_empty() {
                return Ok(None);
            }
            state.sealing = true;
            // The batch stays visible to verification while mining runs
            state.in_flight = std::mem::take(&mut state.pending);
            let records = state.in_flight.clone();
            let sequence_number = state.chain.len();
            let previous_hash = state.chain.latest().hash.clone();
            (records, sequence_number, previous_hash)
        };

        let sealed_at = Utc::now();
        let difficulty = self.config.difficulty;
        let max_attempts = self.config.max_seal_attempts;

        // Nonce search is CPU-bound; keep it off the async executor.
        let mined = tokio::task::spawn_blocking(move || {
            services::seal_block(
                sequence_number,
                sealed_at,
                records,
                previous_hash,
                difficulty,
                max_attempts,
            )
        })
        .await
        .unwrap_or_else(|join_err| {
            Err(AuditError::Internal(format!(
                "sealing task panicked: {join_err}"
            )))
        });

        let block = match mined {
            Ok(block) => block,
            Err(err) => {
                self.abort_seal();
                tracing::error!(error = %err, sequence_number, "sealing failed, batch re-queued");
                return Err(err);
            }
        };

        let summary = SealedBlockSummary {
            sequence_number: block.sequence_number,
            hash: block.hash.clone(),
            record_count: block.records.len(),
        };
        let persisted = block.clone();

        {
            let mut state = self.lock_state();
            state.sealing = false;
            if let Err(err) = state.chain.append(block) {
                // Cannot happen while the busy flag holds; restore anyway.
                let mut restored = std::mem::take(&mut state.in_flight);
                restored.append(&mut state.pending);
                state.pending = restored;
                return Err(err);
            }
            state.in_flight.clear();
        }

        tracing::info!(
            sequence_number = summary.sequence_number,
            record_count = summary.record_count,
            hash = %summary.hash,
            trigger = %trigger,
            "sealed block"
        );

        // Fire-and-forget write-back; the in-memory chain stays
        // authoritative for the process lifetime either way.
        let repo = Arc::clone(&self.repo);
        let config = Arc::clone(&self.config);
        tokio::spawn(async move {
            crate::application::sealer::persist_with_retry(repo, config, persisted).await;
        });

        Ok(Some(summary))
    }

    /// Administrative drain-and-seal outside the timer cadence. Subject to
    /// the same busy-flag guard as every other trigger.
    pub async fn force_seal(&self) -> AuditResult<Option<SealedBlockSummary>> {
        self.seal_once(SealTrigger::Forced).await
    }

    // Put the in-flight batch back at the front of the queue and clear the
    // busy flag. Queue order is preserved for the next drain.
    fn abort_seal(&self) {
        let mut state = self.lock_state();
        state.sealing = false;
        let mut restored = std::mem::take(&mut state.in_flight);
        restored.append(&mut state.pending);
        state.pending = restored;
    }

    /// Check the caller's view of `(subject_table, subject_id)` against the
    /// most recent recorded after-state. Queued records and the batch of an
    /// in-flight seal both count as recorded; once `record` returns, the
    /// operation never disappears from verification.
    pub fn verify(&self, table: &str, id: &str, current_data: &Value) -> VerificationOutcome {
        let state = self.lock_state();
        let recorded = state
            .pending
            .iter()
            .rev()
            .chain(state.in_flight.iter().rev())
            .find(|r| r.subject_matches(table, id))
            .map(|r| services::content_hash_value(&r.after_state))
            .or_else(|| {
                state
                    .chain
                    .latest_state_for(table, id)
                    .map(|r| services::content_hash_value(&r.after_state))
            });

        match recorded {
            None => VerificationOutcome {
                verified: false,
                reason: Some("no audit record found for this subject".to_string()),
            },
            Some(expected) => {
                let actual = services::content_hash_value(current_data);
                if constant_time_eq(expected.as_bytes(), actual.as_bytes()) {
                    VerificationOutcome {
                        verified: true,
                        reason: None,
                    }
                } else {
                    VerificationOutcome {
                        verified: false,
                        reason: Some(
                            "current data does not match the latest recorded state".to_string(),
                        ),
                    }
                }
            }
        }
    }

    /// Read-only snapshot: chain length, queue depth, tip hash, overall
    /// validity, and the count of sealed records.
    pub fn stats(&self) -> ChainStats {
        let state = self.lock_state();
        let report = state.chain.validate();
        ChainStats {
            chain_length: state.chain.len(),
            pending_count: state.pending.len() + state.in_flight.len(),
            last_hash: state.chain.latest().hash.clone(),
            is_valid: report.is_valid,
            total_records: state.chain.total_records(),
        }
    }

    /// Full per-block validation report. Pure read; never mutates.
    pub fn validation_report(&self) -> ChainReport {
        self.lock_state().chain.validate()
    }
}
