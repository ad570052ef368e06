//! Background sealing and write-back
//!
//! The timer half of the two seal triggers, plus the at-least-once block
//! write-back with bounded retry and dead-lettering.

use crate::application::config::AuditConfig;
use crate::application::service::{AuditService, SealTrigger};
use crate::domain::entities::Block;
use crate::domain::repository::BlockRepository;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn the timer-driven sealer.
///
/// On each tick: if the queue is non-empty and no seal is in flight, drain
/// it into one block. An idle tick on an empty queue is a no-op; a tick
/// that loses the race against another trigger is equally a no-op.
pub fn spawn_sealer<R>(service: AuditService<R>) -> JoinHandle<()>
where
    R: BlockRepository + Send + Sync + 'static,
{
    let period = service.config().seal_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if service.pending_count() == 0 {
                continue;
            }
            if let Err(err) = service.seal_once(SealTrigger::Interval).await {
                tracing::error!(error = %err, "interval seal failed");
            }
        }
    })
}

/// At-least-once write-back of a sealed block.
///
/// Retries with linear backoff; after the last attempt the block goes to
/// the dead-letter store. If even that fails, the serialized block is
/// dumped into the log so no sealed data is ever silently lost. The
/// in-memory chain is never rolled back on persistence failure.
pub(crate) async fn persist_with_retry<R>(repo: Arc<R>, config: Arc<AuditConfig>, block: Block)
where
    R: BlockRepository + Send + Sync + 'static,
{
    let mut last_error = String::new();
    for attempt in 1..=config.persist_max_retries {
        match repo.save_block(&block).await {
            Ok(()) => {
                tracing::debug!(
                    sequence_number = block.sequence_number,
                    attempt,
                    "block persisted"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(
                    sequence_number = block.sequence_number,
                    attempt,
                    error = %err,
                    "block write-back failed"
                );
                last_error = err.to_string();
                if attempt < config.persist_max_retries {
                    tokio::time::sleep(config.persist_retry_backoff * attempt).await;
                }
            }
        }
    }

    match repo.record_dead_letter(&block, &last_error).await {
        Ok(()) => {
            tracing::error!(
                sequence_number = block.sequence_number,
                reason = %last_error,
                "block dead-lettered after exhausting retries"
            );
        }
        Err(err) => {
            let payload = serde_json::to_string(&block).unwrap_or_default();
            tracing::error!(
                sequence_number = block.sequence_number,
                error = %err,
                block = %payload,
                "dead-letter write failed, dumping block to log"
            );
        }
    }
}
