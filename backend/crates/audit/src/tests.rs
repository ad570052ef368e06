//! Unit tests for the audit crate
//!
//! Domain hashing and chain logic are covered next to their modules; this
//! file exercises the service layer against an in-memory repository, plus
//! DTO and error mappings.

use crate::application::config::AuditConfig;
use crate::application::service::{AuditService, RecordOperationInput};
use crate::domain::entities::Block;
use crate::domain::repository::BlockRepository;
use crate::domain::value_objects::OperationKind;
use crate::error::{AuditError, AuditResult};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory repository standing in for Postgres.
#[derive(Clone, Default)]
struct MemoryRepo {
    blocks: Arc<Mutex<Vec<Block>>>,
    fail_saves: Arc<AtomicBool>,
    dead_letters: Arc<Mutex<Vec<(u64, String)>>>,
}

impl MemoryRepo {
    fn persisted_sequences(&self) -> Vec<u64> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.sequence_number)
            .collect()
    }

    fn block(&self, sequence_number: u64) -> Option<Block> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.sequence_number == sequence_number)
            .cloned()
    }
}

impl BlockRepository for MemoryRepo {
    async fn save_block(&self, block: &Block) -> AuditResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AuditError::Internal("injected save failure".into()));
        }
        let mut blocks = self.blocks.lock().unwrap();
        // Idempotent per sequence number, like the ON CONFLICT in Postgres
        if !blocks
            .iter()
            .any(|b| b.sequence_number == block.sequence_number)
        {
            blocks.push(block.clone());
        }
        Ok(())
    }

    async fn load_blocks(&self) -> AuditResult<Vec<Block>> {
        let mut blocks = self.blocks.lock().unwrap().clone();
        blocks.sort_by_key(|b| b.sequence_number);
        Ok(blocks)
    }

    async fn record_dead_letter(&self, block: &Block, reason: &str) -> AuditResult<()> {
        self.dead_letters
            .lock()
            .unwrap()
            .push((block.sequence_number, reason.to_string()));
        Ok(())
    }
}

fn test_config() -> AuditConfig {
    AuditConfig {
        difficulty: 1,
        max_batch_size: 100,
        seal_interval: Duration::from_secs(3600),
        persist_max_retries: 3,
        persist_retry_backoff: Duration::from_millis(5),
        max_seal_attempts: None,
    }
}

async fn test_service(config: AuditConfig) -> (AuditService<MemoryRepo>, MemoryRepo) {
    let repo = MemoryRepo::default();
    let service = AuditService::bootstrap(Arc::new(repo.clone()), Arc::new(config))
        .await
        .unwrap();
    (service, repo)
}

fn op(table: &str, id: &str, state: Value) -> RecordOperationInput {
    RecordOperationInput {
        kind: OperationKind::Update,
        actor_id: "actor-1".into(),
        subject_table: table.into(),
        subject_id: id.into(),
        before_state: None,
        after_state: state,
        metadata: None,
    }
}

/// Poll until `cond` holds, failing the test after ~5 seconds.
async fn wait_until<F>(mut cond: F, what: &str)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

mod service_tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_mints_and_persists_genesis() {
        let (service, repo) = test_service(test_config()).await;

        let stats = service.stats();
        assert_eq!(stats.chain_length, 1);
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.total_records, 0);
        assert!(stats.is_valid);
        assert_eq!(repo.persisted_sequences(), vec![0]);
    }

    #[tokio::test]
    async fn test_record_rejects_malformed_input() {
        let (service, _) = test_service(test_config()).await;

        let mut bad = op("users", "u-1", json!({"n": 1}));
        bad.actor_id = "  ".into();
        assert!(matches!(
            service.record(bad),
            Err(AuditError::Validation(_))
        ));

        let mut bad = op("users", "u-1", json!({"n": 1}));
        bad.subject_table = String::new();
        assert!(matches!(
            service.record(bad),
            Err(AuditError::Validation(_))
        ));

        let bad = op("users", "u-1", Value::Null);
        assert!(matches!(
            service.record(bad),
            Err(AuditError::Validation(_))
        ));

        assert_eq!(service.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_record_returns_correlatable_id() {
        let (service, _) = test_service(test_config()).await;

        let a = service.record(op("users", "u-1", json!({"n": 1}))).unwrap();
        let b = service.record(op("users", "u-2", json!({"n": 2}))).unwrap();

        assert_ne!(a, b);
        assert_eq!(service.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_force_seal_drains_queue_into_one_block() {
        let (service, repo) = test_service(test_config()).await;
        let genesis_hash = service.stats().last_hash;

        for i in 0..3 {
            service
                .record(op("users", &format!("u-{i}"), json!({"n": i})))
                .unwrap();
        }

        let summary = service.force_seal().await.unwrap().unwrap();
        assert_eq!(summary.sequence_number, 1);
        assert_eq!(summary.record_count, 3);
        // Block hashes are hex-encoded SHA-256 digests
        assert_eq!(hex::decode(&summary.hash).unwrap().len(), 32);

        let stats = service.stats();
        assert_eq!(stats.chain_length, 2);
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.last_hash, summary.hash);
        assert!(stats.is_valid);

        // Write-back is fire-and-forget; wait for it
        wait_until(|| repo.persisted_sequences().len() == 2, "block persisted").await;
        let persisted = repo.block(1).unwrap();
        assert_eq!(persisted.previous_hash, genesis_hash);
        assert_eq!(persisted.records.len(), 3);
    }

    #[tokio::test]
    async fn test_force_seal_on_empty_queue_is_noop() {
        let (service, _) = test_service(test_config()).await;

        let summary = service.force_seal().await.unwrap();
        assert!(summary.is_none());
        assert_eq!(service.stats().chain_length, 1);
    }

    #[tokio::test]
    async fn test_concurrent_force_seals_produce_one_block() {
        let (service, _) = test_service(test_config()).await;

        for i in 0..5 {
            service
                .record(op("users", &format!("u-{i}"), json!({"n": i})))
                .unwrap();
        }

        let a = service.clone();
        let b = service.clone();
        let (first, second) = tokio::join!(a.force_seal(), b.force_seal());
        let summaries: Vec<_> = [first.unwrap(), second.unwrap()]
            .into_iter()
            .flatten()
            .collect();

        // Exactly one seal proceeded; the other was a no-op
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].record_count, 5);
        let stats = service.stats();
        assert_eq!(stats.chain_length, 2);
        assert_eq!(stats.total_records, 5);
    }

    #[tokio::test]
    async fn test_batch_size_triggers_background_seal() {
        let mut config = test_config();
        config.max_batch_size = 2;
        let (service, _) = test_service(config).await;

        service.record(op("users", "u-1", json!({"n": 1}))).unwrap();
        service.record(op("users", "u-2", json!({"n": 2}))).unwrap();

        wait_until(
            || service.stats().chain_length == 2,
            "batch-size seal to land",
        )
        .await;

        let stats = service.stats();
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.total_records, 2);
        assert!(stats.is_valid);
    }

    #[tokio::test]
    async fn test_every_record_lands_in_exactly_one_block() {
        let (service, repo) = test_service(test_config()).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(
                service
                    .record(op("users", &format!("a-{i}"), json!({"n": i})))
                    .unwrap(),
            );
        }
        service.force_seal().await.unwrap().unwrap();

        for i in 0..2 {
            ids.push(
                service
                    .record(op("users", &format!("b-{i}"), json!({"n": i})))
                    .unwrap(),
            );
        }
        service.force_seal().await.unwrap().unwrap();

        wait_until(|| repo.persisted_sequences().len() == 3, "both blocks").await;

        let mut sealed: Vec<uuid::Uuid> = Vec::new();
        for seq in [1, 2] {
            sealed.extend(repo.block(seq).unwrap().records.iter().map(|r| r.id));
        }
        sealed.sort();
        let mut expected = ids.clone();
        expected.sort();
        // No record dropped, none duplicated
        assert_eq!(sealed, expected);
        assert_eq!(repo.block(1).unwrap().records.len(), 5);
        assert_eq!(repo.block(2).unwrap().records.len(), 2);
    }

    #[tokio::test]
    async fn test_verify_without_record_has_distinct_reason() {
        let (service, _) = test_service(test_config()).await;

        let outcome = service.verify("users", "missing", &json!({"n": 1}));
        assert!(!outcome.verified);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("no audit record found for this subject")
        );
    }

    #[tokio::test]
    async fn test_verify_matches_pending_and_sealed_state() {
        let (service, _) = test_service(test_config()).await;
        let state = json!({"bio": "hello", "level": 3});

        service.record(op("profiles", "p-1", state.clone())).unwrap();

        // Pending records already count as recorded
        let outcome = service.verify("profiles", "p-1", &state);
        assert!(outcome.verified);
        assert!(outcome.reason.is_none());

        service.force_seal().await.unwrap().unwrap();

        let outcome = service.verify("profiles", "p-1", &state);
        assert!(outcome.verified);
    }

    #[tokio::test]
    async fn test_verify_mismatch_reports_drift() {
        let (service, _) = test_service(test_config()).await;

        service
            .record(op("profiles", "p-1", json!({"bio": "hello"})))
            .unwrap();
        service.force_seal().await.unwrap().unwrap();

        let outcome = service.verify("profiles", "p-1", &json!({"bio": "edited"}));
        assert!(!outcome.verified);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("current data does not match the latest recorded state")
        );
    }

    #[tokio::test]
    async fn test_verify_uses_latest_recording() {
        let (service, _) = test_service(test_config()).await;

        service
            .record(op("profiles", "p-1", json!({"v": 1})))
            .unwrap();
        service.force_seal().await.unwrap().unwrap();
        service
            .record(op("profiles", "p-1", json!({"v": 2})))
            .unwrap();
        service.force_seal().await.unwrap().unwrap();

        assert!(service.verify("profiles", "p-1", &json!({"v": 2})).verified);
        assert!(!service.verify("profiles", "p-1", &json!({"v": 1})).verified);
    }

    #[tokio::test]
    async fn test_records_stay_verifiable_while_seal_is_in_flight() {
        let mut config = test_config();
        // Unreachable target keeps the batch in flight until the cap hits
        config.difficulty = 16;
        config.max_seal_attempts = Some(2_000_000);
        let (service, _) = test_service(config).await;

        let state = json!({"bio": "hello"});
        service.record(op("profiles", "p-1", state.clone())).unwrap();
        assert!(service.verify("profiles", "p-1", &state).verified);

        let sealing = {
            let service = service.clone();
            tokio::spawn(async move { service.force_seal().await })
        };

        // The drained batch must stay visible for the whole mining window
        while !sealing.is_finished() {
            assert!(
                service.verify("profiles", "p-1", &state).verified,
                "recorded operation became invisible during sealing"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = sealing.await.unwrap().unwrap_err();
        assert!(matches!(err, AuditError::SealTimeout { .. }));

        // Re-queued after the failed seal, still verifiable
        assert!(service.verify("profiles", "p-1", &state).verified);
        assert_eq!(service.pending_count(), 1);
        assert_eq!(service.stats().chain_length, 1);
    }

    #[tokio::test]
    async fn test_rehydration_restores_chain() {
        let (service, repo) = test_service(test_config()).await;

        service.record(op("users", "u-1", json!({"n": 1}))).unwrap();
        service.force_seal().await.unwrap().unwrap();
        wait_until(|| repo.persisted_sequences().len() == 2, "persistence").await;
        let tip = service.stats().last_hash;
        drop(service);

        let restarted = AuditService::bootstrap(Arc::new(repo.clone()), Arc::new(test_config()))
            .await
            .unwrap();
        let stats = restarted.stats();
        assert_eq!(stats.chain_length, 2);
        assert_eq!(stats.last_hash, tip);
        assert_eq!(stats.total_records, 1);
        assert!(stats.is_valid);
    }

    #[tokio::test]
    async fn test_exhausted_writeback_goes_to_dead_letter() {
        let mut config = test_config();
        config.persist_max_retries = 2;
        let (service, repo) = test_service(config).await;

        // Fail saves only after genesis landed
        repo.fail_saves.store(true, Ordering::SeqCst);

        service.record(op("users", "u-1", json!({"n": 1}))).unwrap();
        let summary = service.force_seal().await.unwrap().unwrap();

        wait_until(
            || !repo.dead_letters.lock().unwrap().is_empty(),
            "dead letter entry",
        )
        .await;

        let dead = repo.dead_letters.lock().unwrap();
        assert_eq!(dead[0].0, summary.sequence_number);
        assert!(dead[0].1.contains("injected save failure"));
        // The in-memory chain was never rolled back
        drop(dead);
        assert_eq!(service.stats().chain_length, 2);
    }

    #[tokio::test]
    async fn test_interval_sealer_drains_queue() {
        let mut config = test_config();
        config.seal_interval = Duration::from_millis(50);
        let (service, _) = test_service(config).await;

        let sealer = crate::application::sealer::spawn_sealer(service.clone());

        service.record(op("users", "u-1", json!({"n": 1}))).unwrap();
        wait_until(|| service.stats().chain_length == 2, "interval seal").await;

        assert_eq!(service.stats().pending_count, 0);
        sealer.abort();
    }

    #[tokio::test]
    async fn test_seal_timeout_requeues_batch() {
        let mut config = test_config();
        // Unreachable target with a one-attempt cap
        config.difficulty = 16;
        config.max_seal_attempts = Some(1);
        let (service, _) = test_service(config).await;

        service.record(op("users", "u-1", json!({"n": 1}))).unwrap();
        let err = service.force_seal().await.unwrap_err();
        assert!(matches!(err, AuditError::SealTimeout { .. }));

        // Batch stays queued; nothing was appended
        let stats = service.stats();
        assert_eq!(stats.chain_length, 1);
        assert_eq!(stats.pending_count, 1);
    }
}

mod dto_tests {
    use crate::presentation::dto::*;
    use serde_json::json;

    #[test]
    fn test_record_request_deserialization() {
        let json = r#"{
            "kind": "update",
            "actorId": "user-42",
            "subjectTable": "profiles",
            "subjectId": "p-7",
            "afterState": {"bio": "hi"}
        }"#;
        let req: RecordRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.actor_id, "user-42");
        assert_eq!(req.subject_table, "profiles");
        assert_eq!(req.subject_id, "p-7");
        assert!(req.before_state.is_none());
        assert!(req.metadata.is_none());
        assert_eq!(req.after_state, json!({"bio": "hi"}));
    }

    #[test]
    fn test_verify_response_omits_reason_when_verified() {
        let ok = VerifyResponse {
            verified: true,
            reason: None,
        };
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(json, r#"{"verified":true}"#);

        let bad = VerifyResponse {
            verified: false,
            reason: Some("no audit record found for this subject".into()),
        };
        let json = serde_json::to_string(&bad).unwrap();
        assert!(json.contains("reason"));
    }

    #[test]
    fn test_stats_response_serialization() {
        let response = StatsResponse {
            chain_length: 4,
            pending_count: 2,
            last_hash: "00abc".into(),
            is_valid: true,
            total_records: 9,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("chainLength"));
        assert!(json.contains("pendingCount"));
        assert!(json.contains("lastHash"));
        assert!(json.contains("isValid"));
        assert!(json.contains("totalRecords"));
    }

    #[test]
    fn test_seal_response_for_noop() {
        let response = SealResponse {
            sealed: false,
            block: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"sealed":false}"#);
    }
}

mod error_tests {
    use crate::error::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_error_into_response_status_codes() {
        let test_cases: Vec<(AuditError, StatusCode)> = vec![
            (
                AuditError::Validation("missing actor".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AuditError::ChainIntegrity("sequence gap".into()),
                StatusCode::CONFLICT,
            ),
            (
                AuditError::SealTimeout { attempts: 100 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AuditError::Internal("test".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(
                response.status(),
                expected_status,
                "Error should return correct status code"
            );
        }
    }

    #[test]
    fn test_error_display() {
        assert!(
            AuditError::Validation("actorId must not be empty".into())
                .to_string()
                .contains("actorId")
        );
        assert!(
            AuditError::SealTimeout { attempts: 7 }
                .to_string()
                .contains("7 attempts")
        );
    }

    #[test]
    fn test_conversion_to_app_error() {
        let app: kernel::error::app_error::AppError =
            AuditError::Validation("bad input".into()).into();
        assert_eq!(app.status_code(), 400);

        let app: kernel::error::app_error::AppError =
            AuditError::ChainIntegrity("tip mismatch".into()).into();
        assert_eq!(app.status_code(), 409);
    }
}
