//! Validation gatekeeper: decides whether an answer needs HR sign-off and
//! drives the validation record state machine.
//!
//! ```text
//! DIRECT                      (terminal)
//! PENDING ──approve──▶ APPROVED (terminal)
//!         └─reject───▶ REJECTED (terminal)
//! ```

use std::sync::Arc;

use chrono::Utc;
use rhassistant_shared::{
    AssistantError, QueryType, Result, ValidationId, ValidationRecord, ValidationState,
};
use rhassistant_storage::ValidationCounts;
use tracing::{info, instrument, warn};

use crate::store::ValidationStore;

/// Answers scoring below this go to an HR expert.
pub const VALIDATION_THRESHOLD: f64 = 0.7;

/// Shown to the requester in place of a held-back answer.
pub const PENDING_NOTICE: &str = "Votre requête nécessite une validation par un expert RH. \
La réponse sera disponible après approbation.";

/// Whether an answer must wait for HR validation.
pub fn requires_validation(confidence_score: f64, query_type: QueryType) -> bool {
    confidence_score < VALIDATION_THRESHOLD || query_type == QueryType::Sensitive
}

pub struct Gatekeeper {
    store: Arc<dyn ValidationStore>,
}

impl Gatekeeper {
    pub fn new(store: Arc<dyn ValidationStore>) -> Self {
        Self { store }
    }

    /// Persist a pending record for `proposed_response`.
    ///
    /// A storage failure propagates: the review obligation must never be
    /// dropped silently.
    #[instrument(skip_all, fields(confidence = confidence_score))]
    pub async fn enqueue(
        &self,
        query: &str,
        proposed_response: &str,
        confidence_score: f64,
    ) -> Result<ValidationRecord> {
        let record = ValidationRecord {
            id: ValidationId::new(),
            query: query.to_string(),
            proposed_response: proposed_response.to_string(),
            confidence_score,
            hr_feedback: None,
            state: ValidationState::Pending,
            created_at: Utc::now(),
            validated_at: None,
        };
        self.store.save(&record).await?;
        info!(id = %record.id, "answer queued for HR validation");
        Ok(record)
    }

    pub async fn list_pending(&self) -> Result<Vec<ValidationRecord>> {
        self.store.list_pending().await
    }

    /// Approve or reject a record.
    ///
    /// A record that was already decided is overwritten: the new state and
    /// feedback replace the old ones and `validated_at` is re-stamped.
    #[instrument(skip_all, fields(id = %id, approved))]
    pub async fn decide(
        &self,
        id: &ValidationId,
        approved: bool,
        feedback: Option<String>,
    ) -> Result<ValidationRecord> {
        let mut record = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| AssistantError::not_found(id))?;

        if !record.state.is_pending() {
            warn!(previous = record.state.as_str(), "overwriting an earlier decision");
        }

        let state = ValidationState::from_decision(approved);
        let validated_at = Utc::now();
        let updated = self
            .store
            .update(id, state, feedback.as_deref(), validated_at)
            .await?;
        if !updated {
            return Err(AssistantError::not_found(id));
        }

        record.state = state;
        record.hr_feedback = feedback;
        record.validated_at = Some(validated_at);
        info!(state = state.as_str(), "validation decided");
        Ok(record)
    }

    pub async fn counts(&self) -> Result<ValidationCounts> {
        self.store.counts().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rhassistant_storage::Storage;
    use uuid::Uuid;

    /// A store whose every call fails like a full disk.
    pub(crate) struct FailingStore;

    #[async_trait]
    impl ValidationStore for FailingStore {
        async fn save(&self, _record: &ValidationRecord) -> Result<()> {
            Err(AssistantError::Storage("disk I/O error".into()))
        }
        async fn find(&self, _id: &ValidationId) -> Result<Option<ValidationRecord>> {
            Err(AssistantError::Storage("disk I/O error".into()))
        }
        async fn list_pending(&self) -> Result<Vec<ValidationRecord>> {
            Err(AssistantError::Storage("disk I/O error".into()))
        }
        async fn update(
            &self,
            _id: &ValidationId,
            _state: ValidationState,
            _hr_feedback: Option<&str>,
            _validated_at: DateTime<Utc>,
        ) -> Result<bool> {
            Err(AssistantError::Storage("disk I/O error".into()))
        }
        async fn counts(&self) -> Result<ValidationCounts> {
            Err(AssistantError::Storage("disk I/O error".into()))
        }
    }

    async fn gatekeeper() -> Gatekeeper {
        let tmp = std::env::temp_dir().join(format!("rha_gate_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        Gatekeeper::new(Arc::new(storage))
    }

    #[test]
    fn gate_threshold() {
        assert!(requires_validation(0.69, QueryType::General));
        assert!(requires_validation(0.95, QueryType::Sensitive));
        assert!(!requires_validation(0.9, QueryType::General));
        assert!(!requires_validation(0.7, QueryType::General));
    }

    #[tokio::test]
    async fn decided_records_leave_the_pending_list() {
        let gate = gatekeeper().await;
        let record = gate.enqueue("Ma pension ?", "Réponse proposée", 0.65).await.unwrap();

        let pending = gate.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, record.id);
        assert_eq!(pending[0].approved(), None);

        let decided = gate.decide(&record.id, true, None).await.unwrap();
        assert_eq!(decided.state, ValidationState::Approved);
        assert!(decided.validated_at.is_some());
        assert!(gate.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let gate = gatekeeper().await;
        let err = gate
            .decide(&ValidationId::new(), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::NotFound { .. }));
    }

    #[tokio::test]
    async fn second_decision_overwrites_the_first() {
        let gate = gatekeeper().await;
        let record = gate.enqueue("q", "r", 0.5).await.unwrap();

        let first = gate
            .decide(&record.id, true, Some("ok".into()))
            .await
            .unwrap();
        let second = gate
            .decide(&record.id, false, Some("finalement non".into()))
            .await
            .unwrap();

        assert_eq!(second.state, ValidationState::Rejected);
        assert_eq!(second.hr_feedback.as_deref(), Some("finalement non"));
        assert!(second.validated_at >= first.validated_at);

        let counts = gate.counts().await.unwrap();
        assert_eq!((counts.pending, counts.approved, counts.rejected), (0, 0, 1));
    }

    #[tokio::test]
    async fn enqueue_failure_propagates() {
        let gate = Gatekeeper::new(Arc::new(FailingStore));
        let err = gate.enqueue("q", "r", 0.2).await.unwrap_err();
        assert!(err.is_service_unavailable());
    }
}
