//! Persistence seams used by the pipeline, implemented for the libSQL [`Storage`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rhassistant_shared::{ChatInteraction, Result, ValidationId, ValidationRecord, ValidationState};
use rhassistant_storage::{Storage, ValidationCounts};

/// Durable home of validation records. A write must be durable before it returns `Ok`.
#[async_trait]
pub trait ValidationStore: Send + Sync {
    async fn save(&self, record: &ValidationRecord) -> Result<()>;

    async fn find(&self, id: &ValidationId) -> Result<Option<ValidationRecord>>;

    async fn list_pending(&self) -> Result<Vec<ValidationRecord>>;

    /// Returns `false` when `id` is unknown.
    async fn update(
        &self,
        id: &ValidationId,
        state: ValidationState,
        hr_feedback: Option<&str>,
        validated_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn counts(&self) -> Result<ValidationCounts>;
}

/// Chat history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, interaction: &ChatInteraction) -> Result<()>;

    /// Newest first.
    async fn list(&self, user_id: i64, limit: u32) -> Result<Vec<ChatInteraction>>;

    async fn count(&self) -> Result<u64>;
}

/// Metadata of ingested documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn record_document(
        &self,
        id: &str,
        title: &str,
        source: &str,
        category: &str,
        content_len: usize,
    ) -> Result<()>;

    async fn count_documents(&self) -> Result<u64>;
}

#[async_trait]
impl ValidationStore for Storage {
    async fn save(&self, record: &ValidationRecord) -> Result<()> {
        self.insert_validation(record).await
    }

    async fn find(&self, id: &ValidationId) -> Result<Option<ValidationRecord>> {
        self.get_validation(id).await
    }

    async fn list_pending(&self) -> Result<Vec<ValidationRecord>> {
        self.list_pending_validations().await
    }

    async fn update(
        &self,
        id: &ValidationId,
        state: ValidationState,
        hr_feedback: Option<&str>,
        validated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.update_validation(id, state, hr_feedback, validated_at)
            .await
    }

    async fn counts(&self) -> Result<ValidationCounts> {
        self.count_validations().await
    }
}

#[async_trait]
impl HistoryStore for Storage {
    async fn record(&self, interaction: &ChatInteraction) -> Result<()> {
        self.insert_interaction(interaction).await
    }

    async fn list(&self, user_id: i64, limit: u32) -> Result<Vec<ChatInteraction>> {
        self.list_interactions(user_id, limit).await
    }

    async fn count(&self) -> Result<u64> {
        self.count_interactions().await
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn record_document(
        &self,
        id: &str,
        title: &str,
        source: &str,
        category: &str,
        content_len: usize,
    ) -> Result<()> {
        self.insert_document(id, title, source, category, content_len)
            .await
    }

    async fn count_documents(&self) -> Result<u64> {
        Storage::count_documents(self).await
    }
}
