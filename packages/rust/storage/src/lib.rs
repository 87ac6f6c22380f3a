//! libSQL storage layer for the HR assistant.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the validation
//! queue, the expiring response cache, chat history, and the document index.
//!
//! Every write is a single statement, so each create/update is its own
//! transaction and is durable once the call returns.

mod migrations;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use rhassistant_shared::{
    AssistantError, ChatInteraction, Result, ValidationId, ValidationRecord, ValidationState,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// A vector index entry as persisted.
#[derive(Debug, Clone)]
pub struct StoredVector {
    pub id: String,
    pub content: String,
    pub metadata_json: String,
    pub embedding: Vec<f32>,
}

/// Per-state validation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

fn db_err(e: libsql::Error) -> AssistantError {
    AssistantError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AssistantError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        AssistantError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Validation operations
    // -----------------------------------------------------------------------

    /// Insert a new validation record.
    pub async fn insert_validation(&self, record: &ValidationRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO validations
                   (id, query, proposed_response, confidence_score, hr_feedback, state, created_at, validated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.query.as_str(),
                    record.proposed_response.as_str(),
                    record.confidence_score,
                    record.hr_feedback.as_deref(),
                    record.state.as_str(),
                    record.created_at.to_rfc3339(),
                    record.validated_at.map(|t| t.to_rfc3339()),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a validation record by ID.
    pub async fn get_validation(&self, id: &ValidationId) -> Result<Option<ValidationRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, query, proposed_response, confidence_score, hr_feedback, state, created_at, validated_at
                 FROM validations WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_validation(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List all records still awaiting a decision, oldest first.
    pub async fn list_pending_validations(&self) -> Result<Vec<ValidationRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, query, proposed_response, confidence_score, hr_feedback, state, created_at, validated_at
                 FROM validations WHERE state = 'pending' ORDER BY id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_validation(&row)?);
        }
        Ok(results)
    }

    /// Record a decision. Returns `false` when no record has this ID.
    pub async fn update_validation(
        &self,
        id: &ValidationId,
        state: ValidationState,
        hr_feedback: Option<&str>,
        validated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "UPDATE validations SET state = ?1, hr_feedback = ?2, validated_at = ?3 WHERE id = ?4",
                params![
                    state.as_str(),
                    hr_feedback,
                    validated_at.to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    /// Count validations per state.
    pub async fn count_validations(&self) -> Result<ValidationCounts> {
        let mut rows = self
            .conn
            .query(
                "SELECT state, COUNT(*) FROM validations GROUP BY state",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut counts = ValidationCounts::default();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let state: String = row.get(0).map_err(db_err)?;
            let count = row.get::<i64>(1).map_err(db_err)?.max(0) as u64;
            match state.parse::<ValidationState>()? {
                ValidationState::Pending => counts.pending = count,
                ValidationState::Approved => counts.approved = count,
                ValidationState::Rejected => counts.rejected = count,
            }
        }
        Ok(counts)
    }

    // -----------------------------------------------------------------------
    // Response cache operations
    // -----------------------------------------------------------------------

    /// Get a cached response body if present and not expired.
    pub async fn get_cached_response(&self, cache_key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();
        let mut rows = self
            .conn
            .query(
                "SELECT response_json FROM response_cache WHERE cache_key = ?1 AND expires_at > ?2",
                params![cache_key, now],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(db_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Store a response body for `ttl` (upserts).
    pub async fn set_cached_response(
        &self,
        cache_key: &str,
        session_id: &str,
        query_text: &str,
        response_json: &str,
        ttl: Duration,
    ) -> Result<()> {
        let now = Utc::now();
        let expires_at = now.timestamp() + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
        self.conn
            .execute(
                "INSERT INTO response_cache (cache_key, session_id, query_text, response_json, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(cache_key) DO UPDATE SET
                   response_json = excluded.response_json,
                   created_at = excluded.created_at,
                   expires_at = excluded.expires_at",
                params![
                    cache_key,
                    session_id,
                    query_text,
                    response_json,
                    now.to_rfc3339(),
                    expires_at,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Delete expired cache rows. Returns how many were removed.
    pub async fn purge_expired_cache(&self) -> Result<u64> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "DELETE FROM response_cache WHERE expires_at <= ?1",
                params![now],
            )
            .await
            .map_err(db_err)
    }

    // -----------------------------------------------------------------------
    // Chat history operations
    // -----------------------------------------------------------------------

    /// Append a processed question to the chat history.
    pub async fn insert_interaction(&self, interaction: &ChatInteraction) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO chat_interactions
                   (user_id, session_id, question, response, confidence_score, requires_validation, response_time_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    interaction.user_id,
                    interaction.session_id.as_str(),
                    interaction.question.as_str(),
                    interaction.response.as_str(),
                    interaction.confidence_score,
                    i64::from(interaction.requires_validation),
                    i64::try_from(interaction.response_time_ms).unwrap_or(i64::MAX),
                    interaction.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// A user's interactions, newest first.
    pub async fn list_interactions(&self, user_id: i64, limit: u32) -> Result<Vec<ChatInteraction>> {
        let mut rows = self
            .conn
            .query(
                "SELECT user_id, session_id, question, response, confidence_score, requires_validation, response_time_ms, created_at
                 FROM chat_interactions WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                params![user_id, limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(ChatInteraction {
                user_id: row.get::<i64>(0).map_err(db_err)?,
                session_id: row.get::<String>(1).map_err(db_err)?,
                question: row.get::<String>(2).map_err(db_err)?,
                response: row.get::<String>(3).map_err(db_err)?,
                confidence_score: row.get::<f64>(4).map_err(db_err)?,
                requires_validation: row.get::<i64>(5).map_err(db_err)? != 0,
                response_time_ms: row.get::<i64>(6).map_err(db_err)?.max(0) as u64,
                created_at: parse_timestamp(&row.get::<String>(7).map_err(db_err)?)?,
            });
        }
        Ok(results)
    }

    pub async fn count_interactions(&self) -> Result<u64> {
        self.count_rows("SELECT COUNT(*) FROM chat_interactions").await
    }

    // -----------------------------------------------------------------------
    // Document index operations
    // -----------------------------------------------------------------------

    /// Insert or replace a vector index entry.
    pub async fn upsert_document_vector(
        &self,
        id: &str,
        content: &str,
        metadata_json: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let embedding_json = serde_json::to_string(embedding)
            .map_err(|e| AssistantError::Storage(format!("failed to encode embedding: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO document_vectors (id, content, metadata_json, embedding_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                   content = excluded.content,
                   metadata_json = excluded.metadata_json,
                   embedding_json = excluded.embedding_json,
                   updated_at = excluded.updated_at",
                params![
                    id,
                    content,
                    metadata_json,
                    embedding_json,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Load every vector index entry.
    pub async fn list_document_vectors(&self) -> Result<Vec<StoredVector>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, content, metadata_json, embedding_json FROM document_vectors ORDER BY id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let embedding_json: String = row.get(3).map_err(db_err)?;
            let embedding: Vec<f32> = serde_json::from_str(&embedding_json)
                .map_err(|e| AssistantError::Storage(format!("corrupt embedding: {e}")))?;
            results.push(StoredVector {
                id: row.get::<String>(0).map_err(db_err)?,
                content: row.get::<String>(1).map_err(db_err)?,
                metadata_json: row.get::<String>(2).map_err(db_err)?,
                embedding,
            });
        }
        Ok(results)
    }

    /// Record metadata for an ingested document.
    pub async fn insert_document(
        &self,
        id: &str,
        title: &str,
        source: &str,
        category: &str,
        content_len: usize,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO hr_documents (id, title, source, category, content_len, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    title,
                    source,
                    category,
                    i64::try_from(content_len).unwrap_or(i64::MAX),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn count_documents(&self) -> Result<u64> {
        self.count_rows("SELECT COUNT(*) FROM hr_documents").await
    }

    async fn count_rows(&self, sql: &str) -> Result<u64> {
        let mut rows = self.conn.query(sql, params![]).await.map_err(db_err)?;
        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(db_err(e)),
        }
    }
}

/// Parse an RFC 3339 timestamp column.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AssistantError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`ValidationRecord`].
fn row_to_validation(row: &libsql::Row) -> Result<ValidationRecord> {
    let id: String = row.get(0).map_err(db_err)?;
    let state: String = row.get(5).map_err(db_err)?;
    let created_at: String = row.get(6).map_err(db_err)?;
    Ok(ValidationRecord {
        id: id.parse()?,
        query: row.get::<String>(1).map_err(db_err)?,
        proposed_response: row.get::<String>(2).map_err(db_err)?,
        confidence_score: row.get::<f64>(3).map_err(db_err)?,
        hr_feedback: row.get::<String>(4).ok(),
        state: state.parse()?,
        created_at: parse_timestamp(&created_at)?,
        validated_at: match row.get::<String>(7).ok() {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("rha_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn pending_record(query: &str) -> ValidationRecord {
        ValidationRecord {
            id: ValidationId::new(),
            query: query.into(),
            proposed_response: "La pension se calcule...".into(),
            confidence_score: 0.65,
            hr_feedback: None,
            state: ValidationState::Pending,
            created_at: Utc::now(),
            validated_at: None,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("rha_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn validation_lifecycle() {
        let storage = test_storage().await;
        let record = pending_record("Comment calculer ma pension ?");
        storage.insert_validation(&record).await.expect("insert");

        let found = storage.get_validation(&record.id).await.unwrap().unwrap();
        assert_eq!(found.query, record.query);
        assert_eq!(found.state, ValidationState::Pending);
        assert!(found.hr_feedback.is_none());
        assert!(found.validated_at.is_none());

        let pending = storage.list_pending_validations().await.unwrap();
        assert_eq!(pending.len(), 1);

        let updated = storage
            .update_validation(&record.id, ValidationState::Approved, Some("ok"), Utc::now())
            .await
            .unwrap();
        assert!(updated);

        let found = storage.get_validation(&record.id).await.unwrap().unwrap();
        assert_eq!(found.state, ValidationState::Approved);
        assert_eq!(found.hr_feedback.as_deref(), Some("ok"));
        assert!(found.validated_at.is_some());
        assert!(storage.list_pending_validations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_unknown_validation_reports_missing() {
        let storage = test_storage().await;
        let updated = storage
            .update_validation(&ValidationId::new(), ValidationState::Rejected, None, Utc::now())
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn pending_listing_is_ordered_by_creation() {
        let storage = test_storage().await;
        let first = pending_record("first");
        let second = pending_record("second");
        storage.insert_validation(&first).await.unwrap();
        storage.insert_validation(&second).await.unwrap();

        let pending = storage.list_pending_validations().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn validation_counts() {
        let storage = test_storage().await;
        for q in ["a", "b", "c"] {
            storage.insert_validation(&pending_record(q)).await.unwrap();
        }
        let decided = pending_record("d");
        storage.insert_validation(&decided).await.unwrap();
        storage
            .update_validation(&decided.id, ValidationState::Rejected, None, Utc::now())
            .await
            .unwrap();

        let counts = storage.count_validations().await.unwrap();
        assert_eq!(
            counts,
            ValidationCounts {
                pending: 3,
                approved: 0,
                rejected: 1
            }
        );
    }

    #[tokio::test]
    async fn response_cache_hit_and_expiry() {
        let storage = test_storage().await;

        // Miss
        assert!(storage.get_cached_response("k1").await.unwrap().is_none());

        // Set + hit
        storage
            .set_cached_response("k1", "s1", "bonjour", r#"{"response":"x"}"#, Duration::from_secs(3600))
            .await
            .unwrap();
        let cached = storage.get_cached_response("k1").await.unwrap();
        assert_eq!(cached.as_deref(), Some(r#"{"response":"x"}"#));

        // Zero TTL is already expired
        storage
            .set_cached_response("k2", "s1", "salut", "{}", Duration::ZERO)
            .await
            .unwrap();
        assert!(storage.get_cached_response("k2").await.unwrap().is_none());
        assert_eq!(storage.purge_expired_cache().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn interactions_newest_first() {
        let storage = test_storage().await;
        for (i, question) in ["première", "deuxième"].iter().enumerate() {
            storage
                .insert_interaction(&ChatInteraction {
                    user_id: 42,
                    session_id: "s".into(),
                    question: (*question).into(),
                    response: "r".into(),
                    confidence_score: 0.9,
                    requires_validation: i == 1,
                    response_time_ms: 12,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let history = storage.list_interactions(42, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "deuxième");
        assert!(history[0].requires_validation);
        assert!(storage.list_interactions(7, 10).await.unwrap().is_empty());
        assert_eq!(storage.count_interactions().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn document_vectors_and_metadata() {
        let storage = test_storage().await;
        storage
            .upsert_document_vector("d1", "contenu", r#"{"source":"note"}"#, &[0.6, 0.8])
            .await
            .unwrap();
        storage
            .upsert_document_vector("d1", "contenu v2", r#"{"source":"note"}"#, &[1.0, 0.0])
            .await
            .unwrap();

        let vectors = storage.list_document_vectors().await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].content, "contenu v2");
        assert_eq!(vectors[0].embedding, vec![1.0, 0.0]);

        storage
            .insert_document("d1", "Note", "note", "congés", 10)
            .await
            .unwrap();
        assert_eq!(storage.count_documents().await.unwrap(), 1);
    }
}
