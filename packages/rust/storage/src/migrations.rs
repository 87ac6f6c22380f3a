//! SQL migration definitions for the assistant database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: validations, response_cache, chat_interactions, documents",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Answers held back for HR review
CREATE TABLE IF NOT EXISTS validations (
    id                TEXT PRIMARY KEY,
    query             TEXT NOT NULL,
    proposed_response TEXT NOT NULL,
    confidence_score  REAL NOT NULL,
    hr_feedback       TEXT,
    state             TEXT NOT NULL DEFAULT 'pending'
                      CHECK (state IN ('pending', 'approved', 'rejected')),
    created_at        TEXT NOT NULL,
    validated_at      TEXT
);

CREATE INDEX IF NOT EXISTS idx_validations_state ON validations(state);

-- Expiring chat response cache, keyed by hash(session_id, query_text)
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key     TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL,
    query_text    TEXT NOT NULL,
    response_json TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    expires_at    INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_response_cache_expires ON response_cache(expires_at);

-- Chat history
CREATE TABLE IF NOT EXISTS chat_interactions (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id             INTEGER NOT NULL,
    session_id          TEXT NOT NULL,
    question            TEXT NOT NULL,
    response            TEXT NOT NULL,
    confidence_score    REAL NOT NULL,
    requires_validation INTEGER NOT NULL,
    response_time_ms    INTEGER NOT NULL,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_interactions_user ON chat_interactions(user_id);

-- Vector index entries
CREATE TABLE IF NOT EXISTS document_vectors (
    id             TEXT PRIMARY KEY,
    content        TEXT NOT NULL,
    metadata_json  TEXT NOT NULL,
    embedding_json TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- Ingested document metadata
CREATE TABLE IF NOT EXISTS hr_documents (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    source      TEXT NOT NULL,
    category    TEXT NOT NULL,
    content_len INTEGER NOT NULL,
    uploaded_at TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
