//! Core domain types for the HR question-answering pipeline.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AssistantError;

// ---------------------------------------------------------------------------
// Query & caller
// ---------------------------------------------------------------------------

/// How a query is handled by the validation gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    General,
    /// Always routed to an HR expert, whatever the confidence.
    Sensitive,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Sensitive => "sensitive",
        }
    }
}

impl FromStr for QueryType {
    type Err = AssistantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "sensitive" => Ok(Self::Sensitive),
            other => Err(AssistantError::validation(format!(
                "unknown query type '{other}': expected 'general' or 'sensitive'"
            ))),
        }
    }
}

/// A single employee question. Transient, one per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Raw question text, also half of the response cache key.
    pub text: String,
    #[serde(default)]
    pub query_type: QueryType,
    pub user_id: i64,
    pub session_id: String,
}

impl Query {
    pub fn new(
        session_id: impl Into<String>,
        user_id: i64,
        text: impl Into<String>,
        query_type: QueryType,
    ) -> Self {
        Self {
            text: text.into(),
            query_type,
            user_id,
            session_id: session_id.into(),
        }
    }
}

/// Role granted by the authentication boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// An already-authenticated caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn user(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::User,
        }
    }

    pub fn admin(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `PermissionDenied` unless the caller is an administrator.
    pub fn require_admin(&self) -> crate::Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AssistantError::PermissionDenied(
                "not enough permissions".into(),
            ))
        }
    }

    /// Fail unless the caller owns `user_id`'s data or is an administrator.
    pub fn require_owner_or_admin(&self, user_id: i64) -> crate::Result<()> {
        if self.user_id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AssistantError::PermissionDenied("user ID mismatch".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

/// Corpus section a knowledge item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    Faq,
    Policy,
    Procedure,
    Document,
    Holiday,
}

impl KnowledgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Faq => "faq",
            Self::Policy => "policy",
            Self::Procedure => "procedure",
            Self::Document => "document",
            Self::Holiday => "holiday",
        }
    }
}

/// Content of a knowledge item, shaped by its corpus section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KnowledgePayload {
    Faq {
        question: String,
        answer: String,
        category: String,
    },
    Policy {
        title: String,
        content: String,
        category: String,
    },
    Procedure {
        title: String,
        steps: Vec<String>,
        category: String,
    },
    Document {
        title: Option<String>,
        content: String,
        category: Option<String>,
    },
    Holiday {
        date: String,
        name: String,
        holiday_type: String,
    },
}

impl KnowledgePayload {
    pub fn kind(&self) -> KnowledgeKind {
        match self {
            Self::Faq { .. } => KnowledgeKind::Faq,
            Self::Policy { .. } => KnowledgeKind::Policy,
            Self::Procedure { .. } => KnowledgeKind::Procedure,
            Self::Document { .. } => KnowledgeKind::Document,
            Self::Holiday { .. } => KnowledgeKind::Holiday,
        }
    }

    /// Flatten the payload to plain text (used for LLM context and excerpts).
    pub fn text(&self) -> String {
        match self {
            Self::Faq {
                question, answer, ..
            } => format!("{question}\n{answer}"),
            Self::Policy { title, content, .. } => format!("{title}\n{}", content.trim()),
            Self::Procedure { title, steps, .. } => format!("{title}\n{}", steps.join("\n")),
            Self::Document { title, content, .. } => match title {
                Some(t) => format!("{t}\n{content}"),
                None => content.clone(),
            },
            Self::Holiday { date, name, .. } => format!("{name} ({date})"),
        }
    }
}

/// A ranked retrieval candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub payload: KnowledgePayload,
    /// Estimated pertinence in [0, 1].
    pub relevance: f64,
    /// Provenance tag surfaced in `ChatResponse::sources`.
    pub source: String,
}

impl KnowledgeItem {
    /// Build an item, clamping `relevance` into [0, 1] (NaN becomes 0).
    pub fn new(payload: KnowledgePayload, relevance: f64, source: impl Into<String>) -> Self {
        let relevance = if relevance.is_nan() {
            0.0
        } else {
            relevance.clamp(0.0, 1.0)
        };
        Self {
            payload,
            relevance,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> KnowledgeKind {
        self.payload.kind()
    }
}

/// Ordered retrieval candidates for one query. Empty means "no knowledge found".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalResult {
    items: Vec<KnowledgeItem>,
}

impl RetrievalResult {
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    /// Highest-relevance item; ties go to the first one seen.
    pub fn best(&self) -> Option<&KnowledgeItem> {
        self.items.iter().fold(None, |best, item| match best {
            Some(b) if b.relevance >= item.relevance => Some(b),
            _ => Some(item),
        })
    }

    pub fn max_relevance(&self) -> Option<f64> {
        self.best().map(|item| item.relevance)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Draft answer produced by the composer, before scoring and gating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposedResponse {
    pub response_text: String,
    pub sources: Vec<String>,
    /// Enrichment payloads keyed by category name.
    pub additional_info: BTreeMap<String, serde_json::Value>,
    /// Set when the LLM gateway failed and the apology text was substituted.
    #[serde(default)]
    pub fallback_used: bool,
}

/// Validation status as shown to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    NotRequired,
    Approved,
    Rejected,
}

/// The externally visible result of processing a query. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub confidence_score: f64,
    pub sources: Vec<String>,
    pub requires_validation: bool,
    pub validation_status: Option<ValidationStatus>,
    /// Wall-clock processing time in seconds.
    pub response_time: f64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Validation records
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for validation record identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationId(pub Uuid);

impl ValidationId {
    /// Generate a new time-sortable identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ValidationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ValidationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ValidationId {
    type Err = AssistantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| AssistantError::validation(format!("invalid validation id '{s}': {e}")))
    }
}

/// Review state of a validation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Pending,
    Approved,
    Rejected,
}

impl ValidationState {
    pub fn from_decision(approved: bool) -> Self {
        if approved {
            Self::Approved
        } else {
            Self::Rejected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        *self == Self::Pending
    }
}

impl FromStr for ValidationState {
    type Err = AssistantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(AssistantError::validation(format!(
                "unknown validation state '{other}'"
            ))),
        }
    }
}

impl From<ValidationState> for ValidationStatus {
    fn from(state: ValidationState) -> Self {
        match state {
            ValidationState::Pending => Self::Pending,
            ValidationState::Approved => Self::Approved,
            ValidationState::Rejected => Self::Rejected,
        }
    }
}

/// An answer held back for HR review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: ValidationId,
    pub query: String,
    /// The composed answer the requester has not seen yet.
    pub proposed_response: String,
    pub confidence_score: f64,
    pub hr_feedback: Option<String>,
    pub state: ValidationState,
    pub created_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl ValidationRecord {
    /// Tri-state view used by older consumers: `None` while pending.
    pub fn approved(&self) -> Option<bool> {
        match self.state {
            ValidationState::Pending => None,
            ValidationState::Approved => Some(true),
            ValidationState::Rejected => Some(false),
        }
    }
}

/// Admin counters over the persisted workflow state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub documents: u64,
    pub interactions: u64,
}

// ---------------------------------------------------------------------------
// History & documents
// ---------------------------------------------------------------------------

/// One processed question as recorded in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInteraction {
    pub user_id: i64,
    pub session_id: String,
    pub question: String,
    pub response: String,
    pub confidence_score: f64,
    pub requires_validation: bool,
    pub response_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// A plain-text HR document submitted for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrDocument {
    pub title: String,
    pub content: String,
    pub source: String,
    pub category: String,
}

/// Outcome of an optional side-effect write that must not fail its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum BestEffort {
    Done,
    Failed(String),
}

impl BestEffort {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
