//! The query-answering pipeline:
//! cache → retrieve → enrich → compose → (refine) → score → gate → cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rhassistant_gateways::{APOLOGY_TEXT, HttpFactsGateway, LlmGateway, OpenAiLlm};
use rhassistant_knowledge::{
    Corpus, CorpusRetriever, HashEmbedder, IndexGateway, IndexRetriever, KnowledgeRetriever,
    LocalIndex,
};
use rhassistant_shared::{
    AppConfig, AssistantError, CacheBackend, Caller, ChatInteraction, ChatResponse,
    ComposedResponse, HrDocument, KnowledgeBackend, Query, Result, RetrievalResult,
    ValidationId, ValidationRecord, ValidationStats, ValidationStatus,
};
use rhassistant_storage::Storage;
use tracing::{debug, info, instrument, warn};

use crate::cache::{MemoryCache, ResponseCache, StorageCache};
use crate::documents::{self, IngestOutcome};
use crate::enricher::Enricher;
use crate::gatekeeper::{self, Gatekeeper, PENDING_NOTICE};
use crate::store::{DocumentStore, HistoryStore, ValidationStore};
use crate::{composer, scorer};

/// Instructions sent with every LLM refinement.
const SYSTEM_PROMPT: &str = "Tu es l'assistant RH de la CDG (Caisse de Dépôt et de Gestion, Maroc). \
Réponds en français, de façon concise et factuelle, uniquement à partir du contexte fourni. \
Si le contexte ne permet pas de répondre, dis-le.";

/// Retrieved items quoted in the LLM prompt.
const PROMPT_CONTEXT_ITEMS: usize = 3;

/// Default page size for chat history.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Every collaborator the pipeline calls, injected explicitly.
pub struct Components {
    pub retriever: Arc<dyn KnowledgeRetriever>,
    pub enricher: Enricher,
    /// `None` keeps the templated composition as the final answer.
    pub llm: Option<Arc<dyn LlmGateway>>,
    pub validations: Arc<dyn ValidationStore>,
    pub cache: Arc<dyn ResponseCache>,
    pub cache_ttl: Duration,
    pub history: Arc<dyn HistoryStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub index: Arc<dyn IndexGateway>,
}

/// The HR assistant.
pub struct Assistant {
    retriever: Arc<dyn KnowledgeRetriever>,
    enricher: Enricher,
    llm: Option<Arc<dyn LlmGateway>>,
    gatekeeper: Gatekeeper,
    cache: Arc<dyn ResponseCache>,
    cache_ttl: Duration,
    history: Arc<dyn HistoryStore>,
    documents: Arc<dyn DocumentStore>,
    index: Arc<dyn IndexGateway>,
}

impl Assistant {
    pub fn new(components: Components) -> Self {
        Self {
            retriever: components.retriever,
            enricher: components.enricher,
            llm: components.llm,
            gatekeeper: Gatekeeper::new(components.validations),
            cache: components.cache,
            cache_ttl: components.cache_ttl,
            history: components.history,
            documents: components.documents,
            index: components.index,
        }
    }

    /// Wire the production components from config over one database.
    pub fn from_config(config: &AppConfig, storage: Arc<Storage>) -> Result<Self> {
        let index: Arc<dyn IndexGateway> = Arc::new(LocalIndex::new(
            storage.clone(),
            HashEmbedder::new(config.knowledge.embedding_dim),
        ));

        let retriever: Arc<dyn KnowledgeRetriever> = match config.knowledge.backend {
            KnowledgeBackend::Corpus => {
                let path = config.knowledge.corpus_path.as_deref().map(std::path::Path::new);
                Arc::new(CorpusRetriever::new(Corpus::load_or_builtin(path)?))
            }
            KnowledgeBackend::Index => {
                Arc::new(IndexRetriever::new(index.clone(), config.knowledge.top_k))
            }
        };

        let cache: Arc<dyn ResponseCache> = match config.cache.backend {
            CacheBackend::Storage => Arc::new(StorageCache::new(storage.clone())),
            CacheBackend::Memory => {
                warn!("memory cache selected: cached responses never expire and are lost on exit");
                Arc::new(MemoryCache::new())
            }
        };

        let llm: Option<Arc<dyn LlmGateway>> = if config.llm.enabled {
            Some(Arc::new(OpenAiLlm::from_config(&config.llm)?))
        } else {
            None
        };

        let facts = Arc::new(HttpFactsGateway::from_config(&config.facts)?);

        Ok(Self::new(Components {
            retriever,
            enricher: Enricher::new(facts, config.facts.default_city.clone()),
            llm,
            validations: storage.clone(),
            cache,
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            history: storage.clone(),
            documents: storage,
            index,
        }))
    }

    /// Answer a query on behalf of an authenticated caller.
    pub async fn handle_chat(&self, caller: &Caller, query: &Query) -> Result<ChatResponse> {
        if caller.user_id != query.user_id {
            return Err(AssistantError::PermissionDenied("user ID mismatch".into()));
        }
        self.process_query(query).await
    }

    /// Run the full pipeline for one query.
    ///
    /// Only a failed validation enqueue is an error; every other upstream
    /// failure degrades to a fallback value.
    #[instrument(skip_all, fields(session = %query.session_id, user = query.user_id))]
    pub async fn process_query(&self, query: &Query) -> Result<ChatResponse> {
        let start = Instant::now();

        match self.cache.get(&query.session_id, &query.text).await {
            Ok(Some(cached)) => {
                debug!("cache hit");
                return Ok(cached);
            }
            Ok(None) => debug!("cache miss"),
            Err(e) => warn!(error = %e, "cache lookup failed, recomputing"),
        }

        let retrieval = match self.retriever.retrieve(&query.text, None).await {
            Ok(retrieval) => retrieval,
            Err(e) => {
                warn!(error = %e, "retrieval failed, continuing without knowledge");
                RetrievalResult::empty()
            }
        };

        let enrichment = self.enricher.enrich(&query.text).await;
        let mut composed = composer::compose(&query.text, &retrieval, &enrichment);
        if let Some(llm) = &self.llm {
            composed = refine(llm.as_ref(), &query.text, &retrieval, composed).await;
        }

        let confidence_score = scorer::score(&composed, &retrieval);
        let requires_validation =
            gatekeeper::requires_validation(confidence_score, query.query_type);

        let (text, status) = if requires_validation {
            let record = self
                .gatekeeper
                .enqueue(&query.text, &composed.response_text, confidence_score)
                .await?;
            (PENDING_NOTICE.to_string(), ValidationStatus::from(record.state))
        } else {
            (composed.response_text, ValidationStatus::NotRequired)
        };

        let elapsed = start.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let response = ChatResponse {
            response: text,
            confidence_score,
            sources: composed.sources,
            requires_validation,
            validation_status: Some(status),
            response_time: elapsed.as_secs_f64(),
            timestamp: Utc::now(),
        };

        if let Err(e) = self
            .cache
            .put(&query.session_id, &query.text, &response, self.cache_ttl)
            .await
        {
            warn!(error = %e, "failed to cache response");
        }

        let interaction = ChatInteraction {
            user_id: query.user_id,
            session_id: query.session_id.clone(),
            question: query.text.clone(),
            response: response.response.clone(),
            confidence_score,
            requires_validation,
            response_time_ms: elapsed_ms,
            created_at: response.timestamp,
        };
        if let Err(e) = self.history.record(&interaction).await {
            warn!(error = %e, "failed to record chat history");
        }

        info!(
            confidence = confidence_score,
            requires_validation,
            hits = retrieval.len(),
            elapsed_ms,
            "query answered"
        );
        Ok(response)
    }

    /// Records awaiting review. Admin only.
    pub async fn list_pending_validations(&self, caller: &Caller) -> Result<Vec<ValidationRecord>> {
        caller.require_admin()?;
        self.gatekeeper.list_pending().await
    }

    /// Approve or reject a pending answer. Admin only.
    pub async fn decide_validation(
        &self,
        caller: &Caller,
        id: &ValidationId,
        approved: bool,
        feedback: Option<String>,
    ) -> Result<ValidationRecord> {
        caller.require_admin()?;
        self.gatekeeper.decide(id, approved, feedback).await
    }

    /// A user's chat history, newest first. Users may only read their own.
    pub async fn history(
        &self,
        caller: &Caller,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<ChatInteraction>> {
        caller.require_owner_or_admin(user_id)?;
        self.history.list(user_id, limit).await
    }

    /// Workflow counters. Admin only.
    pub async fn stats(&self, caller: &Caller) -> Result<ValidationStats> {
        caller.require_admin()?;
        let counts = self.gatekeeper.counts().await?;
        Ok(ValidationStats {
            pending: counts.pending,
            approved: counts.approved,
            rejected: counts.rejected,
            documents: self.documents.count_documents().await?,
            interactions: self.history.count().await?,
        })
    }

    /// Add a document to the knowledge index. Admin only.
    pub async fn ingest_document(&self, caller: &Caller, doc: &HrDocument) -> Result<IngestOutcome> {
        caller.require_admin()?;
        documents::ingest(self.index.as_ref(), self.documents.as_ref(), doc).await
    }
}

/// Rewrite the templated draft with the LLM; on failure substitute the apology.
async fn refine(
    llm: &dyn LlmGateway,
    query: &str,
    retrieval: &RetrievalResult,
    mut composed: ComposedResponse,
) -> ComposedResponse {
    let context = retrieval
        .items()
        .iter()
        .take(PROMPT_CONTEXT_ITEMS)
        .map(|item| format!("[{}] {}", item.source, item.payload.text()))
        .collect::<Vec<_>>()
        .join("\n\n");
    let context = if context.is_empty() {
        "Aucun document pertinent trouvé.".to_string()
    } else {
        context
    };
    let prompt = format!(
        "Contexte :\n{context}\n\nBrouillon de réponse :\n{}\n\nQuestion de l'employé : {query}",
        composed.response_text
    );

    match llm.complete(SYSTEM_PROMPT, &prompt).await {
        Ok(text) => composed.response_text = text,
        Err(e) => {
            warn!(error = %e, "LLM unavailable, answering with apology");
            composed.response_text = APOLOGY_TEXT.to_string();
            composed.fallback_used = true;
        }
    }
    composed
}
