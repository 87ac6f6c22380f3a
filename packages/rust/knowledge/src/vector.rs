//! Semantic retrieval through a vector index.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rhassistant_shared::{AssistantError, KnowledgeItem, KnowledgePayload, Result, RetrievalResult};
use rhassistant_storage::Storage;
use tracing::{debug, instrument, warn};

use crate::KnowledgeRetriever;
use crate::embed::{HashEmbedder, cosine_similarity};

/// Provenance reported for hits without a `source` metadata entry.
const UNKNOWN_SOURCE: &str = "N/A";

/// Extra candidates fetched per requested result when a category filter applies.
const CATEGORY_OVERFETCH: usize = 4;

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    /// Similarity to the query, higher is closer.
    pub score: f64,
}

/// A vector index: write documents, query by text.
#[async_trait]
pub trait IndexGateway: Send + Sync {
    async fn upsert(&self, id: &str, text: &str, metadata: &BTreeMap<String, String>)
    -> Result<()>;

    /// Up to `k` hits, best first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>>;
}

/// Index kept in the libSQL database, ranked by cosine similarity over
/// [`HashEmbedder`] vectors.
pub struct LocalIndex {
    storage: Arc<Storage>,
    embedder: HashEmbedder,
}

impl LocalIndex {
    pub fn new(storage: Arc<Storage>, embedder: HashEmbedder) -> Self {
        Self { storage, embedder }
    }
}

#[async_trait]
impl IndexGateway for LocalIndex {
    async fn upsert(
        &self,
        id: &str,
        text: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| AssistantError::validation(format!("unserializable metadata: {e}")))?;
        let embedding = self.embedder.embed(text);
        self.storage
            .upsert_document_vector(id, text, &metadata_json, &embedding)
            .await
    }

    #[instrument(skip_all, fields(k = k))]
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        let query_vec = self.embedder.embed(text);
        let mut hits = Vec::new();

        for stored in self.storage.list_document_vectors().await? {
            if stored.embedding.len() != query_vec.len() {
                warn!(
                    id = %stored.id,
                    stored_dim = stored.embedding.len(),
                    dim = query_vec.len(),
                    "skipping vector with mismatched dimension"
                );
                continue;
            }
            let metadata = serde_json::from_str(&stored.metadata_json).unwrap_or_else(|e| {
                warn!(id = %stored.id, error = %e, "unreadable vector metadata");
                BTreeMap::new()
            });
            hits.push(IndexHit {
                score: f64::from(cosine_similarity(&query_vec, &stored.embedding)),
                id: stored.id,
                content: stored.content,
                metadata,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        debug!(hits = hits.len(), "index query");
        Ok(hits)
    }
}

/// Retriever over an [`IndexGateway`]; relevance is the similarity clamped to [0, 1].
pub struct IndexRetriever {
    index: Arc<dyn IndexGateway>,
    top_k: usize,
}

impl IndexRetriever {
    pub fn new(index: Arc<dyn IndexGateway>, top_k: usize) -> Self {
        Self {
            index,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for IndexRetriever {
    async fn retrieve(&self, query: &str, category: Option<&str>) -> Result<RetrievalResult> {
        let k = match category {
            Some(_) => self.top_k * CATEGORY_OVERFETCH,
            None => self.top_k,
        };
        let hits = self.index.query(query, k).await?;

        let items = hits
            .into_iter()
            .filter(|hit| {
                category.is_none_or(|wanted| {
                    hit.metadata.get("category").map(String::as_str) == Some(wanted)
                })
            })
            .filter(|hit| hit.score > 0.0)
            .take(self.top_k)
            .map(|mut hit| {
                let source = hit
                    .metadata
                    .remove("source")
                    .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
                KnowledgeItem::new(
                    KnowledgePayload::Document {
                        title: hit.metadata.remove("title"),
                        content: hit.content,
                        category: hit.metadata.remove("category"),
                    },
                    hit.score,
                    source,
                )
            })
            .collect();

        Ok(RetrievalResult::new(items))
    }
}
