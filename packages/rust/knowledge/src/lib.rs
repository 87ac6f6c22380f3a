//! Knowledge retrieval for the HR assistant.
//!
//! Two interchangeable [`KnowledgeRetriever`] backends:
//! - [`CorpusRetriever`]: case-insensitive substring search over the curated
//!   CDG corpus, with a fixed relevance per corpus section.
//! - [`IndexRetriever`]: nearest-neighbour search through an [`IndexGateway`],
//!   with relevance taken from the similarity score.

mod corpus;
mod embed;
mod keyword;
mod vector;

use async_trait::async_trait;
use rhassistant_shared::{Result, RetrievalResult};

pub use corpus::{Corpus, FaqEntry, HolidayEntry, PolicyEntry, ProcedureEntry};
pub use embed::{HashEmbedder, cosine_similarity};
pub use keyword::CorpusRetriever;
pub use vector::{IndexGateway, IndexHit, IndexRetriever, LocalIndex};

/// Looks up knowledge items for a query.
///
/// Finding nothing is an empty [`RetrievalResult`], not an error. Errors mean
/// the backend itself could not be reached.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, category: Option<&str>) -> Result<RetrievalResult>;
}
