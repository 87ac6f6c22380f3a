//! Keyword retrieval over the curated corpus.

use async_trait::async_trait;
use rhassistant_shared::{KnowledgeItem, KnowledgePayload, Result, RetrievalResult};
use tracing::debug;

use crate::KnowledgeRetriever;
use crate::corpus::Corpus;

/// Fixed relevance per corpus section: FAQ answers are trusted most.
const FAQ_RELEVANCE: f64 = 0.9;
const POLICY_RELEVANCE: f64 = 0.8;
const PROCEDURE_RELEVANCE: f64 = 0.7;
const HOLIDAY_RELEVANCE: f64 = 0.8;

const HOLIDAY_SOURCE: &str = "jours_feries";

/// Case-insensitive substring search of the whole query over corpus text.
pub struct CorpusRetriever {
    corpus: Corpus,
}

impl CorpusRetriever {
    pub fn new(corpus: Corpus) -> Self {
        Self { corpus }
    }

    /// Synchronous search; results follow corpus order (FAQ, policies, procedures, holidays).
    pub fn search(&self, query: &str, category: Option<&str>) -> RetrievalResult {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return RetrievalResult::empty();
        }
        let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
        let in_category = |c: &str| category.is_none_or(|wanted| wanted == c);

        let mut items = Vec::new();

        for faq in &self.corpus.faq {
            if in_category(&faq.category) && (contains(&faq.question) || contains(&faq.answer)) {
                items.push(KnowledgeItem::new(
                    KnowledgePayload::Faq {
                        question: faq.question.clone(),
                        answer: faq.answer.clone(),
                        category: faq.category.clone(),
                    },
                    FAQ_RELEVANCE,
                    faq.category.clone(),
                ));
            }
        }

        for policy in &self.corpus.policies {
            if in_category(&policy.category)
                && (contains(&policy.title) || contains(&policy.content))
            {
                items.push(KnowledgeItem::new(
                    KnowledgePayload::Policy {
                        title: policy.title.clone(),
                        content: policy.content.clone(),
                        category: policy.category.clone(),
                    },
                    POLICY_RELEVANCE,
                    policy.source.clone(),
                ));
            }
        }

        for procedure in &self.corpus.procedures {
            if in_category(&procedure.category)
                && (contains(&procedure.title) || procedure.steps.iter().any(|s| contains(s)))
            {
                items.push(KnowledgeItem::new(
                    KnowledgePayload::Procedure {
                        title: procedure.title.clone(),
                        steps: procedure.steps.clone(),
                        category: procedure.category.clone(),
                    },
                    PROCEDURE_RELEVANCE,
                    procedure.category.clone(),
                ));
            }
        }

        // Holidays carry no category, so any category filter excludes them.
        if category.is_none() {
            for holiday in &self.corpus.holidays {
                if contains(&holiday.name) {
                    items.push(KnowledgeItem::new(
                        KnowledgePayload::Holiday {
                            date: holiday.date.clone(),
                            name: holiday.name.clone(),
                            holiday_type: holiday.holiday_type.clone(),
                        },
                        HOLIDAY_RELEVANCE,
                        HOLIDAY_SOURCE,
                    ));
                }
            }
        }

        debug!(hits = items.len(), "corpus search");
        RetrievalResult::new(items)
    }
}

#[async_trait]
impl KnowledgeRetriever for CorpusRetriever {
    async fn retrieve(&self, query: &str, category: Option<&str>) -> Result<RetrievalResult> {
        Ok(self.search(query, category))
    }
}
