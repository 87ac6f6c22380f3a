//! Confidence scoring.
//!
//! With retrieval hits the score is the best relevance: the retriever's own
//! confidence is trusted over the generated text. Without hits, a crude
//! answer-length heuristic stands in for a real answer/source consistency check.

use rhassistant_shared::{ComposedResponse, RetrievalResult};

/// Score when the LLM failed and the apology text was substituted.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

const LONG_ANSWER_CHARS: usize = 200;
const MEDIUM_ANSWER_CHARS: usize = 100;

pub fn score(composed: &ComposedResponse, retrieval: &RetrievalResult) -> f64 {
    if composed.fallback_used {
        return FALLBACK_CONFIDENCE;
    }
    if let Some(max) = retrieval.max_relevance() {
        return max;
    }
    let len = composed.response_text.chars().count();
    if len > LONG_ANSWER_CHARS {
        0.85
    } else if len > MEDIUM_ANSWER_CHARS {
        0.75
    } else {
        0.65
    }
}
