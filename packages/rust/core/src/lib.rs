//! Core question-answering logic for the HR assistant.
//!
//! [`pipeline::Assistant`] ties retrieval, fact enrichment, composition,
//! scoring, and the validation gatekeeper into one request flow.

pub mod cache;
pub mod composer;
pub mod documents;
pub mod enricher;
pub mod gatekeeper;
pub mod intent;
pub mod pipeline;
pub mod scorer;
pub mod store;

pub use gatekeeper::{PENDING_NOTICE, VALIDATION_THRESHOLD};
pub use pipeline::{Assistant, Components, DEFAULT_HISTORY_LIMIT};
