//! Shared types, error model, and configuration for the HR assistant.
//!
//! This crate is the foundation depended on by all other rhassistant crates.
//! It provides:
//! - [`AssistantError`], the unified error type
//! - Domain types ([`Query`], [`RetrievalResult`], [`ChatResponse`], [`ValidationRecord`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheBackend, CacheConfig, FactsConfig, KnowledgeBackend, KnowledgeConfig,
    LlmConfig, StorageConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, read_secret_env,
};
pub use error::{AssistantError, Result};
pub use types::{
    BestEffort, Caller, ChatInteraction, ChatResponse, ComposedResponse, HrDocument,
    KnowledgeItem, KnowledgeKind, KnowledgePayload, Query, QueryType, RetrievalResult, Role,
    ValidationId, ValidationRecord, ValidationState, ValidationStats, ValidationStatus,
};
