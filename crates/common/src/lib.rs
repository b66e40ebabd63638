//! PriceLens Common Library
//!
//! Shared code for the PriceLens services including:
//! - Catalog models, the PostgreSQL repository and an in-process catalog
//! - LLM gateway abstraction
//! - The pricing pipeline (parse, resolve, annotate, summarize, chat, extract, submit)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod pricing;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{Catalog, MemoryCatalog, Repository};
pub use errors::{AppError, Result};
pub use llm::LlmGateway;
pub use pricing::PricingServices;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
