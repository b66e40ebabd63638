//! Price intelligence pipeline
//!
//! Provides:
//! - Query parsing with an LLM or keyword fallback
//! - Price resolution and anomaly annotation
//! - Search summaries and shopping lists
//! - Grounded chat replies
//! - Offer extraction from text and images
//! - Crowd-sourced price submissions

pub mod anomaly;
pub mod chat;
mod lenient;
pub mod offer_extractor;
pub mod price_resolver;
pub mod query_parser;
pub mod search;
pub mod submission;
pub mod summary;

pub use anomaly::{annotate, flag_suspicious, AnnotatedPrice};
pub use chat::{ChatFact, ChatReply, ChatResponder};
pub use offer_extractor::{OfferExtraction, OfferExtractor, OfferItem};
pub use price_resolver::{PriceResolver, MAX_RESULTS};
pub use query_parser::{
    fallback_parse, FallbackReason, Intent, ParseOutcome, ParseSource, ParsedQuery, QueryItem,
    QueryParser,
};
pub use search::{SearchResponse, SearchService};
pub use submission::{Submission, SubmissionService};

use crate::db::Catalog;
use crate::llm::LlmGateway;
use std::sync::Arc;

/// All pricing services, wired to one catalog and an optional LLM
pub struct PricingServices {
    pub search: SearchService,
    pub chat: ChatResponder,
    pub offers: OfferExtractor,
    pub submissions: SubmissionService,
}

impl PricingServices {
    pub fn new(catalog: Arc<dyn Catalog>, llm: Option<Arc<dyn LlmGateway>>) -> Self {
        let parser = Arc::new(QueryParser::new(llm.clone()));
        let resolver = PriceResolver::new(catalog.clone());

        Self {
            search: SearchService::new(parser.clone(), resolver.clone(), catalog.clone()),
            chat: ChatResponder::new(llm.clone(), parser, resolver, catalog.clone()),
            offers: OfferExtractor::new(llm),
            submissions: SubmissionService::new(catalog),
        }
    }
}
