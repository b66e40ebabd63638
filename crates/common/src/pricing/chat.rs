//! Chat Responder - conversational answers grounded in catalog data
//!
//! The message is parsed and resolved like a search, with two wider nets when
//! nothing matches (the raw message as a product, then as a store name). The
//! findings are embedded in the system prompt of a second completion that is
//! told to answer only from them.

use super::price_resolver::PriceResolver;
use super::query_parser::QueryParser;
use crate::db::{Catalog, PriceMatch};
use crate::db::models::{Store, UNSPECIFIED_DISTRICT};
use crate::errors::Result;
use crate::llm::{ChatMessage, CompletionRequest, LlmGateway};
use crate::metrics;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

const UNAVAILABLE_REPLY: &str = "عذراً، خدمة الذكاء الاصطناعي غير متوفرة حالياً.";
const ERROR_REPLY: &str = "حدث خطأ في الاتصال، حاول مرة أخرى.";
const NO_DATA_CONTEXT: &str = "لم يتم العثور على بيانات في قاعدة البيانات لهذا الاستفسار.";
const DATA_CONTEXT_HEADER: &str = "بيانات المتوفرة (منتجات أو متاجر):";

const GROUNDING_PROMPT: &str = r#"You are 'GazaPrice Assistant'.
Answer ONLY from the Context Data below.
- When the user asks about a price or names a product, look it up in the Context Data.
- Matching is fuzzy, not exact: a question about "cucumber" is answered by a "cucumber 1kg" entry. Report such matches.
- When the data is there, state the price, the store name and its location clearly.
- When it is not, reply exactly: "عذراً، لا تتوفر لدي معلومات عن هذا المنتج حالياً في قاعدة البيانات."
- Never invent prices or stores.
- Reply in friendly Gaza-dialect Arabic.

Context Data:
"#;

/// A catalog finding handed to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFact {
    ProductPrice {
        product: String,
        store: String,
        location: String,
        price: String,
    },
    StoreInfo {
        name: String,
        location: String,
    },
}

impl From<PriceMatch> for ChatFact {
    fn from(m: PriceMatch) -> Self {
        ChatFact::ProductPrice {
            location: format!(
                "{} - {}",
                m.store.city,
                m.store.district_name().unwrap_or(UNSPECIFIED_DISTRICT)
            ),
            price: format!("{} {}", m.record.price, m.record.unit),
            product: m.product.name,
            store: m.store.name,
        }
    }
}

impl From<Store> for ChatFact {
    fn from(store: Store) -> Self {
        ChatFact::StoreInfo {
            location: format!("{} - {}", store.city, store.district_name().unwrap_or("")),
            name: store.name,
        }
    }
}

/// Reply text plus how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    /// Facts embedded in the grounding context
    pub grounded_facts: usize,
    /// True when the reply is a fixed fallback sentence
    pub degraded: bool,
}

impl ChatReply {
    fn fallback(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            grounded_facts: 0,
            degraded: true,
        }
    }
}

pub struct ChatResponder {
    llm: Option<Arc<dyn LlmGateway>>,
    parser: Arc<QueryParser>,
    resolver: PriceResolver,
    catalog: Arc<dyn Catalog>,
}

impl ChatResponder {
    pub fn new(
        llm: Option<Arc<dyn LlmGateway>>,
        parser: Arc<QueryParser>,
        resolver: PriceResolver,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            llm,
            parser,
            resolver,
            catalog,
        }
    }

    /// Never fails; failures become fixed Arabic sentences
    pub async fn reply(&self, message: &str) -> ChatReply {
        let Some(llm) = &self.llm else {
            metrics::record_chat("unavailable");
            return ChatReply::fallback(UNAVAILABLE_REPLY);
        };

        match self.grounded_reply(llm.as_ref(), message).await {
            Ok(reply) => {
                metrics::record_chat("answered");
                reply
            }
            Err(e) => {
                error!(error = %e, "Chat failed");
                metrics::record_chat("error");
                ChatReply::fallback(ERROR_REPLY)
            }
        }
    }

    async fn grounded_reply(&self, llm: &dyn LlmGateway, message: &str) -> Result<ChatReply> {
        let facts = self.gather_facts(message).await?;
        let context = grounding_context(&facts)?;

        info!(facts = facts.len(), "Built chat grounding context");

        let request = CompletionRequest::new("chat")
            .message(ChatMessage::system(format!("{}{}", GROUNDING_PROMPT, context)))
            .message(ChatMessage::user(message));
        let reply = llm.complete(request).await?;

        Ok(ChatReply {
            reply,
            grounded_facts: facts.len(),
            degraded: false,
        })
    }

    async fn gather_facts(&self, message: &str) -> Result<Vec<ChatFact>> {
        let parsed = self.parser.parse(message).await.query;

        let mut facts = Vec::new();
        for item in &parsed.items {
            let matches = self.resolver.resolve(item, parsed.location_filter()).await?;
            facts.extend(matches.into_iter().map(ChatFact::from));
        }

        // The parser may miss single-word queries
        if facts.is_empty() {
            let matches = self.resolver.resolve_product(message, None).await?;
            facts.extend(matches.into_iter().map(ChatFact::from));
        }

        if facts.is_empty() {
            let stores = self.catalog.find_stores_by_name(message).await?;
            facts.extend(stores.into_iter().map(ChatFact::from));
        }

        Ok(facts)
    }
}

fn grounding_context(facts: &[ChatFact]) -> Result<String> {
    if facts.is_empty() {
        return Ok(NO_DATA_CONTEXT.to_string());
    }
    Ok(format!(
        "{}\n{}",
        DATA_CONTEXT_HEADER,
        serde_json::to_string_pretty(facts)?
    ))
}
