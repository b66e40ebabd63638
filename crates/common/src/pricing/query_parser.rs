//! Query Parser - Turns free text into items, location and intent
//!
//! Provides:
//! - LLM-backed extraction (JSON-object completion)
//! - A deterministic keyword fallback used when the LLM is absent or fails
//! - An explicit marker of which path produced the result

use super::lenient;
use crate::llm::{ChatMessage, CompletionRequest, LlmGateway};
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const PARSE_SYSTEM_PROMPT: &str = r#"You parse shopping queries for "GazaPrice AI".
Extract structured data from the user's message and respond with a JSON object only.
Product names MUST be written in Arabic, matching the catalog (e.g. 'خيار', never 'Cucumber').
A message may list several products; return each one as a separate entry in "items".
Fields: items (array of {product, brand, size, unit}), location, intent.
intent is one of CHEAPEST, CLOSEST, BEST_DEAL, SHOPPING_LIST.
Example: "بدي سكر وكولا" -> {"items": [{"product": "سكر"}, {"product": "كوكاكولا"}], "intent": "SHOPPING_LIST"}"#;

/// Keyword substrings and the catalog product they stand for; first hit wins
const KEYWORDS: &[(&[&str], &str)] = &[
    (&["كولا"], "كوكاكولا"),
    (&["نيدو"], "حليب نيدو"),
    (&["سكر"], "سكر"),
    (&["رز", "أرز"], "أرز"),
    (&["طحين", "دقيق"], "طحين"),
];

/// Queries shorter than this (in chars) are not used as a product name
const MIN_FREE_TEXT_CHARS: usize = 2;

/// Queries this long or longer are not used as a product name
const MAX_FREE_TEXT_CHARS: usize = 20;

/// Classified purpose of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Cheapest,
    Closest,
    BestDeal,
    ShoppingList,
}

/// One product mentioned in a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl QueryItem {
    pub fn named(product: impl Into<String>) -> Self {
        Self {
            product: Some(product.into()),
            ..Default::default()
        }
    }
}

/// Structured reading of a user query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub items: Vec<QueryItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::optional_known",
        skip_serializing_if = "Option::is_none"
    )]
    pub intent: Option<Intent>,
}

impl ParsedQuery {
    /// Location usable as a filter; blank counts as absent
    pub fn location_filter(&self) -> Option<&str> {
        self.location.as_deref().filter(|l| !l.is_empty())
    }

    /// Multi-item queries are answered per item
    pub fn is_shopping_list(&self) -> bool {
        self.intent == Some(Intent::ShoppingList) || self.items.len() > 1
    }
}

/// Why the keyword fallback was used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No LLM credential configured
    NotConfigured,
    /// The completion call failed
    UpstreamError,
    /// The completion returned content that is not a parsed query
    MalformedResponse,
}

/// Which path produced a [`ParsedQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    Llm,
    Fallback(FallbackReason),
}

impl ParseSource {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ParseSource::Fallback(_))
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            ParseSource::Llm => "llm",
            ParseSource::Fallback(FallbackReason::NotConfigured) => "fallback_not_configured",
            ParseSource::Fallback(FallbackReason::UpstreamError) => "fallback_upstream_error",
            ParseSource::Fallback(FallbackReason::MalformedResponse) => "fallback_malformed",
        }
    }
}

impl fmt::Display for ParseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed query plus its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub query: ParsedQuery,
    pub source: ParseSource,
}

/// Query parser; never fails, degrading to the keyword fallback instead
pub struct QueryParser {
    llm: Option<Arc<dyn LlmGateway>>,
}

impl QueryParser {
    pub fn new(llm: Option<Arc<dyn LlmGateway>>) -> Self {
        Self { llm }
    }

    pub async fn parse(&self, query: &str) -> ParseOutcome {
        let outcome = match &self.llm {
            None => {
                warn!("LLM not configured, using keyword fallback parser");
                ParseOutcome {
                    query: fallback_parse(query),
                    source: ParseSource::Fallback(FallbackReason::NotConfigured),
                }
            }
            Some(llm) => match self.parse_with_llm(llm.as_ref(), query).await {
                Ok(parsed) => ParseOutcome {
                    query: parsed,
                    source: ParseSource::Llm,
                },
                Err(reason) => ParseOutcome {
                    query: fallback_parse(query),
                    source: ParseSource::Fallback(reason),
                },
            },
        };

        metrics::record_query_parse(outcome.source.label());
        debug!(
            source = %outcome.source,
            items = outcome.query.items.len(),
            intent = ?outcome.query.intent,
            "Parsed query"
        );

        outcome
    }

    async fn parse_with_llm(
        &self,
        llm: &dyn LlmGateway,
        query: &str,
    ) -> Result<ParsedQuery, FallbackReason> {
        let request = CompletionRequest::new("parse_query")
            .message(ChatMessage::system(PARSE_SYSTEM_PROMPT))
            .message(ChatMessage::user(query))
            .json();

        let content = llm.complete(request).await.map_err(|e| {
            warn!(error = %e, "AI query parsing failed, using keyword fallback");
            FallbackReason::UpstreamError
        })?;

        decode_parsed_query(&content).map_err(|e| {
            warn!(error = %e, "AI query parsing returned malformed JSON, using keyword fallback");
            FallbackReason::MalformedResponse
        })
    }
}

/// Empty content is an empty query, not an error
fn decode_parsed_query(content: &str) -> serde_json::Result<ParsedQuery> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(ParsedQuery::default());
    }
    serde_json::from_str(content)
}

/// Deterministic keyword parser
pub fn fallback_parse(query: &str) -> ParsedQuery {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();
    let mut items = Vec::new();

    let keyword_hit = KEYWORDS
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| lower.contains(needle)))
        .map(|(_, product)| *product);

    if let Some(product) = keyword_hit {
        items.push(QueryItem::named(product));
    }

    let length = lower.chars().count();
    if items.is_empty() && (MIN_FREE_TEXT_CHARS..MAX_FREE_TEXT_CHARS).contains(&length) {
        items.push(QueryItem::named(trimmed));
    }

    if let [item] = items.as_mut_slice() {
        if lower.contains("لتر") || lower.contains("كجم") {
            if lower.contains("1.5") || lower.contains("ونص") {
                item.size = Some(1.5);
            }
            if lower.contains("2.5") {
                item.size = Some(2.5);
            }
        }
    }

    let intent = if items.len() > 1 {
        Intent::ShoppingList
    } else {
        Intent::Cheapest
    };

    ParsedQuery {
        items,
        location: None,
        intent: Some(intent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ResponseFormat, ScriptedLlm};

    fn products(parsed: &ParsedQuery) -> Vec<&str> {
        parsed
            .items
            .iter()
            .filter_map(|i| i.product.as_deref())
            .collect()
    }

    #[test]
    fn test_fallback_maps_keyword_to_catalog_name() {
        let parsed = fallback_parse("بدي كولا");
        assert_eq!(products(&parsed), vec!["كوكاكولا"]);
        assert_eq!(parsed.intent, Some(Intent::Cheapest));
    }

    #[test]
    fn test_fallback_first_keyword_wins() {
        let parsed = fallback_parse("سكر وكولا");
        assert_eq!(products(&parsed), vec!["كوكاكولا"]);
    }

    #[test]
    fn test_fallback_alternate_spellings() {
        assert_eq!(products(&fallback_parse("كيس دقيق")), vec!["طحين"]);
        assert_eq!(products(&fallback_parse("أرز مصري")), vec!["أرز"]);
    }

    #[test]
    fn test_fallback_short_free_text_becomes_product() {
        let parsed = fallback_parse("  خيار  ");
        assert_eq!(products(&parsed), vec!["خيار"]);
    }

    #[test]
    fn test_fallback_long_unmatched_query_yields_nothing() {
        let query = "ابحث لي عن أفضل عروض الخضار اليوم";
        assert!(query.chars().count() >= 20);

        let parsed = fallback_parse(query);
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.intent, Some(Intent::Cheapest));
    }

    #[test]
    fn test_fallback_single_char_yields_nothing() {
        assert!(fallback_parse("x").items.is_empty());
        assert!(fallback_parse("   ").items.is_empty());
    }

    #[test]
    fn test_fallback_size_hints() {
        assert_eq!(fallback_parse("كولا لتر ونص").items[0].size, Some(1.5));
        assert_eq!(fallback_parse("كولا 2.5 لتر").items[0].size, Some(2.5));
        assert_eq!(fallback_parse("كولا 1.5").items[0].size, None);
    }

    #[test]
    fn test_lenient_llm_payload() {
        let parsed = decode_parsed_query(
            r#"{"items":[{"product":"سكر","size":"2"}],"intent":"SOMETHING_ELSE","location":"غزة"}"#,
        )
        .unwrap();
        assert_eq!(parsed.items[0].size, Some(2.0));
        assert_eq!(parsed.intent, None);
        assert_eq!(parsed.location_filter(), Some("غزة"));

        let parsed = decode_parsed_query(r#"{"items":null}"#).unwrap();
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn test_shopping_list_detection() {
        let mut parsed = ParsedQuery::default();
        assert!(!parsed.is_shopping_list());

        parsed.intent = Some(Intent::ShoppingList);
        assert!(parsed.is_shopping_list());

        parsed.intent = Some(Intent::Cheapest);
        parsed.items = vec![QueryItem::named("سكر"), QueryItem::named("أرز")];
        assert!(parsed.is_shopping_list());
    }

    #[tokio::test]
    async fn test_without_llm_marks_not_configured() {
        let parser = QueryParser::new(None);
        let outcome = parser.parse("بدي كولا").await;
        assert_eq!(outcome.source, ParseSource::Fallback(FallbackReason::NotConfigured));
        assert_eq!(products(&outcome.query), vec!["كوكاكولا"]);
    }

    #[tokio::test]
    async fn test_llm_result_is_used() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"items":[{"product":"سكر"},{"product":"كوكاكولا"}],"intent":"SHOPPING_LIST"}"#,
        ));
        let parser = QueryParser::new(Some(llm.clone()));

        let outcome = parser.parse("بدي سكر وكولا").await;
        assert_eq!(outcome.source, ParseSource::Llm);
        assert_eq!(products(&outcome.query), vec!["سكر", "كوكاكولا"]);

        let request = &llm.requests()[0];
        assert_eq!(request.response_format, ResponseFormat::JsonObject);
        assert_eq!(request.messages[1].text(), "بدي سكر وكولا");
    }

    #[tokio::test]
    async fn test_unit_suffixed_sizes_keep_every_item() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"items":[{"product":"سكر","size":"2kg"},{"product":"كوكاكولا","size":"1.5L"}],"intent":"SHOPPING_LIST"}"#,
        ));
        let outcome = QueryParser::new(Some(llm)).parse("بدي سكر وكولا").await;

        assert_eq!(outcome.source, ParseSource::Llm);
        assert_eq!(products(&outcome.query), vec!["سكر", "كوكاكولا"]);
        assert!(outcome.query.items.iter().all(|item| item.size.is_none()));
        assert_eq!(outcome.query.intent, Some(Intent::ShoppingList));
    }

    #[tokio::test]
    async fn test_upstream_error_falls_back() {
        let llm = Arc::new(ScriptedLlm::new().fail("401 unauthorized"));
        let outcome = QueryParser::new(Some(llm)).parse("بدي كولا").await;

        assert_eq!(outcome.source, ParseSource::Fallback(FallbackReason::UpstreamError));
        assert_eq!(products(&outcome.query), vec!["كوكاكولا"]);
    }

    #[tokio::test]
    async fn test_malformed_content_falls_back() {
        let llm = Arc::new(ScriptedLlm::new().reply("not json"));
        let outcome = QueryParser::new(Some(llm)).parse("بدي كولا").await;

        assert_eq!(
            outcome.source,
            ParseSource::Fallback(FallbackReason::MalformedResponse)
        );
        assert!(outcome.source.is_degraded());
    }

    #[tokio::test]
    async fn test_empty_content_is_empty_query() {
        let llm = Arc::new(ScriptedLlm::new().reply(""));
        let outcome = QueryParser::new(Some(llm)).parse("بدي كولا").await;

        assert_eq!(outcome.source, ParseSource::Llm);
        assert_eq!(outcome.query, ParsedQuery::default());
    }
}
