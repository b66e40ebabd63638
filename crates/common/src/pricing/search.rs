//! Search service - parse, resolve, annotate and summarize
//!
//! A query with one item yields a ranked result list; a shopping list yields
//! the best deal and two alternatives per item with an estimated total.

use super::anomaly::{annotate, AnnotatedPrice};
use super::price_resolver::PriceResolver;
use super::query_parser::{Intent, ParsedQuery, QueryItem, QueryParser};
use super::summary::{shopping_list_summary, summarize};
use crate::db::Catalog;
use crate::errors::Result;
use crate::metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Fixed confidence reported with single-item results
pub const SEARCH_CONFIDENCE: f64 = 0.95;

/// Alternatives shown per shopping-list item
const MAX_ALTERNATIVES: usize = 2;

/// Maximum autocomplete suggestions
pub const MAX_SUGGESTIONS: u64 = 10;

/// Fragments shorter than this get no suggestions
const MIN_SUGGESTION_CHARS: usize = 2;

/// Search response envelope
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Single(SingleSearch),
    ShoppingList(ShoppingListSearch),
}

#[derive(Debug, Clone, Serialize)]
pub struct SingleSearch {
    pub query: String,
    pub parsed_query: ParsedQuery,
    pub results: Vec<AnnotatedPrice>,
    pub ai_summary: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListSearch {
    pub parsed_query: ParsedQuery,
    /// Always `SHOPPING_LIST`
    #[serde(rename = "type")]
    pub kind: Intent,
    pub list: Vec<ShoppingListEntry>,
    pub ai_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListEntry {
    pub item: QueryItem,
    pub best_deal: Option<AnnotatedPrice>,
    pub alternatives: Vec<AnnotatedPrice>,
}

impl ShoppingListEntry {
    fn from_results(item: QueryItem, results: Vec<AnnotatedPrice>) -> Self {
        let mut results = results.into_iter();
        let best_deal = results.next();
        let alternatives = results.take(MAX_ALTERNATIVES).collect();
        Self {
            item,
            best_deal,
            alternatives,
        }
    }
}

pub struct SearchService {
    parser: Arc<QueryParser>,
    resolver: PriceResolver,
    catalog: Arc<dyn Catalog>,
}

impl SearchService {
    pub fn new(parser: Arc<QueryParser>, resolver: PriceResolver, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            parser,
            resolver,
            catalog,
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        let start = Instant::now();
        info!(query = query, "Received search query");

        let outcome = self.parser.parse(query).await;
        let parsed = outcome.query;

        let response = if parsed.is_shopping_list() {
            let list = self.shopping_list(parsed).await?;
            let found = list.list.iter().filter(|e| e.best_deal.is_some()).count();
            metrics::record_search(start.elapsed().as_secs_f64(), "shopping_list", found);
            SearchResponse::ShoppingList(list)
        } else {
            let item = parsed.items.first().cloned().unwrap_or_default();
            let results = annotate(self.resolver.resolve(&item, parsed.location_filter()).await?);
            let ai_summary = summarize(&results);
            metrics::record_search(start.elapsed().as_secs_f64(), "single", results.len());

            SearchResponse::Single(SingleSearch {
                query: query.to_string(),
                parsed_query: parsed,
                results,
                ai_summary,
                confidence: SEARCH_CONFIDENCE,
            })
        };

        Ok(response)
    }

    async fn shopping_list(&self, parsed: ParsedQuery) -> Result<ShoppingListSearch> {
        let mut list = Vec::with_capacity(parsed.items.len());
        for item in &parsed.items {
            let results = annotate(self.resolver.resolve(item, parsed.location_filter()).await?);
            list.push(ShoppingListEntry::from_results(item.clone(), results));
        }

        let total: f64 = list
            .iter()
            .filter_map(|entry| entry.best_deal.as_ref())
            .map(|best| best.price.record.price)
            .sum();

        Ok(ShoppingListSearch {
            parsed_query: parsed,
            kind: Intent::ShoppingList,
            list,
            ai_summary: shopping_list_summary(total),
        })
    }

    /// Distinct product names containing the fragment, ordered by name
    pub async fn suggestions(&self, fragment: &str) -> Result<Vec<String>> {
        if fragment.chars().count() < MIN_SUGGESTION_CHARS {
            return Ok(Vec::new());
        }
        self.catalog
            .product_name_suggestions(fragment, MAX_SUGGESTIONS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCatalog;
    use crate::llm::ScriptedLlm;
    use serde_json::Value;

    fn seeded() -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new());
        let cola = catalog.add_product("كوكاكولا", Some("Coca-Cola"));
        let sugar = catalog.add_product("سكر 1 كجم", None);
        let rice = catalog.add_product("أرز مصري", None);
        let a = catalog.add_store("سوبر ماركت أبو طلال", "خانيونس", None);
        let b = catalog.add_store("محلات الأمل", "غزة", Some("الرمال"));
        let c = catalog.add_store("بقالة النور", "رفح", None);
        catalog.add_price(cola.id, a.id, 6.0, "L");
        catalog.add_price(cola.id, b.id, 6.5, "L");
        catalog.add_price(cola.id, c.id, 7.0, "L");
        catalog.add_price(sugar.id, b.id, 5.0, "KG");
        catalog.add_price(rice.id, c.id, 8.0, "KG");
        catalog
    }

    fn service(catalog: Arc<MemoryCatalog>, llm: Option<Arc<ScriptedLlm>>) -> SearchService {
        let parser = QueryParser::new(llm.map(|l| l as Arc<dyn crate::llm::LlmGateway>));
        SearchService::new(
            Arc::new(parser),
            PriceResolver::new(catalog.clone()),
            catalog,
        )
    }

    #[tokio::test]
    async fn test_single_item_search() {
        let search = service(seeded(), None);

        let response = search.search("بدي كولا").await.unwrap();
        let SearchResponse::Single(single) = response else {
            panic!("expected single-item response");
        };

        assert_eq!(single.results.len(), 3);
        assert_eq!(single.results[0].price.store.name, "سوبر ماركت أبو طلال");
        assert!(single.ai_summary.starts_with("أفضل سعر متوفر هو 6 شيكل"));
        assert_eq!(single.confidence, SEARCH_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_single_item_wire_shape() {
        let search = service(seeded(), None);
        let value = serde_json::to_value(search.search("سكر").await.unwrap()).unwrap();

        assert_eq!(value["query"], "سكر");
        assert_eq!(value["parsed_query"]["intent"], "CHEAPEST");
        assert_eq!(value["results"][0]["price"], 5.0);
        assert_eq!(value["results"][0]["is_suspicious"], false);
        assert_eq!(value["results"][0]["store"]["city"], "غزة");
        assert!(value["results"][0].get("productId").is_some());
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let search = service(seeded(), None);
        let SearchResponse::Single(single) = search.search("زعتر").await.unwrap() else {
            panic!("expected single-item response");
        };
        assert!(single.results.is_empty());
        assert_eq!(single.ai_summary, "لم أجد نتائج مطابقة لطلبك حالياً.");
    }

    #[tokio::test]
    async fn test_shopping_list_search() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"items":[{"product":"كوكاكولا"},{"product":"أرز"},{"product":"زعتر"}],"intent":"SHOPPING_LIST"}"#,
        ));
        let search = service(seeded(), Some(llm));

        let response = search.search("كولا ورز وزعتر").await.unwrap();
        let value = serde_json::to_value(&response).unwrap();
        let SearchResponse::ShoppingList(list) = response else {
            panic!("expected shopping list");
        };

        assert_eq!(list.list.len(), 3);
        assert_eq!(list.list[0].alternatives.len(), 2);
        assert!(list.list[2].best_deal.is_none());
        assert!(list.ai_summary.contains("14 شيكل"));

        assert_eq!(value["type"], "SHOPPING_LIST");
        assert_eq!(value["list"][2]["best_deal"], Value::Null);
        assert!(value.get("confidence").is_none());
    }

    #[tokio::test]
    async fn test_suggestions() {
        let catalog = seeded();
        catalog.add_product("كوكاكولا", None);
        let search = service(catalog, None);

        assert_eq!(search.suggestions("كو").await.unwrap(), vec!["كوكاكولا".to_string()]);
        assert!(search.suggestions("ك").await.unwrap().is_empty());
        assert!(search.suggestions("").await.unwrap().is_empty());
    }
}
