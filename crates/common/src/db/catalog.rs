//! Catalog store abstraction
//!
//! Every name lookup here is substring containment, never equality, so a
//! single fragment may match several rows. Callers treat that as intended
//! fuzziness.

use crate::db::models::{PriceRecord, Product, Store};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A price record joined with its product and store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMatch {
    #[serde(flatten)]
    pub record: PriceRecord,
    pub product: Product,
    pub store: Store,
}

/// A price record joined with its store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceWithStore {
    #[serde(flatten)]
    pub record: PriceRecord,
    pub store: Store,
}

/// A product with its aliases and full price history, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductWithPrices {
    #[serde(flatten)]
    pub product: Product,
    pub aliases: Vec<String>,
    pub prices: Vec<PriceWithStore>,
}

/// Values for a new price record
#[derive(Debug, Clone)]
pub struct NewPrice<'a> {
    pub product_id: i32,
    pub store_id: i32,
    pub price: f64,
    pub unit: &'a str,
    pub observed_at: DateTime<Utc>,
}

/// Read/write access to products, stores and prices
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Check that the backing store is reachable
    async fn ping(&self) -> Result<()>;

    /// Prices whose product name contains `product` and, when given, whose
    /// store city contains `location`; cheapest first, ties in insertion
    /// order, at most `limit` rows
    async fn find_prices(
        &self,
        product: &str,
        location: Option<&str>,
        limit: u64,
    ) -> Result<Vec<PriceMatch>>;

    /// Distinct product names containing `fragment`, ordered by name
    async fn product_name_suggestions(&self, fragment: &str, limit: u64) -> Result<Vec<String>>;

    /// Stores whose name contains `fragment`
    async fn find_stores_by_name(&self, fragment: &str) -> Result<Vec<Store>>;

    /// First product (by id) whose name contains `fragment`
    async fn find_product_by_name(&self, fragment: &str) -> Result<Option<Product>>;

    async fn create_product(&self, name: &str) -> Result<Product>;

    /// First store (by id) whose name contains `fragment`
    async fn find_store_by_name(&self, fragment: &str) -> Result<Option<Store>>;

    async fn create_store(&self, name: &str, city: &str) -> Result<Store>;

    async fn update_store_city(&self, store_id: i32, city: &str) -> Result<Store>;

    async fn insert_price(&self, price: NewPrice<'_>) -> Result<PriceRecord>;

    /// All products ordered by name, each with its price history
    async fn products_with_prices(&self) -> Result<Vec<ProductWithPrices>>;
}
