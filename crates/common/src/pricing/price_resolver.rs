//! Price Resolver - catalog lookup for a single query item

use super::query_parser::QueryItem;
use crate::db::{Catalog, PriceMatch};
use crate::errors::Result;
use std::sync::Arc;
use tracing::debug;

/// Upper bound on results per item
pub const MAX_RESULTS: u64 = 5;

#[derive(Clone)]
pub struct PriceResolver {
    catalog: Arc<dyn Catalog>,
}

impl PriceResolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Cheapest matches for the item, at most [`MAX_RESULTS`]
    pub async fn resolve(&self, item: &QueryItem, location: Option<&str>) -> Result<Vec<PriceMatch>> {
        self.resolve_product(item.product.as_deref().unwrap_or_default(), location)
            .await
    }

    /// Cheapest matches for a raw product fragment; empty fragment matches nothing
    pub async fn resolve_product(&self, product: &str, location: Option<&str>) -> Result<Vec<PriceMatch>> {
        if product.is_empty() {
            return Ok(Vec::new());
        }

        let location = location.filter(|l| !l.is_empty());
        let results = self.catalog.find_prices(product, location, MAX_RESULTS).await?;

        debug!(
            product = product,
            location = location,
            results = results.len(),
            "Resolved prices"
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCatalog;

    fn catalog_with_prices(prices: &[f64]) -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new());
        let onion = catalog.add_product("بصل أحمر", None);
        for (i, price) in prices.iter().enumerate() {
            let store = catalog.add_store(&format!("متجر {}", i), "غزة", None);
            catalog.add_price(onion.id, store.id, *price, "KG");
        }
        catalog
    }

    #[tokio::test]
    async fn test_caps_results_and_sorts_ascending() {
        let catalog = catalog_with_prices(&[9.0, 4.0, 7.5, 4.0, 12.0, 3.0, 8.0]);
        let resolver = PriceResolver::new(catalog);

        let results = resolver.resolve(&QueryItem::named("بصل"), None).await.unwrap();
        assert_eq!(results.len(), MAX_RESULTS as usize);
        assert!(results
            .windows(2)
            .all(|pair| pair[0].record.price <= pair[1].record.price));
        assert_eq!(results[0].record.price, 3.0);
    }

    #[tokio::test]
    async fn test_missing_product_returns_empty_without_lookup() {
        let catalog = catalog_with_prices(&[1.0]);
        let before = catalog.accesses();
        let resolver = PriceResolver::new(catalog.clone());

        assert!(resolver.resolve(&QueryItem::default(), None).await.unwrap().is_empty());
        assert!(resolver.resolve(&QueryItem::named(""), Some("غزة")).await.unwrap().is_empty());
        assert_eq!(catalog.accesses(), before);
    }

    #[tokio::test]
    async fn test_location_filters_store_city() {
        let catalog = catalog_with_prices(&[5.0]);
        let onion_id = 1;
        let rafah = catalog.add_store("بقالة رفح", "رفح", None);
        catalog.add_price(onion_id, rafah.id, 6.0, "KG");
        let resolver = PriceResolver::new(catalog);

        let results = resolver.resolve(&QueryItem::named("بصل"), Some("رفح")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].store.city, "رفح");

        // Blank location is ignored
        let results = resolver.resolve(&QueryItem::named("بصل"), Some("")).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
