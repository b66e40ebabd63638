//! In-process catalog
//!
//! Same matching semantics as the PostgreSQL repository (case-sensitive
//! substring containment, cheapest first, ties in insertion order), held in
//! memory. Backs the `memory://` database URL and the test suites.

use crate::db::catalog::{Catalog, NewPrice, PriceMatch, PriceWithStore, ProductWithPrices};
use crate::db::models::{PriceRecord, Product, ProductAlias, Store};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    aliases: Vec<ProductAlias>,
    stores: Vec<Store>,
    prices: Vec<PriceRecord>,
}

/// Row counts, for assertions and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogCounts {
    pub products: usize,
    pub stores: usize,
    pub prices: usize,
}

/// Catalog held entirely in memory
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<Tables>,
    accesses: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of catalog operations served so far
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::Relaxed)
    }

    pub fn counts(&self) -> CatalogCounts {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        CatalogCounts {
            products: tables.products.len(),
            stores: tables.stores.len(),
            prices: tables.prices.len(),
        }
    }

    /// Insert a product directly
    pub fn add_product(&self, name: &str, brand: Option<&str>) -> Product {
        let mut tables = self.write();
        let product = Product {
            id: tables.products.len() as i32 + 1,
            name: name.to_string(),
            brand: brand.map(str::to_string),
        };
        tables.products.push(product.clone());
        product
    }

    /// Attach an alias to an existing product
    pub fn add_alias(&self, product_id: i32, alias: &str) -> ProductAlias {
        let mut tables = self.write();
        let alias = ProductAlias {
            id: tables.aliases.len() as i32 + 1,
            product_id,
            alias: alias.to_string(),
        };
        tables.aliases.push(alias.clone());
        alias
    }

    /// Insert a store directly
    pub fn add_store(&self, name: &str, city: &str, district: Option<&str>) -> Store {
        let mut tables = self.write();
        let store = Store {
            id: tables.stores.len() as i32 + 1,
            name: name.to_string(),
            city: city.to_string(),
            district: district.map(str::to_string),
        };
        tables.stores.push(store.clone());
        store
    }

    /// Insert a price observed now
    pub fn add_price(&self, product_id: i32, store_id: i32, price: f64, unit: &str) -> PriceRecord {
        let mut tables = self.write();
        push_price(
            &mut tables,
            NewPrice {
                product_id,
                store_id,
                price,
                unit,
                observed_at: Utc::now(),
            },
        )
    }
}

fn push_price(tables: &mut Tables, price: NewPrice<'_>) -> PriceRecord {
    let record = PriceRecord {
        id: tables.prices.len() as i32 + 1,
        product_id: price.product_id,
        store_id: price.store_id,
        price: price.price,
        unit: price.unit.to_string(),
        updated_at: price.observed_at.into(),
    };
    tables.prices.push(record.clone());
    record
}

impl Tables {
    fn product(&self, id: i32) -> Result<&Product> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .ok_or(AppError::ProductNotFound { id })
    }

    fn store(&self, id: i32) -> Result<&Store> {
        self.stores
            .iter()
            .find(|s| s.id == id)
            .ok_or(AppError::StoreNotFound { id })
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn ping(&self) -> Result<()> {
        let _tables = self.read();
        Ok(())
    }

    async fn find_prices(
        &self,
        product: &str,
        location: Option<&str>,
        limit: u64,
    ) -> Result<Vec<PriceMatch>> {
        let tables = self.read();

        let mut matches = Vec::new();
        for record in &tables.prices {
            let product_row = tables.product(record.product_id)?;
            if !product_row.name.contains(product) {
                continue;
            }
            let store_row = tables.store(record.store_id)?;
            if let Some(location) = location {
                if !store_row.city.contains(location) {
                    continue;
                }
            }
            matches.push(PriceMatch {
                record: record.clone(),
                product: product_row.clone(),
                store: store_row.clone(),
            });
        }

        // Stable sort keeps insertion order among equal prices
        matches.sort_by(|a, b| a.record.price.total_cmp(&b.record.price));
        matches.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(matches)
    }

    async fn product_name_suggestions(&self, fragment: &str, limit: u64) -> Result<Vec<String>> {
        let tables = self.read();
        let names: BTreeSet<&str> = tables
            .products
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| name.contains(fragment))
            .collect();

        Ok(names
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(str::to_string)
            .collect())
    }

    async fn find_stores_by_name(&self, fragment: &str) -> Result<Vec<Store>> {
        let tables = self.read();
        Ok(tables
            .stores
            .iter()
            .filter(|s| s.name.contains(fragment))
            .cloned()
            .collect())
    }

    async fn find_product_by_name(&self, fragment: &str) -> Result<Option<Product>> {
        let tables = self.read();
        Ok(tables
            .products
            .iter()
            .find(|p| p.name.contains(fragment))
            .cloned())
    }

    async fn create_product(&self, name: &str) -> Result<Product> {
        Ok(self.add_product(name, None))
    }

    async fn find_store_by_name(&self, fragment: &str) -> Result<Option<Store>> {
        let tables = self.read();
        Ok(tables
            .stores
            .iter()
            .find(|s| s.name.contains(fragment))
            .cloned())
    }

    async fn create_store(&self, name: &str, city: &str) -> Result<Store> {
        Ok(self.add_store(name, city, None))
    }

    async fn update_store_city(&self, store_id: i32, city: &str) -> Result<Store> {
        let mut tables = self.write();
        let store = tables
            .stores
            .iter_mut()
            .find(|s| s.id == store_id)
            .ok_or(AppError::StoreNotFound { id: store_id })?;
        store.city = city.to_string();
        Ok(store.clone())
    }

    async fn insert_price(&self, price: NewPrice<'_>) -> Result<PriceRecord> {
        let mut tables = self.write();
        tables.product(price.product_id)?;
        tables.store(price.store_id)?;
        Ok(push_price(&mut tables, price))
    }

    async fn products_with_prices(&self) -> Result<Vec<ProductWithPrices>> {
        let tables = self.read();

        let mut products: Vec<&Product> = tables.products.iter().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        products
            .into_iter()
            .map(|product| -> Result<ProductWithPrices> {
                let aliases = tables
                    .aliases
                    .iter()
                    .filter(|a| a.product_id == product.id)
                    .map(|a| a.alias.clone())
                    .collect();

                let mut prices = tables
                    .prices
                    .iter()
                    .filter(|r| r.product_id == product.id)
                    .map(|record| -> Result<PriceWithStore> {
                        Ok(PriceWithStore {
                            record: record.clone(),
                            store: tables.store(record.store_id)?.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                prices.sort_by(|a, b| {
                    b.record
                        .updated_at
                        .cmp(&a.record.updated_at)
                        .then(b.record.id.cmp(&a.record.id))
                });

                Ok(ProductWithPrices {
                    product: product.clone(),
                    aliases,
                    prices,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        let cola = catalog.add_product("كوكاكولا", Some("Coca-Cola"));
        let sugar = catalog.add_product("سكر 1 كجم", None);
        let khan_yunis = catalog.add_store("سوبر ماركت أبو طلال", "خانيونس", None);
        let gaza = catalog.add_store("محلات الأمل", "غزة", Some("الرمال"));
        catalog.add_price(cola.id, gaza.id, 6.5, "L");
        catalog.add_price(cola.id, khan_yunis.id, 6.0, "L");
        catalog.add_price(sugar.id, gaza.id, 5.0, "KG");
        catalog
    }

    #[tokio::test]
    async fn test_find_prices_orders_by_price() {
        let catalog = seeded();
        let results = catalog.find_prices("كولا", None, 5).await.unwrap();
        let prices: Vec<f64> = results.iter().map(|r| r.record.price).collect();
        assert_eq!(prices, vec![6.0, 6.5]);
        assert_eq!(results[0].store.city, "خانيونس");
    }

    #[tokio::test]
    async fn test_find_prices_filters_by_city_substring() {
        let catalog = seeded();
        let results = catalog.find_prices("كولا", Some("غز"), 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].store.name, "محلات الأمل");
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let catalog = MemoryCatalog::new();
        let bread = catalog.add_product("خبز", None);
        let a = catalog.add_store("أ", "غزة", None);
        let b = catalog.add_store("ب", "غزة", None);
        let first = catalog.add_price(bread.id, b.id, 3.0, "piece");
        let second = catalog.add_price(bread.id, a.id, 3.0, "piece");

        let results = catalog.find_prices("خبز", None, 5).await.unwrap();
        assert_eq!(results[0].record.id, first.id);
        assert_eq!(results[1].record.id, second.id);
    }

    #[tokio::test]
    async fn test_suggestions_are_distinct_and_sorted() {
        let catalog = seeded();
        catalog.add_product("كوكاكولا", None);
        catalog.add_product("كولا زيرو", None);

        let names = catalog.product_name_suggestions("كولا", 10).await.unwrap();
        assert_eq!(names, vec!["كوكاكولا".to_string(), "كولا زيرو".to_string()]);
    }

    #[tokio::test]
    async fn test_products_with_prices_newest_first() {
        let catalog = seeded();
        let cola_id = catalog.find_product_by_name("كولا").await.unwrap().unwrap().id;
        catalog.add_alias(cola_id, "كولا");

        let products = catalog.products_with_prices().await.unwrap();
        let cola = products.iter().find(|p| p.product.id == cola_id).unwrap();
        assert_eq!(cola.aliases, vec!["كولا".to_string()]);
        assert_eq!(cola.prices.len(), 2);
        assert!(cola.prices[0].record.id > cola.prices[1].record.id);
    }

    #[tokio::test]
    async fn test_insert_price_requires_existing_rows() {
        let catalog = MemoryCatalog::new();
        let err = catalog
            .insert_price(NewPrice {
                product_id: 42,
                store_id: 1,
                price: 1.0,
                unit: "piece",
                observed_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProductNotFound { id: 42 }));
    }
}
