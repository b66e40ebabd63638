//! PostgreSQL catalog backed by SeaORM
//!
//! Substring matching is expressed as `LIKE '%fragment%'` with wildcard
//! characters in the fragment escaped, so user text never acts as a pattern.

use crate::db::catalog::{Catalog, NewPrice, PriceMatch, PriceWithStore, ProductWithPrices};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::LikeExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::HashMap;

/// Repository for catalog data access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Attach products and stores to a page of price records, preserving order
    async fn hydrate(&self, records: Vec<PriceRecord>) -> Result<Vec<PriceMatch>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<i32> = records.iter().map(|r| r.product_id).collect();
        let store_ids: Vec<i32> = records.iter().map(|r| r.store_id).collect();

        let products: HashMap<i32, Product> = ProductEntity::find()
            .filter(ProductColumn::Id.is_in(product_ids))
            .all(self.conn())
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let stores: HashMap<i32, Store> = StoreEntity::find()
            .filter(StoreColumn::Id.is_in(store_ids))
            .all(self.conn())
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        records
            .into_iter()
            .map(|record| -> Result<PriceMatch> {
                let product = products
                    .get(&record.product_id)
                    .cloned()
                    .ok_or(AppError::ProductNotFound { id: record.product_id })?;
                let store = stores
                    .get(&record.store_id)
                    .cloned()
                    .ok_or(AppError::StoreNotFound { id: record.store_id })?;
                Ok(PriceMatch { record, product, store })
            })
            .collect()
    }
}

/// Escape LIKE metacharacters so the fragment matches literally
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `%fragment%` with the fragment escaped
fn contains_pattern(fragment: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(fragment))).escape('\\')
}

#[async_trait]
impl Catalog for Repository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    async fn find_prices(
        &self,
        product: &str,
        location: Option<&str>,
        limit: u64,
    ) -> Result<Vec<PriceMatch>> {
        let mut query = PriceRecordEntity::find()
            .inner_join(ProductEntity)
            .filter(ProductColumn::Name.like(contains_pattern(product)));

        if let Some(location) = location {
            query = query
                .inner_join(StoreEntity)
                .filter(StoreColumn::City.like(contains_pattern(location)));
        }

        let records = query
            .order_by_asc(PriceRecordColumn::Price)
            .order_by_asc(PriceRecordColumn::Id)
            .limit(limit)
            .all(self.conn())
            .await?;

        self.hydrate(records).await
    }

    async fn product_name_suggestions(&self, fragment: &str, limit: u64) -> Result<Vec<String>> {
        ProductEntity::find()
            .select_only()
            .column(ProductColumn::Name)
            .distinct()
            .filter(ProductColumn::Name.like(contains_pattern(fragment)))
            .order_by_asc(ProductColumn::Name)
            .limit(limit)
            .into_tuple::<String>()
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn find_stores_by_name(&self, fragment: &str) -> Result<Vec<Store>> {
        StoreEntity::find()
            .filter(StoreColumn::Name.like(contains_pattern(fragment)))
            .order_by_asc(StoreColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn find_product_by_name(&self, fragment: &str) -> Result<Option<Product>> {
        ProductEntity::find()
            .filter(ProductColumn::Name.like(contains_pattern(fragment)))
            .order_by_asc(ProductColumn::Id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn create_product(&self, name: &str) -> Result<Product> {
        let product = ProductActiveModel {
            name: Set(name.to_string()),
            brand: Set(None),
            ..Default::default()
        };

        product.insert(self.conn()).await.map_err(Into::into)
    }

    async fn find_store_by_name(&self, fragment: &str) -> Result<Option<Store>> {
        StoreEntity::find()
            .filter(StoreColumn::Name.like(contains_pattern(fragment)))
            .order_by_asc(StoreColumn::Id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn create_store(&self, name: &str, city: &str) -> Result<Store> {
        let store = StoreActiveModel {
            name: Set(name.to_string()),
            city: Set(city.to_string()),
            district: Set(None),
            ..Default::default()
        };

        store.insert(self.conn()).await.map_err(Into::into)
    }

    async fn update_store_city(&self, store_id: i32, city: &str) -> Result<Store> {
        let mut store: StoreActiveModel = StoreEntity::find_by_id(store_id)
            .one(self.conn())
            .await?
            .ok_or(AppError::StoreNotFound { id: store_id })?
            .into();

        store.city = Set(city.to_string());
        store.update(self.conn()).await.map_err(Into::into)
    }

    async fn insert_price(&self, price: NewPrice<'_>) -> Result<PriceRecord> {
        let record = PriceRecordActiveModel {
            product_id: Set(price.product_id),
            store_id: Set(price.store_id),
            price: Set(price.price),
            unit: Set(price.unit.to_string()),
            updated_at: Set(price.observed_at.into()),
            ..Default::default()
        };

        record.insert(self.conn()).await.map_err(Into::into)
    }

    async fn products_with_prices(&self) -> Result<Vec<ProductWithPrices>> {
        let products = ProductEntity::find()
            .order_by_asc(ProductColumn::Name)
            .order_by_asc(ProductColumn::Id)
            .all(self.conn())
            .await?;

        let mut aliases: HashMap<i32, Vec<String>> = HashMap::new();
        for alias in ProductAliasEntity::find()
            .order_by_asc(ProductAliasColumn::Id)
            .all(self.conn())
            .await?
        {
            aliases.entry(alias.product_id).or_default().push(alias.alias);
        }

        let mut prices: HashMap<i32, Vec<PriceWithStore>> = HashMap::new();
        for (record, store) in PriceRecordEntity::find()
            .find_also_related(StoreEntity)
            .order_by_desc(PriceRecordColumn::UpdatedAt)
            .order_by_desc(PriceRecordColumn::Id)
            .all(self.conn())
            .await?
        {
            let store = store.ok_or(AppError::StoreNotFound { id: record.store_id })?;
            prices
                .entry(record.product_id)
                .or_default()
                .push(PriceWithStore { record, store });
        }

        Ok(products
            .into_iter()
            .map(|product| ProductWithPrices {
                aliases: aliases.remove(&product.id).unwrap_or_default(),
                prices: prices.remove(&product.id).unwrap_or_default(),
                product,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{Alias, Expr, PostgresQueryBuilder, Query};

    fn render(fragment: &str) -> String {
        Query::select()
            .column(Alias::new("name"))
            .from(Alias::new("products"))
            .and_where(Expr::col(Alias::new("name")).like(contains_pattern(fragment)))
            .to_string(PostgresQueryBuilder)
    }

    #[test]
    fn test_contains_pattern_wraps_fragment() {
        let sql = render("سكر");
        assert!(sql.contains("LIKE '%سكر%'"), "{sql}");
    }

    #[test]
    fn test_escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("كوكاكولا"), "كوكاكولا");
    }

    #[test]
    fn test_contains_pattern_declares_escape() {
        assert!(render("50%").contains("ESCAPE"));
    }
}
