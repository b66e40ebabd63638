//! Submission Service - crowd-sourced price reports
//!
//! Product and store are resolved by substring match and created when absent,
//! then a new price record is always appended. The steps are separate writes;
//! a failure after the upserts leaves the product/store rows in place.

use crate::db::models::UNSPECIFIED_CITY;
use crate::db::{Catalog, NewPrice, PriceMatch, ProductWithPrices};
use crate::errors::Result;
use crate::metrics;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Unit recorded when none is given
pub const DEFAULT_UNIT: &str = "piece";

/// A reported price
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[validate(length(min = 1, max = 500))]
    pub product_name: String,

    #[validate(range(min = 0.0))]
    pub price: f64,

    #[validate(length(min = 1, max = 500))]
    pub store_name: String,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub unit: Option<String>,
}

impl Submission {
    fn location(&self) -> Option<&str> {
        self.location.as_deref().filter(|l| !l.is_empty())
    }

    fn unit(&self) -> &str {
        self.unit
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_UNIT)
    }
}

pub struct SubmissionService {
    catalog: Arc<dyn Catalog>,
}

impl SubmissionService {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Record a submission and return the new price with its product and store
    pub async fn submit(&self, submission: Submission) -> Result<PriceMatch> {
        submission.validate()?;

        let (product, created_product) =
            match self.catalog.find_product_by_name(&submission.product_name).await? {
                Some(product) => (product, false),
                None => (self.catalog.create_product(&submission.product_name).await?, true),
            };

        let (store, created_store) =
            match self.catalog.find_store_by_name(&submission.store_name).await? {
                None => {
                    let city = submission.location().unwrap_or(UNSPECIFIED_CITY);
                    (self.catalog.create_store(&submission.store_name, city).await?, true)
                }
                Some(store) => match submission.location() {
                    Some(city) if store.has_unspecified_city() => {
                        info!(store_id = store.id, city = city, "Filling in store city");
                        (self.catalog.update_store_city(store.id, city).await?, false)
                    }
                    _ => (store, false),
                },
            };

        let record = self
            .catalog
            .insert_price(NewPrice {
                product_id: product.id,
                store_id: store.id,
                price: submission.price,
                unit: submission.unit(),
                observed_at: Utc::now(),
            })
            .await?;

        metrics::record_submission(created_product, created_store);
        info!(
            price_id = record.id,
            product_id = product.id,
            store_id = store.id,
            created_product = created_product,
            created_store = created_store,
            "Recorded price submission"
        );

        Ok(PriceMatch {
            record,
            product,
            store,
        })
    }

    /// Every product ordered by name, with its prices newest first
    pub async fn list_products(&self) -> Result<Vec<ProductWithPrices>> {
        self.catalog.products_with_prices().await
    }
}
