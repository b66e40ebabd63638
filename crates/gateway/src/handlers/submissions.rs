//! Price submission handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::AppState;
use pricelens_common::{
    db::{PriceMatch, ProductWithPrices},
    errors::Result,
    pricing::Submission,
};

/// Record a reported price
pub async fn create_submission(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> Result<(StatusCode, Json<PriceMatch>)> {
    let created = state.services.submissions.submit(submission).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// All products with their price history
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<ProductWithPrices>>> {
    let products = state.services.submissions.list_products().await?;
    Ok(Json(products))
}
