//! Search and autocomplete handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::AppState;
use pricelens_common::{errors::Result, pricing::SearchResponse};

/// `?q=` parameter; absent is treated as empty
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub q: String,
}

/// Free-text price search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<SearchResponse>> {
    let response = state.services.search.search(&params.q).await?;
    Ok(Json(response))
}

/// Product name suggestions
pub async fn suggestions(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<String>>> {
    let names = state.services.search.suggestions(&params.q).await?;
    Ok(Json(names))
}
