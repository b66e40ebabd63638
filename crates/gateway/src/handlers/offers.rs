//! Offer extraction handlers

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::AppState;
use pricelens_common::{errors::Result, pricing::OfferExtraction};

#[derive(Debug, Deserialize)]
pub struct ParseImageRequest {
    /// Raw base64 or a `data:` URL
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct ParseTextRequest {
    #[serde(default)]
    pub text: String,
}

pub async fn parse_image(
    State(state): State<AppState>,
    Json(request): Json<ParseImageRequest>,
) -> Result<Json<OfferExtraction>> {
    let offer = state.services.offers.extract_from_image(&request.image).await?;
    Ok(Json(offer))
}

pub async fn parse_text(
    State(state): State<AppState>,
    Json(request): Json<ParseTextRequest>,
) -> Result<Json<OfferExtraction>> {
    let offer = state.services.offers.extract_from_text(&request.text).await?;
    Ok(Json(offer))
}
