//! Offer Extractor - structured offers from text or images
//!
//! Unlike query parsing there is no fallback: a missing LLM, an upstream
//! failure and malformed output all surface as errors.

use super::lenient;
use crate::errors::{AppError, Result};
use crate::llm::{ChatMessage, CompletionRequest, LlmGateway};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

const EXTRACTION_RULES: &str = r#"RULES:
- Keep each product name EXACTLY as written.
- Identify the store name.
- LOCATION: return the FULL address/location string as written (e.g. "Khan Yunis, Sea St, West of Jasser Bldg"); never shorten it to the city.
- Read Gaza dialect prices and units ("بـ 35" means 35 ILS).
- QUANTITY DEALS: for multi-item offers such as "5 for 10", compute the single-unit price (10/5 = 2). Set "price" to 2 and "unit" to "piece (Deal: 5 for 10)".

Respond with a JSON object only:
{
  "storeName": "string or null",
  "location": "string or null",
  "items": [
    {"productName": "string", "price": number, "unit": "string or null"}
  ]
}
Write product, store and location names in Arabic."#;

const TEXT_PREAMBLE: &str = "Extract products, prices and store details from this text offer.";

const IMAGE_PREAMBLE: &str = "Extract products, prices and store details from this image.
- \"جمبري\" is shrimp and \"لحم\" is meat; do not confuse them.";

/// Media type assumed for raw base64 payloads
const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// Offer data read from a flyer, photo or message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferExtraction {
    #[serde(default)]
    pub store_name: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub items: Vec<OfferItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferItem {
    pub product_name: String,

    #[serde(deserialize_with = "lenient::number")]
    pub price: f64,

    #[serde(default)]
    pub unit: Option<String>,
}

pub struct OfferExtractor {
    llm: Option<Arc<dyn LlmGateway>>,
}

impl OfferExtractor {
    pub fn new(llm: Option<Arc<dyn LlmGateway>>) -> Self {
        Self { llm }
    }

    fn llm(&self) -> Result<&dyn LlmGateway> {
        self.llm.as_deref().ok_or(AppError::LlmNotConfigured)
    }

    pub async fn extract_from_text(&self, text: &str) -> Result<OfferExtraction> {
        let llm = self.llm()?;
        if text.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Offer text must not be empty".to_string(),
                field: Some("text".to_string()),
            });
        }

        let request = CompletionRequest::new("parse_offer_text")
            .message(ChatMessage::system(format!("{}\n{}", TEXT_PREAMBLE, EXTRACTION_RULES)))
            .message(ChatMessage::user(text))
            .json();

        self.extract(llm, request).await
    }

    /// Accepts raw base64 or a complete `data:` URL
    pub async fn extract_from_image(&self, image: &str) -> Result<OfferExtraction> {
        let llm = self.llm()?;
        let image_url = image_data_url(image)?;

        let request = CompletionRequest::new("parse_offer_image")
            .message(ChatMessage::user_with_image(
                format!("{}\n{}", IMAGE_PREAMBLE, EXTRACTION_RULES),
                image_url,
            ))
            .json();

        self.extract(llm, request).await
    }

    async fn extract(&self, llm: &dyn LlmGateway, request: CompletionRequest) -> Result<OfferExtraction> {
        let operation = request.operation;

        let content = llm.complete(request).await.map_err(|e| {
            error!(operation = operation, error = %e, "AI offer parsing failed");
            e
        })?;

        let offer = decode_offer(&content).map_err(|e| {
            error!(operation = operation, error = %e, "AI offer parsing returned malformed JSON");
            AppError::from(e)
        })?;

        info!(
            operation = operation,
            items = offer.items.len(),
            store = offer.store_name.as_deref().unwrap_or(""),
            "Extracted offer"
        );

        Ok(offer)
    }
}

fn decode_offer(content: &str) -> serde_json::Result<OfferExtraction> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(OfferExtraction::default());
    }
    serde_json::from_str(content)
}

/// Validate the payload and return a `data:` URL for it
fn image_data_url(image: &str) -> Result<String> {
    let image = image.trim();
    if image.is_empty() {
        return Err(AppError::MissingField {
            field: "image".to_string(),
        });
    }

    if let Some(rest) = image.strip_prefix("data:") {
        let (header, payload) = rest.split_once(',').ok_or_else(|| AppError::InvalidFormat {
            message: "data URL has no payload".to_string(),
        })?;
        if !header.ends_with(";base64") {
            return Err(AppError::InvalidFormat {
                message: "data URL must be base64-encoded".to_string(),
            });
        }
        check_base64(payload)?;
        return Ok(image.to_string());
    }

    check_base64(image)?;
    Ok(format!("data:{};base64,{}", DEFAULT_IMAGE_MEDIA_TYPE, image))
}

fn check_base64(payload: &str) -> Result<()> {
    if payload.is_empty() {
        return Err(AppError::InvalidFormat {
            message: "image payload is empty".to_string(),
        });
    }
    STANDARD
        .decode(payload)
        .map(|_| ())
        .map_err(|e| AppError::InvalidFormat {
            message: format!("image is not valid base64: {}", e),
        })
}
