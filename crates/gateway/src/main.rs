//! PriceLens API Gateway
//!
//! The HTTP entry point for the price-comparison backend.
//! Handles:
//! - Search, suggestions and grounded chat
//! - Offer extraction from text and images
//! - Crowd-sourced price submissions
//! - Rate limiting
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use pricelens_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{Catalog, DbPool, MemoryCatalog, Repository},
    llm::{LlmGateway, OpenAiClient},
    metrics::{self, LATENCY_BUCKETS, LLM_BUCKETS},
    PricingServices,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::{rate_limit_middleware, RateLimit};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<dyn Catalog>,
    pub services: Arc<PricingServices>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        catalog: Arc<dyn Catalog>,
        llm: Option<Arc<dyn LlmGateway>>,
    ) -> Self {
        let services = Arc::new(PricingServices::new(catalog.clone(), llm));
        Self {
            config,
            catalog,
            services,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::load().context("Failed to load configuration")?);

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting PriceLens API Gateway v{}",
        pricelens_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    let catalog = connect_catalog(&config).await?;
    let llm = build_llm(&config)?;

    let state = AppState::new(config.clone(), catalog, llm);
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let serve = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = drain_tx.send(());
            })
            .await
    };
    let drain_deadline = async {
        if drain_rx.await.is_ok() {
            tokio::time::sleep(config.shutdown_timeout()).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = serve => result?,
        _ = drain_deadline => warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("search_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("llm_duration_seconds".to_string()),
            LLM_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// PostgreSQL unless the in-process catalog was requested
async fn connect_catalog(config: &AppConfig) -> anyhow::Result<Arc<dyn Catalog>> {
    if config.uses_memory_catalog() {
        warn!("Using the in-process catalog; data is lost on restart");
        return Ok(Arc::new(MemoryCatalog::new()));
    }

    let pool = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        pool.migrate().await?;
    }
    Ok(Arc::new(Repository::new(pool)))
}

fn build_llm(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn LlmGateway>>> {
    match config.llm_api_key() {
        Some(key) => {
            let client = OpenAiClient::new(key, &config.llm)?;
            info!(model = %config.llm.model, "LLM gateway configured");
            Ok(Some(Arc::new(client)))
        }
        None => {
            warn!("OPENAI_API_KEY not set; search uses the keyword parser, chat and offer extraction are unavailable");
            Ok(None)
        }
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        // AI endpoints
        .route("/ai/search", get(handlers::search::search))
        .route("/ai/suggestions", get(handlers::search::suggestions))
        .route("/ai/parse-image", post(handlers::offers::parse_image))
        .route("/ai/parse-text", post(handlers::offers::parse_text))
        .route("/ai/chat", post(handlers::chat::chat))

        // Submission endpoints
        .route("/submissions", post(handlers::submissions::create_submission))
        .route("/submissions/products", get(handlers::submissions::list_products));

    if state.config.rate_limit.enabled {
        let rate_limit = RateLimit::new(&state.config.rate_limit);
        api_routes = api_routes.route_layer(from_fn_with_state(rate_limit, rate_limit_middleware));
    }

    // Health endpoints are never rate limited
    let health_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready));

    // Compose the app
    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use pricelens_common::llm::ScriptedLlm;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn seeded_catalog() -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new());
        let cola = catalog.add_product("كوكاكولا", Some("Coca-Cola"));
        let sugar = catalog.add_product("سكر 1 كجم", None);
        let a = catalog.add_store("سوبر ماركت أبو طلال", "خانيونس", None);
        let b = catalog.add_store("محلات الأمل", "غزة", Some("الرمال"));
        catalog.add_price(cola.id, a.id, 6.0, "L");
        catalog.add_price(cola.id, b.id, 6.5, "L");
        catalog.add_price(sugar.id, b.id, 5.0, "KG");
        catalog
    }

    fn app(catalog: Arc<MemoryCatalog>, llm: Option<Arc<ScriptedLlm>>) -> Router {
        let llm = llm.map(|l| l as Arc<dyn LlmGateway>);
        create_router(AppState::new(Arc::new(AppConfig::default()), catalog, llm))
    }

    fn encode(q: &str) -> String {
        q.bytes().map(|b| format!("%{:02X}", b)).collect()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(seeded_catalog(), None), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_catalog() {
        let (status, body) = send(app(seeded_catalog(), None), get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["catalog"]["status"], "up");
        assert_eq!(body["checks"]["llm"]["status"], "not_configured");
    }

    #[tokio::test]
    async fn test_search_with_keyword_fallback() {
        let uri = format!("/ai/search?q={}", encode("بدي كولا"));
        let (status, body) = send(app(seeded_catalog(), None), get(&uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "بدي كولا");
        assert_eq!(body["parsed_query"]["items"][0]["product"], "كوكاكولا");
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["results"][0]["store"]["name"], "سوبر ماركت أبو طلال");
        assert_eq!(body["confidence"], 0.95);
    }

    #[tokio::test]
    async fn test_search_without_query() {
        let (status, body) = send(app(seeded_catalog(), None), get("/ai/search")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["results"].as_array().unwrap().is_empty());
        assert_eq!(body["ai_summary"], "لم أجد نتائج مطابقة لطلبك حالياً.");
    }

    #[tokio::test]
    async fn test_suggestions() {
        let uri = format!("/ai/suggestions?q={}", encode("كولا"));
        let (_, body) = send(app(seeded_catalog(), None), get(&uri)).await;
        assert_eq!(body, json!(["كوكاكولا"]));

        let uri = format!("/ai/suggestions?q={}", encode("ك"));
        let (_, body) = send(app(seeded_catalog(), None), get(&uri)).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_chat_without_llm() {
        let (status, body) = send(
            app(seeded_catalog(), None),
            post_json("/ai/chat", json!({"message": "كولا"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "عذراً، خدمة الذكاء الاصطناعي غير متوفرة حالياً.");
    }

    #[tokio::test]
    async fn test_chat_with_llm() {
        let llm = Arc::new(ScriptedLlm::new().reply("{}").reply("الكولا بـ 6 شيكل"));
        let (status, body) = send(
            app(seeded_catalog(), Some(llm)),
            post_json("/ai/chat", json!({"message": "كولا"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"reply": "الكولا بـ 6 شيكل"}));
    }

    #[tokio::test]
    async fn test_offer_extraction_requires_llm() {
        let catalog = seeded_catalog();
        let before = catalog.accesses();

        let (status, body) = send(
            app(catalog.clone(), None),
            post_json("/ai/parse-text", json!({"text": "خيار 5 بـ 10"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"]["code"].is_string());

        let (status, _) = send(
            app(catalog.clone(), None),
            post_json("/ai/parse-image", json!({"image": "aGVsbG8="})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(catalog.accesses(), before);
    }

    #[tokio::test]
    async fn test_offer_extraction_upstream_failure() {
        let llm = Arc::new(ScriptedLlm::new().fail("connection reset"));
        let (status, _) = send(
            app(seeded_catalog(), Some(llm)),
            post_json("/ai/parse-text", json!({"text": "خيار 5 بـ 10"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_offer_extraction_text() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"storeName":"بقالة النور","location":null,"items":[{"productName":"خيار","price":2,"unit":"piece (Deal: 5 for 10)"}]}"#,
        ));
        let (status, body) = send(
            app(seeded_catalog(), Some(llm)),
            post_json("/ai/parse-text", json!({"text": "خيار 5 بـ 10"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storeName"], "بقالة النور");
        assert_eq!(body["items"][0]["price"], 2.0);
    }

    #[tokio::test]
    async fn test_submission_round_trip() {
        let catalog = seeded_catalog();
        let (status, body) = send(
            app(catalog.clone(), None),
            post_json(
                "/submissions",
                json!({"productName": "كولا", "price": 5.5, "storeName": "بقالة النور", "location": "رفح"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["product"]["name"], "كوكاكولا");
        assert_eq!(body["store"]["city"], "رفح");
        assert_eq!(body["unit"], "piece");
        assert_eq!(catalog.counts().products, 2);
        assert_eq!(catalog.counts().stores, 3);

        let (status, body) = send(app(catalog, None), get("/submissions/products")).await;
        assert_eq!(status, StatusCode::OK);
        let cola = body
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "كوكاكولا")
            .unwrap();
        assert_eq!(cola["prices"].as_array().unwrap().len(), 3);
        assert_eq!(cola["prices"][0]["store"]["name"], "بقالة النور");
    }

    #[tokio::test]
    async fn test_invalid_submission() {
        let (status, body) = send(
            app(seeded_catalog(), None),
            post_json(
                "/submissions",
                json!({"productName": "", "price": 5.5, "storeName": "بقالة النور"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "productName");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = app(seeded_catalog(), None)
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
