use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod ai;
mod catalog;
mod chat;
mod cma;
mod config;
mod db;
mod gemini_client;
mod handlers;
mod idx_client;
mod middleware;
mod models;
mod store;

use ai::{AiAssistant, TextGenerator};
use catalog::Catalog;
use chat::{ChatHub, ChatService};
use config::AppConfig;
use store::{AppointmentStore, ChatStore, MemoryStore, PgStore};

// AppState holds the configuration, the chat service with its live hub, the stores and the vendor clients
pub struct AppState {
    pub config: AppConfig,
    pub chat: ChatService,
    pub appointments: Arc<dyn AppointmentStore>,
    pub db_pool: Option<sqlx::PgPool>,
    pub ai: AiAssistant,
    pub idx_client: Option<idx_client::IdxClient>,
    pub catalog: Catalog,
}

impl AppState {
    /// State backed by the in-process store, used when no database is configured.
    pub fn in_memory(
        config: AppConfig,
        ai: AiAssistant,
        idx_client: Option<idx_client::IdxClient>,
        catalog: Catalog,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            config,
            chat: ChatService::new(store.clone(), Arc::new(ChatHub::new())),
            appointments: store,
            db_pool: None,
            ai,
            idx_client,
            catalog,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = AppConfig::from_env();

    let catalog = Catalog::embedded().map_err(|e| {
        tracing::error!("❌ Embedded catalog is invalid: {}", e);
        e
    })?;
    tracing::info!(
        "🏘️ Catalog loaded: {} properties, {} service providers, {} financing providers",
        catalog.properties.len(),
        catalog.service_providers.len(),
        catalog.financing_providers.len()
    );

    // Initialize Gemini client if API key is provided
    let generator: Option<Arc<dyn TextGenerator>> = match config.gemini_api_key.clone() {
        Some(api_key) => {
            tracing::info!("Initializing Gemini AI client ({})...", config.gemini_model);
            Some(Arc::new(gemini_client::GeminiClient::new(api_key, config.gemini_model.clone())))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not found. AI answers will use built-in fallbacks.");
            None
        }
    };
    let ai = AiAssistant::new(generator);

    let idx_client = match config.idx_broker_api_key.clone() {
        Some(api_key) => {
            tracing::info!("Initializing IDX Broker client...");
            Some(idx_client::IdxClient::new(api_key).map_err(|e| {
                tracing::error!("❌ Failed to build IDX Broker client: {}", e);
                e
            })?)
        }
        None => {
            tracing::warn!("IDX_BROKER_API_KEY not found. Listing endpoints will serve sample listings.");
            None
        }
    };

    let state = match config.database_url.clone() {
        Some(db_url) => {
            let pool = db::create_pool(&db_url, config.database_max_connections)
                .await
                .map_err(|e| {
                    tracing::error!("❌ Failed to create database pool: {}", e);
                    e
                })?;
            tracing::info!("✅ Connected to PostgreSQL");

            let store = Arc::new(PgStore::new(pool));
            let chat_store: Arc<dyn ChatStore> = store.clone();
            AppState {
                db_pool: Some(store.pool().clone()),
                chat: ChatService::new(chat_store, Arc::new(ChatHub::new())),
                appointments: store,
                config,
                ai,
                idx_client,
                catalog,
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Using the in-memory store; data is lost on restart.");
            AppState::in_memory(config, ai, idx_client, catalog)
        }
    };

    let bind_addr = state.config.bind_addr.clone();
    let shared_state = Arc::new(state);

    // Build our application with all routes and shared state
    let app = Router::new()
        .merge(handlers::chat::chat_routes())
        .merge(handlers::ai::ai_routes())
        .merge(handlers::idx::idx_routes())
        .merge(handlers::cma::cma_routes())
        .merge(handlers::catalog::catalog_routes())
        .merge(handlers::appointments::appointment_routes())
        .merge(handlers::payments::payment_routes())
        .route("/api/docs", axum::routing::get(api_documentation))
        .route("/api/status", axum::routing::get(api_status))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state));

    // ConnectInfo provides socket addresses for rate limiting
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.map_err(|e| {
        tracing::error!("❌ Failed to bind {}: {}", bind_addr, e);
        e
    })?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,realty_hub=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,realty_hub=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;

    tracing::info!("🏠 Realty hub starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> axum::response::Json<serde_json::Value> {
    use serde_json::json;

    let database = match &state.db_pool {
        Some(pool) if db::ping(pool).await => "healthy",
        Some(_) => "unhealthy",
        None => "in_memory",
    };
    let configured = |on: bool| if on { "configured" } else { "not_configured" };

    axum::response::Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": database,
            "gemini_ai": configured(state.ai.is_configured()),
            "idx_broker": configured(state.idx_client.is_some()),
            "stripe": configured(state.config.stripe_public_key.is_some())
        },
        "live": {
            "active_conversations": state.chat.hub().active_conversations().await
        },
        "endpoints": {
            "documentation": "/api/docs",
            "status": "/api/status",
            "chat": "/api/chat/*",
            "chat_subscribe": "/api/chat/subscribe/:id?token=",
            "ai": "/api/ai/explain-term, /api/chatbot",
            "listings": "/api/idx/listings/*",
            "cma": "/api/cma/generate",
            "catalog": "/api/properties, /api/service-providers, /api/financing-providers",
            "appointments": "/api/appointments",
            "payments": "/api/payments/config"
        }
    }))
}

// API Documentation endpoint
async fn api_documentation() -> axum::response::Html<&'static str> {
    axum::response::Html(API_DOCS_HTML)
}

const API_DOCS_HTML: &str = r###"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Realty Hub - API Documentation</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 1100px; margin: 0 auto; padding: 20px; line-height: 1.6; }
        .endpoint { background: #f8f9fa; border-left: 4px solid #007bff; padding: 0.75rem 1rem; margin: 0.75rem 0; border-radius: 5px; }
        .method { display: inline-block; padding: 0.2rem 0.5rem; border-radius: 3px; color: white; font-weight: bold; margin-right: 0.5rem; }
        .get { background: #28a745; } .post { background: #007bff; } .patch { background: #fd7e14; } .websocket { background: #6f42c1; }
        code { background: #e9ecef; padding: 0.2rem 0.4rem; border-radius: 3px; }
    </style>
</head>
<body>
    <h1>🏠 Realty Hub API</h1>
    <p>🔒 marks routes that need <code>Authorization: Bearer &lt;jwt&gt;</code>.</p>

    <h2>💬 Chat</h2>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/chat/conversations</strong> 🔒 conversations with participants, last message and unread count</div>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/chat/conversations</strong> 🔒 <code>{"title", "type", "metadata", "participants": [{"userId", "userType"}]}</code></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/chat/conversations/:id</strong> 🔒 conversation and participants</div>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/chat/conversations/:id/participants</strong> 🔒 <code>{"userId", "userType", "name"}</code></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/chat/messages?conversationId=</strong> 🔒 messages, oldest first</div>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/chat/messages</strong> 🔒 <code>{"conversationId", "content", "type", "metadata"}</code></div>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/chat/read/:id</strong> 🔒 mark the conversation read</div>
    <div class="endpoint"><span class="method websocket">WS</span><strong>/api/chat/subscribe/:id?token=</strong> snapshot frame, then <code>messages</code> / <code>participants</code> frames</div>

    <h2>🤖 Assistant</h2>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/ai/explain-term</strong> <code>{"term", "context"}</code></div>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/chatbot</strong> <code>{"message", "history": [{"role", "content"}]}</code></div>

    <h2>🏘️ Listings and valuation</h2>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/idx/listings/featured</strong></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/idx/listings/search</strong> <code>city, zip, minPrice, maxPrice, beds, baths, propertyType, keyword</code></div>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/cma/generate</strong> <code>{"address", "city", "bedrooms", "bathrooms", "squareFeet", "comparables"}</code></div>

    <h2>📋 Marketplace</h2>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/properties</strong> <code>city, minPrice, maxPrice, bedrooms, type</code></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/properties/:id</strong></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/service-providers</strong> <code>category</code></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/financing-providers</strong> <code>loanType</code></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/appointments</strong> 🔒</div>
    <div class="endpoint"><span class="method post">POST</span><strong>/api/appointments</strong> 🔒 <code>{"propertyId", "expertId", "type", "subType", "date", "notes"}</code></div>
    <div class="endpoint"><span class="method patch">PATCH</span><strong>/api/appointments/:id/status</strong> 🔒 <code>{"status"}</code></div>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/payments/config</strong></div>

    <h2>⚙️ Service</h2>
    <div class="endpoint"><span class="method get">GET</span><strong>/api/status</strong></div>
</body>
</html>
"###;
