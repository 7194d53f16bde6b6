use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use orderwatch_config::{AppConfig, WebConfig};
use orderwatch_core_types::Region;
use orderwatch_engine::{AlertDispatcher, CheckReport, OrderEngine, RegionSnapshot};
use orderwatch_salesmap::SalesMapSnapshot;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::telemetry::format_error_chain;

#[derive(Clone)]
pub struct WebRuntimeHandle {
    inner: Arc<WebRuntimeInner>,
}

struct WebRuntimeInner {
    cron_secret: String,
    config_redacted: Value,
    started_at: DateTime<Utc>,
    engine: OrderEngine,
    dispatcher: AlertDispatcher,
    last_report: RwLock<Option<CheckReport>>,
    sales_map: RwLock<Option<SalesMapSnapshot>>,
}

impl WebRuntimeHandle {
    pub fn new(config: &AppConfig, engine: OrderEngine, dispatcher: AlertDispatcher) -> Self {
        let mut config_redacted = serde_json::to_value(config).unwrap_or_else(|_| json!({}));
        redact_sensitive_values(&mut config_redacted);
        Self {
            inner: Arc::new(WebRuntimeInner {
                cron_secret: config.web.cron_secret.trim().to_string(),
                config_redacted,
                started_at: Utc::now(),
                engine,
                dispatcher,
                last_report: RwLock::new(None),
                sales_map: RwLock::new(None),
            }),
        }
    }

    pub fn set_last_report(&self, report: CheckReport) {
        if let Ok(mut guard) = self.inner.last_report.write() {
            *guard = Some(report);
        }
    }

    pub fn last_report(&self) -> Option<CheckReport> {
        self.inner
            .last_report
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    pub fn set_sales_map_snapshot(&self, snapshot: SalesMapSnapshot) {
        if let Ok(mut guard) = self.inner.sales_map.write() {
            *guard = Some(snapshot);
        }
    }

    pub fn sales_map_snapshot(&self) -> Option<SalesMapSnapshot> {
        self.inner
            .sales_map
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Logs a warning when a cron secret is configured and the caller did not present it. The
    /// request is still served.
    fn note_cron_caller(&self, headers: &HeaderMap) {
        let expected = self.inner.cron_secret.as_str();
        if expected.is_empty() {
            return;
        }
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);
        if presented != Some(expected) {
            warn!(
                bearer_present = presented.is_some(),
                "check endpoint called without matching cron secret"
            );
        }
    }

    pub async fn run_server(self, web_config: WebConfig) -> Result<()> {
        let app = build_router(self.clone());
        let bind = format!("{}:{}", web_config.host, web_config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("failed to bind web server on {}", bind))?;
        info!(bind = %bind, "web server started");
        axum::serve(listener, app)
            .await
            .context("axum web server failed")?;
        Ok(())
    }
}

fn build_router(state: WebRuntimeHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/check", get(api_check))
        .route("/api/orders", get(api_orders))
        .route("/api/status", get(api_status))
        .route("/api/sales-map", get(api_sales_map))
        .route("/api/config", get(api_config))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: None,
        }
    }

    fn internal(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({"error": self.message, "details": details}),
            None => json!({"error": self.message}),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct OrdersQuery {
    store: Option<String>,
}

async fn healthz(State(state): State<WebRuntimeHandle>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "ts": Utc::now(),
        "startedAt": state.inner.started_at,
    }))
}

async fn api_check(
    State(state): State<WebRuntimeHandle>,
    headers: HeaderMap,
) -> Result<Json<CheckReport>, ApiError> {
    state.note_cron_caller(&headers);
    let engine = state.inner.engine.clone();
    let dispatcher = state.inner.dispatcher.clone();
    let report = tokio::spawn(async move { engine.run_cycle(&dispatcher).await })
        .await
        .map_err(|join_error| {
            let join_error = anyhow::Error::new(join_error).context("check cycle task failed");
            let details = format_error_chain(&join_error);
            error!(error = %details, "order check failed");
            ApiError::internal("Failed to check orders", details)
        })?;
    state.set_last_report(report.clone());
    Ok(Json(report))
}

async fn api_orders(
    State(state): State<WebRuntimeHandle>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<RegionSnapshot>, ApiError> {
    let region = match query.store.as_deref().map(str::trim) {
        None | Some("") => Region::Uk,
        Some(store) => store
            .parse::<Region>()
            .map_err(|_| ApiError::bad_request("Invalid store parameter"))?,
    };
    let snapshot = state
        .inner
        .engine
        .query_region(region, Utc::now())
        .await
        .map_err(|store_error| {
            error!(region = %region, error = %store_error, "order query failed");
            ApiError::internal("Failed to fetch orders", store_error.to_string())
        })?;
    Ok(Json(snapshot))
}

async fn api_status(
    State(state): State<WebRuntimeHandle>,
) -> Result<Json<CheckReport>, ApiError> {
    state
        .last_report()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no check cycle has completed yet"))
}

async fn api_sales_map(
    State(state): State<WebRuntimeHandle>,
) -> Result<Json<SalesMapSnapshot>, ApiError> {
    state
        .sales_map_snapshot()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("sales map is not running"))
}

async fn api_config(State(state): State<WebRuntimeHandle>) -> Json<Value> {
    Json(state.inner.config_redacted.clone())
}

fn redact_sensitive_values(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let key_lc = key.to_ascii_lowercase();
                if child.is_string()
                    && (key_lc.contains("token")
                        || key_lc.contains("key")
                        || key_lc.contains("secret")
                        || key_lc.contains("hash"))
                {
                    *child = Value::String("<REDACTED>".to_string());
                    continue;
                }
                redact_sensitive_values(child);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_sensitive_values(item);
            }
        }
        _ => {}
    }
}
