// HTTP control API: killfeed toggle/status, rankings, player stats, metrics.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Json, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::BotError;
use crate::killfeed::KillfeedMonitor;
use crate::metrics;
use crate::ranking::{
    format_kd_ratio, RankingAggregator, RankingMetric, DEFAULT_LIMIT, MAX_LIMIT, MIN_LIMIT,
};
use crate::sink::WebhookSink;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub action: String,
    /// Webhook of the channel to bind before starting.
    pub webhook_url: Option<String>,
    /// Display name for that channel.
    pub channel: Option<String>,
}

#[derive(Deserialize)]
pub struct RankingParams {
    pub metric: Option<String>,
    pub limit: Option<i64>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub killfeed: Arc<KillfeedMonitor>,
    pub ranking: Arc<RankingAggregator>,
    /// Client used for webhook sinks bound at runtime.
    pub http: reqwest::Client,
    /// Channel name used when a toggle request binds a webhook without one.
    pub default_channel: String,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

fn bot_error(e: BotError) -> Response {
    match e {
        BotError::Configuration(msg) => json_error(StatusCode::BAD_REQUEST, &msg),
        BotError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, &msg),
        BotError::Upstream(msg) => {
            tracing::error!("Stats API error: {msg}");
            json_error(StatusCode::BAD_GATEWAY, "Stats service unavailable")
        }
        BotError::Delivery(msg) => {
            tracing::error!("Delivery error: {msg}");
            json_error(StatusCode::BAD_GATEWAY, "Delivery failed")
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/killfeed", post(toggle_killfeed))
        .route("/api/killfeed/status", get(killfeed_status))
        .route("/api/ranking", get(ranking))
        .route("/api/players", get(list_players))
        .route("/api/players/{name}/stats", get(player_stats))
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = metrics::normalize_path(req.uri().path());
    let started = Instant::now();

    let response = next.run(req).await;

    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[&method, &endpoint, response.status().as_str()])
        .inc();
    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[&endpoint])
        .observe(started.elapsed().as_secs_f64());
    response
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "killfeed-bot" }))
}

async fn metrics_handler() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(metrics::gather_metrics()),
    )
        .into_response()
}

// ── Killfeed handlers ────────────────────────────────────────────────

async fn toggle_killfeed(
    State(state): State<AppState>,
    Json(req): Json<ToggleRequest>,
) -> Response {
    let outcome = match req.action.to_ascii_lowercase().as_str() {
        "start" => {
            if let Some(url) = req.webhook_url.filter(|u| !u.trim().is_empty()) {
                let channel = req
                    .channel
                    .unwrap_or_else(|| state.default_channel.clone());
                let sink = WebhookSink::new(state.http.clone(), url, channel);
                if !state.killfeed.is_running() {
                    if let Err(e) = state.killfeed.bind(Arc::new(sink)) {
                        return bot_error(e);
                    }
                }
            }
            match state.killfeed.start() {
                Ok(outcome) => outcome,
                Err(e) => return bot_error(e),
            }
        }
        "stop" => state.killfeed.stop(),
        _ => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "Invalid action. Use 'start' or 'stop'.",
            )
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": outcome.is_success(),
            "active": state.killfeed.is_running(),
            "message": outcome.to_string(),
        })),
    )
        .into_response()
}

async fn killfeed_status(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(json!(state.killfeed.status()))).into_response()
}

// ── Stats handlers ───────────────────────────────────────────────────

async fn ranking(State(state): State<AppState>, Query(params): Query<RankingParams>) -> Response {
    let Some(metric_name) = params.metric else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "metric is required (kd_ratio, kills or deaths)",
        );
    };
    let Some(metric) = RankingMetric::from_str_name(&metric_name) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "Invalid ranking metric. Use 'kd_ratio', 'kills' or 'deaths'.",
        );
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT as i64);
    if limit < MIN_LIMIT as i64 || limit > MAX_LIMIT as i64 {
        return json_error(
            StatusCode::BAD_REQUEST,
            &format!("limit must be between {MIN_LIMIT} and {MAX_LIMIT}"),
        );
    }

    match state.ranking.compute_ranking(metric, limit as usize).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(json!({
                "metric": metric.as_str(),
                "entries": entries,
            })),
        )
            .into_response(),
        Err(e) => bot_error(e),
    }
}

async fn list_players(State(state): State<AppState>) -> Response {
    match state.ranking.list_players().await {
        Ok(players) => (StatusCode::OK, Json(json!(players))).into_response(),
        Err(e) => bot_error(e),
    }
}

async fn player_stats(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.ranking.find_player_stats(&name).await {
        Ok(Some((player, stats))) => {
            let kd = &stats.kill_data;
            let kd_ratio = format_kd_ratio(kd.player_kills_total, kd.deaths_total);
            (
                StatusCode::OK,
                Json(json!({
                    "player": player,
                    "kill_data": stats.kill_data,
                    "kd_ratio": kd_ratio,
                    "sessions": stats.sessions,
                    "info": stats.info,
                    "timestamp": stats.timestamp,
                })),
            )
                .into_response()
        }
        Ok(None) => bot_error(BotError::NotFound(format!(
            "No statistics found for player {name}"
        ))),
        Err(e) => bot_error(e),
    }
}
