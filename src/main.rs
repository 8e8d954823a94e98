use std::sync::Arc;

use tower_http::cors::CorsLayer;

use killfeed_bot::api::{self, AppState};
use killfeed_bot::config::Config;
use killfeed_bot::killfeed::KillfeedMonitor;
use killfeed_bot::metrics;
use killfeed_bot::ranking::RankingAggregator;
use killfeed_bot::sink::WebhookSink;
use killfeed_bot::upstream::{StatsApiClient, StatsSource};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = Config::load();

    let client = StatsApiClient::new(&config.api_base_url, config.api_timeout)
        .expect("Failed to build stats API client");
    let source: Arc<dyn StatsSource> = Arc::new(client);

    // Separate client for webhooks so the stats API timeout does not apply.
    let http = reqwest::Client::new();

    let killfeed = match &config.killfeed_webhook_url {
        Some(url) => {
            let sink = WebhookSink::new(http.clone(), url.clone(), config.killfeed_channel.clone());
            KillfeedMonitor::with_sink(source.clone(), config.killfeed(), Arc::new(sink))
        }
        None => KillfeedMonitor::new(source.clone(), config.killfeed()),
    };
    let killfeed = Arc::new(killfeed);

    if config.killfeed_autostart {
        match killfeed.start() {
            Ok(outcome) => tracing::info!("{outcome}"),
            Err(e) => tracing::warn!("Killfeed autostart skipped: {e}"),
        }
    }

    let state = AppState {
        killfeed: killfeed.clone(),
        ranking: Arc::new(RankingAggregator::new(source, config.ranking_concurrency)),
        http,
        default_channel: config.killfeed_channel.clone(),
    };

    let app = api::router(state).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(
        stats_api = %config.api_base_url,
        server = %config.killfeed_server,
        "Killfeed bot listening on port {}",
        config.port
    );

    let shutdown_monitor = killfeed.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            tracing::info!("Shutting down");
            shutdown_monitor.stop();
        })
        .await
        .expect("Failed to start server");
}
