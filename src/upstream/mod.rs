// HTTP client for the game-server stats API.

pub mod models;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{BotError, BotResult};
use crate::metrics;

pub use models::{KillEvent, KillStats, PlayerStats, PlayerSummary};
use models::{KillsEnvelope, PlayersEnvelope};

/// Read-only view of the stats API used by the killfeed monitor and ranking.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Recent kill events for one game server.
    async fn fetch_kill_events(&self, server_id: &str) -> BotResult<Vec<KillEvent>>;

    async fn fetch_players(&self) -> BotResult<Vec<PlayerSummary>>;

    /// Returns `Ok(None)` when the API has no data for this player.
    async fn fetch_player_stats(&self, uuid: &Uuid) -> BotResult<Option<PlayerStats>>;
}

/// `StatsSource` backed by the real HTTP API. Cheap to clone; the underlying
/// `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct StatsApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl StatsApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("killfeed-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BotError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON document. Non-success statuses yield `Ok(None)` so callers
    /// can decide whether absence is an error.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> BotResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let response = match self.http.get(&url).query(query).send().await {
            Ok(r) => r,
            Err(e) => {
                metrics::UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&[endpoint, "error"])
                    .inc();
                return Err(BotError::Upstream(format!("request to {path} failed: {e}")));
            }
        };

        let status = response.status();
        metrics::UPSTREAM_REQUESTS_TOTAL
            .with_label_values(&[endpoint, status.as_str()])
            .inc();
        metrics::UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&[endpoint])
            .observe(started.elapsed().as_secs_f64());

        if !status.is_success() {
            tracing::debug!(%status, path, "stats API returned non-success status");
            return Ok(None);
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| BotError::Upstream(format!("malformed response from {path}: {e}")))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl StatsSource for StatsApiClient {
    async fn fetch_kill_events(&self, server_id: &str) -> BotResult<Vec<KillEvent>> {
        let envelope: KillsEnvelope = self
            .get_json("kills", "/v1/kills", &[("server", server_id)])
            .await?
            .ok_or_else(|| BotError::Upstream("could not fetch kill events".into()))?;

        Ok(envelope
            .kills
            .into_iter()
            .map(|mut kill| {
                kill.distance = kill.distance.max(0.0);
                kill
            })
            .collect())
    }

    async fn fetch_players(&self) -> BotResult<Vec<PlayerSummary>> {
        let envelope: PlayersEnvelope = self
            .get_json("players", "/v1/playersTable", &[])
            .await?
            .ok_or_else(|| BotError::Upstream("could not fetch players".into()))?;
        Ok(envelope.players)
    }

    async fn fetch_player_stats(&self, uuid: &Uuid) -> BotResult<Option<PlayerStats>> {
        let uuid = uuid.to_string();
        self.get_json("player", "/v1/player", &[("player", uuid.as_str())])
            .await
    }
}
