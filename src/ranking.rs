// Player ranking over the stats API, plus single-player stat lookup.
//
// Rankings are rebuilt from scratch on every request; nothing is cached.

use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::BotResult;
use crate::metrics;
use crate::upstream::{PlayerStats, PlayerSummary, StatsSource};

/// Sort key standing in for an infinite K/D ratio.
pub const INFINITE_SORT_KEY: f64 = 999_999.0;

/// Bounds enforced on `limit` at the request boundary.
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 25;
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[serde(alias = "kda")]
    KdRatio,
    Kills,
    Deaths,
}

impl RankingMetric {
    /// Parse a metric name as typed by an operator.
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kd_ratio" | "kda" | "kd" => Some(Self::KdRatio),
            "kills" => Some(Self::Kills),
            "deaths" => Some(Self::Deaths),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KdRatio => "kd_ratio",
            Self::Kills => "kills",
            Self::Deaths => "deaths",
        }
    }
}

/// Displayed score for a player under `metric`.
pub fn score(metric: RankingMetric, kills: i64, deaths: i64) -> f64 {
    match metric {
        RankingMetric::KdRatio => {
            if deaths > 0 {
                kills as f64 / deaths as f64
            } else if kills > 0 {
                f64::INFINITY
            } else {
                0.0
            }
        }
        RankingMetric::Kills => kills as f64,
        RankingMetric::Deaths => deaths as f64,
    }
}

/// Always-finite ordering key derived from a score.
pub fn sort_key(metric: RankingMetric, score: f64) -> f64 {
    match metric {
        RankingMetric::KdRatio if score.is_infinite() => INFINITE_SORT_KEY,
        _ => score,
    }
}

/// K/D as shown to users: two decimals, or a marker when there are no deaths.
pub fn format_kd_ratio(kills: i64, deaths: i64) -> String {
    if deaths > 0 {
        format!("{:.2}", kills as f64 / deaths as f64)
    } else if kills > 0 {
        "∞ (no deaths)".to_string()
    } else {
        "0.00".to_string()
    }
}

fn serialize_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if score.is_finite() {
        serializer.serialize_f64(*score)
    } else {
        serializer.serialize_str("inf")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub name: String,
    pub kills: i64,
    pub deaths: i64,
    #[serde(serialize_with = "serialize_score")]
    pub score: f64,
}

/// Score, sort (stable, descending) and truncate. Players without stats are
/// excluded.
pub fn rank_players<I>(players: I, metric: RankingMetric, limit: usize) -> Vec<RankingEntry>
where
    I: IntoIterator<Item = (PlayerSummary, Option<PlayerStats>)>,
{
    let mut entries: Vec<RankingEntry> = players
        .into_iter()
        .filter_map(|(player, stats)| {
            let kd = stats?.kill_data;
            Some(RankingEntry {
                name: player.name,
                kills: kd.player_kills_total,
                deaths: kd.deaths_total,
                score: score(metric, kd.player_kills_total, kd.deaths_total),
            })
        })
        .collect();

    // Full stable sort before truncating so ties keep enumeration order.
    entries.sort_by(|a, b| sort_key(metric, b.score).total_cmp(&sort_key(metric, a.score)));
    entries.truncate(limit);
    entries
}

pub struct RankingAggregator {
    source: Arc<dyn StatsSource>,
    /// Max concurrent per-player stat requests.
    concurrency: usize,
}

impl RankingAggregator {
    pub fn new(source: Arc<dyn StatsSource>, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Top `limit` players by `metric`. Upstream failures propagate.
    pub async fn compute_ranking(
        &self,
        metric: RankingMetric,
        limit: usize,
    ) -> BotResult<Vec<RankingEntry>> {
        metrics::RANKING_REQUESTS_TOTAL
            .with_label_values(&[metric.as_str()])
            .inc();

        let players = self.source.fetch_players().await?;
        let player_count = players.len();
        let source = &self.source;

        // `buffered` keeps results in enumeration order.
        let with_stats: Vec<(PlayerSummary, Option<PlayerStats>)> = stream::iter(players)
            .map(|player| async move {
                let stats = source.fetch_player_stats(&player.uuid).await?;
                Ok::<_, crate::error::BotError>((player, stats))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let ranking = rank_players(with_stats, metric, limit);
        tracing::debug!(
            metric = metric.as_str(),
            players = player_count,
            ranked = ranking.len(),
            "ranking computed"
        );
        Ok(ranking)
    }

    pub async fn list_players(&self) -> BotResult<Vec<PlayerSummary>> {
        self.source.fetch_players().await
    }

    /// Look a player up by name (case-insensitive) and fetch their stats.
    /// `Ok(None)` when the player or their stats do not exist.
    pub async fn find_player_stats(
        &self,
        name: &str,
    ) -> BotResult<Option<(PlayerSummary, PlayerStats)>> {
        let players = self.source.fetch_players().await?;
        let wanted = name.to_lowercase();
        let Some(player) = players
            .into_iter()
            .find(|p| p.name.to_lowercase() == wanted)
        else {
            return Ok(None);
        };

        let stats = self.source.fetch_player_stats(&player.uuid).await?;
        Ok(stats.map(|s| (player, s)))
    }
}
