// Delivery sinks: where new kill events end up, and how they are rendered.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::error::{BotError, BotResult};
use crate::upstream::KillEvent;

/// Embed colour used for kill notifications (red).
const KILL_EMBED_COLOR: u32 = 0xE74C3C;

/// Destination for killfeed output. Called once per event, sequentially.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Human-readable name of the destination channel.
    fn destination(&self) -> String;

    /// Send one event. Failures are not retried by the caller.
    async fn deliver(&self, event: &KillEvent) -> BotResult<()>;
}

/// Pick an emoji for a weapon name. Longer names that contain shorter ones
/// (crossbow/bow, pickaxe/axe) are checked first, so "Iron Pickaxe" maps to
/// ⛏️ rather than the axe emoji.
pub fn weapon_emoji(weapon: &str) -> &'static str {
    let weapon = weapon.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| weapon.contains(n));

    if has(&["sword", "épée"]) {
        "⚔️"
    } else if has(&["crossbow", "arbalète"]) {
        "🏹"
    } else if has(&["pickaxe", "pioche"]) {
        "⛏️"
    } else if has(&["bow", "arc"]) {
        "🏹"
    } else if has(&["axe", "hache"]) {
        "🪓"
    } else if has(&["trident"]) {
        "🔱"
    } else {
        "🗡️"
    }
}

/// One-line markdown description of a kill.
pub fn render_kill_line(event: &KillEvent) -> String {
    let emoji = weapon_emoji(&event.weapon);
    if event.distance > 0.0 {
        format!(
            "{emoji} **{}** annihilated **{}** with {} from {:.0} m!",
            event.killer, event.victim, event.weapon, event.distance
        )
    } else {
        format!(
            "{emoji} **{}** eliminated **{}** with {}!",
            event.killer, event.victim, event.weapon
        )
    }
}

/// Webhook payload carrying a single kill embed.
pub fn render_kill_embed(event: &KillEvent) -> Value {
    let timestamp = if event.timestamp > 0 {
        Utc.timestamp_millis_opt(event.timestamp)
            .single()
            .unwrap_or_else(Utc::now)
    } else {
        Utc::now()
    };

    json!({
        "embeds": [{
            "title": "💀 Kill Feed",
            "description": render_kill_line(event),
            "color": KILL_EMBED_COLOR,
            "timestamp": timestamp.to_rfc3339(),
            "footer": { "text": "Kill detected automatically" },
        }]
    })
}

/// Posts kill embeds to a chat incoming-webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
    channel: String,
}

impl WebhookSink {
    pub fn new(http: reqwest::Client, url: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    fn destination(&self) -> String {
        format!("#{}", self.channel)
    }

    async fn deliver(&self, event: &KillEvent) -> BotResult<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&render_kill_embed(event))
            .send()
            .await
            .map_err(|e| BotError::Delivery(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Delivery(format!("webhook returned {status}")));
        }
        Ok(())
    }
}

/// Writes rendered kills to the log. Used when no webhook is configured but
/// the feed should still run (dry runs, local testing).
#[derive(Debug, Clone)]
pub struct LogSink {
    channel: String,
}

impl LogSink {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl DeliverySink for LogSink {
    fn destination(&self) -> String {
        format!("log:{}", self.channel)
    }

    async fn deliver(&self, event: &KillEvent) -> BotResult<()> {
        tracing::info!(channel = %self.channel, timestamp = event.timestamp, "{}", render_kill_line(event));
        Ok(())
    }
}
