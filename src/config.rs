// Application configuration, loaded from environment variables and CLI flags.

use std::time::Duration;

use crate::killfeed::{KillfeedConfig, DEFAULT_POLL_INTERVAL};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to bind the HTTP control API to.
    pub port: u16,
    /// Base URL of the stats API (no trailing slash needed).
    pub api_base_url: String,
    /// Per-request timeout for the stats API.
    pub api_timeout: Duration,
    /// Game server identifier whose kills are followed.
    pub killfeed_server: String,
    /// Incoming-webhook URL of the killfeed channel, if one is configured.
    pub killfeed_webhook_url: Option<String>,
    /// Display name of the killfeed channel.
    pub killfeed_channel: String,
    pub poll_interval: Duration,
    /// Start the killfeed as soon as the service is up.
    pub killfeed_autostart: bool,
    /// Concurrent per-player stat requests while building a ranking.
    pub ranking_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `PORT` - HTTP port (default: 3000)
    /// - `STATS_API_BASE_URL` - stats API base URL (default: `http://localhost:8804`)
    /// - `STATS_API_TIMEOUT_SECS` - stats API request timeout (default: 30)
    /// - `KILLFEED_SERVER` - server whose kills are followed (default: `Server 1`)
    /// - `KILLFEED_WEBHOOK_URL` - webhook of the killfeed channel (default: unset)
    /// - `KILLFEED_CHANNEL` - channel display name (default: `killfeed`)
    /// - `KILLFEED_POLL_INTERVAL_SECS` - poll interval (default: 30)
    /// - `KILLFEED_AUTOSTART` - `true`/`1` to start the feed at boot
    /// - `RANKING_CONCURRENCY` - parallel stat fetches for rankings (default: 4)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--api-url <URL>` - Override the stats API base URL
    /// - `--killfeed` - Same as `KILLFEED_AUTOSTART=true`
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a config from CLI args and an environment lookup. CLI flags take
    /// precedence over the environment, which takes precedence over defaults.
    pub fn from_sources<F>(args: &[String], env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let api_base_url = Self::parse_cli_value(args, "--api-url")
            .or_else(|| env("STATS_API_BASE_URL"))
            .unwrap_or_else(|| "http://localhost:8804".to_string());

        let api_timeout = env("STATS_API_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let killfeed_server = env("KILLFEED_SERVER").unwrap_or_else(|| "Server 1".to_string());

        let killfeed_webhook_url = env("KILLFEED_WEBHOOK_URL").filter(|v| !v.trim().is_empty());

        let killfeed_channel = env("KILLFEED_CHANNEL").unwrap_or_else(|| "killfeed".to_string());

        // Zero would spin the poll loop; fall back to the default.
        let poll_interval = env("KILLFEED_POLL_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let killfeed_autostart = args.contains(&"--killfeed".to_string())
            || env("KILLFEED_AUTOSTART")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false);

        let ranking_concurrency = env("RANKING_CONCURRENCY")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(4);

        Config {
            port,
            api_base_url,
            api_timeout,
            killfeed_server,
            killfeed_webhook_url,
            killfeed_channel,
            poll_interval,
            killfeed_autostart,
            ranking_concurrency,
        }
    }

    pub fn killfeed(&self) -> KillfeedConfig {
        KillfeedConfig {
            server_id: self.killfeed_server.clone(),
            poll_interval: self.poll_interval,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(args: &[&str], env: &[(&str, &str)]) -> Config {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(&args, |key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&["killfeed-bot"], &[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_base_url, "http://localhost:8804");
        assert_eq!(config.api_timeout, Duration::from_secs(30));
        assert_eq!(config.killfeed_server, "Server 1");
        assert!(config.killfeed_webhook_url.is_none());
        assert_eq!(config.killfeed_channel, "killfeed");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert!(!config.killfeed_autostart);
        assert_eq!(config.ranking_concurrency, 4);
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = load(
            &["killfeed-bot", "--port", "8080", "--api-url", "http://plan:9000"],
            &[("PORT", "9999"), ("STATS_API_BASE_URL", "http://other")],
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_base_url, "http://plan:9000");
    }

    #[test]
    fn test_env_values() {
        let config = load(
            &["killfeed-bot"],
            &[
                ("KILLFEED_SERVER", "Survival"),
                ("KILLFEED_WEBHOOK_URL", "https://chat.example/hooks/abc"),
                ("KILLFEED_CHANNEL", "pvp-feed"),
                ("KILLFEED_POLL_INTERVAL_SECS", "5"),
                ("KILLFEED_AUTOSTART", "TRUE"),
                ("RANKING_CONCURRENCY", "8"),
            ],
        );
        assert_eq!(config.killfeed_server, "Survival");
        assert_eq!(
            config.killfeed_webhook_url.as_deref(),
            Some("https://chat.example/hooks/abc")
        );
        assert_eq!(config.killfeed_channel, "pvp-feed");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.killfeed_autostart);
        assert_eq!(config.ranking_concurrency, 8);

        let killfeed = config.killfeed();
        assert_eq!(killfeed.server_id, "Survival");
        assert_eq!(killfeed.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(
            &["killfeed-bot", "--killfeed"],
            &[
                ("PORT", "not-a-port"),
                ("KILLFEED_POLL_INTERVAL_SECS", "0"),
                ("KILLFEED_WEBHOOK_URL", "  "),
                ("RANKING_CONCURRENCY", "0"),
            ],
        );
        assert_eq!(config.port, 3000);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert!(config.killfeed_webhook_url.is_none());
        assert_eq!(config.ranking_concurrency, 4);
        assert!(config.killfeed_autostart);
    }
}
