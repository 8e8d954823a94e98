// Payload types returned by the stats API.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn unknown() -> String {
    "Unknown".to_string()
}

/// Missing and `null` both decode to "Unknown".
fn string_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown))
}

/// Missing and `null` both decode to `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a list row by row. Rows that do not fit `T` are logged and
/// dropped so one bad row cannot hide the rest.
fn lenient_rows<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let rows = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("skipping malformed stats API row: {e}");
                None
            }
        })
        .collect())
}

fn zero_kdr() -> String {
    "0".to_string()
}

/// A single PvP kill reported by the game server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    #[serde(default = "unknown", deserialize_with = "string_or_unknown")]
    pub killer: String,
    #[serde(default = "unknown", deserialize_with = "string_or_unknown")]
    pub victim: String,
    #[serde(default = "unknown", deserialize_with = "string_or_unknown")]
    pub weapon: String,
    /// Distance between killer and victim in blocks.
    #[serde(default, deserialize_with = "null_as_default")]
    pub distance: f64,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
}

/// One row of the player table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    #[serde(rename(deserialize = "playerUUID"))]
    pub uuid: Uuid,
    #[serde(rename(deserialize = "playerName"))]
    pub name: String,
    #[serde(rename(deserialize = "activityIndex"), default)]
    pub activity_index: f64,
    #[serde(rename(deserialize = "playtimeActive"), default)]
    pub playtime_active: i64,
    #[serde(rename(deserialize = "sessionCount"), default)]
    pub session_count: i64,
    #[serde(rename(deserialize = "lastSeen"), default)]
    pub last_seen: String,
    #[serde(default)]
    pub registered: String,
    #[serde(rename(deserialize = "pingAverage"), default)]
    pub ping_average: f64,
    #[serde(rename(deserialize = "pingMax"), default)]
    pub ping_max: f64,
    #[serde(rename(deserialize = "pingMin"), default)]
    pub ping_min: f64,
}

/// Combat counters for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillStats {
    #[serde(default)]
    pub player_kills_total: i64,
    #[serde(default)]
    pub deaths_total: i64,
    #[serde(default)]
    pub player_kills_7d: i64,
    #[serde(default)]
    pub deaths_7d: i64,
    /// Pre-formatted ratio as the upstream reports it.
    #[serde(default = "zero_kdr")]
    pub player_kdr_total: String,
    #[serde(default)]
    pub mob_kills_total: i64,
}

impl Default for KillStats {
    fn default() -> Self {
        Self {
            player_kills_total: 0,
            deaths_total: 0,
            player_kills_7d: 0,
            deaths_7d: 0,
            player_kdr_total: zero_kdr(),
            mob_kills_total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub kill_data: KillStats,
    /// Session list, passed through as the API reports it.
    #[serde(default)]
    pub sessions: Vec<Value>,
    /// Free-form player info object, passed through.
    #[serde(default)]
    pub info: Value,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KillsEnvelope {
    #[serde(default, deserialize_with = "lenient_rows")]
    pub kills: Vec<KillEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayersEnvelope {
    #[serde(default, deserialize_with = "lenient_rows")]
    pub players: Vec<PlayerSummary>,
}
