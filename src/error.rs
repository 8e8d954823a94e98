// Error taxonomy shared by the upstream client, killfeed monitor and ranking.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// A required destination or setting is missing. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The stats API answered with a non-success status, could not be
    /// reached, or returned a body we could not decode.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The delivery sink rejected an event.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::Upstream(e.to_string())
    }
}

pub type BotResult<T> = Result<T, BotError>;
