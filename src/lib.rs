pub mod api;
pub mod config;
pub mod error;
pub mod killfeed;
pub mod metrics;
pub mod ranking;
pub mod sink;
pub mod upstream;
