// Killfeed monitor: polls the stats API for kills and forwards new ones to a
// delivery sink.
//
// One monitor per destination. The poll loop runs on its own tokio task and
// is cancelled through a CancellationToken; the token is checked at the top
// of every cycle, raced against the fetch and the interval sleep, and checked
// again before each delivery.

pub mod delta;

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{BotError, BotResult};
use crate::metrics;
use crate::sink::DeliverySink;
use crate::upstream::StatsSource;

pub use delta::{compute_delta, KillDelta};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct KillfeedConfig {
    /// Game server identifier passed to the kills endpoint.
    pub server_id: String,
    pub poll_interval: Duration,
}

impl Default for KillfeedConfig {
    fn default() -> Self {
        Self {
            server_id: "Server 1".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Result of a start/stop request. The "already" variants are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started { destination: String },
    AlreadyActive,
    Stopped { destination: String },
    AlreadyInactive,
}

impl ToggleOutcome {
    /// Whether the call changed the monitor's state.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Started { .. } | Self::Stopped { .. })
    }
}

impl fmt::Display for ToggleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { destination } => write!(f, "Killfeed started in {destination}"),
            Self::AlreadyActive => write!(f, "The killfeed is already running."),
            Self::Stopped { destination } => write!(f, "Killfeed stopped in {destination}"),
            Self::AlreadyInactive => write!(f, "The killfeed is not running."),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub configured: bool,
    pub active: bool,
    pub destination: Option<String>,
    pub last_seen_timestamp: i64,
    pub poll_interval_secs: u64,
}

struct PollTask {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

#[derive(Default)]
struct MonitorInner {
    sink: Option<Arc<dyn DeliverySink>>,
    task: Option<PollTask>,
}

/// Start/stop state machine around a single background poll task.
pub struct KillfeedMonitor {
    source: Arc<dyn StatsSource>,
    config: KillfeedConfig,
    inner: Mutex<MonitorInner>,
    /// Highest timestamp seen. Written only by the poll task.
    watermark: Arc<AtomicI64>,
}

impl KillfeedMonitor {
    pub fn new(source: Arc<dyn StatsSource>, config: KillfeedConfig) -> Self {
        Self {
            source,
            config,
            inner: Mutex::new(MonitorInner::default()),
            watermark: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Create a monitor already bound to a destination.
    pub fn with_sink(
        source: Arc<dyn StatsSource>,
        config: KillfeedConfig,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        let monitor = Self::new(source, config);
        monitor.lock().sink = Some(sink);
        monitor
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind (or replace) the destination. Refused while the feed is running.
    pub fn bind(&self, sink: Arc<dyn DeliverySink>) -> BotResult<()> {
        let mut inner = self.lock();
        if inner.task.is_some() {
            return Err(BotError::Configuration(
                "stop the killfeed before changing its destination".into(),
            ));
        }
        tracing::info!(destination = %sink.destination(), "killfeed destination bound");
        inner.sink = Some(sink);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.lock().sink.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.lock().task.is_some()
    }

    pub fn last_seen_timestamp(&self) -> i64 {
        self.watermark.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> MonitorStatus {
        let inner = self.lock();
        MonitorStatus {
            configured: inner.sink.is_some(),
            active: inner.task.is_some(),
            destination: inner.sink.as_ref().map(|s| s.destination()),
            last_seen_timestamp: self.last_seen_timestamp(),
            poll_interval_secs: self.config.poll_interval.as_secs(),
        }
    }

    /// Start polling. Must be called from within a tokio runtime.
    pub fn start(&self) -> BotResult<ToggleOutcome> {
        let mut inner = self.lock();

        let sink = inner
            .sink
            .clone()
            .ok_or_else(|| BotError::Configuration("no destination configured".into()))?;

        if inner.task.is_some() {
            return Ok(ToggleOutcome::AlreadyActive);
        }

        let cancel = CancellationToken::new();
        let worker = PollWorker {
            source: self.source.clone(),
            sink: sink.clone(),
            server_id: self.config.server_id.clone(),
            interval: self.config.poll_interval,
            watermark: self.watermark.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run());
        inner.task = Some(PollTask {
            cancel,
            _handle: handle,
        });
        metrics::KILLFEED_ACTIVE_MONITORS.inc();

        let destination = sink.destination();
        tracing::info!(
            %destination,
            server = %self.config.server_id,
            interval_secs = self.config.poll_interval.as_secs(),
            "killfeed started"
        );
        Ok(ToggleOutcome::Started { destination })
    }

    /// Stop polling. No delivery is initiated after this returns; one that is
    /// already in flight may still complete.
    pub fn stop(&self) -> ToggleOutcome {
        let mut inner = self.lock();
        let Some(task) = inner.task.take() else {
            return ToggleOutcome::AlreadyInactive;
        };
        task.cancel.cancel();
        metrics::KILLFEED_ACTIVE_MONITORS.dec();

        let destination = inner
            .sink
            .as_ref()
            .map(|s| s.destination())
            .unwrap_or_else(|| "the channel".to_string());
        tracing::info!(%destination, "killfeed stopped");
        ToggleOutcome::Stopped { destination }
    }
}

impl Drop for KillfeedMonitor {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = inner.task.take() {
            task.cancel.cancel();
            metrics::KILLFEED_ACTIVE_MONITORS.dec();
        }
    }
}

/// Counts from one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Everything the background task needs, moved into it on start.
struct PollWorker {
    source: Arc<dyn StatsSource>,
    sink: Arc<dyn DeliverySink>,
    server_id: String,
    interval: Duration,
    watermark: Arc<AtomicI64>,
    cancel: CancellationToken,
}

impl PollWorker {
    async fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) if report.fetched > 0 => {
                    tracing::debug!(
                        fetched = report.fetched,
                        delivered = report.delivered,
                        failed = report.failed,
                        "killfeed cycle complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(server = %self.server_id, "killfeed poll failed: {e}");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::debug!(server = %self.server_id, "killfeed poll task exited");
    }

    /// Fetch, advance the watermark, deliver. A fetch error leaves the
    /// watermark untouched; delivery errors are logged and skipped.
    async fn run_cycle(&self) -> BotResult<CycleReport> {
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(CycleReport::default()),
            result = self.source.fetch_kill_events(&self.server_id) => result,
        };
        let fetched = match fetched {
            Ok(events) => events,
            Err(e) => {
                metrics::KILLFEED_POLLS_TOTAL
                    .with_label_values(&["upstream_error"])
                    .inc();
                return Err(e);
            }
        };
        metrics::KILLFEED_POLLS_TOTAL.with_label_values(&["ok"]).inc();

        let mut report = CycleReport {
            fetched: fetched.len(),
            ..CycleReport::default()
        };

        let previous = self.watermark.load(Ordering::SeqCst);
        let delta = compute_delta(fetched, previous);
        self.watermark.fetch_max(delta.watermark, Ordering::SeqCst);

        for event in &delta.new_events {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.sink.deliver(event).await {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::KILLFEED_EVENTS_DELIVERED_TOTAL.inc();
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::KILLFEED_DELIVERY_FAILURES_TOTAL.inc();
                    tracing::error!(
                        destination = %self.sink.destination(),
                        timestamp = event.timestamp,
                        "failed to deliver kill event: {e}"
                    );
                }
            }
        }

        Ok(report)
    }
}
