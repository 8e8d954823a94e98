// End-to-end killfeed tests: fake stats API -> KillfeedMonitor -> fake webhook.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};

use killfeed_bot::killfeed::{KillfeedConfig, KillfeedMonitor, ToggleOutcome};
use killfeed_bot::sink::WebhookSink;
use killfeed_bot::upstream::{StatsApiClient, StatsSource};

#[derive(Clone, Default)]
struct FakeWorld {
    /// Kills currently reported by the stats API.
    kills: Arc<Mutex<Vec<Value>>>,
    /// Descriptions of embeds posted to the webhook, in arrival order.
    posted: Arc<Mutex<Vec<String>>>,
}

impl FakeWorld {
    fn push_kill(&self, killer: &str, timestamp: i64) {
        self.kills.lock().unwrap().push(json!({
            "killer": killer,
            "victim": "Steve",
            "weapon": "Diamond Sword",
            "distance": 0.0,
            "timestamp": timestamp,
        }));
    }

    fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }
}

async fn kills(State(world): State<FakeWorld>) -> Json<Value> {
    let kills = world.kills.lock().unwrap().clone();
    Json(json!({ "kills": kills }))
}

async fn webhook(State(world): State<FakeWorld>, Json(body): Json<Value>) -> Json<Value> {
    let description = body["embeds"][0]["description"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    world.posted.lock().unwrap().push(description);
    Json(json!({}))
}

async fn spawn_fake(world: FakeWorld) -> String {
    let app = Router::new()
        .route("/v1/kills", get(kills))
        .route("/hook", post(webhook))
        .with_state(world);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn monitor(base: &str, channel: &str) -> KillfeedMonitor {
    let source: Arc<dyn StatsSource> =
        Arc::new(StatsApiClient::new(base, Duration::from_secs(5)).unwrap());
    let sink = WebhookSink::new(reqwest::Client::new(), format!("{base}/hook"), channel);
    let config = KillfeedConfig {
        server_id: "Server 1".into(),
        poll_interval: Duration::from_millis(25),
    };
    KillfeedMonitor::with_sink(source, config, Arc::new(sink))
}

/// Wait until `world` has seen `count` webhook posts, or panic after 5s.
async fn wait_for_posts(world: &FakeWorld, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while world.posted().len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {count} posts, got {:?}",
            world.posted()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_new_kills_are_posted_once_in_order() {
    let world = FakeWorld::default();
    world.push_kill("third", 300);
    world.push_kill("first", 100);
    world.push_kill("second", 200);
    let base = spawn_fake(world.clone()).await;

    let monitor = monitor(&base, "pvp");
    assert_eq!(
        monitor.start().unwrap(),
        ToggleOutcome::Started {
            destination: "#pvp".into()
        }
    );
    wait_for_posts(&world, 3).await;

    world.push_kill("fourth", 400);
    wait_for_posts(&world, 4).await;

    // Let a few more cycles run over the same window.
    tokio::time::sleep(Duration::from_millis(150)).await;
    monitor.stop();

    let posted = world.posted();
    assert_eq!(posted.len(), 4);
    for (line, killer) in posted.iter().zip(["first", "second", "third", "fourth"]) {
        assert_eq!(
            line,
            &format!("⚔️ **{killer}** eliminated **Steve** with Diamond Sword!")
        );
    }
    assert_eq!(monitor.last_seen_timestamp(), 400);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let world = FakeWorld::default();
    world.push_kill("only", 100);
    let base = spawn_fake(world.clone()).await;

    let monitor = monitor(&base, "pvp");
    assert!(monitor.start().unwrap().is_success());
    assert_eq!(monitor.start().unwrap(), ToggleOutcome::AlreadyActive);
    assert_eq!(monitor.start().unwrap(), ToggleOutcome::AlreadyActive);

    wait_for_posts(&world, 1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    monitor.stop();

    // A duplicate poll task would have posted the kill twice.
    assert_eq!(world.posted().len(), 1);
}

#[tokio::test]
async fn test_stop_halts_deliveries() {
    let world = FakeWorld::default();
    world.push_kill("before", 100);
    let base = spawn_fake(world.clone()).await;

    let monitor = monitor(&base, "pvp");
    monitor.start().unwrap();
    wait_for_posts(&world, 1).await;

    assert_eq!(
        monitor.stop(),
        ToggleOutcome::Stopped {
            destination: "#pvp".into()
        }
    );
    assert!(!monitor.is_running());

    world.push_kill("after", 200);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(world.posted().len(), 1);

    // Restarting resumes from the retained watermark.
    monitor.start().unwrap();
    wait_for_posts(&world, 2).await;
    monitor.stop();
    assert!(world.posted()[1].contains("**after**"));
}

#[tokio::test]
async fn test_monitors_are_independent() {
    let world_a = FakeWorld::default();
    let world_b = FakeWorld::default();
    world_a.push_kill("a", 100);
    world_b.push_kill("b", 100);
    let base_a = spawn_fake(world_a.clone()).await;
    let base_b = spawn_fake(world_b.clone()).await;

    let monitor_a = monitor(&base_a, "alpha");
    let monitor_b = monitor(&base_b, "beta");
    monitor_a.start().unwrap();
    monitor_b.start().unwrap();
    wait_for_posts(&world_a, 1).await;
    wait_for_posts(&world_b, 1).await;

    monitor_a.stop();
    assert!(!monitor_a.is_running());
    assert!(monitor_b.is_running());

    world_b.push_kill("b2", 200);
    wait_for_posts(&world_b, 2).await;
    monitor_b.stop();

    assert_eq!(world_a.posted().len(), 1);
    assert!(world_b.posted()[1].contains("**b2**"));
}
