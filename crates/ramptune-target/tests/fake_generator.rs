//! End-to-end tests against an in-process fake load generator.
//!
//! The fake serves `/stats` from a scripted list of target/compare rates
//! and records every rate it is told to send.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use ramptune_controller::{Driver, DriverError, DriverPhase, RunOutcome};
use ramptune_core::{TargetError, TargetSystem, TunerConfig, UpdateMode};
use ramptune_target::HttpTarget;
use serde_json::{json, Value};
use tokio::sync::watch;

#[derive(Default)]
struct Generator {
    /// (OfferReceived, DiscoverSent) rates, served in a cycle.
    script: Vec<(f64, f64)>,
    polls: usize,
    applied: Vec<u64>,
    fail_updates: bool,
}

type Shared = Arc<Mutex<Generator>>;

async fn stats(State(generator): State<Shared>) -> Json<Value> {
    let mut generator = generator.lock().unwrap();
    let (offer, discover) = generator.script[generator.polls % generator.script.len()];
    generator.polls += 1;
    Json(json!([
        {"stat_name": "DiscoverSent", "stat_value": 100, "stat_previous_ticker_value": 0, "stat_rate_per_second": discover},
        {"stat_name": "OfferReceived", "stat_value": 95, "stat_previous_ticker_value": 0, "stat_rate_per_second": offer},
        {"stat_name": "AckReceived", "stat_value": 0, "stat_previous_ticker_value": 0, "stat_rate_per_second": 0.0}
    ]))
}

async fn update_path(State(generator): State<Shared>, Path(value): Path<u64>) -> StatusCode {
    let mut generator = generator.lock().unwrap();
    if generator.fail_updates {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    generator.applied.push(value);
    StatusCode::OK
}

async fn update_json(State(generator): State<Shared>, Json(body): Json<Value>) -> (StatusCode, &'static str) {
    let mut generator = generator.lock().unwrap();
    match body.get("rps").and_then(Value::as_u64) {
        Some(rps) => {
            generator.applied.push(rps);
            (StatusCode::OK, "{\"status\": \"ok\"}")
        }
        None => (StatusCode::BAD_REQUEST, "missing rps"),
    }
}

async fn spawn_generator(generator: Generator) -> (SocketAddr, Shared) {
    let shared = Arc::new(Mutex::new(generator));
    let router = Router::new()
        .route("/stats", get(stats))
        .route("/update/rps/{value}", get(update_path))
        .route("/update", put(update_json))
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, shared)
}

fn config_for(addr: SocketAddr) -> TunerConfig {
    let mut config = TunerConfig::new("OfferReceived", "DiscoverSent");
    config.api_address = addr.ip().to_string();
    config.api_port = addr.port();
    config.poll_interval = Duration::from_millis(5);
    config.request_timeout = Duration::from_secs(2);
    config
}

#[tokio::test]
async fn fetches_and_parses_stats() {
    let (addr, _gen) = spawn_generator(Generator {
        script: vec![(95.0, 100.0)],
        ..Default::default()
    })
    .await;

    let target = HttpTarget::from_config(&config_for(addr));
    let snapshot = target.fetch_snapshot().await.unwrap();

    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.lookup("OfferReceived").unwrap().rate_per_second, 95.0);
    assert_eq!(snapshot.lookup("DiscoverSent").unwrap().value, Some(100));
}

#[tokio::test]
async fn applies_rate_by_path() {
    let (addr, generator) = spawn_generator(Generator {
        script: vec![(1.0, 1.0)],
        ..Default::default()
    })
    .await;

    let target = HttpTarget::from_config(&config_for(addr));
    target.apply_rate(0).await.unwrap();
    target.apply_rate(250).await.unwrap();

    assert_eq!(generator.lock().unwrap().applied, vec![0, 250]);
}

#[tokio::test]
async fn applies_rate_by_json() {
    let (addr, generator) = spawn_generator(Generator {
        script: vec![(1.0, 1.0)],
        ..Default::default()
    })
    .await;

    let mut config = config_for(addr);
    config.update_mode = UpdateMode::Json;
    let target = HttpTarget::from_config(&config);
    target.apply_rate(64).await.unwrap();

    assert_eq!(generator.lock().unwrap().applied, vec![64]);
}

#[tokio::test]
async fn non_2xx_is_status_error() {
    let (addr, _gen) = spawn_generator(Generator {
        script: vec![(1.0, 1.0)],
        fail_updates: true,
        ..Default::default()
    })
    .await;

    let target = HttpTarget::from_config(&config_for(addr));
    let err = target.apply_rate(3).await.unwrap_err();
    assert!(matches!(err, TargetError::Status { status: 500, .. }));

    let err = HttpTarget::new(addr.to_string(), Duration::from_secs(2), UpdateMode::Path)
        .update_rps(3)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("/update/rps/3"));
}

#[tokio::test]
async fn driver_converges_against_generator() {
    let (addr, generator) = spawn_generator(Generator {
        script: vec![(99.0, 100.0), (50.0, 100.0)],
        ..Default::default()
    })
    .await;

    let target = HttpTarget::from_config(&config_for(addr));
    let mut driver = Driver::new(target, config_for(addr));
    let (_tx, rx) = watch::channel(false);

    let outcome = driver.run(rx).await.unwrap();

    assert_eq!(outcome, RunOutcome::Converged { rate: 7, cycles: 14 });
    let generator = generator.lock().unwrap();
    assert_eq!(generator.polls, 14);
    assert_eq!(generator.applied, vec![1, 2, 1, 3, 2, 4, 4, 6, 5, 7, 6, 7, 7, 7]);
}

#[tokio::test]
async fn driver_fails_on_unknown_stat() {
    let (addr, generator) = spawn_generator(Generator {
        script: vec![(99.0, 100.0)],
        ..Default::default()
    })
    .await;

    let mut config = config_for(addr);
    config.target_stat_name = "NakReceived".into();
    config.prime = false;
    let mut driver = Driver::new(HttpTarget::from_config(&config), config);
    let (_tx, rx) = watch::channel(false);

    let err = driver.run(rx).await.unwrap_err();

    assert!(matches!(err, DriverError::Config(_)));
    assert!(matches!(driver.phase(), DriverPhase::Failed(_)));
    assert!(generator.lock().unwrap().applied.is_empty());
}

#[tokio::test]
async fn driver_fails_when_generator_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = config_for(addr);
    let mut driver = Driver::new(HttpTarget::from_config(&config), config);
    let (_tx, rx) = watch::channel(false);

    let err = driver.run(rx).await.unwrap_err();
    assert!(matches!(err, DriverError::Network(TargetError::Connect { .. })));
}
