//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p space_client -- [--addr 127.0.0.1:40000] [--config client.json] [--frame-hz 60]
//!
//! The client connects to the server, reconciles incoming snapshots into its
//! entity registry and interpolates every entity once per frame. Rendering
//! goes through a null backend; the player's ship is logged once a second.

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use space_client::client::{ClientState, GameClient};
use space_client::render::{render_frame, NullRenderer};
use space_shared::config::ClientConfig;
use tracing::{debug, info};

fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    // The config file is the base; explicit flags override it.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => ClientConfig::load(&PathBuf::from(&args[i + 1]))?,
        _ => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--frame-hz" if i + 1 < args.len() => {
                cfg.frame_hz = args[i + 1].parse().unwrap_or(cfg.frame_hz);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args().context("parse args")?;
    info!(
        server = %cfg.server_addr,
        frame_hz = cfg.frame_hz,
        interpolation_ms = cfg.interpolation_window_ms,
        "Starting client"
    );

    let mut client = GameClient::connect(&cfg).await.context("connect")?;
    let mut renderer = NullRenderer;

    let frame_interval = cfg.frame_interval();
    let mut next_frame = tokio::time::Instant::now();
    let mut last_report = Instant::now();

    loop {
        client.poll_reliable();
        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }

        if let Err(e) = client.poll_snapshots().await {
            println!("Snapshot error: {}", e);
        }

        let now = Instant::now();
        client.frame(now);
        render_frame(&client.entities, &mut renderer);

        for event in client.entities.drain_events() {
            debug!(?event, "Entity event");
        }

        if now.duration_since(last_report) >= Duration::from_secs(1) {
            last_report = now;
            match client.entities.player_entity() {
                Some(me) => {
                    let pos = me.position();
                    let hp = me.health_percentage();
                    info!(
                        x = pos.x,
                        y = pos.y,
                        z = pos.z,
                        shield = hp.shield,
                        armor = hp.armor,
                        hull = hp.hull,
                        entities = client.entities.len(),
                        "Player ship"
                    );
                }
                None => info!(entities = client.entities.len(), "Player ship not in view"),
            }
        }

        next_frame += frame_interval;
        tokio::time::sleep_until(next_frame).await;
    }

    Ok(())
}
