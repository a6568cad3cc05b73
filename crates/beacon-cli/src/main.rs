//! # beacon
//!
//! Beacon binary. Runs the notification server, a terminal dashboard
//! listener, or one-shot dispatch commands against a running server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use beacon_client::{ClientEvent, LogNotifier, NotificationClient};
use beacon_core::ServerMessage;
use beacon_core::logging::init_subscriber;
use beacon_server::config::ServerConfig;
use beacon_server::metrics;
use beacon_server::server::BeaconServer;
use beacon_settings::BeaconSettings;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio::sync::broadcast;

/// Beacon real-time notification service.
#[derive(Parser, Debug)]
#[command(name = "beacon", about = "Beacon real-time notification service")]
struct Cli {
    /// Settings file (defaults to `~/.beacon/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the WebSocket/HTTP server.
    Serve {
        /// Host to bind.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
        /// Maximum concurrent connections.
        #[arg(long)]
        max_connections: Option<usize>,
    },
    /// Connect as a dashboard and log everything received.
    Listen {
        /// WebSocket endpoint.
        #[arg(long)]
        url: Option<String>,
        /// Identity to join as.
        #[arg(long)]
        identity: Option<String>,
    },
    /// Broadcast a manual test alert.
    TestAlert {
        /// Server base URL.
        #[arg(long)]
        server: Option<String>,
        /// Alert description.
        #[arg(long, default_value = "Test alert")]
        message: String,
        /// Alert severity (0-10).
        #[arg(long, default_value_t = 8)]
        severity: i64,
    },
    /// Send a notification to one identity's room.
    Notify {
        /// Server base URL.
        #[arg(long)]
        server: Option<String>,
        /// Target identity.
        #[arg(long)]
        room: String,
        /// Notification title.
        #[arg(long)]
        title: String,
        /// Notification body.
        #[arg(long, default_value = "")]
        message: String,
    },
}

fn load(path: Option<&PathBuf>) -> Result<BeaconSettings> {
    let settings = match path {
        Some(path) => beacon_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => beacon_settings::load_settings().context("Failed to load settings")?,
    };
    Ok(settings)
}

/// HTTP base URL for a server bound per `settings`.
fn default_base_url(settings: &BeaconSettings) -> String {
    let host = match settings.server.host.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        host => host,
    };
    format!("http://{host}:{}", settings.server.port)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(cli.config.as_ref())?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    match cli.command {
        Command::Serve {
            host,
            port,
            max_connections,
        } => {
            let mut server = settings.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            if let Some(max) = max_connections {
                server.max_connections = max;
            }
            serve(ServerConfig::from(&server)).await
        }
        Command::Listen { url, identity } => {
            let mut client = settings.client.clone();
            if let Some(url) = url {
                client.server_url = url;
            }
            if identity.is_some() {
                client.identity = identity;
            }
            listen(&client).await
        }
        Command::TestAlert {
            server,
            message,
            severity,
        } => {
            let base = server.unwrap_or_else(|| default_base_url(&settings));
            let body = json!({ "message": message, "severity": severity });
            post(&base, "/api/alerts/test", &body).await
        }
        Command::Notify {
            server,
            room,
            title,
            message,
        } => {
            let base = server.unwrap_or_else(|| default_base_url(&settings));
            let body = json!({ "room": room, "title": title, "message": message });
            post(&base, "/api/notifications", &body).await
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let handle = match metrics::install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics will be empty");
            metrics::detached_handle()
        }
    };
    let shutdown_timeout = config.shutdown_timeout();
    let server = BeaconServer::new(config).with_metrics(handle);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Beacon listening on http://{addr} (ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.shutdown_gracefully().await {
        tracing::warn!(timeout = ?shutdown_timeout, "sessions did not drain before timeout");
    }
    let _ = handle.await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn listen(settings: &beacon_settings::ClientSettings) -> Result<()> {
    let client = NotificationClient::from_settings(settings, Arc::new(LogNotifier));
    let mut events = client.subscribe();
    let cancel = client.cancel_token();

    let _ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let store = Arc::clone(client.store());
    let printer = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event {
                ClientEvent::Connected => tracing::info!("connected"),
                ClientEvent::Disconnected { retry_in } => {
                    tracing::info!(?retry_in, "disconnected");
                }
                ClientEvent::Received(message) => {
                    if let Some(line) = render(&message) {
                        println!("{line}");
                    }
                    let store = store.lock();
                    tracing::debug!(
                        notifications = store.notifications().len(),
                        alerts = store.alerts().len(),
                        "store updated"
                    );
                }
            }
        }
    });

    tracing::info!(url = %settings.server_url, identity = ?settings.identity, "listening");
    client.run().await;
    printer.abort();
    Ok(())
}

/// One terminal line for a received frame, or `None` for bookkeeping frames.
fn render(message: &ServerMessage) -> Option<String> {
    match message {
        ServerMessage::GlobalAlert(alert) => Some(format!(
            "[{}] {} ({}/10, {}): {}",
            alert.severity.level().as_str().to_ascii_uppercase(),
            alert.title,
            alert.severity.value(),
            alert.source,
            alert.description
        )),
        ServerMessage::Notification(event) => {
            Some(format!("[notification] {}: {}", event.title, event.message))
        }
        ServerMessage::Joined { room } => Some(format!("joined room {room}")),
        ServerMessage::Error { code, message } => Some(format!("server error {code}: {message}")),
        ServerMessage::ConnectionEstablished { .. } | ServerMessage::Pong { .. } => None,
    }
}

async fn post(base: &str, path: &str, body: &Value) -> Result<()> {
    let url = format!("{}{path}", base.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .with_context(|| format!("Invalid response from {url}"))?;
    let pretty = serde_json::to_string_pretty(&payload)?;
    if !status.is_success() {
        bail!("{url} returned {status}: {pretty}");
    }
    println!("{pretty}");
    Ok(())
}
