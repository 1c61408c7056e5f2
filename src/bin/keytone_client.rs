//! Keytone Client - terminal front end
//!
//! Streams keystrokes typed on stdin to the Keytone server and logs the
//! emotion estimates and music it sends back.
//!
//! Usage:
//!   ./keytone_client                               # config/keytone.yaml
//!   KEYTONE_CONFIG_PATH=my.yaml ./keytone_client
//!
//! Lines starting with `/` are commands: `/generate`, `/new`, `/end`, `/stats`.

use anyhow::Result;
use keytone_client::bin_common::{
    init_tracing, load_config_from_env, AppConfig, ConfigType, ShutdownManager,
};
use keytone_client::keytone_api::ApiClient;
use keytone_client::keytone_sessions::SessionManager;
use keytone_client::pulsesocket::*;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const NAME: &str = "Keytone Client";

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    let config_path = load_config_from_env(ConfigType::App);
    let config = AppConfig::load(&config_path)?;

    init_tracing(&config.log_level);
    config.log();
    print_banner();

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.spawn_signal_handler();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = Arc::new(SessionManager::from_config(
        config.sessions.clone(),
        Arc::clone(&clock),
    )?);
    let scheduler = sessions.spawn_scheduler();
    let api = ApiClient::new(config.api.clone())?;

    let client = RealtimeClient::builder()
        .config(config.realtime.clone())
        .clock(clock)
        .session_source(Arc::clone(&sessions) as Arc<dyn SessionSource>)
        .build()?;

    let last_emotion = Arc::new(Mutex::new(None));
    register_routes(&client, &sessions, &last_emotion);
    wire_sessions(&client, &sessions);

    client.on_connect(|event| info!("Connected at {}", event.connected_at));
    client.on_disconnect(|event| {
        warn!(
            "Disconnected (code {}, clean: {}) {}",
            event.code, event.was_clean, event.reason
        )
    });

    if sessions.active_session().is_none() {
        let record = sessions.create_session()?;
        let response = api.post::<Value, _>("sessions", &record, None).await;
        if !response.success {
            warn!(
                "Session {} not registered with API: {}",
                record.id,
                response.error.unwrap_or_default()
            );
        }
    }

    client.connect();
    let stats_reporter = spawn_stats_reporter(&client, Duration::from_secs(60));
    let input = tokio::spawn(forward_stdin(
        client.clone(),
        Arc::clone(&sessions),
        Arc::clone(&last_emotion),
        Arc::clone(&shutdown),
    ));

    while shutdown.is_running() {
        while let Some(event) = client.try_recv_event() {
            log_event(&event);
        }
        shutdown.interruptible_sleep(Duration::from_millis(250)).await;
    }

    input.abort();
    stats_reporter.abort();
    scheduler.abort();
    client.disconnect();

    print_shutdown(&client.stats());
    Ok(())
}

fn register_routes(
    client: &RealtimeClient,
    sessions: &Arc<SessionManager>,
    last_emotion: &Arc<Mutex<Option<EmotionData>>>,
) {
    let latest = Arc::clone(last_emotion);
    client.add_route(
        MessageKind::Emotion,
        handler_fn(move |envelope| {
            if let Payload::Emotion(data) = envelope.payload() {
                info!(
                    "Emotion: energy={:.2} valence={:.2} tension={:.2} focus={:.2}",
                    data.energy, data.valence, data.tension, data.focus
                );
                *latest.lock() = Some(*data);
            }
            Ok(())
        }),
        0,
    );

    let manager = Arc::clone(sessions);
    client.add_route(
        MessageKind::Music,
        handler_fn(move |envelope| {
            match envelope.payload() {
                Payload::Music(MusicData::Progress {
                    request_id,
                    progress,
                }) => info!("Music {}: {:.0}%", request_id, progress * 100.0),
                Payload::Music(MusicData::Completed {
                    request_id, url, ..
                }) => {
                    info!("Music {} ready: {}", request_id, url);
                    if let Err(e) = manager.record_generated_music() {
                        warn!("Failed to record generated music: {}", e);
                    }
                }
                Payload::Music(MusicData::Failed { request_id, reason }) => {
                    warn!("Music {} failed: {}", request_id, reason)
                }
                _ => {}
            }
            Ok(())
        }),
        0,
    );

    client.add_route(
        MessageKind::Error,
        handler_fn(|envelope| {
            if let Payload::Error(data) = envelope.payload() {
                error!(
                    "Server error {}: {}",
                    data.code.as_deref().unwrap_or("-"),
                    data.message
                );
            }
            Ok(())
        }),
        0,
    );

    client.add_route(
        MessageKind::ConnectionEstablished,
        handler_fn(|envelope| {
            if let Payload::ConnectionEstablished(data) = envelope.payload() {
                info!(
                    "Server accepted connection {}",
                    data.connection_id.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }),
        0,
    );
}

/// Announce session changes to the server
fn wire_sessions(client: &RealtimeClient, sessions: &Arc<SessionManager>) {
    let weak = client.downgrade();
    sessions.on_change(move |current| {
        let (Some(client), Some(record)) = (weak.upgrade(), current) else {
            return;
        };
        if let Err(e) = client.send_session_update(record.to_update()) {
            warn!("Failed to announce session update: {}", e);
        }
    });

    sessions.on_expired(|record| {
        info!(
            "Session {} expired ({} pieces generated), type /new to start another",
            record.id, record.generated_music_count
        )
    });
}

async fn forward_stdin(
    client: RealtimeClient,
    sessions: Arc<SessionManager>,
    last_emotion: Arc<Mutex<Option<EmotionData>>>,
    shutdown: Arc<ShutdownManager>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_key = Instant::now();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        if let Some(command) = line.strip_prefix('/') {
            run_command(command.trim(), &client, &sessions, &last_emotion);
            continue;
        }

        for ch in line.chars() {
            let now = Instant::now();
            let typing = TypingData {
                keystroke: ch.to_string(),
                duration: 0.0,
                interval: now.duration_since(last_key).as_secs_f64() * 1_000.0,
                is_backspace: ch == '\u{8}',
            };
            last_key = now;

            if let Err(e) = client.send_typing_event(typing) {
                warn!("Keystroke not sent: {}", e);
                break;
            }
        }
    }

    info!("Input closed");
    shutdown.trigger();
}

fn run_command(
    command: &str,
    client: &RealtimeClient,
    sessions: &SessionManager,
    last_emotion: &Mutex<Option<EmotionData>>,
) {
    match command {
        "generate" => {
            let Some(emotion) = *last_emotion.lock() else {
                warn!("No emotion estimate yet, keep typing");
                return;
            };
            let request = GenerationRequest {
                request_id: format!("req_{}", client.now_ms()),
                emotion,
                style: None,
                duration_secs: None,
            };
            match client.request_music_generation(request) {
                Ok(outcome) => info!("Generation requested ({:?})", outcome),
                Err(e) => warn!("Generation not requested: {}", e),
            }
        }
        "new" => match sessions.create_session() {
            Ok(record) => info!("Started session {}", record.id),
            Err(e) => error!("Failed to start session: {}", e),
        },
        "end" => match sessions.end_session() {
            Ok(Some(record)) => info!("Ended session {}", record.id),
            Ok(None) => info!("No active session"),
            Err(e) => error!("Failed to end session: {}", e),
        },
        "stats" => {
            info!("{:?}", client.stats());
            info!("{:?}", client.backpressure());
        }
        other => warn!("Unknown command '/{}'", other),
    }
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::Reconnecting { attempt, delay } => {
            info!("Reconnecting in {:?} (attempt {})", delay, attempt)
        }
        ClientEvent::ReconnectExhausted { attempts } => {
            error!("Gave up after {} reconnect attempts, type /stats or restart", attempts)
        }
        ClientEvent::Backpressure(true) => warn!("Outbound queue under backpressure"),
        ClientEvent::Backpressure(false) => info!("Outbound queue recovered"),
        _ => {}
    }
}

fn print_banner() {
    info!("");
    info!("========================================");
    info!("Starting {}", NAME);
    info!("Type to stream keystrokes, /generate for music");
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(stats: &ConnectionStats) {
    info!("");
    info!("========================================");
    info!("{} stopped gracefully", NAME);
    info!(
        "Sent {} / received {} messages, {} reconnects, {} errors",
        stats.messages_sent, stats.messages_received, stats.reconnect_count, stats.error_count
    );
    info!("========================================");
}
