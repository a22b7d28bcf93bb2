//! # Bass Indicator - Main Application Entry Point
//!
//! Real-time bass-hit detector. Audio blocks are delayed, lowpass filtered and
//! peak-thresholded; every detected hit becomes a one-byte UDP marker that the
//! `listen` side turns into an LED blink.
//!
//! ## Commands:
//! - `detect` (default): run the detection pipeline and the read-only HTTP surface
//! - `listen`: receive markers and drive the configured indicators
//! - `print-config`: print the effective configuration as TOML and exit
//!
//! ## Application Architecture:
//! - **config**: configuration (defaults + config.toml + `APP_` environment variables)
//! - **audio**: delay line, filter cascade, peak detector, stream processor, capture
//! - **notifier**: non-blocking UDP marker sender
//! - **indicator**: LED backends, debouncer and the marker listener
//! - **state**: pipeline counters and the state shared with HTTP handlers
//! - **health** / **handlers**: HTTP endpoints for monitoring and visualization
//! - **error**: custom error types and HTTP error responses

mod audio;
mod config;
mod error;
mod handlers;
mod health;
mod indicator;
mod notifier;
mod state;

use actix_cors::Cors;
use actix_web::{dev::Server, web, App, HttpServer};
use anyhow::{bail, Context, Result};
use audio::capture::{spawn_capture, CaptureOptions};
use audio::processor::StreamProcessor;
use audio::source::open_source;
use config::AppConfig;
use notifier::UdpNotifier;
use state::{AppState, PipelineStats};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Detect,
    Listen,
    PrintConfig,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("detect") => Ok(Command::Detect),
            Some("listen") => Ok(Command::Listen),
            Some("print-config") => Ok(Command::PrintConfig),
            Some(other) => bail!(
                "Unknown command '{}'. Usage: bass-indicator [detect|listen|print-config]",
                other
            ),
        }
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing()?;

    let command = Command::parse(std::env::args().nth(1).as_deref())?;
    let config = AppConfig::load()?;

    match command {
        Command::Detect => run_detect(config).await,
        Command::Listen => run_listen(config).await,
        Command::PrintConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Run the detection pipeline until a signal arrives or the source ends.
///
/// ## Lifecycle:
/// 1. Validate the configuration; any problem stops the process before audio flows
/// 2. Build the notifier, the processor and the block source
/// 3. Bind the HTTP surface (if enabled), then start the capture thread
/// 4. Wait for SIGINT/SIGTERM or the end of the stream
/// 5. Stop the server, raise the shutdown flag and join the capture thread
async fn run_detect(config: AppConfig) -> Result<()> {
    config.validate()?;

    info!("Starting bass-indicator v{}", env!("CARGO_PKG_VERSION"));
    info!(
        sample_rate = config.audio.sample_rate,
        block_size = config.audio.block_size,
        channel = config.audio.channel,
        delay_samples = config.delay_samples(),
        threshold = config.pipeline.threshold,
        "Pipeline configured"
    );

    let stats = Arc::new(PipelineStats::default());

    let bind: SocketAddr = config
        .notifier
        .bind
        .parse()
        .with_context(|| format!("Invalid notifier bind address {}", config.notifier.bind))?;
    let notifier = UdpNotifier::new(
        bind,
        config.notifier_destinations()?,
        config.notifier.marker,
        stats.clone(),
    )
    .context("Failed to create UDP notifier")?;

    let processor = StreamProcessor::new(&config, notifier, stats.clone())?;
    let history = processor.history_reader();
    let source = open_source(&config.source, &config.audio)?;

    let server = if config.server.enabled {
        let app_state = AppState::new(config.clone(), stats.clone(), history);
        Some(start_server(&config, app_state)?)
    } else {
        info!("HTTP server disabled");
        None
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone());

    let options = CaptureOptions {
        block_size: config.audio.block_size,
        channel: config.audio.channel,
        pacing: config.source.realtime.then(|| config.block_period()),
    };
    let capture = spawn_capture(source, processor, options, shutdown.clone())
        .context("Failed to spawn capture thread")?;

    match server {
        Some(server) => {
            let server_handle = server.handle();
            let server_task = tokio::spawn(server);

            tokio::select! {
                result = server_task => {
                    match result {
                        Ok(Err(e)) => error!("Server error: {}", e),
                        Err(e) => error!("Server task error: {}", e),
                        Ok(Ok(())) => {}
                    }
                }
                _ = wait_for_shutdown(&shutdown) => {
                    info!("Shutdown requested, stopping server...");
                    server_handle.stop(true).await;
                }
            }
        }
        None => wait_for_shutdown(&shutdown).await,
    }

    shutdown.store(true, Ordering::SeqCst);

    let joined = tokio::task::spawn_blocking(move || capture.join())
        .await
        .context("Failed to join capture thread")?;
    let summary = match joined {
        Ok(result) => result?,
        Err(_) => bail!("Capture thread panicked"),
    };

    let totals = stats.snapshot();
    info!(
        blocks = summary.blocks,
        events = summary.events,
        overruns = summary.overruns,
        notifications_sent = totals.notifications_sent,
        notifications_failed = totals.notifications_failed,
        "Detector stopped"
    );

    Ok(())
}

/// Bind the read-only HTTP surface. The server starts serving once awaited.
fn start_server(config: &AppConfig, app_state: AppState) -> Result<Server> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/display", web::get().to(handlers::get_display)),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .workers(1)
    .disable_signals()
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind HTTP server to {}", bind_addr))?
    .run();

    Ok(server)
}

/// Receive marker datagrams and pulse the indicators until a signal arrives.
async fn run_listen(config: AppConfig) -> Result<()> {
    info!("Starting bass-indicator listener v{}", env!("CARGO_PKG_VERSION"));

    let indicators = indicator::build_indicators(&config.indicator)?;
    if indicators.is_empty() {
        warn!("No indicators enabled; markers will only be counted");
    }

    let socket = tokio::net::UdpSocket::bind(&config.indicator.bind)
        .await
        .with_context(|| format!("Failed to bind listener to {}", config.indicator.bind))?;

    let summary = indicator::listener::run_listener(
        socket,
        config.notifier.marker,
        indicators,
        shutdown_signal(),
    )
    .await?;

    info!(
        markers = summary.markers,
        ignored = summary.ignored,
        fired = summary.fired,
        "Listener stopped"
    );

    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: controls what gets logged (e.g. "debug", "bass_indicator=debug")
/// - If not set, defaults to "bass_indicator=info,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bass_indicator=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Completes on SIGINT or SIGTERM. If a handler cannot be installed that
/// branch never completes and the other one still works.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Raise `shutdown` once a termination signal arrives.
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown flag, set either by a signal or by the capture
/// thread when the source runs dry.
async fn wait_for_shutdown(shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
