use home_presence::{api, config, control, state};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

fn init_tracing(level: &str) {
    let level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match config::load_default() {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            tracing::error!(error = %err, "Failed to load configuration");
            return Err(err.into());
        }
    };
    init_tracing(&config.logging.level);
    tracing::info!(app = %config.app.name, "home-presence starting");

    let members = config.members()?;
    let probe = config.probe();
    if probe.is_empty() {
        tracing::warn!("All probe mechanisms disabled, nobody will ever be seen");
    }
    let daylight = config.daylight()?;
    let lights = config.lights()?;
    let audit = config.audit();
    let settings = config.control_settings();
    let stale_after = config.health_stale_after(members.len());
    tracing::info!(
        members = members.len(),
        lights = ?config.lights.kind,
        debounce_secs = settings.departure_debounce.as_secs(),
        stale_after_secs = stale_after.as_secs(),
        "Configuration loaded"
    );

    let state = Arc::new(RwLock::new(
        state::AppState::new().with_stale_after(stale_after),
    ));
    let stop = Arc::new(AtomicBool::new(false));

    let mut control_loop =
        control::ControlLoop::new(members, probe, daylight, lights, audit, settings)
            .with_shared_state(Arc::clone(&state));
    let loop_stop = Arc::clone(&stop);
    let loop_handle = std::thread::spawn(move || control_loop.run(&loop_stop));

    match config.server_port() {
        Some(port) => {
            let app = api::router(Arc::clone(&state));
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "Status API listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        None => shutdown_signal().await,
    }

    stop.store(true, Ordering::Relaxed);
    if loop_handle.join().is_err() {
        tracing::error!("Control loop thread panicked");
    }
    tracing::info!("home-presence stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt received, shutting down"),
        Err(err) => tracing::error!(error = %err, "Failed to listen for interrupt"),
    }
}
