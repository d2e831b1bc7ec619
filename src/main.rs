use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse::admission::AdmissionController;
use gatehouse::config::{FailurePolicy, GatehouseConfig};
use gatehouse::http::{self, AppState, HttpServer};
use gatehouse::login::{hash_password, LoginAttemptGate, StaticCredentials, ThrottledLogin};
use gatehouse::store::{CounterStore, MemoryStore, TimeoutStore};

#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about = "Login throttling and admission control service")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a password from stdin and print its argon2 hash
    HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::HashPassword) = cli.command {
        return print_password_hash();
    }

    init_tracing(cli.json_logs);

    info!("Starting Gatehouse");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GatehouseConfig::load(cli.config.as_deref())?;
    if let Some(addr) = cli.http_addr {
        config.server.http_addr = addr;
    }
    info!(
        http_addr = %config.server.http_addr,
        max_attempts = config.login.max_attempts,
        lock_minutes = config.login.lock_duration_minutes,
        bucket_capacity = config.admission.bucket_capacity,
        refill_per_second = config.admission.bucket_refill_per_second,
        "Configuration loaded"
    );
    match config.login.store_failure_policy {
        FailurePolicy::Closed => info!("Login store failure policy: closed (refuse attempts)"),
        FailurePolicy::Open => {
            warn!("Login store failure policy: open (attempts proceed unthrottled)")
        }
    }

    // Counter store shared by the login gate and admission control
    let memory = Arc::new(MemoryStore::new());
    let _sweeper = memory.spawn_sweeper(Duration::from_secs(config.store.sweep_interval_secs));
    let store: Arc<dyn CounterStore> = Arc::new(TimeoutStore::new(
        memory,
        Duration::from_millis(config.store.operation_timeout_ms),
    ));
    info!("Counter store initialized");

    let credentials = StaticCredentials::new(config.users.clone());
    if credentials.is_empty() {
        warn!("No users configured; every login will fail");
    } else {
        info!(users = credentials.len(), "Credential table loaded");
    }

    let gate = Arc::new(LoginAttemptGate::new(store.clone(), config.login.clone()));
    let login = Arc::new(ThrottledLogin::new(gate, Arc::new(credentials)));
    let admission = Arc::new(AdmissionController::new(store, &config.admission));

    let state = AppState::new(
        login,
        admission,
        config.server.clone(),
        config.admission.enabled,
    );
    let server = HttpServer::new(config.server.http_addr, http::router(state));

    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Gatehouse stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gatehouse=info,tower_http=info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_thread_ids(true)))
        .init();
}

fn print_password_hash() -> anyhow::Result<()> {
    eprint!("Enter password: ");
    io::stderr().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    println!("{}", hash_password(password)?);
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
