// ============================
// authgate-bin/src/main.rs
// ============================
//! `authgate` command line: run the server and manage user records.
use anyhow::Context;
use authgate_backend::{
    config::{LogFormat, LoggingSettings, Settings},
    create_router,
    fixtures::{self, DEFAULT_USER_COUNT},
    session::MemorySessionStore,
    storage::{new_credential, FlatFileUserStore, UserStore},
    AppState,
};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "authgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./config.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Print fake users as CSV on stdout
    GenerateUsers {
        #[arg(default_value_t = DEFAULT_USER_COUNT)]
        count: usize,
    },

    /// Create one credential record
    AddUser {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create credential records from a CSV written by `generate-users`
    ImportUsers { file: PathBuf },
}

fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let json = logging.format == LogFormat::Json;

    // stdout is reserved for command output
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::GenerateUsers { count } = cli.command {
        let users = fixtures::generate_users(count, &mut rand::rng());
        fixtures::write_csv(&users, std::io::stdout().lock())?;
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&settings.logging);

    match cli.command {
        Commands::Serve => serve(settings).await,
        Commands::AddUser { username, password } => add_user(&settings, &username, &password).await,
        Commands::ImportUsers { file } => import_users(&settings, &file).await,
        Commands::GenerateUsers { .. } => Ok(()),
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let cleanup_every = settings.session.cleanup_interval();

    let state = Arc::new(AppState::from_settings(settings).await?);

    MemorySessionStore::spawn_cleanup_task(Arc::clone(&state.sessions), cleanup_every);
    let limiter = Arc::clone(&state.auth_rate_limiter);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_every);
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    });

    let app = create_router(state);

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn add_user(settings: &Settings, username: &str, password: &str) -> anyhow::Result<()> {
    let users = FlatFileUserStore::new(&settings.storage.path)?;
    let hasher = settings.password.hasher()?;

    let record = new_credential(
        &hasher,
        username,
        password,
        Some(&settings.password.requirements),
    )?;
    users.insert(record).await?;

    tracing::info!(target: "authgate::security", username, "user created");
    Ok(())
}

async fn import_users(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let users = FlatFileUserStore::new(&settings.storage.path)?;
    let hasher = settings.password.hasher()?;

    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let rows = fixtures::parse_csv(&text)?;

    let summary = fixtures::import_users(&users, &hasher, &rows).await?;
    tracing::info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "import finished"
    );
    Ok(())
}
