//! Ticketline CLI entry point.
//!
//! Provides `start`, `migrate`, and `check-config` subcommands for running the
//! webhook server, preparing the database, or validating configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use ticketline::config::{config_path_with, Config};
use ticketline::directory::{CustomerDirectory, StaticDirectory};
use ticketline::dispatch::Dispatcher;
use ticketline::notify::{LogNotifier, Notifier, SmtpNotifier, SmtpSettings};
use ticketline::pipeline::classifier::KeywordClassifier;
use ticketline::pipeline::dedup::DedupWindow;
use ticketline::pipeline::recency::{spawn_sweeper, InMemoryRecencyStore, RecencyStore};
use ticketline::pipeline::{Pipeline, PipelineParts};
use ticketline::server::{build_router, serve, AppState};
use ticketline::store::sqlite::SqliteStore;
use ticketline::whatsapp::client::CloudApiClient;

/// Ticketline: WhatsApp webhook ticketing service.
#[derive(Parser)]
#[command(name = "ticketline", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the webhook server.
    Start,
    /// Create the database and apply the schema.
    Migrate,
    /// Load and validate configuration, then print the effective settings.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Command::Start => handle_start().await,
        Command::Migrate => handle_migrate().await,
        Command::CheckConfig => handle_check_config(),
    }
}

/// Run the webhook server until it exits.
async fn handle_start() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _logging_guard = ticketline::logging::init_production(Path::new(&config.logging.logs_dir))?;
    config.validate().context("invalid configuration")?;
    let secrets = config
        .resolve_secrets(|key| std::env::var(key).ok())
        .context("failed to resolve secrets")?;

    // Step 1: storage.
    let store = Arc::new(
        SqliteStore::open(Path::new(&config.storage.database_path))
            .await
            .with_context(|| format!("failed to open {}", config.storage.database_path))?,
    );

    // Step 2: optional collaborators.
    let directory: Option<Arc<dyn CustomerDirectory>> = match &config.directory.path {
        Some(path) => {
            let directory = StaticDirectory::load(Path::new(path))
                .with_context(|| format!("failed to load customer directory {path}"))?;
            Some(Arc::new(directory))
        }
        None => None,
    };

    let notifier: Arc<dyn Notifier> = match (&config.notify.smtp_host, &secrets.smtp_password) {
        (Some(host), Some(password)) => Arc::new(
            SmtpNotifier::new(&SmtpSettings {
                host: host.clone(),
                port: config.notify.smtp_port,
                username: config.notify.username.clone(),
                password: password.clone(),
                from: config.notify.from.clone(),
            })
            .context("failed to configure SMTP notifier")?,
        ),
        _ => Arc::new(LogNotifier),
    };

    // Step 3: pipeline.
    let client = CloudApiClient::new(
        config.whatsapp.api_base_url.clone(),
        config.whatsapp.phone_number_id.clone(),
        secrets.access_token,
    );
    let dispatcher = Dispatcher::new(
        client,
        store.clone(),
        notifier,
        config.whatsapp.business_phone_number.clone(),
        config.notify.operator_email.clone(),
    );

    let recency_ttl = chrono::Duration::try_hours(config.pipeline.recency_ttl_hours)
        .context("pipeline.recency_ttl_hours out of range")?;
    let recency: Arc<dyn RecencyStore> = Arc::new(InMemoryRecencyStore::new(recency_ttl));
    let _sweeper = spawn_sweeper(
        Arc::clone(&recency),
        StdDuration::from_secs(config.pipeline.recency_sweep_secs),
    );

    let classifier = Arc::new(KeywordClassifier::new().context("failed to build classifier")?);

    let pipeline = Pipeline::new(PipelineParts {
        dedup: DedupWindow::new(config.pipeline.dedup_capacity),
        recency,
        classifier,
        store,
        directory,
        dispatcher,
        business_number: config.whatsapp.business_phone_number.clone(),
    });

    // Step 4: serve.
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let router = build_router(AppState {
        pipeline: Arc::new(pipeline),
        verify_token: Arc::from(secrets.verify_token),
    });

    info!(%addr, database = %config.storage.database_path, "ticketline starting");
    serve(addr, router).await
}

/// Create the database file and apply the schema.
async fn handle_migrate() -> anyhow::Result<()> {
    ticketline::logging::init_cli();
    let config = Config::load().context("failed to load configuration")?;
    SqliteStore::open(Path::new(&config.storage.database_path))
        .await
        .with_context(|| format!("failed to open {}", config.storage.database_path))?;
    info!(database = %config.storage.database_path, "schema applied");
    Ok(())
}

/// Validate configuration and print the non-secret settings.
fn handle_check_config() -> anyhow::Result<()> {
    ticketline::logging::init_cli();
    let env = |key: &str| std::env::var(key).ok();
    let path = config_path_with(env);
    let config = Config::load_with(env).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    config
        .resolve_secrets(env)
        .context("failed to resolve secrets")?;

    println!("config file:        {}", path.display());
    println!("listen:             {}:{}", config.server.host, config.server.port);
    println!("api base url:       {}", config.whatsapp.api_base_url);
    println!("phone number id:    {}", config.whatsapp.phone_number_id);
    println!("business phone:     {}", config.whatsapp.business_phone_number);
    println!("database:           {}", config.storage.database_path);
    println!(
        "directory:          {}",
        config.directory.path.as_deref().unwrap_or("(none)")
    );
    println!(
        "operator email:     {}",
        config.notify.operator_email.as_deref().unwrap_or("(none)")
    );
    println!(
        "smtp host:          {}",
        config.notify.smtp_host.as_deref().unwrap_or("(log only)")
    );
    println!("dedup capacity:     {}", config.pipeline.dedup_capacity);
    println!("recency ttl hours:  {}", config.pipeline.recency_ttl_hours);
    println!("recency sweep secs: {}", config.pipeline.recency_sweep_secs);
    println!("logs dir:           {}", config.logging.logs_dir);
    Ok(())
}
