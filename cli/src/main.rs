// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Thin binary entry point: parses [`config::Cli`], wires the library's
//! repositories and services together according to the configured storage
//! backend, and either runs the HTTP server or an administrative
//! subcommand. All domain and application logic lives in
//! `supernote-server-core`; this crate only assembles it.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use supernote_server_core::application::chunk_store::ChunkStore;
use supernote_server_core::application::event_bus::EventBus;
use supernote_server_core::application::file_service::FileService;
use supernote_server_core::application::ids::SnowflakeGenerator;
use supernote_server_core::application::integrity_service::IntegrityService;
use supernote_server_core::application::processor::ProcessorService;
use supernote_server_core::application::search_service::SearchService;
use supernote_server_core::application::sync_coordinator::SyncCoordinator;
use supernote_server_core::application::url_signer::UrlSigner;
use supernote_server_core::application::user_service::UserService;
use supernote_server_core::application::vfs_service::VfsService;
use supernote_server_core::domain::blob::BlobStore;
use supernote_server_core::domain::coordination::CoordinationService;
use supernote_server_core::domain::inference::InferenceService;
use supernote_server_core::domain::renderer::Renderer;
use supernote_server_core::domain::repository::{
    ChunkRepository, NotePageRepository, SummaryRepository, SyncLeaseRepository, SystemTaskRepository, UserRepository,
    VfsRepository,
};
use supernote_server_core::infrastructure::db::Database;
use supernote_server_core::infrastructure::inference::HttpInferenceService;
use supernote_server_core::infrastructure::renderer::PlaceholderRenderer;
use supernote_server_core::infrastructure::repositories::in_memory::{
    InMemoryChunkRepository, InMemoryCoordinationService, InMemoryNotePageRepository, InMemorySummaryRepository,
    InMemorySyncLeaseRepository, InMemorySystemTaskRepository, InMemoryUserRepository, InMemoryVfsRepository,
};
use supernote_server_core::infrastructure::repositories::postgres::{
    PostgresChunkRepository, PostgresCoordinationService, PostgresNotePageRepository, PostgresSummaryRepository,
    PostgresSyncLeaseRepository, PostgresSystemTaskRepository, PostgresUserRepository, PostgresVfsRepository,
};
use supernote_server_core::infrastructure::storage::local::LocalBlobStore;
use supernote_server_core::presentation;
use supernote_server_core::presentation::state::AppState;

use crate::config::{Cli, Commands, UserCommand};

/// Every repository/coordination seam, constructed once at startup from
/// either a Postgres pool or in-memory maps depending on whether
/// `--database-url` is set.
struct Repositories {
    users: Arc<dyn UserRepository>,
    vfs: Arc<dyn VfsRepository>,
    chunks: Arc<dyn ChunkRepository>,
    note_pages: Arc<dyn NotePageRepository>,
    tasks: Arc<dyn SystemTaskRepository>,
    summaries: Arc<dyn SummaryRepository>,
    sync_leases: Arc<dyn SyncLeaseRepository>,
    coordination: Arc<dyn CoordinationService>,
}

async fn build_repositories(cli: &Cli) -> Result<Repositories> {
    match &cli.database_url {
        Some(url) => {
            let db = Database::connect(url).await.context("failed to connect to Postgres")?;
            let pool = db.pool().clone();
            Ok(Repositories {
                users: Arc::new(PostgresUserRepository::new(pool.clone())),
                vfs: Arc::new(PostgresVfsRepository::new(pool.clone())),
                chunks: Arc::new(PostgresChunkRepository::new(pool.clone())),
                note_pages: Arc::new(PostgresNotePageRepository::new(pool.clone())),
                tasks: Arc::new(PostgresSystemTaskRepository::new(pool.clone())),
                summaries: Arc::new(PostgresSummaryRepository::new(pool.clone())),
                sync_leases: Arc::new(PostgresSyncLeaseRepository::new(pool.clone())),
                coordination: Arc::new(PostgresCoordinationService::new(pool)),
            })
        }
        None => {
            info!("no database configured; running against in-memory repositories (data is lost on restart)");
            Ok(Repositories {
                users: Arc::new(InMemoryUserRepository::new()),
                vfs: Arc::new(InMemoryVfsRepository::new()),
                chunks: Arc::new(InMemoryChunkRepository::new()),
                note_pages: Arc::new(InMemoryNotePageRepository::new()),
                tasks: Arc::new(InMemorySystemTaskRepository::new()),
                summaries: Arc::new(InMemorySummaryRepository::new()),
                sync_leases: Arc::new(InMemorySyncLeaseRepository::new()),
                coordination: Arc::new(InMemoryCoordinationService::new()),
            })
        }
    }
}

async fn build_state(cli: &Cli) -> Result<AppState> {
    let repos = build_repositories(cli).await?;
    let ids = Arc::new(SnowflakeGenerator::new(1));
    let blobs: Arc<dyn BlobStore> =
        Arc::new(LocalBlobStore::new(cli.blob_root.clone()).await.context("failed to initialize blob store")?);
    let events = Arc::new(EventBus::with_default_capacity());
    let signer = Arc::new(UrlSigner::new(
        cli.hmac_secret.clone().into_bytes(),
        Duration::from_secs(cli.signed_url_max_age_secs),
        Arc::clone(&repos.coordination),
    ));

    let vfs = Arc::new(VfsService::new(Arc::clone(&repos.vfs), Arc::clone(&ids)));
    let files = Arc::new(FileService::new(Arc::clone(&vfs), Arc::clone(&blobs), Arc::clone(&signer), Arc::clone(&events)));
    let users = Arc::new(UserService::new(Arc::clone(&repos.users), Arc::clone(&repos.coordination), ids));
    let sync = Arc::new(SyncCoordinator::new(Arc::clone(&repos.sync_leases)));
    let chunks = Arc::new(ChunkStore::new(Arc::clone(&repos.chunks), Arc::clone(&blobs)));

    let renderer: Arc<dyn Renderer> = Arc::new(PlaceholderRenderer);
    let inference: Arc<dyn InferenceService> = Arc::new(HttpInferenceService::new(
        cli.inference_endpoint.clone(),
        cli.inference_api_key.clone(),
        cli.inference_chat_model.clone(),
        cli.inference_embedding_model.clone(),
    ));

    let search = Arc::new(SearchService::new(Arc::clone(&repos.note_pages), Arc::clone(&inference)));
    let integrity = Arc::new(IntegrityService::new(Arc::clone(&repos.vfs), Arc::clone(&blobs)));

    let processor = ProcessorService::new(
        repos.vfs,
        Arc::clone(&blobs),
        repos.note_pages,
        repos.tasks,
        repos.summaries,
        renderer,
        inference,
        Arc::clone(&events),
        cli.processor_concurrency,
        Some(cli.inference_concurrency),
    );
    let processor = Arc::new(processor.spawn().await);

    Ok(AppState {
        vfs,
        files,
        users,
        sync,
        chunks,
        search,
        integrity,
        signer,
        blobs,
        events,
        processor,
        registration_enabled: cli.registration_enabled,
        lease_ttl: Duration::from_secs(cli.sync_lease_ttl_secs),
    })
}

async fn serve(cli: &Cli) -> Result<()> {
    let state = build_state(cli).await?;
    let app = presentation::router().layer(TraceLayer::new_for_http()).with_state(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "supernote-server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("HTTP server failed")?;
    Ok(())
}

async fn migrate(cli: &Cli) -> Result<()> {
    let url = cli.database_url.as_deref().context("migrate requires --database-url (or SUPERNOTE_DATABASE_URL)")?;
    let db = Database::connect(url).await?;
    db.migrate().await?;
    info!("schema applied");
    Ok(())
}

async fn user_command(cli: &Cli, command: &UserCommand) -> Result<()> {
    let repos = build_repositories(cli).await?;
    let ids = Arc::new(SnowflakeGenerator::new(1));
    let users = UserService::new(repos.users, repos.coordination, ids);

    match command {
        UserCommand::Add { email, password, display_name } => {
            let display_name = if display_name.is_empty() { email.clone() } else { display_name.clone() };
            let user = users.register(email, password, &display_name).await?;
            println!("created user {} (id={}, admin={})", user.email, user.id, user.is_admin);
        }
        UserCommand::List => {
            for user in users.list_users().await? {
                println!("{}\t{}\tactive={}\tadmin={}", user.id, user.email, user.is_active, user.is_admin);
            }
        }
        UserCommand::Deactivate { email } => {
            users.deactivate(email).await?;
            println!("deactivated {email}");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to build log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match &cli.command {
        Commands::Serve => serve(&cli).await,
        Commands::Migrate => migrate(&cli).await,
        Commands::User { command } => user_command(&cli, command).await,
    }
}
