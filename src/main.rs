use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use media_console::config::{AppConfig, DEFAULT_AUTH_SECRET};
use media_console::routes::routes::routes;
use media_console::services::blob_store::DiskBlobStore;
use media_console::services::catalog::SqliteCatalog;
use media_console::services::identity::LocalIdentity;
use media_console::services::lifecycle::LifecycleManager;
use media_console::services::probe::{FfmpegProbe, PROBE_TIMEOUT};
use media_console::services::uploader::{UploadPipeline, UploadRegistry};
use media_console::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting media-console on {} (storage: {}, db: {})",
        cfg.addr(),
        cfg.storage_dir,
        cfg.database_url
    );
    if cfg.auth_secret == DEFAULT_AUTH_SECRET {
        tracing::warn!(
            "Running with the built-in auth secret; set MEDIA_CONSOLE_AUTH_SECRET for real deployments"
        );
    }

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    tracing::debug!("Connecting using raw URL => {}", db_url);

    // Extract the local file path SQLx will use
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    let db_path_obj = Path::new(db_path);
    if let Some(parent) = db_path_obj.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    // Try opening manually before SQLx
    match std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(db_path)
    {
        Ok(_) => tracing::debug!("File can be created/opened successfully."),
        Err(e) => tracing::warn!("Failed to open file manually: {}", e),
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize services ---
    let catalog = Arc::new(SqliteCatalog::new(db.clone()));
    catalog.refresh().await?;

    let blobs = Arc::new(DiskBlobStore::new(
        db.clone(),
        cfg.storage_dir.clone(),
        cfg.public_url.clone(),
    ));
    let identity = Arc::new(LocalIdentity::new(
        &cfg.auth_secret,
        cfg.accounts.clone(),
        cfg.auth_tokens.clone(),
        cfg.session_ttl_minutes,
    ));
    let probe = Arc::new(FfmpegProbe::new(
        Path::new(&cfg.storage_dir).join(".spool"),
        PROBE_TIMEOUT,
    ));

    let uploads = UploadRegistry::new();
    let pipeline = Arc::new(UploadPipeline::new(
        catalog.clone(),
        blobs.clone(),
        probe,
        uploads.clone(),
    ));
    let lifecycle = Arc::new(LifecycleManager::new(catalog.clone(), blobs.clone()));

    let state = AppState {
        catalog,
        blobs,
        identity,
        pipeline,
        lifecycle,
        uploads,
        db,
        storage_dir: cfg.storage_dir.clone().into(),
    };

    // --- Build router ---
    let app: Router = routes(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations manually from the SQL file on disk.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let path = "migrations/0001_init.sql";

    if !Path::new(path).exists() {
        anyhow::bail!("Migration file not found: {}", path);
    }

    let sql = fs::read_to_string(path)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}
