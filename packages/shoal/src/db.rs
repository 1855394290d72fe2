use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::ShoalConfig;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &ShoalConfig) -> Result<Self> {
        info!("Connecting to database: {}", config.db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .connect(&config.db_url())
            .await
            .with_context(|| format!("Failed to connect to database: {}", config.db_url()))?;

        self::run_migrations(&pool).await?;

        // Pragmas for a write-mostly append log
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA temp_store = MEMORY")
            .execute(&pool)
            .await?;

        info!("Database initialized");

        Ok(Self { pool })
    }
}

/// Current schema version - increment when adding migrations
const SCHEMA_VERSION: i64 = 1;

pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL DEFAULT (unixepoch()),
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    if current_version > SCHEMA_VERSION {
        anyhow::bail!(
            "Database schema version {} is newer than supported version {}. Please upgrade the application.",
            current_version,
            SCHEMA_VERSION
        );
    }

    if current_version == SCHEMA_VERSION {
        return Ok(());
    }

    info!(
        "Migrating database from version {} to {}",
        current_version, SCHEMA_VERSION
    );

    // The message log is append-only: no update or delete path exists, so the
    // rowid doubles as the authoritative insertion order.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user TEXT NOT NULL,
            text TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_messages_timestamp ON chat_messages(timestamp)")
        .execute(pool)
        .await?;

    sqlx::query("INSERT INTO schema_version (version, description) VALUES (?, ?)")
        .bind(SCHEMA_VERSION)
        .bind("initial message log schema")
        .execute(pool)
        .await?;

    Ok(())
}
