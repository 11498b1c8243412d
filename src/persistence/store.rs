//! SQLite-based startup history store

use crate::core::{PhaseKind, StartupStatus};
use crate::persistence::{PersistenceBackend, StartupSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// SQLite startup store
pub struct SqliteStartupStore {
    pool: SqlitePool,
}

impl SqliteStartupStore {
    /// Open (creating if needed) a store at `db_path`; `:memory:` works too
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);
        // One writer per launcher; also keeps `:memory:` on a single database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Default location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("launcher")
            .join("history.db")
    }

    /// Open the store at `path`, or at [`Self::default_path`]
    pub async fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory {}", parent.display())
                })?;
            }
        }
        let db_path = db_path
            .to_str()
            .with_context(|| format!("History path is not valid UTF-8: {}", db_path.display()))?;
        Self::new(db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS startups (
                id TEXT PRIMARY KEY,
                sequence_name TEXT NOT NULL,
                status TEXT NOT NULL,
                failed_phase TEXT,
                exit_code INTEGER,
                error TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_startups_started_at ON startups(started_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn from_row(row: &SqliteRow) -> Result<StartupSummary> {
        let status: String = row.get("status");
        Ok(StartupSummary {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            sequence_name: row.get("sequence_name"),
            status: StartupStatus::parse(&status)
                .with_context(|| format!("Unknown startup status '{}'", status))?,
            failed_phase: row
                .get::<Option<String>, _>("failed_phase")
                .as_deref()
                .and_then(PhaseKind::parse),
            exit_code: row.get::<Option<i64>, _>("exit_code").map(|c| c as i32),
            error: row.get("error"),
            started_at: Self::from_naive(row.get("started_at")),
            finished_at: row
                .get::<Option<NaiveDateTime>, _>("finished_at")
                .map(Self::from_naive),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStartupStore {
    async fn save_run(&self, run: &StartupSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO startups
            (id, sequence_name, status, failed_phase, exit_code, error, started_at, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(&run.sequence_name)
        .bind(run.status.as_str())
        .bind(run.failed_phase.map(|p| p.as_str()))
        .bind(run.exit_code.map(i64::from))
        .bind(&run.error)
        .bind(Self::to_naive(run.started_at))
        .bind(run.finished_at.map(Self::to_naive))
        .execute(&self.pool)
        .await
        .context("Failed to save startup")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<StartupSummary>> {
        let row = sqlx::query(
            r#"
            SELECT id, sequence_name, status, failed_phase, exit_code, error, started_at, finished_at
            FROM startups
            WHERE id = ?1
            "#,
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load startup")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StartupSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence_name, status, failed_phase, exit_code, error, started_at, finished_at
            FROM startups
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list startups")?;

        rows.iter().map(Self::from_row).collect()
    }
}
