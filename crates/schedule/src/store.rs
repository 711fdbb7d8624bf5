//! SQLite-backed store for scheduled payments.
//!
//! One row per scheduled action. Status moves only along
//! `pending → executing → executed | failed` and `pending → cancelled`.
//! The pending→executing update is conditional on the current status, and
//! its affected-row count is the mutual exclusion that keeps an action
//! from being executed twice.
//!
//! Per currency, the sum of pending amounts is the reserved total that
//! balance validation subtracts from the live balance.

use chrono::{DateTime, Utc};
use ledgermind_core::error::ScheduleError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Lifecycle of a scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Executing,
    Executed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Executing => "executing",
            ActionStatus::Executed => "executed",
            ActionStatus::Failed => "failed",
            ActionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for ActionStatus {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActionStatus::Pending),
            "executing" => Ok(ActionStatus::Executing),
            "executed" => Ok(ActionStatus::Executed),
            "failed" => Ok(ActionStatus::Failed),
            "cancelled" => Ok(ActionStatus::Cancelled),
            other => Err(ScheduleError::Storage(format!("unknown status: {other}"))),
        }
    }
}

/// A payment scheduled for future execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub id: String,
    pub recipient: String,
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub note: String,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ActionStatus,
    #[serde(default)]
    pub error: String,
}

impl ScheduledAction {
    /// A new pending action due at `scheduled_at`.
    pub fn new(
        recipient: impl Into<String>,
        amount: impl Into<String>,
        currency: impl Into<String>,
        note: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient: recipient.into(),
            amount: amount.into(),
            currency: currency.into(),
            note: note.into(),
            scheduled_at,
            created_at: Utc::now(),
            status: ActionStatus::Pending,
            error: String::new(),
        }
    }
}

/// SQLite store for scheduled actions.
pub struct ActionStore {
    pool: SqlitePool,
}

impl ActionStore {
    /// Open (or create) the database at `path` and initialize the schema.
    /// Pass `":memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, ScheduleError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| ScheduleError::Storage(format!("invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Single connection: all mutations funnel through one writer, and
        // an in-memory database stays coherent across operations.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ScheduleError::Storage(format!("failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("scheduled-action store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), ScheduleError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scheduled_actions (
                id           TEXT PRIMARY KEY,
                recipient    TEXT NOT NULL,
                amount       TEXT NOT NULL,
                currency     TEXT NOT NULL,
                note         TEXT NOT NULL DEFAULT '',
                scheduled_at TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'pending',
                error        TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Storage(format!("scheduled_actions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scheduled_actions_status_due \
             ON scheduled_actions(status, scheduled_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Storage(format!("status index: {e}")))?;

        Ok(())
    }

    /// Insert a new action. Only pending rows may be created.
    pub async fn add(&self, action: &ScheduledAction) -> Result<(), ScheduleError> {
        if action.status != ActionStatus::Pending {
            return Err(ScheduleError::Storage(format!(
                "new actions must be pending, got {}",
                action.status
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO scheduled_actions
                (id, recipient, amount, currency, note, scheduled_at, created_at, status, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '')
            "#,
        )
        .bind(&action.id)
        .bind(&action.recipient)
        .bind(&action.amount)
        .bind(&action.currency)
        .bind(&action.note)
        .bind(action.scheduled_at.to_rfc3339())
        .bind(action.created_at.to_rfc3339())
        .bind(action.status.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Storage(format!("INSERT failed: {e}")))?;

        debug!(id = %action.id, due = %action.scheduled_at, "scheduled action added");
        Ok(())
    }

    /// Fetch one action by id.
    pub async fn get(&self, id: &str) -> Result<ScheduledAction, ScheduleError> {
        let row = sqlx::query("SELECT * FROM scheduled_actions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ScheduleError::Storage(format!("SELECT failed: {e}")))?;

        row.as_ref()
            .map(row_to_action)
            .transpose()?
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))
    }

    /// All pending actions, ordered by due time.
    pub async fn pending(&self) -> Result<Vec<ScheduledAction>, ScheduleError> {
        self.select_pending("SELECT * FROM scheduled_actions WHERE status = 'pending' ORDER BY scheduled_at ASC", None)
            .await
    }

    /// Pending actions whose due time has passed.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledAction>, ScheduleError> {
        self.select_pending(
            "SELECT * FROM scheduled_actions \
             WHERE status = 'pending' AND scheduled_at <= ?1 ORDER BY scheduled_at ASC",
            Some(now),
        )
        .await
    }

    async fn select_pending(
        &self,
        sql: &str,
        now: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduledAction>, ScheduleError> {
        let mut query = sqlx::query(sql);
        if let Some(now) = now {
            query = query.bind(now.to_rfc3339());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ScheduleError::Storage(format!("SELECT failed: {e}")))?;
        rows.iter().map(row_to_action).collect()
    }

    /// Reserved totals: sum of pending amounts per currency.
    pub async fn pending_totals(&self) -> Result<HashMap<String, f64>, ScheduleError> {
        let rows = sqlx::query(
            "SELECT currency, SUM(CAST(amount AS REAL)) AS total \
             FROM scheduled_actions WHERE status = 'pending' GROUP BY currency",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScheduleError::Storage(format!("totals query: {e}")))?;

        let mut totals = HashMap::new();
        for row in rows {
            let currency: String = row
                .try_get("currency")
                .map_err(|e| ScheduleError::Storage(format!("currency column: {e}")))?;
            let total: f64 = row
                .try_get("total")
                .map_err(|e| ScheduleError::Storage(format!("total column: {e}")))?;
            totals.insert(currency, total);
        }
        Ok(totals)
    }

    /// Claim a pending action for execution.
    ///
    /// Returns false when the row was not pending anymore — another worker
    /// claimed it, or it was cancelled. The conditional update is what
    /// makes execution at-most-once.
    pub async fn mark_executing(&self, id: &str) -> Result<bool, ScheduleError> {
        let result = sqlx::query(
            "UPDATE scheduled_actions SET status = 'executing' \
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Storage(format!("claim failed: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the outcome of an execution. Only valid from `executing`.
    pub async fn complete(
        &self,
        id: &str,
        status: ActionStatus,
        error: &str,
    ) -> Result<(), ScheduleError> {
        if !matches!(status, ActionStatus::Executed | ActionStatus::Failed) {
            return Err(ScheduleError::Storage(format!(
                "completion status must be executed or failed, got {status}"
            )));
        }

        let result = sqlx::query(
            "UPDATE scheduled_actions SET status = ?1, error = ?2 \
             WHERE id = ?3 AND status = 'executing'",
        )
        .bind(status.to_string())
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Storage(format!("complete failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(ScheduleError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Cancel a pending action. Non-pending rows are never flipped; the
    /// caller gets a deterministic error naming the current status.
    pub async fn cancel(&self, id: &str) -> Result<(), ScheduleError> {
        let result = sqlx::query(
            "UPDATE scheduled_actions SET status = 'cancelled' \
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Storage(format!("cancel failed: {e}")))?;

        if result.rows_affected() == 1 {
            debug!(id = %id, "scheduled action cancelled");
            return Ok(());
        }

        // Distinguish "no such row" from "row in a non-cancellable state"
        match self.get(id).await {
            Ok(action) => Err(ScheduleError::NotCancellable {
                id: id.to_string(),
                status: action.status.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Rows stuck in `executing` — surfaced at startup for operator
    /// reconciliation after a crash. No automatic recovery.
    pub async fn stale_executing(&self) -> Result<Vec<ScheduledAction>, ScheduleError> {
        let rows = sqlx::query("SELECT * FROM scheduled_actions WHERE status = 'executing'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ScheduleError::Storage(format!("stale query: {e}")))?;

        let stale: Vec<ScheduledAction> =
            rows.iter().map(row_to_action).collect::<Result<_, _>>()?;
        if !stale.is_empty() {
            warn!(count = stale.len(), "actions left in executing state");
        }
        Ok(stale)
    }
}

fn row_to_action(row: &sqlx::sqlite::SqliteRow) -> Result<ScheduledAction, ScheduleError> {
    let text = |name: &str| -> Result<String, ScheduleError> {
        row.try_get(name)
            .map_err(|e| ScheduleError::Storage(format!("{name} column: {e}")))
    };

    let status: ActionStatus = text("status")?.parse()?;
    let scheduled_at = parse_timestamp(&text("scheduled_at")?)?;
    let created_at = parse_timestamp(&text("created_at")?)?;

    Ok(ScheduledAction {
        id: text("id")?,
        recipient: text("recipient")?,
        amount: text("amount")?,
        currency: text("currency")?,
        note: text("note")?,
        scheduled_at,
        created_at,
        status,
        error: text("error")?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ScheduleError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScheduleError::Storage(format!("bad timestamp {s:?}: {e}")))
}
