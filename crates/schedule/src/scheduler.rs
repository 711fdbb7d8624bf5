//! The background scheduler loop.
//!
//! A supervised long-lived task that wakes on a fixed interval, claims due
//! actions, and dispatches them through the executor's write path. Claiming
//! happens via the store's conditional pending→executing update, so a due
//! action is executed at most once even with overlapping workers. Shutdown
//! is cooperative: in-flight executions finish their attempt, the next tick
//! observes the signal.

use crate::store::{ActionStatus, ActionStore, ScheduledAction};
use chrono::Utc;
use ledgermind_core::error::ScheduleError;
use ledgermind_core::executor::{ExecuteRequest, ToolExecutor};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Default polling interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

/// The background payment scheduler.
pub struct Scheduler;

impl Scheduler {
    /// Spawn the scheduler loop. Actions found in `executing` at startup
    /// are logged for operator reconciliation; they are not auto-resumed.
    pub async fn spawn(
        store: Arc<ActionStore>,
        executor: Arc<dyn ToolExecutor>,
        interval: Duration,
    ) -> SchedulerHandle {
        match store.stale_executing().await {
            Ok(stale) if !stale.is_empty() => {
                for action in &stale {
                    warn!(
                        id = %action.id,
                        recipient = %action.recipient,
                        "action was executing at startup, needs reconciliation"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => error!("failed to check for stale actions: {e}"),
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so freshly
            // scheduled actions get their full lead time.
            ticker.tick().await;

            info!(interval_secs = interval.as_secs(), "scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = run_due(&store, executor.as_ref()).await {
                            error!("scheduler tick failed: {e}");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("scheduler stopping");
                        return;
                    }
                }
            }
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

/// Execute every action that is due right now. Exposed separately so a
/// tick can be driven directly in tests and maintenance tooling.
pub async fn run_due(
    store: &ActionStore,
    executor: &dyn ToolExecutor,
) -> Result<(), ScheduleError> {
    let due = store.due(Utc::now()).await?;

    for action in due {
        // Claim first; a miss means another worker got there or the user
        // cancelled between the select and now.
        if !store.mark_executing(&action.id).await? {
            continue;
        }

        info!(
            id = %action.id,
            amount = %action.amount,
            currency = %action.currency,
            recipient = %action.recipient,
            "executing scheduled payment"
        );

        match dispatch(&action, executor).await {
            Ok(()) => {
                store.complete(&action.id, ActionStatus::Executed, "").await?;
                info!(id = %action.id, "scheduled payment executed");
            }
            Err(message) => {
                error!(id = %action.id, "scheduled payment failed: {message}");
                store
                    .complete(&action.id, ActionStatus::Failed, &message)
                    .await?;
            }
        }
    }

    Ok(())
}

/// Send one scheduled payment through the write path.
async fn dispatch(action: &ScheduledAction, executor: &dyn ToolExecutor) -> Result<(), String> {
    let input = json!({
        "recipient": action.recipient,
        "amount": action.amount,
        "currency": action.currency,
        "note": action.note,
        "thought": format!("Executing scheduled payment {}", action.id),
    });

    let result = executor
        .execute_write(ExecuteRequest {
            owner_id: String::new(),
            tool: "send_money".into(),
            input,
            request_id: action.id.clone(),
            confirmation_id: None,
        })
        .await
        .map_err(|e| format!("execution error: {e}"))?;

    if !result.success {
        return Err(format!(
            "send_money failed: {}",
            result.error.unwrap_or_default()
        ));
    }
    Ok(())
}
