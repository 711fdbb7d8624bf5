//! # LedgerMind Schedule
//!
//! Deferred write operations: a durable queue of future payments, a
//! background scheduler that dispatches them when due, and the tools that
//! let the agent schedule, list, and cancel them. The reserved total of
//! pending payments is subtracted from the live balance whenever a new
//! send or schedule is validated, so money promised to the future can't
//! be spent twice.

pub mod balance;
pub mod scheduler;
pub mod store;
pub mod tools;

pub use balance::{check_available, parse_balance};
pub use scheduler::{run_due, Scheduler, SchedulerHandle, DEFAULT_TICK_INTERVAL};
pub use store::{ActionStatus, ActionStore, ScheduledAction};
pub use tools::{
    cancel_scheduled_payment_tool, check_balance_tool, list_scheduled_payments_tool,
    register_schedule_tools, schedule_payment_tool, send_money_guard,
};
