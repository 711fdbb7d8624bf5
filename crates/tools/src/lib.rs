//! # LedgerMind Tools
//!
//! The agent's capability surface: the banking tool catalog exposed by the
//! custody platform, the fluent builder for handler-backed custom tools,
//! the HTTP executor that reaches the remote platform, and the spending
//! analyzer as a worked example of a composite read tool.

pub mod builder;
pub mod catalog;
pub mod http;
pub mod spending;

pub use builder::{build_tool, ToolBuilder};
pub use catalog::{bank_tool_definitions, bank_tools};
pub use http::{CredentialResolver, HttpExecutor, HttpExecutorConfig};
pub use spending::spending_analyzer;
