//! Tool executor abstraction — the seam to the downstream financial API.
//!
//! Most banking tools don't run in-process; they delegate to an executor
//! that knows how to reach the custody platform. The executor exposes one
//! uniform read path and a distinct write path, because a remote
//! collaborator may require a two-phase submit for side-effectful calls
//! (obtain a confirmation handle, then confirm). In-process executors
//! ignore the distinction.

use crate::error::ToolError;
use crate::tool::{Tool, ToolDefinition, ToolParams, ToolResult};
use async_trait::async_trait;
use std::sync::Arc;

/// A request routed through a tool executor.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub owner_id: String,
    pub tool: String,
    pub input: serde_json::Value,
    pub request_id: String,
    pub confirmation_id: Option<String>,
}

/// Uniform call surface over tool execution backends.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a read operation.
    async fn execute(&self, req: ExecuteRequest) -> std::result::Result<ToolResult, ToolError>;

    /// Execute a write operation.
    ///
    /// Separated from `execute` so remote backends can route through their
    /// own submit/confirm flow. The result may carry
    /// `requires_confirmation = true` when the backend, not the model, is
    /// the party requesting a confirmation UI.
    async fn execute_write(
        &self,
        req: ExecuteRequest,
    ) -> std::result::Result<ToolResult, ToolError>;
}

/// A tool backed by a [`ToolExecutor`].
///
/// Pairs a static definition with the executor; write-flagged definitions
/// are routed through the executor's write path.
pub struct ExecutorTool {
    definition: ToolDefinition,
    executor: Arc<dyn ToolExecutor>,
}

impl ExecutorTool {
    pub fn new(definition: ToolDefinition, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            definition,
            executor,
        }
    }
}

#[async_trait]
impl Tool for ExecutorTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: ToolParams) -> std::result::Result<ToolResult, ToolError> {
        let req = ExecuteRequest {
            owner_id: params.owner_id,
            tool: self.definition.name.clone(),
            input: params.input,
            request_id: params.request_id,
            confirmation_id: params.confirmation_id,
        };
        if self.definition.requires_confirmation {
            self.executor.execute_write(req).await
        } else {
            self.executor.execute(req).await
        }
    }
}
