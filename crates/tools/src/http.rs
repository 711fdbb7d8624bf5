//! HTTP executor — the remote custody-platform collaborator.
//!
//! Forwards tool executions to the platform's REST surface:
//! `POST {base}/v1/tools/{tool}/execute` for reads and
//! `POST {base}/v1/tools/{tool}/execute-write` for writes. The write path
//! exists because the platform may answer with
//! `requires_confirmation = true` to run its own confirmation UI instead
//! of completing immediately.
//!
//! Authentication is per-request: a credential resolver maps the owner id
//! to an opaque bearer token minted by the platform's login flow.

use async_trait::async_trait;
use ledgermind_core::error::ToolError;
use ledgermind_core::executor::{ExecuteRequest, ToolExecutor};
use ledgermind_core::tool::ToolResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolves the bearer credential for an owner, per request.
pub type CredentialResolver = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Configuration for [`HttpExecutor`].
pub struct HttpExecutorConfig {
    /// Base URL of the platform API (no trailing slash needed).
    pub base_url: String,

    /// Per-owner credential lookup. `None` sends unauthenticated requests
    /// (useful against local stubs).
    pub credentials: Option<CredentialResolver>,

    /// Request timeout. Defaults to 30 seconds.
    pub timeout: Duration,
}

impl HttpExecutorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(mut self, resolver: CredentialResolver) -> Self {
        self.credentials = Some(resolver);
        self
    }
}

/// The request envelope sent to the platform.
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    owner_id: &'a str,
    input: &'a serde_json::Value,
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    confirmation_id: Option<&'a str>,
}

/// `ToolExecutor` backed by the platform's REST API.
pub struct HttpExecutor {
    base_url: String,
    credentials: Option<CredentialResolver>,
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(config: HttpExecutorConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ToolError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            client,
        })
    }

    fn endpoint(&self, tool: &str, write: bool) -> String {
        let suffix = if write { "execute-write" } else { "execute" };
        format!("{}/v1/tools/{tool}/{suffix}", self.base_url)
    }

    async fn post(&self, url: &str, req: &ExecuteRequest) -> Result<ToolResult, ToolError> {
        debug!(url = %url, tool = %req.tool, "executor request");

        let body = WireRequest {
            owner_id: &req.owner_id,
            input: &req.input,
            request_id: &req.request_id,
            confirmation_id: req.confirmation_id.as_deref(),
        };

        let mut builder = self.client.post(url).json(&body);
        if let Some(resolver) = &self.credentials {
            if let Some(token) = resolver(&req.owner_id) {
                builder = builder.bearer_auth(token);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ToolError::Transport(format!("{}: {e}", req.tool)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed {
                tool_name: req.tool.clone(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        response
            .json::<ToolResult>()
            .await
            .map_err(|e| ToolError::Transport(format!("decoding {} response: {e}", req.tool)))
    }
}

#[async_trait]
impl ToolExecutor for HttpExecutor {
    async fn execute(&self, req: ExecuteRequest) -> Result<ToolResult, ToolError> {
        let url = self.endpoint(&req.tool, false);
        self.post(&url, &req).await
    }

    async fn execute_write(&self, req: ExecuteRequest) -> Result<ToolResult, ToolError> {
        let url = self.endpoint(&req.tool, true);
        self.post(&url, &req).await
    }
}
