//! Fluent construction of handler-backed tools.
//!
//! Most custom tools are a definition plus an async closure. The builder
//! assembles both without a bespoke struct per tool:
//!
//! ```ignore
//! let tool = build_tool("analyze_spending")
//!     .description("Analyze spending patterns")
//!     .schema(object_schema(props, &[]))
//!     .handler(|params| async move { Ok(ToolResult::ok(json!({}))) })
//!     .build();
//! ```

use async_trait::async_trait;
use ledgermind_core::error::ToolError;
use ledgermind_core::tool::{Tool, ToolDefinition, ToolParams, ToolResult};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type BoxedHandler = Arc<
    dyn Fn(ToolParams) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send>>
        + Send
        + Sync,
>;

type ObservationFormatter =
    Arc<dyn Fn(Option<&ToolResult>, Option<&ToolError>) -> String + Send + Sync>;

/// Start building a tool with the given name.
pub fn build_tool(name: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name)
}

/// Builder for handler-backed tools.
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    requires_confirmation: bool,
    summary_template: Option<String>,
    handler: Option<BoxedHandler>,
    observation_formatter: Option<ObservationFormatter>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: json!({"type": "object", "properties": {}}),
            requires_confirmation: false,
            summary_template: None,
            handler: None,
            observation_formatter: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Mark this tool as requiring human confirmation before execution.
    pub fn requires_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    /// Set the confirmation summary template (`{field}` placeholders).
    pub fn summary_template(mut self, template: impl Into<String>) -> Self {
        self.summary_template = Some(template.into());
        self
    }

    /// Set the async execution handler.
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ToolParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |params| Box::pin(handler(params))));
        self
    }

    /// Set a custom observation formatter consulted by the engine.
    pub fn observation_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(Option<&ToolResult>, Option<&ToolError>) -> String + Send + Sync + 'static,
    {
        self.observation_formatter = Some(Arc::new(formatter));
        self
    }

    /// Finish the build. Panics if no handler was provided — a tool
    /// without a handler is a programming error, caught at startup.
    pub fn build(self) -> Arc<dyn Tool> {
        let handler = self
            .handler
            .unwrap_or_else(|| panic!("tool '{}' built without a handler", self.name));

        Arc::new(FnTool {
            definition: ToolDefinition {
                name: self.name,
                description: self.description,
                input_schema: self.input_schema,
                requires_confirmation: self.requires_confirmation,
                summary_template: self.summary_template,
            },
            handler,
            observation_formatter: self.observation_formatter,
        })
    }
}

/// A tool whose execution is a boxed async closure.
struct FnTool {
    definition: ToolDefinition,
    handler: BoxedHandler,
    observation_formatter: Option<ObservationFormatter>,
}

#[async_trait]
impl Tool for FnTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolResult, ToolError> {
        (self.handler)(params).await
    }

    fn format_observation(
        &self,
        result: Option<&ToolResult>,
        error: Option<&ToolError>,
    ) -> Option<String> {
        self.observation_formatter.as_ref().map(|f| f(result, error))
    }
}
