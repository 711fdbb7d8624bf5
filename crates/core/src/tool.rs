//! Tool trait, definitions, and the registry.
//!
//! Tools are what give the agent the ability to act: query balances, search
//! users, move money. A tool pairs a wire-facing definition (name,
//! description, input schema, confirmation flag, summary template) with an
//! executable handler. Tools are registered in the `ToolRegistry` and made
//! available to the agent loop.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The wire-facing definition of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name within a registry (e.g., "get_balance").
    pub name: String,

    /// Description of what the tool does (sent to the model).
    pub description: String,

    /// JSON Schema describing the tool's input.
    pub input_schema: serde_json::Value,

    /// Whether execution must pause for human confirmation.
    #[serde(default)]
    pub requires_confirmation: bool,

    /// Template for the human-facing confirmation summary.
    ///
    /// Placeholders are written `{field}` and resolved against the tool
    /// input. A placeholder whose field is absent renders literally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_template: Option<String>,
}

impl ToolDefinition {
    /// Render the confirmation summary for a given input.
    ///
    /// Never fails: unknown placeholders are left as-is, and a missing
    /// template falls back to the tool name.
    pub fn summary(&self, input: &serde_json::Value) -> String {
        let Some(template) = &self.summary_template else {
            return self.name.clone();
        };
        render_template(template, input)
    }
}

/// Substitute `{field}` placeholders in a template with input values.
fn render_template(template: &str, input: &serde_json::Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match input.get(name) {
                    Some(serde_json::Value::String(s)) => out.push_str(s),
                    Some(other) if !other.is_null() => out.push_str(&other.to_string()),
                    _ => {
                        // Unknown placeholder: keep it literal
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parameters handed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolParams {
    /// The principal on whose behalf the tool runs.
    pub owner_id: String,

    /// Decoded tool input.
    pub input: serde_json::Value,

    /// Correlates the execution with its originating run.
    pub request_id: String,

    /// Present when the execution is part of a confirmation flow.
    /// `None` means "already confirmed, execute directly".
    pub confirmation_id: Option<String>,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    /// Structured output payload.
    #[serde(default)]
    pub data: serde_json::Value,

    /// Error message when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set by a remote collaborator that wants to run its own
    /// confirmation flow rather than having the engine suspend.
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl ToolResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            requires_confirmation: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
            requires_confirmation: false,
        }
    }
}

/// The core Tool trait.
///
/// The capability set is deliberately small: a definition, an executable
/// handler, and an optional observation formatter the engine consults when
/// rendering results for the trace log.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's wire-facing definition.
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: ToolParams) -> std::result::Result<ToolResult, ToolError>;

    /// Optional custom observation rendering. Returning `None` lets the
    /// engine fall back to its default formatting.
    fn format_observation(
        &self,
        _result: Option<&ToolResult>,
        _error: Option<&ToolError>,
    ) -> Option<String> {
        None
    }
}

/// A tool definition in the shape the model provider expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A registry of available tools, keyed by name.
///
/// Effectively immutable after startup: the engine only reads.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Fails if a tool with the same name already exists;
    /// use [`replace`](Self::replace) to deliberately shadow one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.definition().name.clone();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register a tool, overwriting any existing tool with the same name.
    ///
    /// Wrapper tools use this to shadow a catalog tool with a guarded
    /// variant (e.g. a send guard that checks reserved balances first).
    pub fn replace(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Produce the provider-facing tool list.
    ///
    /// When `filter` is given, only tools whose names appear in it are
    /// included (an allow-list).
    pub fn to_wire_tools(&self, filter: Option<&[String]>) -> Vec<WireTool> {
        let mut wire: Vec<WireTool> = self
            .tools
            .values()
            .filter(|t| match filter {
                Some(names) => names.iter().any(|n| n == &t.definition().name),
                None => true,
            })
            .map(|t| {
                let def = t.definition();
                WireTool {
                    name: def.name.clone(),
                    description: def.description.clone(),
                    input_schema: def.input_schema.clone(),
                }
            })
            .collect();
        // Stable ordering for deterministic requests
        wire.sort_by(|a, b| a.name.cmp(&b.name));
        wire
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
