//! Tool registry for weave renderers.
//!
//! This crate provides the tool abstraction for LLM function calling:
//!
//! - [`Tool`] — Trait for implementing custom tools
//! - [`ToolRegistry`] — The set of tools a renderer exposes to its model
//! - [`ToolSchema`] — JSON schema for tool parameters
//!
//! A registry is also the value of the `tools` configuration field; merging
//! two configurations unions their registries, with the child's tool winning
//! on a name clash (see [`ToolRegistry::merged`]).
//!
//! # Implementing a Custom Tool
//!
//! ```rust,ignore
//! use weave_tools::{Tool, ToolError};
//! use async_trait::async_trait;
//!
//! struct CalculatorTool;
//!
//! #[async_trait]
//! impl Tool for CalculatorTool {
//!     fn name(&self) -> &str { "calculator" }
//!     fn description(&self) -> &str { "Performs math calculations" }
//!     fn parameters(&self) -> serde_json::Value {
//!         serde_json::json!({
//!             "type": "object",
//!             "properties": {
//!                 "expression": { "type": "string" }
//!             },
//!             "required": ["expression"]
//!         })
//!     }
//!     async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
//!         Ok("42".to_string())
//!     }
//! }
//! ```
//!
//! # Using the Registry
//!
//! ```rust,ignore
//! use weave_tools::ToolRegistry;
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(CalculatorTool);
//!
//! // Get schemas for the LLM
//! let schemas = registry.list();
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

pub use weave_core::{ToolCall, ToolResult, ToolSchema};

/// Errors that can occur during tool execution.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tool execution failed with a message.
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid arguments were passed to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// Trait for implementing tools that can be called by LLMs.
///
/// Tools are the bridge between LLM reasoning and external actions.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a description of what this tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for this tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Executes the tool with the given arguments.
    ///
    /// # Arguments
    /// * `args` - JSON object containing the tool arguments
    ///
    /// # Returns
    /// The tool's output as a string, or an error.
    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError>;

    /// Generates the schema for this tool (default implementation).
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of tools available to a renderer's model.
///
/// Tools are keyed by name and kept in name order so the schemas sent to a
/// provider are stable between calls.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.tools.keys()).finish()
    }
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Registers an already shared tool under the given name.
    pub fn insert(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        self.tools.insert(name.into(), tool);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Unions two registries; on a name clash the child's tool wins.
    pub fn merged(parent: &ToolRegistry, child: &ToolRegistry) -> ToolRegistry {
        let mut tools = parent.tools.clone();
        tools.extend(child.tools.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        ToolRegistry { tools }
    }

    /// Gets a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns schemas for all registered tools.
    ///
    /// Each schema is named by its registry key.
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSchema {
                name: name.clone(),
                ..tool.schema()
            })
            .collect()
    }

    /// Executes a model-requested call against the registered tool.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let content = tool.execute(call.arguments.clone()).await?;
        Ok(ToolResult {
            tool_call_id: call.id.clone(),
            content,
        })
    }

    /// Returns true if a tool with the given name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the names of all registered tools.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
