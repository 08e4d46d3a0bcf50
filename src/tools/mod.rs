//! Tools Module
//!
//! Each tool lives in its own module and exports a `register` function that
//! adds its descriptor to the registry. Incoming calls are validated into a
//! [`ToolCall`] before anything runs, so a handler only ever sees arguments of
//! the shape it declared.

pub mod daily_todo;

use serde_json::Value;

use crate::core::error::ToolError;
use crate::core::server::ToolRegistry;

/// A validated call to one of the known tools.
#[derive(Debug)]
pub enum ToolCall {
    GetDailyTodo(daily_todo::DailyTodoArgs),
}

impl ToolCall {
    /// Resolve a tool name and its raw arguments into a typed call.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolError> {
        match name {
            daily_todo::NAME => serde_json::from_value(arguments)
                .map(ToolCall::GetDailyTodo)
                .map_err(|source| ToolError::InvalidArguments {
                    tool: name.to_string(),
                    source,
                }),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetDailyTodo(_) => daily_todo::NAME,
        }
    }

    /// Execute the call and return the text result.
    pub async fn run(self) -> Result<String, ToolError> {
        match self {
            ToolCall::GetDailyTodo(args) => Ok(daily_todo::call(&args)),
        }
    }
}

/// Build the registry with every available tool.
pub fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    daily_todo::register(&mut registry);
    registry
}
