//! Error types for the Hopper MCP server.
//!
//! Tool execution errors are returned with `is_error: true` in CallToolResult,
//! while protocol errors (invalid tool name, malformed args) are handled by rmcp.

use rmcp::model::{CallToolResult, Content};
use thiserror::Error;

/// Tool execution errors - returned with is_error: true in CallToolResult
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("No document is currently open")]
    NoDocument,

    #[error("Invalid hex address format: '{0}'")]
    InvalidAddress(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid tool category: {0}")]
    InvalidToolCategory(String),

    #[error("No segment found at address {0:#x}")]
    SegmentNotFound(u64),

    #[error("No segment found with name '{0}'")]
    SegmentNameNotFound(String),

    #[error("No procedure found at address {0:#x}")]
    ProcedureNotFound(u64),

    #[error("No address found for name '{0}'")]
    NameNotFound(String),

    #[error("Hopper error: {0}")]
    HostError(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Server busy: request queue is full")]
    Busy,

    #[error("Worker channel closed")]
    WorkerClosed,
}

impl ToolError {
    /// Convert to MCP CallToolResult with is_error: true
    pub fn to_tool_result(&self) -> CallToolResult {
        CallToolResult::error(vec![Content::text(self.to_string())])
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::HostError(e.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::HostError(e.to_string())
    }
}

impl From<regex::Error> for ToolError {
    fn from(e: regex::Error) -> Self {
        ToolError::InvalidParams(format!("Invalid regex pattern: {e}"))
    }
}

impl<T> From<std::sync::mpsc::SendError<T>> for ToolError {
    fn from(_: std::sync::mpsc::SendError<T>) -> Self {
        ToolError::WorkerClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for ToolError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        ToolError::WorkerClosed
    }
}
