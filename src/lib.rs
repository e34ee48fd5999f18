//! Hopper Disassembler MCP Server
//!
//! This library provides an MCP (Model Context Protocol) server over the
//! document model of the Hopper disassembler. It allows LLM agents to list
//! documents and segments, search names and strings, decompile and
//! disassemble procedures, trace call graphs and annotate the binary.
//!
//! # Architecture
//!
//! Host state is single-threaded. The architecture is:
//!
//! - **Main thread**: Runs the Hopper worker loop (`hopper::run_hopper_loop`),
//!   which owns the [`hopper::Session`] (host, current document, string cache).
//!
//! - **Background thread**: Runs the tokio runtime with the async MCP server.
//!   Communicates with the main thread via a bounded channel.
//!
//! - **HopperWorker**: Handle for sending requests to the main thread.
//!
//! - **HopperMcpServer**: The MCP server that exposes tools for Hopper operations.
//!   Uses the `rmcp` crate for MCP protocol handling.
//!
//! # Tools
//!
//! ## Documents
//! - `get_all_documents`, `get_current_document`: Describe open documents
//! - `set_current_document`: Switch the document other tools act on
//! - `rebase_document`: Move the document to a new base address
//!
//! ## Segments and Search
//! - `list_all_segments`: Segment layout and counts
//! - `search_names_regex`: Regex over bare and/or demangled names
//! - `search_strings_regex`, `get_string_at_addr`: Strings, served by the string cache
//!
//! ## Analysis
//! - `get_address_info`: Batch address/name inspection
//! - `decompile_procedure`, `disassemble_procedure`: Procedure listings
//! - `get_demangled_name`: Regular and demangled names
//! - `get_call_graph`: Callers/callees up to a depth
//!
//! ## Annotations
//! - `get_comment_at_address`, `set_comment_at_address`
//! - `set_name_at_address`, `mark_data_type_at_address`
//!
//! ## String Cache
//! - `cache_strings`, `cache_status`: Precompute and inspect `<database>.mcpcache`

use std::path::PathBuf;

pub mod error;
pub mod hopper;
pub mod install;
pub mod server;
pub mod tool_registry;

pub use error::ToolError;
pub use hopper::{
    run_hopper_loop, CacheStatusReport, CacheWarmReport, DocumentInfo, DocumentList,
    HopperHost, HopperRequest, HopperWorker, SegmentInfo, SegmentList, Session, SnapshotHost,
};
pub use server::{HopperMcpServer, ServerMode};
pub use tool_registry::{ToolCategory, ToolInfo, TOOL_REGISTRY};

/// Expand `~/` prefix to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    path.strip_prefix("~/")
        .and_then(|stripped| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(stripped)))
        .unwrap_or_else(|| PathBuf::from(path))
}
