//! MCP tool request types.
//!
//! These structs define the parameters for each MCP tool exposed by the server.

use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetCurrentDocumentRequest {
    #[schemars(
        description = "The document ID from get_all_documents() or get_current_document() (>= 0)"
    )]
    #[serde(alias = "id", alias = "document_id")]
    pub doc_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RebaseDocumentRequest {
    #[schemars(description = "The new base address for the document as hex string (e.g., '0x1000')")]
    #[serde(alias = "base", alias = "new_base", alias = "address")]
    pub new_base_address_hex: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchNamesRequest {
    #[schemars(description = "Regular expression pattern to search for in names")]
    #[serde(alias = "pattern", alias = "regex")]
    pub regex_pattern: String,
    #[schemars(description = "Target segment name to search in (e.g., '__TEXT', '__DATA')")]
    #[serde(alias = "segment")]
    pub segment_name: String,
    #[schemars(description = "Type of names to search: 'bare', 'demangled', or 'both' (default: both)")]
    pub search_type: Option<String>,
    #[schemars(description = "Maximum number of results to return (>= 1, default: 20)")]
    #[serde(alias = "limit")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchStringsRequest {
    #[schemars(description = "Regular expression pattern to search for in strings")]
    #[serde(alias = "pattern", alias = "regex")]
    pub regex_pattern: String,
    #[schemars(description = "Target segment name to search in (e.g., '__TEXT', '__DATA')")]
    #[serde(alias = "segment")]
    pub segment_name: String,
    #[schemars(description = "Maximum number of results to return (>= 1, default: 20)")]
    #[serde(alias = "limit")]
    pub max_results: Option<usize>,
    #[schemars(description = "Timeout in seconds for this operation (default: 120, max: 600)")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddressHexRequest {
    #[schemars(description = "The memory address as hex string (e.g., '0x1000')")]
    #[serde(alias = "address", alias = "addr", alias = "ea")]
    pub address_hex: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StringAtRequest {
    #[schemars(description = "The memory address as hex string (e.g., '0x1000')")]
    #[serde(alias = "address", alias = "addr", alias = "ea")]
    pub address_hex: String,
    #[schemars(description = "Timeout in seconds for this operation (default: 120, max: 600)")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddressInfoRequest {
    #[schemars(
        description = "Hex addresses (e.g., '0x1000') and/or names, mixed freely (1-50 entries; string, comma-separated string, or array)"
    )]
    #[serde(alias = "addresses", alias = "names", alias = "queries")]
    pub address_or_name_list: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddressOrNameRequest {
    #[schemars(description = "The memory address as hex string (e.g., '0x1000') or a symbol name")]
    #[serde(alias = "address", alias = "name", alias = "target")]
    pub address_or_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CallGraphRequest {
    #[schemars(description = "Starting address for call graph generation as hex string")]
    #[serde(alias = "start", alias = "address", alias = "addr")]
    pub start_addr_hex: String,
    #[schemars(
        description = "Direction to trace: 'forward' (callees), 'backward' (callers), or 'bidirectional' (default: forward)"
    )]
    pub direction: Option<String>,
    #[schemars(description = "Maximum depth to traverse (1-10, default: 2)")]
    #[serde(alias = "depth")]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetCommentRequest {
    #[schemars(description = "The memory address as hex string (e.g., '0x1000')")]
    #[serde(alias = "address", alias = "addr", alias = "ea")]
    pub address_hex: String,
    #[schemars(description = "The comment text to set at the address")]
    #[serde(alias = "text")]
    pub comment: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetNameRequest {
    #[schemars(description = "The memory address as hex string (e.g., '0x1000')")]
    #[serde(alias = "address", alias = "addr", alias = "ea")]
    pub address_hex: String,
    #[schemars(description = "The name/label to set at the address")]
    #[serde(alias = "new_name", alias = "label")]
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarkDataTypeRequest {
    #[schemars(description = "The address to mark as hex string (e.g., '0x1000')")]
    #[serde(alias = "address", alias = "addr", alias = "ea")]
    pub address_hex: String,
    #[schemars(
        description = "Type to mark: 'code', 'procedure', 'int8', 'int16', 'int32', 'int64', 'ascii', 'unicode', 'undefined', 'byte_array', 'short_array', 'int_array'"
    )]
    #[serde(alias = "type")]
    pub data_type: String,
    #[schemars(description = "Length for data types (>= 1, default: 1)")]
    #[serde(alias = "count")]
    pub length: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheStringsRequest {
    #[schemars(
        description = "Precompute every open document (default: true); false caches only the current document"
    )]
    pub all_documents: Option<bool>,
    #[schemars(description = "Timeout in seconds for this operation (default: 600, max: 600)")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ToolCatalogRequest {
    #[schemars(
        description = "What you're trying to accomplish (e.g., 'find who calls a procedure')"
    )]
    pub query: Option<String>,
    #[schemars(
        description = "Filter by category: core, documents, segments, search, analysis, control_flow, annotations, cache"
    )]
    pub category: Option<String>,
    #[schemars(description = "Maximum number of tools to return (default: 7)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ToolHelpRequest {
    #[schemars(description = "Name of the tool to get help for")]
    pub name: String,
}
