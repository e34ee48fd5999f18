//! MCP server implementation with Hopper tools.

mod requests;

pub use requests::*;

use crate::error::ToolError;
use crate::hopper::HopperWorker;
use crate::tool_registry::{self, ToolCategory};
use rmcp::{
    handler::server::{router::tool::ToolRouter, tool::ToolCallContext, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo, Tool},
    schemars::{schema_for, JsonSchema},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const DEFAULT_SEARCH_TYPE: &str = "both";
const DEFAULT_MAX_RESULTS: usize = 20;
const DEFAULT_DIRECTION: &str = "forward";
const DEFAULT_MAX_DEPTH: usize = 2;
/// Warming every document enumerates every string, so it gets the longest wait.
const CACHE_STRINGS_TIMEOUT_SECS: u64 = 600;

/// MCP server for Hopper analysis
#[derive(Clone)]
pub struct HopperMcpServer {
    worker: Arc<HopperWorker>,
    tool_mux: ToolMux<HopperMcpServer>,
    mode: ServerMode,
}

#[derive(Clone, Copy, Debug)]
pub enum ServerMode {
    Stdio,
    Http,
}

#[derive(Clone)]
struct ToolMux<S> {
    call_router: ToolRouter<S>,
}

impl<S> ToolMux<S>
where
    S: Send + Sync + 'static,
{
    fn new(call_router: ToolRouter<S>) -> Self {
        Self { call_router }
    }

    async fn call(
        &self,
        context: ToolCallContext<'_, S>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        self.call_router.call(context).await
    }

    fn list_all(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        for info in tool_registry::all_tools() {
            if let Some(route) = self.call_router.map.get(info.name) {
                tools.push(route.attr.clone());
            }
        }
        tools
    }
}

fn json_result<T: Serialize + Debug>(value: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}")),
    )])
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

impl HopperMcpServer {
    pub fn new(worker: Arc<HopperWorker>, mode: ServerMode) -> Self {
        info!("Creating Hopper MCP server");
        let call_router = Self::tool_router();
        Self {
            worker,
            tool_mux: ToolMux::new(call_router),
            mode,
        }
    }

    fn document_hint(&self) -> &'static str {
        match self.mode {
            ServerMode::Stdio => "set_current_document switches the document for this session.",
            ServerMode::Http => {
                "All HTTP clients share one current document; set_current_document affects every client."
            }
        }
    }

    fn instructions(&self) -> String {
        format!(
            "Hopper Disassembler analysis server for reverse engineering binaries open in Hopper. \
                 \n\nWorkflow: \
                 \n1. get_all_documents / get_current_document: See what is open and which document tools act on \
                 \n2. list_all_segments: Learn segment names (e.g. __TEXT, __DATA) used by the search tools \
                 \n3. tool_catalog: Discover tools for your task (e.g., 'who calls', 'decompile') \
                 \n4. tool_help: Get full docs for a specific tool \
                 \n5. Use the discovered tools to analyze and annotate the binary \
                 \n\nNote: tools/list exposes the full tool set by default; use tool_catalog/tool_help to discover usage. \
                 \n{document_hint} \
                 \n\nTool Categories: \
                 \n- documents: get_all_documents, get_current_document, set_current_document, rebase_document \
                 \n- segments: list_all_segments \
                 \n- search: search_names_regex, search_strings_regex, get_string_at_addr \
                 \n- analysis: get_address_info, decompile_procedure, disassemble_procedure, get_demangled_name \
                 \n- control_flow: get_call_graph \
                 \n- annotations: comments, names and data type marking (changes are saved) \
                 \n- cache: cache_strings, cache_status \
                 \n\nTip: The first string search in a large segment enumerates every string; \
                 run cache_strings once to make later searches fast.",
            document_hint = self.document_hint()
        )
    }

    fn value_to_strings(value: &Value) -> Result<Vec<String>, ToolError> {
        match value {
            Value::String(s) => {
                if s.contains(',') {
                    Ok(s.split(',')
                        .map(|t| t.trim())
                        .filter(|t| !t.is_empty())
                        .map(|t| t.to_string())
                        .collect())
                } else if s.trim().is_empty() {
                    Err(ToolError::InvalidParams("empty string".to_string()))
                } else {
                    Ok(vec![s.trim().to_string()])
                }
            }
            Value::Number(n) => Ok(vec![n.to_string()]),
            Value::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for v in arr {
                    match v {
                        Value::String(s) => out.push(s.to_string()),
                        Value::Number(n) => out.push(n.to_string()),
                        _ => {
                            return Err(ToolError::InvalidParams(
                                "expected string or number".to_string(),
                            ))
                        }
                    }
                }
                Ok(out)
            }
            _ => Err(ToolError::InvalidParams(
                "expected string, number, or array".to_string(),
            )),
        }
    }
}

// Tool implementations using the #[tool_router] attribute

#[tool_router]
impl HopperMcpServer {
    #[tool(description = "List every document open in Hopper with doc_id, name, executable path, \
        entry point, segment count and background analysis state.")]
    #[instrument(skip(self))]
    async fn get_all_documents(&self) -> Result<CallToolResult, McpError> {
        debug!("Tool call: get_all_documents");
        match self.worker.all_documents().await {
            Ok(list) => Ok(json_result(&list)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Describe the current document (the one every other tool operates on).")]
    #[instrument(skip(self))]
    async fn get_current_document(&self) -> Result<CallToolResult, McpError> {
        debug!("Tool call: get_current_document");
        match self.worker.current_document().await {
            Ok(doc) => Ok(json_result(&doc)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Switch the current document to the given doc_id \
        (from get_all_documents). Clears the in-memory string cache.")]
    #[instrument(skip(self))]
    async fn set_current_document(
        &self,
        Parameters(req): Parameters<SetCurrentDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        info!(doc_id = req.doc_id, "Tool call: set_current_document");
        match self.worker.set_current_document(req.doc_id).await {
            Ok(msg) => Ok(text_result(msg)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Rebase the current document so its lowest segment starts at \
        new_base_address_hex, then save the document.")]
    #[instrument(skip(self))]
    async fn rebase_document(
        &self,
        Parameters(req): Parameters<RebaseDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        info!("Tool call: rebase_document");
        match self.worker.rebase(req.new_base_address_hex).await {
            Ok(msg) => Ok(text_result(msg)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "List all segments of the current document with start address, length \
        and section/procedure/string/name counts.")]
    #[instrument(skip(self))]
    async fn list_all_segments(&self) -> Result<CallToolResult, McpError> {
        debug!("Tool call: list_all_segments");
        match self.worker.segments().await {
            Ok(list) => Ok(json_result(&list)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Search names in a segment with a regular expression. \
        search_type is 'bare', 'demangled' or 'both' (default). max_results defaults to 20.")]
    #[instrument(skip(self))]
    async fn search_names_regex(
        &self,
        Parameters(req): Parameters<SearchNamesRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: search_names_regex");
        match self
            .worker
            .search_names(
                req.regex_pattern,
                req.segment_name,
                req.search_type
                    .unwrap_or_else(|| DEFAULT_SEARCH_TYPE.to_string()),
                req.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            )
            .await
        {
            Ok(result) => Ok(json_result(&result)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Search strings in a segment with a regular expression. \
        Served from the string cache; a cold cache enumerates the whole segment first. \
        max_results defaults to 20.")]
    #[instrument(skip(self))]
    async fn search_strings_regex(
        &self,
        Parameters(req): Parameters<SearchStringsRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: search_strings_regex");
        match self
            .worker
            .search_strings(
                req.regex_pattern,
                req.segment_name,
                req.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                req.timeout_secs,
            )
            .await
        {
            Ok(result) => Ok(json_result(&result)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Get the string that starts at an address (served from the string cache).")]
    #[instrument(skip(self))]
    async fn get_string_at_addr(
        &self,
        Parameters(req): Parameters<StringAtRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: get_string_at_addr");
        match self
            .worker
            .string_at(req.address_hex, req.timeout_secs)
            .await
        {
            Ok(msg) => Ok(text_result(msg)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Inspect 1-50 hex addresses and/or names: segment, section, type, name, \
        comment, demangled name, procedure, instruction and references. \
        Failing entries report {queried_input, error} individually.")]
    #[instrument(skip(self))]
    async fn get_address_info(
        &self,
        Parameters(req): Parameters<AddressInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: get_address_info");
        let inputs = match Self::value_to_strings(&req.address_or_name_list) {
            Ok(v) => v,
            Err(e) => return Ok(e.to_tool_result()),
        };
        match self.worker.address_info(inputs).await {
            Ok(result) => Ok(json_result(&result)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Build a call graph from the procedure at start_addr_hex. \
        direction: 'forward' (callees, default), 'backward' (callers) or 'bidirectional'. \
        max_depth: 1-10 (default 2).")]
    #[instrument(skip(self))]
    async fn get_call_graph(
        &self,
        Parameters(req): Parameters<CallGraphRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: get_call_graph");
        match self
            .worker
            .call_graph(
                req.start_addr_hex,
                req.direction
                    .unwrap_or_else(|| DEFAULT_DIRECTION.to_string()),
                req.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            )
            .await
        {
            Ok(graph) => Ok(json_result(&graph)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Decompile the procedure at a hex address or symbol name into pseudo-code.")]
    #[instrument(skip(self))]
    async fn decompile_procedure(
        &self,
        Parameters(req): Parameters<AddressOrNameRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: decompile_procedure");
        match self.worker.decompile(req.address_or_name).await {
            Ok(text) => Ok(text_result(text)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Disassemble the procedure at a hex address or symbol name, \
        block by block with resolved names and comments.")]
    #[instrument(skip(self))]
    async fn disassemble_procedure(
        &self,
        Parameters(req): Parameters<AddressOrNameRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: disassemble_procedure");
        match self.worker.disassemble(req.address_or_name).await {
            Ok(text) => Ok(text_result(text)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Get the regular and demangled name at a hex address or of a symbol name.")]
    #[instrument(skip(self))]
    async fn get_demangled_name(
        &self,
        Parameters(req): Parameters<AddressOrNameRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: get_demangled_name");
        match self.worker.demangled_name(req.address_or_name).await {
            Ok(info) => Ok(json_result(&info)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Get the comment at an address.")]
    #[instrument(skip(self))]
    async fn get_comment_at_address(
        &self,
        Parameters(req): Parameters<AddressHexRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: get_comment_at_address");
        match self.worker.comment_at(req.address_hex).await {
            Ok(msg) => Ok(text_result(msg)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Set the comment at an address and save the document.")]
    #[instrument(skip(self, req), fields(address = %req.address_hex))]
    async fn set_comment_at_address(
        &self,
        Parameters(req): Parameters<SetCommentRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: set_comment_at_address");
        match self.worker.set_comment(req.address_hex, req.comment).await {
            Ok(msg) => Ok(text_result(msg)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Set the name (label) at an address and save the document.")]
    #[instrument(skip(self))]
    async fn set_name_at_address(
        &self,
        Parameters(req): Parameters<SetNameRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: set_name_at_address");
        match self.worker.set_name(req.address_hex, req.name).await {
            Ok(msg) => Ok(text_result(msg)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Mark an address as code, procedure, int8/16/32/64, ascii, unicode, \
        undefined, byte_array, short_array or int_array (length defaults to 1), then save.")]
    #[instrument(skip(self))]
    async fn mark_data_type_at_address(
        &self,
        Parameters(req): Parameters<MarkDataTypeRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: mark_data_type_at_address");
        match self
            .worker
            .mark_data_type(req.address_hex, req.data_type, req.length.unwrap_or(1))
            .await
        {
            Ok(msg) => Ok(text_result(msg)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Precompute the on-disk string cache for every open document \
        (all_documents=true, default) or only the current one.")]
    #[instrument(skip(self))]
    async fn cache_strings(
        &self,
        Parameters(req): Parameters<CacheStringsRequest>,
    ) -> Result<CallToolResult, McpError> {
        info!("Tool call: cache_strings");
        match self
            .worker
            .cache_strings(
                req.all_documents.unwrap_or(true),
                Some(req.timeout_secs.unwrap_or(CACHE_STRINGS_TIMEOUT_SECS)),
            )
            .await
        {
            Ok(report) => Ok(json_result(&report)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Report for every open document whether its string cache is complete.")]
    #[instrument(skip(self))]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        debug!("Tool call: cache_status");
        match self.worker.cache_status().await {
            Ok(report) => Ok(json_result(&report)),
            Err(e) => Ok(e.to_tool_result()),
        }
    }

    #[tool(description = "Discover available tools by query or category. \
        Use this to find the right tool for your task before calling tool_help for full details.")]
    #[instrument(skip(self))]
    async fn tool_catalog(
        &self,
        Parameters(req): Parameters<ToolCatalogRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: tool_catalog");
        Ok(catalog_result(&req))
    }

    #[tool(
        description = "Get full documentation for a tool including description, parameters schema, and example."
    )]
    #[instrument(skip(self))]
    async fn tool_help(
        &self,
        Parameters(req): Parameters<ToolHelpRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: tool_help for {}", req.name);
        Ok(json_result(&help_value(&req.name)))
    }
}

fn catalog_value(req: &ToolCatalogRequest) -> Result<Value, ToolError> {
    let limit = req.limit.unwrap_or(7).min(15);

    if let Some(cat_str) = &req.category {
        let cat = cat_str
            .parse::<ToolCategory>()
            .map_err(|_| ToolError::InvalidToolCategory(cat_str.clone()))?;
        let tools: Vec<_> = tool_registry::tools_by_category(cat)
            .take(limit)
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.short_desc,
                    "category": t.category.as_str(),
                })
            })
            .collect();
        return Ok(json!({
            "category": cat.as_str(),
            "category_description": cat.description(),
            "tools": tools,
            "hint": "Use tool_help(name) for full documentation and examples"
        }));
    }

    if let Some(query) = &req.query {
        let tools: Vec<_> = tool_registry::search_tools(query, limit)
            .iter()
            .map(|(t, keywords)| {
                json!({
                    "name": t.name,
                    "description": t.short_desc,
                    "category": t.category.as_str(),
                    "matched": keywords,
                })
            })
            .collect();
        return Ok(json!({
            "query": query,
            "tools": tools,
            "hint": "Use tool_help(name) for full documentation and examples"
        }));
    }

    let categories: Vec<_> = ToolCategory::all()
        .iter()
        .map(|c| {
            let tools: Vec<_> = tool_registry::tools_by_category(*c).map(|t| t.name).collect();
            json!({
                "category": c.as_str(),
                "description": c.description(),
                "tool_count": tools.len(),
                "tools": tools,
            })
        })
        .collect();
    Ok(json!({
        "categories": categories,
        "hint": "Use tool_catalog(category='...') to list tools in a category, or tool_catalog(query='...') to search. tools/list already includes all tools."
    }))
}

fn catalog_result(req: &ToolCatalogRequest) -> CallToolResult {
    match catalog_value(req) {
        Ok(value) => json_result(&value),
        Err(e) => e.to_tool_result(),
    }
}

fn help_value(name: &str) -> Value {
    if let Some(tool) = tool_registry::get_tool(name) {
        json!({
            "name": tool.name,
            "category": tool.category.as_str(),
            "description": tool.full_desc,
            "parameters": tool_params_schema(name),
            "example": tool.example,
            "keywords": tool.keywords,
        })
    } else {
        let suggestions: Vec<_> = tool_registry::search_tools(name, 3)
            .iter()
            .map(|(t, _)| t.name)
            .collect();
        json!({
            "error": format!("Tool '{name}' not found"),
            "suggestions": suggestions,
            "hint": "Use tool_catalog to discover available tools"
        })
    }
}

fn tool_params_schema(name: &str) -> Option<Value> {
    fn schema<T: JsonSchema>() -> Value {
        serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({}))
    }

    match name {
        // Core
        "tool_catalog" => Some(schema::<ToolCatalogRequest>()),
        "tool_help" => Some(schema::<ToolHelpRequest>()),

        // Documents / Segments
        "get_all_documents" | "get_current_document" | "list_all_segments" => {
            Some(schema::<EmptyParams>())
        }
        "set_current_document" => Some(schema::<SetCurrentDocumentRequest>()),
        "rebase_document" => Some(schema::<RebaseDocumentRequest>()),

        // Search
        "search_names_regex" => Some(schema::<SearchNamesRequest>()),
        "search_strings_regex" => Some(schema::<SearchStringsRequest>()),
        "get_string_at_addr" => Some(schema::<StringAtRequest>()),

        // Analysis / Control flow
        "get_address_info" => Some(schema::<AddressInfoRequest>()),
        "decompile_procedure" | "disassemble_procedure" | "get_demangled_name" => {
            Some(schema::<AddressOrNameRequest>())
        }
        "get_call_graph" => Some(schema::<CallGraphRequest>()),

        // Annotations
        "get_comment_at_address" => Some(schema::<AddressHexRequest>()),
        "set_comment_at_address" => Some(schema::<SetCommentRequest>()),
        "set_name_at_address" => Some(schema::<SetNameRequest>()),
        "mark_data_type_at_address" => Some(schema::<MarkDataTypeRequest>()),

        // Cache
        "cache_strings" => Some(schema::<CacheStringsRequest>()),
        "cache_status" => Some(schema::<EmptyParams>()),

        _ => None,
    }
}

#[tool_handler(router = self.tool_mux)]
impl ServerHandler for HopperMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_strings_accepts_mixed_shapes() {
        let list = HopperMcpServer::value_to_strings(&json!("0x1000, _main,")).unwrap();
        assert_eq!(list, vec!["0x1000", "_main"]);
        let list = HopperMcpServer::value_to_strings(&json!(["0x10", 16])).unwrap();
        assert_eq!(list, vec!["0x10", "16"]);
        assert!(HopperMcpServer::value_to_strings(&json!("  ")).is_err());
        assert!(HopperMcpServer::value_to_strings(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_every_registered_tool_has_schema_and_route() {
        let (worker, _rx) = HopperWorker::channel();
        let server = HopperMcpServer::new(Arc::new(worker), ServerMode::Stdio);
        let listed: Vec<_> = server
            .tool_mux
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        for info in tool_registry::all_tools() {
            assert!(tool_params_schema(info.name).is_some(), "{}", info.name);
            assert!(listed.iter().any(|n| n == info.name), "{}", info.name);
        }
        assert_eq!(listed.len(), tool_registry::TOOL_REGISTRY.len());
    }

    #[test]
    fn test_catalog_by_category_and_unknown_category() {
        let req = ToolCatalogRequest {
            query: None,
            category: Some("cache".to_string()),
            limit: None,
        };
        let value = catalog_value(&req).unwrap();
        assert_eq!(value["tools"].as_array().unwrap().len(), 2);

        let req = ToolCatalogRequest {
            query: None,
            category: Some("debugger".to_string()),
            limit: None,
        };
        assert!(matches!(
            catalog_value(&req),
            Err(ToolError::InvalidToolCategory(_))
        ));
    }

    #[test]
    fn test_help_for_unknown_tool_suggests() {
        let value = help_value("decompile");
        assert_eq!(value["error"], "Tool 'decompile' not found");
        let suggestions = value["suggestions"].as_array().unwrap();
        assert!(suggestions.iter().any(|s| s == "decompile_procedure"));

        let value = help_value("get_call_graph");
        assert_eq!(value["category"], "control_flow");
        assert!(value["parameters"].is_object());
    }
}
