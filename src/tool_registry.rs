//! Tool registry for dynamic tool discovery.
//!
//! All tools are exposed in tools/list by default to support MCP clients that only
//! register tools at connection time. `tool_catalog` is still recommended for discovery.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tool category for grouping related tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Discovery helpers (always available)
    Core,
    /// Open documents and document switching
    Documents,
    /// Segment listing
    Segments,
    /// Name and string search
    Search,
    /// Address inspection, decompilation and disassembly
    Analysis,
    /// Call graph tracing
    ControlFlow,
    /// Names, comments and type markings
    Annotations,
    /// String cache management
    Cache,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Documents => "documents",
            Self::Segments => "segments",
            Self::Search => "search",
            Self::Analysis => "analysis",
            Self::ControlFlow => "control_flow",
            Self::Annotations => "annotations",
            Self::Cache => "cache",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Core => "Tool discovery and help",
            Self::Documents => "List, select and rebase open Hopper documents",
            Self::Segments => "Segment layout of the current document",
            Self::Search => "Regex search over names and strings",
            Self::Analysis => "Address info, decompilation and disassembly",
            Self::ControlFlow => "Call graphs (callers and callees)",
            Self::Annotations => "Read and write names, comments and data types",
            Self::Cache => "Precompute and inspect the on-disk string cache",
        }
    }

    pub fn all() -> &'static [ToolCategory] {
        &[
            Self::Core,
            Self::Documents,
            Self::Segments,
            Self::Search,
            Self::Analysis,
            Self::ControlFlow,
            Self::Annotations,
            Self::Cache,
        ]
    }
}

impl FromStr for ToolCategory {
    type Err = ();

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "core" => Ok(Self::Core),
            "documents" | "document" | "docs" => Ok(Self::Documents),
            "segments" | "segment" => Ok(Self::Segments),
            "search" => Ok(Self::Search),
            "analysis" | "disassembly" | "disasm" | "decompile" => Ok(Self::Analysis),
            "control_flow" | "controlflow" | "callgraph" | "call_graph" => Ok(Self::ControlFlow),
            "annotations" | "annotation" | "editing" | "edit" => Ok(Self::Annotations),
            "cache" | "caching" => Ok(Self::Cache),
            _ => Err(()),
        }
    }
}

/// Metadata for a single tool
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: &'static str,
    pub category: ToolCategory,
    /// Short description (1 line, <100 chars) - used in tool_catalog results
    pub short_desc: &'static str,
    /// Full description with usage details - used in tool_help
    pub full_desc: &'static str,
    /// Example invocation (JSON)
    pub example: &'static str,
    /// Whether this tool is in the default (core) set
    pub default: bool,
    /// Keywords for semantic search
    pub keywords: &'static [&'static str],
}

/// Static registry of all tools
pub static TOOL_REGISTRY: &[ToolInfo] = &[
    // === DOCUMENTS ===
    ToolInfo {
        name: "get_all_documents",
        category: ToolCategory::Documents,
        short_desc: "List every open Hopper document",
        full_desc: "Return every document currently open in Hopper with its doc_id, \
                    document name, executable path, entry point, segment count and whether \
                    background analysis is still running. Use the doc_id with set_current_document.",
        example: r#"{}"#,
        default: true,
        keywords: &["documents", "list", "open", "binaries", "files", "executables"],
    },
    ToolInfo {
        name: "get_current_document",
        category: ToolCategory::Documents,
        short_desc: "Describe the document all other tools operate on",
        full_desc: "Return the document record (doc_id, name, executable path, entry point, \
                    segment count, analysis state) of the current document. Every other analysis \
                    tool runs against this document.",
        example: r#"{}"#,
        default: true,
        keywords: &["current", "active", "document", "selected", "binary"],
    },
    ToolInfo {
        name: "set_current_document",
        category: ToolCategory::Documents,
        short_desc: "Switch the current document by doc_id",
        full_desc: "Make the document with the given doc_id (from get_all_documents) the current \
                    document. Switching discards the in-memory string cache; the on-disk cache of \
                    the new document is reused on the next string search.",
        example: r#"{"doc_id": 1}"#,
        default: true,
        keywords: &["switch", "select", "document", "change", "doc_id"],
    },
    ToolInfo {
        name: "rebase_document",
        category: ToolCategory::Documents,
        short_desc: "Rebase the current document to a new base address",
        full_desc: "Move every segment of the current document so the lowest segment starts at \
                    the given base address, then save the document. All addresses reported by \
                    other tools change accordingly.",
        example: r#"{"new_base_address_hex": "0x100000000"}"#,
        default: false,
        keywords: &["rebase", "base", "relocate", "slide", "aslr", "address"],
    },
    // === SEGMENTS ===
    ToolInfo {
        name: "list_all_segments",
        category: ToolCategory::Segments,
        short_desc: "List segments with address ranges and counts",
        full_desc: "List every segment of the current document: index, name, start address, \
                    length, section count, procedure count, string count and total names count. \
                    Segment names are the segment_name argument of the search tools.",
        example: r#"{}"#,
        default: true,
        keywords: &["segments", "sections", "layout", "memory", "map", "__TEXT", "__DATA"],
    },
    // === SEARCH ===
    ToolInfo {
        name: "search_names_regex",
        category: ToolCategory::Search,
        short_desc: "Regex search over symbol names in a segment",
        full_desc: "Search the named addresses of one segment with a regular expression. \
                    search_type selects which names are matched: 'bare' (raw names), 'demangled' \
                    (demangled names) or 'both' (default). Results stop at max_results (default 20); \
                    search_finished is false when more matches may exist.",
        example: r#"{"regex_pattern": "viewDid.*", "segment_name": "__TEXT", "search_type": "both", "max_results": 20}"#,
        default: true,
        keywords: &["search", "find", "names", "symbols", "regex", "functions", "labels", "demangled"],
    },
    ToolInfo {
        name: "search_strings_regex",
        category: ToolCategory::Search,
        short_desc: "Regex search over strings in a segment (cached)",
        full_desc: "Search the strings of one segment with a regular expression. Strings are \
                    served from the string cache: memory first, then the <database>.mcpcache file, \
                    and only then a full enumeration by Hopper, which can be slow on large binaries \
                    (raise timeout_secs or run cache_strings beforehand).",
        example: r#"{"regex_pattern": "(?i)password", "segment_name": "__TEXT", "max_results": 20}"#,
        default: true,
        keywords: &["search", "find", "strings", "text", "regex", "literals", "cstring"],
    },
    ToolInfo {
        name: "get_string_at_addr",
        category: ToolCategory::Search,
        short_desc: "Read the string starting at an address (cached)",
        full_desc: "Return the string whose enumerated address equals the given address in the \
                    segment containing it. Served from the string cache like search_strings_regex.",
        example: r#"{"address_hex": "0x104ad8000"}"#,
        default: false,
        keywords: &["string", "read", "text", "address", "literal"],
    },
    // === ANALYSIS ===
    ToolInfo {
        name: "get_address_info",
        category: ToolCategory::Analysis,
        short_desc: "Inspect up to 50 addresses or names at once",
        full_desc: "For each hex address or symbol name, report the containing segment and \
                    section, data type, name, comment, demangled name, containing procedure, the \
                    instruction at that address and references to and from it. Entries that cannot \
                    be resolved carry {queried_input, error} instead of failing the whole batch.",
        example: r#"{"address_or_name_list": ["0x1040f4124", "_main"]}"#,
        default: true,
        keywords: &["address", "info", "inspect", "lookup", "xrefs", "references", "segment", "batch"],
    },
    ToolInfo {
        name: "decompile_procedure",
        category: ToolCategory::Analysis,
        short_desc: "Decompile the procedure at an address or name",
        full_desc: "Decompile the procedure containing the given address (or the address of the \
                    given name) into Hopper pseudo-code. The output starts with a header naming \
                    the procedure, its demangled name and signature.",
        example: r#"{"address_or_name": "0x1040f4124"}"#,
        default: true,
        keywords: &["decompile", "pseudocode", "source", "procedure", "function", "c"],
    },
    ToolInfo {
        name: "disassemble_procedure",
        category: ToolCategory::Analysis,
        short_desc: "Disassemble a procedure block by block",
        full_desc: "Disassemble the procedure containing the given address (or name), listing \
                    each basic block with its instructions, resolved argument names and comments. \
                    The header reports basic block count and heap size.",
        example: r#"{"address_or_name": "_main"}"#,
        default: true,
        keywords: &["disassemble", "disasm", "instructions", "assembly", "blocks", "procedure"],
    },
    ToolInfo {
        name: "get_demangled_name",
        category: ToolCategory::Analysis,
        short_desc: "Demangle the name at an address or of a symbol",
        full_desc: "Return the regular and demangled name at the given address or symbol, with \
                    has_demangled_name telling whether Hopper knows a demangled form.",
        example: r#"{"address_or_name": "_ZN6Signal4mainEv"}"#,
        default: false,
        keywords: &["demangle", "demangled", "symbol", "name", "c++", "swift"],
    },
    // === CONTROL FLOW ===
    ToolInfo {
        name: "get_call_graph",
        category: ToolCategory::ControlFlow,
        short_desc: "Trace callers and/or callees from a procedure",
        full_desc: "Build a call graph starting at the procedure containing start_addr_hex. \
                    direction is 'forward' (callees, default), 'backward' (callers) or \
                    'bidirectional'. max_depth (1-10, default 2) bounds how many call levels are \
                    expanded; procedures at the depth limit appear as nodes but are not expanded.",
        example: r#"{"start_addr_hex": "0x1040f4124", "direction": "bidirectional", "max_depth": 3}"#,
        default: true,
        keywords: &["callgraph", "calls", "callers", "callees", "graph", "trace", "xrefs", "who calls"],
    },
    // === ANNOTATIONS ===
    ToolInfo {
        name: "get_comment_at_address",
        category: ToolCategory::Annotations,
        short_desc: "Read the comment at an address",
        full_desc: "Return the comment Hopper stores at the given address, if any.",
        example: r#"{"address_hex": "0x1040f4124"}"#,
        default: false,
        keywords: &["comment", "read", "note", "annotation"],
    },
    ToolInfo {
        name: "set_comment_at_address",
        category: ToolCategory::Annotations,
        short_desc: "Set the comment at an address (saves the document)",
        full_desc: "Set the comment at the given address and save the document. If Hopper \
                    refuses the change the result says so and nothing is saved.",
        example: r#"{"address_hex": "0x1040f4124", "comment": "entry of settings screen"}"#,
        default: true,
        keywords: &["comment", "annotate", "note", "write", "edit"],
    },
    ToolInfo {
        name: "set_name_at_address",
        category: ToolCategory::Annotations,
        short_desc: "Rename an address (saves the document)",
        full_desc: "Set the name (label) at the given address and save the document. If Hopper \
                    refuses the name the result says so and nothing is saved.",
        example: r#"{"address_hex": "0x1040f4124", "name": "settings_viewDidLoad"}"#,
        default: true,
        keywords: &["rename", "name", "label", "symbol", "edit"],
    },
    ToolInfo {
        name: "mark_data_type_at_address",
        category: ToolCategory::Annotations,
        short_desc: "Mark an address as code, procedure, data or array",
        full_desc: "Mark length bytes (default 1) at the given address as one of: code, procedure, \
                    int8, int16, int32, int64, ascii, unicode, undefined, byte_array, short_array, \
                    int_array. The document is saved when Hopper accepts the marking.",
        example: r#"{"address_hex": "0x104ad8000", "data_type": "ascii", "length": 12}"#,
        default: false,
        keywords: &["type", "mark", "data", "code", "procedure", "array", "ascii", "define"],
    },
    // === CACHE ===
    ToolInfo {
        name: "cache_strings",
        category: ToolCategory::Cache,
        short_desc: "Precompute the string cache for documents",
        full_desc: "Enumerate the strings of every segment and write the <database>.mcpcache file \
                    for every open document (all_documents=true, default) or only the current one. \
                    Documents that were never saved have no database path and are reported as failed.",
        example: r#"{"all_documents": true}"#,
        default: false,
        keywords: &["cache", "strings", "precompute", "warm", "speed", "mcpcache"],
    },
    ToolInfo {
        name: "cache_status",
        category: ToolCategory::Cache,
        short_desc: "Report which documents have a complete string cache",
        full_desc: "For every open document, report whether the on-disk string cache covers \
                    every segment that has strings.",
        example: r#"{}"#,
        default: false,
        keywords: &["cache", "status", "strings", "cached", "mcpcache"],
    },
    // === CORE ===
    ToolInfo {
        name: "tool_catalog",
        category: ToolCategory::Core,
        short_desc: "Discover available tools by category or task",
        full_desc: "Discover which tools fit a task. Without arguments lists every category with \
                    its tools. With a query, returns the best matching tools ranked by relevance. \
                    With a category, lists the tools of that category.",
        example: r#"{"query": "find who calls a procedure"}"#,
        default: true,
        keywords: &["discover", "find", "tools", "catalog", "help", "list", "categories"],
    },
    ToolInfo {
        name: "tool_help",
        category: ToolCategory::Core,
        short_desc: "Get full documentation for a tool",
        full_desc: "Return the full description, parameter schema, example invocation and keywords \
                    of a tool. Unknown names return close matches.",
        example: r#"{"name": "get_call_graph"}"#,
        default: true,
        keywords: &["help", "documentation", "usage", "parameters", "schema", "example"],
    },
];

/// Get tools in the default (core) set
pub fn default_tools() -> impl Iterator<Item = &'static ToolInfo> {
    TOOL_REGISTRY.iter().filter(|t| t.default)
}

/// Get all tools
pub fn all_tools() -> impl Iterator<Item = &'static ToolInfo> {
    TOOL_REGISTRY.iter()
}

/// Get tool by name
pub fn get_tool(name: &str) -> Option<&'static ToolInfo> {
    TOOL_REGISTRY.iter().find(|t| t.name == name)
}

/// Get tools by category
pub fn tools_by_category(category: ToolCategory) -> impl Iterator<Item = &'static ToolInfo> {
    TOOL_REGISTRY.iter().filter(move |t| t.category == category)
}

/// Search tools by query (simple keyword matching)
pub fn search_tools(query: &str, limit: usize) -> Vec<(&'static ToolInfo, Vec<&'static str>)> {
    let query_lower = query.to_lowercase();
    let query_words: Vec<&str> = query_lower.split_whitespace().collect();

    let mut results: Vec<(&'static ToolInfo, Vec<&'static str>, usize)> = Vec::new();

    for tool in TOOL_REGISTRY.iter() {
        let mut matched_keywords = Vec::new();
        let mut score = 0usize;

        let name_lower = tool.name.to_lowercase();
        for word in &query_words {
            if name_lower.contains(word) {
                score += 10;
                matched_keywords.push("name match");
            }
        }

        let desc_lower = tool.short_desc.to_lowercase();
        for word in &query_words {
            if desc_lower.contains(word) {
                score += 5;
            }
        }

        for keyword in tool.keywords {
            let kw_lower = keyword.to_lowercase();
            for word in &query_words {
                if kw_lower.contains(word) || word.contains(&kw_lower) {
                    score += 3;
                    if !matched_keywords.contains(keyword) {
                        matched_keywords.push(keyword);
                    }
                }
            }
        }

        let cat_str = tool.category.as_str();
        for word in &query_words {
            if cat_str.contains(word) {
                score += 2;
                matched_keywords.push(cat_str);
            }
        }

        if score > 0 {
            results.push((tool, matched_keywords, score));
        }
    }

    // Stable sort keeps registry order among equal scores
    results.sort_by(|a, b| b.2.cmp(&a.2));

    results
        .into_iter()
        .take(limit)
        .map(|(tool, keywords, _)| (tool, keywords))
        .collect()
}
