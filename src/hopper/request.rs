//! Request types for the Hopper worker.

use crate::error::ToolError;
use crate::hopper::callgraph::CallGraph;
use crate::hopper::types::*;
use std::collections::BTreeMap;
use tokio::sync::oneshot;

/// Request types for the Hopper worker
pub enum HopperRequest {
    AllDocuments {
        resp: oneshot::Sender<Result<DocumentList, ToolError>>,
    },
    CurrentDocument {
        resp: oneshot::Sender<Result<DocumentInfo, ToolError>>,
    },
    SetCurrentDocument {
        doc_id: i64,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    Rebase {
        new_base_hex: String,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    Segments {
        resp: oneshot::Sender<Result<SegmentList, ToolError>>,
    },
    SearchNames {
        pattern: String,
        segment: String,
        search_type: String,
        max_results: usize,
        resp: oneshot::Sender<Result<NameSearchResult, ToolError>>,
    },
    SearchStrings {
        pattern: String,
        segment: String,
        max_results: usize,
        resp: oneshot::Sender<Result<StringSearchResult, ToolError>>,
    },
    StringAt {
        address_hex: String,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    AddressInfo {
        inputs: Vec<String>,
        resp: oneshot::Sender<Result<BTreeMap<String, AddressLookup>, ToolError>>,
    },
    CallGraph {
        start_hex: String,
        direction: String,
        max_depth: usize,
        resp: oneshot::Sender<Result<CallGraph, ToolError>>,
    },
    Decompile {
        target: String,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    Disassemble {
        target: String,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    DemangledName {
        target: String,
        resp: oneshot::Sender<Result<DemangledNameInfo, ToolError>>,
    },
    CommentAt {
        address_hex: String,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    SetComment {
        address_hex: String,
        comment: String,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    SetName {
        address_hex: String,
        name: String,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    MarkDataType {
        address_hex: String,
        data_type: String,
        length: u64,
        resp: oneshot::Sender<Result<String, ToolError>>,
    },
    CacheStrings {
        all_documents: bool,
        resp: oneshot::Sender<Result<CacheWarmReport, ToolError>>,
    },
    CacheStatus {
        resp: oneshot::Sender<Result<CacheStatusReport, ToolError>>,
    },
    Shutdown,
}
