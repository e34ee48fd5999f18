//! Response types for Hopper worker operations.

use serde::Serialize;

/// Document record, as listed by `get_all_documents`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub doc_id: i64,
    pub document_name: String,
    pub executable_path: String,
    pub entry_point: String,
    pub segment_count: usize,
    pub analysis_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentList {
    pub total_documents: usize,
    pub documents: Vec<DocumentInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
    pub index: usize,
    pub name: String,
    pub start_address: String,
    pub length: u64,
    pub section_count: usize,
    pub procedure_count: usize,
    pub string_count: usize,
    pub total_names_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentList {
    pub total_segments: usize,
    pub segments: Vec<SegmentInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcedureSummary {
    pub entry_point: String,
    pub basic_block_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demangled_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NameMatch {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bare_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demangled_name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure: Option<ProcedureSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NameSearchResult {
    pub matches: Vec<NameMatch>,
    pub num_results: usize,
    pub max_results: usize,
    pub search_type: String,
    pub search_finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StringMatch {
    pub address: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StringSearchResult {
    pub matches: Vec<StringMatch>,
    pub num_results: usize,
    pub max_results: usize,
    pub search_finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentRef {
    pub name: String,
    pub start_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionRef {
    pub name: String,
    pub start_address: String,
    pub flags: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructionSummary {
    pub disassembly: String,
    pub architecture: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceInfo {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct References {
    pub to_address: Vec<ReferenceInfo>,
    pub from_address: Vec<ReferenceInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressInfo {
    pub address: String,
    pub segment: SegmentRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<SectionRef>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demangled_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure: Option<ProcedureSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<InstructionSummary>,
    pub references: References,
}

/// One entry of a batched `get_address_info` call.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AddressLookup {
    Found(Box<AddressInfo>),
    Failed { queried_input: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DemangledNameInfo {
    pub address: String,
    pub demangled_name: Option<String>,
    pub regular_name: Option<String>,
    pub has_demangled_name: bool,
    pub queried_input: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheWarmResult {
    pub doc_id: usize,
    pub document_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheWarmReport {
    pub documents: Vec<CacheWarmResult>,
    pub all_written: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub doc_id: usize,
    pub document_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,
    pub fully_cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatusReport {
    pub documents: Vec<CacheStatus>,
    pub all_cached: bool,
}
