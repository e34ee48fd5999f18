//! Hopper operation handlers organized by domain.

pub mod address;
pub mod annotations;
pub mod cache;
pub mod controlflow;
pub mod disasm;
pub mod documents;
pub mod names;
pub mod segments;
pub mod strings;

use crate::error::ToolError;
use crate::hopper::host::{Address, DocumentId, HopperHost, SegmentId};
use crate::hopper::types::ProcedureSummary;

// ============================================================================
// Shared utility functions used across multiple handlers
// ============================================================================

pub(crate) fn hex(addr: Address) -> String {
    format!("{addr:#x}")
}

pub(crate) fn segment_by_name(
    host: &dyn HopperHost,
    doc: DocumentId,
    name: &str,
) -> Result<SegmentId, ToolError> {
    host.segment_named(doc, name)
        .ok_or_else(|| ToolError::SegmentNameNotFound(name.to_string()))
}

pub(crate) fn type_name(host: &dyn HopperHost, seg: SegmentId, addr: Address) -> Option<String> {
    host.type_at(seg, addr).map(|t| t.as_str().to_string())
}

/// Demangled name, dropped when it adds nothing over the bare one.
pub(crate) fn distinct_demangled(
    host: &dyn HopperHost,
    seg: SegmentId,
    addr: Address,
    bare: Option<&str>,
) -> Option<String> {
    host.demangled_name_at(seg, addr)
        .filter(|d| !d.is_empty() && Some(d.as_str()) != bare)
}

/// Summary of the procedure containing `addr`, if any.
pub(crate) fn procedure_summary(
    host: &dyn HopperHost,
    seg: SegmentId,
    addr: Address,
    with_heap: bool,
) -> Option<ProcedureSummary> {
    let proc = host.procedure_at(seg, addr)?;
    let desc = host.procedure(proc).ok()?;
    Some(ProcedureSummary {
        entry_point: hex(desc.entry_point),
        basic_block_count: desc.basic_blocks.len(),
        heap_size: with_heap.then_some(desc.heap_size),
        signature: desc.signature.filter(|s| !s.is_empty()),
        demangled_name: None,
    })
}

pub(crate) fn search_finished(num_results: usize, max_results: usize) -> bool {
    num_results < max_results || num_results == 0
}

pub(crate) fn validate_max_results(max_results: usize) -> Result<usize, ToolError> {
    if max_results == 0 {
        return Err(ToolError::InvalidParams(
            "max_results must be at least 1".to_string(),
        ));
    }
    Ok(max_results)
}
