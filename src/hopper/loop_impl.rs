//! Main Hopper worker loop.

use crate::hopper::handlers::{
    address, annotations, cache, controlflow, disasm, documents, names, segments, strings,
};
use crate::hopper::request::HopperRequest;
use crate::hopper::session::Session;
use std::sync::mpsc;
use tracing::{debug, info, warn};

/// Log result with debug on success and warn on error.
macro_rules! log_result {
    ($result:expr, $ok_msg:literal, $err_msg:literal) => {
        match &$result {
            Ok(_) => debug!($ok_msg),
            Err(e) => warn!(error = %e, $err_msg),
        }
    };
}

/// Run the worker loop on the current thread, serving requests one at a
/// time against `session`. Blocks until Shutdown is received or every
/// sender is dropped.
pub fn run_hopper_loop(rx: mpsc::Receiver<HopperRequest>, mut session: Session) {
    info!(
        documents = session.host().document_count(),
        "Hopper worker started"
    );

    while let Ok(req) = rx.recv() {
        match req {
            HopperRequest::AllDocuments { resp } => {
                debug!("Listing documents");
                let result = documents::handle_all_documents(&session);
                log_result!(result, "Listed documents", "Failed to list documents");
                let _ = resp.send(result);
            }
            HopperRequest::CurrentDocument { resp } => {
                debug!("Reporting current document");
                let result = documents::handle_current_document(&session);
                log_result!(result, "Reported current document", "Failed to report current document");
                let _ = resp.send(result);
            }
            HopperRequest::SetCurrentDocument { doc_id, resp } => {
                info!(doc_id, "Switching document");
                let result = documents::handle_set_current_document(&mut session, doc_id);
                log_result!(result, "Switched document", "Failed to switch document");
                let _ = resp.send(result);
            }
            HopperRequest::Rebase { new_base_hex, resp } => {
                info!(new_base = %new_base_hex, "Rebasing document");
                let result = documents::handle_rebase(&mut session, &new_base_hex);
                log_result!(result, "Rebased document", "Failed to rebase document");
                let _ = resp.send(result);
            }
            HopperRequest::Segments { resp } => {
                debug!("Listing segments");
                let result = segments::handle_list_segments(&session);
                log_result!(result, "Listed segments", "Failed to list segments");
                let _ = resp.send(result);
            }
            HopperRequest::SearchNames {
                pattern,
                segment,
                search_type,
                max_results,
                resp,
            } => {
                debug!(pattern = %pattern, segment = %segment, search_type = %search_type, max_results, "Searching names");
                let result = names::handle_search_names(
                    &session,
                    &pattern,
                    &segment,
                    &search_type,
                    max_results,
                );
                log_result!(result, "Searched names", "Failed to search names");
                let _ = resp.send(result);
            }
            HopperRequest::SearchStrings {
                pattern,
                segment,
                max_results,
                resp,
            } => {
                debug!(pattern = %pattern, segment = %segment, max_results, "Searching strings");
                let result =
                    strings::handle_search_strings(&mut session, &pattern, &segment, max_results);
                log_result!(result, "Searched strings", "Failed to search strings");
                let _ = resp.send(result);
            }
            HopperRequest::StringAt { address_hex, resp } => {
                debug!(address = %address_hex, "Looking up string");
                let result = strings::handle_string_at(&mut session, &address_hex);
                log_result!(result, "Looked up string", "Failed to look up string");
                let _ = resp.send(result);
            }
            HopperRequest::AddressInfo { inputs, resp } => {
                debug!(count = inputs.len(), "Inspecting addresses");
                let result = address::handle_address_info(&session, &inputs);
                log_result!(result, "Inspected addresses", "Failed to inspect addresses");
                let _ = resp.send(result);
            }
            HopperRequest::CallGraph {
                start_hex,
                direction,
                max_depth,
                resp,
            } => {
                debug!(start = %start_hex, direction = %direction, max_depth, "Building call graph");
                let result =
                    controlflow::handle_call_graph(&session, &start_hex, &direction, max_depth);
                match &result {
                    Ok(graph) => debug!(
                        nodes = graph.total_nodes,
                        edges = graph.total_edges,
                        "Built call graph"
                    ),
                    Err(e) => warn!(error = %e, "Failed to build call graph"),
                }
                let _ = resp.send(result);
            }
            HopperRequest::Decompile { target, resp } => {
                debug!(target = %target, "Decompiling procedure");
                let result = disasm::handle_decompile(&session, &target);
                log_result!(result, "Decompiled procedure", "Failed to decompile procedure");
                let _ = resp.send(result);
            }
            HopperRequest::Disassemble { target, resp } => {
                debug!(target = %target, "Disassembling procedure");
                let result = disasm::handle_disassemble(&session, &target);
                log_result!(result, "Disassembled procedure", "Failed to disassemble procedure");
                let _ = resp.send(result);
            }
            HopperRequest::DemangledName { target, resp } => {
                debug!(target = %target, "Demangling name");
                let result = names::handle_demangled_name(&session, &target);
                log_result!(result, "Demangled name", "Failed to demangle name");
                let _ = resp.send(result);
            }
            HopperRequest::CommentAt { address_hex, resp } => {
                debug!(address = %address_hex, "Reading comment");
                let result = annotations::handle_comment_at(&session, &address_hex);
                log_result!(result, "Read comment", "Failed to read comment");
                let _ = resp.send(result);
            }
            HopperRequest::SetComment {
                address_hex,
                comment,
                resp,
            } => {
                debug!(address = %address_hex, "Setting comment");
                let result = annotations::handle_set_comment(&mut session, &address_hex, &comment);
                log_result!(result, "Set comment", "Failed to set comment");
                let _ = resp.send(result);
            }
            HopperRequest::SetName {
                address_hex,
                name,
                resp,
            } => {
                debug!(address = %address_hex, name = %name, "Setting name");
                let result = annotations::handle_set_name(&mut session, &address_hex, &name);
                log_result!(result, "Set name", "Failed to set name");
                let _ = resp.send(result);
            }
            HopperRequest::MarkDataType {
                address_hex,
                data_type,
                length,
                resp,
            } => {
                debug!(address = %address_hex, data_type = %data_type, length, "Marking data type");
                let result = annotations::handle_mark_data_type(
                    &mut session,
                    &address_hex,
                    &data_type,
                    length,
                );
                log_result!(result, "Marked data type", "Failed to mark data type");
                let _ = resp.send(result);
            }
            HopperRequest::CacheStrings {
                all_documents,
                resp,
            } => {
                info!(all_documents, "Precomputing string caches");
                let result = cache::handle_cache_strings(&session, all_documents);
                match &result {
                    Ok(report) => info!(all_written = report.all_written, "String caching finished"),
                    Err(e) => warn!(error = %e, "Failed to precompute string caches"),
                }
                let _ = resp.send(result);
            }
            HopperRequest::CacheStatus { resp } => {
                debug!("Checking string cache status");
                let result = cache::handle_cache_status(&session);
                log_result!(result, "Checked string cache status", "Failed to check string cache status");
                let _ = resp.send(result);
            }
            HopperRequest::Shutdown => {
                info!("Worker shutting down");
                break;
            }
        }
    }
}
