//! Document listing, switching and rebasing.

use crate::error::ToolError;
use crate::hopper::handlers::hex;
use crate::hopper::host::DocumentId;
use crate::hopper::resolve::parse_hex_address;
use crate::hopper::session::Session;
use crate::hopper::types::{DocumentInfo, DocumentList};

fn document_info(session: &Session, doc: DocumentId) -> Result<DocumentInfo, ToolError> {
    let desc = session.host().document(doc)?;
    Ok(DocumentInfo {
        doc_id: doc.0 as i64,
        document_name: desc.name,
        executable_path: desc.executable_path,
        entry_point: hex(desc.entry_point),
        segment_count: desc.segment_count,
        analysis_active: desc.analysis_active,
    })
}

pub fn handle_all_documents(session: &Session) -> Result<DocumentList, ToolError> {
    let count = session.host().document_count();
    let documents = (0..count)
        .map(|i| document_info(session, DocumentId(i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DocumentList {
        total_documents: documents.len(),
        documents,
    })
}

pub fn handle_current_document(session: &Session) -> Result<DocumentInfo, ToolError> {
    document_info(session, session.current()?)
}

pub fn handle_set_current_document(session: &mut Session, doc_id: i64) -> Result<String, ToolError> {
    let doc = session.set_current(doc_id)?;
    let name = session.host().document(doc)?.name;
    Ok(format!(
        "Successfully set current document to doc_id {doc_id}: {name}"
    ))
}

pub fn handle_rebase(session: &mut Session, new_base_hex: &str) -> Result<String, ToolError> {
    let new_base = parse_hex_address(new_base_hex)?;
    let doc = session.current()?;
    session.host_mut().rebase(doc, new_base)?;
    session.host_mut().save_document(doc)?;
    Ok(format!(
        "Successfully rebased document to address {}",
        hex(new_base)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::snapshot::fixtures;

    #[test]
    fn test_all_and_current_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(Box::new(fixtures::host(dir.path())));

        let all = handle_all_documents(&session).unwrap();
        assert_eq!(all.total_documents, 3);
        assert_eq!(all.documents[0].document_name, "Signal");
        assert_eq!(all.documents[0].entry_point, "0x10411ead0");
        assert_eq!(all.documents[1].doc_id, 1);

        let message = handle_set_current_document(&mut session, 1).unwrap();
        assert_eq!(
            message,
            "Successfully set current document to doc_id 1: third_binary"
        );
        let current = handle_current_document(&session).unwrap();
        assert_eq!(current.doc_id, 1);
        assert!(current.analysis_active);
    }

    #[test]
    fn test_rebase_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(Box::new(fixtures::host(dir.path())));
        let message = handle_rebase(&mut session, "0x100000000").unwrap();
        assert_eq!(message, "Successfully rebased document to address 0x100000000");
        let doc = handle_current_document(&session).unwrap();
        assert_eq!(doc.entry_point, "0x10002ead0");
        assert!(matches!(
            handle_rebase(&mut session, "base"),
            Err(ToolError::InvalidAddress(_))
        ));
    }
}
