//! String cache warming and status.

use crate::error::ToolError;
use crate::hopper::cache::cache_file_path;
use crate::hopper::host::DocumentId;
use crate::hopper::session::Session;
use crate::hopper::types::{CacheStatus, CacheStatusReport, CacheWarmReport, CacheWarmResult};
use tracing::{info, warn};

fn targets(session: &Session, all_documents: bool) -> Result<Vec<DocumentId>, ToolError> {
    if all_documents {
        Ok((0..session.host().document_count()).map(DocumentId).collect())
    } else {
        Ok(vec![session.current()?])
    }
}

pub fn handle_cache_strings(
    session: &Session,
    all_documents: bool,
) -> Result<CacheWarmReport, ToolError> {
    let mut documents = Vec::new();
    for doc in targets(session, all_documents)? {
        let desc = session.host().document(doc)?;
        let cache_file = desc
            .database_path
            .as_deref()
            .map(|p| cache_file_path(p).display().to_string());

        let (written, error) = if desc.database_path.is_none() {
            (
                false,
                Some(format!(
                    "Document '{}' needs to be saved first before caching strings",
                    desc.name
                )),
            )
        } else {
            match session.warm(doc) {
                Ok(true) => (true, None),
                Ok(false) => (false, Some("Failed to write cache file".to_string())),
                Err(e) => (false, Some(e.to_string())),
            }
        };
        if written {
            info!(document = %desc.name, "String cache written");
        } else {
            warn!(document = %desc.name, error = ?error, "String cache not written");
        }

        documents.push(CacheWarmResult {
            doc_id: doc.0,
            document_name: desc.name,
            cache_file,
            written,
            error,
        });
    }

    Ok(CacheWarmReport {
        all_written: documents.iter().all(|d| d.written),
        documents,
    })
}

pub fn handle_cache_status(session: &Session) -> Result<CacheStatusReport, ToolError> {
    let mut documents = Vec::new();
    for doc in targets(session, true)? {
        let desc = session.host().document(doc)?;
        documents.push(CacheStatus {
            doc_id: doc.0,
            cache_file: desc
                .database_path
                .as_deref()
                .map(|p| cache_file_path(p).display().to_string()),
            document_name: desc.name,
            fully_cached: session.is_fully_cached(doc),
        });
    }
    Ok(CacheStatusReport {
        all_cached: documents.iter().all(|d| d.fully_cached),
        documents,
    })
}
