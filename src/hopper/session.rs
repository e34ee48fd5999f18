//! Worker-owned session state.

use crate::error::ToolError;
use crate::hopper::cache::{CachedSegment, StringCache, StringSource};
use crate::hopper::host::{DocumentId, HopperHost, SegmentId, StringRecord};
use std::path::PathBuf;
use tracing::info;

/// The host, the active document and the string cache for that document.
pub struct Session {
    host: Box<dyn HopperHost>,
    current: Option<DocumentId>,
    strings: StringCache,
}

impl Session {
    pub fn new(host: Box<dyn HopperHost>) -> Self {
        let current = host.current_document();
        Self {
            host,
            current,
            strings: StringCache::new(),
        }
    }

    pub fn host(&self) -> &dyn HopperHost {
        self.host.as_ref()
    }

    pub fn host_mut(&mut self) -> &mut dyn HopperHost {
        self.host.as_mut()
    }

    pub fn current(&self) -> Result<DocumentId, ToolError> {
        self.current.ok_or(ToolError::NoDocument)
    }

    /// Switch the active document. The memory tier of the string cache only
    /// ever describes one document, so it is dropped here.
    pub fn set_current(&mut self, doc_id: i64) -> Result<DocumentId, ToolError> {
        let count = self.host.document_count();
        let index = usize::try_from(doc_id)
            .ok()
            .filter(|&i| i < count)
            .ok_or_else(|| {
                ToolError::InvalidParams(format!(
                    "Invalid doc_id {doc_id}. Valid range is 0 to {}",
                    count as i64 - 1
                ))
            })?;
        let doc = DocumentId(index);
        self.current = Some(doc);
        self.strings.clear();
        info!(doc_id = index, "Switched current document");
        Ok(doc)
    }

    /// Strings of a segment of the current document, through the cache.
    pub fn strings(&mut self, seg: SegmentId) -> Result<&[StringRecord], ToolError> {
        let source = DocumentStrings::new(self.host.as_ref(), seg.document);
        let segment = source.cached_segment(seg)?;
        self.strings.get(&source, &segment)
    }

    pub fn warm(&self, doc: DocumentId) -> Result<bool, ToolError> {
        self.strings
            .warm(&DocumentStrings::new(self.host.as_ref(), doc))
    }

    pub fn is_fully_cached(&self, doc: DocumentId) -> bool {
        self.strings
            .is_fully_cached(&DocumentStrings::new(self.host.as_ref(), doc))
    }
}

/// [`StringSource`] for one document of a host.
pub struct DocumentStrings<'a> {
    host: &'a dyn HopperHost,
    doc: DocumentId,
}

impl<'a> DocumentStrings<'a> {
    pub fn new(host: &'a dyn HopperHost, doc: DocumentId) -> Self {
        Self { host, doc }
    }

    fn cached_segment(&self, seg: SegmentId) -> Result<CachedSegment, ToolError> {
        let desc = self.host.segment(seg)?;
        Ok(CachedSegment {
            index: seg.index,
            name: desc.name,
            start: desc.start,
            string_count: desc.string_count,
        })
    }
}

impl StringSource for DocumentStrings<'_> {
    fn database_path(&self) -> Option<PathBuf> {
        self.host.document(self.doc).ok()?.database_path
    }

    fn segments(&self) -> Vec<CachedSegment> {
        (0..self.host.segment_count(self.doc))
            .filter_map(|index| self.host.segment_at_index(self.doc, index))
            .filter_map(|seg| self.cached_segment(seg).ok())
            .collect()
    }

    fn enumerate(&self, segment: &CachedSegment) -> Result<Vec<StringRecord>, ToolError> {
        let seg = SegmentId {
            document: self.doc,
            index: segment.index,
        };
        self.host.strings(seg)
    }
}
