//! Segment listing.

use crate::error::ToolError;
use crate::hopper::handlers::hex;
use crate::hopper::session::Session;
use crate::hopper::types::{SegmentInfo, SegmentList};

pub fn handle_list_segments(session: &Session) -> Result<SegmentList, ToolError> {
    let host = session.host();
    let doc = session.current()?;

    let mut segments = Vec::new();
    for index in 0..host.segment_count(doc) {
        let Some(seg) = host.segment_at_index(doc, index) else {
            continue;
        };
        let desc = host.segment(seg)?;
        if desc.name.is_empty() {
            continue;
        }
        segments.push(SegmentInfo {
            index,
            name: desc.name,
            start_address: hex(desc.start),
            length: desc.length,
            section_count: desc.section_count,
            procedure_count: desc.procedure_count,
            string_count: desc.string_count,
            total_names_count: desc.label_count,
        });
    }

    Ok(SegmentList {
        total_segments: host.segment_count(doc),
        segments,
    })
}
