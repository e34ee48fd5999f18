//! Comments, names and data type markings.
//!
//! Every mutation saves the document when the host accepts it. A refusal is
//! reported as a `Failed ...` message, not an error.

use crate::error::ToolError;
use crate::hopper::handlers::hex;
use crate::hopper::host::DataMark;
use crate::hopper::resolve::{parse_hex_address, segment_at};
use crate::hopper::session::Session;

pub fn handle_comment_at(session: &Session, address_hex: &str) -> Result<String, ToolError> {
    let addr = parse_hex_address(address_hex)?;
    let host = session.host();
    let seg = segment_at(host, session.current()?, addr)?;
    Ok(match host.comment_at(seg, addr).filter(|c| !c.is_empty()) {
        Some(comment) => format!("Comment at {}: {comment}", hex(addr)),
        None => format!("No comment found at address {}", hex(addr)),
    })
}

pub fn handle_set_comment(
    session: &mut Session,
    address_hex: &str,
    comment: &str,
) -> Result<String, ToolError> {
    let addr = parse_hex_address(address_hex)?;
    let doc = session.current()?;
    let seg = segment_at(session.host(), doc, addr)?;

    if !session.host_mut().set_comment_at(seg, addr, comment) {
        return Ok(format!("Failed to set comment at address {}", hex(addr)));
    }
    session.host_mut().save_document(doc)?;
    Ok(format!("Successfully set comment at address {}", hex(addr)))
}

pub fn handle_set_name(
    session: &mut Session,
    address_hex: &str,
    name: &str,
) -> Result<String, ToolError> {
    let addr = parse_hex_address(address_hex)?;
    let doc = session.current()?;

    if !session.host_mut().set_name_at(doc, addr, name) {
        return Ok(format!(
            "Failed to set name '{name}' at address {}",
            hex(addr)
        ));
    }
    session.host_mut().save_document(doc)?;
    Ok(format!(
        "Successfully set name '{name}' at address {}",
        hex(addr)
    ))
}

pub fn handle_mark_data_type(
    session: &mut Session,
    address_hex: &str,
    data_type: &str,
    length: u64,
) -> Result<String, ToolError> {
    let addr = parse_hex_address(address_hex)?;
    if length == 0 {
        return Err(ToolError::InvalidParams(
            "length must be at least 1".to_string(),
        ));
    }
    let doc = session.current()?;
    let seg = segment_at(session.host(), doc, addr)?;
    let mark: DataMark = data_type.parse()?;

    if !session.host_mut().mark(seg, addr, mark, length) {
        return Ok(format!(
            "Failed to mark address {} as {data_type}",
            hex(addr)
        ));
    }
    session.host_mut().save_document(doc)?;
    Ok(format!(
        "Successfully marked address {} as {data_type} (length: {length})",
        hex(addr)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::host::{DataType, DocumentId};
    use crate::hopper::snapshot::fixtures::{self, HELLO_WORLD};
    use std::path::Path;

    fn session() -> Session {
        Session::new(Box::new(fixtures::host(Path::new("/nonexistent"))))
    }

    #[test]
    fn test_mark_stays_inside_segment() {
        let mut session = session();
        assert_eq!(
            handle_mark_data_type(&mut session, "0x104ccffff", "int_array", 4).unwrap(),
            "Failed to mark address 0x104ccffff as int_array"
        );
        let data_const = session
            .host()
            .segment_at(DocumentId(0), 0x104cd0003)
            .unwrap();
        assert_eq!(
            session.host().type_at(data_const, 0x104cd0003),
            Some(DataType::Undefined)
        );

        for data_type in ["byte_array", "short_array", "int_array", "undefined"] {
            assert!(handle_mark_data_type(&mut session, "0x104cc0000", data_type, u64::MAX)
                .unwrap()
                .starts_with("Failed to mark"));
        }

        assert!(handle_mark_data_type(&mut session, "0x104ccfff0", "int_array", 4)
            .unwrap()
            .starts_with("Successfully marked"));
        let text = session
            .host()
            .segment_at(DocumentId(0), 0x104ccfffc)
            .unwrap();
        assert_eq!(
            session.host().type_at(text, 0x104ccfffc),
            Some(DataType::Int32)
        );
    }

    #[test]
    fn test_comment_round_trip() {
        let mut session = session();
        assert_eq!(
            handle_comment_at(&session, "0x104ad8000").unwrap(),
            "Comment at 0x104ad8000: greeting"
        );
        assert_eq!(
            handle_set_comment(&mut session, "0x104ad8004", "checked").unwrap(),
            "Successfully set comment at address 0x104ad8004"
        );
        assert_eq!(
            handle_comment_at(&session, "0x104ad8004").unwrap(),
            "Comment at 0x104ad8004: checked"
        );
        assert_eq!(
            handle_comment_at(&session, "0x104ad8008").unwrap(),
            "No comment found at address 0x104ad8008"
        );
    }

    #[test]
    fn test_set_name_success_and_refusal() {
        let mut session = session();
        assert_eq!(
            handle_set_name(&mut session, "0x104ad8000", "kGreeting").unwrap(),
            "Successfully set name 'kGreeting' at address 0x104ad8000"
        );
        let seg = session
            .host()
            .segment_at(DocumentId(0), HELLO_WORLD)
            .unwrap();
        assert_eq!(
            session.host().name_at(seg, HELLO_WORLD).as_deref(),
            Some("kGreeting")
        );
        assert_eq!(
            handle_set_name(&mut session, "0x10", "nowhere").unwrap(),
            "Failed to set name 'nowhere' at address 0x10"
        );
    }

    #[test]
    fn test_mark_data_type() {
        let mut session = session();
        assert_eq!(
            handle_mark_data_type(&mut session, "0x104ad8040", "int64", 1).unwrap(),
            "Successfully marked address 0x104ad8040 as int64 (length: 1)"
        );
        let seg = session
            .host()
            .segment_at(DocumentId(0), 0x104ad8040)
            .unwrap();
        assert_eq!(
            session.host().type_at(seg, 0x104ad8040),
            Some(DataType::Int64)
        );

        let err = handle_mark_data_type(&mut session, "0x104ad8040", "float", 1).unwrap_err();
        assert!(err.to_string().contains("Valid types: code, procedure"));
        assert!(matches!(
            handle_mark_data_type(&mut session, "0x10", "code", 1),
            Err(ToolError::SegmentNotFound(0x10))
        ));
    }
}
