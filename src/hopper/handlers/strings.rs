//! String search, served by the string cache.

use crate::error::ToolError;
use crate::hopper::handlers::{hex, search_finished, segment_by_name, validate_max_results};
use crate::hopper::resolve::{parse_hex_address, segment_at};
use crate::hopper::session::Session;
use crate::hopper::types::{StringMatch, StringSearchResult};
use regex::Regex;

pub fn handle_search_strings(
    session: &mut Session,
    pattern: &str,
    segment_name: &str,
    max_results: usize,
) -> Result<StringSearchResult, ToolError> {
    let re = Regex::new(pattern)?;
    let max_results = validate_max_results(max_results)?;
    let doc = session.current()?;
    let seg = segment_by_name(session.host(), doc, segment_name)?;

    let hits: Vec<_> = session
        .strings(seg)?
        .iter()
        .filter(|record| re.is_match(&record.text))
        .take(max_results)
        .cloned()
        .collect();

    let host = session.host();
    let matches: Vec<StringMatch> = hits
        .into_iter()
        .map(|record| StringMatch {
            address: hex(record.address),
            name: host
                .document_name_at(doc, record.address)
                .filter(|n| !n.is_empty()),
            content: record.text,
        })
        .collect();

    Ok(StringSearchResult {
        num_results: matches.len(),
        search_finished: search_finished(matches.len(), max_results),
        matches,
        max_results,
    })
}

pub fn handle_string_at(session: &mut Session, address_hex: &str) -> Result<String, ToolError> {
    let addr = parse_hex_address(address_hex)?;
    let doc = session.current()?;
    let seg = segment_at(session.host(), doc, addr)?;

    let found = session
        .strings(seg)?
        .iter()
        .find(|record| record.address == addr);
    Ok(match found {
        Some(record) => format!("String at {}: {}", hex(addr), record.text),
        None => format!("No string found at address {}", hex(addr)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::snapshot::fixtures;

    #[test]
    fn test_search_strings() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(Box::new(fixtures::host(dir.path())));

        let result = handle_search_strings(&mut session, "^Hello", "__TEXT", 20).unwrap();
        assert_eq!(result.num_results, 2);
        assert_eq!(result.matches[0].content, "Hello World");
        assert_eq!(result.matches[0].address, "0x104ad8000");
        assert_eq!(result.matches[0].name.as_deref(), Some("aHelloWorld"));
        assert_eq!(result.matches[1].name, None);
        assert!(result.search_finished);

        let limited = handle_search_strings(&mut session, ".", "__TEXT", 1).unwrap();
        assert_eq!(limited.num_results, 1);
        assert_eq!(limited.matches[0].content, "viewDidLoad");
        assert!(!limited.search_finished);

        assert!(matches!(
            handle_search_strings(&mut session, "x", "__LINKEDIT", 1),
            Err(ToolError::SegmentNameNotFound(_))
        ));
    }

    #[test]
    fn test_string_at() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(Box::new(fixtures::host(dir.path())));
        assert_eq!(
            handle_string_at(&mut session, "0x104ad8000").unwrap(),
            "String at 0x104ad8000: Hello World"
        );
        assert_eq!(
            handle_string_at(&mut session, "0x104ad8001").unwrap(),
            "No string found at address 0x104ad8001"
        );
        assert!(matches!(
            handle_string_at(&mut session, "0x10"),
            Err(ToolError::SegmentNotFound(0x10))
        ));
    }
}
