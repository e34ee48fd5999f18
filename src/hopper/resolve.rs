//! Address and name resolution.

use crate::error::ToolError;
use crate::hopper::host::{
    Address, DocumentId, HopperHost, Lookup, ProcedureId, SegmentId, SentinelConvention,
};

/// Parse a hex address with an optional `0x`/`0X` prefix.
pub fn parse_hex_address(text: &str) -> Result<Address, ToolError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(ToolError::InvalidAddress(text.to_string()));
    }
    Address::from_str_radix(digits, 16).map_err(|_| ToolError::InvalidAddress(text.to_string()))
}

fn has_hex_prefix(token: &str) -> bool {
    token
        .get(..2)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("0x"))
}

pub fn lookup_name(host: &dyn HopperHost, doc: DocumentId, name: &str) -> Lookup {
    SentinelConvention::AllOnesOrZero.translate(host.address_for_name(doc, name))
}

/// Resolve a token that is either a `0x` hex address or a symbol name.
///
/// Only the `0x` prefix selects hex parsing; `"10"` is looked up as a name.
pub fn resolve(host: &dyn HopperHost, doc: DocumentId, token: &str) -> Result<Address, ToolError> {
    let token = token.trim();
    if has_hex_prefix(token) {
        return parse_hex_address(token);
    }
    match lookup_name(host, doc, token) {
        Lookup::Found(addr) => Ok(addr),
        Lookup::NotFound => Err(ToolError::NameNotFound(token.to_string())),
    }
}

pub fn segment_at(
    host: &dyn HopperHost,
    doc: DocumentId,
    addr: Address,
) -> Result<SegmentId, ToolError> {
    host.segment_at(doc, addr)
        .ok_or(ToolError::SegmentNotFound(addr))
}

/// Segment and procedure containing `addr`.
pub fn locate(
    host: &dyn HopperHost,
    doc: DocumentId,
    addr: Address,
) -> Result<(SegmentId, ProcedureId), ToolError> {
    let seg = segment_at(host, doc, addr)?;
    let proc = host
        .procedure_at(seg, addr)
        .ok_or(ToolError::ProcedureNotFound(addr))?;
    Ok((seg, proc))
}

/// Display name for an address: its own label, else the label of the
/// procedure it belongs to, else the hex address.
pub fn display_name(host: &dyn HopperHost, doc: DocumentId, addr: Address) -> String {
    if let Some(seg) = host.segment_at(doc, addr) {
        if let Some(name) = host.name_at(seg, addr) {
            return name;
        }
        if let Some(proc) = host.procedure_at(seg, addr) {
            if let Ok(desc) = host.procedure(proc) {
                if let Some(name) = host.name_at(seg, desc.entry_point) {
                    return name;
                }
            }
        }
    }
    format!("{addr:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::snapshot::fixtures::{self, ENTRY, VIEW_DID_LOAD};
    use std::path::Path;

    #[test]
    fn test_parse_hex_address() {
        assert_eq!(parse_hex_address("0x10").unwrap(), 16);
        assert_eq!(parse_hex_address("0X1F").unwrap(), 31);
        assert_eq!(parse_hex_address(" ff ").unwrap(), 255);
        assert!(matches!(
            parse_hex_address("0xzz"),
            Err(ToolError::InvalidAddress(_))
        ));
        assert!(parse_hex_address("0x").is_err());
        assert!(parse_hex_address("").is_err());
    }

    #[test]
    fn test_resolve_hex_and_names() {
        let host = fixtures::host(Path::new("/nonexistent"));
        let doc = DocumentId(0);
        assert_eq!(resolve(&host, doc, "0x10").unwrap(), 16);
        assert_eq!(resolve(&host, doc, "EntryPoint").unwrap(), ENTRY);
        assert!(matches!(
            resolve(&host, doc, "10"),
            Err(ToolError::NameNotFound(name)) if name == "10"
        ));
        assert!(matches!(
            resolve(&host, doc, "0xnothex"),
            Err(ToolError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_locate() {
        let host = fixtures::host(Path::new("/nonexistent"));
        let doc = DocumentId(0);
        let (_, proc) = locate(&host, doc, VIEW_DID_LOAD + 8).unwrap();
        assert_eq!(host.procedure(proc).unwrap().entry_point, VIEW_DID_LOAD);
        assert!(matches!(
            locate(&host, doc, 0x10),
            Err(ToolError::SegmentNotFound(0x10))
        ));
        assert!(matches!(
            locate(&host, doc, 0x104ad8000),
            Err(ToolError::ProcedureNotFound(_))
        ));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let host = fixtures::host(Path::new("/nonexistent"));
        let doc = DocumentId(0);
        assert_eq!(display_name(&host, doc, ENTRY), "EntryPoint");
        assert_eq!(
            display_name(&host, doc, 0x1040f4138),
            "-[AccountSettingsViewController viewDidLoad]"
        );
        assert_eq!(display_name(&host, doc, 0x10), "0x10");
    }
}
