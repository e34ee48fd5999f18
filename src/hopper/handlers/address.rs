//! Batched address inspection.

use crate::error::ToolError;
use crate::hopper::handlers::{distinct_demangled, hex, procedure_summary, type_name};
use crate::hopper::host::{Address, DocumentId, HopperHost, Instruction};
use crate::hopper::resolve::{resolve, segment_at};
use crate::hopper::session::Session;
use crate::hopper::types::{
    AddressInfo, AddressLookup, InstructionSummary, ReferenceInfo, References, SectionRef,
    SegmentRef,
};
use std::collections::BTreeMap;

pub const MAX_BATCH: usize = 50;

/// Mnemonic followed by the formatted arguments.
pub(crate) fn flat_disassembly(ins: &Instruction) -> String {
    let args: Vec<&str> = ins
        .arguments
        .iter()
        .filter_map(|a| a.formatted.as_deref().filter(|f| !f.is_empty()))
        .collect();
    if args.is_empty() {
        ins.mnemonic.clone()
    } else {
        format!("{} {}", ins.mnemonic, args.join(", "))
    }
}

fn reference_info(host: &dyn HopperHost, doc: DocumentId, addr: Address) -> ReferenceInfo {
    ReferenceInfo {
        address: hex(addr),
        name: host.document_name_at(doc, addr).filter(|n| !n.is_empty()),
        data_type: host
            .segment_at(doc, addr)
            .and_then(|seg| type_name(host, seg, addr)),
    }
}

fn address_info(session: &Session, token: &str) -> Result<AddressInfo, ToolError> {
    let host = session.host();
    let doc = session.current()?;
    let addr = resolve(host, doc, token)?;
    let seg = segment_at(host, doc, addr)?;
    let desc = host.segment(seg)?;

    let section = host
        .sections(seg)
        .into_iter()
        .find(|s| s.contains(addr))
        .map(|s| SectionRef {
            name: s.name,
            start_address: hex(s.start),
            flags: s.flags,
        });

    let name = host.name_at(seg, addr).filter(|n| !n.is_empty());
    let demangled_name = distinct_demangled(host, seg, addr, name.as_deref());

    let procedure = procedure_summary(host, seg, addr, false).map(|mut summary| {
        if let Some(entry) = host.procedure_at(seg, addr).and_then(|p| host.procedure(p).ok()) {
            summary.demangled_name =
                distinct_demangled(host, seg, entry.entry_point, name.as_deref());
        }
        summary
    });

    let instruction = host.instruction_at(seg, addr).map(|ins| InstructionSummary {
        disassembly: flat_disassembly(&ins),
        architecture: ins.architecture,
    });

    let references = References {
        to_address: host
            .references_to(seg, addr)
            .into_iter()
            .map(|r| reference_info(host, doc, r))
            .collect(),
        from_address: host
            .references_from(seg, addr)
            .into_iter()
            .map(|r| reference_info(host, doc, r))
            .collect(),
    };

    Ok(AddressInfo {
        address: hex(addr),
        segment: SegmentRef {
            name: desc.name,
            start_address: hex(desc.start),
        },
        section,
        data_type: type_name(host, seg, addr),
        name,
        comment: host.comment_at(seg, addr).filter(|c| !c.is_empty()),
        demangled_name,
        procedure,
        instruction,
        references,
    })
}

/// Inspect up to [`MAX_BATCH`] addresses or names. Failures are reported per
/// entry instead of failing the batch.
pub fn handle_address_info(
    session: &Session,
    inputs: &[String],
) -> Result<BTreeMap<String, AddressLookup>, ToolError> {
    if inputs.is_empty() {
        return Err(ToolError::InvalidParams(
            "address_or_name_list cannot be empty".to_string(),
        ));
    }
    if inputs.len() > MAX_BATCH {
        return Err(ToolError::InvalidParams(format!(
            "Maximum {MAX_BATCH} addresses allowed per batch"
        )));
    }
    session.current()?;

    let mut results = BTreeMap::new();
    for input in inputs {
        let entry = match address_info(session, input) {
            Ok(info) => AddressLookup::Found(Box::new(info)),
            Err(e) => AddressLookup::Failed {
                queried_input: input.clone(),
                error: e.to_string(),
            },
        };
        results.insert(input.clone(), entry);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::snapshot::fixtures;
    use std::path::Path;

    fn session() -> Session {
        Session::new(Box::new(fixtures::host(Path::new("/nonexistent"))))
    }

    #[test]
    fn test_address_info_mixed_batch() {
        let session = session();
        let inputs = vec![
            "0x1040f4130".to_string(),
            "EntryPoint".to_string(),
            "missing_symbol".to_string(),
        ];
        let results = handle_address_info(&session, &inputs).unwrap();
        assert_eq!(results.len(), 3);

        let AddressLookup::Found(info) = &results["0x1040f4130"] else {
            panic!("expected info");
        };
        assert_eq!(info.segment.name, "__TEXT");
        assert_eq!(info.section.as_ref().unwrap().name, "__text");
        assert_eq!(info.data_type.as_deref(), Some("undefined"));
        assert_eq!(
            info.instruction.as_ref().unwrap().disassembly,
            "add aAccountSettings"
        );
        assert_eq!(info.procedure.as_ref().unwrap().entry_point, "0x1040f4124");
        assert_eq!(info.references.from_address.len(), 1);
        assert_eq!(
            info.references.from_address[0].name.as_deref(),
            Some("aAccountSettings")
        );
        assert_eq!(
            info.references.from_address[0].data_type.as_deref(),
            Some("ascii")
        );

        let AddressLookup::Found(entry) = &results["EntryPoint"] else {
            panic!("expected info");
        };
        assert_eq!(entry.name.as_deref(), Some("EntryPoint"));
        assert_eq!(entry.references.to_address.len(), 0);

        let json = serde_json::to_value(&results["missing_symbol"]).unwrap();
        assert_eq!(json["queried_input"], "missing_symbol");
        assert_eq!(json["error"], "No address found for name 'missing_symbol'");
    }

    #[test]
    fn test_address_info_batch_limits() {
        let session = session();
        assert!(matches!(
            handle_address_info(&session, &[]),
            Err(ToolError::InvalidParams(_))
        ));
        let too_many: Vec<String> = (0..51).map(|i| format!("0x{i:x}")).collect();
        assert!(matches!(
            handle_address_info(&session, &too_many),
            Err(ToolError::InvalidParams(msg)) if msg.contains("50")
        ));
    }

    #[test]
    fn test_flat_disassembly_skips_missing_formatting() {
        let session = session();
        let host = session.host();
        let seg = host.segment_named(DocumentId(0), "__TEXT").unwrap();
        let ins = host.instruction_at(seg, 0x1040f4128).unwrap();
        assert_eq!(flat_disassembly(&ins), "mov");
        let call = host.instruction_at(seg, 0x1040f4138).unwrap();
        assert_eq!(flat_disassembly(&call), "bl sub_1040f4000");
    }
}
