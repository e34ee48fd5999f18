//! Decompilation and per-block disassembly listings.

use crate::error::ToolError;
use crate::hopper::handlers::{distinct_demangled, hex};
use crate::hopper::host::{HopperHost, Instruction, ProcedureDescriptor, SegmentId};
use crate::hopper::resolve::{locate, resolve};
use crate::hopper::session::Session;
use std::fmt::Write;

fn header(host: &dyn HopperHost, seg: SegmentId, desc: &ProcedureDescriptor) -> String {
    let mut out = format!("Procedure at {}:\n", hex(desc.entry_point));
    let name = host.name_at(seg, desc.entry_point).filter(|n| !n.is_empty());
    if let Some(name) = &name {
        let _ = writeln!(out, "Name: {name}");
    }
    if let Some(demangled) = distinct_demangled(host, seg, desc.entry_point, name.as_deref()) {
        let _ = writeln!(out, "Demangled Name: {demangled}");
    }
    if let Some(signature) = desc.signature.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "Signature: {signature}");
    }
    out
}

pub fn handle_decompile(session: &Session, address_or_name: &str) -> Result<String, ToolError> {
    let host = session.host();
    let doc = session.current()?;
    let addr = resolve(host, doc, address_or_name)?;
    let (seg, proc) = locate(host, doc, addr)?;
    let desc = host.procedure(proc)?;

    let mut out = header(host, seg, &desc);
    out.push('\n');
    match host.decompile(proc).filter(|c| !c.is_empty()) {
        Some(code) => {
            out.push_str("Decompiled code:\n");
            out.push_str(&code);
        }
        None => out.push_str("Failed to decompile procedure"),
    }
    Ok(out)
}

/// Arguments as shown in listings: formatted text when it differs from the
/// raw operand, raw otherwise.
fn listing_arguments(ins: &Instruction) -> Vec<&str> {
    ins.arguments
        .iter()
        .filter_map(|arg| match arg.formatted.as_deref() {
            Some(f) if !f.is_empty() && f != arg.raw => Some(f),
            _ if !arg.raw.is_empty() => Some(arg.raw.as_str()),
            _ => None,
        })
        .collect()
}

pub fn handle_disassemble(session: &Session, address_or_name: &str) -> Result<String, ToolError> {
    let host = session.host();
    let doc = session.current()?;
    let addr = resolve(host, doc, address_or_name)?;
    let (seg, proc) = locate(host, doc, addr)?;
    let desc = host.procedure(proc)?;

    let mut out = header(host, seg, &desc);
    let _ = writeln!(out, "Basic Blocks: {}", desc.basic_blocks.len());
    let _ = writeln!(out, "Heap Size: {}\n", desc.heap_size);
    out.push_str("Instructions:\n");

    for (index, block) in desc.basic_blocks.iter().enumerate() {
        let _ = writeln!(
            out,
            "\nBasic Block {index} ({} - {}):",
            hex(block.start),
            hex(block.end)
        );
        let mut cursor = block.start;
        while cursor < block.end {
            let Some(ins) = host.instruction_at(seg, cursor) else {
                cursor += 1;
                continue;
            };
            let mut line = format!("  {}: {}", hex(cursor), ins.mnemonic);
            let args = listing_arguments(&ins);
            if !args.is_empty() {
                let _ = write!(line, " [{}]", args.join(", "));
            }

            let mut notes = Vec::new();
            if let Some(name) = host.name_at(seg, cursor).filter(|n| !n.is_empty()) {
                notes.push(format!("name: {name}"));
            }
            if let Some(comment) = host.comment_at(seg, cursor).filter(|c| !c.is_empty()) {
                notes.push(format!("comment: {comment}"));
            }
            if !notes.is_empty() {
                let _ = write!(line, " ; {}", notes.join(" | "));
            }
            out.push_str(&line);
            out.push('\n');

            let Some(next) = cursor.checked_add(ins.length.max(1)) else {
                break;
            };
            cursor = next;
        }
    }
    Ok(out)
}
