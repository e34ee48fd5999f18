//! JSON-backed [`HopperHost`].
//!
//! A snapshot is the document model of a Hopper session written out as one
//! JSON file: every open document with its segments, procedures, call
//! references, instructions and annotations. `SnapshotHost` serves the tool
//! layer from that model, applies mutations in memory, and writes the file
//! back on `save_document`.

use crate::error::ToolError;
use crate::hopper::host::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Index of the frontmost document.
    #[serde(default)]
    pub current_document: usize,
    #[serde(default)]
    pub documents: Vec<DocumentSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub name: String,
    #[serde(default)]
    pub executable_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub entry_point: Address,
    #[serde(default)]
    pub analysis_active: bool,
    #[serde(default)]
    pub segments: Vec<SegmentSnapshot>,
    #[serde(default)]
    pub procedures: Vec<ProcedureSnapshot>,
    #[serde(default)]
    pub calls: Vec<CallReference>,
    #[serde(default)]
    pub instructions: BTreeMap<Address, InstructionSnapshot>,
    #[serde(default)]
    pub names: BTreeMap<Address, String>,
    #[serde(default)]
    pub demangled_names: BTreeMap<Address, String>,
    #[serde(default)]
    pub comments: BTreeMap<Address, String>,
    #[serde(default)]
    pub types: BTreeMap<Address, DataType>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    pub name: String,
    pub start: Address,
    pub length: u64,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Strings in host enumeration order.
    #[serde(default)]
    pub strings: Vec<StringRecord>,
}

impl SegmentSnapshot {
    fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr - self.start < self.length
    }

    fn end(&self) -> Address {
        self.start.saturating_add(self.length)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcedureSnapshot {
    pub entry_point: Address,
    #[serde(default)]
    pub basic_blocks: Vec<BasicBlock>,
    #[serde(default)]
    pub heap_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decompiled: Option<String>,
}

impl ProcedureSnapshot {
    fn covers(&self, addr: Address) -> bool {
        self.entry_point == addr || self.basic_blocks.iter().any(|b| b.contains(addr))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionSnapshot {
    pub length: u64,
    pub mnemonic: String,
    #[serde(default)]
    pub arguments: Vec<InstructionArgument>,
    #[serde(default = "default_architecture")]
    pub architecture: String,
}

fn default_architecture() -> String {
    "aarch64".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub from: Address,
    pub to: Address,
}

pub struct SnapshotHost {
    project: ProjectSnapshot,
    source: Option<PathBuf>,
    enumerations: AtomicUsize,
}

impl SnapshotHost {
    pub fn new(project: ProjectSnapshot) -> Self {
        Self {
            project,
            source: None,
            enumerations: AtomicUsize::new(0),
        }
    }

    /// Load a snapshot file. `save_document` writes back to the same path.
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ToolError::HostError(format!("cannot read snapshot {}: {e}", path.display()))
        })?;
        let project: ProjectSnapshot = serde_json::from_str(&text).map_err(|e| {
            ToolError::HostError(format!("invalid snapshot {}: {e}", path.display()))
        })?;
        info!(
            path = %path.display(),
            documents = project.documents.len(),
            "Loaded project snapshot"
        );
        Ok(Self {
            project,
            source: Some(path.to_path_buf()),
            enumerations: AtomicUsize::new(0),
        })
    }

    pub fn project(&self) -> &ProjectSnapshot {
        &self.project
    }

    /// Number of full string enumerations served so far.
    pub fn string_enumerations(&self) -> usize {
        self.enumerations.load(Ordering::Relaxed)
    }

    fn doc(&self, doc: DocumentId) -> Option<&DocumentSnapshot> {
        self.project.documents.get(doc.0)
    }

    fn doc_mut(&mut self, doc: DocumentId) -> Option<&mut DocumentSnapshot> {
        self.project.documents.get_mut(doc.0)
    }

    fn seg(&self, seg: SegmentId) -> Option<(&DocumentSnapshot, &SegmentSnapshot)> {
        let doc = self.doc(seg.document)?;
        let segment = doc.segments.get(seg.index)?;
        Some((doc, segment))
    }

    fn proc(&self, proc: ProcedureId) -> Option<&ProcedureSnapshot> {
        self.doc(proc.segment.document)?.procedures.get(proc.index)
    }

    fn segment_missing(seg: SegmentId) -> ToolError {
        ToolError::HostError(format!(
            "segment {} of document {} does not exist",
            seg.index, seg.document.0
        ))
    }
}

impl HopperHost for SnapshotHost {
    fn document_count(&self) -> usize {
        self.project.documents.len()
    }

    fn current_document(&self) -> Option<DocumentId> {
        if self.project.documents.is_empty() {
            return None;
        }
        let index = self
            .project
            .current_document
            .min(self.project.documents.len() - 1);
        Some(DocumentId(index))
    }

    fn document(&self, doc: DocumentId) -> Result<DocumentDescriptor, ToolError> {
        let d = self.doc(doc).ok_or(ToolError::NoDocument)?;
        Ok(DocumentDescriptor {
            name: d.name.clone(),
            executable_path: d.executable_path.clone(),
            database_path: d.database_path.clone(),
            entry_point: d.entry_point,
            segment_count: d.segments.len(),
            analysis_active: d.analysis_active,
        })
    }

    fn segment_count(&self, doc: DocumentId) -> usize {
        self.doc(doc).map(|d| d.segments.len()).unwrap_or(0)
    }

    fn segment_at_index(&self, doc: DocumentId, index: usize) -> Option<SegmentId> {
        let d = self.doc(doc)?;
        (index < d.segments.len()).then_some(SegmentId {
            document: doc,
            index,
        })
    }

    fn segment_at(&self, doc: DocumentId, addr: Address) -> Option<SegmentId> {
        let index = self.doc(doc)?.segments.iter().position(|s| s.contains(addr))?;
        Some(SegmentId {
            document: doc,
            index,
        })
    }

    fn segment_named(&self, doc: DocumentId, name: &str) -> Option<SegmentId> {
        let index = self.doc(doc)?.segments.iter().position(|s| s.name == name)?;
        Some(SegmentId {
            document: doc,
            index,
        })
    }

    fn segment(&self, seg: SegmentId) -> Result<SegmentDescriptor, ToolError> {
        let (doc, s) = self.seg(seg).ok_or_else(|| Self::segment_missing(seg))?;
        Ok(SegmentDescriptor {
            name: s.name.clone(),
            start: s.start,
            length: s.length,
            section_count: s.sections.len(),
            procedure_count: doc
                .procedures
                .iter()
                .filter(|p| s.contains(p.entry_point))
                .count(),
            string_count: s.strings.len(),
            label_count: doc.names.range(s.start..s.end()).count(),
        })
    }

    fn sections(&self, seg: SegmentId) -> Vec<Section> {
        self.seg(seg)
            .map(|(_, s)| s.sections.clone())
            .unwrap_or_default()
    }

    fn strings(&self, seg: SegmentId) -> Result<Vec<StringRecord>, ToolError> {
        let (_, s) = self.seg(seg).ok_or_else(|| Self::segment_missing(seg))?;
        self.enumerations.fetch_add(1, Ordering::Relaxed);
        debug!(segment = %s.name, count = s.strings.len(), "Enumerating strings");
        Ok(s.strings.clone())
    }

    fn named_addresses(&self, seg: SegmentId) -> Vec<Address> {
        self.seg(seg)
            .map(|(doc, s)| doc.names.range(s.start..s.end()).map(|(a, _)| *a).collect())
            .unwrap_or_default()
    }

    fn name_at(&self, seg: SegmentId, addr: Address) -> Option<String> {
        let (doc, _) = self.seg(seg)?;
        doc.names.get(&addr).cloned()
    }

    fn demangled_name_at(&self, seg: SegmentId, addr: Address) -> Option<String> {
        let (doc, _) = self.seg(seg)?;
        doc.demangled_names.get(&addr).cloned()
    }

    fn address_for_name(&self, doc: DocumentId, name: &str) -> Address {
        let Some(d) = self.doc(doc) else {
            return BAD_ADDRESS;
        };
        d.names
            .iter()
            .chain(d.demangled_names.iter())
            .find(|(_, n)| n.as_str() == name)
            .map(|(addr, _)| *addr)
            .unwrap_or(BAD_ADDRESS)
    }

    fn comment_at(&self, seg: SegmentId, addr: Address) -> Option<String> {
        let (doc, _) = self.seg(seg)?;
        doc.comments.get(&addr).cloned()
    }

    fn type_at(&self, seg: SegmentId, addr: Address) -> Option<DataType> {
        let (doc, s) = self.seg(seg)?;
        if !s.contains(addr) {
            return None;
        }
        Some(doc.types.get(&addr).copied().unwrap_or(DataType::Undefined))
    }

    fn procedure_at(&self, seg: SegmentId, addr: Address) -> Option<ProcedureId> {
        let (doc, s) = self.seg(seg)?;
        let index = doc
            .procedures
            .iter()
            .position(|p| s.contains(p.entry_point) && p.covers(addr))?;
        Some(ProcedureId {
            segment: seg,
            index,
        })
    }

    fn procedure(&self, proc: ProcedureId) -> Result<ProcedureDescriptor, ToolError> {
        let p = self.proc(proc).ok_or_else(|| {
            ToolError::HostError(format!("procedure handle {} is stale", proc.index))
        })?;
        Ok(ProcedureDescriptor {
            entry_point: p.entry_point,
            basic_blocks: p.basic_blocks.clone(),
            heap_size: p.heap_size,
            signature: p.signature.clone(),
        })
    }

    fn callees(&self, proc: ProcedureId) -> Vec<CallReference> {
        let (Some(doc), Some(p)) = (self.doc(proc.segment.document), self.proc(proc)) else {
            return Vec::new();
        };
        doc.calls
            .iter()
            .filter(|c| p.covers(c.from))
            .copied()
            .collect()
    }

    fn callers(&self, proc: ProcedureId) -> Vec<CallReference> {
        let (Some(doc), Some(p)) = (self.doc(proc.segment.document), self.proc(proc)) else {
            return Vec::new();
        };
        doc.calls
            .iter()
            .filter(|c| c.to == p.entry_point)
            .copied()
            .collect()
    }

    fn decompile(&self, proc: ProcedureId) -> Option<String> {
        self.proc(proc)?.decompiled.clone()
    }

    fn instruction_at(&self, seg: SegmentId, addr: Address) -> Option<Instruction> {
        let (doc, _) = self.seg(seg)?;
        let ins = doc.instructions.get(&addr)?;
        Some(Instruction {
            address: addr,
            length: ins.length,
            mnemonic: ins.mnemonic.clone(),
            arguments: ins.arguments.clone(),
            architecture: ins.architecture.clone(),
        })
    }

    fn references_to(&self, seg: SegmentId, addr: Address) -> Vec<Address> {
        self.seg(seg)
            .map(|(doc, _)| {
                doc.references
                    .iter()
                    .filter(|r| r.to == addr)
                    .map(|r| r.from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn references_from(&self, seg: SegmentId, addr: Address) -> Vec<Address> {
        self.seg(seg)
            .map(|(doc, _)| {
                doc.references
                    .iter()
                    .filter(|r| r.from == addr)
                    .map(|r| r.to)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_name_at(&mut self, doc: DocumentId, addr: Address, name: &str) -> bool {
        let Some(d) = self.doc_mut(doc) else {
            return false;
        };
        if !d.segments.iter().any(|s| s.contains(addr)) {
            return false;
        }
        d.demangled_names.remove(&addr);
        if name.is_empty() {
            d.names.remove(&addr);
        } else {
            d.names.insert(addr, name.to_string());
        }
        true
    }

    fn set_comment_at(&mut self, seg: SegmentId, addr: Address, comment: &str) -> bool {
        let Some(d) = self.doc_mut(seg.document) else {
            return false;
        };
        if !d.segments.get(seg.index).is_some_and(|s| s.contains(addr)) {
            return false;
        }
        if comment.is_empty() {
            d.comments.remove(&addr);
        } else {
            d.comments.insert(addr, comment.to_string());
        }
        true
    }

    fn mark(&mut self, seg: SegmentId, addr: Address, mark: DataMark, length: u64) -> bool {
        let Some(d) = self.doc_mut(seg.document) else {
            return false;
        };
        let Some(segment_end) = d
            .segments
            .get(seg.index)
            .filter(|s| s.contains(addr))
            .map(SegmentSnapshot::end)
        else {
            return false;
        };
        let length = length.max(1);
        let Some(end) = mark_span(mark, length).and_then(|span| addr.checked_add(span)) else {
            return false;
        };
        if end > segment_end {
            return false;
        }
        match mark {
            DataMark::Code => {
                d.types.insert(addr, DataType::Code);
            }
            DataMark::Procedure => {
                d.types.insert(addr, DataType::Procedure);
                if !d.procedures.iter().any(|p| p.entry_point == addr) {
                    let size = d.instructions.get(&addr).map(|i| i.length).unwrap_or(1);
                    d.procedures.push(ProcedureSnapshot {
                        entry_point: addr,
                        basic_blocks: vec![BasicBlock {
                            start: addr,
                            end: addr.saturating_add(size),
                        }],
                        ..Default::default()
                    });
                }
            }
            DataMark::Undefined => {
                let typed: Vec<Address> = d.types.range(addr..end).map(|(&a, _)| a).collect();
                for a in typed {
                    d.types.remove(&a);
                }
            }
            DataMark::Typed(ty) => {
                d.types.insert(addr, ty);
            }
            DataMark::ByteArray => stamp(&mut d.types, addr, DataType::Int8, 1, length),
            DataMark::ShortArray => stamp(&mut d.types, addr, DataType::Int16, 2, length),
            DataMark::IntArray => stamp(&mut d.types, addr, DataType::Int32, 4, length),
        }
        true
    }

    fn rebase(&mut self, doc: DocumentId, new_base: Address) -> Result<(), ToolError> {
        let d = self.doc_mut(doc).ok_or(ToolError::NoDocument)?;
        let base = d
            .segments
            .iter()
            .map(|s| s.start)
            .min()
            .unwrap_or(d.entry_point);
        let delta = new_base.wrapping_sub(base);
        if delta == 0 {
            return Ok(());
        }
        let shift = |a: Address| a.wrapping_add(delta);

        d.entry_point = shift(d.entry_point);
        for s in &mut d.segments {
            s.start = shift(s.start);
            for section in &mut s.sections {
                section.start = shift(section.start);
            }
            for record in &mut s.strings {
                record.address = shift(record.address);
            }
        }
        for p in &mut d.procedures {
            p.entry_point = shift(p.entry_point);
            for block in &mut p.basic_blocks {
                block.start = shift(block.start);
                block.end = shift(block.end);
            }
        }
        for c in &mut d.calls {
            c.from = shift(c.from);
            c.to = shift(c.to);
        }
        for r in &mut d.references {
            r.from = shift(r.from);
            r.to = shift(r.to);
        }
        shift_keys(&mut d.instructions, delta);
        shift_keys(&mut d.names, delta);
        shift_keys(&mut d.demangled_names, delta);
        shift_keys(&mut d.comments, delta);
        shift_keys(&mut d.types, delta);

        info!(document = %d.name, new_base = %format!("{new_base:#x}"), "Rebased document");
        Ok(())
    }

    fn save_document(&mut self, doc: DocumentId) -> Result<(), ToolError> {
        if self.doc(doc).is_none() {
            return Err(ToolError::NoDocument);
        }
        let Some(path) = &self.source else {
            debug!("Snapshot has no backing file, nothing to save");
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.project)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved project snapshot");
        Ok(())
    }
}

/// Bytes covered by a mark of `length` units, `None` on overflow.
fn mark_span(mark: DataMark, length: u64) -> Option<u64> {
    match mark {
        DataMark::ByteArray | DataMark::Undefined => Some(length),
        DataMark::ShortArray => length.checked_mul(2),
        DataMark::IntArray => length.checked_mul(4),
        DataMark::Code | DataMark::Procedure | DataMark::Typed(_) => Some(1),
    }
}

/// Callers keep `addr + count * width` inside the segment.
fn stamp(
    types: &mut BTreeMap<Address, DataType>,
    addr: Address,
    ty: DataType,
    width: u64,
    count: u64,
) {
    for i in 0..count {
        types.insert(addr + i * width, ty);
    }
}

fn shift_keys<V>(map: &mut BTreeMap<Address, V>, delta: u64) {
    *map = std::mem::take(map)
        .into_iter()
        .map(|(k, v)| (k.wrapping_add(delta), v))
        .collect();
}

/// In-code project used across the test suite.
///
/// Three documents: a Signal-like Mach-O with `__TEXT`, `__DATA_CONST` and
/// `__DATA`, a small third binary whose `__TEXT` starts elsewhere, and an
/// unsaved scratch document without a database path.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const TEXT_START: Address = 0x1040f0000;
    pub const HELLO_WORLD: Address = 0x104ad8000;
    pub const ENTRY: Address = 0x10411ead0;
    pub const VIEW_DID_LOAD: Address = 0x1040f4124;
    pub const VIEW_WILL_APPEAR: Address = 0x1040f414c;
    pub const HELPER: Address = 0x1040f4000;
    pub const SIGNAL_MAIN: Address = 0x1040f41d0;

    fn ins(length: u64, mnemonic: &str, args: &[(&str, Option<&str>)]) -> InstructionSnapshot {
        InstructionSnapshot {
            length,
            mnemonic: mnemonic.to_string(),
            arguments: args
                .iter()
                .map(|(raw, formatted)| InstructionArgument {
                    raw: raw.to_string(),
                    formatted: formatted.map(str::to_string),
                })
                .collect(),
            architecture: default_architecture(),
        }
    }

    fn procedure(entry: Address, blocks: &[(Address, Address)]) -> ProcedureSnapshot {
        ProcedureSnapshot {
            entry_point: entry,
            basic_blocks: blocks
                .iter()
                .map(|&(start, end)| BasicBlock { start, end })
                .collect(),
            heap_size: 16,
            signature: None,
            decompiled: None,
        }
    }

    fn signal(database: Option<PathBuf>) -> DocumentSnapshot {
        let text = SegmentSnapshot {
            name: "__TEXT".to_string(),
            start: TEXT_START,
            length: 12_451_840,
            sections: vec![
                Section {
                    name: "__text".to_string(),
                    start: 0x1040f4000,
                    length: 10_092_304,
                    flags: 0x8000_0400,
                },
                Section {
                    name: "__stubs".to_string(),
                    start: 0x104a93f10,
                    length: 45_024,
                    flags: 0x8000_0408,
                },
                Section {
                    name: "__cstring".to_string(),
                    start: 0x104aae000,
                    length: 0x2a000,
                    flags: 2,
                },
            ],
            strings: vec![
                StringRecord::new(0x104ad7d90, "viewDidLoad"),
                StringRecord::new(HELLO_WORLD, "Hello World"),
                StringRecord::new(0x104ad8020, "Hello 世界"),
                StringRecord::new(0x104aae470, "AccountSettingsViewController"),
            ],
        };
        let data_const = SegmentSnapshot {
            name: "__DATA_CONST".to_string(),
            start: 0x104cd0000,
            length: 360_448,
            sections: Vec::new(),
            strings: vec![
                StringRecord::new(0x104cd0100, "SignalServiceKit"),
                StringRecord::new(0x104cd0200, "https://signal.org"),
            ],
        };
        let data = SegmentSnapshot {
            name: "__DATA".to_string(),
            start: 0x104d28000,
            length: 1_114_112,
            sections: Vec::new(),
            strings: Vec::new(),
        };

        let mut entry = procedure(ENTRY, &[(ENTRY, ENTRY + 8)]);
        entry.signature = Some("int EntryPoint(int argc, char **argv)".to_string());
        entry.decompiled = Some(
            "int EntryPoint(int argc, char **argv) {\n    [AccountSettingsViewController viewDidLoad];\n    return 0;\n}"
                .to_string(),
        );
        let mut view_did_load = procedure(
            VIEW_DID_LOAD,
            &[(VIEW_DID_LOAD, 0x1040f413c), (0x1040f413c, VIEW_WILL_APPEAR)],
        );
        view_did_load.signature = Some("void -[AccountSettingsViewController viewDidLoad](id self, SEL _cmd)".to_string());
        view_did_load.decompiled = Some(
            "void -[AccountSettingsViewController viewDidLoad](id self, SEL _cmd) {\n    sub_1040f4000();\n}"
                .to_string(),
        );
        let procedures = vec![
            entry,
            procedure(HELPER, &[(HELPER, 0x1040f4110)]),
            view_did_load,
            procedure(VIEW_WILL_APPEAR, &[(VIEW_WILL_APPEAR, SIGNAL_MAIN)]),
            procedure(SIGNAL_MAIN, &[(SIGNAL_MAIN, 0x1040f41f0)]),
        ];

        // EntryPoint -> viewDidLoad -> helper -> Signal::main -> viewDidLoad
        let calls = vec![
            CallReference {
                from: ENTRY,
                to: VIEW_DID_LOAD,
            },
            CallReference {
                from: 0x1040f4138,
                to: HELPER,
            },
            CallReference {
                from: 0x1040f4108,
                to: SIGNAL_MAIN,
            },
            CallReference {
                from: 0x1040f41e0,
                to: VIEW_DID_LOAD,
            },
        ];

        let instructions = BTreeMap::from([
            (
                ENTRY,
                ins(
                    4,
                    "bl",
                    &[(
                        "0x1040f4124",
                        Some("-[AccountSettingsViewController viewDidLoad]"),
                    )],
                ),
            ),
            (ENTRY + 4, ins(4, "ret", &[])),
            (
                VIEW_DID_LOAD,
                ins(
                    4,
                    "stp",
                    &[("x29", None), ("x30", None), ("[sp, #-0x10]!", None)],
                ),
            ),
            (0x1040f4128, ins(4, "mov", &[("x29", None), ("sp", None)])),
            (
                0x1040f412c,
                ins(4, "adrp", &[("x0", None), ("0x104aae000", None)]),
            ),
            (
                0x1040f4130,
                ins(
                    4,
                    "add",
                    &[("x0", None), ("x0", None), ("#0x470", Some("aAccountSettings"))],
                ),
            ),
            (0x1040f4134, ins(4, "nop", &[])),
            (
                0x1040f4138,
                ins(4, "bl", &[("0x1040f4000", Some("sub_1040f4000"))]),
            ),
            (
                0x1040f413c,
                ins(
                    4,
                    "ldp",
                    &[("x29", None), ("x30", None), ("[sp], #0x10", None)],
                ),
            ),
            (0x1040f4140, ins(4, "mov", &[("w0", None), ("#0x0", Some("#0x0"))])),
            (0x1040f4144, ins(4, "nop", &[])),
            (0x1040f4148, ins(4, "ret", &[])),
        ]);

        let names = BTreeMap::from([
            (HELPER, "sub_1040f4000".to_string()),
            (
                VIEW_DID_LOAD,
                "-[AccountSettingsViewController viewDidLoad]".to_string(),
            ),
            (
                VIEW_WILL_APPEAR,
                "-[AccountSettingsViewController viewWillAppear:]".to_string(),
            ),
            (SIGNAL_MAIN, "_ZN6Signal4mainEv".to_string()),
            (ENTRY, "EntryPoint".to_string()),
            (0x104aae470, "aAccountSettings".to_string()),
            (HELLO_WORLD, "aHelloWorld".to_string()),
            (0x104cd0100, "_OBJC_CLASS_$_SignalServiceKit".to_string()),
        ]);
        let demangled_names =
            BTreeMap::from([(SIGNAL_MAIN, "Signal::main()".to_string())]);
        let comments = BTreeMap::from([
            (
                VIEW_DID_LOAD,
                "Signal AccountSettingsViewController viewDidLoad method".to_string(),
            ),
            (HELLO_WORLD, "greeting".to_string()),
        ]);
        let types = BTreeMap::from([
            (ENTRY, DataType::Procedure),
            (HELPER, DataType::Procedure),
            (VIEW_DID_LOAD, DataType::Procedure),
            (VIEW_WILL_APPEAR, DataType::Procedure),
            (SIGNAL_MAIN, DataType::Procedure),
            (0x1040f4128, DataType::Code),
            (HELLO_WORLD, DataType::Ascii),
            (0x104aae470, DataType::Ascii),
        ]);
        let references = vec![
            Reference {
                from: 0x1040f4130,
                to: 0x104aae470,
            },
            Reference {
                from: ENTRY,
                to: VIEW_DID_LOAD,
            },
            Reference {
                from: 0x1040f4138,
                to: HELPER,
            },
        ];

        DocumentSnapshot {
            name: "Signal".to_string(),
            executable_path: "/Applications/Signal.app/Contents/MacOS/Signal".to_string(),
            database_path: database,
            entry_point: ENTRY,
            analysis_active: false,
            segments: vec![text, data_const, data],
            procedures,
            calls,
            instructions,
            names,
            demangled_names,
            comments,
            types,
            references,
        }
    }

    fn third_binary(database: Option<PathBuf>) -> DocumentSnapshot {
        DocumentSnapshot {
            name: "third_binary".to_string(),
            executable_path: "/usr/local/bin/third_binary".to_string(),
            database_path: database,
            entry_point: 0x1000,
            analysis_active: true,
            segments: vec![SegmentSnapshot {
                name: "__TEXT".to_string(),
                start: 0x1000,
                length: 0x1000,
                sections: Vec::new(),
                strings: vec![StringRecord::new(0x1100, "third binary banner")],
            }],
            procedures: vec![procedure(0x1000, &[(0x1000, 0x1010)])],
            names: BTreeMap::from([(0x1000, "_main".to_string())]),
            ..Default::default()
        }
    }

    fn scratch() -> DocumentSnapshot {
        DocumentSnapshot {
            name: "scratch".to_string(),
            executable_path: "/tmp/scratch".to_string(),
            database_path: None,
            entry_point: 0x2000,
            segments: vec![SegmentSnapshot {
                name: "__TEXT".to_string(),
                start: 0x2000,
                length: 0x100,
                sections: Vec::new(),
                strings: vec![StringRecord::new(0x2010, "scratch")],
            }],
            ..Default::default()
        }
    }

    /// Project whose saved documents keep their databases under `dir`.
    pub fn project(dir: &Path) -> ProjectSnapshot {
        ProjectSnapshot {
            current_document: 0,
            documents: vec![
                signal(Some(dir.join("Signal.hop"))),
                third_binary(Some(dir.join("third_binary.hop"))),
                scratch(),
            ],
        }
    }

    pub fn host(dir: &Path) -> SnapshotHost {
        SnapshotHost::new(project(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn signal_text(host: &SnapshotHost) -> SegmentId {
        host.segment_named(DocumentId(0), "__TEXT").unwrap()
    }

    #[test]
    fn test_segment_descriptor_counts() {
        let host = host(Path::new("/nonexistent"));
        let seg = signal_text(&host);
        let desc = host.segment(seg).unwrap();
        assert_eq!(desc.start, TEXT_START);
        assert_eq!(desc.section_count, 3);
        assert_eq!(desc.procedure_count, 5);
        assert_eq!(desc.string_count, 4);
        assert_eq!(desc.label_count, 7);
    }

    #[test]
    fn test_string_enumeration_is_counted() {
        let host = host(Path::new("/nonexistent"));
        let seg = signal_text(&host);
        assert_eq!(host.string_enumerations(), 0);
        let strings = host.strings(seg).unwrap();
        assert_eq!(strings[1], StringRecord::new(HELLO_WORLD, "Hello World"));
        assert_eq!(host.string_enumerations(), 1);
    }

    #[test]
    fn test_address_for_name_uses_sentinel() {
        let host = host(Path::new("/nonexistent"));
        assert_eq!(host.address_for_name(DocumentId(0), "EntryPoint"), ENTRY);
        assert_eq!(
            host.address_for_name(DocumentId(0), "Signal::main()"),
            SIGNAL_MAIN
        );
        assert_eq!(host.address_for_name(DocumentId(0), "missing"), BAD_ADDRESS);
        assert_eq!(host.address_for_name(DocumentId(9), "EntryPoint"), BAD_ADDRESS);
    }

    #[test]
    fn test_procedure_at_inside_block() {
        let host = host(Path::new("/nonexistent"));
        let seg = signal_text(&host);
        let proc = host.procedure_at(seg, 0x1040f4140).unwrap();
        assert_eq!(host.procedure(proc).unwrap().entry_point, VIEW_DID_LOAD);
        let callees = host.callees(proc);
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].to, HELPER);
        let callers = host.callers(proc);
        assert_eq!(callers.len(), 2);
        assert!(host.procedure_at(seg, 0x104ad8000).is_none());
    }

    #[test]
    fn test_mark_and_type_at() {
        let mut host = host(Path::new("/nonexistent"));
        let seg = signal_text(&host);
        assert_eq!(host.type_at(seg, 0x1040f4500), Some(DataType::Undefined));
        assert!(host.mark(seg, 0x1040f4500, DataMark::IntArray, 2));
        assert_eq!(host.type_at(seg, 0x1040f4500), Some(DataType::Int32));
        assert_eq!(host.type_at(seg, 0x1040f4504), Some(DataType::Int32));
        assert!(host.mark(seg, 0x1040f4500, DataMark::Undefined, 8));
        assert_eq!(host.type_at(seg, 0x1040f4504), Some(DataType::Undefined));
        assert!(!host.mark(seg, 0x10, DataMark::Code, 1));
    }

    #[test]
    fn test_rebase_shifts_everything() {
        let mut host = host(Path::new("/nonexistent"));
        host.rebase(DocumentId(0), 0x100000000).unwrap();
        let doc = host.document(DocumentId(0)).unwrap();
        assert_eq!(doc.entry_point, ENTRY - 0x40f0000);
        let seg = host.segment_named(DocumentId(0), "__TEXT").unwrap();
        assert_eq!(host.segment(seg).unwrap().start, 0x100000000);
        assert_eq!(
            host.name_at(seg, ENTRY - 0x40f0000).as_deref(),
            Some("EntryPoint")
        );
    }

    #[test]
    fn test_save_document_rewrites_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(
            &path,
            serde_json::to_string(&project(dir.path())).unwrap(),
        )
        .unwrap();

        let mut host = SnapshotHost::load(&path).unwrap();
        assert!(host.set_name_at(DocumentId(0), 0x1040f4500, "renamed"));
        host.save_document(DocumentId(0)).unwrap();

        let reloaded = SnapshotHost::load(&path).unwrap();
        assert_eq!(
            reloaded.address_for_name(DocumentId(0), "renamed"),
            0x1040f4500
        );
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = SnapshotHost::load(&path).err().unwrap();
        assert!(matches!(err, ToolError::HostError(_)));
    }
}
