//! Host API boundary.
//!
//! Everything the tools know about an analysed executable goes through
//! [`HopperHost`]. Documents, segments and procedures are addressed by opaque
//! handles handed out by the host; the tool layer never holds onto host
//! objects across requests.
//!
//! # Sentinel translation
//!
//! Hopper reports "not found" through magic return values instead of errors.
//! Raw values only ever cross this module boundary through
//! [`SentinelConvention::translate`], which turns them into a [`Lookup`]:
//!
//! | Host call                         | Convention                          |
//! |-----------------------------------|-------------------------------------|
//! | [`HopperHost::address_for_name`]  | [`SentinelConvention::AllOnesOrZero`] |
//! | any other raw address result      | [`SentinelConvention::AllOnes`]     |
//!
//! Name lookups accept zero as "not found" because older Hopper builds
//! return 0 there; elsewhere zero can be a legitimate address.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub type Address = u64;

/// All-ones "bad address" value returned by the host for missing entries.
pub const BAD_ADDRESS: Address = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId {
    pub document: DocumentId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcedureId {
    pub segment: SegmentId,
    pub index: usize,
}

/// Result of a host lookup after sentinel translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(Address),
    NotFound,
}

impl Lookup {
    pub fn found(self) -> Option<Address> {
        match self {
            Lookup::Found(addr) => Some(addr),
            Lookup::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelConvention {
    /// Only `0xffff_ffff_ffff_ffff` means "not found".
    AllOnes,
    /// Both all-ones and zero mean "not found".
    AllOnesOrZero,
}

impl SentinelConvention {
    pub fn translate(self, raw: Address) -> Lookup {
        match (self, raw) {
            (_, BAD_ADDRESS) => Lookup::NotFound,
            (SentinelConvention::AllOnesOrZero, 0) => Lookup::NotFound,
            (_, addr) => Lookup::Found(addr),
        }
    }
}

/// An `(address, text)` pair discovered inside a segment.
///
/// Serialised as a two element array `[address, "text"]`, which is the
/// on-disk shape of the string cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Address, String)", into = "(Address, String)")]
pub struct StringRecord {
    pub address: Address,
    pub text: String,
}

impl StringRecord {
    pub fn new(address: Address, text: impl Into<String>) -> Self {
        Self {
            address,
            text: text.into(),
        }
    }
}

impl From<(Address, String)> for StringRecord {
    fn from((address, text): (Address, String)) -> Self {
        Self { address, text }
    }
}

impl From<StringRecord> for (Address, String) {
    fn from(record: StringRecord) -> Self {
        (record.address, record.text)
    }
}

#[derive(Debug, Clone)]
pub struct DocumentDescriptor {
    pub name: String,
    pub executable_path: String,
    /// Backing-store path; `None` while the document has never been saved.
    pub database_path: Option<PathBuf>,
    pub entry_point: Address,
    pub segment_count: usize,
    pub analysis_active: bool,
}

#[derive(Debug, Clone)]
pub struct SegmentDescriptor {
    pub name: String,
    pub start: Address,
    pub length: u64,
    pub section_count: usize,
    pub procedure_count: usize,
    pub string_count: usize,
    pub label_count: usize,
}

impl SegmentDescriptor {
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr - self.start < self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub start: Address,
    pub length: u64,
    #[serde(default)]
    pub flags: u32,
}

impl Section {
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr - self.start < self.length
    }
}

/// Half-open `[start, end)` instruction range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub start: Address,
    pub end: Address,
}

impl BasicBlock {
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }
}

#[derive(Debug, Clone)]
pub struct ProcedureDescriptor {
    pub entry_point: Address,
    pub basic_blocks: Vec<BasicBlock>,
    pub heap_size: u64,
    pub signature: Option<String>,
}

/// A call from the instruction at `from` (inside the caller) to the
/// procedure entered at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReference {
    pub from: Address,
    pub to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionArgument {
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: Address,
    pub length: u64,
    pub mnemonic: String,
    pub arguments: Vec<InstructionArgument>,
    pub architecture: String,
}

/// Data type the host associates with an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Undefined,
    Int8,
    Int16,
    Int32,
    Int64,
    Ascii,
    Unicode,
    Code,
    Procedure,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Ascii => "ascii",
            Self::Unicode => "unicode",
            Self::Code => "code",
            Self::Procedure => "procedure",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `mark_data_type_at_address` asks the host to reinterpret bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMark {
    Code,
    Procedure,
    Undefined,
    Typed(DataType),
    ByteArray,
    ShortArray,
    IntArray,
}

impl DataMark {
    pub const VALID_NAMES: &'static str = "code, procedure, int8, int16, int32, int64, ascii, \
        unicode, undefined, byte_array, short_array, int_array";
}

impl FromStr for DataMark {
    type Err = ToolError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "procedure" => Ok(Self::Procedure),
            "undefined" => Ok(Self::Undefined),
            "int8" => Ok(Self::Typed(DataType::Int8)),
            "int16" => Ok(Self::Typed(DataType::Int16)),
            "int32" => Ok(Self::Typed(DataType::Int32)),
            "int64" => Ok(Self::Typed(DataType::Int64)),
            "ascii" => Ok(Self::Typed(DataType::Ascii)),
            "unicode" => Ok(Self::Typed(DataType::Unicode)),
            "byte_array" => Ok(Self::ByteArray),
            "short_array" => Ok(Self::ShortArray),
            "int_array" => Ok(Self::IntArray),
            _ => Err(ToolError::InvalidParams(format!(
                "Unknown data type '{input}'. Valid types: {}",
                Self::VALID_NAMES
            ))),
        }
    }
}

/// The disassembler's scripting surface as seen by the tools.
///
/// Read calls take `&self`; mutations take `&mut self` and report host
/// refusal through their `bool` result rather than an error, matching the
/// scripting API they stand in for.
pub trait HopperHost: Send {
    fn document_count(&self) -> usize;
    /// Document that was frontmost when the host was attached.
    fn current_document(&self) -> Option<DocumentId>;
    fn document(&self, doc: DocumentId) -> Result<DocumentDescriptor, ToolError>;

    fn segment_count(&self, doc: DocumentId) -> usize;
    fn segment_at_index(&self, doc: DocumentId, index: usize) -> Option<SegmentId>;
    fn segment_at(&self, doc: DocumentId, addr: Address) -> Option<SegmentId>;
    fn segment_named(&self, doc: DocumentId, name: &str) -> Option<SegmentId>;
    fn segment(&self, seg: SegmentId) -> Result<SegmentDescriptor, ToolError>;
    fn sections(&self, seg: SegmentId) -> Vec<Section>;

    /// Enumerate every string in a segment. This is the slow call the
    /// string cache exists to avoid.
    fn strings(&self, seg: SegmentId) -> Result<Vec<StringRecord>, ToolError>;

    fn named_addresses(&self, seg: SegmentId) -> Vec<Address>;
    fn name_at(&self, seg: SegmentId, addr: Address) -> Option<String>;
    fn demangled_name_at(&self, seg: SegmentId, addr: Address) -> Option<String>;
    /// Raw name lookup; see the module docs for its sentinel convention.
    fn address_for_name(&self, doc: DocumentId, name: &str) -> Address;
    fn comment_at(&self, seg: SegmentId, addr: Address) -> Option<String>;
    fn type_at(&self, seg: SegmentId, addr: Address) -> Option<DataType>;

    fn procedure_at(&self, seg: SegmentId, addr: Address) -> Option<ProcedureId>;
    fn procedure(&self, proc: ProcedureId) -> Result<ProcedureDescriptor, ToolError>;
    fn callees(&self, proc: ProcedureId) -> Vec<CallReference>;
    fn callers(&self, proc: ProcedureId) -> Vec<CallReference>;
    fn decompile(&self, proc: ProcedureId) -> Option<String>;

    fn instruction_at(&self, seg: SegmentId, addr: Address) -> Option<Instruction>;
    fn references_to(&self, seg: SegmentId, addr: Address) -> Vec<Address>;
    fn references_from(&self, seg: SegmentId, addr: Address) -> Vec<Address>;

    fn set_name_at(&mut self, doc: DocumentId, addr: Address, name: &str) -> bool;
    fn set_comment_at(&mut self, seg: SegmentId, addr: Address, comment: &str) -> bool;
    fn mark(&mut self, seg: SegmentId, addr: Address, mark: DataMark, length: u64) -> bool;
    fn rebase(&mut self, doc: DocumentId, new_base: Address) -> Result<(), ToolError>;
    fn save_document(&mut self, doc: DocumentId) -> Result<(), ToolError>;

    /// Name at an address, looked up through the containing segment.
    fn document_name_at(&self, doc: DocumentId, addr: Address) -> Option<String> {
        let seg = self.segment_at(doc, addr)?;
        self.name_at(seg, addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_translation() {
        assert_eq!(
            SentinelConvention::AllOnes.translate(BAD_ADDRESS),
            Lookup::NotFound
        );
        assert_eq!(SentinelConvention::AllOnes.translate(0), Lookup::Found(0));
        assert_eq!(
            SentinelConvention::AllOnesOrZero.translate(0),
            Lookup::NotFound
        );
        assert_eq!(
            SentinelConvention::AllOnesOrZero.translate(0x1000),
            Lookup::Found(0x1000)
        );
    }

    #[test]
    fn test_string_record_serializes_as_pair() {
        let record = StringRecord::new(0x104ad8000, "Hello World");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"[4373446656,"Hello World"]"#);
        let back: StringRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_data_mark_parse() {
        assert_eq!("CODE".parse::<DataMark>().unwrap(), DataMark::Code);
        assert_eq!(
            "int32".parse::<DataMark>().unwrap(),
            DataMark::Typed(DataType::Int32)
        );
        let err = "float".parse::<DataMark>().unwrap_err();
        assert!(err.to_string().contains("Unknown data type 'float'"));
    }
}
