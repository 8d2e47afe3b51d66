//! Core types for the SNES disassembler.
//!
//! This module defines the shared vocabulary used to represent
//! analysis results: cartridge mapping families, memory regions,
//! basic blocks, functions, cross-references, detected data
//! structures, and symbols.
//!
//! Entities refer to each other through logical addresses or opaque
//! [`BlockId`] handles, never through owned pointer graphs, so a whole
//! analysis can be snapshotted or cached by value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

/// Cartridge mapping family.
///
/// Distinguishes the ROM window layout across 64-KB banks plus the
/// special-chip families that override the base layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum MappingFamily {
    LoRom,
    HiRom,
    ExLoRom,
    ExHiRom,
    Sa1,
    SuperFx,
    Dsp,
    Cx4,
    St01x,
    Spc7110,
    Sdd1,
    Srtc,
    Obc1,
    Bsx,
    Msu1,
    Unknown,
}

impl MappingFamily {
    /// Returns a human-readable name for this family.
    pub fn name(&self) -> &'static str {
        match self {
            MappingFamily::LoRom => "LoROM",
            MappingFamily::HiRom => "HiROM",
            MappingFamily::ExLoRom => "ExLoROM",
            MappingFamily::ExHiRom => "ExHiROM",
            MappingFamily::Sa1 => "SA-1",
            MappingFamily::SuperFx => "SuperFX",
            MappingFamily::Dsp => "DSP",
            MappingFamily::Cx4 => "CX4",
            MappingFamily::St01x => "ST01x",
            MappingFamily::Spc7110 => "SPC7110",
            MappingFamily::Sdd1 => "S-DD1",
            MappingFamily::Srtc => "S-RTC",
            MappingFamily::Obc1 => "OBC1",
            MappingFamily::Bsx => "BS-X",
            MappingFamily::Msu1 => "MSU1",
            MappingFamily::Unknown => "Unknown",
        }
    }

    /// Whether the address translator should use the HiROM bank layout.
    ///
    /// Special-chip families keep the base layout of the map mode they
    /// ship with; the translator receives the base layout through this
    /// predicate.
    pub fn uses_hirom_layout(&self) -> bool {
        matches!(
            self,
            MappingFamily::HiRom | MappingFamily::ExHiRom | MappingFamily::Spc7110
        )
    }
}

impl fmt::Display for MappingFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Memory access timing class, selected by bit 4 of the map-mode byte.
///
/// Affects cycle counts, never decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemorySpeed {
    #[default]
    Slow,
    Fast,
}

impl fmt::Display for MemorySpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySpeed::Slow => write!(f, "slow"),
            MemorySpeed::Fast => write!(f, "fast"),
        }
    }
}

/// What a logical address range is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Rom,
    Ram,
    Sram,
    Io,
    OpenBus,
}

/// A half-open logical address range with access metadata.
///
/// Regions are non-overlapping within a bank; banks may mirror the
/// same ROM pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    /// First logical address of the region (inclusive).
    pub start: u32,
    /// One past the last logical address (exclusive).
    pub end: u32,
    /// Backing kind.
    pub kind: RegionKind,
    /// Readable by the CPU.
    pub readable: bool,
    /// Writable by the CPU.
    pub writable: bool,
    /// Access timing class.
    pub speed: MemorySpeed,
    /// Human description, e.g. "LoROM banks 00-7F upper halves".
    pub description: String,
}

impl MemoryRegion {
    /// Size of the region in bytes.
    pub fn size(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the region contains the given logical address.
    pub fn contains(&self, address: u32) -> bool {
        address >= self.start && address < self.end
    }
}

/// Why one address refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReferenceKind {
    Read,
    Write,
    Execute,
    Jump,
    Call,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceKind::Read => "READ",
            ReferenceKind::Write => "WRITE",
            ReferenceKind::Execute => "EXECUTE",
            ReferenceKind::Jump => "JUMP",
            ReferenceKind::Call => "CALL",
        };
        write!(f, "{s}")
    }
}

/// A single from→to reference discovered in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    /// Address being referred to.
    pub target: u32,
    /// Reason for the reference.
    pub kind: ReferenceKind,
    /// Address of the referring instruction.
    pub source: u32,
    /// Textual rendering of the referring instruction, when available.
    pub rendering: Option<String>,
}

/// Classified data-structure kind.
///
/// The variant order is the tie-break order of the detector families:
/// when two detections of equal confidence claim one address, the
/// earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataKind {
    PointerTable,
    JumpTable,
    GraphicsData,
    MusicData,
    StringTable,
    PaletteData,
    TileData,
    SpriteData,
    LevelData,
    MapData,
}

impl DataKind {
    /// Lower-case tag used when synthesizing symbol names.
    pub fn tag(&self) -> &'static str {
        match self {
            DataKind::PointerTable => "ptr_table",
            DataKind::JumpTable => "jump_table",
            DataKind::StringTable => "string",
            DataKind::GraphicsData => "gfx",
            DataKind::MusicData => "music",
            DataKind::PaletteData => "palette",
            DataKind::TileData => "tiles",
            DataKind::SpriteData => "sprites",
            DataKind::LevelData => "level",
            DataKind::MapData => "map",
        }
    }
}

/// A recognized data structure in the ROM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStructure {
    /// Logical address of the structure.
    pub address: u32,
    /// Detected kind.
    pub kind: DataKind,
    /// Size in bytes, when estimable.
    pub size: u32,
    /// Number of entries, for table-like structures.
    pub entry_count: u32,
    /// Detection confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Optional format hint, e.g. "4bpp" or "resolved targets".
    pub format_hint: Option<String>,
}

/// Symbol classification.
///
/// Conflicts at one address resolve by [`SymbolKind::priority`], then
/// confidence, then first writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolKind {
    Code,
    Data,
    Function,
    Variable,
    Constant,
    Vector,
    Register,
}

impl SymbolKind {
    /// Static priority for conflict resolution; higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            SymbolKind::Register => 6,
            SymbolKind::Vector => 5,
            SymbolKind::Function => 4,
            SymbolKind::Constant => 3,
            SymbolKind::Data => 2,
            SymbolKind::Code => 1,
            SymbolKind::Variable => 0,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Code => "CODE",
            SymbolKind::Data => "DATA",
            SymbolKind::Function => "FUNCTION",
            SymbolKind::Variable => "VARIABLE",
            SymbolKind::Constant => "CONSTANT",
            SymbolKind::Vector => "VECTOR",
            SymbolKind::Register => "REGISTER",
        };
        write!(f, "{s}")
    }
}

/// A named address in the symbol table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Logical address the symbol names.
    pub address: u32,
    /// Identifier; matches `[A-Za-z_][A-Za-z0-9_]*`.
    pub name: String,
    /// Classification.
    pub kind: SymbolKind,
    /// Size in bytes, when known.
    pub size: Option<u32>,
    /// Addresses that reference this symbol.
    pub references: Vec<u32>,
    /// Confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Optional description, e.g. the hardware-register summary.
    pub description: Option<String>,
}

/// Opaque handle to a basic block in the block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// A maximal straight-line instruction sequence.
///
/// `lines` indexes into the analysis listing; the block never owns its
/// instructions, so the arena stays flat and snapshot-friendly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Handle of this block in the arena.
    pub id: BlockId,
    /// First logical address (inclusive).
    pub start: u32,
    /// One past the last byte of the final instruction (exclusive).
    pub end: u32,
    /// Index range into the listing for this block's lines.
    pub lines: Range<usize>,
    /// Blocks that may transfer control here.
    pub predecessors: BTreeSet<BlockId>,
    /// Blocks control may transfer to.
    pub successors: BTreeSet<BlockId>,
    /// Start address is a call target or vector entry.
    pub is_function_entry: bool,
    /// Final instruction is RTS/RTL/RTI.
    pub ends_with_return: bool,
}

/// A discovered function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Entry address.
    pub start: u32,
    /// End address; absent unless a later heuristic proves one.
    pub end: Option<u32>,
    /// Addresses of call sites targeting this function.
    pub callers: BTreeSet<u32>,
    /// Entry addresses this function calls.
    pub callees: BTreeSet<u32>,
    /// Blocks reachable from the entry without crossing a return.
    pub blocks: BTreeSet<BlockId>,
    /// Reached through a non-RESET vector.
    pub is_interrupt: bool,
    /// Discovery confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Jump tables dispatched from inside this function.
    pub switch_tables: Vec<u32>,
    /// Loop head addresses (targets of back edges).
    pub loops: Vec<u32>,
}

impl Function {
    /// Create a fresh function record at `start`.
    pub fn new(start: u32, confidence: f64, is_interrupt: bool) -> Self {
        Self {
            start,
            end: None,
            callers: BTreeSet::new(),
            callees: BTreeSet::new(),
            blocks: BTreeSet::new(),
            is_interrupt,
            confidence,
            switch_tables: Vec::new(),
            loops: Vec::new(),
        }
    }
}

/// The six interrupt vectors of one CPU personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorSet {
    pub cop: u16,
    pub brk: u16,
    pub abort: u16,
    pub nmi: u16,
    pub reset: u16,
    pub irq: u16,
}

impl VectorSet {
    /// Iterate (name, handler) pairs in header order.
    pub fn entries(&self) -> [(&'static str, u16); 6] {
        [
            ("COP", self.cop),
            ("BRK", self.brk),
            ("ABORT", self.abort),
            ("NMI", self.nmi),
            ("RESET", self.reset),
            ("IRQ", self.irq),
        ]
    }
}

/// Native- and emulation-mode vector tables from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorTable {
    pub native: VectorSet,
    pub emulation: VectorSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        assert_eq!(MappingFamily::LoRom.name(), "LoROM");
        assert_eq!(MappingFamily::ExHiRom.to_string(), "ExHiROM");
        assert!(MappingFamily::HiRom.uses_hirom_layout());
        assert!(!MappingFamily::Sa1.uses_hirom_layout());
    }

    #[test]
    fn test_region_contains() {
        let region = MemoryRegion {
            start: 0x8000,
            end: 0x10000,
            kind: RegionKind::Rom,
            readable: true,
            writable: false,
            speed: MemorySpeed::Slow,
            description: "bank 00 upper half".into(),
        };
        assert!(region.contains(0x8000));
        assert!(region.contains(0xFFFF));
        assert!(!region.contains(0x10000));
        assert_eq!(region.size(), 0x8000);
    }

    #[test]
    fn test_symbol_kind_priority() {
        assert!(SymbolKind::Register.priority() > SymbolKind::Function.priority());
        assert!(SymbolKind::Function.priority() > SymbolKind::Code.priority());
        assert!(SymbolKind::Code.priority() > SymbolKind::Variable.priority());
    }

    #[test]
    fn test_data_kind_tie_break_order() {
        // Declaration order is the documented tie-break order.
        assert!(DataKind::PointerTable < DataKind::JumpTable);
        assert!(DataKind::GraphicsData < DataKind::StringTable);
        assert!(DataKind::PaletteData < DataKind::TileData);
    }

    #[test]
    fn test_vector_entries_order() {
        let set = VectorSet {
            cop: 1,
            brk: 2,
            abort: 3,
            nmi: 4,
            reset: 5,
            irq: 6,
        };
        let names: Vec<&str> = set.entries().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["COP", "BRK", "ABORT", "NMI", "RESET", "IRQ"]);
    }
}
