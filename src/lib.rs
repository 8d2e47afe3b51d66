//! SNES ROM static disassembler and analyzer.
//!
//! This library takes a raw ROM image of the 65816-based 16-bit
//! console and produces a structured model of the program inside it:
//! a decoded listing, basic blocks and a control-flow graph,
//! discovered functions, cross-references, classified data structures,
//! and a validated symbol table.
//!
//! # Features
//!
//! - **Header recovery**: candidate header offsets are scored on
//!   independent plausibility checks; the winner selects the mapping
//!   family
//! - **Dump canonicalization**: copier headers, split dumps,
//!   interleaving and overdumps are detected and repaired, never fatal
//! - **Address translation**: LoROM/HiROM/ExLoROM/ExHiROM bank layouts
//!   with mirror regions and bank wrap
//! - **Width-aware decoding**: immediate widths follow the tracked
//!   M/X/E flag state across `REP`/`SEP`/`XCE`
//! - **Static analysis**: blocks, CFG, functions, data structures,
//!   cross-references, symbols, validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use snes_disasm::{analyze_file, AnalyzerOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analysis = analyze_file("game.sfc")?;
//!     println!("Family: {}", analysis.cartridge.family);
//!     for (start, function) in &analysis.functions {
//!         println!("function at ${start:06X}, confidence {:.1}", function.confidence);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! No emulation happens anywhere: the analysis is fully static, and
//! ambiguity is reported through confidences rather than resolved by
//! execution.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod analysis;
pub mod cache;
pub mod cpu;
pub mod error;
pub mod formatter;
pub mod rom;
pub mod types;

pub use analysis::{analyze_rom, Analysis, AnalyzerOptions, Deadline, LogLevel};
pub use cache::{CacheKey, Phase, ResultCache};
pub use cpu::{decode, DecodedLine, FlagState, LineKind, Mnemonic, Operand};
pub use error::{AddressError, DisasmError, Result};
pub use formatter::{
    export_symbols, import_symbols, HumanFormatter, JsonFormatter, SymbolFormat,
};
pub use rom::{logical_address, rom_offset, Cartridge, Header, LoadFlags, LoadedRom};
pub use types::{
    BasicBlock, BlockId, CrossReference, DataKind, DataStructure, Function, MappingFamily,
    MemoryRegion, MemorySpeed, ReferenceKind, RegionKind, Symbol, SymbolKind, VectorSet,
    VectorTable,
};

use std::path::Path;

/// Load and analyze a ROM file with default options.
///
/// This is the primary entry point for file-based analysis.
pub fn analyze_file<P: AsRef<Path>>(path: P) -> Result<Analysis> {
    analyze_file_with_options(path, &AnalyzerOptions::new())
}

/// Load and analyze a ROM file with custom options.
pub fn analyze_file_with_options<P: AsRef<Path>>(
    path: P,
    options: &AnalyzerOptions,
) -> Result<Analysis> {
    let rom = rom::loader::load_file(path, options.min_header_score)?;
    Ok(analyze_rom(&rom, options))
}

/// Analyze a ROM image already in memory with default options.
pub fn analyze_bytes(data: &[u8]) -> Result<Analysis> {
    analyze_bytes_with_options(data, &AnalyzerOptions::new())
}

/// Analyze a ROM image already in memory with custom options.
pub fn analyze_bytes_with_options(data: &[u8], options: &AnalyzerOptions) -> Result<Analysis> {
    let rom = rom::loader::load_bytes(data, options.min_header_score)?;
    Ok(analyze_rom(&rom, options))
}

/// Load and canonicalize a ROM image without analyzing it.
pub fn load_rom(data: &[u8]) -> Result<LoadedRom> {
    rom::loader::load_bytes(data, AnalyzerOptions::new().min_header_score)
}

/// Disassemble one address range of an already-loaded ROM.
///
/// A thin wrapper over the linear sweep for callers that want a
/// listing without the analysis passes.
pub fn disassemble_range(
    rom: &LoadedRom,
    start: u32,
    end: u32,
    initial_flags: FlagState,
) -> Vec<DecodedLine> {
    let cartridge = Cartridge::from_header(&rom.scored.header, rom.scored.family);
    let mut flags = initial_flags;
    analysis::listing::linear_sweep(
        &rom.image,
        &cartridge,
        start,
        Some(end),
        &mut flags,
        usize::MAX,
        &Deadline::none(),
    )
    .lines
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::header::tests::lorom_image;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_analyze_bytes_minimal_rom() {
        let mut image = lorom_image();
        image[0] = 0x60; // RTS at the reset handler
        let mut options = AnalyzerOptions::new();
        options.end_address = Some(0x00_8001);
        let analysis = analyze_bytes_with_options(&image, &options).unwrap();
        assert_eq!(analysis.lines.len(), 1);
        assert_eq!(analysis.lines[0].render(), "RTS");
        assert_eq!(analysis.cartridge.family, MappingFamily::LoRom);
    }

    #[test]
    fn test_analyze_bytes_rejects_tiny_input() {
        assert!(matches!(
            analyze_bytes(&[0u8; 16]),
            Err(DisasmError::BadRomFile { .. })
        ));
    }

    #[test]
    fn test_disassemble_range() {
        let mut image = lorom_image();
        let code = [0xC2, 0x20, 0xA9, 0x34, 0x12, 0xE2, 0x20, 0xA9, 0x56];
        image[..code.len()].copy_from_slice(&code);
        let rom = load_rom(&image).unwrap();
        let lines = disassemble_range(
            &rom,
            0x00_8000,
            0x00_8009,
            FlagState { m: true, x: true, e: false },
        );
        let rendered: Vec<String> = lines.iter().map(|l| l.render()).collect();
        assert_eq!(
            rendered,
            vec!["REP #$20", "LDA #$1234", "SEP #$20", "LDA #$56"]
        );
    }
}
