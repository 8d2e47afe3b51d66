//! Data-structure classification.
//!
//! Nine detector families scan the immutable decoded stream for the
//! access idioms that betray tables and blobs. Detectors never erase
//! each other: when two claim one address the higher confidence wins,
//! ties break in the declaration order of `DETECTORS`. With the
//! `parallel` feature the families run concurrently and merge in that
//! same order, so the result is deterministic either way.

use crate::cpu::decoder::{DecodedLine, Operand};
use crate::cpu::opcodes::{AddressingMode, Mnemonic};
use crate::rom::cartridge::Cartridge;
use crate::rom::mapper;
use crate::types::{DataKind, DataStructure};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

/// How far back a store looks for the load that fed it.
const LOAD_WINDOW: usize = 8;

/// Everything a detector family gets to look at.
pub struct DetectContext<'a> {
    pub lines: &'a [DecodedLine],
    pub image: &'a [u8],
    pub cart: &'a Cartridge,
}

type Detector = fn(&DetectContext<'_>) -> Vec<DataStructure>;

/// Detector families in tie-break order.
pub const DETECTORS: [Detector; 9] = [
    detect_pointer_tables,
    detect_jump_tables,
    detect_graphics,
    detect_music,
    detect_strings,
    detect_palettes,
    detect_tiles,
    detect_sprites,
    detect_levels,
];

/// Run every detector family and merge their claims.
pub fn classify(ctx: &DetectContext<'_>) -> BTreeMap<u32, DataStructure> {
    let results = run_detectors(ctx);

    let mut merged: BTreeMap<u32, DataStructure> = BTreeMap::new();
    for detection in results.into_iter().flatten() {
        match merged.get(&detection.address) {
            Some(existing) if existing.confidence >= detection.confidence => {}
            _ => {
                merged.insert(detection.address, detection);
            }
        }
    }
    merged
}

#[cfg(not(feature = "parallel"))]
fn run_detectors(ctx: &DetectContext<'_>) -> Vec<Vec<DataStructure>> {
    DETECTORS.iter().map(|detect| detect(ctx)).collect()
}

#[cfg(feature = "parallel")]
fn run_detectors(ctx: &DetectContext<'_>) -> Vec<Vec<DataStructure>> {
    use rayon::prelude::*;
    // Collected in declaration order regardless of completion order.
    DETECTORS.par_iter().map(|detect| detect(ctx)).collect()
}

fn structure(
    address: u32,
    kind: DataKind,
    size: u32,
    entry_count: u32,
    confidence: f64,
    hint: Option<&str>,
) -> DataStructure {
    DataStructure {
        address,
        kind,
        size,
        entry_count,
        confidence,
        format_hint: hint.map(str::to_string),
    }
}

fn operand_address(line: &DecodedLine) -> Option<u32> {
    line.operand.and_then(|op| op.address())
}

/// Bank-0 bus address of a store/load operand, for port matching.
fn port_of(line: &DecodedLine) -> Option<u32> {
    let addr = operand_address(line)?;
    let bank = (addr >> 16) & 0xFF;
    if bank <= 0x3F || (0x80..=0xBF).contains(&bank) {
        Some(addr & 0xFFFF)
    } else {
        None
    }
}

fn is_store_to(line: &DecodedLine, ports: &[u32]) -> bool {
    line.mnemonic.is_some_and(|m| m.writes_memory())
        && port_of(line).is_some_and(|p| ports.contains(&p))
}

/// The load feeding a port store, searched backwards within the window.
fn feeding_load<'a>(
    lines: &'a [DecodedLine],
    store_idx: usize,
    modes: &[AddressingMode],
) -> Option<&'a DecodedLine> {
    lines[store_idx.saturating_sub(LOAD_WINDOW)..store_idx]
        .iter()
        .rev()
        .find(|l| {
            l.mnemonic == Some(Mnemonic::LDA) && l.mode.is_some_and(|m| modes.contains(&m))
        })
}

/// A ROM-side source address: either it translates, or it is a bare
/// 16-bit in-bank address in the upper half.
fn looks_like_rom(addr: u32, cart: &Cartridge) -> bool {
    if addr < 0x1_0000 {
        return addr >= 0x8000;
    }
    mapper::rom_offset(addr, cart).is_ok()
}

const INDEXED_ROM_MODES: [AddressingMode; 3] = [
    AddressingMode::AbsoluteX,
    AddressingMode::AbsoluteLong,
    AddressingMode::AbsoluteLongX,
];

/// `LDA table,X / STA ptr / LDA table+1,X / STA ptr+1`
fn detect_pointer_tables(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    let mut found = Vec::new();
    for window in ctx.lines.windows(4) {
        let [l0, l1, l2, l3] = window else { continue };
        let lda_x = |l: &DecodedLine| {
            (l.mnemonic == Some(Mnemonic::LDA) && l.mode == Some(AddressingMode::AbsoluteX))
                .then(|| operand_address(l))
                .flatten()
        };
        let sta_dp = |l: &DecodedLine| {
            (l.mnemonic == Some(Mnemonic::STA) && l.mode == Some(AddressingMode::Direct))
                .then(|| operand_address(l))
                .flatten()
        };
        let (Some(table), Some(ptr), Some(table_hi), Some(ptr_hi)) =
            (lda_x(l0), sta_dp(l1), lda_x(l2), sta_dp(l3))
        else {
            continue;
        };
        if table_hi == table + 1 && ptr_hi == ptr + 1 {
            found.push(structure(
                table,
                DataKind::PointerTable,
                0,
                0,
                0.7,
                Some("lo/hi split pointer table"),
            ));
        }
    }
    found
}

/// `JMP (abs)` / `JMP (abs,X)` dispatch; resolves table words when the
/// pointer lands in ROM.
fn detect_jump_tables(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    let mut found = Vec::new();
    for line in ctx.lines {
        let dispatch = line.mnemonic.is_some_and(|m| m.is_unconditional_jump())
            && matches!(
                line.mode,
                Some(AddressingMode::AbsoluteIndirect)
                    | Some(AddressingMode::AbsoluteXIndirect)
                    | Some(AddressingMode::AbsoluteIndirectLong)
            );
        if !dispatch {
            continue;
        }
        let Some(pointer) = operand_address(line) else {
            continue;
        };

        // When the table itself sits in ROM, materialize its words.
        let mut entries = 0u32;
        if let Ok(offset) = mapper::rom_offset(pointer, ctx.cart) {
            let mut offset = offset as usize;
            while entries < 32 && offset + 2 <= ctx.image.len() {
                let word = LittleEndian::read_u16(&ctx.image[offset..]);
                if !(0x8000..=0xFFFF).contains(&word) {
                    break;
                }
                entries += 1;
                offset += 2;
            }
        }
        found.push(structure(
            pointer,
            DataKind::JumpTable,
            entries * 2,
            entries,
            0.7,
            (entries > 0).then_some("resolved code targets"),
        ));
    }
    found
}

/// PPU data ports fed from an indexed ROM load.
fn detect_graphics(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    const GFX_PORTS: [u32; 4] = [0x2104, 0x2118, 0x2119, 0x2122];
    let mut found = Vec::new();
    for (i, line) in ctx.lines.iter().enumerate() {
        if !is_store_to(line, &GFX_PORTS) {
            continue;
        }
        let Some(load) = feeding_load(ctx.lines, i, &INDEXED_ROM_MODES) else {
            continue;
        };
        let Some(source) = operand_address(load) else {
            continue;
        };
        if looks_like_rom(source, ctx.cart) {
            found.push(structure(
                source,
                DataKind::GraphicsData,
                0,
                0,
                0.6,
                Some("PPU upload source"),
            ));
        }
    }
    found
}

/// APU I/O ports fed from any load.
fn detect_music(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    const APU_PORTS: [u32; 4] = [0x2140, 0x2141, 0x2142, 0x2143];
    const ANY_ADDR_MODES: [AddressingMode; 5] = [
        AddressingMode::Absolute,
        AddressingMode::AbsoluteX,
        AddressingMode::AbsoluteY,
        AddressingMode::AbsoluteLong,
        AddressingMode::AbsoluteLongX,
    ];
    let mut found = Vec::new();
    for (i, line) in ctx.lines.iter().enumerate() {
        if !is_store_to(line, &APU_PORTS) {
            continue;
        }
        let Some(load) = feeding_load(ctx.lines, i, &ANY_ADDR_MODES) else {
            continue;
        };
        if let Some(source) = operand_address(load) {
            found.push(structure(
                source,
                DataKind::MusicData,
                0,
                0,
                0.5,
                Some("APU transfer source"),
            ));
        }
    }
    found
}

/// Four or more consecutive slots of printable ASCII or NUL bytes.
fn detect_strings(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    let text_like = |line: &DecodedLine| {
        line.bytes
            .iter()
            .all(|&b| b == 0x00 || (0x20..=0x7E).contains(&b))
    };

    let mut found = Vec::new();
    let mut run_start: Option<usize> = None;
    for i in 0..=ctx.lines.len() {
        let in_run = ctx.lines.get(i).is_some_and(|l| text_like(l));
        match (run_start, in_run) {
            (None, true) => run_start = Some(i),
            (Some(start), false) => {
                if i - start >= 4 {
                    let slice = &ctx.lines[start..i];
                    let size: u32 = slice.iter().map(|l| l.bytes.len() as u32).sum();
                    let terminators = slice
                        .iter()
                        .flat_map(|l| &l.bytes)
                        .filter(|&&b| b == 0x00)
                        .count() as u32;
                    found.push(structure(
                        slice[0].address,
                        DataKind::StringTable,
                        size,
                        terminators,
                        0.7,
                        Some("printable ASCII run"),
                    ));
                }
                run_start = None;
            }
            _ => {}
        }
    }
    found
}

/// CGRAM uploads grouped in 32-byte palettes.
fn detect_palettes(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    let mut found = Vec::new();
    for (i, line) in ctx.lines.iter().enumerate() {
        if !is_store_to(line, &[0x2122]) {
            continue;
        }
        let Some(load) = feeding_load(ctx.lines, i, &INDEXED_ROM_MODES) else {
            continue;
        };
        let Some(source) = operand_address(load) else {
            continue;
        };
        if looks_like_rom(source, ctx.cart) {
            found.push(structure(
                source,
                DataKind::PaletteData,
                32,
                16,
                0.8,
                Some("BGR555 palette"),
            ));
        }
    }
    found
}

/// A counted VRAM upload whose count is a multiple of the 32-byte tile.
fn detect_tiles(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    detect_counted_upload(ctx, &[0x2118, 0x2119], 32, DataKind::TileData, 0.7, "32-byte tiles")
}

/// A counted OAM upload whose count is a multiple of the 4-byte record.
fn detect_sprites(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    detect_counted_upload(ctx, &[0x2104], 4, DataKind::SpriteData, 0.8, "4-byte OAM records")
}

fn detect_counted_upload(
    ctx: &DetectContext<'_>,
    ports: &[u32],
    record: u32,
    kind: DataKind,
    confidence: f64,
    hint: &str,
) -> Vec<DataStructure> {
    let mut found = Vec::new();
    for (i, line) in ctx.lines.iter().enumerate() {
        if !is_store_to(line, ports) {
            continue;
        }
        let Some(load) = feeding_load(ctx.lines, i, &INDEXED_ROM_MODES) else {
            continue;
        };
        let Some(source) = operand_address(load) else {
            continue;
        };
        if !looks_like_rom(source, ctx.cart) {
            continue;
        }
        // The loop bound is an index-register immediate nearby.
        let count = ctx.lines[i.saturating_sub(LOAD_WINDOW)..i]
            .iter()
            .rev()
            .find(|l| {
                matches!(l.mnemonic, Some(Mnemonic::LDX) | Some(Mnemonic::LDY))
                    && l.mode == Some(AddressingMode::ImmediateX)
            })
            .and_then(|l| match l.operand {
                Some(Operand::Immediate(v)) => Some(v),
                _ => None,
            });
        let Some(count) = count.filter(|&v| v > 0 && v % record == 0) else {
            continue;
        };
        found.push(structure(
            source,
            kind,
            count,
            count / record,
            confidence,
            Some(hint),
        ));
    }
    found
}

/// Long ROM loads stored long to WRAM: bulk level/map unpacking.
fn detect_levels(ctx: &DetectContext<'_>) -> Vec<DataStructure> {
    let mut found = Vec::new();
    for (i, line) in ctx.lines.iter().enumerate() {
        let wram_store = line.mnemonic.is_some_and(|m| m.writes_memory())
            && matches!(
                line.mode,
                Some(AddressingMode::AbsoluteLong) | Some(AddressingMode::AbsoluteLongX)
            )
            && operand_address(line).is_some_and(|a| (0x7E_0000..0x80_0000).contains(&a));
        if !wram_store {
            continue;
        }
        let long_modes = [AddressingMode::AbsoluteLong, AddressingMode::AbsoluteLongX];
        let Some(load) = feeding_load(ctx.lines, i, &long_modes) else {
            continue;
        };
        let Some(source) = operand_address(load) else {
            continue;
        };
        if looks_like_rom(source, ctx.cart) {
            found.push(structure(
                source,
                DataKind::LevelData,
                0,
                0,
                0.6,
                Some("WRAM unpack source"),
            ));
        }
    }
    found
}
