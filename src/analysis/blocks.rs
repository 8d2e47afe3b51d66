//! Basic-block splitting.
//!
//! Boundaries are collected from the decoded stream (control-transfer
//! targets, post-control-flow fall-ins, supplied vector entries), then
//! every block extends to just before the next boundary. Blocks live
//! in a flat arena and index into the shared listing.

use crate::cpu::decoder::DecodedLine;
use crate::types::{BasicBlock, BlockId};
use std::collections::{BTreeMap, BTreeSet};

/// Partition `lines` into basic blocks.
///
/// `vectors` carries handler entry addresses from the header, when the
/// caller has them; each becomes a boundary and a function entry.
pub fn split_blocks(lines: &[DecodedLine], vectors: &[u32]) -> Vec<BasicBlock> {
    if lines.is_empty() {
        return Vec::new();
    }

    let line_starts: BTreeMap<u32, usize> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| (line.address, i))
        .collect();

    let mut boundaries = BTreeSet::new();
    let mut entry_points: BTreeSet<u32> = BTreeSet::new();

    // Rule 1: the first instruction.
    boundaries.insert(lines[0].address);

    // Rule 4: vector entries.
    for &vector in vectors {
        if line_starts.contains_key(&vector) {
            boundaries.insert(vector);
            entry_points.insert(vector);
        }
    }

    for line in lines {
        let Some(mnemonic) = line.mnemonic else {
            continue;
        };

        // Rule 2: resolved control-transfer targets.
        if mnemonic.is_conditional_branch()
            || mnemonic.is_unconditional_jump()
            || mnemonic.is_call()
        {
            let direct = !line.mode.is_some_and(|m| m.is_indirect());
            if let Some(target) = line.operand.and_then(|op| op.address()) {
                if direct && line_starts.contains_key(&target) {
                    boundaries.insert(target);
                    if mnemonic.is_call() {
                        entry_points.insert(target);
                    }
                }
            }
        }

        // Rule 3: the instruction after any control-flow instruction.
        if mnemonic.is_control_flow() {
            let next = line.next_address();
            if line_starts.contains_key(&next) {
                boundaries.insert(next);
            }
        }
    }

    // Extend each block to just before the next boundary.
    let mut blocks = Vec::new();
    let bounds: Vec<u32> = boundaries.into_iter().collect();
    for (i, &start) in bounds.iter().enumerate() {
        let first_line = line_starts[&start];
        let last_line = match bounds.get(i + 1) {
            Some(&next_start) => line_starts[&next_start] - 1,
            None => lines.len() - 1,
        };
        let last = &lines[last_line];
        blocks.push(BasicBlock {
            id: BlockId(blocks.len() as u32),
            start,
            end: last.next_address(),
            lines: first_line..last_line + 1,
            predecessors: BTreeSet::new(),
            successors: BTreeSet::new(),
            is_function_entry: entry_points.contains(&start),
            ends_with_return: last.mnemonic.is_some_and(|m| m.is_return()),
        });
    }

    blocks
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::Deadline;
    use crate::analysis::listing::linear_sweep;
    use crate::cpu::flags::FlagState;
    use crate::rom::cartridge::Cartridge;
    use crate::rom::header::tests::lorom_image;
    use crate::rom::header::Header;
    use crate::types::MappingFamily;
    use pretty_assertions::assert_eq;

    pub(crate) fn decode_code(code: &[u8]) -> Vec<DecodedLine> {
        let mut image = lorom_image();
        image[..code.len()].copy_from_slice(code);
        let header = Header::parse(&image, 0x7FC0).unwrap();
        let cart = Cartridge::from_header(&header, MappingFamily::LoRom);
        let mut flags = FlagState { m: true, x: true, e: false };
        linear_sweep(
            &image,
            &cart,
            0x00_8000,
            Some(0x00_8000 + code.len() as u32),
            &mut flags,
            usize::MAX,
            &Deadline::none(),
        )
        .lines
    }

    #[test]
    fn test_branch_splits_blocks() {
        // $8000: LDA #$00
        // $8002: BNE $8006
        // $8004: LDA #$01   <- fall-through boundary
        // $8006: RTS        <- branch target boundary
        let code = [0xA9, 0x00, 0xD0, 0x02, 0xA9, 0x01, 0x60];
        let lines = decode_code(&code);
        let blocks = split_blocks(&lines, &[]);
        let starts: Vec<u32> = blocks.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![0x00_8000, 0x00_8004, 0x00_8006]);
        assert!(blocks[2].ends_with_return);
    }

    #[test]
    fn test_block_coverage_has_no_gaps() {
        let code = [0xA9, 0x00, 0xD0, 0x02, 0xA9, 0x01, 0x60];
        let lines = decode_code(&code);
        let blocks = split_blocks(&lines, &[]);
        // The union of block ranges equals the decoded address set.
        assert_eq!(blocks[0].start, lines[0].address);
        assert!(blocks.windows(2).all(|w| w[0].end == w[1].start));
        assert_eq!(
            blocks.last().unwrap().end,
            lines.last().unwrap().next_address()
        );
        // Line ranges partition the listing.
        let total: usize = blocks.iter().map(|b| b.lines.len()).sum();
        assert_eq!(total, lines.len());
    }

    #[test]
    fn test_call_target_is_function_entry() {
        // $8000: JSR $8004
        // $8003: RTS
        // $8004: RTS
        let code = [0x20, 0x04, 0x80, 0x60, 0x60];
        let lines = decode_code(&code);
        let blocks = split_blocks(&lines, &[]);
        let callee = blocks.iter().find(|b| b.start == 0x00_8004).unwrap();
        assert!(callee.is_function_entry);
        let caller = blocks.iter().find(|b| b.start == 0x00_8000).unwrap();
        assert!(!caller.is_function_entry);
    }

    #[test]
    fn test_vector_entry_is_boundary() {
        let code = [0xA9, 0x00, 0xA9, 0x01, 0x60];
        let lines = decode_code(&code);
        let blocks = split_blocks(&lines, &[0x00_8002]);
        let vector_block = blocks.iter().find(|b| b.start == 0x00_8002).unwrap();
        assert!(vector_block.is_function_entry);
    }

    #[test]
    fn test_indirect_jump_has_no_target_boundary() {
        // JMP ($1234,X); RTS - the pointer is not a block start.
        let code = [0x7C, 0x34, 0x12, 0x60];
        let lines = decode_code(&code);
        let blocks = split_blocks(&lines, &[]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].start, 0x00_8003);
    }
}
