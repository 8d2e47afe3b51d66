//! Control-flow graph construction.
//!
//! Successor edges follow from each block's final instruction; the
//! predecessor sets are maintained symmetrically. Call targets are not
//! CFG successors (call/return is a separate relation), and indirect
//! jumps contribute no edge until jump-table resolution supplies one.

use crate::cpu::decoder::DecodedLine;
use crate::types::{BasicBlock, BlockId};
use std::collections::BTreeMap;

/// Wire successor and predecessor edges between `blocks`.
pub fn build_cfg(blocks: &mut [BasicBlock], lines: &[DecodedLine]) {
    let by_start: BTreeMap<u32, BlockId> = blocks.iter().map(|b| (b.start, b.id)).collect();

    let mut edges: Vec<(BlockId, BlockId)> = Vec::new();
    for block in blocks.iter() {
        let Some(last) = lines.get(block.lines.end.saturating_sub(1)) else {
            continue;
        };
        let fall_through = by_start.get(&last.next_address()).copied();
        let target = last
            .operand
            .and_then(|op| op.address())
            .and_then(|addr| by_start.get(&addr))
            .copied();
        let indirect = last.mode.is_some_and(|m| m.is_indirect());

        let Some(mnemonic) = last.mnemonic else {
            // Data lines fall through.
            if let Some(next) = fall_through {
                edges.push((block.id, next));
            }
            continue;
        };

        if mnemonic.is_unconditional_jump() {
            if let Some(target) = target.filter(|_| !indirect) {
                edges.push((block.id, target));
            }
        } else if mnemonic.is_conditional_branch() {
            if let Some(target) = target {
                edges.push((block.id, target));
            }
            if let Some(next) = fall_through {
                edges.push((block.id, next));
            }
        } else if mnemonic.is_return() || mnemonic.halts() {
            // No successors.
        } else {
            // Calls and everything else fall through.
            if let Some(next) = fall_through {
                edges.push((block.id, next));
            }
        }
    }

    for (from, to) in edges {
        blocks[from.0 as usize].successors.insert(to);
        blocks[to.0 as usize].predecessors.insert(from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::blocks::tests::decode_code;
    use crate::analysis::blocks::split_blocks;
    use pretty_assertions::assert_eq;

    fn built(code: &[u8]) -> Vec<BasicBlock> {
        let lines = decode_code(code);
        let mut blocks = split_blocks(&lines, &[]);
        build_cfg(&mut blocks, &lines);
        blocks
    }

    fn find(blocks: &[BasicBlock], start: u32) -> &BasicBlock {
        blocks.iter().find(|b| b.start == start).unwrap()
    }

    #[test]
    fn test_conditional_branch_has_two_successors() {
        // $8000: BNE $8004 / $8002: LDA #$01 / $8004: RTS
        let code = [0xD0, 0x02, 0xA9, 0x01, 0x60];
        let blocks = built(&code);
        let head = find(&blocks, 0x00_8000);
        assert_eq!(head.successors.len(), 2);
        let target = find(&blocks, 0x00_8004);
        assert!(target.predecessors.contains(&head.id));
    }

    #[test]
    fn test_unconditional_jump_has_one_successor() {
        // $8000: JMP $8004 / $8003: RTS / $8004: RTS
        let code = [0x4C, 0x04, 0x80, 0x60, 0x60];
        let blocks = built(&code);
        let head = find(&blocks, 0x00_8000);
        let target = find(&blocks, 0x00_8004);
        assert_eq!(head.successors.len(), 1);
        assert!(head.successors.contains(&target.id));
        // The dead RTS after the jump has no predecessors.
        assert!(find(&blocks, 0x00_8003).predecessors.is_empty());
    }

    #[test]
    fn test_call_successor_is_fall_through_only() {
        // $8000: JSR $8004 / $8003: RTS / $8004: RTS
        let code = [0x20, 0x04, 0x80, 0x60, 0x60];
        let blocks = built(&code);
        let head = find(&blocks, 0x00_8000);
        let fall = find(&blocks, 0x00_8003);
        let callee = find(&blocks, 0x00_8004);
        assert_eq!(head.successors.len(), 1);
        assert!(head.successors.contains(&fall.id));
        assert!(!head.successors.contains(&callee.id));
        assert!(callee.is_function_entry);
    }

    #[test]
    fn test_return_block_has_no_successors() {
        let code = [0x60, 0x60];
        let blocks = built(&code);
        assert!(find(&blocks, 0x00_8000).successors.is_empty());
    }

    #[test]
    fn test_indirect_jump_has_no_successors() {
        let code = [0x7C, 0x34, 0x12, 0x60];
        let blocks = built(&code);
        assert!(find(&blocks, 0x00_8000).successors.is_empty());
    }

    #[test]
    fn test_edge_symmetry() {
        // Every A->B edge appears in B's predecessors and back.
        let code = [0xD0, 0x02, 0xA9, 0x01, 0x4C, 0x00, 0x80, 0x60];
        let blocks = built(&code);
        for block in &blocks {
            for succ in &block.successors {
                assert!(blocks[succ.0 as usize].predecessors.contains(&block.id));
            }
            for pred in &block.predecessors {
                assert!(blocks[pred.0 as usize].successors.contains(&block.id));
            }
        }
    }
}
