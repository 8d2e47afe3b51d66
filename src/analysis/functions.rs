//! Multi-heuristic function discovery.
//!
//! Candidates come from the interrupt vectors, call targets, prologue
//! patterns, and fall-ins after unconditional transfers; each source
//! carries its own confidence and the strongest evidence wins. End
//! addresses are never synthesized.

use crate::cpu::decoder::DecodedLine;
use crate::cpu::opcodes::{AddressingMode, Mnemonic};
use crate::types::{BasicBlock, Function, VectorTable};
use std::collections::{BTreeMap, BTreeSet};

/// Confidence attached to each discovery source.
mod confidence {
    pub const VECTOR: f64 = 1.0;
    pub const CALL_TARGET: f64 = 0.9;
    pub const PROLOGUE: f64 = 0.7;
    pub const FALL_IN: f64 = 0.6;
}

/// Discover functions in the decoded stream.
pub fn discover(
    lines: &[DecodedLine],
    blocks: &[BasicBlock],
    vectors: &VectorTable,
) -> BTreeMap<u32, Function> {
    let line_addresses: BTreeSet<u32> = lines.iter().map(|l| l.address).collect();
    let mut functions: BTreeMap<u32, Function> = BTreeMap::new();

    let add = |functions: &mut BTreeMap<u32, Function>,
                   addr: u32,
                   conf: f64,
                   interrupt: Option<bool>| {
        functions
            .entry(addr)
            .and_modify(|f| {
                if conf > f.confidence {
                    f.confidence = conf;
                }
                if let Some(interrupt) = interrupt {
                    f.is_interrupt = interrupt;
                }
            })
            .or_insert_with(|| Function::new(addr, conf, interrupt.unwrap_or(false)));
    };

    // Vector handlers. RESET is an entry point but not an interrupt.
    for set in [&vectors.native, &vectors.emulation] {
        for (name, handler) in set.entries() {
            if handler == 0 || handler == 0xFFFF {
                continue;
            }
            let addr = u32::from(handler);
            if line_addresses.contains(&addr) {
                add(&mut functions, addr, confidence::VECTOR, Some(name != "RESET"));
            }
        }
    }

    // Call targets.
    for line in lines {
        if line.mnemonic.is_some_and(|m| m.is_call()) {
            if let Some(target) = resolved_target(line) {
                if line_addresses.contains(&target) {
                    add(&mut functions, target, confidence::CALL_TARGET, None);
                }
            }
        }
    }

    // Prologue patterns.
    for (i, line) in lines.iter().enumerate() {
        if matches_prologue(lines, i) {
            add(&mut functions, line.address, confidence::PROLOGUE, None);
        }
    }

    // Fall-ins after unconditional transfers, unless the address is
    // already a known branch target.
    let branch_targets: BTreeSet<u32> = lines
        .iter()
        .filter(|l| {
            l.mnemonic
                .is_some_and(|m| m.is_conditional_branch() || m.is_unconditional_jump())
        })
        .filter_map(resolved_target)
        .collect();
    for window in lines.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        let transfers = prev
            .mnemonic
            .is_some_and(|m| m.is_unconditional_jump() || m.is_return());
        if transfers && !branch_targets.contains(&next.address) {
            add(&mut functions, next.address, confidence::FALL_IN, None);
        }
    }

    link_calls(lines, &mut functions);
    attach_blocks(blocks, &mut functions);
    attach_switch_tables(lines, &mut functions);

    functions
}

fn resolved_target(line: &DecodedLine) -> Option<u32> {
    if line.mode.is_some_and(|m| m.is_indirect()) {
        return None;
    }
    line.operand.and_then(|op| op.address())
}

/// Prologue families: `PHB, PHK, PLB`; `PHA, PHX, PHY`; bare `PHP`.
fn matches_prologue(lines: &[DecodedLine], i: usize) -> bool {
    let mnemonic = |k: usize| lines.get(k).and_then(|l| l.mnemonic);
    match mnemonic(i) {
        Some(Mnemonic::PHP) => true,
        Some(Mnemonic::PHB) => {
            mnemonic(i + 1) == Some(Mnemonic::PHK) && mnemonic(i + 2) == Some(Mnemonic::PLB)
        }
        Some(Mnemonic::PHA) => {
            mnemonic(i + 1) == Some(Mnemonic::PHX) && mnemonic(i + 2) == Some(Mnemonic::PHY)
        }
        _ => false,
    }
}

/// Fill caller/callee sets from the call relation.
fn link_calls(lines: &[DecodedLine], functions: &mut BTreeMap<u32, Function>) {
    let starts: Vec<u32> = functions.keys().copied().collect();
    let enclosing = |addr: u32| -> Option<u32> {
        match starts.binary_search(&addr) {
            Ok(i) => Some(starts[i]),
            Err(0) => None,
            Err(i) => Some(starts[i - 1]),
        }
    };

    for line in lines {
        if !line.mnemonic.is_some_and(|m| m.is_call()) {
            continue;
        }
        let Some(target) = resolved_target(line) else {
            continue;
        };
        if let Some(callee) = functions.get_mut(&target) {
            callee.callers.insert(line.address);
        }
        if functions.contains_key(&target) {
            if let Some(caller_start) = enclosing(line.address) {
                if let Some(caller) = functions.get_mut(&caller_start) {
                    caller.callees.insert(target);
                }
            }
        }
    }
}

/// Collect each function's blocks by CFG reachability from its entry,
/// and record loop heads from back edges.
fn attach_blocks(blocks: &[BasicBlock], functions: &mut BTreeMap<u32, Function>) {
    let by_start: BTreeMap<u32, usize> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.start, i))
        .collect();

    for function in functions.values_mut() {
        let Some(&entry) = by_start.get(&function.start) else {
            continue;
        };
        let mut stack = vec![entry];
        let mut seen = BTreeSet::new();
        seen.insert(blocks[entry].id);
        while let Some(idx) = stack.pop() {
            for succ in &blocks[idx].successors {
                let succ_block = &blocks[succ.0 as usize];
                // Back edge: control returns to an earlier block.
                if succ_block.start <= blocks[idx].start && seen.contains(succ) {
                    if !function.loops.contains(&succ_block.start) {
                        function.loops.push(succ_block.start);
                    }
                }
                if seen.insert(*succ) {
                    stack.push(succ.0 as usize);
                }
            }
        }
        function.blocks = seen;
    }
}

/// Record jump-table dispatch sites inside each function's span.
fn attach_switch_tables(lines: &[DecodedLine], functions: &mut BTreeMap<u32, Function>) {
    let starts: Vec<u32> = functions.keys().copied().collect();
    for line in lines {
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
        let Some(pointer) = line.operand.and_then(|op| op.address()) else {
            continue;
        };
        let owner = match starts.binary_search(&line.address) {
            Ok(i) => Some(starts[i]),
            Err(0) => None,
            Err(i) => Some(starts[i - 1]),
        };
        if let Some(start) = owner {
            if let Some(function) = functions.get_mut(&start) {
                if !function.switch_tables.contains(&pointer) {
                    function.switch_tables.push(pointer);
                }
            }
        }
    }
}
