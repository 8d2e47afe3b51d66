//! Cross-reference index.
//!
//! Every decoded line with an operand contributes exactly one entry to
//! the by-target index, kinded by its mnemonic. Entries keep insertion
//! order (listing order) per target; the index is append-only within
//! one analysis run.

use crate::cpu::decoder::{DecodedLine, Operand};
use crate::cpu::opcodes::Mnemonic;
use crate::types::{CrossReference, ReferenceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Target address → ordered references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XrefIndex {
    by_target: BTreeMap<u32, Vec<CrossReference>>,
    total: usize,
}

impl XrefIndex {
    /// Append one reference.
    pub fn insert(&mut self, reference: CrossReference) {
        self.by_target
            .entry(reference.target)
            .or_default()
            .push(reference);
        self.total += 1;
    }

    /// References targeting `address`, in insertion order.
    pub fn references_to(&self, address: u32) -> &[CrossReference] {
        self.by_target
            .get(&address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate (target, references) in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[CrossReference])> {
        self.by_target.iter().map(|(&addr, refs)| (addr, refs.as_slice()))
    }

    /// Total number of references.
    pub fn len(&self) -> usize {
        self.total
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Classify a mnemonic's reference kind.
pub fn reference_kind(mnemonic: Mnemonic) -> ReferenceKind {
    if mnemonic.is_call() {
        ReferenceKind::Call
    } else if mnemonic.is_unconditional_jump() || mnemonic.is_conditional_branch() {
        ReferenceKind::Jump
    } else if mnemonic.reads_memory() {
        ReferenceKind::Read
    } else if mnemonic.writes_memory() {
        ReferenceKind::Write
    } else {
        ReferenceKind::Execute
    }
}

/// Build the index from the decoded stream.
pub fn build_xrefs(lines: &[DecodedLine]) -> XrefIndex {
    let mut index = XrefIndex::default();
    for line in lines {
        let Some(operand) = line.operand else {
            continue;
        };
        let Some(mnemonic) = line.mnemonic else {
            continue;
        };
        let target = match operand {
            Operand::Address(addr) => addr,
            Operand::Immediate(value) => value,
            // Block moves reference the source bank.
            Operand::BlockMove { src_bank, .. } => u32::from(src_bank) << 16,
        };
        index.insert(CrossReference {
            target,
            kind: reference_kind(mnemonic),
            source: line.address,
            rendering: Some(line.render()),
        });
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::blocks::tests::decode_code;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_classification() {
        assert_eq!(reference_kind(Mnemonic::JSR), ReferenceKind::Call);
        assert_eq!(reference_kind(Mnemonic::JSL), ReferenceKind::Call);
        assert_eq!(reference_kind(Mnemonic::JMP), ReferenceKind::Jump);
        assert_eq!(reference_kind(Mnemonic::BNE), ReferenceKind::Jump);
        assert_eq!(reference_kind(Mnemonic::LDA), ReferenceKind::Read);
        assert_eq!(reference_kind(Mnemonic::CPX), ReferenceKind::Read);
        assert_eq!(reference_kind(Mnemonic::STA), ReferenceKind::Write);
        assert_eq!(reference_kind(Mnemonic::STZ), ReferenceKind::Write);
        assert_eq!(reference_kind(Mnemonic::PEA), ReferenceKind::Execute);
        assert_eq!(reference_kind(Mnemonic::REP), ReferenceKind::Execute);
    }

    #[test]
    fn test_every_operand_line_has_one_entry() {
        // LDA $2100 / STA $2101 / JSR $8009 / BNE $8000 / RTS
        let code = [
            0xAD, 0x00, 0x21, 0x8D, 0x01, 0x21, 0x20, 0x09, 0x80, 0xD0, 0xF5, 0x60,
        ];
        let lines = decode_code(&code);
        let index = build_xrefs(&lines);
        let with_operand = lines.iter().filter(|l| l.operand.is_some()).count();
        // Exactly one entry per line with an operand.
        assert_eq!(index.len(), with_operand);
    }

    #[test]
    fn test_by_target_ordering() {
        // Two reads of $2100 in listing order.
        let code = [0xAD, 0x00, 0x21, 0xAD, 0x00, 0x21, 0x60];
        let lines = decode_code(&code);
        let index = build_xrefs(&lines);
        let refs = index.references_to(0x2100);
        assert_eq!(refs.len(), 2);
        assert!(refs[0].source < refs[1].source);
        assert_eq!(refs[0].kind, ReferenceKind::Read);
        assert_eq!(refs[0].rendering.as_deref(), Some("LDA $2100"));
    }

    #[test]
    fn test_call_reference() {
        let code = [0x20, 0x04, 0x80, 0x60, 0x60];
        let lines = decode_code(&code);
        let index = build_xrefs(&lines);
        let refs = index.references_to(0x00_8004);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Call);
        assert_eq!(refs[0].source, 0x00_8000);
    }
}
