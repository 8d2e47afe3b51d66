//! Static 65816 instruction table.
//!
//! All 256 opcode values decode to a defined instruction; the matrix
//! has no holes. Instruction length is `1 + operand length`, where the
//! operand length of the M/X-dependent immediate modes comes from the
//! tracked flag state at decode time.

use crate::cpu::flags::FlagState;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 65816 mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Mnemonic {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRA, BRK, BRL, BVC,
    BVS, CLC, CLD, CLI, CLV, CMP, COP, CPX, CPY, DEC, DEX, DEY, EOR, INC,
    INX, INY, JML, JMP, JSL, JSR, LDA, LDX, LDY, LSR, MVN, MVP, NOP, ORA,
    PEA, PEI, PER, PHA, PHB, PHD, PHK, PHP, PHX, PHY, PLA, PLB, PLD, PLP,
    PLX, PLY, REP, ROL, ROR, RTI, RTL, RTS, SBC, SEC, SED, SEI, SEP, STA,
    STP, STX, STY, STZ, TAX, TAY, TCD, TCS, TDC, TRB, TSB, TSC, TSX, TXA,
    TXS, TXY, TYA, TYX, WAI, WDM, XBA, XCE,
}

impl Mnemonic {
    /// Conditional branch (Bxx).
    pub fn is_conditional_branch(&self) -> bool {
        use Mnemonic::*;
        matches!(self, BCC | BCS | BEQ | BNE | BMI | BPL | BVC | BVS)
    }

    /// Unconditional control transfer that never falls through.
    pub fn is_unconditional_jump(&self) -> bool {
        use Mnemonic::*;
        matches!(self, JMP | JML | BRA | BRL)
    }

    /// Subroutine call.
    pub fn is_call(&self) -> bool {
        matches!(self, Mnemonic::JSR | Mnemonic::JSL)
    }

    /// Subroutine or interrupt return.
    pub fn is_return(&self) -> bool {
        matches!(self, Mnemonic::RTS | Mnemonic::RTL | Mnemonic::RTI)
    }

    /// Halts or never resumes at the next address.
    pub fn halts(&self) -> bool {
        matches!(self, Mnemonic::STP)
    }

    /// Any instruction after which a new basic block begins.
    pub fn is_control_flow(&self) -> bool {
        use Mnemonic::*;
        self.is_conditional_branch()
            || self.is_unconditional_jump()
            || self.is_call()
            || self.is_return()
            || matches!(self, BRK | COP | WAI | STP)
    }

    /// Loads or compares memory into a register.
    pub fn reads_memory(&self) -> bool {
        use Mnemonic::*;
        matches!(
            self,
            LDA | LDX | LDY | CMP | CPX | CPY | BIT | AND | ORA | EOR | ADC | SBC
        )
    }

    /// Stores a register to memory.
    pub fn writes_memory(&self) -> bool {
        use Mnemonic::*;
        matches!(self, STA | STX | STY | STZ)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Addressing modes of the 65816.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    Implied,
    Accumulator,
    /// Fixed 8-bit immediate (REP/SEP masks, BRK/COP signatures, WDM).
    Immediate8,
    /// Immediate whose width follows the M flag.
    ImmediateM,
    /// Immediate whose width follows the X flag.
    ImmediateX,
    Direct,
    DirectX,
    DirectY,
    DirectIndirect,
    DirectIndirectY,
    DirectXIndirect,
    DirectIndirectLong,
    DirectIndirectLongY,
    StackRelative,
    StackRelativeIndirectY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteLong,
    AbsoluteLongX,
    AbsoluteIndirect,
    AbsoluteIndirectLong,
    AbsoluteXIndirect,
    Relative8,
    Relative16,
    BlockMove,
}

impl AddressingMode {
    /// Operand length in bytes under the given flag state.
    pub fn operand_len(&self, flags: &FlagState) -> usize {
        use AddressingMode::*;
        match self {
            Implied | Accumulator => 0,
            Immediate8 | Relative8 => 1,
            ImmediateM => {
                if flags.m {
                    1
                } else {
                    2
                }
            }
            ImmediateX => {
                if flags.x {
                    1
                } else {
                    2
                }
            }
            Direct | DirectX | DirectY | DirectIndirect | DirectIndirectY | DirectXIndirect
            | DirectIndirectLong | DirectIndirectLongY | StackRelative
            | StackRelativeIndirectY => 1,
            Absolute | AbsoluteX | AbsoluteY | AbsoluteIndirect | AbsoluteIndirectLong
            | AbsoluteXIndirect | Relative16 | BlockMove => 2,
            AbsoluteLong | AbsoluteLongX => 3,
        }
    }

    /// The operand is an address the instruction dereferences through,
    /// not the final target.
    pub fn is_indirect(&self) -> bool {
        use AddressingMode::*;
        matches!(
            self,
            DirectIndirect
                | DirectIndirectY
                | DirectXIndirect
                | DirectIndirectLong
                | DirectIndirectLongY
                | StackRelativeIndirectY
                | AbsoluteIndirect
                | AbsoluteIndirectLong
                | AbsoluteXIndirect
        )
    }

    /// PC-relative; the decoder resolves the operand to a target
    /// logical address.
    pub fn is_relative(&self) -> bool {
        matches!(self, AddressingMode::Relative8 | AddressingMode::Relative16)
    }
}

bitflags! {
    /// Cycle-count modifiers on top of the base count.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct CycleMods: u8 {
        /// One extra cycle with a 16-bit accumulator.
        const M16 = 1 << 0;
        /// One extra cycle with 16-bit index registers.
        const X16 = 1 << 1;
        /// One extra cycle when indexing crosses a page.
        const PAGE_CROSS = 1 << 2;
        /// Timing depends on the memory-speed class of the operand.
        const MEM_SPEED = 1 << 3;
    }
}

/// One row of the instruction matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opcode {
    /// Mnemonic.
    pub mnemonic: Mnemonic,
    /// Addressing mode.
    pub mode: AddressingMode,
    /// Base cycle count (8-bit registers, no page cross).
    pub base_cycles: u8,
    /// Cycle modifiers.
    pub mods: CycleMods,
}

impl Opcode {
    /// Encoded instruction length in bytes under the given flag state.
    pub fn bytes(&self, flags: &FlagState) -> usize {
        1 + self.mode.operand_len(flags)
    }
}

const fn op(mnemonic: Mnemonic, mode: AddressingMode, base_cycles: u8, mods: CycleMods) -> Opcode {
    Opcode {
        mnemonic,
        mode,
        base_cycles,
        mods,
    }
}

const NONE: CycleMods = CycleMods::empty();
const M: CycleMods = CycleMods::M16;
const X: CycleMods = CycleMods::X16;
const MR: CycleMods = CycleMods::M16.union(CycleMods::MEM_SPEED);
const MRP: CycleMods = MR.union(CycleMods::PAGE_CROSS);
const XR: CycleMods = CycleMods::X16.union(CycleMods::MEM_SPEED);
const XRP: CycleMods = XR.union(CycleMods::PAGE_CROSS);
const SPD: CycleMods = CycleMods::MEM_SPEED;

/// The full 65816 instruction matrix, indexed by opcode byte.
#[rustfmt::skip]
pub static OPCODE_TABLE: [Opcode; 256] = {
    use AddressingMode::*;
    use Mnemonic::*;
    [
        // 0x00-0x0F
        op(BRK, Immediate8, 7, NONE),
        op(ORA, DirectXIndirect, 6, MR),
        op(COP, Immediate8, 7, NONE),
        op(ORA, StackRelative, 4, MR),
        op(TSB, Direct, 5, MR),
        op(ORA, Direct, 3, MR),
        op(ASL, Direct, 5, MR),
        op(ORA, DirectIndirectLong, 6, MR),
        op(PHP, Implied, 3, NONE),
        op(ORA, ImmediateM, 2, M),
        op(ASL, Accumulator, 2, NONE),
        op(PHD, Implied, 4, NONE),
        op(TSB, Absolute, 6, MR),
        op(ORA, Absolute, 4, MR),
        op(ASL, Absolute, 6, MR),
        op(ORA, AbsoluteLong, 5, MR),
        // 0x10-0x1F
        op(BPL, Relative8, 2, NONE),
        op(ORA, DirectIndirectY, 5, MRP),
        op(ORA, DirectIndirect, 5, MR),
        op(ORA, StackRelativeIndirectY, 7, MR),
        op(TRB, Direct, 5, MR),
        op(ORA, DirectX, 4, MR),
        op(ASL, DirectX, 6, MR),
        op(ORA, DirectIndirectLongY, 6, MR),
        op(CLC, Implied, 2, NONE),
        op(ORA, AbsoluteY, 4, MRP),
        op(INC, Accumulator, 2, NONE),
        op(TCS, Implied, 2, NONE),
        op(TRB, Absolute, 6, MR),
        op(ORA, AbsoluteX, 4, MRP),
        op(ASL, AbsoluteX, 7, MR),
        op(ORA, AbsoluteLongX, 5, MR),
        // 0x20-0x2F
        op(JSR, Absolute, 6, NONE),
        op(AND, DirectXIndirect, 6, MR),
        op(JSL, AbsoluteLong, 8, NONE),
        op(AND, StackRelative, 4, MR),
        op(BIT, Direct, 3, MR),
        op(AND, Direct, 3, MR),
        op(ROL, Direct, 5, MR),
        op(AND, DirectIndirectLong, 6, MR),
        op(PLP, Implied, 4, NONE),
        op(AND, ImmediateM, 2, M),
        op(ROL, Accumulator, 2, NONE),
        op(PLD, Implied, 5, NONE),
        op(BIT, Absolute, 4, MR),
        op(AND, Absolute, 4, MR),
        op(ROL, Absolute, 6, MR),
        op(AND, AbsoluteLong, 5, MR),
        // 0x30-0x3F
        op(BMI, Relative8, 2, NONE),
        op(AND, DirectIndirectY, 5, MRP),
        op(AND, DirectIndirect, 5, MR),
        op(AND, StackRelativeIndirectY, 7, MR),
        op(BIT, DirectX, 4, MR),
        op(AND, DirectX, 4, MR),
        op(ROL, DirectX, 6, MR),
        op(AND, DirectIndirectLongY, 6, MR),
        op(SEC, Implied, 2, NONE),
        op(AND, AbsoluteY, 4, MRP),
        op(DEC, Accumulator, 2, NONE),
        op(TSC, Implied, 2, NONE),
        op(BIT, AbsoluteX, 4, MRP),
        op(AND, AbsoluteX, 4, MRP),
        op(ROL, AbsoluteX, 7, MR),
        op(AND, AbsoluteLongX, 5, MR),
        // 0x40-0x4F
        op(RTI, Implied, 6, NONE),
        op(EOR, DirectXIndirect, 6, MR),
        op(WDM, Immediate8, 2, NONE),
        op(EOR, StackRelative, 4, MR),
        op(MVP, BlockMove, 7, NONE),
        op(EOR, Direct, 3, MR),
        op(LSR, Direct, 5, MR),
        op(EOR, DirectIndirectLong, 6, MR),
        op(PHA, Implied, 3, M),
        op(EOR, ImmediateM, 2, M),
        op(LSR, Accumulator, 2, NONE),
        op(PHK, Implied, 3, NONE),
        op(JMP, Absolute, 3, NONE),
        op(EOR, Absolute, 4, MR),
        op(LSR, Absolute, 6, MR),
        op(EOR, AbsoluteLong, 5, MR),
        // 0x50-0x5F
        op(BVC, Relative8, 2, NONE),
        op(EOR, DirectIndirectY, 5, MRP),
        op(EOR, DirectIndirect, 5, MR),
        op(EOR, StackRelativeIndirectY, 7, MR),
        op(MVN, BlockMove, 7, NONE),
        op(EOR, DirectX, 4, MR),
        op(LSR, DirectX, 6, MR),
        op(EOR, DirectIndirectLongY, 6, MR),
        op(CLI, Implied, 2, NONE),
        op(EOR, AbsoluteY, 4, MRP),
        op(PHY, Implied, 3, X),
        op(TCD, Implied, 2, NONE),
        op(JML, AbsoluteLong, 4, NONE),
        op(EOR, AbsoluteX, 4, MRP),
        op(LSR, AbsoluteX, 7, MR),
        op(EOR, AbsoluteLongX, 5, MR),
        // 0x60-0x6F
        op(RTS, Implied, 6, NONE),
        op(ADC, DirectXIndirect, 6, MR),
        op(PER, Relative16, 6, NONE),
        op(ADC, StackRelative, 4, MR),
        op(STZ, Direct, 3, MR),
        op(ADC, Direct, 3, MR),
        op(ROR, Direct, 5, MR),
        op(ADC, DirectIndirectLong, 6, MR),
        op(PLA, Implied, 4, M),
        op(ADC, ImmediateM, 2, M),
        op(ROR, Accumulator, 2, NONE),
        op(RTL, Implied, 6, NONE),
        op(JMP, AbsoluteIndirect, 5, NONE),
        op(ADC, Absolute, 4, MR),
        op(ROR, Absolute, 6, MR),
        op(ADC, AbsoluteLong, 5, MR),
        // 0x70-0x7F
        op(BVS, Relative8, 2, NONE),
        op(ADC, DirectIndirectY, 5, MRP),
        op(ADC, DirectIndirect, 5, MR),
        op(ADC, StackRelativeIndirectY, 7, MR),
        op(STZ, DirectX, 4, MR),
        op(ADC, DirectX, 4, MR),
        op(ROR, DirectX, 6, MR),
        op(ADC, DirectIndirectLongY, 6, MR),
        op(SEI, Implied, 2, NONE),
        op(ADC, AbsoluteY, 4, MRP),
        op(PLY, Implied, 4, X),
        op(TDC, Implied, 2, NONE),
        op(JMP, AbsoluteXIndirect, 6, NONE),
        op(ADC, AbsoluteX, 4, MRP),
        op(ROR, AbsoluteX, 7, MR),
        op(ADC, AbsoluteLongX, 5, MR),
        // 0x80-0x8F
        op(BRA, Relative8, 3, NONE),
        op(STA, DirectXIndirect, 6, MR),
        op(BRL, Relative16, 4, NONE),
        op(STA, StackRelative, 4, MR),
        op(STY, Direct, 3, XR),
        op(STA, Direct, 3, MR),
        op(STX, Direct, 3, XR),
        op(STA, DirectIndirectLong, 6, MR),
        op(DEY, Implied, 2, NONE),
        op(BIT, ImmediateM, 2, M),
        op(TXA, Implied, 2, NONE),
        op(PHB, Implied, 3, NONE),
        op(STY, Absolute, 4, XR),
        op(STA, Absolute, 4, MR),
        op(STX, Absolute, 4, XR),
        op(STA, AbsoluteLong, 5, MR),
        // 0x90-0x9F
        op(BCC, Relative8, 2, NONE),
        op(STA, DirectIndirectY, 6, MR),
        op(STA, DirectIndirect, 5, MR),
        op(STA, StackRelativeIndirectY, 7, MR),
        op(STY, DirectX, 4, XR),
        op(STA, DirectX, 4, MR),
        op(STX, DirectY, 4, XR),
        op(STA, DirectIndirectLongY, 6, MR),
        op(TYA, Implied, 2, NONE),
        op(STA, AbsoluteY, 5, MR),
        op(TXS, Implied, 2, NONE),
        op(TXY, Implied, 2, NONE),
        op(STZ, Absolute, 4, MR),
        op(STA, AbsoluteX, 5, MR),
        op(STZ, AbsoluteX, 5, MR),
        op(STA, AbsoluteLongX, 5, MR),
        // 0xA0-0xAF
        op(LDY, ImmediateX, 2, X),
        op(LDA, DirectXIndirect, 6, MR),
        op(LDX, ImmediateX, 2, X),
        op(LDA, StackRelative, 4, MR),
        op(LDY, Direct, 3, XR),
        op(LDA, Direct, 3, MR),
        op(LDX, Direct, 3, XR),
        op(LDA, DirectIndirectLong, 6, MR),
        op(TAY, Implied, 2, NONE),
        op(LDA, ImmediateM, 2, M),
        op(TAX, Implied, 2, NONE),
        op(PLB, Implied, 4, NONE),
        op(LDY, Absolute, 4, XR),
        op(LDA, Absolute, 4, MR),
        op(LDX, Absolute, 4, XR),
        op(LDA, AbsoluteLong, 5, MR),
        // 0xB0-0xBF
        op(BCS, Relative8, 2, NONE),
        op(LDA, DirectIndirectY, 5, MRP),
        op(LDA, DirectIndirect, 5, MR),
        op(LDA, StackRelativeIndirectY, 7, MR),
        op(LDY, DirectX, 4, XR),
        op(LDA, DirectX, 4, MR),
        op(LDX, DirectY, 4, XR),
        op(LDA, DirectIndirectLongY, 6, MR),
        op(CLV, Implied, 2, NONE),
        op(LDA, AbsoluteY, 4, MRP),
        op(TSX, Implied, 2, NONE),
        op(TYX, Implied, 2, NONE),
        op(LDY, AbsoluteX, 4, XRP),
        op(LDA, AbsoluteX, 4, MRP),
        op(LDX, AbsoluteY, 4, XRP),
        op(LDA, AbsoluteLongX, 5, MR),
        // 0xC0-0xCF
        op(CPY, ImmediateX, 2, X),
        op(CMP, DirectXIndirect, 6, MR),
        op(REP, Immediate8, 3, NONE),
        op(CMP, StackRelative, 4, MR),
        op(CPY, Direct, 3, XR),
        op(CMP, Direct, 3, MR),
        op(DEC, Direct, 5, MR),
        op(CMP, DirectIndirectLong, 6, MR),
        op(INY, Implied, 2, NONE),
        op(CMP, ImmediateM, 2, M),
        op(DEX, Implied, 2, NONE),
        op(WAI, Implied, 3, NONE),
        op(CPY, Absolute, 4, XR),
        op(CMP, Absolute, 4, MR),
        op(DEC, Absolute, 6, MR),
        op(CMP, AbsoluteLong, 5, MR),
        // 0xD0-0xDF
        op(BNE, Relative8, 2, NONE),
        op(CMP, DirectIndirectY, 5, MRP),
        op(CMP, DirectIndirect, 5, MR),
        op(CMP, StackRelativeIndirectY, 7, MR),
        op(PEI, Direct, 6, NONE),
        op(CMP, DirectX, 4, MR),
        op(DEC, DirectX, 6, MR),
        op(CMP, DirectIndirectLongY, 6, MR),
        op(CLD, Implied, 2, NONE),
        op(CMP, AbsoluteY, 4, MRP),
        op(PHX, Implied, 3, X),
        op(STP, Implied, 3, NONE),
        op(JML, AbsoluteIndirectLong, 6, NONE),
        op(CMP, AbsoluteX, 4, MRP),
        op(DEC, AbsoluteX, 7, MR),
        op(CMP, AbsoluteLongX, 5, MR),
        // 0xE0-0xEF
        op(CPX, ImmediateX, 2, X),
        op(SBC, DirectXIndirect, 6, MR),
        op(SEP, Immediate8, 3, NONE),
        op(SBC, StackRelative, 4, MR),
        op(CPX, Direct, 3, XR),
        op(SBC, Direct, 3, MR),
        op(INC, Direct, 5, MR),
        op(SBC, DirectIndirectLong, 6, MR),
        op(INX, Implied, 2, NONE),
        op(SBC, ImmediateM, 2, M),
        op(NOP, Implied, 2, NONE),
        op(XBA, Implied, 3, NONE),
        op(CPX, Absolute, 4, XR),
        op(SBC, Absolute, 4, MR),
        op(INC, Absolute, 6, MR),
        op(SBC, AbsoluteLong, 5, MR),
        // 0xF0-0xFF
        op(BEQ, Relative8, 2, NONE),
        op(SBC, DirectIndirectY, 5, MRP),
        op(SBC, DirectIndirect, 5, MR),
        op(SBC, StackRelativeIndirectY, 7, MR),
        op(PEA, Absolute, 5, NONE),
        op(SBC, DirectX, 4, MR),
        op(INC, DirectX, 6, MR),
        op(SBC, DirectIndirectLongY, 6, MR),
        op(SED, Implied, 2, NONE),
        op(SBC, AbsoluteY, 4, MRP),
        op(PLX, Implied, 4, X),
        op(XCE, Implied, 2, NONE),
        op(JSR, AbsoluteXIndirect, 8, NONE),
        op(SBC, AbsoluteX, 4, MRP),
        op(INC, AbsoluteX, 7, MR),
        op(SBC, AbsoluteLongX, 5, MR),
    ]
};
