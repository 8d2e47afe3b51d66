//! Single-instruction decoding.
//!
//! `decode` consumes bytes at a ROM offset and produces one
//! [`DecodedLine`]. The tracked flag state supplies immediate widths
//! and is advanced in place when the instruction is `REP`, `SEP` or
//! `XCE`; nothing else mutates it. Truncated fetches downgrade to data
//! bytes instead of failing.

use crate::cpu::flags::FlagState;
use crate::cpu::opcodes::{AddressingMode, Mnemonic, Opcode, OPCODE_TABLE};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Whether a line decodes as an instruction or was downgraded to data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Instruction,
    Data,
}

/// Decoded operand value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Literal value (immediates, stack-relative offsets).
    Immediate(u32),
    /// Memory address. PC-relative operands arrive here already
    /// resolved to the target logical address; indirect modes carry
    /// the pointer address, not the final target.
    Address(u32),
    /// Block-move bank pair, source then destination.
    BlockMove { src_bank: u8, dst_bank: u8 },
}

impl Operand {
    /// The address payload, when this operand is one.
    pub fn address(&self) -> Option<u32> {
        match self {
            Operand::Address(addr) => Some(*addr),
            _ => None,
        }
    }
}

/// One line of the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedLine {
    /// Logical address of the first byte.
    pub address: u32,
    /// ROM file offset of the first byte.
    pub offset: u32,
    /// Raw instruction bytes.
    pub bytes: Vec<u8>,
    /// First raw byte.
    pub opcode: u8,
    /// Instruction or data-byte downgrade.
    pub kind: LineKind,
    /// Mnemonic; `None` on data lines.
    pub mnemonic: Option<Mnemonic>,
    /// Addressing mode; `None` on data lines.
    pub mode: Option<AddressingMode>,
    /// Decoded operand, when the mode has one.
    pub operand: Option<Operand>,
    /// Attached label, filled in by the symbol pass or the caller.
    pub label: Option<String>,
    /// Attached comment.
    pub comment: Option<String>,
}

impl DecodedLine {
    /// Logical address of the following line.
    pub fn next_address(&self) -> u32 {
        self.address + self.bytes.len() as u32
    }

    /// The instruction-table row for this line, if it is one.
    pub fn instruction(&self) -> Option<&'static Opcode> {
        match self.kind {
            LineKind::Instruction => Some(&OPCODE_TABLE[self.opcode as usize]),
            LineKind::Data => None,
        }
    }

    /// Assembler-style rendering, e.g. `LDA #$1234` or `DB $42`.
    pub fn render(&self) -> String {
        let (Some(mnemonic), Some(mode)) = (self.mnemonic, self.mode) else {
            return format!("DB ${:02X}", self.opcode);
        };
        let operand = match (mode, self.operand) {
            (AddressingMode::Implied, _) | (_, None) => String::new(),
            (AddressingMode::Accumulator, _) => " A".into(),
            (_, Some(op)) => format!(" {}", render_operand(mode, op, self.bytes.len())),
        };
        format!("{mnemonic}{operand}")
    }
}

fn render_operand(mode: AddressingMode, operand: Operand, total_len: usize) -> String {
    use AddressingMode::*;
    match operand {
        Operand::BlockMove { src_bank, dst_bank } => {
            format!("${src_bank:02X},${dst_bank:02X}")
        }
        Operand::Immediate(value) => match mode {
            Immediate8 | ImmediateM | ImmediateX => {
                if total_len == 3 {
                    format!("#${value:04X}")
                } else {
                    format!("#${value:02X}")
                }
            }
            StackRelative => format!("${value:02X},S"),
            StackRelativeIndirectY => format!("(${value:02X},S),Y"),
            _ => format!("#${value:02X}"),
        },
        Operand::Address(addr) => match mode {
            Direct => format!("${addr:02X}"),
            DirectX => format!("${addr:02X},X"),
            DirectY => format!("${addr:02X},Y"),
            DirectIndirect => format!("(${addr:02X})"),
            DirectIndirectY => format!("(${addr:02X}),Y"),
            DirectXIndirect => format!("(${addr:02X},X)"),
            DirectIndirectLong => format!("[${addr:02X}]"),
            DirectIndirectLongY => format!("[${addr:02X}],Y"),
            Absolute => format!("${:04X}", addr & 0xFFFF),
            AbsoluteX => format!("${:04X},X", addr & 0xFFFF),
            AbsoluteY => format!("${:04X},Y", addr & 0xFFFF),
            AbsoluteIndirect => format!("(${:04X})", addr & 0xFFFF),
            AbsoluteIndirectLong => format!("[${:04X}]", addr & 0xFFFF),
            AbsoluteXIndirect => format!("(${:04X},X)", addr & 0xFFFF),
            AbsoluteLong => format!("${addr:06X}"),
            AbsoluteLongX => format!("${addr:06X},X"),
            Relative8 | Relative16 => format!("${:04X}", addr & 0xFFFF),
            _ => format!("${addr:04X}"),
        },
    }
}

/// Decode one instruction at `offset`.
///
/// `address` is the logical address of that offset. Advances the flag
/// state for `REP`/`SEP`/`XCE`. Returns a data-byte line when the
/// declared length runs past the end of the buffer.
pub fn decode(data: &[u8], offset: usize, address: u32, flags: &mut FlagState) -> DecodedLine {
    let opcode_byte = data[offset];
    let opcode = &OPCODE_TABLE[opcode_byte as usize];
    let needed = opcode.bytes(flags);

    if offset + needed > data.len() {
        // Truncated fetch: keep what exists as data.
        return data_line(data, offset, address);
    }

    let bytes = data[offset..offset + needed].to_vec();
    let operand = assemble_operand(opcode, &bytes, address);

    // Shadowed flag updates.
    match opcode.mnemonic {
        Mnemonic::REP => flags.rep(bytes[1]),
        Mnemonic::SEP => flags.sep(bytes[1]),
        Mnemonic::XCE => {
            // Carry is assumed clear unless the caller models it.
            flags.xce(false);
        }
        _ => {}
    }

    DecodedLine {
        address,
        offset: offset as u32,
        bytes,
        opcode: opcode_byte,
        kind: LineKind::Instruction,
        mnemonic: Some(opcode.mnemonic),
        mode: Some(opcode.mode),
        operand,
        label: None,
        comment: None,
    }
}

/// Produce a raw data-byte line at `offset`.
pub fn data_line(data: &[u8], offset: usize, address: u32) -> DecodedLine {
    DecodedLine {
        address,
        offset: offset as u32,
        bytes: vec![data[offset]],
        opcode: data[offset],
        kind: LineKind::Data,
        mnemonic: None,
        mode: None,
        operand: None,
        label: None,
        comment: None,
    }
}

fn assemble_operand(opcode: &Opcode, bytes: &[u8], address: u32) -> Option<Operand> {
    use AddressingMode::*;
    let operand = &bytes[1..];
    match opcode.mode {
        Implied | Accumulator => None,
        Immediate8 => Some(Operand::Immediate(u32::from(operand[0]))),
        ImmediateM | ImmediateX => Some(Operand::Immediate(if operand.len() == 2 {
            u32::from(LittleEndian::read_u16(operand))
        } else {
            u32::from(operand[0])
        })),
        StackRelative | StackRelativeIndirectY => Some(Operand::Immediate(u32::from(operand[0]))),
        Direct | DirectX | DirectY | DirectIndirect | DirectIndirectY | DirectXIndirect
        | DirectIndirectLong | DirectIndirectLongY => {
            Some(Operand::Address(u32::from(operand[0])))
        }
        Absolute => {
            let value = u32::from(LittleEndian::read_u16(operand));
            // Jumps and calls land in the current program bank; plain
            // data operands keep the bare 16-bit address.
            let resolved = if opcode.mnemonic.is_call() || opcode.mnemonic.is_unconditional_jump()
            {
                (address & 0xFF_0000) | value
            } else {
                value
            };
            Some(Operand::Address(resolved))
        }
        AbsoluteX | AbsoluteY => {
            Some(Operand::Address(u32::from(LittleEndian::read_u16(operand))))
        }
        // Indirect pointers are fetched from bank 0.
        AbsoluteIndirect | AbsoluteIndirectLong | AbsoluteXIndirect => {
            Some(Operand::Address(u32::from(LittleEndian::read_u16(operand))))
        }
        AbsoluteLong | AbsoluteLongX => Some(Operand::Address(
            u32::from(operand[0])
                | (u32::from(operand[1]) << 8)
                | (u32::from(operand[2]) << 16),
        )),
        Relative8 => {
            let disp = operand[0] as i8;
            let next = address.wrapping_add(bytes.len() as u32);
            Some(Operand::Address(
                next.wrapping_add_signed(i32::from(disp)) & 0xFF_FFFF,
            ))
        }
        Relative16 => {
            let disp = LittleEndian::read_i16(operand);
            let next = address.wrapping_add(bytes.len() as u32);
            Some(Operand::Address(
                next.wrapping_add_signed(i32::from(disp)) & 0xFF_FFFF,
            ))
        }
        BlockMove => Some(Operand::BlockMove {
            src_bank: operand[0],
            dst_bank: operand[1],
        }),
    }
}
