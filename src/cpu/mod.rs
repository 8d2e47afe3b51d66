//! 65816 instruction decoding.
//!
//! The decoder is table-driven: a static 256-entry matrix supplies
//! mnemonic, addressing mode, length and cycle descriptor, and a small
//! shadowed flag-state machine supplies the widths of M/X-dependent
//! immediates. Nothing here executes anything.

pub mod decoder;
pub mod flags;
pub mod opcodes;
pub mod registers;

pub use decoder::{decode, DecodedLine, LineKind, Operand};
pub use flags::{FlagState, StatusMask};
pub use opcodes::{AddressingMode, CycleMods, Mnemonic, Opcode, OPCODE_TABLE};
pub use registers::{register_name, HardwareRegister, RegisterAccess, HARDWARE_REGISTERS};
