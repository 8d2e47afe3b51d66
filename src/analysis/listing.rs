//! Listing production: linear and function-bounded decode sweeps.
//!
//! Both sweeps advance by exact instruction length, so overlapping
//! decodes cannot occur and the output is strictly increasing in
//! logical address. Unmapped addresses are reported and skipped to the
//! next legal address when one exists.

use crate::analysis::Deadline;
use crate::cpu::decoder::{self, DecodedLine};
use crate::cpu::flags::FlagState;
use crate::cpu::opcodes::Mnemonic;
use crate::rom::cartridge::Cartridge;
use crate::rom::mapper;

/// Deadline checkpoints happen every this many instructions.
const CHECKPOINT_INTERVAL: usize = 4096;

/// Result of a sweep: the lines plus whether a deadline cut it short.
#[derive(Debug, Clone)]
pub struct Sweep {
    /// Decoded lines, ordered by address.
    pub lines: Vec<DecodedLine>,
    /// True when the deadline expired before the sweep finished.
    pub incomplete: bool,
}

/// Decode consecutive instructions from `start` until `end`, the end
/// of the mapped ROM window, or the instruction cap.
pub fn linear_sweep(
    image: &[u8],
    cart: &Cartridge,
    start: u32,
    end: Option<u32>,
    flags: &mut FlagState,
    cap: usize,
    deadline: &Deadline,
) -> Sweep {
    let mut lines = Vec::new();
    let mut addr = start;

    while end.map_or(true, |e| addr < e) && lines.len() < cap {
        if lines.len() % CHECKPOINT_INTERVAL == CHECKPOINT_INTERVAL - 1 && deadline.expired() {
            tracing::warn!(address = format_args!("${addr:06X}"), "deadline hit mid-sweep");
            return Sweep {
                lines,
                incomplete: true,
            };
        }

        let offset = match mapper::rom_offset(addr, cart) {
            Ok(offset) => offset as usize,
            Err(_) => {
                tracing::debug!(
                    address = format_args!("${addr:06X}"),
                    "unmapped address in sweep"
                );
                match next_mapped(addr, cart) {
                    Some(next) if end.map_or(true, |e| next < e) => {
                        addr = next;
                        continue;
                    }
                    _ => break,
                }
            }
        };
        if offset >= image.len() {
            break;
        }

        let line = decoder::decode(image, offset, addr, flags);
        addr = line.next_address();
        lines.push(line);
        if addr > 0xFF_FFFF {
            break;
        }
    }

    Sweep {
        lines,
        incomplete: false,
    }
}

/// Like [`linear_sweep`], but stops after the first `RTS`/`RTL`/`RTI`
/// or after `cap` instructions.
pub fn function_sweep(
    image: &[u8],
    cart: &Cartridge,
    start: u32,
    flags: &mut FlagState,
    cap: usize,
    deadline: &Deadline,
) -> Sweep {
    let mut lines = Vec::new();
    let mut addr = start;

    while lines.len() < cap {
        if lines.len() % CHECKPOINT_INTERVAL == CHECKPOINT_INTERVAL - 1 && deadline.expired() {
            return Sweep {
                lines,
                incomplete: true,
            };
        }
        let Ok(offset) = mapper::rom_offset(addr, cart) else {
            break;
        };
        let offset = offset as usize;
        if offset >= image.len() {
            break;
        }

        let line = decoder::decode(image, offset, addr, flags);
        addr = line.next_address();
        let returned = line
            .mnemonic
            .is_some_and(|m| matches!(m, Mnemonic::RTS | Mnemonic::RTL | Mnemonic::RTI));
        lines.push(line);
        if returned {
            break;
        }
    }

    Sweep {
        lines,
        incomplete: false,
    }
}

/// Next legal address after an unmapped one, when any exists in the
/// following handful of banks.
fn next_mapped(addr: u32, cart: &Cartridge) -> Option<u32> {
    let mut bank = (addr >> 16) & 0xFF;
    let off = addr & 0xFFFF;

    // Inside a bank the only candidate left is the upper half.
    if off < 0x8000 {
        let candidate = (bank << 16) | 0x8000;
        if mapper::rom_offset(candidate, cart).is_ok() {
            return Some(candidate);
        }
    }
    for _ in 0..0x100 {
        bank += 1;
        if bank > 0xFF {
            return None;
        }
        let candidate = (bank << 16) | 0x8000;
        if mapper::rom_offset(candidate, cart).is_ok() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::header::tests::lorom_image;
    use crate::rom::header::Header;
    use crate::types::MappingFamily;
    use pretty_assertions::assert_eq;

    fn test_cart() -> Cartridge {
        let image = lorom_image();
        let header = Header::parse(&image, 0x7FC0).unwrap();
        Cartridge::from_header(&header, MappingFamily::LoRom)
    }

    #[test]
    fn test_minimal_rts_listing() {
        let mut image = lorom_image();
        image[0] = 0x60; // RTS at $008000
        let mut flags = FlagState::default();
        let sweep = linear_sweep(
            &image,
            &test_cart(),
            0x00_8000,
            Some(0x00_8001),
            &mut flags,
            usize::MAX,
            &Deadline::none(),
        );
        assert_eq!(sweep.lines.len(), 1);
        let line = &sweep.lines[0];
        assert_eq!(line.address, 0x00_8000);
        assert_eq!(line.bytes, vec![0x60]);
        assert_eq!(line.render(), "RTS");
        assert!(!sweep.incomplete);
    }

    #[test]
    fn test_sweep_is_monotonic() {
        let mut image = lorom_image();
        // A short stretch of real instructions then implicit BRKs.
        let code = [0xC2, 0x30, 0xA9, 0x34, 0x12, 0x1A, 0x48, 0x68, 0x60];
        image[..code.len()].copy_from_slice(&code);
        let mut flags = FlagState { m: true, x: true, e: false };
        let sweep = linear_sweep(
            &image,
            &test_cart(),
            0x00_8000,
            Some(0x00_8100),
            &mut flags,
            usize::MAX,
            &Deadline::none(),
        );
        assert!(sweep
            .lines
            .windows(2)
            .all(|w| w[0].address < w[1].address));
        // Lengths partition the range with no gaps.
        assert!(sweep
            .lines
            .windows(2)
            .all(|w| w[0].next_address() == w[1].address));
    }

    #[test]
    fn test_function_sweep_stops_at_rts() {
        let mut image = lorom_image();
        let code = [0xA9, 0x01, 0x60, 0xA9, 0x02, 0x60];
        image[..code.len()].copy_from_slice(&code);
        let mut flags = FlagState::default();
        let sweep = function_sweep(
            &image,
            &test_cart(),
            0x00_8000,
            &mut flags,
            1000,
            &Deadline::none(),
        );
        assert_eq!(sweep.lines.len(), 2);
        assert_eq!(sweep.lines.last().unwrap().render(), "RTS");
    }

    #[test]
    fn test_function_sweep_honors_cap() {
        let image = lorom_image(); // all zeros: endless BRKs
        let mut flags = FlagState::default();
        let sweep = function_sweep(
            &image,
            &test_cart(),
            0x00_8000,
            &mut flags,
            16,
            &Deadline::none(),
        );
        assert_eq!(sweep.lines.len(), 16);
    }

    #[test]
    fn test_unmapped_start_skips_forward() {
        let mut image = lorom_image();
        image[0x8000] = 0x60; // bank 1 ROM start, $018000
        let mut flags = FlagState::default();
        // $010000 is unmapped under LoROM; sweep resumes at $018000.
        let sweep = linear_sweep(
            &image,
            &test_cart(),
            0x01_0000,
            Some(0x01_8001),
            &mut flags,
            usize::MAX,
            &Deadline::none(),
        );
        assert_eq!(sweep.lines[0].address, 0x01_8000);
        assert_eq!(sweep.lines[0].render(), "RTS");
    }

    #[test]
    fn test_expired_deadline_marks_incomplete() {
        let image = lorom_image();
        let mut flags = FlagState::default();
        let sweep = linear_sweep(
            &image,
            &test_cart(),
            0x00_8000,
            None,
            &mut flags,
            usize::MAX,
            &Deadline::already_expired(),
        );
        assert!(sweep.incomplete);
    }
}
