//! Shadowed processor flag state.
//!
//! The decoder tracks the M, X and E bits the program *appears* to set
//! up, because they change instruction lengths. The state is advisory:
//! it is what the decoder should assume, not what the program achieves
//! at runtime. Callers analyzing an interrupt entry supply their own
//! initial state.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bits of the 8-bit processor status byte, as named by REP/SEP
    /// operand masks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusMask: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_DISABLE = 0x04;
        const DECIMAL = 0x08;
        /// Index register width (X flag); set means 8-bit.
        const INDEX = 0x10;
        /// Accumulator width (M flag); set means 8-bit.
        const MEMORY = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

/// Tracked M/X/E state threaded through a decode sweep.
///
/// Invariant: while `e` is true, `m` and `x` are forced true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagState {
    /// Accumulator is 8-bit.
    pub m: bool,
    /// Index registers are 8-bit.
    pub x: bool,
    /// Emulation mode.
    pub e: bool,
}

impl Default for FlagState {
    /// Power-on state: emulation mode, everything 8-bit.
    fn default() -> Self {
        Self {
            m: true,
            x: true,
            e: true,
        }
    }
}

impl FlagState {
    /// Native-mode state with 16-bit accumulator and indexes, the
    /// common steady state of game main loops.
    pub fn native_16bit() -> Self {
        Self {
            m: false,
            x: false,
            e: false,
        }
    }

    /// Apply `REP #mask`: clear the selected status bits.
    pub fn rep(&mut self, mask: u8) {
        let mask = StatusMask::from_bits_truncate(mask);
        if mask.contains(StatusMask::MEMORY) {
            self.m = false;
        }
        if mask.contains(StatusMask::INDEX) {
            self.x = false;
        }
        self.enforce_emulation();
    }

    /// Apply `SEP #mask`: set the selected status bits.
    pub fn sep(&mut self, mask: u8) {
        let mask = StatusMask::from_bits_truncate(mask);
        if mask.contains(StatusMask::MEMORY) {
            self.m = true;
        }
        if mask.contains(StatusMask::INDEX) {
            self.x = true;
        }
        self.enforce_emulation();
    }

    /// Apply `XCE`, swapping `e` with the carry.
    ///
    /// Returns the outgoing `e` (the new carry). The static analyzer
    /// assumes carry clear before `XCE` unless the caller models it.
    pub fn xce(&mut self, carry: bool) -> bool {
        let old_e = self.e;
        self.e = carry;
        self.enforce_emulation();
        old_e
    }

    fn enforce_emulation(&mut self) {
        if self.e {
            self.m = true;
            self.x = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_power_on_state() {
        let flags = FlagState::default();
        assert!(flags.m && flags.x && flags.e);
    }

    #[test]
    fn test_rep_30_in_native_mode() {
        let mut flags = FlagState {
            m: true,
            x: true,
            e: false,
        };
        flags.rep(0x30);
        assert_eq!(
            flags,
            FlagState {
                m: false,
                x: false,
                e: false
            }
        );
        flags.sep(0x30);
        assert_eq!(
            flags,
            FlagState {
                m: true,
                x: true,
                e: false
            }
        );
    }

    #[test]
    fn test_rep_is_forced_in_emulation_mode() {
        let mut flags = FlagState::default();
        flags.rep(0x30);
        assert!(flags.m && flags.x);
    }

    #[test]
    fn test_rep_partial_mask() {
        let mut flags = FlagState {
            m: true,
            x: true,
            e: false,
        };
        flags.rep(0x20);
        assert!(!flags.m);
        assert!(flags.x);
    }

    #[test]
    fn test_xce_enters_native_mode() {
        let mut flags = FlagState::default();
        // CLC; XCE - the canonical native-mode entry.
        let carry_out = flags.xce(false);
        assert!(carry_out);
        assert!(!flags.e);
        // M and X stay 8-bit until REP widens them.
        assert!(flags.m && flags.x);
    }

    #[test]
    fn test_xce_back_to_emulation_forces_widths() {
        let mut flags = FlagState::native_16bit();
        flags.xce(true);
        assert!(flags.e && flags.m && flags.x);
    }
}
