//! Error types for the SNES disassembler.
//!
//! Recoverable decode conditions (unmapped operands, truncated
//! instructions) are carried as values on the affected lines, not as
//! errors; only conditions that prevent an analysis from proceeding at
//! all surface through [`DisasmError`].

use thiserror::Error;

/// Primary error type for ROM loading and analysis.
#[derive(Debug, Error)]
pub enum DisasmError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is too small to contain a header region.
    #[error("Bad ROM file: expected at least {expected} bytes, got {actual}")]
    BadRomFile { expected: usize, actual: usize },

    /// Every header candidate scored below the configured threshold.
    ///
    /// Carries the best candidate so the caller may proceed anyway.
    #[error("Ambiguous header: best candidate at 0x{offset:06X} scored {score}, threshold {threshold}")]
    AmbiguousHeader { offset: usize, score: u32, threshold: u32 },

    /// A requested start address does not fall in any mapped ROM region.
    #[error("Unmapped address: ${address:06X} has no ROM mapping under {family}")]
    UnmappedAddress { address: u32, family: String },

    /// A split-ROM part named by the filename pattern could not be read.
    #[error("Missing split part: {path}")]
    MissingSplitPart { path: String },

    /// A symbol name violated the identifier rules.
    #[error("Invalid symbol name {name:?} for address ${address:06X}")]
    InvalidSymbolName { address: u32, name: String },

    /// Cache corruption detected by content digest mismatch.
    #[error("Cache corruption: digest mismatch for key {key}")]
    CacheCorruption { key: String },
}

/// Result type alias for disassembler operations.
pub type Result<T> = std::result::Result<T, DisasmError>;

/// Value-level error for address translation (never panics, never thrown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    /// No translation rule matched the bank/offset pair.
    Unmapped,
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressError::Unmapped => write!(f, "address not mapped to ROM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DisasmError::BadRomFile {
            expected: 32768,
            actual: 16,
        };
        assert!(err.to_string().contains("32768"));
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_unmapped_display() {
        let err = DisasmError::UnmappedAddress {
            address: 0x7E0000,
            family: "HiROM".into(),
        };
        assert!(err.to_string().contains("7E0000"));
    }
}
