//! ROM image handling.
//!
//! This module covers everything between a file on disk and a decoded
//! instruction stream:
//! - header location and plausibility scoring
//! - copier-header stripping, split-dump joining, de-interleaving and
//!   overdump truncation
//! - the cartridge model (mapping family, sizes, memory regions)
//! - logical-address to ROM-offset translation

pub mod cartridge;
pub mod header;
pub mod loader;
pub mod mapper;

pub use cartridge::{Cartridge, special_chip_family};
pub use header::{Header, ScoredHeader, HEADER_CANDIDATES, MAX_HEADER_SCORE};
pub use loader::{LoadFlags, LoadedRom};
pub use mapper::{logical_address, rom_offset};
