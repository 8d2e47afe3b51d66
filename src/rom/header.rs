//! Internal-header parsing and candidate scoring.
//!
//! A SNES ROM carries its metadata at one of a handful of fixed
//! offsets, and nothing in the image says which. Each candidate offset
//! is scored on independent plausibility checks; the highest-scoring
//! candidate wins, with ties broken toward the smaller offset.

use crate::types::{MappingFamily, VectorSet, VectorTable};
use byteorder::{ByteOrder, LittleEndian};

/// Candidate header offsets with the base layout each one implies.
///
/// The two larger offsets are the same locations shifted past a
/// 512-byte copier header that survived stripping.
pub const HEADER_CANDIDATES: [(usize, MappingFamily); 4] = [
    (0x7FC0, MappingFamily::LoRom),
    (0xFFC0, MappingFamily::HiRom),
    (0x81C0, MappingFamily::LoRom),
    (0x101C0, MappingFamily::HiRom),
];

/// Maximum achievable candidate score.
pub const MAX_HEADER_SCORE: u32 = 130;

/// Field offsets within the 64-byte header region.
#[rustfmt::skip]
pub mod offsets {
    pub const TITLE:       usize = 0x00;
    pub const MAP_MODE:    usize = 0x15;
    pub const CART_TYPE:   usize = 0x16;
    pub const ROM_SIZE:    usize = 0x17;
    pub const RAM_SIZE:    usize = 0x18;
    pub const COUNTRY:     usize = 0x19;
    pub const LICENSEE:    usize = 0x1A;
    pub const VERSION:     usize = 0x1B;
    pub const CHECKSUM:    usize = 0x1C;
    pub const COMPLEMENT:  usize = 0x1E;
    pub const NATIVE_VEC:  usize = 0x24;
    pub const EMU_VEC:     usize = 0x34;
}

/// Length of the title field in bytes.
pub const TITLE_LEN: usize = 21;

/// Total header region length read from the image.
pub const HEADER_LEN: usize = 0x40;

/// Cartridge-type bytes with documented meanings, standard and
/// special-chip variants alike.
#[rustfmt::skip]
const KNOWN_CART_TYPES: [u8; 35] = [
    0x00, 0x01, 0x02,
    0x03, 0x04, 0x05, 0x06,
    0x13, 0x14, 0x15, 0x16, 0x1A,
    0x23, 0x24, 0x25, 0x26,
    0x33, 0x34, 0x35, 0x36,
    0x43, 0x44, 0x45, 0x46,
    0x53, 0x54, 0x55, 0x56,
    0xE3, 0xE4, 0xE5, 0xE6,
    0xF3, 0xF5, 0xF6,
];

/// Parsed internal header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Header {
    /// Game title, printable-ASCII bytes kept verbatim.
    pub title: String,
    /// Map-mode byte; low nibble encodes the family, bit 4 the speed.
    pub map_mode: u8,
    /// Cartridge-type byte; high nibble selects a special chip.
    pub cart_type: u8,
    /// ROM size code; size is `1 << code` KB.
    pub rom_size_code: u8,
    /// RAM size code; zero means no SRAM.
    pub ram_size_code: u8,
    /// Country/region code.
    pub country: u8,
    /// Licensee code.
    pub licensee: u8,
    /// Version number.
    pub version: u8,
    /// Declared 16-bit checksum.
    pub checksum: u16,
    /// Declared 16-bit checksum complement.
    pub complement: u16,
    /// Native- and emulation-mode interrupt vectors.
    pub vectors: VectorTable,
}

impl Header {
    /// Parse the header region at `offset`, or `None` when the image
    /// is too short to hold one there.
    pub fn parse(data: &[u8], offset: usize) -> Option<Self> {
        let region = data.get(offset..offset + HEADER_LEN)?;

        let title_bytes = &region[offsets::TITLE..offsets::TITLE + TITLE_LEN];
        let title = title_bytes
            .iter()
            .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
            .collect::<String>()
            .trim_end()
            .to_string();

        Some(Self {
            title,
            map_mode: region[offsets::MAP_MODE],
            cart_type: region[offsets::CART_TYPE],
            rom_size_code: region[offsets::ROM_SIZE],
            ram_size_code: region[offsets::RAM_SIZE],
            country: region[offsets::COUNTRY],
            licensee: region[offsets::LICENSEE],
            version: region[offsets::VERSION],
            checksum: LittleEndian::read_u16(&region[offsets::CHECKSUM..]),
            complement: LittleEndian::read_u16(&region[offsets::COMPLEMENT..]),
            vectors: VectorTable {
                native: read_vector_set(&region[offsets::NATIVE_VEC..]),
                emulation: read_vector_set(&region[offsets::EMU_VEC..]),
            },
        })
    }

    /// Declared ROM size in bytes.
    ///
    /// Garbage codes clamp to the largest cartridge ever made (8 MB).
    pub fn rom_size_bytes(&self) -> u32 {
        1024u32 << self.rom_size_code.min(13)
    }

    /// Declared SRAM size in bytes; zero code means none.
    pub fn sram_size_bytes(&self) -> u32 {
        match self.ram_size_code {
            0 => 0,
            code => 1024u32 << code.min(12),
        }
    }

    /// Whether the map-mode byte selects the fast timing class.
    pub fn is_fast(&self) -> bool {
        self.map_mode & 0x10 != 0
    }
}

fn read_vector_set(bytes: &[u8]) -> VectorSet {
    VectorSet {
        cop: LittleEndian::read_u16(&bytes[0..]),
        brk: LittleEndian::read_u16(&bytes[2..]),
        abort: LittleEndian::read_u16(&bytes[4..]),
        nmi: LittleEndian::read_u16(&bytes[6..]),
        reset: LittleEndian::read_u16(&bytes[8..]),
        irq: LittleEndian::read_u16(&bytes[10..]),
    }
}

/// Result of scoring every candidate offset.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScoredHeader {
    /// Winning offset within the (copier-stripped) image.
    pub offset: usize,
    /// Winning score, in `0..=130`.
    pub score: u32,
    /// Base layout implied by the winning offset.
    pub family: MappingFamily,
    /// The runner-up came within a small margin of the winner.
    pub marginal: bool,
    /// Parsed header at the winning offset.
    pub header: Header,
}

/// Score likelihood that a valid header sits at `offset`.
///
/// Sums weighted sub-scores over checks that are independent evidence:
/// improving any single field never lowers the total. Deterministic and
/// pure.
pub fn score_candidate(data: &[u8], offset: usize, family: MappingFamily) -> u32 {
    let Some(header) = Header::parse(data, offset) else {
        return 0;
    };
    let Some(region) = data.get(offset..offset + HEADER_LEN) else {
        return 0;
    };

    let mut score = 0u32;

    // Title printability, stepped on the printable ratio.
    let printable = region[..TITLE_LEN]
        .iter()
        .filter(|&&b| (0x20..=0x7E).contains(&b))
        .count();
    let ratio = printable as f64 / TITLE_LEN as f64;
    score += if ratio >= 0.9 {
        35
    } else if ratio >= 0.8 {
        25
    } else if ratio >= 0.6 {
        15
    } else if ratio >= 0.4 {
        5
    } else {
        0
    };

    // Map-mode family bit agrees with the offset under test.
    let hirom_bit = header.map_mode & 0x01 != 0;
    if hirom_bit == matches!(family, MappingFamily::HiRom) {
        score += 25;
    }

    // ROM-size code sanity.
    score += match header.rom_size_code {
        7..=13 => 15,
        5..=15 => 8,
        _ => 0,
    };

    // Cartridge-type whitelist.
    if KNOWN_CART_TYPES.contains(&header.cart_type) {
        score += 10;
    }

    // Country code.
    if header.country <= 0x0D {
        score += 8;
    }

    // Checksum/complement consistency.
    if header.checksum ^ header.complement == 0xFFFF {
        score += 15;
    }

    // Reset vector range (emulation-mode RESET is the power-on entry).
    let reset = header.vectors.emulation.reset;
    score += if reset >= 0x8000 {
        12
    } else if reset >= 0x4000 {
        6
    } else {
        0
    };

    // Native NMI/IRQ handlers live in the upper bank half.
    for vector in [header.vectors.native.nmi, header.vectors.native.irq] {
        if vector >= 0x8000 {
            score += 5;
        }
    }

    score
}

/// Margin under which the winner is considered marginal and worth a
/// warning; LoROM map-mode variants with extra bits set land here.
const MARGINAL_MARGIN: u32 = 8;

/// Score all candidate offsets and pick the winner.
///
/// Ties break toward the smaller offset. Returns `None` only when the
/// image cannot hold a header at any candidate.
pub fn choose_header(data: &[u8]) -> Option<ScoredHeader> {
    let scored: Vec<(usize, MappingFamily, u32)> = HEADER_CANDIDATES
        .into_iter()
        .filter(|&(offset, _)| data.len() >= offset + HEADER_LEN)
        .map(|(offset, family)| (offset, family, score_candidate(data, offset, family)))
        .collect();

    // Candidates are declared in ascending offset order, so a strict
    // comparison breaks ties toward the smaller offset.
    let &(offset, family, score) = scored
        .iter()
        .reduce(|best, cand| if cand.2 > best.2 { cand } else { best })?;
    let runner_up = scored
        .iter()
        .filter(|&&(o, _, _)| o != offset)
        .map(|&(_, _, s)| s)
        .max()
        .unwrap_or(0);
    let marginal = score.saturating_sub(runner_up) <= MARGINAL_MARGIN;
    if marginal {
        tracing::warn!(
            offset = format_args!("{offset:#X}"),
            score,
            runner_up,
            "header scoring is marginal; committing to best candidate"
        );
    }

    Some(ScoredHeader {
        offset,
        score,
        family,
        marginal,
        header: Header::parse(data, offset)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a 1 MB image with a plausible LoROM header at 0x7FC0.
    pub(crate) fn lorom_image() -> Vec<u8> {
        let mut data = vec![0u8; 1024 * 1024];
        write_header(&mut data, 0x7FC0, 0x20);
        data
    }

    pub(crate) fn write_header(data: &mut [u8], offset: usize, map_mode: u8) {
        let title = b"TEST CARTRIDGE       ";
        data[offset..offset + TITLE_LEN].copy_from_slice(title);
        data[offset + offsets::MAP_MODE] = map_mode;
        data[offset + offsets::CART_TYPE] = 0x00;
        data[offset + offsets::ROM_SIZE] = 0x0A; // 1024 KB
        data[offset + offsets::RAM_SIZE] = 0x00;
        data[offset + offsets::COUNTRY] = 0x01;
        data[offset + offsets::CHECKSUM] = 0x34;
        data[offset + offsets::CHECKSUM + 1] = 0x12;
        data[offset + offsets::COMPLEMENT] = 0xCB;
        data[offset + offsets::COMPLEMENT + 1] = 0xED;
        // Native NMI/IRQ and emulation RESET in the upper bank half.
        data[offset + offsets::NATIVE_VEC + 6] = 0x00;
        data[offset + offsets::NATIVE_VEC + 7] = 0x81; // NMI $8100
        data[offset + offsets::NATIVE_VEC + 10] = 0x00;
        data[offset + offsets::NATIVE_VEC + 11] = 0x82; // IRQ $8200
        data[offset + offsets::EMU_VEC + 8] = 0x00;
        data[offset + offsets::EMU_VEC + 9] = 0x80; // RESET $8000
    }

    #[test]
    fn test_perfect_lorom_scores_max() {
        let data = lorom_image();
        let score = score_candidate(&data, 0x7FC0, MappingFamily::LoRom);
        assert_eq!(score, MAX_HEADER_SCORE);
    }

    #[test]
    fn test_score_monotonicity_on_complement_fix() {
        let mut data = lorom_image();
        data[0x7FC0 + offsets::COMPLEMENT] ^= 0xFF;
        let broken = score_candidate(&data, 0x7FC0, MappingFamily::LoRom);
        data[0x7FC0 + offsets::COMPLEMENT] ^= 0xFF;
        let fixed = score_candidate(&data, 0x7FC0, MappingFamily::LoRom);
        assert!(fixed >= broken);
        assert_eq!(fixed - broken, 15);
    }

    #[test]
    fn test_choose_header_picks_lorom() {
        let data = lorom_image();
        let chosen = choose_header(&data).unwrap();
        assert_eq!(chosen.offset, 0x7FC0);
        assert_eq!(chosen.family, MappingFamily::LoRom);
        assert_eq!(chosen.header.title, "TEST CARTRIDGE");
    }

    #[test]
    fn test_tie_breaks_toward_smaller_offset() {
        // Identical header bytes at both classic offsets, map mode
        // chosen so both candidates score the family points.
        let mut data = vec![0u8; 1024 * 1024];
        write_header(&mut data, 0x7FC0, 0x20);
        write_header(&mut data, 0xFFC0, 0x21);
        let chosen = choose_header(&data).unwrap();
        assert_eq!(chosen.offset, 0x7FC0);
        assert_eq!(chosen.family, MappingFamily::LoRom);
    }

    #[test]
    fn test_header_field_parse() {
        let data = lorom_image();
        let header = Header::parse(&data, 0x7FC0).unwrap();
        assert_eq!(header.rom_size_code, 0x0A);
        assert_eq!(header.rom_size_bytes(), 1024 * 1024);
        assert_eq!(header.sram_size_bytes(), 0);
        assert_eq!(header.checksum, 0x1234);
        assert_eq!(header.complement, 0xEDCB);
        assert_eq!(header.vectors.emulation.reset, 0x8000);
        assert_eq!(header.vectors.native.nmi, 0x8100);
        assert!(!header.is_fast());
    }

    #[test]
    fn test_short_image_scores_zero() {
        let data = vec![0u8; 0x100];
        assert_eq!(score_candidate(&data, 0x7FC0, MappingFamily::LoRom), 0);
        assert!(choose_header(&data).is_none());
    }
}
