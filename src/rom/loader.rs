//! ROM image loading and canonicalization.
//!
//! Copier headers, split dumps, interleaved dumps and overdumps all
//! predate any file-format standard, so the loader never refuses an
//! anomalous image: every repair it makes is recorded in a flags word
//! and downstream layers decide how much to trust the result.

use crate::error::{DisasmError, Result};
use crate::rom::header::{self, ScoredHeader, HEADER_LEN};
use crate::types::MappingFamily;
use bitflags::bitflags;
use std::path::{Path, PathBuf};

bitflags! {
    /// Anomalies observed (and repaired) while loading.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct LoadFlags: u16 {
        /// A 512-byte copier header was stripped.
        const COPIER_HEADER = 1 << 0;
        /// The image was assembled from split part files.
        const SPLIT_JOINED = 1 << 1;
        /// The split sequence had a gap; parts after it were dropped.
        const SPLIT_GAP = 1 << 2;
        /// Even/odd byte interleaving was detected and undone.
        const DEINTERLEAVED = 1 << 3;
        /// Trailing overdump padding was truncated.
        const OVERDUMP_TRIMMED = 1 << 4;
        /// The best header scored within a small margin of the runner-up.
        const MARGINAL_HEADER = 1 << 5;
        /// Every header candidate scored below the configured threshold.
        const AMBIGUOUS_HEADER = 1 << 6;
        /// Declared and computed checksums disagree.
        const CHECKSUM_MISMATCH = 1 << 7;
    }
}

/// A canonical ROM image plus everything learned while producing it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoadedRom {
    /// Canonical image: copier header stripped, parts joined,
    /// de-interleaved, overdump trimmed.
    pub image: Vec<u8>,
    /// Anomaly record.
    pub flags: LoadFlags,
    /// Winning header candidate.
    pub scored: ScoredHeader,
    /// Checksum computed over the canonical image.
    pub computed_checksum: u16,
    /// Byte count of the original input before repairs.
    pub source_size: usize,
}

impl LoadedRom {
    /// Base mapping family chosen by the header scorer.
    pub fn family(&self) -> MappingFamily {
        self.scored.family
    }
}

/// Smallest image that can hold a header at the first candidate offset.
const MIN_IMAGE_LEN: usize = 0x7FC0 + HEADER_LEN;

/// Score margin required before committing to a de-interleave.
const DEINTERLEAVE_MARGIN: u32 = 2;

/// Load and canonicalize a ROM image from a byte buffer.
pub fn load_bytes(data: &[u8], min_header_score: u32) -> Result<LoadedRom> {
    let source_size = data.len();
    let mut flags = LoadFlags::empty();

    // SMC copier header: 512 stray bytes ahead of the image.
    let mut image: Vec<u8> = if data.len() % 1024 == 512 {
        flags |= LoadFlags::COPIER_HEADER;
        data[512..].to_vec()
    } else {
        data.to_vec()
    };

    if image.len() < MIN_IMAGE_LEN {
        return Err(DisasmError::BadRomFile {
            expected: MIN_IMAGE_LEN,
            actual: image.len(),
        });
    }

    // Interleaved dump: de-interleaving must beat the raw layout by a
    // clear margin before we commit to the swap.
    let raw_score = best_score(&image);
    let swapped = deinterleave(&image);
    let swapped_score = best_score(&swapped);
    if swapped_score > raw_score + DEINTERLEAVE_MARGIN {
        tracing::debug!(raw_score, swapped_score, "interleaved dump detected");
        image = swapped;
        flags |= LoadFlags::DEINTERLEAVED;
    }

    let scored = header::choose_header(&image).ok_or(DisasmError::BadRomFile {
        expected: MIN_IMAGE_LEN,
        actual: image.len(),
    })?;
    if scored.marginal {
        flags |= LoadFlags::MARGINAL_HEADER;
    }
    if scored.score < min_header_score {
        tracing::warn!(
            score = scored.score,
            threshold = min_header_score,
            "all header candidates below threshold; proceeding with best"
        );
        flags |= LoadFlags::AMBIGUOUS_HEADER;
    }

    // Overdump: trailing padding past the declared size.
    let declared = scored.header.rom_size_bytes() as usize;
    if declared >= MIN_IMAGE_LEN && image.len() > declared && is_padding(&image[declared..]) {
        tracing::debug!(
            declared,
            actual = image.len(),
            "overdump padding trimmed"
        );
        image.truncate(declared);
        flags |= LoadFlags::OVERDUMP_TRIMMED;
    }

    let computed_checksum = checksum(&image);
    if computed_checksum != scored.header.checksum {
        flags |= LoadFlags::CHECKSUM_MISMATCH;
    }

    Ok(LoadedRom {
        image,
        flags,
        scored,
        computed_checksum,
        source_size,
    })
}

/// Load a ROM from disk, joining split dumps when the filename matches
/// one of the split-part patterns.
pub fn load_file<P: AsRef<Path>>(path: P, min_header_score: u32) -> Result<LoadedRom> {
    let path = path.as_ref();
    let (data, split_flags) = match split_series(path) {
        Some((parts, gap)) => {
            let (data, mut flags) = read_parts(&parts)?;
            if gap {
                tracing::warn!(
                    after = parts.len(),
                    "split sequence has a gap; later parts dropped"
                );
                flags |= LoadFlags::SPLIT_GAP;
            }
            (data, flags)
        }
        None => (std::fs::read(path)?, LoadFlags::empty()),
    };
    let mut loaded = load_bytes(&data, min_header_score)?;
    loaded.flags |= split_flags;
    Ok(loaded)
}

/// Swap even/odd bytes globally.
fn deinterleave(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for pair in out.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}

fn best_score(data: &[u8]) -> u32 {
    header::HEADER_CANDIDATES
        .into_iter()
        .map(|(offset, family)| header::score_candidate(data, offset, family))
        .max()
        .unwrap_or(0)
}

/// Trailing bytes qualify as overdump padding when they are uniform
/// 0x00, uniform 0xFF, or one repeating 4-byte pattern.
fn is_padding(tail: &[u8]) -> bool {
    if tail.is_empty() {
        return false;
    }
    if tail.iter().all(|&b| b == 0x00) || tail.iter().all(|&b| b == 0xFF) {
        return true;
    }
    if tail.len() >= 4 {
        let pattern = &tail[..4];
        return tail.chunks(4).all(|chunk| &pattern[..chunk.len()] == chunk);
    }
    false
}

/// Wrapping byte sum, the console's own checksum scheme.
fn checksum(image: &[u8]) -> u16 {
    image
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Recognize `name.partN.smc`, `name.N.smc`, `name_N.smc` and
/// `name-N.smc`; return the ordered series of sibling part paths and
/// whether the numbering has a gap past the last joined part.
fn split_series(path: &Path) -> Option<(Vec<PathBuf>, bool)> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    let dir = path.parent()?;

    let (root, sep) = split_stem(stem)?;

    // Part numbering may start at 0 or 1; accept either as long as the
    // sequence is gapless from its first member.
    let mut parts = Vec::new();
    let mut n = if part_path(dir, root, sep, 0, ext).exists() { 0 } else { 1 };
    loop {
        let candidate = part_path(dir, root, sep, n, ext);
        if !candidate.exists() {
            break;
        }
        parts.push(candidate);
        n += 1;
    }
    let gap = part_path(dir, root, sep, n + 1, ext).exists();

    if parts.len() > 1 {
        Some((parts, gap))
    } else {
        None
    }
}

/// Split a file stem into (root, separator) when it ends in a part
/// number, e.g. `game.part2` → `("game", ".part")`.
fn split_stem(stem: &str) -> Option<(&str, &str)> {
    let digits_at = stem.rfind(|c: char| !c.is_ascii_digit())? + 1;
    if digits_at >= stem.len() {
        return None;
    }
    let prefix = &stem[..digits_at];
    for sep in [".part", ".", "_", "-"] {
        if let Some(root) = prefix.strip_suffix(sep) {
            if !root.is_empty() {
                return Some((root, sep));
            }
        }
    }
    None
}

fn part_path(dir: &Path, root: &str, sep: &str, n: usize, ext: &str) -> PathBuf {
    dir.join(format!("{root}{sep}{n}.{ext}"))
}

fn read_parts(parts: &[PathBuf]) -> Result<(Vec<u8>, LoadFlags)> {
    let mut data = Vec::new();
    for part in parts {
        let mut bytes = std::fs::read(part).map_err(|_| DisasmError::MissingSplitPart {
            path: part.display().to_string(),
        })?;
        data.append(&mut bytes);
    }
    tracing::debug!(count = parts.len(), "joined split dump");
    Ok((data, LoadFlags::SPLIT_JOINED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::header::tests::{lorom_image, write_header};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_image_loads_clean() {
        let data = lorom_image();
        let loaded = load_bytes(&data, 40).unwrap();
        assert_eq!(loaded.image.len(), data.len());
        assert!(loaded.flags.contains(LoadFlags::CHECKSUM_MISMATCH));
        assert!(!loaded.flags.contains(LoadFlags::COPIER_HEADER));
        assert_eq!(loaded.family(), MappingFamily::LoRom);
    }

    #[test]
    fn test_copier_header_stripped() {
        let mut data = vec![0xAAu8; 512];
        data.extend(lorom_image());
        let loaded = load_bytes(&data, 40).unwrap();
        assert!(loaded.flags.contains(LoadFlags::COPIER_HEADER));
        assert_eq!(loaded.image.len(), 1024 * 1024);
        assert_eq!(loaded.scored.offset, 0x7FC0);
    }

    #[test]
    fn test_interleaved_image_detected() {
        let data = lorom_image();
        let mut swapped = data.clone();
        for pair in swapped.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
        let loaded = load_bytes(&swapped, 40).unwrap();
        assert!(loaded.flags.contains(LoadFlags::DEINTERLEAVED));
        assert_eq!(loaded.image, data);
    }

    #[test]
    fn test_overdump_trimmed() {
        let mut data = lorom_image();
        data.extend(std::iter::repeat(0xFF).take(512 * 1024));
        let loaded = load_bytes(&data, 40).unwrap();
        assert!(loaded.flags.contains(LoadFlags::OVERDUMP_TRIMMED));
        assert_eq!(loaded.image.len(), 1024 * 1024);
    }

    #[test]
    fn test_overdump_with_content_kept() {
        let mut data = lorom_image();
        let tail: Vec<u8> = (0u32..512 * 1024).map(|i| (i % 251) as u8).collect();
        data.extend(tail);
        let loaded = load_bytes(&data, 40).unwrap();
        assert!(!loaded.flags.contains(LoadFlags::OVERDUMP_TRIMMED));
        assert_eq!(loaded.image.len(), data.len());
    }

    #[test]
    fn test_tiny_file_is_bad_rom() {
        let err = load_bytes(&[0u8; 64], 40).unwrap_err();
        assert!(matches!(err, DisasmError::BadRomFile { .. }));
    }

    #[test]
    fn test_ambiguous_header_flagged_not_fatal() {
        let mut data = vec![0u8; 1024 * 1024];
        // No header anywhere; garbage title, dead vectors.
        data[0x7FC0] = 0x01;
        let loaded = load_bytes(&data, 60).unwrap();
        assert!(loaded.flags.contains(LoadFlags::AMBIGUOUS_HEADER));
    }

    #[test]
    fn test_split_dump_joined() {
        let dir = tempfile::tempdir().unwrap();
        let image = lorom_image();
        let half = image.len() / 2;
        std::fs::write(dir.path().join("game.part1.smc"), &image[..half]).unwrap();
        std::fs::write(dir.path().join("game.part2.smc"), &image[half..]).unwrap();

        let loaded = load_file(dir.path().join("game.part1.smc"), 40).unwrap();
        assert!(loaded.flags.contains(LoadFlags::SPLIT_JOINED));
        assert_eq!(loaded.image, image);
    }

    #[test]
    fn test_split_gap_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let image = lorom_image();
        let half = image.len() / 2;
        std::fs::write(dir.path().join("game.part1.smc"), &image[..half]).unwrap();
        std::fs::write(dir.path().join("game.part2.smc"), &image[half..]).unwrap();
        // Part 3 is missing; part 4 is orphaned.
        std::fs::write(dir.path().join("game.part4.smc"), [0u8; 16]).unwrap();

        let loaded = load_file(dir.path().join("game.part1.smc"), 40).unwrap();
        assert!(loaded.flags.contains(LoadFlags::SPLIT_JOINED));
        assert!(loaded.flags.contains(LoadFlags::SPLIT_GAP));
        assert_eq!(loaded.image.len(), image.len());
    }

    #[test]
    fn test_split_stem_patterns() {
        assert_eq!(split_stem("game.part2"), Some(("game", ".part")));
        assert_eq!(split_stem("game.3"), Some(("game", ".")));
        assert_eq!(split_stem("game_1"), Some(("game", "_")));
        assert_eq!(split_stem("game-0"), Some(("game", "-")));
        assert_eq!(split_stem("game"), None);
    }

    #[test]
    fn test_hirom_header_wins_at_ffc0() {
        let mut data = vec![0u8; 1024 * 1024];
        write_header(&mut data, 0xFFC0, 0x21);
        let loaded = load_bytes(&data, 40).unwrap();
        assert_eq!(loaded.scored.offset, 0xFFC0);
        assert_eq!(loaded.family(), MappingFamily::HiRom);
    }
}
