//! Cartridge model derived from the internal header.
//!
//! The map-mode byte selects the base bank layout, the cartridge-type
//! byte may override the family with a special chip, and together with
//! the size codes they determine the descriptive memory-region map.
//! The model is immutable after construction.

use crate::rom::header::Header;
use crate::types::{MappingFamily, MemoryRegion, MemorySpeed, RegionKind};
use serde::{Deserialize, Serialize};

/// Everything the analyzer needs to know about the cartridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cartridge {
    /// Mapping family, special chips included.
    pub family: MappingFamily,
    /// Raw map-mode byte from the header.
    pub map_mode: u8,
    /// ROM size in bytes.
    pub rom_size: u32,
    /// SRAM size in bytes; zero when absent.
    pub sram_size: u32,
    /// Cartridge carries a battery for SRAM retention.
    pub battery: bool,
    /// Cartridge carries a real-time clock.
    pub rtc: bool,
    /// Access timing class from map-mode bit 4.
    pub speed: MemorySpeed,
    /// Descriptive memory map; the translator does not consult this,
    /// but the symbol generator and validator may.
    pub regions: Vec<MemoryRegion>,
}

/// Special-chip family selected by the cartridge-type byte, when any.
///
/// Overrides the map-mode family.
pub fn special_chip_family(cart_type: u8) -> Option<MappingFamily> {
    match cart_type {
        0x03..=0x06 => Some(MappingFamily::Dsp),
        0x13..=0x1A => Some(MappingFamily::SuperFx),
        0x23..=0x26 => Some(MappingFamily::Obc1),
        0x33..=0x36 => Some(MappingFamily::Sa1),
        0x43..=0x46 => Some(MappingFamily::Sdd1),
        0x53..=0x56 => Some(MappingFamily::Srtc),
        0xF3 => Some(MappingFamily::Cx4),
        0xF5 | 0xF9 => Some(MappingFamily::Spc7110),
        0xF6 => Some(MappingFamily::St01x),
        _ => None,
    }
}

/// Base layout family from the map-mode low nibble.
fn map_mode_family(map_mode: u8) -> Option<MappingFamily> {
    if map_mode & 0x0F > 0x07 {
        return None;
    }
    Some(if map_mode & 0x04 != 0 {
        MappingFamily::ExHiRom
    } else if map_mode & 0x02 != 0 {
        MappingFamily::ExLoRom
    } else if map_mode & 0x01 != 0 {
        MappingFamily::HiRom
    } else {
        MappingFamily::LoRom
    })
}

impl Cartridge {
    /// Build the model from a parsed header.
    ///
    /// `scorer_family` is the base layout implied by the winning header
    /// offset; it backstops a garbage map-mode byte.
    pub fn from_header(header: &Header, scorer_family: MappingFamily) -> Self {
        let base = map_mode_family(header.map_mode).unwrap_or(scorer_family);
        let family = special_chip_family(header.cart_type).unwrap_or(base);

        let battery = matches!(header.cart_type & 0x0F, 0x02 | 0x05 | 0x06);
        let rtc = matches!(family, MappingFamily::Srtc) || header.cart_type == 0xF9;
        let speed = if header.is_fast() {
            MemorySpeed::Fast
        } else {
            MemorySpeed::Slow
        };

        let rom_size = header.rom_size_bytes();
        let sram_size = header.sram_size_bytes();
        let regions = build_regions(family, base, sram_size, speed);

        Self {
            family,
            map_mode: header.map_mode,
            rom_size,
            sram_size,
            battery,
            rtc,
            speed,
            regions,
        }
    }

    /// Base bank layout the address translator should use.
    ///
    /// Special chips keep the layout of the map mode they ship with.
    pub fn base_layout(&self) -> MappingFamily {
        match self.family {
            MappingFamily::LoRom
            | MappingFamily::HiRom
            | MappingFamily::ExLoRom
            | MappingFamily::ExHiRom => self.family,
            MappingFamily::Spc7110 => MappingFamily::HiRom,
            _ => map_mode_family(self.map_mode).unwrap_or(MappingFamily::LoRom),
        }
    }
}

fn region(
    start: u32,
    end: u32,
    kind: RegionKind,
    writable: bool,
    speed: MemorySpeed,
    description: impl Into<String>,
) -> MemoryRegion {
    MemoryRegion {
        start,
        end,
        kind,
        readable: true,
        writable,
        speed,
        description: description.into(),
    }
}

/// Build the descriptive region list for one family.
fn build_regions(
    family: MappingFamily,
    base: MappingFamily,
    sram_size: u32,
    speed: MemorySpeed,
) -> Vec<MemoryRegion> {
    let mut regions = Vec::new();

    // Special-chip windows come first so they shadow the base map.
    match family {
        MappingFamily::Sa1 => {
            regions.push(region(
                0x002200,
                0x002400,
                RegionKind::Io,
                true,
                MemorySpeed::Fast,
                "SA-1 control registers",
            ));
            regions.push(region(
                0x400000,
                0x440000,
                RegionKind::Ram,
                true,
                MemorySpeed::Fast,
                "SA-1 BW-RAM",
            ));
        }
        MappingFamily::SuperFx => {
            regions.push(region(
                0x003000,
                0x003300,
                RegionKind::Io,
                true,
                MemorySpeed::Fast,
                "SuperFX GSU registers",
            ));
            regions.push(region(
                0x700000,
                0x720000,
                RegionKind::Ram,
                true,
                MemorySpeed::Fast,
                "SuperFX game-pak RAM",
            ));
        }
        MappingFamily::Bsx => {
            regions.push(region(
                0x002188,
                0x0021A0,
                RegionKind::Io,
                true,
                MemorySpeed::Fast,
                "BS-X satellite registers",
            ));
            regions.push(region(
                0x700000,
                0x780000,
                RegionKind::Ram,
                true,
                MemorySpeed::Slow,
                "BS-X PSRAM",
            ));
        }
        MappingFamily::Msu1 => {
            regions.push(region(
                0x002000,
                0x002008,
                RegionKind::Io,
                true,
                MemorySpeed::Fast,
                "MSU1 streaming registers",
            ));
        }
        _ => {}
    }

    // System areas common to every cartridge.
    regions.push(region(
        0x000000,
        0x002000,
        RegionKind::Ram,
        true,
        MemorySpeed::Slow,
        "WRAM low mirror (banks 00-3F)",
    ));
    regions.push(region(
        0x002100,
        0x002200,
        RegionKind::Io,
        true,
        MemorySpeed::Fast,
        "PPU/APU registers (banks 00-3F)",
    ));
    regions.push(region(
        0x004200,
        0x004400,
        RegionKind::Io,
        true,
        MemorySpeed::Fast,
        "CPU/DMA registers (banks 00-3F)",
    ));
    regions.push(region(
        0x7E0000,
        0x800000,
        RegionKind::Ram,
        true,
        MemorySpeed::Slow,
        "WRAM",
    ));

    let ex = matches!(base, MappingFamily::ExLoRom | MappingFamily::ExHiRom);
    if base.uses_hirom_layout() {
        // Banks 00-3F expose the upper halves, banks 40-7F whole banks.
        for bank in 0x00u32..=0x3F {
            regions.push(region(
                (bank << 16) | 0x8000,
                (bank + 1) << 16,
                RegionKind::Rom,
                false,
                speed,
                format!("HiROM bank {bank:02X} upper half"),
            ));
        }
        regions.push(region(
            0x400000,
            0x7E0000,
            RegionKind::Rom,
            false,
            speed,
            if ex {
                "ExHiROM extended window (banks 40-7D)"
            } else {
                "HiROM banks 40-7D"
            },
        ));
        regions.push(region(
            0xC00000,
            0xFFFFFF,
            RegionKind::Rom,
            false,
            MemorySpeed::Fast,
            "HiROM fast mirror (banks C0-FF)",
        ));
        if sram_size > 0 {
            for bank in 0x20u32..=0x3F {
                regions.push(region(
                    (bank << 16) | 0x6000,
                    (bank << 16) | 0x8000,
                    RegionKind::Sram,
                    true,
                    MemorySpeed::Slow,
                    format!("HiROM SRAM window, bank {bank:02X}"),
                ));
            }
        }
    } else {
        for bank in 0x00u32..=0x7F {
            regions.push(region(
                (bank << 16) | 0x8000,
                (bank + 1) << 16,
                RegionKind::Rom,
                false,
                speed,
                if ex && bank >= 0x40 {
                    format!("ExLoROM extended bank {bank:02X}")
                } else {
                    format!("LoROM bank {bank:02X}")
                },
            ));
        }
        for bank in 0x80u32..=0xFF {
            regions.push(region(
                (bank << 16) | 0x8000,
                ((bank + 1) << 16).min(0xFFFFFF),
                RegionKind::Rom,
                false,
                MemorySpeed::Fast,
                format!("LoROM fast mirror, bank {bank:02X}"),
            ));
        }
        if sram_size > 0 {
            for bank in 0x70u32..=0x7F {
                regions.push(region(
                    bank << 16,
                    (bank << 16) | 0x8000,
                    RegionKind::Sram,
                    true,
                    MemorySpeed::Slow,
                    format!("LoROM SRAM window, bank {bank:02X}"),
                ));
            }
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::header::tests::lorom_image;
    use pretty_assertions::assert_eq;

    fn lorom_header() -> Header {
        Header::parse(&lorom_image(), 0x7FC0).unwrap()
    }

    #[test]
    fn test_plain_lorom_model() {
        let cart = Cartridge::from_header(&lorom_header(), MappingFamily::LoRom);
        assert_eq!(cart.family, MappingFamily::LoRom);
        assert_eq!(cart.rom_size, 1024 * 1024);
        assert_eq!(cart.sram_size, 0);
        assert!(!cart.battery);
        assert_eq!(cart.speed, MemorySpeed::Slow);
        // No SRAM regions when the RAM size code is zero.
        assert!(cart.regions.iter().all(|r| r.kind != RegionKind::Sram));
    }

    #[test]
    fn test_special_chip_overrides_map_mode() {
        let mut header = lorom_header();
        header.cart_type = 0x34; // SA-1 + RAM
        let cart = Cartridge::from_header(&header, MappingFamily::LoRom);
        assert_eq!(cart.family, MappingFamily::Sa1);
        assert_eq!(cart.base_layout(), MappingFamily::LoRom);
        assert!(cart
            .regions
            .iter()
            .any(|r| r.description.contains("SA-1 BW-RAM")));
    }

    #[test]
    fn test_fast_hirom_with_sram() {
        let mut header = lorom_header();
        header.map_mode = 0x31;
        header.cart_type = 0x02;
        header.ram_size_code = 0x03; // 8 KB
        let cart = Cartridge::from_header(&header, MappingFamily::HiRom);
        assert_eq!(cart.family, MappingFamily::HiRom);
        assert_eq!(cart.speed, MemorySpeed::Fast);
        assert_eq!(cart.sram_size, 8 * 1024);
        assert!(cart.battery);
        assert!(cart
            .regions
            .iter()
            .any(|r| r.kind == RegionKind::Sram && r.start == 0x206000));
    }

    #[test]
    fn test_garbage_map_mode_falls_back_to_scorer() {
        let mut header = lorom_header();
        header.map_mode = 0x0F;
        let cart = Cartridge::from_header(&header, MappingFamily::HiRom);
        assert_eq!(cart.family, MappingFamily::HiRom);
    }

    #[test]
    fn test_exhirom_from_map_mode() {
        let mut header = lorom_header();
        header.map_mode = 0x25;
        let cart = Cartridge::from_header(&header, MappingFamily::HiRom);
        assert_eq!(cart.family, MappingFamily::ExHiRom);
        assert!(cart
            .regions
            .iter()
            .any(|r| r.description.contains("ExHiROM extended window")));
    }

    #[test]
    fn test_rtc_flag() {
        let mut header = lorom_header();
        header.cart_type = 0x55;
        let cart = Cartridge::from_header(&header, MappingFamily::LoRom);
        assert_eq!(cart.family, MappingFamily::Srtc);
        assert!(cart.rtc);
    }
}
