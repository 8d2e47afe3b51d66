//! Bidirectional mapping between logical addresses and ROM offsets.
//!
//! Dispatches on the cartridge's base bank layout; the returned offset
//! is reduced modulo the ROM size so undersized chips wrap the way the
//! address decoder wraps them. Failures are values, never panics.

use crate::error::AddressError;
use crate::rom::cartridge::Cartridge;
use crate::types::MappingFamily;

/// Translate a logical address to a ROM file offset.
pub fn rom_offset(addr: u32, cart: &Cartridge) -> Result<u32, AddressError> {
    let offset = family_offset(addr, cart.base_layout())?;
    if cart.rom_size == 0 {
        return Err(AddressError::Unmapped);
    }
    Ok(offset % cart.rom_size)
}

/// Translate a ROM file offset back to its canonical logical address.
///
/// Mirrors exist by design; the canonical choice is the lowest bank of
/// the primary window for LoROM-style layouts and the C0+ window for
/// HiROM-style layouts, so `rom_offset(logical_address(o)) == o`.
pub fn logical_address(offset: u32, family: MappingFamily) -> u32 {
    match family {
        MappingFamily::HiRom | MappingFamily::Spc7110 => {
            ((0xC0 + (offset >> 16)) << 16) | (offset & 0xFFFF)
        }
        MappingFamily::ExHiRom => {
            if offset < 0x40_0000 {
                ((0xC0 + (offset >> 16)) << 16) | (offset & 0xFFFF)
            } else {
                let rel = offset - 0x40_0000;
                ((0x40 + (rel >> 16)) << 16) | (rel & 0xFFFF)
            }
        }
        MappingFamily::ExLoRom => {
            if offset < 0x40_0000 {
                ((0x80 + (offset / 0x8000)) << 16) | 0x8000 | (offset % 0x8000)
            } else {
                let rel = offset - 0x40_0000;
                ((rel / 0x8000) << 16) | 0x8000 | (rel % 0x8000)
            }
        }
        // LoROM and every special chip on a LoROM-style map mode.
        _ => ((offset / 0x8000) << 16) | 0x8000 | (offset % 0x8000),
    }
}

fn family_offset(addr: u32, family: MappingFamily) -> Result<u32, AddressError> {
    let bank = (addr >> 16) & 0xFF;
    let off = addr & 0xFFFF;

    match family {
        MappingFamily::HiRom | MappingFamily::Spc7110 => hirom_offset(bank, off),
        MappingFamily::ExHiRom => exhirom_offset(bank, off),
        MappingFamily::ExLoRom => exlorom_offset(bank, off),
        _ => lorom_offset(bank, off),
    }
}

fn lorom_offset(bank: u32, off: u32) -> Result<u32, AddressError> {
    match (bank, off) {
        // Banks 7E/7F are WRAM; their mirrors FE/FF still reach ROM.
        (0x80..=0xFF, 0x8000..=0xFFFF) => Ok((bank - 0x80) * 0x8000 + (off - 0x8000)),
        (0x00..=0x7D, 0x8000..=0xFFFF) => Ok(bank * 0x8000 + (off - 0x8000)),
        (0x00, 0x0000..=0x7FFF) => Ok(off),
        _ => Err(AddressError::Unmapped),
    }
}

fn hirom_offset(bank: u32, off: u32) -> Result<u32, AddressError> {
    match (bank, off) {
        (0xC0..=0xFF, _) => Ok((bank - 0xC0) * 0x1_0000 + off),
        (0x40..=0x7D, _) => Ok((bank - 0x40) * 0x1_0000 + off),
        (0x80..=0xBF, 0x8000..=0xFFFF) => Ok((bank - 0x80) * 0x8000 + (off - 0x8000)),
        (0x00..=0x3F, 0x8000..=0xFFFF) => Ok(bank * 0x8000 + (off - 0x8000)),
        (0x00, 0x0000..=0x7FFF) => Ok(off),
        _ => Err(AddressError::Unmapped),
    }
}

fn exlorom_offset(bank: u32, off: u32) -> Result<u32, AddressError> {
    match (bank, off) {
        // Upper mirror half carries the first 4 MB.
        (0x80..=0xFF, 0x8000..=0xFFFF) => Ok((bank - 0x80) * 0x8000 + (off - 0x8000)),
        // The extended window sits above the basic size.
        (0x00..=0x7D, 0x8000..=0xFFFF) => Ok(0x40_0000 + bank * 0x8000 + (off - 0x8000)),
        (0x00, 0x0000..=0x7FFF) => Ok(off),
        _ => Err(AddressError::Unmapped),
    }
}

fn exhirom_offset(bank: u32, off: u32) -> Result<u32, AddressError> {
    match (bank, off) {
        (0xC0..=0xFF, _) => Ok((bank - 0xC0) * 0x1_0000 + off),
        // The extended window sits above the basic size.
        (0x40..=0x7D, _) => Ok(0x40_0000 + (bank - 0x40) * 0x1_0000 + off),
        (0x80..=0xBF, 0x8000..=0xFFFF) => Ok(0x40_0000 + (bank - 0x80) * 0x8000 + (off - 0x8000)),
        (0x00..=0x3F, 0x8000..=0xFFFF) => Ok(0x40_0000 + bank * 0x8000 + (off - 0x8000)),
        (0x00, 0x0000..=0x7FFF) => Ok(off),
        _ => Err(AddressError::Unmapped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::header::tests::lorom_image;
    use crate::rom::header::Header;
    use pretty_assertions::assert_eq;

    fn cart(family_mode: u8, rom_kb_code: u8) -> Cartridge {
        let mut header = Header::parse(&lorom_image(), 0x7FC0).unwrap();
        header.map_mode = family_mode;
        header.rom_size_code = rom_kb_code;
        let scorer = if family_mode & 1 != 0 {
            MappingFamily::HiRom
        } else {
            MappingFamily::LoRom
        };
        Cartridge::from_header(&header, scorer)
    }

    #[test]
    fn test_lorom_mapping() {
        let cart = cart(0x20, 0x0A); // 1 MB LoROM
        assert_eq!(rom_offset(0x008000, &cart), Ok(0x000000));
        assert_eq!(rom_offset(0x00FFFF, &cart), Ok(0x007FFF));
        assert_eq!(rom_offset(0x018000, &cart), Ok(0x008000));
        assert_eq!(rom_offset(0x808000, &cart), Ok(0x000000));
        assert_eq!(rom_offset(0x000042, &cart), Ok(0x000042));
        assert_eq!(rom_offset(0x7E0000, &cart), Err(AddressError::Unmapped));
        assert_eq!(rom_offset(0x010000, &cart), Err(AddressError::Unmapped));
    }

    #[test]
    fn test_hirom_mapping() {
        let cart = cart(0x21, 0x0B); // 2 MB HiROM
        assert_eq!(rom_offset(0xC08000, &cart), Ok(0x008000));
        assert_eq!(rom_offset(0x408000, &cart), Ok(0x008000));
        assert_eq!(rom_offset(0x000000, &cart), Ok(0x000000));
        assert_eq!(rom_offset(0x7E0000, &cart), Err(AddressError::Unmapped));
    }

    #[test]
    fn test_bank_wrap() {
        let cart = cart(0x21, 0x0B); // 2 MB HiROM
        // Bank FF reaches past the chip; the decoder wraps.
        assert_eq!(rom_offset(0xFF0000, &cart), Ok(0x1F0000));
        let lo = cart_lo_512();
        assert_eq!(rom_offset(0x208000, &lo), Ok(0x000000));
    }

    fn cart_lo_512() -> Cartridge {
        cart(0x20, 0x09) // 512 KB LoROM
    }

    #[test]
    fn test_lorom_round_trip() {
        let cart = cart(0x20, 0x0A);
        for offset in (0..cart.rom_size).step_by(0x1357) {
            let logical = logical_address(offset, MappingFamily::LoRom);
            assert_eq!(rom_offset(logical, &cart), Ok(offset));
        }
    }

    #[test]
    fn test_hirom_round_trip() {
        let cart = cart(0x21, 0x0B);
        for offset in (0..cart.rom_size).step_by(0x1357) {
            let logical = logical_address(offset, MappingFamily::HiRom);
            assert_eq!(rom_offset(logical, &cart), Ok(offset));
        }
    }

    #[test]
    fn test_exhirom_extended_window() {
        let cart = cart(0x25, 0x0D); // 8 MB ExHiROM (wraps at 8 MB)
        assert_eq!(rom_offset(0xC00000, &cart), Ok(0x000000));
        assert_eq!(rom_offset(0x400000, &cart), Ok(0x400000));
        // Banks 00-3F upper halves mirror the extended window.
        assert_eq!(rom_offset(0x008000, &cart), Ok(0x400000));
    }

    #[test]
    fn test_exlorom_extended_window() {
        let cart = cart(0x22, 0x0D);
        assert_eq!(rom_offset(0x808000, &cart), Ok(0x000000));
        assert_eq!(rom_offset(0x008000, &cart), Ok(0x400000));
    }

    #[test]
    fn test_logical_canonical_forms() {
        assert_eq!(logical_address(0x000000, MappingFamily::LoRom), 0x008000);
        assert_eq!(logical_address(0x008000, MappingFamily::LoRom), 0x018000);
        assert_eq!(logical_address(0x008000, MappingFamily::HiRom), 0xC08000);
        assert_eq!(logical_address(0x400000, MappingFamily::ExHiRom), 0x400000);
    }
}
