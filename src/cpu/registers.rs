//! Static hardware-register table.
//!
//! Canonical names and access patterns for the memory-mapped I/O the
//! console documents: the PPU band ($2100-$213F), APU ports
//! ($2140-$2143), WRAM ports ($2180-$2183), joypad serial ports, and
//! the CPU/DMA band ($4200-$43FF). Part of the compiled artifact; no
//! file I/O.

use serde::{Deserialize, Serialize};

/// Documented access direction of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterAccess {
    Read,
    Write,
    ReadWrite,
}

/// One fixed-address register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareRegister {
    /// Bus address in bank 0.
    pub address: u32,
    /// Canonical name.
    pub name: &'static str,
    /// Documented access direction.
    pub access: RegisterAccess,
    /// Short description.
    pub description: &'static str,
}

const fn reg(
    address: u32,
    name: &'static str,
    access: RegisterAccess,
    description: &'static str,
) -> HardwareRegister {
    HardwareRegister {
        address,
        name,
        access,
        description,
    }
}

use RegisterAccess::{Read, ReadWrite, Write};

/// Fixed-address registers, sorted by address.
#[rustfmt::skip]
pub static HARDWARE_REGISTERS: [HardwareRegister; 74] = [
    reg(0x2100, "INIDISP", Write, "Screen display and brightness"),
    reg(0x2101, "OBSEL", Write, "Object size and character base"),
    reg(0x2102, "OAMADDL", Write, "OAM address low"),
    reg(0x2103, "OAMADDH", Write, "OAM address high"),
    reg(0x2104, "OAMDATA", Write, "OAM data write"),
    reg(0x2105, "BGMODE", Write, "BG mode and character size"),
    reg(0x2106, "MOSAIC", Write, "Mosaic size and enable"),
    reg(0x2107, "BG1SC", Write, "BG1 screen base and size"),
    reg(0x2108, "BG2SC", Write, "BG2 screen base and size"),
    reg(0x2109, "BG3SC", Write, "BG3 screen base and size"),
    reg(0x210A, "BG4SC", Write, "BG4 screen base and size"),
    reg(0x210B, "BG12NBA", Write, "BG1/2 character data area"),
    reg(0x210C, "BG34NBA", Write, "BG3/4 character data area"),
    reg(0x210D, "BG1HOFS", Write, "BG1 horizontal scroll"),
    reg(0x210E, "BG1VOFS", Write, "BG1 vertical scroll"),
    reg(0x210F, "BG2HOFS", Write, "BG2 horizontal scroll"),
    reg(0x2110, "BG2VOFS", Write, "BG2 vertical scroll"),
    reg(0x2111, "BG3HOFS", Write, "BG3 horizontal scroll"),
    reg(0x2112, "BG3VOFS", Write, "BG3 vertical scroll"),
    reg(0x2113, "BG4HOFS", Write, "BG4 horizontal scroll"),
    reg(0x2114, "BG4VOFS", Write, "BG4 vertical scroll"),
    reg(0x2115, "VMAIN", Write, "VRAM address increment mode"),
    reg(0x2116, "VMADDL", Write, "VRAM address low"),
    reg(0x2117, "VMADDH", Write, "VRAM address high"),
    reg(0x2118, "VMDATAL", Write, "VRAM data write low"),
    reg(0x2119, "VMDATAH", Write, "VRAM data write high"),
    reg(0x211A, "M7SEL", Write, "Mode 7 settings"),
    reg(0x211B, "M7A", Write, "Mode 7 matrix A"),
    reg(0x211C, "M7B", Write, "Mode 7 matrix B"),
    reg(0x211D, "M7C", Write, "Mode 7 matrix C"),
    reg(0x211E, "M7D", Write, "Mode 7 matrix D"),
    reg(0x211F, "M7X", Write, "Mode 7 center X"),
    reg(0x2120, "M7Y", Write, "Mode 7 center Y"),
    reg(0x2121, "CGADD", Write, "CGRAM address"),
    reg(0x2122, "CGDATA", Write, "CGRAM data write"),
    reg(0x2123, "W12SEL", Write, "Window mask for BG1/BG2"),
    reg(0x2124, "W34SEL", Write, "Window mask for BG3/BG4"),
    reg(0x2125, "WOBJSEL", Write, "Window mask for OBJ/color math"),
    reg(0x2126, "WH0", Write, "Window 1 left position"),
    reg(0x2127, "WH1", Write, "Window 1 right position"),
    reg(0x2128, "WH2", Write, "Window 2 left position"),
    reg(0x2129, "WH3", Write, "Window 2 right position"),
    reg(0x212A, "WBGLOG", Write, "Window mask logic for BG"),
    reg(0x212B, "WOBJLOG", Write, "Window mask logic for OBJ"),
    reg(0x212C, "TM", Write, "Main screen designation"),
    reg(0x212D, "TS", Write, "Sub screen designation"),
    reg(0x212E, "TMW", Write, "Main screen window mask"),
    reg(0x212F, "TSW", Write, "Sub screen window mask"),
    reg(0x2130, "CGWSEL", Write, "Color math control A"),
    reg(0x2131, "CGADSUB", Write, "Color math control B"),
    reg(0x2132, "COLDATA", Write, "Fixed color data"),
    reg(0x2133, "SETINI", Write, "Display control 2"),
    reg(0x2134, "MPYL", Read, "Multiplication result low"),
    reg(0x2135, "MPYM", Read, "Multiplication result middle"),
    reg(0x2136, "MPYH", Read, "Multiplication result high"),
    reg(0x2137, "SLHV", Read, "Software latch for H/V counters"),
    reg(0x2138, "OAMDATAREAD", Read, "OAM data read"),
    reg(0x2139, "VMDATALREAD", Read, "VRAM data read low"),
    reg(0x213A, "VMDATAHREAD", Read, "VRAM data read high"),
    reg(0x213B, "CGDATAREAD", Read, "CGRAM data read"),
    reg(0x213C, "OPHCT", Read, "H counter latch"),
    reg(0x213D, "OPVCT", Read, "V counter latch"),
    reg(0x213E, "STAT77", Read, "PPU1 status and version"),
    reg(0x213F, "STAT78", Read, "PPU2 status and version"),
    reg(0x2140, "APUIO0", ReadWrite, "APU I/O port 0"),
    reg(0x2141, "APUIO1", ReadWrite, "APU I/O port 1"),
    reg(0x2142, "APUIO2", ReadWrite, "APU I/O port 2"),
    reg(0x2143, "APUIO3", ReadWrite, "APU I/O port 3"),
    reg(0x2180, "WMDATA", ReadWrite, "WRAM data port"),
    reg(0x2181, "WMADDL", Write, "WRAM address low"),
    reg(0x2182, "WMADDM", Write, "WRAM address middle"),
    reg(0x2183, "WMADDH", Write, "WRAM address high"),
    reg(0x4016, "JOYSER0", ReadWrite, "Joypad serial port 0"),
    reg(0x4017, "JOYSER1", Read, "Joypad serial port 1"),
];

/// CPU control/status band, sorted by address.
#[rustfmt::skip]
pub static CPU_REGISTERS: [HardwareRegister; 30] = [
    reg(0x4200, "NMITIMEN", Write, "Interrupt enable and joypad request"),
    reg(0x4201, "WRIO", Write, "Programmable I/O port out"),
    reg(0x4202, "WRMPYA", Write, "Multiplicand"),
    reg(0x4203, "WRMPYB", Write, "Multiplier and start"),
    reg(0x4204, "WRDIVL", Write, "Dividend low"),
    reg(0x4205, "WRDIVH", Write, "Dividend high"),
    reg(0x4206, "WRDIVB", Write, "Divisor and start"),
    reg(0x4207, "HTIMEL", Write, "IRQ timer horizontal low"),
    reg(0x4208, "HTIMEH", Write, "IRQ timer horizontal high"),
    reg(0x4209, "VTIMEL", Write, "IRQ timer vertical low"),
    reg(0x420A, "VTIMEH", Write, "IRQ timer vertical high"),
    reg(0x420B, "MDMAEN", Write, "General DMA enable"),
    reg(0x420C, "HDMAEN", Write, "HDMA enable"),
    reg(0x420D, "MEMSEL", Write, "ROM access speed select"),
    reg(0x4210, "RDNMI", Read, "NMI flag and CPU version"),
    reg(0x4211, "TIMEUP", Read, "IRQ flag"),
    reg(0x4212, "HVBJOY", Read, "Blanking and joypad status"),
    reg(0x4213, "RDIO", Read, "Programmable I/O port in"),
    reg(0x4214, "RDDIVL", Read, "Quotient low"),
    reg(0x4215, "RDDIVH", Read, "Quotient high"),
    reg(0x4216, "RDMPYL", Read, "Product/remainder low"),
    reg(0x4217, "RDMPYH", Read, "Product/remainder high"),
    reg(0x4218, "JOY1L", Read, "Joypad 1 data low"),
    reg(0x4219, "JOY1H", Read, "Joypad 1 data high"),
    reg(0x421A, "JOY2L", Read, "Joypad 2 data low"),
    reg(0x421B, "JOY2H", Read, "Joypad 2 data high"),
    reg(0x421C, "JOY3L", Read, "Joypad 3 data low"),
    reg(0x421D, "JOY3H", Read, "Joypad 3 data high"),
    reg(0x421E, "JOY4L", Read, "Joypad 4 data low"),
    reg(0x421F, "JOY4H", Read, "Joypad 4 data high"),
];

/// Per-channel DMA register name templates at offsets $0-$A within a
/// channel; `*` is the channel digit.
const DMA_CHANNEL_REGS: [(&str, &str); 11] = [
    ("DMAP*", "DMA control"),
    ("BBAD*", "DMA B-bus address"),
    ("A1T*L", "DMA A-bus address low"),
    ("A1T*H", "DMA A-bus address high"),
    ("A1B*", "DMA A-bus bank"),
    ("DAS*L", "DMA byte count low"),
    ("DAS*H", "DMA byte count high"),
    ("DASB*", "HDMA indirect bank"),
    ("A2A*L", "HDMA table address low"),
    ("A2A*H", "HDMA table address high"),
    ("NTRL*", "HDMA line counter"),
];

/// A resolved register lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    /// Canonical name, e.g. `VMDATAL` or `DMAP3`.
    pub name: String,
    /// Documented access direction.
    pub access: RegisterAccess,
    /// Short description.
    pub description: &'static str,
}

/// Look up a bus address in the register tables.
///
/// Accepts the bare 16-bit form and any bank-00-3F/80-BF alias of it.
pub fn lookup(address: u32) -> Option<RegisterInfo> {
    let bank = (address >> 16) & 0xFF;
    if !(bank <= 0x3F || (0x80..=0xBF).contains(&bank)) {
        return None;
    }
    let addr = address & 0xFFFF;

    if let Ok(idx) = HARDWARE_REGISTERS.binary_search_by_key(&addr, |r| r.address) {
        let r = &HARDWARE_REGISTERS[idx];
        return Some(RegisterInfo {
            name: r.name.to_string(),
            access: r.access,
            description: r.description,
        });
    }
    if let Ok(idx) = CPU_REGISTERS.binary_search_by_key(&addr, |r| r.address) {
        let r = &CPU_REGISTERS[idx];
        return Some(RegisterInfo {
            name: r.name.to_string(),
            access: r.access,
            description: r.description,
        });
    }

    // DMA band: $43x0-$43xA for channels x = 0-7.
    if (0x4300..0x4380).contains(&addr) {
        let channel = (addr >> 4) & 0x7;
        let slot = (addr & 0xF) as usize;
        if let Some((template, description)) = DMA_CHANNEL_REGS.get(slot) {
            let name = template.replace('*', &channel.to_string());
            return Some(RegisterInfo {
                name,
                access: RegisterAccess::ReadWrite,
                description,
            });
        }
    }

    None
}

/// Convenience: just the canonical name, when the address is a register.
pub fn register_name(address: u32) -> Option<String> {
    lookup(address).map(|info| info.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tables_are_sorted() {
        assert!(HARDWARE_REGISTERS.windows(2).all(|w| w[0].address < w[1].address));
        assert!(CPU_REGISTERS.windows(2).all(|w| w[0].address < w[1].address));
    }

    #[test]
    fn test_ppu_lookup() {
        let info = lookup(0x2118).unwrap();
        assert_eq!(info.name, "VMDATAL");
        assert_eq!(info.access, RegisterAccess::Write);
    }

    #[test]
    fn test_bank_alias_lookup() {
        assert_eq!(register_name(0x002100).as_deref(), Some("INIDISP"));
        assert_eq!(register_name(0x3F2100).as_deref(), Some("INIDISP"));
        assert_eq!(register_name(0x802100).as_deref(), Some("INIDISP"));
        assert_eq!(register_name(0x7E2100), None);
    }

    #[test]
    fn test_dma_channel_names() {
        assert_eq!(register_name(0x4300).as_deref(), Some("DMAP0"));
        assert_eq!(register_name(0x4301).as_deref(), Some("BBAD0"));
        assert_eq!(register_name(0x4372).as_deref(), Some("A1T7L"));
        assert_eq!(register_name(0x430A).as_deref(), Some("NTRL0"));
        assert_eq!(register_name(0x4345).as_deref(), Some("DAS4L"));
        assert_eq!(register_name(0x430F), None);
        assert_eq!(register_name(0x4380), None);
    }

    #[test]
    fn test_apu_ports() {
        for (addr, name) in [(0x2140, "APUIO0"), (0x2143, "APUIO3")] {
            let info = lookup(addr).unwrap();
            assert_eq!(info.name, name);
            assert_eq!(info.access, RegisterAccess::ReadWrite);
        }
    }

    #[test]
    fn test_non_register_addresses() {
        assert_eq!(register_name(0x2184), None);
        assert_eq!(register_name(0x0000), None);
        assert_eq!(register_name(0x8000), None);
    }
}
