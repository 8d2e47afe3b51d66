//! Synthetic symbol generation.
//!
//! Names are generated in a fixed priority order, one symbol per
//! address: hardware registers, functions, data structures, code
//! targets, RAM variables. Conflicts resolve by kind priority, then
//! confidence, then first writer. Every accepted name satisfies the
//! identifier rules of the emitter contract.

use crate::cpu::decoder::DecodedLine;
use crate::cpu::registers;
use crate::rom::cartridge::Cartridge;
use crate::rom::mapper;
use crate::types::{DataStructure, Function, Symbol, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names the emitter contract reserves.
const RESERVED_NAMES: [&str; 10] = [
    "a", "x", "y", "s", "pc", "db", "dw", "dl", "org", "base",
];

/// Address-keyed symbol table with the conflict policy baked in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    by_address: BTreeMap<u32, Symbol>,
}

impl SymbolTable {
    /// Insert a symbol, applying identifier validation and the
    /// (kind priority, confidence, first-writer) conflict policy.
    ///
    /// Returns whether the symbol was accepted.
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        if !valid_identifier(&symbol.name) {
            tracing::warn!(
                address = format_args!("${:06X}", symbol.address),
                name = %symbol.name,
                "rejecting invalid symbol name"
            );
            return false;
        }
        match self.by_address.get(&symbol.address) {
            None => {
                self.by_address.insert(symbol.address, symbol);
                true
            }
            Some(existing) => {
                let new_key = (symbol.kind.priority(), symbol.confidence);
                let old_key = (existing.kind.priority(), existing.confidence);
                if new_key.0 > old_key.0 || (new_key.0 == old_key.0 && new_key.1 > old_key.1) {
                    self.by_address.insert(symbol.address, symbol);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Symbol at `address`, when one exists.
    pub fn get(&self, address: u32) -> Option<&Symbol> {
        self.by_address.get(&address)
    }

    /// Iterate symbols in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.by_address.values()
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, not reserved.
pub fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

/// Generate the symbol table from the analysis products.
pub fn generate(
    lines: &[DecodedLine],
    functions: &BTreeMap<u32, Function>,
    data: &BTreeMap<u32, DataStructure>,
    cart: &Cartridge,
) -> SymbolTable {
    let mut table = SymbolTable::default();

    // 1. Hardware registers observed in operands.
    for line in lines {
        let Some(addr) = line.operand.and_then(|op| op.address()) else {
            continue;
        };
        if let Some(info) = registers::lookup(addr) {
            table.insert(Symbol {
                address: addr,
                name: info.name,
                kind: SymbolKind::Constant,
                size: None,
                references: vec![line.address],
                confidence: 1.0,
                description: Some(info.description.to_string()),
            });
        }
    }

    // 2. Discovered functions.
    for function in functions.values() {
        let prefix = if function.is_interrupt {
            "interrupt"
        } else {
            "function"
        };
        table.insert(Symbol {
            address: function.start,
            name: format!("{prefix}_{:06x}", function.start),
            kind: SymbolKind::Function,
            size: None,
            references: function.callers.iter().copied().collect(),
            confidence: function.confidence,
            description: None,
        });
    }

    // 3. Classified data structures.
    for structure in data.values() {
        table.insert(Symbol {
            address: structure.address,
            name: format!("{}_{:06x}", structure.kind.tag(), structure.address),
            kind: SymbolKind::Data,
            size: (structure.size > 0).then_some(structure.size),
            references: Vec::new(),
            confidence: 0.8,
            description: structure.format_hint.clone(),
        });
    }

    // 4. Code targets in the ROM range.
    for line in lines {
        let Some(mnemonic) = line.mnemonic else {
            continue;
        };
        if line.mode.is_some_and(|m| m.is_indirect()) {
            continue;
        }
        let Some(target) = line.operand.and_then(|op| op.address()) else {
            continue;
        };
        if mapper::rom_offset(target, cart).is_err() {
            continue;
        }
        if mnemonic.is_call() {
            table.insert(Symbol {
                address: target,
                name: format!("sub_{target:06x}"),
                kind: SymbolKind::Code,
                size: None,
                references: vec![line.address],
                confidence: 0.9,
                description: None,
            });
        } else if mnemonic.is_conditional_branch() || mnemonic.is_unconditional_jump() {
            table.insert(Symbol {
                address: target,
                name: format!("loc_{target:06x}"),
                kind: SymbolKind::Code,
                size: None,
                references: vec![line.address],
                confidence: 0.7,
                description: None,
            });
        }
    }

    // 5. RAM-window operands.
    for line in lines {
        let Some(addr) = line.operand.and_then(|op| op.address()) else {
            continue;
        };
        if in_ram_window(addr) {
            table.insert(Symbol {
                address: addr,
                name: format!("ram_{addr:06x}"),
                kind: SymbolKind::Variable,
                size: None,
                references: vec![line.address],
                confidence: 0.6,
                description: None,
            });
        }
    }

    table
}

/// WRAM proper or its low mirror in the system banks.
fn in_ram_window(addr: u32) -> bool {
    if (0x7E_0000..0x80_0000).contains(&addr) {
        return true;
    }
    let bank = (addr >> 16) & 0xFF;
    (bank <= 0x3F || (0x80..=0xBF).contains(&bank)) && (addr & 0xFFFF) < 0x2000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::blocks::tests::decode_code;
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
    fn test_identifier_rules() {
        assert!(valid_identifier("function_008000"));
        assert!(valid_identifier("_tmp0"));
        assert!(!valid_identifier(""));
        assert!(!valid_identifier("0label"));
        assert!(!valid_identifier("bad-name"));
        assert!(!valid_identifier("PC"));
        assert!(!valid_identifier("db"));
    }

    #[test]
    fn test_invalid_name_rejected_previous_stands() {
        let mut table = SymbolTable::default();
        let good = Symbol {
            address: 0x8000,
            name: "entry".into(),
            kind: SymbolKind::Code,
            size: None,
            references: Vec::new(),
            confidence: 0.5,
            description: None,
        };
        assert!(table.insert(good));
        let bad = Symbol {
            address: 0x8000,
            name: "1bad".into(),
            kind: SymbolKind::Function,
            size: None,
            references: Vec::new(),
            confidence: 1.0,
            description: None,
        };
        assert!(!table.insert(bad));
        assert_eq!(table.get(0x8000).unwrap().name, "entry");
    }

    #[test]
    fn test_conflict_resolution_by_priority_then_confidence() {
        let mut table = SymbolTable::default();
        let code = Symbol {
            address: 0x8000,
            name: "loc_008000".into(),
            kind: SymbolKind::Code,
            size: None,
            references: Vec::new(),
            confidence: 0.7,
            description: None,
        };
        let function = Symbol {
            address: 0x8000,
            name: "function_008000".into(),
            kind: SymbolKind::Function,
            size: None,
            references: Vec::new(),
            confidence: 0.6,
            description: None,
        };
        table.insert(code);
        // Lower confidence, higher kind priority: function wins.
        assert!(table.insert(function));
        assert_eq!(table.get(0x8000).unwrap().kind, SymbolKind::Function);

        // Same kind, lower confidence: first writer stands.
        let weaker = Symbol {
            address: 0x8000,
            name: "function_weak".into(),
            kind: SymbolKind::Function,
            size: None,
            references: Vec::new(),
            confidence: 0.3,
            description: None,
        };
        assert!(!table.insert(weaker));
        assert_eq!(table.get(0x8000).unwrap().name, "function_008000");
    }

    #[test]
    fn test_register_symbols_from_operands() {
        // LDA $2100 / RTS
        let code = [0xAD, 0x00, 0x21, 0x60];
        let lines = decode_code(&code);
        let table = generate(&lines, &BTreeMap::new(), &BTreeMap::new(), &test_cart());
        let symbol = table.get(0x2100).unwrap();
        assert_eq!(symbol.name, "INIDISP");
        assert_eq!(symbol.kind, SymbolKind::Constant);
        assert_eq!(symbol.confidence, 1.0);
    }

    #[test]
    fn test_function_and_code_symbols() {
        // JSR $8004 / RTS / sub: RTS
        let code = [0x20, 0x04, 0x80, 0x60, 0x60];
        let lines = decode_code(&code);
        let mut functions = BTreeMap::new();
        functions.insert(0x00_8004, Function::new(0x00_8004, 0.9, false));
        let table = generate(&lines, &functions, &BTreeMap::new(), &test_cart());
        // FUNCTION outranks the CODE symbol from the call target.
        let symbol = table.get(0x00_8004).unwrap();
        assert_eq!(symbol.kind, SymbolKind::Function);
        assert_eq!(symbol.name, "function_008004");
    }

    #[test]
    fn test_interrupt_naming() {
        let mut functions = BTreeMap::new();
        functions.insert(0x00_8100, Function::new(0x00_8100, 1.0, true));
        let table = generate(&[], &functions, &BTreeMap::new(), &test_cart());
        assert_eq!(table.get(0x00_8100).unwrap().name, "interrupt_008100");
    }

    #[test]
    fn test_ram_variable_symbols() {
        // STA $7E2000 (long) / STA $0042
        let code = [0x8F, 0x00, 0x20, 0x7E, 0x8D, 0x42, 0x00, 0x60];
        let lines = decode_code(&code);
        let table = generate(&lines, &BTreeMap::new(), &BTreeMap::new(), &test_cart());
        assert_eq!(table.get(0x7E_2000).unwrap().name, "ram_7e2000");
        assert_eq!(table.get(0x42).unwrap().kind, SymbolKind::Variable);
    }

    #[test]
    fn test_symbol_uniqueness() {
        // One symbol per address, all names valid identifiers.
        let code = [0x20, 0x04, 0x80, 0x60, 0x60, 0x4C, 0x04, 0x80];
        let lines = decode_code(&code);
        let table = generate(&lines, &BTreeMap::new(), &BTreeMap::new(), &test_cart());
        let mut seen = std::collections::BTreeSet::new();
        for symbol in table.iter() {
            assert!(seen.insert(symbol.address));
            assert!(valid_identifier(&symbol.name));
        }
    }
}
