//! Output formatting.
//!
//! Two layers: renderers for the analysis payload (human-readable
//! text, JSON), and the four symbol-table emitters (`.sym`, `.mlb`,
//! `.json`, `.csv`). Every emitter writes one record per symbol with
//! the fields {address, name, kind, size?, description?}, and each has
//! a matching importer that preserves those fields exactly.

use crate::analysis::{Analysis, SymbolTable};
use crate::error::{DisasmError, Result};
use crate::types::{Symbol, SymbolKind};
use std::path::Path;

/// Human-readable renderer for the analysis payload.
pub struct HumanFormatter;

impl HumanFormatter {
    /// Render the header summary and the listing.
    pub fn format(analysis: &Analysis) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "; {} | {} | {} KB ROM, {} KB SRAM | score {} at 0x{:06X}\n",
            analysis.header.title,
            analysis.cartridge.family,
            analysis.cartridge.rom_size / 1024,
            analysis.cartridge.sram_size / 1024,
            analysis.header_score,
            analysis.header_offset,
        ));
        out.push_str(&format!(
            "; {} lines, {} blocks, {} functions, {} data structures, {} xrefs\n",
            analysis.lines.len(),
            analysis.blocks.len(),
            analysis.functions.len(),
            analysis.data.len(),
            analysis.xrefs.len(),
        ));
        if analysis.incomplete {
            out.push_str("; WARNING: analysis incomplete (deadline expired)\n");
        }
        out.push('\n');

        for line in &analysis.lines {
            if let Some(label) = &line.label {
                out.push_str(&format!("{label}:\n"));
            }
            let bytes: Vec<String> = line.bytes.iter().map(|b| format!("{b:02X}")).collect();
            let mut text = format!(
                "  {:06X}  {:<12} {}",
                line.address,
                bytes.join(" "),
                line.render()
            );
            if let Some(comment) = &line.comment {
                text = format!("{text:<48} ; {comment}");
            }
            out.push_str(&text);
            out.push('\n');
        }

        out
    }
}

/// JSON renderer for the analysis payload.
pub struct JsonFormatter;

impl JsonFormatter {
    /// Render the whole payload as pretty JSON.
    pub fn format(analysis: &Analysis) -> Result<String> {
        serde_json::to_string_pretty(analysis)
            .map_err(|err| DisasmError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))
    }
}

/// Symbol-file dialects, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFormat {
    Sym,
    Mlb,
    Json,
    Csv,
}

impl SymbolFormat {
    /// Pick the dialect from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "sym" => Some(SymbolFormat::Sym),
            "mlb" => Some(SymbolFormat::Mlb),
            "json" => Some(SymbolFormat::Json),
            "csv" => Some(SymbolFormat::Csv),
            _ => None,
        }
    }
}

/// Serialize the symbol table in the given dialect.
pub fn export_symbols(table: &SymbolTable, format: SymbolFormat) -> String {
    match format {
        SymbolFormat::Sym => {
            let mut out = String::from("; generated symbol table\n");
            for s in table.iter() {
                out.push_str(&format!(
                    "{:06x} {} {} {} {}\n",
                    s.address,
                    s.name,
                    s.kind,
                    s.size.map_or("-".to_string(), |v| v.to_string()),
                    s.description.as_deref().unwrap_or("-"),
                ));
            }
            out
        }
        SymbolFormat::Mlb => {
            let mut out = String::new();
            for s in table.iter() {
                out.push_str(&format!(
                    "SNES:{:06x}:{}:{}:{}:{}\n",
                    s.address,
                    s.name,
                    s.kind,
                    s.size.map_or("-".to_string(), |v| v.to_string()),
                    s.description.as_deref().unwrap_or("-").replace(':', ";"),
                ));
            }
            out
        }
        SymbolFormat::Json => {
            let symbols: Vec<&Symbol> = table.iter().collect();
            serde_json::to_string_pretty(&symbols).unwrap_or_else(|_| "[]".to_string())
        }
        SymbolFormat::Csv => {
            let mut out = String::from("address,name,kind,size,description\n");
            for s in table.iter() {
                out.push_str(&format!(
                    "{:06x},{},{},{},{}\n",
                    s.address,
                    s.name,
                    s.kind,
                    s.size.map_or(String::new(), |v| v.to_string()),
                    s.description.as_deref().unwrap_or("").replace(',', ";"),
                ));
            }
            out
        }
    }
}

/// Parse a symbol file previously produced by [`export_symbols`].
pub fn import_symbols(text: &str, format: SymbolFormat) -> Result<SymbolTable> {
    let mut table = SymbolTable::default();
    match format {
        SymbolFormat::Sym => {
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with(';') {
                    continue;
                }
                let mut parts = line.splitn(5, ' ');
                let (Some(addr), Some(name), Some(kind)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    continue;
                };
                let size = parts.next();
                let description = parts.next();
                push_record(&mut table, addr, name, kind, size, description)?;
            }
        }
        SymbolFormat::Mlb => {
            for line in text.lines() {
                let mut parts = line.trim().splitn(6, ':');
                if parts.next() != Some("SNES") {
                    continue;
                }
                let (Some(addr), Some(name), Some(kind)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    continue;
                };
                let size = parts.next();
                let description = parts.next();
                push_record(&mut table, addr, name, kind, size, description)?;
            }
        }
        SymbolFormat::Json => {
            let symbols: Vec<Symbol> = serde_json::from_str(text).map_err(|err| {
                DisasmError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
            })?;
            for symbol in symbols {
                table.insert(symbol);
            }
        }
        SymbolFormat::Csv => {
            for line in text.lines().skip(1) {
                let mut parts = line.trim().splitn(5, ',');
                let (Some(addr), Some(name), Some(kind)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    continue;
                };
                let size = parts.next().filter(|s| !s.is_empty());
                let description = parts.next().filter(|s| !s.is_empty());
                push_record(&mut table, addr, name, kind, size, description)?;
            }
        }
    }
    Ok(table)
}

fn push_record(
    table: &mut SymbolTable,
    addr: &str,
    name: &str,
    kind: &str,
    size: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let address = u32::from_str_radix(addr, 16).map_err(|_| DisasmError::InvalidSymbolName {
        address: 0,
        name: name.to_string(),
    })?;
    let kind = parse_kind(kind);
    let size = size.and_then(|s| s.parse::<u32>().ok());
    let description = description
        .filter(|d| !d.is_empty() && *d != "-")
        .map(str::to_string);
    table.insert(Symbol {
        address,
        name: name.to_string(),
        kind,
        size,
        references: Vec::new(),
        confidence: 1.0,
        description,
    });
    Ok(())
}

fn parse_kind(kind: &str) -> SymbolKind {
    match kind {
        "CODE" => SymbolKind::Code,
        "FUNCTION" => SymbolKind::Function,
        "VARIABLE" => SymbolKind::Variable,
        "CONSTANT" => SymbolKind::Constant,
        "VECTOR" => SymbolKind::Vector,
        "REGISTER" => SymbolKind::Register,
        _ => SymbolKind::Data,
    }
}

/// Write the symbol table to `path`, picking the dialect by extension.
pub fn write_symbols<P: AsRef<Path>>(table: &SymbolTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = SymbolFormat::from_path(path).unwrap_or(SymbolFormat::Sym);
    std::fs::write(path, export_symbols(table, format))?;
    Ok(())
}
