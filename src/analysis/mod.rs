//! The analysis pipeline.
//!
//! Phases run to completion in a fixed order within one call: listing,
//! block splitting, CFG construction, function discovery, data
//! classification, cross-references, symbols, validation. The caller
//! may cancel between phases through a [`Deadline`]; an expired
//! deadline yields a partial result marked incomplete, and partial
//! results never enter the cache.

pub mod blocks;
pub mod cfg;
pub mod data;
pub mod functions;
pub mod listing;
pub mod symbols;
pub mod validator;
pub mod xref;

pub use listing::Sweep;
pub use symbols::SymbolTable;
pub use validator::ValidationReport;
pub use xref::XrefIndex;

use crate::cache::{CacheKey, Phase, ResultCache};
use crate::cpu::decoder::DecodedLine;
use crate::cpu::flags::FlagState;
use crate::rom::cartridge::Cartridge;
use crate::rom::header::Header;
use crate::rom::loader::{LoadFlags, LoadedRom};
use crate::rom::mapper;
use crate::types::{BasicBlock, DataStructure, Function, VectorTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Abstract deadline handle for cooperative cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub enum Deadline {
    /// Never expires.
    #[default]
    Never,
    /// Expires at the given instant.
    At(Instant),
    /// Already expired; useful for dry runs and tests.
    Expired,
}

impl Deadline {
    /// A deadline that never passes.
    pub fn none() -> Self {
        Deadline::Never
    }

    /// A deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Deadline::At(Instant::now() + duration)
    }

    /// A deadline that has already passed.
    pub fn already_expired() -> Self {
        Deadline::Expired
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        match self {
            Deadline::Never => false,
            Deadline::At(instant) => Instant::now() >= *instant,
            Deadline::Expired => true,
        }
    }
}

/// Library log verbosity, consumed by the CLI when it builds its
/// subscriber filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The `tracing_subscriber` filter directive for this level.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Explicit configuration record for one analysis.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// First address to decode; defaults to the RESET handler.
    pub start_address: Option<u32>,
    /// Exclusive end address; defaults to the end of the ROM window.
    pub end_address: Option<u32>,
    /// Initial flag state; defaults to power-on state.
    pub initial_flags: FlagState,
    /// Run the validator.
    pub enable_validation: bool,
    /// Append validator-proposed comments to lines.
    pub enhance_comments: bool,
    /// Caller-supplied labels, applied over generated symbols.
    pub user_labels: BTreeMap<u32, String>,
    /// Caller-supplied comments, applied before enhancements.
    pub user_comments: BTreeMap<u32, String>,
    /// Shared result cache, when memoization is wanted.
    pub cache: Option<Arc<ResultCache>>,
    /// Cooperative cancellation handle.
    pub deadline: Deadline,
    /// Header-score threshold below which the loader flags ambiguity.
    pub min_header_score: u32,
    /// Instruction cap for sweeps.
    pub instruction_cap: usize,
    /// Library log verbosity.
    pub log_level: LogLevel,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerOptions {
    /// Default options.
    pub fn new() -> Self {
        Self {
            start_address: None,
            end_address: None,
            initial_flags: FlagState::default(),
            enable_validation: true,
            enhance_comments: false,
            user_labels: BTreeMap::new(),
            user_comments: BTreeMap::new(),
            cache: None,
            deadline: Deadline::none(),
            min_header_score: 40,
            instruction_cap: 1 << 22,
            log_level: LogLevel::default(),
        }
    }

    /// Thorough analysis: validation and comment enhancement on.
    pub fn thorough() -> Self {
        Self {
            enhance_comments: true,
            ..Self::new()
        }
    }

    /// Fast analysis: no validation, tighter instruction cap.
    pub fn fast() -> Self {
        Self {
            enable_validation: false,
            instruction_cap: 1 << 18,
            ..Self::new()
        }
    }
}

/// Complete analysis payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Cartridge model.
    pub cartridge: Cartridge,
    /// Parsed internal header.
    pub header: Header,
    /// Winning header offset within the canonical image.
    pub header_offset: usize,
    /// Winning header score.
    pub header_score: u32,
    /// Loader anomaly flags.
    pub load_flags: LoadFlags,
    /// Checksum computed over the canonical image.
    pub computed_checksum: u16,
    /// Decoded listing, ordered by address.
    pub lines: Vec<DecodedLine>,
    /// Basic-block arena; `BlockId` indexes into this vector.
    pub blocks: Vec<BasicBlock>,
    /// Discovered functions by entry address.
    pub functions: BTreeMap<u32, Function>,
    /// Classified data structures by address.
    pub data: BTreeMap<u32, DataStructure>,
    /// Cross-reference index.
    pub xrefs: XrefIndex,
    /// Generated symbol table.
    pub symbols: SymbolTable,
    /// Validation report, when validation ran.
    pub validation: Option<ValidationReport>,
    /// A deadline cut the analysis short.
    pub incomplete: bool,
}

impl Analysis {
    /// Vector tables from the header.
    pub fn vectors(&self) -> &VectorTable {
        &self.header.vectors
    }
}

/// Run the full pipeline over a loaded ROM.
pub fn analyze_rom(rom: &LoadedRom, options: &AnalyzerOptions) -> Analysis {
    let cartridge = Cartridge::from_header(&rom.scored.header, rom.scored.family);

    let cache_key = options.cache.as_ref().map(|cache| {
        let key = analysis_key(rom, options);
        (cache.clone(), key)
    });
    if let Some((cache, key)) = &cache_key {
        if let Some(cached) = cache.get::<Analysis>(key) {
            tracing::debug!("analysis served from cache");
            return cached;
        }
    }

    let start = options
        .start_address
        .unwrap_or_else(|| default_entry(&rom.scored.header, &cartridge));

    tracing::debug!(
        start = format_args!("${start:06X}"),
        family = %cartridge.family,
        "analysis starting"
    );

    // Phase: listing.
    let mut flags = options.initial_flags;
    let sweep = listing::linear_sweep(
        &rom.image,
        &cartridge,
        start,
        options.end_address,
        &mut flags,
        options.instruction_cap,
        &options.deadline,
    );
    let mut lines = sweep.lines;
    let mut incomplete = sweep.incomplete;

    // Phase: blocks and CFG.
    let vectors = rom.scored.header.vectors;
    let vector_addrs: Vec<u32> = [&vectors.native, &vectors.emulation]
        .iter()
        .flat_map(|set| set.entries().map(|(_, handler)| u32::from(handler)))
        .filter(|&a| a != 0 && a != 0xFFFF)
        .collect();
    let mut blocks = blocks::split_blocks(&lines, &vector_addrs);
    cfg::build_cfg(&mut blocks, &lines);
    incomplete |= checkpoint(&options.deadline, "cfg");

    // Phase: function discovery.
    let functions = if incomplete {
        BTreeMap::new()
    } else {
        functions::discover(&lines, &blocks, &vectors)
    };
    incomplete |= checkpoint(&options.deadline, "functions");

    // Phase: data classification and cross-references.
    let data = if incomplete {
        BTreeMap::new()
    } else {
        data::classify(&data::DetectContext {
            lines: &lines,
            image: &rom.image,
            cart: &cartridge,
        })
    };
    let xrefs = xref::build_xrefs(&lines);
    incomplete |= checkpoint(&options.deadline, "data");

    // Phase: symbols.
    let symbols = symbols::generate(&lines, &functions, &data, &cartridge);

    // Labels and comments: user entries first, then generated names.
    for line in &mut lines {
        line.label = options
            .user_labels
            .get(&line.address)
            .cloned()
            .or_else(|| symbols.get(line.address).map(|s| s.name.clone()));
        if let Some(comment) = options.user_comments.get(&line.address) {
            line.comment = Some(comment.clone());
        }
    }

    // Phase: validation.
    let validation = if options.enable_validation && !incomplete {
        let report = validator::validate(&lines, options.enhance_comments);
        if options.enhance_comments {
            validator::apply_enhancements(&mut lines, &report.enhancements);
        }
        Some(report)
    } else {
        None
    };

    let analysis = Analysis {
        cartridge,
        header: rom.scored.header.clone(),
        header_offset: rom.scored.offset,
        header_score: rom.scored.score,
        load_flags: rom.flags,
        computed_checksum: rom.computed_checksum,
        lines,
        blocks,
        functions,
        data,
        xrefs,
        symbols,
        validation,
        incomplete,
    };

    // No partial state leaks into the cache.
    if let Some((cache, key)) = cache_key {
        if !analysis.incomplete {
            cache.put(key, &analysis);
        }
    }

    analysis
}

fn checkpoint(deadline: &Deadline, phase: &str) -> bool {
    let expired = deadline.expired();
    if expired {
        tracing::warn!(phase, "deadline expired; returning partial result");
    }
    expired
}

/// Cache key covering every analysis-relevant input.
fn analysis_key(rom: &LoadedRom, options: &AnalyzerOptions) -> CacheKey {
    let labels = serde_json::to_string(&options.user_labels).unwrap_or_default();
    let comments = serde_json::to_string(&options.user_comments).unwrap_or_default();
    let params = format!(
        "{:?}-{:?}-m{}x{}e{}-v{}-e{}-{labels}-{comments}",
        options.start_address,
        options.end_address,
        options.initial_flags.m,
        options.initial_flags.x,
        options.initial_flags.e,
        options.enable_validation,
        options.enhance_comments,
    );
    CacheKey::new(&crate::cache::rom_digest(&rom.image), Phase::Disassembly, &params)
}

/// Default entry point: the emulation-mode RESET handler, or the start
/// of the ROM window when the vector is dead.
fn default_entry(header: &Header, cart: &Cartridge) -> u32 {
    let reset = u32::from(header.vectors.emulation.reset);
    if reset >= 0x8000 && mapper::rom_offset(reset, cart).is_ok() {
        reset
    } else {
        mapper::logical_address(0, cart.base_layout())
    }
}
