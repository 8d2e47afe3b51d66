//! SNES disassembler CLI
//!
//! Command-line front-end for the analysis core: loads a ROM, runs the
//! pipeline, and renders the result as text or JSON, optionally
//! writing a symbol file.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use snes_disasm::{
    analyze_file_with_options, formatter, Analysis, AnalyzerOptions, Deadline, FlagState,
    HumanFormatter, JsonFormatter, LogLevel,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Static disassembler and analyzer for SNES ROM images.
///
/// Recovers the cartridge header, decodes the 65816 instruction
/// stream, and reports blocks, functions, data structures,
/// cross-references and symbols.
#[derive(Parser, Debug)]
#[command(name = "snes-disasm")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ROM file to analyze
    rom: PathBuf,

    /// Start address (hex, e.g. 8000 or 0x008000); default: RESET vector
    #[arg(short, long, value_parser = parse_hex)]
    start: Option<u32>,

    /// End address (hex, exclusive); default: end of the ROM window
    #[arg(short, long, value_parser = parse_hex)]
    end: Option<u32>,

    /// Output format
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Write the symbol table to this path (.sym/.mlb/.json/.csv)
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Analysis mode
    #[arg(short, long, default_value = "normal")]
    mode: AnalysisMode,

    /// Skip the validation pass
    #[arg(long)]
    no_validate: bool,

    /// Append validator-proposed comments to the listing
    #[arg(long)]
    enhance_comments: bool,

    /// Assume native mode with 16-bit A and X/Y at the start address
    #[arg(long)]
    native: bool,

    /// Abort the analysis after this many seconds, keeping a partial result
    #[arg(long)]
    timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress the listing; print the summary only)
    #[arg(short, long)]
    quiet: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable listing
    Human,
    /// JSON payload
    Json,
}

/// Analysis mode options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum AnalysisMode {
    /// Normal analysis (default)
    Normal,
    /// Fast analysis (no validation, tighter caps)
    Fast,
    /// Thorough analysis (validation and comment enhancement)
    Thorough,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches('$');
    u32::from_str_radix(trimmed, 16).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut options = match args.mode {
        AnalysisMode::Normal => AnalyzerOptions::new(),
        AnalysisMode::Fast => AnalyzerOptions::fast(),
        AnalysisMode::Thorough => AnalyzerOptions::thorough(),
    };
    options.start_address = args.start;
    options.end_address = args.end;
    if args.no_validate {
        options.enable_validation = false;
    }
    if args.enhance_comments {
        options.enhance_comments = true;
    }
    if args.native {
        options.initial_flags = FlagState::native_16bit();
    }
    if let Some(seconds) = args.timeout {
        options.deadline = Deadline::after(Duration::from_secs(seconds));
    }
    options.log_level = if args.verbose {
        LogLevel::Debug
    } else if args.quiet {
        LogLevel::Error
    } else {
        LogLevel::Warn
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("snes_disasm={}", options.log_level.filter_directive()))
        .with_writer(std::io::stderr)
        .init();

    match run(&args, &options) {
        Ok(incomplete) => {
            if incomplete {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, options: &AnalyzerOptions) -> anyhow::Result<bool> {
    let analysis = analyze_file_with_options(&args.rom, options)
        .with_context(|| format!("analyzing {}", args.rom.display()))?;

    match args.format {
        OutputFormat::Human => print_human(&analysis, args),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&analysis)?),
    }

    if let Some(path) = &args.symbols {
        formatter::write_symbols(&analysis.symbols, path)
            .with_context(|| format!("writing symbols to {}", path.display()))?;
        if !args.quiet {
            eprintln!("wrote {} symbols to {}", analysis.symbols.len(), path.display());
        }
    }

    Ok(analysis.incomplete)
}

fn print_human(analysis: &Analysis, args: &Args) {
    if args.quiet {
        println!(
            "{}: {} | {} functions, {} data structures{}",
            args.rom.display(),
            analysis.cartridge.family,
            analysis.functions.len(),
            analysis.data.len(),
            if analysis.incomplete { " (incomplete)" } else { "" },
        );
        return;
    }
    print!("{}", HumanFormatter::format(analysis));

    if let Some(validation) = &analysis.validation {
        println!();
        println!(
            "; validation: {:.1}% accuracy over {} lines, {} findings",
            validation.accuracy,
            validation.lines_checked,
            validation.discrepancies.len(),
        );
        for recommendation in &validation.recommendations {
            println!(";   hint: {recommendation}");
        }
    }
}
