//! Listing validation against the static reference table.
//!
//! The validator treats the decoded stream as untrusted input: every
//! line is re-checked against the instruction matrix, and register
//! operands are checked against their documented access direction.
//! Findings are values in the report; the validator never mutates
//! analyzed state. The enhancement pass only ever appends.

use crate::cpu::decoder::{DecodedLine, LineKind};
use crate::cpu::opcodes::{AddressingMode, OPCODE_TABLE};
use crate::cpu::registers::{self, RegisterAccess};
use serde::{Deserialize, Serialize};

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single disagreement between the listing and the reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Address of the offending line.
    pub address: u32,
    /// Severity of the finding.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

/// A proposed comment for a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    /// Address of the line to annotate.
    pub address: u32,
    /// Comment text to append.
    pub comment: String,
}

/// Aggregate validation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// All findings, in listing order.
    pub discrepancies: Vec<Discrepancy>,
    /// Proposed comments, in listing order.
    pub enhancements: Vec<Enhancement>,
    /// Share of lines that passed every check, as a percentage.
    pub accuracy: f64,
    /// Number of lines inspected.
    pub lines_checked: usize,
    /// Recommended improvements for the caller.
    pub recommendations: Vec<String>,
}

/// Validate the decoded stream.
///
/// `enhance` turns on the comment-proposal pass.
pub fn validate(lines: &[DecodedLine], enhance: bool) -> ValidationReport {
    let mut report = ValidationReport {
        lines_checked: lines.len(),
        ..Default::default()
    };
    let mut clean = 0usize;
    let mut data_lines = 0usize;

    for line in lines {
        let mut line_clean = true;

        match line.kind {
            LineKind::Data => {
                data_lines += 1;
                report.discrepancies.push(Discrepancy {
                    address: line.address,
                    severity: Severity::Info,
                    message: format!("byte ${:02X} not decoded as an instruction", line.opcode),
                });
                line_clean = false;
            }
            LineKind::Instruction => {
                let reference = &OPCODE_TABLE[line.opcode as usize];

                if line.mnemonic != Some(reference.mnemonic) {
                    report.discrepancies.push(Discrepancy {
                        address: line.address,
                        severity: Severity::Error,
                        message: format!(
                            "mnemonic {:?} disagrees with reference {} for opcode ${:02X}",
                            line.mnemonic, reference.mnemonic, line.opcode
                        ),
                    });
                    line_clean = false;
                }

                if !byte_count_plausible(line, reference.mode) {
                    report.discrepancies.push(Discrepancy {
                        address: line.address,
                        severity: Severity::Error,
                        message: format!(
                            "length {} impossible for opcode ${:02X}",
                            line.bytes.len(),
                            line.opcode
                        ),
                    });
                    line_clean = false;
                }

                if let Some(finding) = check_register_access(line) {
                    report.discrepancies.push(finding);
                    line_clean = false;
                }

                if enhance {
                    if let Some(enhancement) = propose_comment(line) {
                        report.enhancements.push(enhancement);
                    }
                }
            }
        }

        if line_clean {
            clean += 1;
        }
    }

    report.accuracy = if lines.is_empty() {
        100.0
    } else {
        clean as f64 / lines.len() as f64 * 100.0
    };

    if data_lines * 10 > lines.len() {
        report.recommendations.push(
            "over 10% of lines decoded as data; consider refining the code/data boundaries"
                .to_string(),
        );
    }
    if report
        .discrepancies
        .iter()
        .any(|d| d.severity == Severity::Warning)
    {
        report.recommendations.push(
            "register access warnings present; verify the decoded stream is really code"
                .to_string(),
        );
    }

    report
}

/// Line length must be achievable under some flag state.
fn byte_count_plausible(line: &DecodedLine, mode: AddressingMode) -> bool {
    let len = line.bytes.len();
    match mode {
        AddressingMode::ImmediateM | AddressingMode::ImmediateX => len == 2 || len == 3,
        _ => {
            // Width-independent modes have exactly one legal length.
            let fixed = 1 + mode.operand_len(&crate::cpu::flags::FlagState::default());
            len == fixed
        }
    }
}

/// Read of a write-only register or write to a read-only one.
fn check_register_access(line: &DecodedLine) -> Option<Discrepancy> {
    let mnemonic = line.mnemonic?;
    let addr = line.operand.and_then(|op| op.address())?;
    let info = registers::lookup(addr)?;

    let violation = match info.access {
        RegisterAccess::Write if mnemonic.reads_memory() => Some("read of write-only register"),
        RegisterAccess::Read if mnemonic.writes_memory() => Some("write to read-only register"),
        _ => None,
    }?;

    Some(Discrepancy {
        address: line.address,
        severity: Severity::Warning,
        message: format!("{violation} {} (${:04X})", info.name, addr & 0xFFFF),
    })
}

/// Context comment for register operands.
fn propose_comment(line: &DecodedLine) -> Option<Enhancement> {
    let addr = line.operand.and_then(|op| op.address())?;
    let info = registers::lookup(addr)?;
    Some(Enhancement {
        address: line.address,
        comment: format!("{}: {}", info.name, info.description),
    })
}

/// Append enhancement comments to their lines.
///
/// Appending never removes existing text, so enabling the pass is
/// monotone in information.
pub fn apply_enhancements(lines: &mut [DecodedLine], enhancements: &[Enhancement]) {
    for enhancement in enhancements {
        if let Some(line) = lines.iter_mut().find(|l| l.address == enhancement.address) {
            match &mut line.comment {
                Some(existing) => {
                    existing.push_str("; ");
                    existing.push_str(&enhancement.comment);
                }
                None => line.comment = Some(enhancement.comment.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::blocks::tests::decode_code;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_listing_validates() {
        let code = [0xA9, 0x01, 0x8D, 0x00, 0x21, 0x60];
        let lines = decode_code(&code);
        let report = validate(&lines, false);
        assert_eq!(report.accuracy, 100.0);
        assert!(report.discrepancies.is_empty());
        assert!(report.enhancements.is_empty());
    }

    #[test]
    fn test_register_comment_enhancement() {
        // STA $2100
        let code = [0x8D, 0x00, 0x21, 0x60];
        let lines = decode_code(&code);
        let report = validate(&lines, true);
        assert_eq!(report.enhancements.len(), 1);
        assert!(report.enhancements[0].comment.contains("INIDISP"));
    }

    #[test]
    fn test_write_to_read_only_register() {
        // STA $4210 (RDNMI is read-only)
        let code = [0x8D, 0x10, 0x42, 0x60];
        let lines = decode_code(&code);
        let report = validate(&lines, false);
        assert!(report
            .discrepancies
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("RDNMI")));
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_read_of_write_only_register() {
        // LDA $2100 (INIDISP is write-only)
        let code = [0xAD, 0x00, 0x21, 0x60];
        let lines = decode_code(&code);
        let report = validate(&lines, false);
        assert!(report
            .discrepancies
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("INIDISP")));
    }

    #[test]
    fn test_tampered_mnemonic_is_error() {
        let code = [0xA9, 0x01, 0x60];
        let mut lines = decode_code(&code);
        lines[0].mnemonic = Some(crate::cpu::opcodes::Mnemonic::STA);
        let report = validate(&lines, false);
        assert!(report
            .discrepancies
            .iter()
            .any(|d| d.severity == Severity::Error));
        assert!(report.accuracy < 100.0);
    }

    #[test]
    fn test_enhancement_appends_to_existing_comment() {
        // Enabling enhancement never removes comment text.
        let code = [0x8D, 0x00, 0x21, 0x60];
        let mut lines = decode_code(&code);
        lines[0].comment = Some("user note".into());
        let report = validate(&lines, true);
        apply_enhancements(&mut lines, &report.enhancements);
        let comment = lines[0].comment.as_deref().unwrap();
        assert!(comment.starts_with("user note"));
        assert!(comment.contains("INIDISP"));
    }

    #[test]
    fn test_data_heavy_listing_recommendation() {
        // All-data stream: every byte unprintable as code is flagged.
        let data = [0x60u8];
        let lines: Vec<DecodedLine> = (0..4)
            .map(|i| crate::cpu::decoder::data_line(&data, 0, 0x8000 + i))
            .collect();
        let report = validate(&lines, false);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("code/data")));
        assert_eq!(report.accuracy, 0.0);
    }
}
