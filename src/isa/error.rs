use std::fmt;

use crate::isa::bits::ExtractError;
use crate::isa::diagnostic::{BuildDiagnostic, DiagnosticPhase};
use crate::isa::model::InstructionId;

/// Represents any failure that can occur while building a decoder or serving generator lookups.
#[derive(Debug)]
pub enum DecoderError {
    Diagnostics {
        phase: DiagnosticPhase,
        diagnostics: Vec<BuildDiagnostic>,
    },
    UnknownFormat(String),
    UnknownInstruction(InstructionId),
    UnknownInstructionName(String),
    UnknownField(String),
    Encoding(String),
}

impl DecoderError {
    /// Diagnostics carried by a build failure, empty for lookup errors.
    pub fn diagnostics(&self) -> &[BuildDiagnostic] {
        match self {
            DecoderError::Diagnostics { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

impl From<ExtractError> for DecoderError {
    fn from(err: ExtractError) -> Self {
        DecoderError::Encoding(format!("bit access failed: {err}"))
    }
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderError::Diagnostics { phase, diagnostics } => {
                writeln!(f, "{phase:?} produced {} issue(s):", diagnostics.len())?;
                for diag in diagnostics {
                    writeln!(f, "  - {}", diag.format_human())?;
                }
                Ok(())
            }
            DecoderError::UnknownFormat(name) => write!(f, "invalid format name '{name}'"),
            DecoderError::UnknownInstruction(id) => write!(f, "invalid instruction id {id}"),
            DecoderError::UnknownInstructionName(name) => {
                write!(f, "invalid instruction name '{name}'")
            }
            DecoderError::UnknownField(name) => write!(f, "invalid field name '{name}'"),
            DecoderError::Encoding(msg) => write!(f, "encoding error: {msg}"),
        }
    }
}

impl std::error::Error for DecoderError {}
