//! Structural validation of formats and instructions before the decoder is assembled.

use ahash::{AHashMap, AHashSet};

use super::bits::MAX_FIELD_BITS;
use super::diagnostic::{BuildDiagnostic, DiagnosticLevel, DiagnosticPhase};
use super::error::DecoderError;
use super::model::{Format, Instruction};

pub struct Validator {
    formats: AHashMap<String, usize>,
    instruction_ids: AHashMap<u32, String>,
    diagnostics: Vec<BuildDiagnostic>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            formats: AHashMap::new(),
            instruction_ids: AHashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Checks every format and instruction, collecting all problems. Returns the warnings on
    /// success and every diagnostic when at least one error was found.
    pub fn validate(
        &mut self,
        formats: &[Format],
        instructions: &[Instruction],
    ) -> Result<Vec<BuildDiagnostic>, DecoderError> {
        for (index, format) in formats.iter().enumerate() {
            self.validate_format(index, format);
        }
        for instr in instructions {
            self.validate_instruction(formats, instr);
        }
        let diagnostics = std::mem::take(&mut self.diagnostics);
        if diagnostics.iter().any(BuildDiagnostic::is_error) {
            Err(DecoderError::Diagnostics {
                phase: DiagnosticPhase::Validation,
                diagnostics,
            })
        } else {
            Ok(diagnostics)
        }
    }

    fn validate_format(&mut self, index: usize, format: &Format) {
        if self.formats.insert(format.name.clone(), index).is_some() {
            self.push_error(
                "validation.duplicate-format",
                format!("format '{}' defined multiple times", format.name),
                &format.name,
            );
        }
        if format.bits == 0 || format.bits % 8 != 0 {
            self.push_error(
                "validation.unaligned-format",
                format!(
                    "format '{}' width ({} bits) is not byte-aligned",
                    format.name, format.bits
                ),
                &format.name,
            );
        }

        let mut seen = AHashSet::new();
        for field in &format.fields {
            if !seen.insert(field.name.as_str()) {
                self.push_error(
                    "validation.duplicate-field",
                    format!(
                        "field '{}' declared multiple times in format '{}'",
                        field.name, format.name
                    ),
                    &field.name,
                );
            }
            if field.size == 0 || field.size > MAX_FIELD_BITS {
                self.push_error(
                    "validation.field-width",
                    format!(
                        "field '{}::{}' has width {} outside 1..={MAX_FIELD_BITS}",
                        format.name, field.name, field.size
                    ),
                    &field.name,
                );
                continue;
            }
            if field.end_bit() > u64::from(format.bits) {
                self.push_error(
                    "validation.field-range",
                    format!(
                        "field '{}::{}' covers bits {}..{} beyond the {}-bit format",
                        format.name,
                        field.name,
                        field.first_bit,
                        field.end_bit(),
                        format.bits
                    ),
                    &field.name,
                );
            }
            if let Some(value) = field.constant()
                && !field.fits(value)
            {
                self.push_error(
                    "validation.constant-range",
                    format!(
                        "constant {value} does not fit field '{}::{}' ({} bits)",
                        format.name, field.name, field.size
                    ),
                    &field.name,
                );
            }
        }
    }

    fn validate_instruction(&mut self, formats: &[Format], instr: &Instruction) {
        if let Some(previous) = self
            .instruction_ids
            .insert(instr.id.get(), instr.name.clone())
        {
            self.push_error(
                "validation.duplicate-instruction-id",
                format!(
                    "instruction id {} shared by '{}' and '{}'",
                    instr.id, previous, instr.name
                ),
                &instr.name,
            );
        }
        if instr.selectors.is_empty() {
            self.push_error(
                "validation.empty-selectors",
                format!("instruction '{}' doesn't have a decode list", instr.name),
                &instr.name,
            );
        }

        let Some(format) = self.formats.get(&instr.format).map(|index| &formats[*index]) else {
            self.push_error(
                "validation.unknown-format",
                format!(
                    "instruction '{}' references undefined format '{}'",
                    instr.name, instr.format
                ),
                &instr.name,
            );
            return;
        };

        let mut tested = AHashSet::new();
        for selector in &instr.selectors {
            let Some(field) = format.field(&selector.field) else {
                self.push_error(
                    "validation.unknown-selector-field",
                    format!(
                        "instruction '{}' selects on '{}' which format '{}' does not declare",
                        instr.name, selector.field, format.name
                    ),
                    &instr.name,
                );
                continue;
            };
            if !field.fits(selector.value) {
                self.push_error(
                    "validation.selector-range",
                    format!(
                        "instruction '{}' selects {}={} which does not fit {} bits",
                        instr.name, selector.field, selector.value, field.size
                    ),
                    &instr.name,
                );
            }
            if !tested.insert(selector.field.as_str()) {
                self.push_warning(
                    "validation.repeated-selector-field",
                    format!(
                        "instruction '{}' tests field '{}' more than once",
                        instr.name, selector.field
                    ),
                    &instr.name,
                );
            }
        }
    }

    fn push_error(&mut self, code: &'static str, message: impl Into<String>, subject: &str) {
        self.push(DiagnosticLevel::Error, code, message, subject);
    }

    fn push_warning(&mut self, code: &'static str, message: impl Into<String>, subject: &str) {
        self.push(DiagnosticLevel::Warning, code, message, subject);
    }

    fn push(
        &mut self,
        level: DiagnosticLevel,
        code: &'static str,
        message: impl Into<String>,
        subject: &str,
    ) {
        self.diagnostics.push(BuildDiagnostic::new(
            DiagnosticPhase::Validation,
            level,
            code,
            message,
            Some(subject.to_string()),
        ));
    }
}
