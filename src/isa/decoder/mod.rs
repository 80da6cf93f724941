//! Root coordination layer for decoding. This module owns the [`Decoder`] aggregate and wires
//! together field unification, forest construction, matching and operand extraction.

mod extract;
pub mod fields;
pub mod forest;
pub mod matcher;

pub use extract::FieldValues;
pub use fields::FieldTable;
pub use forest::{DecodeForest, DecodeNode, NodeId};
pub use matcher::{MatchOutcome, MatchStats, Matcher};

use ahash::AHashMap;
use tracing::{debug, trace, warn};

use crate::isa::bits::{BitCursor, BitExtractor, MsbFirst, encode_bits};
use crate::isa::diagnostic::{BuildDiagnostic, DiagnosticLevel, DiagnosticPhase};
use crate::isa::error::DecoderError;
use crate::isa::model::{Field, FieldId, Format, Instruction, InstructionId};
use crate::isa::validator::Validator;

use extract::extract_fields;
use forest::InsertError;

/// When a value extracted for one test may be reused by the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldCachePolicy {
    /// Keep the held value while consecutive tests examine the same unified field; forget it
    /// whenever the search descends a level.
    #[default]
    AcrossSiblings,
    /// Re-extract for every test.
    Never,
}

/// What happens when two instructions reduce to the same terminal node, or when one chain
/// ends on the path of another so that one of them can never be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateTerminalPolicy {
    /// Fail the build, naming both instructions.
    #[default]
    Reject,
    /// The later instruction replaces the earlier one and shadowed chains are kept; each case
    /// is recorded as a warning.
    LastWins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Whether the matcher may reuse a value extracted for the previous sibling test.
    pub field_cache: FieldCachePolicy,
    /// How colliding or shadowing selector chains are treated while the forest is built.
    pub duplicate_terminals: DuplicateTerminalPolicy,
    /// Forest depth above which the build emits a warning.
    pub depth_warning: usize,
    /// Reject candidates whose constant fields do not hold their literal bits.
    pub check_constants: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            field_cache: FieldCachePolicy::default(),
            duplicate_terminals: DuplicateTerminalPolicy::default(),
            depth_warning: 64,
            check_constants: false,
        }
    }
}

impl DecoderOptions {
    pub fn field_cache(mut self, policy: FieldCachePolicy) -> Self {
        self.field_cache = policy;
        self
    }

    pub fn duplicate_terminals(mut self, policy: DuplicateTerminalPolicy) -> Self {
        self.duplicate_terminals = policy;
        self
    }

    pub fn depth_warning(mut self, depth: usize) -> Self {
        self.depth_warning = depth;
        self
    }

    pub fn check_constants(mut self, enabled: bool) -> Self {
        self.check_constants = enabled;
        self
    }
}

/// A successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub instruction: InstructionId,
    /// Instruction size in bytes.
    pub size: u32,
    pub fields: FieldValues,
}

impl Decoded {
    pub fn value(&self, id: FieldId) -> i64 {
        self.fields.get(id)
    }
}

/// Immutable decoding model for one architecture: the forest, the canonical formats and
/// fields, and the instructions they identify.
#[derive(Debug, Clone)]
pub struct Decoder {
    forest: DecodeForest,
    formats: Vec<Format>,
    fields: FieldTable,
    instructions: Vec<Instruction>,
    instruction_formats: Vec<usize>,
    format_index: AHashMap<String, usize>,
    instruction_index: AHashMap<InstructionId, usize>,
    instruction_names: AHashMap<String, usize>,
    options: DecoderOptions,
    warnings: Vec<BuildDiagnostic>,
}

pub fn build_decoder(
    formats: Vec<Format>,
    instructions: Vec<Instruction>,
) -> Result<Decoder, DecoderError> {
    Decoder::build(formats, instructions, DecoderOptions::default())
}

pub fn build_decoder_with(
    formats: Vec<Format>,
    instructions: Vec<Instruction>,
    options: DecoderOptions,
) -> Result<Decoder, DecoderError> {
    Decoder::build(formats, instructions, options)
}

impl Decoder {
    pub fn build(
        mut formats: Vec<Format>,
        mut instructions: Vec<Instruction>,
        options: DecoderOptions,
    ) -> Result<Self, DecoderError> {
        let mut warnings = Validator::new().validate(&formats, &instructions)?;
        let fields = FieldTable::unify(&mut formats)?;

        let format_index: AHashMap<String, usize> = formats
            .iter()
            .enumerate()
            .map(|(index, format)| (format.name.clone(), index))
            .collect();
        let mut instruction_formats = Vec::with_capacity(instructions.len());
        for instr in instructions.iter_mut() {
            let index = *format_index
                .get(&instr.format)
                .ok_or_else(|| DecoderError::UnknownFormat(instr.format.clone()))?;
            instr.size = formats[index].size_bytes();
            instruction_formats.push(index);
        }

        let mut forest = DecodeForest::new();
        let mut errors = Vec::new();
        let replace = options.duplicate_terminals == DuplicateTerminalPolicy::LastWins;
        for (index, instr) in instructions.iter().enumerate() {
            let format = &formats[instruction_formats[index]];
            let chain = resolve_chain(format, instr)?;
            match forest.insert(index, &chain, replace) {
                Ok(report) => {
                    if let Some(previous) = report.replaced {
                        warnings.push(BuildDiagnostic::warning(
                            DiagnosticPhase::TreeBuild,
                            "forest.duplicate-terminal",
                            format!(
                                "decoding conflict between '{}' and '{}', keeping '{}'",
                                instructions[previous].name, instr.name, instr.name
                            ),
                            instr.name.clone(),
                        ));
                    }
                    if let Some(owner) = report.shadowed_by {
                        let owner = &instructions[owner].name;
                        if replace {
                            warnings.push(BuildDiagnostic::warning(
                                DiagnosticPhase::TreeBuild,
                                "forest.shadowed",
                                format!("instruction '{}' is unreachable behind '{owner}'", instr.name),
                                instr.name.clone(),
                            ));
                        } else {
                            errors.push(shadow_conflict(owner, &instr.name));
                        }
                    }
                    if let Some(hidden) = report.shadows {
                        let hidden = &instructions[hidden].name;
                        if replace {
                            warnings.push(BuildDiagnostic::warning(
                                DiagnosticPhase::TreeBuild,
                                "forest.shadowed",
                                format!(
                                    "instruction '{}' hides longer selector chains such as '{hidden}'",
                                    instr.name
                                ),
                                instr.name.clone(),
                            ));
                        } else {
                            errors.push(shadow_conflict(hidden, &instr.name));
                        }
                    }
                }
                Err(InsertError::EmptyChain) => errors.push(BuildDiagnostic::error(
                    DiagnosticPhase::TreeBuild,
                    "forest.empty-chain",
                    format!("instruction '{}' doesn't have a decode list", instr.name),
                    instr.name.clone(),
                )),
                Err(InsertError::Conflict { existing }) => errors.push(BuildDiagnostic::error(
                    DiagnosticPhase::TreeBuild,
                    "forest.duplicate-terminal",
                    format!(
                        "decoding conflict between '{}' and '{}'",
                        instructions[existing].name, instr.name
                    ),
                    instr.name.clone(),
                )),
            }
        }
        if !errors.is_empty() {
            return Err(DecoderError::Diagnostics {
                phase: DiagnosticPhase::TreeBuild,
                diagnostics: errors,
            });
        }

        if forest.max_depth() > options.depth_warning {
            warnings.push(BuildDiagnostic::new(
                DiagnosticPhase::TreeBuild,
                DiagnosticLevel::Warning,
                "forest.depth",
                format!(
                    "decode forest is {} levels deep (warning threshold {})",
                    forest.max_depth(),
                    options.depth_warning
                ),
                None,
            ));
        }
        for diag in &warnings {
            warn!("{}", diag.format_human());
        }
        debug!(
            formats = formats.len(),
            fields = fields.len(),
            instructions = instructions.len(),
            nodes = forest.len(),
            depth = forest.max_depth(),
            "decoder built"
        );

        let instruction_index = instructions
            .iter()
            .enumerate()
            .map(|(index, instr)| (instr.id, index))
            .collect();
        // Names are not required to be unique; the first declaration answers lookups.
        let mut instruction_names = AHashMap::with_capacity(instructions.len());
        for (index, instr) in instructions.iter().enumerate() {
            instruction_names.entry(instr.name.clone()).or_insert(index);
        }
        Ok(Self {
            forest,
            formats,
            fields,
            instructions,
            instruction_formats,
            format_index,
            instruction_index,
            instruction_names,
            options,
            warnings,
        })
    }

    /// Decodes the instruction at the start of `buffer`, reading at most `available_bits`.
    /// The window never extends past the end of `buffer`.
    pub fn decode(&self, buffer: &[u8], available_bits: usize) -> Option<Decoded> {
        self.decode_with(&MsbFirst, buffer, available_bits)
    }

    /// Like [`Decoder::decode`] with a host-supplied bit extraction primitive.
    pub fn decode_with<E>(&self, extractor: &E, buffer: &[u8], available_bits: usize) -> Option<Decoded>
    where
        E: BitExtractor + ?Sized,
    {
        let mut fields = FieldValues::new(self.fields.slot_count());
        let index = self.decode_slots(extractor, buffer, available_bits, &mut fields)?;
        let instr = &self.instructions[index];
        Some(Decoded {
            instruction: instr.id,
            size: instr.size,
            fields,
        })
    }

    /// Decodes into a caller-owned result buffer, which is zeroed first so no value from a
    /// previous decode survives.
    pub fn decode_into<E>(
        &self,
        extractor: &E,
        buffer: &[u8],
        available_bits: usize,
        out: &mut FieldValues,
    ) -> Option<InstructionId>
    where
        E: BitExtractor + ?Sized,
    {
        self.decode_slots(extractor, buffer, available_bits, out)
            .map(|index| self.instructions[index].id)
    }

    fn decode_slots<E>(
        &self,
        extractor: &E,
        buffer: &[u8],
        available_bits: usize,
        out: &mut FieldValues,
    ) -> Option<usize>
    where
        E: BitExtractor + ?Sized,
    {
        out.reset(self.fields.slot_count());
        let mut cursor = BitCursor::new(available_bits.min(buffer.len() * 8));
        let matcher = Matcher::new(&self.forest, &self.fields, self.options.field_cache);
        let outcome = matcher.find(extractor, buffer, &mut cursor, |index, cursor| {
            self.accepts(extractor, buffer, cursor, index)
        });
        trace!(
            tests = outcome.stats.tests,
            extractions = outcome.stats.extractions,
            backtracks = outcome.stats.backtracks,
            found = outcome.instruction.is_some(),
            "decode search finished"
        );
        let index = outcome.instruction?;
        let instr = &self.instructions[index];
        let format = &self.formats[self.instruction_formats[index]];
        if let Err(err) = extract_fields(format, instr.id, extractor, buffer, &mut cursor, out) {
            warn!(instruction = %instr.name, %err, "operand extraction failed after match");
            out.reset(self.fields.slot_count());
            return None;
        }
        Some(index)
    }

    fn accepts<E>(&self, extractor: &E, buffer: &[u8], cursor: &mut BitCursor, index: usize) -> bool
    where
        E: BitExtractor + ?Sized,
    {
        let format = &self.formats[self.instruction_formats[index]];
        if format.bits as usize > cursor.available() {
            return false;
        }
        if !self.options.check_constants {
            return true;
        }
        format.fields.iter().all(|field| match field.constant() {
            None => true,
            Some(expected) => extractor
                .extract(buffer, cursor, field.first_bit, field.size, field.is_signed())
                .is_ok_and(|value| value == expected),
        })
    }

    pub fn find_format(&self, name: &str) -> Result<&Format, DecoderError> {
        self.format_index
            .get(name)
            .map(|index| &self.formats[*index])
            .ok_or_else(|| DecoderError::UnknownFormat(name.to_string()))
    }

    pub fn instruction(&self, id: InstructionId) -> Result<&Instruction, DecoderError> {
        self.instruction_index
            .get(&id)
            .map(|index| &self.instructions[*index])
            .ok_or(DecoderError::UnknownInstruction(id))
    }

    pub fn instruction_by_name(&self, name: &str) -> Result<&Instruction, DecoderError> {
        self.instruction_names
            .get(name)
            .map(|index| &self.instructions[*index])
            .ok_or_else(|| DecoderError::UnknownInstructionName(name.to_string()))
    }

    /// Format owning the instruction `id`.
    pub fn format_of(&self, id: InstructionId) -> Result<&Format, DecoderError> {
        let index = *self
            .instruction_index
            .get(&id)
            .ok_or(DecoderError::UnknownInstruction(id))?;
        Ok(&self.formats[self.instruction_formats[index]])
    }

    pub fn field_id(&self, name: &str) -> Result<FieldId, DecoderError> {
        self.fields
            .id_of(name)
            .ok_or_else(|| DecoderError::UnknownField(name.to_string()))
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    /// Number of unified fields; decode results carry one more slot for the instruction id.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn forest(&self) -> &DecodeForest {
        &self.forest
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Non-fatal conditions found while building.
    pub fn warnings(&self) -> &[BuildDiagnostic] {
        &self.warnings
    }

    /// Canonical fields declared by every format, in the first format's order.
    pub fn common_fields(&self) -> Vec<&Field> {
        let Some((first, rest)) = self.formats.split_first() else {
            return Vec::new();
        };
        first
            .fields
            .iter()
            .filter(|field| rest.iter().all(|format| format.contains(&field.name)))
            .filter_map(|field| self.fields.lookup(&field.name))
            .collect()
    }

    /// Bit pattern implied by an instruction's selectors and its format's constants, with
    /// every other bit zero.
    pub fn base_encoding(&self, id: InstructionId) -> Result<Vec<u8>, DecoderError> {
        let instr = self.instruction(id)?;
        let format = self.format_of(id)?;
        let mut word = vec![0u8; format.size_bytes() as usize];
        for field in &format.fields {
            if let Some(value) = field.constant() {
                encode_bits(&mut word, field.first_bit, field.size, field.is_signed(), value)?;
            }
        }
        for selector in &instr.selectors {
            let field = format
                .field(&selector.field)
                .ok_or_else(|| DecoderError::UnknownField(selector.field.clone()))?;
            encode_bits(
                &mut word,
                field.first_bit,
                field.size,
                field.is_signed(),
                selector.value,
            )?;
        }
        Ok(word)
    }

    /// Human-readable dump of the decode forest.
    pub fn dump_tree(&self) -> String {
        self.forest.render(&self.fields, &self.instructions)
    }
}

fn shadow_conflict(earlier: &str, later: &str) -> BuildDiagnostic {
    BuildDiagnostic::error(
        DiagnosticPhase::TreeBuild,
        "forest.duplicate-terminal",
        format!("decoding conflict between '{earlier}' and '{later}'"),
        later.to_string(),
    )
}

fn resolve_chain(format: &Format, instr: &Instruction) -> Result<Vec<(FieldId, i64)>, DecoderError> {
    instr
        .selectors
        .iter()
        .map(|selector| {
            format
                .field(&selector.field)
                .and_then(|field| field.id)
                .map(|id| (id, selector.value))
                .ok_or_else(|| DecoderError::UnknownField(selector.field.clone()))
        })
        .collect()
}
