//! Helpers for constructing formats and instructions programmatically, the shape a description
//! parser hands over to the decoder.
//!
//! The builder owns instruction id allocation so ids start at 1, increase monotonically and are
//! never reused, and it lays format fields out back to back the way a format string is read.

use crate::isa::decoder::{Decoder, DecoderOptions, build_decoder_with};
use crate::isa::error::DecoderError;
use crate::isa::model::{ControlFlow, Field, Format, Instruction, InstructionId};

/// Convenience wrapper for assembling a full architecture description in memory.
pub struct IsaBuilder {
    formats: Vec<Format>,
    instructions: Vec<Instruction>,
    next_id: u32,
    const_count: usize,
}

impl Default for IsaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IsaBuilder {
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
            instructions: Vec::new(),
            next_id: 1,
            const_count: 0,
        }
    }

    /// Begins a format whose fields are laid out MSB first in declaration order; call
    /// [`FormatBuilder::finish`] to push it.
    pub fn format(&mut self, name: impl Into<String>) -> FormatBuilder<'_> {
        FormatBuilder {
            format: Format::new(name, 0),
            width: None,
            cursor: 0,
            builder: self,
        }
    }

    /// Appends a fully specified format as-is.
    pub fn add_format(&mut self, format: Format) -> &mut Self {
        self.formats.push(format);
        self
    }

    /// Begins an instruction declaration; call [`InstructionBuilder::finish`] to push it.
    pub fn instruction(
        &mut self,
        name: impl Into<String>,
        format: impl Into<String>,
    ) -> InstructionBuilder<'_> {
        let id = self.allocate_id();
        InstructionBuilder {
            instruction: Instruction::new(id, name, format),
            builder: self,
        }
    }

    /// Appends an instruction built elsewhere. Its id is taken as given.
    pub fn add_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.next_id = self.next_id.max(instruction.id.get().saturating_add(1));
        self.instructions.push(instruction);
        self
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Finishes building and returns the formats and instructions in declaration order.
    pub fn build(self) -> (Vec<Format>, Vec<Instruction>) {
        (self.formats, self.instructions)
    }

    pub fn build_decoder(self) -> Result<Decoder, DecoderError> {
        self.build_decoder_with(DecoderOptions::default())
    }

    pub fn build_decoder_with(self, options: DecoderOptions) -> Result<Decoder, DecoderError> {
        let (formats, instructions) = self.build();
        build_decoder_with(formats, instructions, options)
    }

    fn allocate_id(&mut self) -> InstructionId {
        let id = InstructionId::new(self.next_id).expect("instruction ids start at 1");
        self.next_id += 1;
        id
    }
}

/// Builder for a [`Format`]; each field starts where the previous one ended.
pub struct FormatBuilder<'a> {
    builder: &'a mut IsaBuilder,
    format: Format,
    width: Option<u32>,
    cursor: u32,
}

impl<'a> FormatBuilder<'a> {
    pub fn field(self, name: impl Into<String>, size: u32) -> Self {
        self.push(name.into(), size, false, None)
    }

    pub fn signed_field(self, name: impl Into<String>, size: u32) -> Self {
        self.push(name.into(), size, true, None)
    }

    /// Adds literal bits. The field gets a synthesized `CONST_<n>` name, numbered across the
    /// whole description.
    pub fn constant(mut self, size: u32, value: i64) -> Self {
        let name = format!("CONST_{}", self.builder.const_count);
        self.builder.const_count += 1;
        self = self.push(name, size, false, Some(value));
        self
    }

    /// Skips bits that belong to no field.
    pub fn gap(mut self, size: u32) -> Self {
        self.cursor += size;
        self
    }

    /// Overrides the format width, which otherwise is the sum of the declared field sizes.
    pub fn width(mut self, bits: u32) -> Self {
        self.width = Some(bits);
        self
    }

    pub fn finish(mut self) -> &'a mut IsaBuilder {
        self.format.bits = self.width.unwrap_or(self.cursor);
        self.builder.formats.push(self.format);
        self.builder
    }

    fn push(mut self, name: String, size: u32, signed: bool, constant: Option<i64>) -> Self {
        let mut field = Field::new(name, size, self.cursor).signed(signed);
        if let Some(value) = constant {
            field = field.with_constant(value);
        }
        self.cursor += size;
        self.format.push_field(field);
        self
    }
}

/// Builder for the richer [`Instruction`] structure.
pub struct InstructionBuilder<'a> {
    builder: &'a mut IsaBuilder,
    instruction: Instruction,
}

impl<'a> InstructionBuilder<'a> {
    /// Id allocated to this instruction.
    pub fn id(&self) -> InstructionId {
        self.instruction.id
    }

    pub fn mnemonic(mut self, mnemonic: impl Into<String>) -> Self {
        self.instruction.mnemonic = mnemonic.into();
        self
    }

    pub fn asm(mut self, asm: impl Into<String>) -> Self {
        self.instruction.asm = asm.into();
        self
    }

    /// Adds a single `field == value` selector to the end of the chain.
    pub fn select(mut self, field: impl Into<String>, value: i64) -> Self {
        self.instruction = self.instruction.select(field, value);
        self
    }

    pub fn cycles(mut self, cycles: u32) -> Self {
        self.instruction.cycles = cycles;
        self
    }

    pub fn latency(mut self, min: u32, max: u32) -> Self {
        self.instruction.min_latency = min;
        self.instruction.max_latency = max;
        self
    }

    pub fn control_flow(mut self, control_flow: ControlFlow) -> Self {
        self.instruction.control_flow = Some(control_flow);
        self
    }

    /// Completes the builder and pushes the instruction into the owning description.
    pub fn finish(self) -> &'a mut IsaBuilder {
        self.builder.instructions.push(self.instruction);
        self.builder
    }
}
