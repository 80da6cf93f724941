//! Instruction-set decoding pipeline.
//!
//! This module houses a staged architecture that turns already-parsed format and instruction
//! metadata into a validated [`Decoder`](decoder/struct.Decoder.html): structural validation,
//! field unification across formats, decode-forest construction, and finally matching plus
//! operand extraction against raw instruction buffers.

pub mod bits;
pub mod builder;
pub mod decoder;
pub mod diagnostic;
pub mod error;
pub mod model;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use bits::{BitCursor, BitExtractor, Endianness, ExtractError, MsbFirst};
pub use builder::IsaBuilder;
pub use decoder::{
    Decoded, Decoder, DecoderOptions, DuplicateTerminalPolicy, FieldCachePolicy, FieldValues,
    build_decoder, build_decoder_with,
};
pub use error::DecoderError;
pub use model::{
    ControlFlow, Field, FieldFlags, FieldId, Format, Instruction, InstructionId, Selector,
    SelectorChain,
};
