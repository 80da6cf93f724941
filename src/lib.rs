//! Architecture-description driven instruction decoding.
//!
//! Formats and instructions produced by an external description parser are turned into a
//! shared decode forest once per target; [`isa::Decoder`] then identifies instructions in raw
//! binary words and extracts their operand fields.

pub mod isa;
