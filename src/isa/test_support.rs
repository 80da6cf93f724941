use crate::isa::bits::encode_bits;
use crate::isa::builder::IsaBuilder;
use crate::isa::decoder::Decoder;
use crate::isa::error::DecoderError;
use crate::isa::model::{ControlFlow, InstructionId};

/// Three 32-bit formats sharing `op`, with R and I also sharing `rs` and `rt`.
pub fn mips_like() -> IsaBuilder {
    let mut builder = IsaBuilder::new();
    builder
        .format("R")
        .field("op", 6)
        .field("rs", 5)
        .field("rt", 5)
        .field("rd", 5)
        .field("shamt", 5)
        .field("func", 6)
        .finish();
    builder
        .format("I")
        .field("op", 6)
        .field("rs", 5)
        .field("rt", 5)
        .signed_field("imm", 16)
        .finish();
    builder.format("J").field("op", 6).field("addr", 26).finish();

    builder
        .instruction("add", "R")
        .asm("add %reg, %reg, %reg")
        .select("op", 0)
        .select("func", 0x20)
        .finish();
    builder
        .instruction("sub", "R")
        .asm("sub %reg, %reg, %reg")
        .select("op", 0)
        .select("func", 0x22)
        .finish();
    builder.instruction("addi", "I").select("op", 8).finish();
    builder
        .instruction("lw", "I")
        .select("op", 0x23)
        .latency(1, 2)
        .finish();
    builder
        .instruction("beq", "I")
        .select("op", 4)
        .control_flow(ControlFlow {
            cond: Some("rs == rt".into()),
            target: Some("pc + 4 + (imm << 2)".into()),
            delay_slots: 1,
            ..ControlFlow::default()
        })
        .finish();
    builder.instruction("j", "J").select("op", 2).finish();
    builder
}

/// Base encoding of `id` with the named operands written over it.
pub fn word_with(decoder: &Decoder, id: InstructionId, operands: &[(&str, i64)]) -> Vec<u8> {
    let mut word = decoder.base_encoding(id).expect("base encoding");
    let format = decoder.format_of(id).expect("format");
    for (name, value) in operands {
        let field = format.field(name).expect("operand field");
        encode_bits(&mut word, field.first_bit, field.size, field.is_signed(), *value)
            .expect("operand fits");
    }
    word
}

pub fn expect_diag(err: &DecoderError, code: &str, needle: &str) {
    let diagnostics = err.diagnostics();
    assert!(
        diagnostics
            .iter()
            .any(|diag| diag.code == code && diag.message.contains(needle)),
        "expected {code} containing '{needle}', got {diagnostics:#?}"
    );
}
