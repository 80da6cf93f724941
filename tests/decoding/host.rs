use std::cell::Cell;

use archdecode::isa::{
    BitCursor, BitExtractor, Decoder, DecoderOptions, Endianness, ExtractError, FieldCachePolicy,
    IsaBuilder, MsbFirst,
};

fn little_risc() -> Decoder {
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
        .format("C")
        .field("op", 6)
        .field("rs", 5)
        .signed_field("imm", 5)
        .finish();
    builder
        .instruction("add", "R")
        .select("op", 0)
        .select("func", 0x20)
        .finish();
    builder.instruction("c.addi", "C").select("op", 0x3f).finish();
    builder.build_decoder().expect("build")
}

/// Counts extractions while delegating to the MSB-first reader.
#[derive(Default)]
struct Counting {
    calls: Cell<usize>,
}

impl BitExtractor for Counting {
    fn extract(
        &self,
        buffer: &[u8],
        cursor: &mut BitCursor,
        first_bit: u32,
        size: u32,
        signed: bool,
    ) -> Result<i64, ExtractError> {
        self.calls.set(self.calls.get() + 1);
        MsbFirst.extract(buffer, cursor, first_bit, size, signed)
    }
}

#[test]
fn little_endian_streams_decode_after_normalizing() {
    let decoder = little_risc();
    // add $3, $1, $2 fetched from a little-endian target
    let fetched = [0x20, 0x18, 0x22, 0x00];
    let word = Endianness::Little.normalize(&fetched, 4);
    assert_eq!(word, vec![0x00, 0x22, 0x18, 0x20]);
    let decoded = decoder.decode(&word, 32).expect("add decodes");
    let rd = decoder.field_id("rd").expect("rd");
    assert_eq!(decoded.value(rd), 3);
    assert_eq!(Endianness::Big.normalize(&word, 4), word);
}

#[test]
fn mixed_width_stream_uses_available_bits() {
    let decoder = little_risc();
    let imm = decoder.field_id("imm").expect("imm");

    // c.addi with imm = -2 in a 16-bit window
    let decoded = decoder.decode(&[0xfc, 0x3e], 16).expect("c.addi decodes");
    assert_eq!(decoded.size, 2);
    assert_eq!(decoded.value(imm), -2);

    // add needs 32 bits; a 16-bit window is a miss rather than an error
    assert!(decoder.decode(&[0x00, 0x22, 0x18, 0x20], 16).is_none());
}

#[test]
fn host_extractors_are_used_for_every_read() {
    let decoder = little_risc();
    let extractor = Counting::default();
    let decoded = decoder
        .decode_with(&extractor, &[0x00, 0x22, 0x18, 0x20], 32)
        .expect("add decodes");
    assert_eq!(decoded.instruction.get(), 1);
    // op, func, then six operand reads
    assert_eq!(extractor.calls.get(), 8);
}

#[test]
fn closures_act_as_extractors() {
    let decoder = little_risc();
    let reversed = |buffer: &[u8], cursor: &mut BitCursor, first_bit, size, signed| {
        let swapped = Endianness::Little.normalize(buffer, 4);
        MsbFirst.extract(&swapped, cursor, first_bit, size, signed)
    };
    let decoded = decoder
        .decode_with(&reversed, &[0x20, 0x18, 0x22, 0x00], 32)
        .expect("add decodes");
    assert_eq!(decoded.value(decoder.field_id("rt").expect("rt")), 2);
}

#[test]
fn decoder_is_shared_across_threads() {
    let decoder = &little_risc();
    let words: [[u8; 4]; 2] = [[0x00, 0x22, 0x18, 0x20], [0xfc, 0x3e, 0x00, 0x00]];
    std::thread::scope(|scope| {
        let handles: Vec<_> = words
            .iter()
            .map(|word| scope.spawn(move || decoder.decode(word, 32).map(|d| d.instruction.get())))
            .collect();
        let ids: Vec<Option<u32>> = handles
            .into_iter()
            .map(|handle| handle.join().expect("decode thread"))
            .collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
    });
}

#[test]
fn strict_cache_policy_extracts_per_test() {
    let mut builder = IsaBuilder::new();
    builder.format("F").field("op", 8).finish();
    for op in 0..4 {
        builder.instruction(format!("i{op}"), "F").select("op", op).finish();
    }
    let (formats, instructions) = builder.build();
    let cached = archdecode::isa::build_decoder(formats.clone(), instructions.clone())
        .expect("cached");
    let strict = archdecode::isa::build_decoder_with(
        formats,
        instructions,
        DecoderOptions::default().field_cache(FieldCachePolicy::Never),
    )
    .expect("strict");

    let lazy = Counting::default();
    let eager = Counting::default();
    cached.decode_with(&lazy, &[3], 8).expect("cached");
    strict.decode_with(&eager, &[3], 8).expect("strict");
    // one search read plus one operand read versus four search reads plus one
    assert_eq!(lazy.calls.get(), 2);
    assert_eq!(eager.calls.get(), 5);
}
