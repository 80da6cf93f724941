use archdecode::isa::{
    Decoder, DecoderError, DecoderOptions, DuplicateTerminalPolicy, FieldCachePolicy, FieldValues,
    IsaBuilder, MsbFirst,
};
use archdecode::isa::diagnostic::DiagnosticPhase;

/// fmt:4 op:4 rest:8 with three instructions sharing the fmt=1 prefix.
fn shared_prefix(options: DecoderOptions) -> Decoder {
    let mut builder = IsaBuilder::new();
    builder
        .format("S")
        .field("fmt", 4)
        .field("op", 4)
        .field("rest", 8)
        .finish();
    builder
        .format("T")
        .field("fmt", 4)
        .signed_field("disp", 12)
        .finish();
    builder.instruction("a", "S").select("fmt", 1).select("op", 0).finish();
    builder.instruction("b", "S").select("fmt", 1).select("op", 1).finish();
    builder
        .instruction("c", "S")
        .select("fmt", 1)
        .select("op", 2)
        .select("rest", 0x7f)
        .finish();
    builder.instruction("d", "T").select("fmt", 2).finish();
    builder.build_decoder_with(options).expect("build")
}

fn decode_name(decoder: &Decoder, word: &[u8]) -> Option<String> {
    decoder.decode(word, word.len() * 8).map(|decoded| {
        decoder
            .instruction(decoded.instruction)
            .expect("decoded id is known")
            .name
            .clone()
    })
}

#[test]
fn diverging_chains_decode_independently() {
    let decoder = shared_prefix(DecoderOptions::default());
    assert_eq!(decode_name(&decoder, &[0x10, 0x00]).as_deref(), Some("a"));
    assert_eq!(decode_name(&decoder, &[0x11, 0x00]).as_deref(), Some("b"));
    assert_eq!(decode_name(&decoder, &[0x12, 0x7f]).as_deref(), Some("c"));
    assert_eq!(decode_name(&decoder, &[0x12, 0x7e]), None, "c requires rest=0x7f");
    assert_eq!(decode_name(&decoder, &[0x2f, 0xff]).as_deref(), Some("d"));
}

#[test]
fn cache_policies_agree_on_results() {
    let cached = shared_prefix(DecoderOptions::default());
    let strict = shared_prefix(DecoderOptions::default().field_cache(FieldCachePolicy::Never));
    for hi in 0u8..=0x3f {
        for lo in [0x00, 0x7e, 0x7f, 0xff] {
            let word = [hi, lo];
            assert_eq!(
                cached.decode(&word, 16),
                strict.decode(&word, 16),
                "word {word:02x?}"
            );
        }
    }
}

#[test]
fn every_instruction_decodes_from_its_base_encoding() {
    let decoder = shared_prefix(DecoderOptions::default());
    for instr in decoder.instructions() {
        let word = decoder.base_encoding(instr.id).expect("encode");
        let decoded = decoder.decode(&word, word.len() * 8).expect("decodes");
        assert_eq!(decoded.instruction, instr.id, "{}", instr.name);
    }
}

#[test]
fn field_ids_are_dense() {
    let decoder = shared_prefix(DecoderOptions::default());
    let ids: Vec<u32> = decoder
        .fields()
        .iter()
        .map(|field| field.id.expect("unified").get())
        .collect();
    assert_eq!(ids, (1..=decoder.field_count() as u32).collect::<Vec<_>>());
    for format in decoder.formats() {
        for field in &format.fields {
            assert_eq!(
                field.id,
                decoder.fields().id_of(&field.name),
                "{}::{} carries its canonical id",
                format.name,
                field.name
            );
        }
    }
}

#[test]
fn stale_values_never_leak_between_formats() {
    let decoder = shared_prefix(DecoderOptions::default());
    let op = decoder.field_id("op").expect("op");
    let rest = decoder.field_id("rest").expect("rest");
    let disp = decoder.field_id("disp").expect("disp");
    let mut out = FieldValues::default();

    decoder
        .decode_into(&MsbFirst, &[0x12, 0x7f], 16, &mut out)
        .expect("c");
    assert_eq!((out.get(op), out.get(rest)), (2, 0x7f));

    decoder
        .decode_into(&MsbFirst, &[0x2f, 0xff], 16, &mut out)
        .expect("d");
    assert_eq!(out.get(op), 0);
    assert_eq!(out.get(rest), 0);
    assert_eq!(out.get(disp), -1, "disp is sign-extended");
}

#[test]
fn unknown_words_are_not_found_repeatedly() {
    let decoder = shared_prefix(DecoderOptions::default());
    for _ in 0..3 {
        assert!(decoder.decode(&[0xf0, 0x00], 16).is_none());
        assert!(decoder.decode(&[], 0).is_none(), "empty buffer is a miss");
    }
}

#[test]
fn duplicate_terminals_follow_policy() {
    let build = |policy| {
        let mut builder = IsaBuilder::new();
        builder.format("F").field("op", 8).finish();
        builder.instruction("first", "F").select("op", 7).finish();
        builder.instruction("second", "F").select("op", 7).finish();
        builder.build_decoder_with(DecoderOptions::default().duplicate_terminals(policy))
    };

    let err = build(DuplicateTerminalPolicy::Reject).unwrap_err();
    let DecoderError::Diagnostics { phase, diagnostics } = &err else {
        panic!("expected diagnostics, got {err}");
    };
    assert_eq!(*phase, DiagnosticPhase::TreeBuild);
    assert!(
        diagnostics[0]
            .message
            .contains("decoding conflict between 'first' and 'second'"),
        "{err}"
    );

    let decoder = build(DuplicateTerminalPolicy::LastWins).expect("last wins");
    assert_eq!(decode_name(&decoder, &[7]).as_deref(), Some("second"));
    assert_eq!(decoder.warnings().len(), 1);
}

#[test]
fn conflicting_field_layouts_are_all_reported() {
    let mut builder = IsaBuilder::new();
    builder.format("A").field("op", 4).field("x", 4).finish();
    builder.format("B").field("op", 2).field("x", 6).finish();
    builder.format("C").field("x", 4).field("op", 4).finish();
    builder.instruction("a", "A").select("op", 1).finish();
    let err = builder.build_decoder().unwrap_err();
    assert!(err.diagnostics().len() >= 4, "{err}");
    assert!(err.diagnostics().iter().all(|diag| diag.is_error()));
}

#[test]
fn empty_selector_chains_fail_the_build() {
    let mut builder = IsaBuilder::new();
    builder.format("F").field("op", 8).finish();
    builder.instruction("nothing", "F").finish();
    let err = builder.build_decoder().unwrap_err();
    assert!(err.to_string().contains("validation"), "{err}");
    assert!(
        err.diagnostics()
            .iter()
            .any(|diag| diag.message == "instruction 'nothing' doesn't have a decode list")
    );
}

#[test]
fn hidden_chains_block_the_default_build() {
    let mut builder = IsaBuilder::new();
    builder.format("F").field("op", 4).field("sub", 4).finish();
    builder.instruction("any", "F").select("op", 1).finish();
    builder.instruction("narrow", "F").select("op", 1).select("sub", 2).finish();
    let (formats, instructions) = builder.build();

    let err = archdecode::isa::build_decoder(formats.clone(), instructions.clone())
        .expect_err("a chain hidden behind another terminal cannot be built");
    assert!(err.to_string().contains("decoding conflict between 'any' and 'narrow'"), "{err}");

    let decoder = archdecode::isa::build_decoder_with(
        formats,
        instructions,
        DecoderOptions::default().duplicate_terminals(DuplicateTerminalPolicy::LastWins),
    )
    .expect("last wins keeps the hidden chain");
    let narrow = decoder.instruction_by_name("narrow").expect("narrow").id;
    let word = decoder.base_encoding(narrow).expect("encode");
    assert_eq!(decode_name(&decoder, &word).as_deref(), Some("any"));
    assert!(
        decoder
            .warnings()
            .iter()
            .any(|diag| diag.code == "forest.shadowed")
    );
}
