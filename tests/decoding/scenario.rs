use archdecode::isa::{Decoder, IsaBuilder};
use hex_literal::hex;

fn r_and_i() -> Decoder {
    let mut builder = IsaBuilder::new();
    builder
        .format("R")
        .field("op", 6)
        .field("rs", 5)
        .field("rt", 5)
        .field("rd", 5)
        .gap(5)
        .field("func", 6)
        .finish();
    builder
        .format("I")
        .field("op", 6)
        .field("rs", 5)
        .field("rt", 5)
        .field("imm", 16)
        .finish();
    builder
        .instruction("ADD", "R")
        .select("op", 0)
        .select("func", 32)
        .finish();
    builder.instruction("ADDI", "I").select("op", 8).finish();
    builder.build_decoder().expect("build R/I decoder")
}

#[test]
fn decodes_add_and_addi_operands() {
    let decoder = r_and_i();
    let id = |name: &str| decoder.instruction_by_name(name).expect("instruction").id;
    let field = |name: &str| decoder.field_id(name).expect("field");

    let add = decoder.decode(&hex!("00 22 18 20"), 32).expect("ADD decodes");
    assert_eq!(add.instruction, id("ADD"));
    assert_eq!(add.value(field("rs")), 1);
    assert_eq!(add.value(field("rt")), 2);
    assert_eq!(add.value(field("rd")), 3);
    assert_eq!(add.value(field("func")), 32);

    let addi = decoder.decode(&hex!("20 22 00 64"), 32).expect("ADDI decodes");
    assert_eq!(addi.instruction, id("ADDI"));
    assert_eq!(addi.value(field("rs")), 1);
    assert_eq!(addi.value(field("rt")), 2);
    assert_eq!(addi.value(field("imm")), 100);
    assert_eq!(addi.value(field("rd")), 0, "rd is not part of the I format");
}

#[test]
fn result_slots_cover_every_unified_field() {
    let decoder = r_and_i();
    // op rs rt rd func imm
    assert_eq!(decoder.field_count(), 6);
    let decoded = decoder.decode(&hex!("20 22 00 64"), 32).expect("ADDI decodes");
    assert_eq!(decoded.fields.len(), decoder.field_count() + 1);
    assert_eq!(decoded.fields.as_slice()[0], i64::from(decoded.instruction.get()));
}

#[test]
fn instruction_ids_follow_declaration_order() {
    let decoder = r_and_i();
    let ids: Vec<u32> = decoder
        .instructions()
        .iter()
        .map(|instr| instr.id.get())
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(decoder.instructions().iter().all(|instr| instr.size == 4));
}

#[test]
fn tree_dump_shows_shared_op_level() {
    let decoder = r_and_i();
    assert_eq!(
        decoder.dump_tree(),
        "op == 0\n    func == 32 -> ADD\nop == 8 -> ADDI\n"
    );
}
