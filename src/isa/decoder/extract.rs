//! Operand extraction for a matched instruction.

use crate::isa::bits::{BitCursor, BitExtractor, ExtractError};
use crate::isa::model::{FieldId, Format, InstructionId};

/// Dense decode result indexed by unified field id; slot 0 holds the instruction id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    slots: Vec<i64>,
}

impl FieldValues {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![0; slot_count],
        }
    }

    pub fn instruction_id(&self) -> Option<InstructionId> {
        let raw = *self.slots.first()?;
        u32::try_from(raw).ok().and_then(InstructionId::new)
    }

    /// Value extracted for `id`, zero when the decoded format does not carry the field.
    pub fn get(&self, id: FieldId) -> i64 {
        self.slots.get(id.slot()).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn reset(&mut self, slot_count: usize) {
        self.slots.clear();
        self.slots.resize(slot_count, 0);
    }

    fn set(&mut self, slot: usize, value: i64) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = value;
        }
    }
}

/// Fills `out` with every field of `format` in declaration order. `out` must already be
/// zeroed to the decoder's slot count, and `format` must have been through field unification.
pub(crate) fn extract_fields<E>(
    format: &Format,
    instruction: InstructionId,
    extractor: &E,
    buffer: &[u8],
    cursor: &mut BitCursor,
    out: &mut FieldValues,
) -> Result<(), ExtractError>
where
    E: BitExtractor + ?Sized,
{
    for field in &format.fields {
        debug_assert!(
            field.id.is_some(),
            "field '{}' reached extraction without a unified id",
            field.name
        );
        let Some(id) = field.id else {
            continue;
        };
        let value = extractor.extract(
            buffer,
            cursor,
            field.first_bit,
            field.size,
            field.is_signed(),
        )?;
        out.set(id.slot(), value);
    }
    out.set(0, i64::from(instruction.get()));
    Ok(())
}
