//! Core data model handed over by the description parser: fields, formats, selector chains and
//! instructions.

use std::fmt;
use std::num::NonZeroU32;

use bitflags::bitflags;
use smallvec::SmallVec;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u8 {
        const SIGNED   = 0b01;
        const CONSTANT = 0b10; // literal bits synthesized from the format layout
    }
}

/// Unified identifier shared by same-named fields across formats.
///
/// Identifiers start at 1; slot 0 of a decode result is reserved for the instruction id, so a
/// `FieldId` doubles as the index of the field's value in [`FieldValues`](super::FieldValues).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(NonZeroU32);

impl FieldId {
    pub fn from_index(index: usize) -> Self {
        let raw = NonZeroU32::new((index as u32) + 1).expect("field index overflow");
        Self(raw)
    }

    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    /// Position of this field's value inside a decode result.
    pub fn slot(self) -> usize {
        self.0.get() as usize
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionId(NonZeroU32);

impl InstructionId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, sized sub-range of a format's bits.
///
/// `first_bit` is the offset of the field's most significant bit, counted from the most
/// significant bit of the instruction's first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub size: u32,
    pub first_bit: u32,
    pub flags: FieldFlags,
    pub value: i64,
    pub id: Option<FieldId>,
}

impl Field {
    pub fn new(name: impl Into<String>, size: u32, first_bit: u32) -> Self {
        Self {
            name: name.into(),
            size,
            first_bit,
            flags: FieldFlags::empty(),
            value: 0,
            id: None,
        }
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.flags.set(FieldFlags::SIGNED, signed);
        self
    }

    pub fn with_constant(mut self, value: i64) -> Self {
        self.flags.insert(FieldFlags::CONSTANT);
        self.value = value;
        self
    }

    pub fn is_signed(&self) -> bool {
        self.flags.contains(FieldFlags::SIGNED)
    }

    pub fn constant(&self) -> Option<i64> {
        self.flags
            .contains(FieldFlags::CONSTANT)
            .then_some(self.value)
    }

    /// Exclusive end offset of the field inside the instruction. Widened so an out-of-range
    /// layout reports as such instead of wrapping.
    pub fn end_bit(&self) -> u64 {
        u64::from(self.first_bit) + u64::from(self.size)
    }

    /// Returns true when `value` is representable in this field.
    pub fn fits(&self, value: i64) -> bool {
        if self.size == 0 {
            return value == 0;
        }
        if self.size >= 64 {
            return true;
        }
        if self.is_signed() {
            let min = -(1i64 << (self.size - 1));
            let max = (1i64 << (self.size - 1)) - 1;
            (min..=max).contains(&value)
        } else {
            value >= 0 && (value as u64) >> self.size == 0
        }
    }
}

/// Named bit layout shared by one or more instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub name: String,
    pub bits: u32,
    pub fields: Vec<Field>,
}

impl Format {
    pub fn new(name: impl Into<String>, bits: u32) -> Self {
        Self {
            name: name.into(),
            bits,
            fields: Vec::new(),
        }
    }

    pub fn with_fields(name: impl Into<String>, bits: u32, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            bits,
            fields,
        }
    }

    pub fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn size_bytes(&self) -> u32 {
        self.bits / 8
    }
}

/// One `field == value` predicate of a selector chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub field: String,
    pub value: i64,
}

impl Selector {
    pub fn new(field: impl Into<String>, value: i64) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

/// Ordered predicates that identify an instruction inside the decode forest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorChain(SmallVec<[Selector; 4]>);

impl SelectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, selector: Selector) {
        self.0.push(selector);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selector> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|selector| selector.field == field)
            .map(|selector| selector.value)
    }
}

impl FromIterator<Selector> for SelectorChain {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SelectorChain {
    type Item = &'a Selector;
    type IntoIter = std::slice::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for SelectorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, selector) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", selector.field, selector.value)?;
        }
        Ok(())
    }
}

/// Branch/jump metadata. Carried for downstream generators, never interpreted here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlow {
    pub cond: Option<String>,
    pub target: Option<String>,
    pub delay_slots: u32,
    pub delay_slot_cond: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub id: InstructionId,
    pub name: String,
    pub mnemonic: String,
    pub asm: String,
    pub format: String,
    /// Byte size, filled in from the owning format when the decoder is built.
    pub size: u32,
    pub cycles: u32,
    pub min_latency: u32,
    pub max_latency: u32,
    pub selectors: SelectorChain,
    pub control_flow: Option<ControlFlow>,
}

impl Instruction {
    pub fn new(id: InstructionId, name: impl Into<String>, format: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            mnemonic: name.clone(),
            name,
            asm: String::new(),
            format: format.into(),
            size: 0,
            cycles: 1,
            min_latency: 1,
            max_latency: 1,
            selectors: SelectorChain::new(),
            control_flow: None,
        }
    }

    pub fn select(mut self, field: impl Into<String>, value: i64) -> Self {
        self.selectors.push(Selector::new(field, value));
        self
    }
}
