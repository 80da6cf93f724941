//! Bit-level access to instruction buffers.
//!
//! The decoder only ever sees an already-normalized, MSB-first bit-addressable buffer: bit 0 is
//! the most significant bit of byte 0. Hosts that fetch words in another byte order normalize
//! them first (see [`Endianness::normalize`]) or plug their own [`BitExtractor`] in.

use std::fmt;

pub const MAX_FIELD_BITS: u32 = 64;

pub(crate) fn mask_for_width(width: u32) -> u64 {
    if width == 0 {
        0
    } else if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Sign-extends the low `width` bits of `value`.
pub fn sign_extend(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    InvalidWidth { size: u32 },
    ShortBuffer { needed_bits: usize, available_bits: usize },
    ValueTooWide { value: i64, size: u32 },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::InvalidWidth { size } => {
                write!(f, "field width {size} outside 1..={MAX_FIELD_BITS}")
            }
            ExtractError::ShortBuffer {
                needed_bits,
                available_bits,
            } => write!(
                f,
                "field needs {needed_bits} bits but only {available_bits} are available"
            ),
            ExtractError::ValueTooWide { value, size } => {
                write!(f, "value {value} does not fit within {size} bits")
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Tracks how much of an instruction buffer may be read and how much has been touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitCursor {
    available: usize,
    consumed: usize,
}

impl BitCursor {
    pub fn new(available_bits: usize) -> Self {
        Self {
            available: available_bits,
            consumed: 0,
        }
    }

    pub fn available(&self) -> usize {
        self.available
    }

    /// Highest exclusive bit offset read so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.available.saturating_sub(self.consumed)
    }

    /// Records a read of bits up to `end_bit` (exclusive), failing if it passes the window.
    pub fn claim(&mut self, end_bit: usize) -> Result<(), ExtractError> {
        if end_bit > self.available {
            return Err(ExtractError::ShortBuffer {
                needed_bits: end_bit,
                available_bits: self.available,
            });
        }
        self.consumed = self.consumed.max(end_bit);
        Ok(())
    }
}

/// Host-supplied primitive that pulls one field out of an instruction buffer.
///
/// Implementations consume `size` bits starting `first_bit` bits from the most significant end
/// of the instruction, update `cursor`, and sign-extend when `signed` is set.
pub trait BitExtractor {
    fn extract(
        &self,
        buffer: &[u8],
        cursor: &mut BitCursor,
        first_bit: u32,
        size: u32,
        signed: bool,
    ) -> Result<i64, ExtractError>;
}

impl<F> BitExtractor for F
where
    F: Fn(&[u8], &mut BitCursor, u32, u32, bool) -> Result<i64, ExtractError>,
{
    fn extract(
        &self,
        buffer: &[u8],
        cursor: &mut BitCursor,
        first_bit: u32,
        size: u32,
        signed: bool,
    ) -> Result<i64, ExtractError> {
        self(buffer, cursor, first_bit, size, signed)
    }
}

/// Default extractor over an MSB-first byte buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsbFirst;

impl BitExtractor for MsbFirst {
    fn extract(
        &self,
        buffer: &[u8],
        cursor: &mut BitCursor,
        first_bit: u32,
        size: u32,
        signed: bool,
    ) -> Result<i64, ExtractError> {
        if size == 0 || size > MAX_FIELD_BITS {
            return Err(ExtractError::InvalidWidth { size });
        }
        let start = first_bit as usize;
        let end = start + size as usize;
        if end > buffer.len() * 8 {
            return Err(ExtractError::ShortBuffer {
                needed_bits: end,
                available_bits: buffer.len() * 8,
            });
        }
        cursor.claim(end)?;
        let raw = read_msb(buffer, start, size);
        Ok(if signed {
            sign_extend(raw, size)
        } else {
            raw as i64
        })
    }
}

fn read_msb(buffer: &[u8], start: usize, size: u32) -> u64 {
    let end = start + size as usize;
    let first_byte = start / 8;
    let last_byte = (end - 1) / 8;
    // 64 bits at any alignment span at most nine bytes.
    let mut acc = 0u128;
    for byte in &buffer[first_byte..=last_byte] {
        acc = (acc << 8) | u128::from(*byte);
    }
    acc >>= (last_byte + 1) * 8 - end;
    (acc as u64) & mask_for_width(size)
}

/// Writes `value` into `size` bits starting at `first_bit` (MSB-first), leaving other bits
/// untouched. Inverse of [`MsbFirst`]; used to build reference encodings.
pub fn encode_bits(
    buffer: &mut [u8],
    first_bit: u32,
    size: u32,
    signed: bool,
    value: i64,
) -> Result<(), ExtractError> {
    if size == 0 || size > MAX_FIELD_BITS {
        return Err(ExtractError::InvalidWidth { size });
    }
    if !value_fits(value, size, signed) {
        return Err(ExtractError::ValueTooWide { value, size });
    }
    let end = first_bit as usize + size as usize;
    if end > buffer.len() * 8 {
        return Err(ExtractError::ShortBuffer {
            needed_bits: end,
            available_bits: buffer.len() * 8,
        });
    }
    let raw = (value as u64) & mask_for_width(size);
    for offset in 0..size {
        let bit = ((raw >> (size - 1 - offset)) & 1) as u8;
        let position = (first_bit + offset) as usize;
        let shift = 7 - (position % 8);
        let byte = &mut buffer[position / 8];
        *byte = (*byte & !(1 << shift)) | (bit << shift);
    }
    Ok(())
}

fn value_fits(value: i64, size: u32, signed: bool) -> bool {
    if size >= 64 {
        return true;
    }
    if signed {
        let bound = 1i64 << (size - 1);
        (-bound..bound).contains(&value)
    } else {
        value >= 0 && (value as u64) >> size == 0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    #[inline(always)]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    /// Rewrites a fetched byte stream into the MSB-first order expected by [`MsbFirst`].
    /// Little-endian words of `word_bytes` bytes are byte-swapped; a trailing partial word is
    /// swapped on its own.
    pub fn normalize(self, bytes: &[u8], word_bytes: usize) -> Vec<u8> {
        let mut out = bytes.to_vec();
        if self == Endianness::Big || word_bytes <= 1 {
            return out;
        }
        for chunk in out.chunks_mut(word_bytes) {
            chunk.reverse();
        }
        out
    }
}
