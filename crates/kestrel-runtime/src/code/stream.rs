//! Compressed integer streams for compiled-code debug info
//!
//! Integers are written in the UNSIGNED5 format: values below 192 take one
//! byte, larger values spill into up to four continuation bytes of 6 bits
//! each. Small offsets and indices dominate debug info, so most entries cost
//! a single byte.

use thiserror::Error;

const LG_H: u32 = 6;
const H: u32 = 1 << LG_H;
const L: u32 = (1 << 8) - H;
const MAX_LENGTH: usize = 5;

/// Bytecode index reserved for "entered through a synchronized-method lock"
pub const SYNCHRONIZATION_ENTRY_BCI: i32 = -1;

/// Debug info decoding errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DebugInfoError {
    #[error("debug info truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("metadata index {index} out of range ({len} entries)")]
    BadMetadataIndex { index: u32, len: usize },

    #[error("scope offset {offset} outside debug info ({len} bytes)")]
    BadScopeOffset { offset: u32, len: usize },

    #[error("no pc descriptor at code offset {pc_offset}")]
    MissingPcDesc { pc_offset: u32 },
}

/// Growable compressed stream
#[derive(Debug, Default, Clone)]
pub struct CompressedWriteStream {
    buffer: Vec<u8>,
}

impl CompressedWriteStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write position, used as the offset of the next record
    pub fn position(&self) -> u32 {
        debug_assert!(self.buffer.len() <= u32::MAX as usize);
        self.buffer.len() as u32
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    pub fn write_int(&mut self, value: u32) {
        let mut sum = value;
        for _ in 0..MAX_LENGTH - 1 {
            if sum < L {
                self.buffer.push(sum as u8);
                return;
            }
            sum -= L;
            self.buffer.push((L + (sum % H)) as u8);
            sum >>= LG_H;
        }
        self.buffer.push(sum as u8);
    }

    /// Bytecode indices are biased by one so the synchronization entry fits
    pub fn write_bci(&mut self, bci: i32) {
        debug_assert!(bci >= SYNCHRONIZATION_ENTRY_BCI);
        self.write_int((bci - SYNCHRONIZATION_ENTRY_BCI) as u32);
    }

    pub fn into_bytes(self) -> Box<[u8]> {
        self.buffer.into_boxed_slice()
    }
}

/// Cursor over a compressed stream
#[derive(Debug, Clone)]
pub struct CompressedReadStream<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> CompressedReadStream<'a> {
    pub fn new(buffer: &'a [u8], position: usize) -> Self {
        Self { buffer, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn read_byte(&mut self) -> Result<u32, DebugInfoError> {
        let byte = self
            .buffer
            .get(self.position)
            .copied()
            .ok_or(DebugInfoError::Truncated {
                offset: self.position,
            })?;
        self.position += 1;
        Ok(u32::from(byte))
    }

    pub fn read_int(&mut self) -> Result<u32, DebugInfoError> {
        let b0 = self.read_byte()?;
        if b0 < L {
            return Ok(b0);
        }
        let mut sum = b0;
        let mut shift = LG_H;
        for i in 1..MAX_LENGTH {
            let b = self.read_byte()?;
            sum = sum.wrapping_add(b << shift);
            if b < L || i == MAX_LENGTH - 1 {
                return Ok(sum);
            }
            shift += LG_H;
        }
        Ok(sum)
    }

    pub fn read_bci(&mut self) -> Result<i32, DebugInfoError> {
        Ok(self.read_int()? as i32 + SYNCHRONIZATION_ENTRY_BCI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_values_take_one_byte() {
        let mut out = CompressedWriteStream::new();
        out.write_int(0);
        out.write_int(191);
        assert_eq!(out.position(), 2);
    }

    #[test]
    fn test_boundary_value_spills() {
        let mut out = CompressedWriteStream::new();
        out.write_int(192);
        assert_eq!(out.position(), 2);
        let bytes = out.into_bytes();
        assert_eq!(CompressedReadStream::new(&bytes, 0).read_int(), Ok(192));
    }

    #[test]
    fn test_bci_bias() {
        let mut out = CompressedWriteStream::new();
        out.write_bci(SYNCHRONIZATION_ENTRY_BCI);
        out.write_bci(17);
        let bytes = out.into_bytes();
        let mut input = CompressedReadStream::new(&bytes, 0);
        assert_eq!(input.read_bci(), Ok(-1));
        assert_eq!(input.read_bci(), Ok(17));
    }

    #[test]
    fn test_truncated_stream() {
        let bytes = [0xFFu8];
        assert_eq!(
            CompressedReadStream::new(&bytes, 0).read_int(),
            Err(DebugInfoError::Truncated { offset: 1 })
        );
    }

    proptest! {
        #[test]
        fn prop_int_sequences_decode_in_order(values in proptest::collection::vec(any::<u32>(), 0..32)) {
            let mut out = CompressedWriteStream::new();
            for v in &values {
                out.write_int(*v);
            }
            let bytes = out.into_bytes();
            let mut input = CompressedReadStream::new(&bytes, 0);
            for v in &values {
                prop_assert_eq!(input.read_int().unwrap(), *v);
            }
            prop_assert_eq!(input.position(), bytes.len());
        }
    }
}
