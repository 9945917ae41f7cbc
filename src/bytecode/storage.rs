use std::collections::HashMap;

use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::bytecode::op::ADDRESS_WIDTH;

/// Leading `Jump` opcode plus its address operand.
pub const HEADER_LEN: u32 = 1 + ADDRESS_WIDTH as u32;

/// Each storage entry is prefixed with its length as a u16.
pub const LENGTH_PREFIX: u32 = 2;

/// A literal payload and its absolute offset in the final image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageItem {
    pub payload: String,
    pub offset: u32,
}

/// Deduplicated literal pool.
///
/// Offsets are absolute image offsets: the pool sits directly behind the
/// program header, so the first entry lands at [`HEADER_LEN`].
#[derive(Debug, Default)]
pub struct StoragePool {
    items: Vec<StorageItem>,
    by_payload: HashMap<String, u32>,
    /// Offset the next new entry gets; 0 until the header is reserved.
    next_offset: u32,
}

impl StoragePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `payload`, appending it if this is the first time it is seen.
    pub fn intern(&mut self, payload: &str) -> CompileResult<u32> {
        if let Some(&offset) = self.by_payload.get(payload) {
            return Ok(offset);
        }

        if payload.len() > u16::MAX as usize {
            return Err(CompileError::LiteralTooLong { len: payload.len() });
        }

        if self.next_offset == 0 {
            self.next_offset = HEADER_LEN;
        }

        let offset = self.next_offset;
        self.next_offset = offset
            .checked_add(LENGTH_PREFIX + payload.len() as u32)
            .ok_or(CompileError::ImageTooLarge)?;

        self.items.push(StorageItem {
            payload: payload.to_string(),
            offset,
        });
        self.by_payload.insert(payload.to_string(), offset);
        Ok(offset)
    }

    /// Reverse lookup, only used for listings.
    pub fn find_by_offset(&self, offset: u32) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.offset == offset)
            .map(|item| item.payload.as_str())
    }

    pub fn items(&self) -> &[StorageItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Bytes the pool occupies in the image, excluding the header.
    pub fn byte_len(&self) -> u32 {
        self.items
            .iter()
            .map(|item| LENGTH_PREFIX + item.payload.len() as u32)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_entry_follows_header() {
        let mut pool = StoragePool::new();
        assert_eq!(pool.intern("42").unwrap(), 5);
    }

    #[test]
    fn test_same_payload_is_stored_once() {
        let mut pool = StoragePool::new();
        let a = pool.intern("hello").unwrap();
        let b = pool.intern("hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.byte_len(), 7);
    }

    #[test]
    fn test_distinct_payloads_do_not_overlap() {
        let mut pool = StoragePool::new();
        let a = pool.intern("ab").unwrap();
        let b = pool.intern("xyz").unwrap();
        let c = pool.intern("").unwrap();
        assert_eq!(a, 5);
        assert_eq!(b, a + 2 + 2);
        assert_eq!(c, b + 2 + 3);
        assert_eq!(pool.byte_len(), 4 + 5 + 2);
    }

    #[test]
    fn test_find_by_offset() {
        let mut pool = StoragePool::new();
        pool.intern("1").unwrap();
        let offset = pool.intern("two").unwrap();
        assert_eq!(pool.find_by_offset(offset), Some("two"));
        assert_eq!(pool.find_by_offset(offset + 1), None);
    }

    #[test]
    fn test_oversized_literal() {
        let mut pool = StoragePool::new();
        let big = "x".repeat(u16::MAX as usize + 1);
        assert_eq!(
            pool.intern(&big),
            Err(CompileError::LiteralTooLong { len: 65536 })
        );
        assert!(pool.is_empty());
    }
}
