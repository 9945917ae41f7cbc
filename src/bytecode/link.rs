//! Final assembly of a [`Program`] into one binary image:
//!
//! ```text
//! [Jump main] [storage: (u16 len, bytes)*] [routine bodies] [main]
//! ```
//!
//! Linking is split into [`layout`], which decides every address, and
//! [`relocate_calls`], which rewrites `Call` operands from registry indices
//! to those addresses. Operands are fixed width, so rewriting never moves a
//! byte and the layout stays valid.

use log::debug;

use crate::bytecode::{
    compile_error::{CompileError, CompileResult},
    frame::{RoutineId, SymbolKind},
    op::{Op, read_u32, write_u32_at},
    program::{Program, Subroutine},
    storage::{HEADER_LEN, StorageItem, StoragePool},
};

/// Addresses of everything in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// 0 when the image has neither storage nor routines.
    pub header_len: u32,
    /// Indexed by registry index.
    pub routine_addresses: Vec<u32>,
    pub main_address: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedRoutine {
    pub name: String,
    pub kind: SymbolKind,
    pub index: RoutineId,
    pub address: u32,
    pub len: u32,
}

/// A linked image plus what listings need to make sense of it.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub bytes: Vec<u8>,
    pub main_address: u32,
    pub routines: Vec<LinkedRoutine>,
    pub storage: Vec<StorageItem>,
    /// (image offset of an opcode, source position), sorted by offset.
    pub source_map: Vec<(u32, u32)>,
}

impl LinkedProgram {
    pub fn routine_at(&self, address: u32) -> Option<&LinkedRoutine> {
        self.routines.iter().find(|r| r.address == address)
    }

    pub fn storage_at(&self, offset: u32) -> Option<&str> {
        self.storage
            .iter()
            .find(|item| item.offset == offset)
            .map(|item| item.payload.as_str())
    }

    pub fn main(&self) -> &[u8] {
        &self.bytes[self.main_address as usize..]
    }
}

fn to_address(value: u64) -> CompileResult<u32> {
    u32::try_from(value).map_err(|_| CompileError::ImageTooLarge)
}

/// Assign final addresses: header, then storage, then routines in registry order.
pub fn layout(storage: &StoragePool, routines: &[Subroutine]) -> CompileResult<Layout> {
    let header_len = if storage.is_empty() && routines.is_empty() {
        0
    } else {
        HEADER_LEN
    };

    let mut address = header_len as u64 + storage.byte_len() as u64;
    let mut routine_addresses = Vec::with_capacity(routines.len());
    for routine in routines {
        routine_addresses.push(to_address(address)?);
        address += routine.code.len() as u64;
    }

    Ok(Layout {
        header_len,
        routine_addresses,
        main_address: to_address(address)?,
    })
}

/// Copy of `ops` with every `Call` operand replaced by the address its
/// registry index maps to. The result has the same length as `ops`.
pub fn relocate_calls(ops: &[u8], addresses: &[u32]) -> CompileResult<Vec<u8>> {
    let mut out = ops.to_vec();
    let mut ip = 0;

    while ip < out.len() {
        let op = Op::try_from(out[ip]).map_err(|byte| {
            CompileError::internal(format!("unknown opcode 0x{:02x} at {}", byte, ip))
        })?;
        let end = ip + 1 + op.operand_width();
        if end > out.len() {
            return Err(CompileError::internal(format!(
                "truncated {} operand at {}",
                op.mnemonic(),
                ip
            )));
        }

        if op == Op::Call {
            let index = read_u32(&out, ip + 1).unwrap_or_default();
            let address = addresses.get(index as usize).ok_or_else(|| {
                CompileError::internal(format!("call to unregistered routine &{} at {}", index, ip))
            })?;
            write_u32_at(&mut out, ip + 1, *address);
        }

        ip = end;
    }

    Ok(out)
}

impl Program {
    /// Lay out, relocate and concatenate everything into one image.
    pub fn link(self) -> CompileResult<LinkedProgram> {
        let layout = layout(&self.storage, &self.routines)?;
        debug!(
            "link: header {} bytes, storage {} bytes, {} routine(s), main at {}",
            layout.header_len,
            self.storage.byte_len(),
            self.routines.len(),
            layout.main_address
        );

        let total = layout.main_address as usize + self.main.len();
        to_address(total as u64)?;
        let mut bytes = Vec::with_capacity(total);
        let mut source_map = Vec::new();

        if layout.header_len > 0 {
            bytes.push(Op::Jump.into());
            bytes.extend_from_slice(&[0; 4]);
        }

        for item in self.storage.items() {
            bytes.extend_from_slice(&(item.payload.len() as u16).to_le_bytes());
            bytes.extend_from_slice(item.payload.as_bytes());
        }

        let mut routines = Vec::with_capacity(self.routines.len());
        for (routine, &address) in self.routines.iter().zip(&layout.routine_addresses) {
            if bytes.len() != address as usize {
                return Err(CompileError::internal(format!(
                    "routine '{}' expected at {}, image is {} bytes",
                    routine.name,
                    address,
                    bytes.len()
                )));
            }
            let code = relocate_calls(&routine.code.ops, &layout.routine_addresses)?;
            bytes.extend_from_slice(&code);
            source_map.extend(
                routine
                    .code
                    .source_map
                    .iter()
                    .map(|&(offset, pos)| (address + offset, pos)),
            );
            routines.push(LinkedRoutine {
                name: routine.name.clone(),
                kind: routine.kind,
                index: routine.index,
                address,
                len: code.len() as u32,
            });
        }

        if bytes.len() != layout.main_address as usize {
            return Err(CompileError::internal(format!(
                "main expected at {}, image is {} bytes",
                layout.main_address,
                bytes.len()
            )));
        }
        let main = relocate_calls(&self.main.ops, &layout.routine_addresses)?;
        bytes.extend_from_slice(&main);
        source_map.extend(
            self.main
                .source_map
                .iter()
                .map(|&(offset, pos)| (layout.main_address + offset, pos)),
        );

        if layout.header_len > 0 {
            write_u32_at(&mut bytes, 1, layout.main_address);
        }

        Ok(LinkedProgram {
            bytes,
            main_address: layout.main_address,
            routines,
            storage: self.storage.items().to_vec(),
            source_map,
        })
    }

    /// The binary image only.
    pub fn build(self) -> CompileResult<Vec<u8>> {
        Ok(self.link()?.bytes)
    }
}
