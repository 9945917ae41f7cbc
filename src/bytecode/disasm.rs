use std::fmt;

use crate::bytecode::link::LinkedProgram;
use crate::bytecode::op::{Op, read_u16, read_u32};
use crate::bytecode::storage::HEADER_LEN;

/// Listing of a linked image; print it with `{}`.
pub struct Disassembly<'a>(pub &'a LinkedProgram);

/// Render the listing of a linked image.
pub fn disassemble(linked: &LinkedProgram) -> String {
    Disassembly(linked).to_string()
}

/// Print disassembly of a linked image
pub fn print_bc(linked: &LinkedProgram) {
    println!("=== TYPE BYTECODE ({} bytes) ===\n", linked.bytes.len());
    print!("{}", Disassembly(linked));
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let linked = self.0;
        let bytes = &linked.bytes;

        if linked.main_address > 0 {
            let target = read_u32(bytes, 1).unwrap_or_default();
            line(f, 0, Op::Jump.mnemonic(), &format!("→ {:04}", target))?;

            let mut at = HEADER_LEN as usize;
            let storage_end = linked
                .routines
                .first()
                .map_or(linked.main_address, |r| r.address) as usize;
            while at < storage_end {
                let Some(len) = read_u16(bytes, at) else { break };
                let start = at + 2;
                let payload = bytes
                    .get(start..start + len as usize)
                    .map(String::from_utf8_lossy)
                    .unwrap_or_default();
                line(f, at, "STORAGE", &format!("{:?}", payload))?;
                at = start + len as usize;
            }
        }

        for routine in &linked.routines {
            writeln!(f, "════════════════════════════════════════")?;
            writeln!(
                f,
                " &{} {} ({:?}), {} bytes",
                routine.index.0, routine.name, routine.kind, routine.len
            )?;
            writeln!(f, "════════════════════════════════════════")?;
            let start = routine.address as usize;
            disassemble_range(f, linked, start, start + routine.len as usize)?;
        }

        writeln!(f, "════════════════════════════════════════")?;
        writeln!(f, " main, {} bytes", linked.main().len())?;
        writeln!(f, "════════════════════════════════════════")?;
        disassemble_range(f, linked, linked.main_address as usize, bytes.len())
    }
}

fn disassemble_range(f: &mut fmt::Formatter<'_>, linked: &LinkedProgram, start: usize, end: usize) -> fmt::Result {
    let bytes = &linked.bytes;
    let mut ip = start;

    while ip < end {
        let op = match Op::try_from(bytes[ip]) {
            Ok(op) => op,
            Err(byte) => return line(f, ip, "??", &format!("0x{:02x}", byte)),
        };

        let operand = match op {
            Op::Call => {
                let address = read_u32(bytes, ip + 1).unwrap_or_default();
                match linked.routine_at(address) {
                    Some(r) => format!("&{} ; {}", address, r.name),
                    None => format!("&{} ; <no routine>", address),
                }
            }
            Op::Loads => {
                let frame = read_u32(bytes, ip + 1).unwrap_or_default();
                let slot = read_u32(bytes, ip + 5).unwrap_or_default();
                format!("#{}:{}", frame, slot)
            }
            Op::NumberLiteral | Op::BigIntLiteral | Op::StringLiteral => {
                let offset = read_u32(bytes, ip + 1).unwrap_or_default();
                format!("{:?}", linked.storage_at(offset).unwrap_or("!unknown"))
            }
            Op::Jump => format!("→ {:04}", read_u32(bytes, ip + 1).unwrap_or_default()),
            _ => String::new(),
        };
        line(f, ip, op.mnemonic(), &operand)?;

        ip += 1 + op.operand_width();
    }

    Ok(())
}

fn line(f: &mut fmt::Formatter<'_>, at: usize, mnemonic: &str, operand: &str) -> fmt::Result {
    if operand.is_empty() {
        writeln!(f, "{:04}   {}", at, mnemonic)
    } else {
        writeln!(f, "{:04}   {:<12}{}", at, mnemonic, operand)
    }
}
