//! Lowers type-level syntax (type aliases, unions, annotated functions and
//! variables, literals) into bytecode for a type-evaluation VM.
//!
//! ```text
//! Node ──compile──► Program (routines + storage + main) ──link──► image
//! ```

pub mod bytecode;
pub mod lang;

pub use bytecode::{CompileError, CompileResult, Compiler, LinkedProgram, Op, Program, compile_source_file};
pub use lang::node::{Node, NodeKind, TypeParameter};
