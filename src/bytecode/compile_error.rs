use thiserror::Error;

use crate::lang::node::Node;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A type reference to a name no enclosing frame declares
    #[error("compile error: cannot find name '{name}' (at {pos})")]
    UnresolvedSymbol { name: String, pos: u32 },

    /// Entering a routine for a name without a routine symbol in the current frame
    #[error("compile error: no routine declared for '{name}'")]
    UnknownRoutine { name: String },

    /// A routine was left without emitting a single instruction
    #[error("compile error: routine '{name}' is empty")]
    EmptyRoutine { name: String },

    #[error("compile error: no active routine to leave")]
    NoActiveRoutine,

    /// A node kind the lowering stage has no case for
    #[error(
        "compile error: cannot compile '{kind}' node (at {pos})\n  hint: only type-level constructs and literal initializers are lowered"
    )]
    UnhandledNodeKind { kind: &'static str, pos: u32 },

    /// Storage entries carry a 2-byte length prefix
    #[error("compile error: literal of {len} bytes exceeds the 65535 byte storage limit")]
    LiteralTooLong { len: usize },

    /// Addresses are 4 bytes wide
    #[error("compile error: program image exceeds the 4 GiB address space")]
    ImageTooLarge,

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("compile error: internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn unhandled(node: &Node) -> Self {
        CompileError::UnhandledNodeKind {
            kind: node.kind_name(),
            pos: node.pos,
        }
    }

    pub fn unresolved(name: &str, pos: u32) -> Self {
        CompileError::UnresolvedSymbol {
            name: name.to_string(),
            pos,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}
