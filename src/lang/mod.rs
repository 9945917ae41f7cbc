//! # Type-level syntax tree
//!
//! This module defines the tree the lowering stage consumes. It is produced
//! by an external parser and only ever read here.
//!
//! ## Conventions
//!
//! - Every node carries the source position (`pos`) of its first token.
//! - Declarations carry their name as plain text; a missing name means the
//!   parser saw a non-identifier binding (destructuring, computed name).

pub mod node;
