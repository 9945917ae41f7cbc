pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod frame;
pub mod link;
pub mod op;
pub mod program;
pub mod storage;

pub use compile::{Compiler, compile_source_file};
pub use compile_error::{CompileError, CompileResult};
pub use link::LinkedProgram;
pub use op::Op;
pub use program::{CompileContext, Program};
