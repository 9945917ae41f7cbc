use log::{debug, trace};

use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::bytecode::frame::{FrameArena, FrameId, RoutineId, SymbolKind, SymbolRef};
use crate::bytecode::op::Op;
use crate::bytecode::storage::StoragePool;

/// A single instruction stream with its source map.
#[derive(Debug, Clone, Default)]
pub struct CodeObject {
    pub ops: Vec<u8>,
    /// (byte offset of an opcode, source position), in emission order.
    pub source_map: Vec<(u32, u32)>,
}

impl CodeObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Bytecode body of one named declaration.
#[derive(Debug, Clone)]
pub struct Subroutine {
    pub name: String,
    pub kind: SymbolKind,
    pub pos: u32,
    /// Registry position; the `Call` operand until linking.
    pub index: RoutineId,
    pub code: CodeObject,
}

/// Where compilation currently stands: the innermost frame and the stack of
/// routines whose bodies are being filled.
#[derive(Debug, Clone)]
pub struct CompileContext {
    pub frame: FrameId,
    pub active: Vec<RoutineId>,
}

impl CompileContext {
    pub fn new() -> Self {
        Self {
            frame: FrameId::ROOT,
            active: Vec::new(),
        }
    }

    pub fn active_routine(&self) -> Option<RoutineId> {
        self.active.last().copied()
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything one compilation unit produces before linking.
#[derive(Debug, Default)]
pub struct Program {
    /// Code of "main".
    pub main: CodeObject,
    pub frames: FrameArena,
    /// Registry order is the order bodies are laid out in the image.
    pub routines: Vec<Subroutine>,
    pub storage: StoragePool,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routine(&self, id: RoutineId) -> &Subroutine {
        &self.routines[id.0 as usize]
    }

    // -------------------------------------------------------------------------
    // Emission
    // -------------------------------------------------------------------------

    /// The routine on top of the active stack, else main.
    fn target(&mut self, ctx: &CompileContext) -> &mut CodeObject {
        match ctx.active_routine() {
            Some(id) => &mut self.routines[id.0 as usize].code,
            None => &mut self.main,
        }
    }

    pub fn emit(&mut self, ctx: &CompileContext, op: Op, pos: u32) {
        let code = self.target(ctx);
        trace!("emit {} @{} (pos {})", op.mnemonic(), code.ops.len(), pos);
        code.source_map.push((code.ops.len() as u32, pos));
        code.ops.push(op.into());
    }

    pub fn emit_address(&mut self, ctx: &CompileContext, address: u32) {
        self.target(ctx).ops.extend_from_slice(&address.to_le_bytes());
    }

    pub fn emit_frame_slot(&mut self, ctx: &CompileContext, frame: FrameId, slot: u32) {
        let ops = &mut self.target(ctx).ops;
        ops.extend_from_slice(&frame.0.to_le_bytes());
        ops.extend_from_slice(&slot.to_le_bytes());
    }

    /// Emit a literal opcode followed by the storage offset of `payload`.
    pub fn emit_literal(&mut self, ctx: &CompileContext, op: Op, payload: &str, pos: u32) -> CompileResult<()> {
        let offset = self.storage.intern(payload)?;
        self.emit(ctx, op, pos);
        self.emit_address(ctx, offset);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scopes
    // -------------------------------------------------------------------------

    /// Open a child frame of the current one. An explicit scope emits `Frame`;
    /// an implicit one relies on an opcode that opens the frame by itself.
    pub fn enter_scope(&mut self, ctx: &mut CompileContext, explicit: bool, pos: u32) -> FrameId {
        if explicit {
            self.emit(ctx, Op::Frame, pos);
        }
        ctx.frame = self.frames.push_child(ctx.frame);
        ctx.frame
    }

    /// Return to the parent frame. Leaving the root is a no-op.
    pub fn leave_scope(&mut self, ctx: &mut CompileContext) {
        if let Some(parent) = self.frames.parent(ctx.frame) {
            ctx.frame = parent;
        }
    }

    pub fn declare_symbol(
        &mut self,
        ctx: &CompileContext,
        name: &str,
        kind: SymbolKind,
        pos: u32,
        frame: Option<FrameId>,
    ) -> SymbolRef {
        self.frames.declare(frame.unwrap_or(ctx.frame), name, kind, pos)
    }

    pub fn resolve_symbol(&self, ctx: &CompileContext, name: &str, pos: u32) -> CompileResult<SymbolRef> {
        self.frames
            .resolve(ctx.frame, name)
            .ok_or_else(|| CompileError::unresolved(name, pos))
    }

    // -------------------------------------------------------------------------
    // Subroutines
    // -------------------------------------------------------------------------

    /// Declare `name` and give it a routine unless it already has one.
    pub fn declare_routine(
        &mut self,
        ctx: &CompileContext,
        name: &str,
        kind: SymbolKind,
        pos: u32,
        frame: Option<FrameId>,
    ) -> SymbolRef {
        let symbol = self.declare_symbol(ctx, name, kind, pos, frame);
        self.attach_routine(symbol);
        symbol
    }

    /// Like [`Self::declare_routine`], ahead of the walker reaching the declaration.
    pub fn hoist_routine(&mut self, ctx: &CompileContext, name: &str, kind: SymbolKind, pos: u32) -> SymbolRef {
        let symbol = self.frames.hoist(ctx.frame, name, kind, pos);
        self.attach_routine(symbol);
        symbol
    }

    fn attach_routine(&mut self, symbol: SymbolRef) {
        if self.frames.symbol(symbol).routine.is_some() {
            return;
        }

        let index = RoutineId(self.routines.len() as u32);
        let s = self.frames.symbol(symbol);
        debug!("routine &{} declared for '{}' in frame {}", index.0, s.name, s.frame);
        self.routines.push(Subroutine {
            name: s.name.clone(),
            kind: s.kind,
            pos: s.pos,
            index,
            code: CodeObject::new(),
        });
        self.frames.symbol_mut(symbol).routine = Some(index);
    }

    /// Make the routine of `name` (declared in the current frame) the emission
    /// target. Opens an implicit frame: calling a routine creates one in the VM.
    pub fn enter_routine(&mut self, ctx: &mut CompileContext, name: &str) -> CompileResult<RoutineId> {
        let routine = self
            .frames
            .lookup_local(ctx.frame, name)
            .and_then(|s| self.frames.symbol(s).routine)
            .ok_or_else(|| CompileError::UnknownRoutine {
                name: name.to_string(),
            })?;

        let pos = self.routine(routine).pos;
        self.enter_scope(ctx, false, pos);
        ctx.active.push(routine);
        debug!("entering routine &{} '{}'", routine.0, name);
        Ok(routine)
    }

    /// Close the active routine with `Return`.
    pub fn leave_routine(&mut self, ctx: &mut CompileContext, pos: u32) -> CompileResult<()> {
        let routine = ctx.active_routine().ok_or(CompileError::NoActiveRoutine)?;
        if self.routine(routine).code.is_empty() {
            return Err(CompileError::EmptyRoutine {
                name: self.routine(routine).name.clone(),
            });
        }

        self.leave_scope(ctx);
        self.emit(ctx, Op::Return, pos);
        ctx.active.pop();
        debug!(
            "routine &{} '{}' done, {} bytes",
            routine.0,
            self.routine(routine).name,
            self.routine(routine).code.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emission_goes_to_main_without_routine() {
        let mut program = Program::new();
        let ctx = CompileContext::new();
        program.emit(&ctx, Op::Number, 3);
        assert_eq!(program.main.ops, vec![Op::Number as u8]);
        assert_eq!(program.main.source_map, vec![(0, 3)]);
    }

    #[test]
    fn test_explicit_scope_emits_frame() {
        let mut program = Program::new();
        let mut ctx = CompileContext::new();
        let inner = program.enter_scope(&mut ctx, true, 0);
        assert_eq!(ctx.frame, inner);
        assert_eq!(program.main.ops, vec![Op::Frame as u8]);

        program.enter_scope(&mut ctx, false, 0);
        assert_eq!(program.main.ops.len(), 1);
    }

    #[test]
    fn test_leave_scope_at_root_is_noop() {
        let mut program = Program::new();
        let mut ctx = CompileContext::new();
        program.enter_scope(&mut ctx, false, 0);
        program.leave_scope(&mut ctx);
        program.leave_scope(&mut ctx);
        program.leave_scope(&mut ctx);
        assert_eq!(ctx.frame, FrameId::ROOT);
    }

    #[test]
    fn test_routine_body_is_private() {
        let mut program = Program::new();
        let mut ctx = CompileContext::new();
        program.declare_routine(&ctx, "A", SymbolKind::Type, 0, None);
        let id = program.enter_routine(&mut ctx, "A").unwrap();
        program.emit(&ctx, Op::String, 1);
        program.leave_routine(&mut ctx, 1).unwrap();

        assert!(program.main.is_empty());
        assert_eq!(
            program.routine(id).code.ops,
            vec![Op::String as u8, Op::Return as u8]
        );
        assert_eq!(ctx.frame, FrameId::ROOT);
        assert!(ctx.active.is_empty());
    }

    #[test]
    fn test_nested_routines_stack() {
        let mut program = Program::new();
        let mut ctx = CompileContext::new();
        program.declare_routine(&ctx, "Outer", SymbolKind::Type, 0, None);
        let outer = program.enter_routine(&mut ctx, "Outer").unwrap();
        program.emit(&ctx, Op::Boolean, 0);

        program.declare_routine(&ctx, "Inner", SymbolKind::Type, 0, None);
        let inner = program.enter_routine(&mut ctx, "Inner").unwrap();
        program.emit(&ctx, Op::Number, 0);
        program.leave_routine(&mut ctx, 0).unwrap();

        program.emit(&ctx, Op::Union, 0);
        program.leave_routine(&mut ctx, 0).unwrap();

        assert_eq!(program.routine(inner).code.len(), 2);
        assert_eq!(
            program.routine(outer).code.ops,
            vec![Op::Boolean as u8, Op::Union as u8, Op::Return as u8]
        );
    }

    #[test]
    fn test_declare_routine_twice_keeps_one_entry() {
        let mut program = Program::new();
        let ctx = CompileContext::new();
        let a = program.declare_routine(&ctx, "A", SymbolKind::Type, 0, None);
        let b = program.declare_routine(&ctx, "A", SymbolKind::Type, 9, None);
        assert_eq!(a, b);
        assert_eq!(program.routines.len(), 1);
        assert_eq!(program.frames.symbol(a).declarations, 2);
    }

    #[test]
    fn test_routine_errors() {
        let mut program = Program::new();
        let mut ctx = CompileContext::new();

        assert_eq!(
            program.enter_routine(&mut ctx, "Missing"),
            Err(CompileError::UnknownRoutine {
                name: "Missing".to_string()
            })
        );
        assert_eq!(
            program.leave_routine(&mut ctx, 0),
            Err(CompileError::NoActiveRoutine)
        );

        program.declare_routine(&ctx, "Empty", SymbolKind::Type, 0, None);
        program.enter_routine(&mut ctx, "Empty").unwrap();
        assert_eq!(
            program.leave_routine(&mut ctx, 0),
            Err(CompileError::EmptyRoutine {
                name: "Empty".to_string()
            })
        );
    }

    #[test]
    fn test_plain_symbol_is_not_a_routine() {
        let mut program = Program::new();
        let mut ctx = CompileContext::new();
        program.declare_symbol(&ctx, "T", SymbolKind::TypeVariable, 0, None);
        assert!(matches!(
            program.enter_routine(&mut ctx, "T"),
            Err(CompileError::UnknownRoutine { .. })
        ));
    }

    #[test]
    fn test_frame_slot_operand() {
        let mut program = Program::new();
        let ctx = CompileContext::new();
        program.emit(&ctx, Op::Loads, 0);
        program.emit_frame_slot(&ctx, FrameId(3), 1);
        assert_eq!(program.main.ops, vec![Op::Loads as u8, 3, 0, 0, 0, 1, 0, 0, 0]);
    }
}
