use log::{debug, warn};

use crate::{
    bytecode::{
        compile_error::{CompileError, CompileResult},
        frame::{SymbolKind, SymbolRef},
        op::Op,
        program::{CompileContext, Program},
    },
    lang::node::{Node, NodeKind, TypeParameter},
};

/// Lowers a type-level syntax tree into a [`Program`].
pub struct Compiler {
    program: Program,
    ctx: CompileContext,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            program: Program::new(),
            ctx: CompileContext::new(),
        }
    }

    /// Compile `root` (usually a source file) and hand back the unlinked program.
    pub fn compile(mut self, root: &Node) -> CompileResult<Program> {
        self.compile_node(root)?;

        if !self.ctx.active.is_empty() {
            return Err(CompileError::internal(format!(
                "{} routine(s) still active after compilation",
                self.ctx.active.len()
            )));
        }

        Ok(self.program)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn compile_node(&mut self, node: &Node) -> CompileResult<()> {
        let pos = node.pos;

        match &node.kind {
            NodeKind::SourceFile { statements } => {
                self.hoist_declarations(statements);
                for statement in statements {
                    self.compile_node(statement)?;
                }
            }

            NodeKind::VariableStatement { declarations } => {
                for declaration in declarations {
                    self.compile_node(declaration)?;
                }
            }

            // Keyword types
            NodeKind::BooleanKeyword => self.emit(Op::Boolean, pos),
            NodeKind::StringKeyword => self.emit(Op::String, pos),
            NodeKind::NumberKeyword => self.emit(Op::Number, pos),
            NodeKind::TrueKeyword => self.emit(Op::True, pos),
            NodeKind::FalseKeyword => self.emit(Op::False, pos),

            // Literals
            NodeKind::NumericLiteral { text } => {
                self.program
                    .emit_literal(&self.ctx, Op::NumberLiteral, text, pos)?;
            }
            NodeKind::BigIntLiteral { text } => {
                self.program
                    .emit_literal(&self.ctx, Op::BigIntLiteral, text, pos)?;
            }
            NodeKind::StringLiteral { text } => {
                self.program
                    .emit_literal(&self.ctx, Op::StringLiteral, text, pos)?;
            }

            NodeKind::UnionType { types } => {
                self.program.enter_scope(&mut self.ctx, true, pos);
                for ty in types {
                    self.compile_node(ty)?;
                }
                // Union closes the frame in the VM
                self.emit(Op::Union, pos);
                self.program.leave_scope(&mut self.ctx);
            }

            NodeKind::TypeReference { name } => self.compile_type_reference(name, pos)?,

            NodeKind::TypeAliasDeclaration {
                name,
                type_parameters,
                ty,
            } => self.compile_type_alias(name, type_parameters, ty, pos)?,

            NodeKind::FunctionDeclaration {
                name,
                parameters,
                return_type,
            } => {
                let Some(name) = name else {
                    warn!("function declaration at {} has no name, skipped", pos);
                    return Ok(());
                };
                self.compile_function(name, parameters, return_type.as_deref(), pos)?;
            }

            NodeKind::Parameter { ty, .. } => match ty {
                Some(ty) => self.compile_node(ty)?,
                None => self.emit(Op::Unknown, pos),
            },

            NodeKind::VariableDeclaration {
                name,
                ty,
                initializer,
            } => {
                let Some(name) = name else {
                    warn!("variable declaration at {} has no bindable name, skipped", pos);
                    return Ok(());
                };
                self.compile_variable(name, ty.as_deref(), initializer.as_deref(), pos)?;
            }

            NodeKind::Identifier { .. } | NodeKind::ExpressionStatement { .. } => {
                return Err(CompileError::unhandled(node));
            }
        }

        Ok(())
    }

    fn emit(&mut self, op: Op, pos: u32) {
        self.program.emit(&self.ctx, op, pos);
    }

    /// Register every declaration of a statement list before any body is
    /// compiled, so references may point at later declarations.
    fn hoist_declarations(&mut self, statements: &[Node]) {
        for statement in statements {
            match &statement.kind {
                NodeKind::TypeAliasDeclaration { name, .. } => {
                    self.program
                        .hoist_routine(&self.ctx, name, SymbolKind::Type, statement.pos);
                }
                NodeKind::FunctionDeclaration { name: Some(name), .. } => {
                    self.program
                        .hoist_routine(&self.ctx, name, SymbolKind::Function, statement.pos);
                }
                NodeKind::VariableStatement { declarations } => {
                    for declaration in declarations {
                        if let NodeKind::VariableDeclaration {
                            name: Some(name), ..
                        } = &declaration.kind
                        {
                            self.program.hoist_routine(
                                &self.ctx,
                                name,
                                SymbolKind::Variable,
                                declaration.pos,
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Declare the routine for `name`; returns `None` when its body was
    /// already compiled by an earlier declaration in the same frame.
    fn declare_fresh_routine(&mut self, name: &str, kind: SymbolKind, pos: u32) -> Option<SymbolRef> {
        let symbol = self
            .program
            .declare_routine(&self.ctx, name, kind, pos, None);

        let populated = self
            .program
            .frames
            .symbol(symbol)
            .routine
            .is_some_and(|r| !self.program.routine(r).code.is_empty());

        if populated {
            debug!(
                "'{}' declared {} times in frame {}, body kept from first declaration",
                name,
                self.program.frames.symbol(symbol).declarations,
                symbol.frame
            );
            return None;
        }
        Some(symbol)
    }

    fn compile_type_reference(&mut self, name: &str, pos: u32) -> CompileResult<()> {
        let found = self.program.resolve_symbol(&self.ctx, name, pos)?;
        let symbol = self.program.frames.symbol(found);
        let (kind, frame, slot, routine) = (symbol.kind, symbol.frame, symbol.slot, symbol.routine);

        if kind == SymbolKind::TypeVariable {
            self.emit(Op::Loads, pos);
            self.program.emit_frame_slot(&self.ctx, frame, slot);
            return Ok(());
        }

        let routine = routine.ok_or_else(|| CompileError::UnknownRoutine {
            name: name.to_string(),
        })?;
        self.emit(Op::Call, pos);
        self.program.emit_address(&self.ctx, routine.0);
        Ok(())
    }

    fn compile_type_alias(
        &mut self,
        name: &str,
        type_parameters: &[TypeParameter],
        ty: &Node,
        pos: u32,
    ) -> CompileResult<()> {
        if self.declare_fresh_routine(name, SymbolKind::Type, pos).is_none() {
            return Ok(());
        }

        self.program.enter_routine(&mut self.ctx, name)?;
        for param in type_parameters {
            self.program.declare_symbol(
                &self.ctx,
                &param.name,
                SymbolKind::TypeVariable,
                param.pos,
                None,
            );
            self.emit(Op::Var, param.pos);
        }
        self.compile_node(ty)?;
        self.program.leave_routine(&mut self.ctx, pos)
    }

    fn compile_function(
        &mut self,
        name: &str,
        parameters: &[Node],
        return_type: Option<&Node>,
        pos: u32,
    ) -> CompileResult<()> {
        if self
            .declare_fresh_routine(name, SymbolKind::Function, pos)
            .is_none()
        {
            return Ok(());
        }

        self.program.enter_routine(&mut self.ctx, name)?;
        for param in parameters {
            self.compile_node(param)?;
        }
        match return_type {
            Some(ty) => self.compile_node(ty)?,
            // TODO: infer the return type from the body once bodies are lowered
            None => self.emit(Op::Unknown, pos),
        }
        self.emit(Op::Function, pos);
        self.program.leave_routine(&mut self.ctx, pos)
    }

    fn compile_variable(
        &mut self,
        name: &str,
        ty: Option<&Node>,
        initializer: Option<&Node>,
        pos: u32,
    ) -> CompileResult<()> {
        if self
            .declare_fresh_routine(name, SymbolKind::Variable, pos)
            .is_none()
        {
            return Ok(());
        }

        let routine = self.program.enter_routine(&mut self.ctx, name)?;
        match ty {
            Some(ty) => self.compile_node(ty)?,
            None => self.emit(Op::Unknown, pos),
        }
        self.program.leave_routine(&mut self.ctx, pos)?;

        if let Some(initializer) = initializer {
            // name = initializer, checked against the declared type
            self.compile_node(initializer)?;
            self.emit(Op::Call, pos);
            self.program.emit_address(&self.ctx, routine.0);
            self.emit(Op::Assign, pos);
        }
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a source file tree into an unlinked program.
pub fn compile_source_file(root: &Node) -> CompileResult<Program> {
    Compiler::new().compile(root)
}
