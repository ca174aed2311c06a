//! Bytecode compiler: checks types, lays out frames and emits instructions
//! in a single post-order walk of the AST.

use crate::ast::expr::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::ast::stmt::{FunctionDecl, Program as Ast, Stmt, StmtKind};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::program::Program;
use crate::bytecode::scope::{FunctionEntry, FunctionTable, StorageClass, SymbolTable};
use crate::error::CompileError;
use crate::span::Span;
use crate::types::checker;
use crate::types::Type;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Name of the function execution starts in.
pub const ENTRY_POINT: &str = "main";

/// Slots a call pushes on top of its arguments: argc, saved FP, saved IP.
const FRAME_SLOTS: u32 = 3;

/// The output of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub program: Program,
    /// Address of the entry function.
    pub entry: u32,
    /// Every function, in declaration order.
    pub functions: Vec<FunctionEntry>,
}

/// The function whose body is being emitted.
#[derive(Debug, Clone, Copy)]
struct FunctionContext {
    return_type: Type,
    is_entry: bool,
}

impl Default for FunctionContext {
    fn default() -> Self {
        Self {
            return_type: Type::Void,
            is_entry: true,
        }
    }
}

/// The bytecode compiler.
pub struct Compiler {
    program: Program,
    symbols: SymbolTable,
    functions: FunctionTable,
    current: FunctionContext,
    /// Stack height at the current emission point, counted from the bottom
    /// of the current function's frame.
    depth: u32,
}

impl Compiler {
    /// Create a new compiler.
    pub fn new() -> Self {
        Self {
            program: Program::new(),
            symbols: SymbolTable::new(),
            functions: FunctionTable::new(),
            current: FunctionContext::default(),
            depth: 0,
        }
    }

    /// Compile a whole program. The first error aborts compilation.
    pub fn compile(mut self, ast: &Ast) -> CompileResult<CompiledProgram> {
        for decl in &ast.functions {
            self.compile_function(decl)?;
        }
        self.program.emit_op(OpCode::Halt);
        self.address()?;

        let entry = self
            .functions
            .lookup(ENTRY_POINT)
            .map(|f| f.address)
            .ok_or_else(|| CompileError::MissingEntry {
                name: ENTRY_POINT.to_string(),
            })?;

        Ok(CompiledProgram {
            program: self.program,
            entry,
            functions: self.functions.iter().cloned().collect(),
        })
    }

    fn compile_function(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        let return_type = Type::from_annotation(decl.return_type.as_ref(), Type::Void);
        let is_entry = decl.name == ENTRY_POINT;

        if is_entry {
            if return_type != Type::Void {
                return Err(CompileError::EntryReturnType {
                    name: decl.name.clone(),
                    found: return_type,
                    span: decl.span,
                });
            }
            if !decl.params.is_empty() {
                return Err(CompileError::EntryParameters {
                    name: decl.name.clone(),
                    span: decl.span,
                });
            }
        }

        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = Type::from_annotation(param.type_annotation.as_ref(), Type::Int);
            if ty == Type::Void {
                return Err(CompileError::VoidVariable {
                    name: param.name.clone(),
                    span: param.span,
                });
            }
            params.push(ty);
        }

        // Registered before the body so the function can call itself.
        let address = self.address()?;
        self.functions.register(
            FunctionEntry {
                name: decl.name.clone(),
                params: params.clone(),
                return_type,
                address,
            },
            decl.span,
        )?;

        self.symbols.reset();
        for (param, ty) in decl.params.iter().zip(&params) {
            self.symbols.declare_param(&param.name, *ty, param.span)?;
        }

        self.depth = if is_entry {
            0
        } else {
            FRAME_SLOTS + params.len() as u32
        };
        self.current = FunctionContext {
            return_type,
            is_entry,
        };

        tracing::debug!(
            function = %decl.name,
            address,
            params = params.len(),
            "emitting function"
        );

        for stmt in &decl.body {
            self.compile_statement(stmt)?;
        }

        if !checker::always_returns(&decl.body) {
            if is_entry {
                self.program.emit_op(OpCode::Halt);
            } else if return_type == Type::Void {
                self.program.emit_push_int(0);
                self.program.emit_op(OpCode::Return);
            } else {
                return Err(CompileError::MissingReturn {
                    name: decl.name.clone(),
                    expected: return_type,
                    span: decl.span,
                });
            }
        }

        Ok(())
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                let before = self.depth;
                self.compile_expression(expr)?;
                while self.depth > before {
                    self.emit_pop();
                }
            }

            StmtKind::Let {
                name,
                type_annotation,
                initializer,
            } => {
                let slot = self.depth;
                let declared = type_annotation
                    .as_ref()
                    .map(|a| Type::from_annotation(Some(a), Type::Int));
                if declared == Some(Type::Void) {
                    return Err(CompileError::VoidVariable {
                        name: name.clone(),
                        span: stmt.span,
                    });
                }

                let ty = self.compile_expression(initializer)?;
                if ty == Type::Void {
                    return Err(CompileError::VoidVariable {
                        name: name.clone(),
                        span: initializer.span,
                    });
                }
                if let Some(declared) = declared {
                    checker::expect_type(declared, ty, initializer.span)?;
                }

                self.symbols.declare_local(name, ty, slot, stmt.span)?;
            }

            StmtKind::Set { name, value } => {
                let (ty, storage, slot) = self.resolve(name, stmt.span)?;
                let found = self.compile_expression(value)?;
                checker::expect_type(ty, found, value.span)?;

                self.depth -= 1;
                match storage {
                    StorageClass::Parameter => {
                        self.program.emit_store_arg(slot);
                    }
                    StorageClass::Local => {
                        self.program.emit_store_local(self.depth - 1 - slot);
                    }
                }
            }

            StmtKind::Return(value) => self.compile_return(value.as_ref(), stmt.span)?,

            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let ty = self.compile_expression(condition)?;
                checker::check_condition(ty, condition.span)?;

                let to_then = self.program.emit_jump_if_true();
                self.depth -= 1;

                self.compile_branch(else_branch)?;
                let to_end = self.program.emit_jump();

                let then_start = self.address()?;
                self.compile_branch(then_branch)?;
                let end = self.address()?;

                self.program.patch_jump(to_then, then_start);
                self.program.patch_jump(to_end, end);
            }
        }

        Ok(())
    }

    /// Compile a branch body, then drop whatever it declared so both arms
    /// leave the stack and the symbol table exactly as they found them.
    fn compile_branch(&mut self, body: &[Stmt]) -> CompileResult<()> {
        let mark = self.symbols.mark();
        let base = self.depth;

        for stmt in body {
            self.compile_statement(stmt)?;
        }

        while self.depth > base {
            self.emit_pop();
        }
        self.symbols.truncate(mark);
        Ok(())
    }

    fn compile_return(&mut self, value: Option<&Expr>, span: Span) -> CompileResult<()> {
        let context = self.current;
        let before = self.depth;

        match value {
            Some(expr) => {
                let ty = self.compile_expression(expr)?;
                checker::expect_type(context.return_type, ty, expr.span)?;
            }
            None => checker::expect_type(context.return_type, Type::Void, span)?,
        }

        if context.is_entry {
            self.program.emit_op(OpCode::Halt);
        } else {
            // A void return still hands the caller one slot.
            if self.depth == before {
                self.program.emit_push_int(0);
                self.depth += 1;
            }
            self.program.emit_op(OpCode::Return);
        }

        self.depth = before;
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<Type> {
        match &expr.kind {
            ExprKind::IntLiteral(n) => {
                self.program.emit_push_int(*n);
                self.depth += 1;
                Ok(Type::Int)
            }

            ExprKind::DoubleLiteral(d) => {
                self.program.emit_push_double(*d);
                self.depth += 1;
                Ok(Type::Double)
            }

            ExprKind::Variable(name) => {
                let (ty, storage, slot) = self.resolve(name, expr.span)?;
                match storage {
                    StorageClass::Parameter => self.program.emit_load_arg(slot),
                    StorageClass::Local => self.program.emit_dup(self.depth - 1 - slot),
                };
                self.depth += 1;
                Ok(ty)
            }

            ExprKind::Grouping(inner) => self.compile_expression(inner),

            ExprKind::Unary { operator, operand } => {
                let operand_type = self.compile_expression(operand)?;
                let ty = checker::check_unary(*operator, operand_type, expr.span)?;

                match (operator, ty) {
                    (UnaryOp::Negate, Type::Double) => {
                        self.program.emit_push_double(-1.0);
                        self.program.emit_op(OpCode::MulDouble);
                    }
                    (UnaryOp::Negate, _) => {
                        self.program.emit_push_int(-1);
                        self.program.emit_op(OpCode::MulInt);
                    }
                    (UnaryOp::Not, _) => {
                        self.program.emit_push_int(0);
                        self.program.emit_op(OpCode::EqInt);
                    }
                }
                Ok(ty)
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left_type = self.compile_expression(left)?;
                let right_type = self.compile_expression(right)?;
                let ty = checker::check_binary(*operator, left_type, right_type, expr.span)?;

                self.program
                    .emit_op(binary_opcode(*operator, left_type == Type::Double));
                self.depth -= 1;
                Ok(ty)
            }

            ExprKind::Call { name, arguments } => {
                if name == "print" {
                    self.compile_print(arguments, expr.span)
                } else {
                    self.compile_call(name, arguments, expr.span)
                }
            }
        }
    }

    fn compile_print(&mut self, arguments: &[Expr], span: Span) -> CompileResult<Type> {
        if arguments.len() != 1 {
            return Err(CompileError::ArityMismatch {
                name: "print".to_string(),
                expected: 1,
                got: arguments.len(),
                span,
            });
        }

        let ty = self.compile_expression(&arguments[0])?;
        checker::expect_value(ty, arguments[0].span)?;
        self.program.emit_op(OpCode::Print);
        self.depth -= 1;
        Ok(Type::Void)
    }

    fn compile_call(&mut self, name: &str, arguments: &[Expr], span: Span) -> CompileResult<Type> {
        let callee = self
            .functions
            .lookup(name)
            .cloned()
            .ok_or_else(|| CompileError::UndeclaredFunction {
                name: name.to_string(),
                span,
            })?;

        if arguments.len() != callee.params.len() {
            return Err(CompileError::ArityMismatch {
                name: name.to_string(),
                expected: callee.params.len(),
                got: arguments.len(),
                span,
            });
        }

        for (argument, expected) in arguments.iter().zip(&callee.params) {
            let ty = self.compile_expression(argument)?;
            checker::expect_type(*expected, ty, argument.span)?;
        }

        let argc = arguments.len() as u32;
        self.program.emit_call(callee.address, argc);
        // Arguments are replaced by the single return slot.
        self.depth = self.depth - argc + 1;
        Ok(callee.return_type)
    }

    fn resolve(&self, name: &str, span: Span) -> CompileResult<(Type, StorageClass, u32)> {
        self.symbols
            .resolve(name)
            .map(|s| (s.ty, s.storage, s.slot))
            .ok_or_else(|| CompileError::UndeclaredIdentifier {
                name: name.to_string(),
                span,
            })
    }

    fn emit_pop(&mut self) {
        self.program.emit_op(OpCode::Pop);
        self.depth -= 1;
    }

    /// Current end of the program as an encodable address.
    fn address(&self) -> CompileResult<u32> {
        u32::try_from(self.program.len()).map_err(|_| CompileError::ProgramTooLarge {
            limit: crate::bytecode::program::MAX_PROGRAM_SIZE,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

fn binary_opcode(op: BinaryOp, double: bool) -> OpCode {
    match (op, double) {
        (BinaryOp::Add, false) => OpCode::AddInt,
        (BinaryOp::Subtract, false) => OpCode::SubInt,
        (BinaryOp::Multiply, false) => OpCode::MulInt,
        (BinaryOp::Divide, false) => OpCode::DivInt,
        (BinaryOp::Equal, false) => OpCode::EqInt,
        (BinaryOp::NotEqual, false) => OpCode::NotEqInt,
        (BinaryOp::Less, false) => OpCode::LessInt,
        (BinaryOp::Greater, false) => OpCode::GreaterInt,
        (BinaryOp::LessEqual, false) => OpCode::LessEqInt,
        (BinaryOp::GreaterEqual, false) => OpCode::GreaterEqInt,
        (BinaryOp::Add, true) => OpCode::AddDouble,
        (BinaryOp::Subtract, true) => OpCode::SubDouble,
        (BinaryOp::Multiply, true) => OpCode::MulDouble,
        (BinaryOp::Divide, true) => OpCode::DivDouble,
        (BinaryOp::Equal, true) => OpCode::EqDouble,
        (BinaryOp::NotEqual, true) => OpCode::NotEqDouble,
        (BinaryOp::Less, true) => OpCode::LessDouble,
        (BinaryOp::Greater, true) => OpCode::GreaterDouble,
        (BinaryOp::LessEqual, true) => OpCode::LessEqDouble,
        (BinaryOp::GreaterEqual, true) => OpCode::GreaterEqDouble,
        // Rejected by the checker before any opcode is chosen.
        (BinaryOp::Modulo, _) => unreachable!("modulo has no instruction"),
    }
}
