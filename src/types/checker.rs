//! Typing rules. The code generator calls these while it emits, so every
//! expression is checked exactly once, at the point its code is produced.

use crate::ast::{BinaryOp, Stmt, StmtKind, UnaryOp};
use crate::error::CompileError;
use crate::span::Span;
use crate::types::type_repr::Type;

pub type TypeResult<T> = Result<T, CompileError>;

/// Reject `Void` wherever a value is required.
pub fn expect_value(ty: Type, span: Span) -> TypeResult<Type> {
    if ty.is_value() {
        Ok(ty)
    } else {
        Err(CompileError::type_mismatch("a value", ty, span))
    }
}

/// `found` must be exactly `expected`; there are no implicit conversions.
pub fn expect_type(expected: Type, found: Type, span: Span) -> TypeResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(CompileError::type_mismatch(expected, found, span))
    }
}

/// Result type of `left <op> right`.
pub fn check_binary(op: BinaryOp, left: Type, right: Type, span: Span) -> TypeResult<Type> {
    if op == BinaryOp::Modulo {
        return Err(CompileError::UnknownOperator {
            operator: op.to_string(),
            span,
        });
    }

    let operand = expect_value(left, span)?;
    expect_value(right, span)?;
    expect_type(operand, right, span)?;

    if op.is_comparison() {
        Ok(Type::Int)
    } else {
        Ok(operand)
    }
}

/// Result type of `<op> operand`.
pub fn check_unary(op: UnaryOp, operand: Type, span: Span) -> TypeResult<Type> {
    let operand = expect_value(operand, span)?;
    match op {
        UnaryOp::Negate => Ok(operand),
        UnaryOp::Not => {
            expect_type(Type::Int, operand, span)?;
            Ok(Type::Int)
        }
    }
}

/// Conditions are integer truth values.
pub fn check_condition(ty: Type, span: Span) -> TypeResult<()> {
    expect_type(Type::Int, expect_value(ty, span)?, span)
}

/// Whether every path through `body` ends in a `return`.
pub fn always_returns(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => always_returns(then_branch) && always_returns(else_branch),
        _ => false,
    })
}
