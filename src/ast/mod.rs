//! Abstract Syntax Tree for Quill.

pub mod expr;
pub mod stmt;
pub mod types;

pub use expr::{BinaryOp, Expr, ExprKind, UnaryOp};
pub use stmt::{FunctionDecl, Parameter, Program, Stmt, StmtKind};
pub use types::{TypeAnnotation, TypeKind};
