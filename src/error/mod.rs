//! Error types for all compilation phases and for execution.

use crate::bytecode::value::ValueKind;
use crate::span::Span;
use crate::types::Type;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error, PartialEq)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),

    #[error("Unterminated block comment starting at {0}")]
    UnterminatedComment(Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn invalid_number(s: impl Into<String>, span: Span) -> Self {
        Self::InvalidNumber(s.into(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
            Self::UnterminatedComment(span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error, PartialEq)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of file at {0}")]
    UnexpectedEof(Span),
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn unexpected_eof(span: Span) -> Self {
        Self::UnexpectedEof(span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof(span) => *span,
        }
    }
}

/// Code generation and type errors. Every one of them aborts compilation.
#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("Use of undeclared variable '{name}' at {span}")]
    UndeclaredIdentifier { name: String, span: Span },

    #[error("Call to undeclared function '{name}' at {span}")]
    UndeclaredFunction { name: String, span: Span },

    #[error("Symbol '{name}' is already declared at {span}")]
    DuplicateDeclaration { name: String, span: Span },

    #[error("Function '{name}' expects {expected} argument(s), got {got} at {span}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Type mismatch: expected {expected}, found {found} at {span}")]
    TypeMismatch {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unknown operator '{operator}' at {span}")]
    UnknownOperator { operator: String, span: Span },

    #[error("Too many {what} (limit {limit}) at {span}")]
    DeclarationLimit {
        what: &'static str,
        limit: usize,
        span: Span,
    },

    #[error("No entry function '{name}' defined")]
    MissingEntry { name: String },

    #[error("Entry function '{name}' must return void, found {found} at {span}")]
    EntryReturnType {
        name: String,
        found: Type,
        span: Span,
    },

    #[error("Entry function '{name}' cannot take parameters at {span}")]
    EntryParameters { name: String, span: Span },

    #[error("Variable '{name}' cannot have type void at {span}")]
    VoidVariable { name: String, span: Span },

    #[error("Function '{name}' can reach its end without returning a {expected} at {span}")]
    MissingReturn {
        name: String,
        expected: Type,
        span: Span,
    },

    #[error("Program exceeds {limit} bytes")]
    ProgramTooLarge { limit: usize },
}

impl CompileError {
    pub fn type_mismatch(
        expected: impl ToString,
        found: impl ToString,
        span: Span,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
            span,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UndeclaredIdentifier { span, .. }
            | Self::UndeclaredFunction { span, .. }
            | Self::DuplicateDeclaration { span, .. }
            | Self::ArityMismatch { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::UnknownOperator { span, .. }
            | Self::DeclarationLimit { span, .. }
            | Self::EntryReturnType { span, .. }
            | Self::EntryParameters { span, .. }
            | Self::VoidVariable { span, .. }
            | Self::MissingReturn { span, .. } => Some(*span),
            Self::MissingEntry { .. } | Self::ProgramTooLarge { .. } => None,
        }
    }
}

/// Fatal runtime conditions. A trap stops the machine where it stands; the
/// operand stack is left as it was when the faulting instruction started.
#[derive(Debug, Error)]
pub enum Trap {
    #[error("stack overflow at ip {ip:04}")]
    StackOverflow { ip: usize },

    #[error("stack underflow at ip {ip:04}")]
    StackUnderflow { ip: usize },

    #[error("unknown opcode 0x{opcode:02X} at ip {ip:04}")]
    UnknownOpcode { opcode: u8, ip: usize },

    #[error("integer division by zero at ip {ip:04}")]
    DivisionByZero { ip: usize },

    #[error("expected {expected} operand, found {found} at ip {ip:04}")]
    OperandKind {
        expected: ValueKind,
        found: ValueKind,
        ip: usize,
    },

    #[error("execution ran past the end of the program at ip {ip:04}")]
    ProgramOverrun { ip: usize },

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl Trap {
    /// Address of the instruction that trapped, when there is one.
    pub fn ip(&self) -> Option<usize> {
        match self {
            Self::StackOverflow { ip }
            | Self::StackUnderflow { ip }
            | Self::UnknownOpcode { ip, .. }
            | Self::DivisionByZero { ip }
            | Self::OperandKind { ip, .. }
            | Self::ProgramOverrun { ip } => Some(*ip),
            Self::Output(_) => None,
        }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum QuillError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime trap: {0}")]
    Trap(#[from] Trap),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuillError {
    /// Whether the error was raised before any instruction executed.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Lexer(_) | Self::Parser(_) | Self::Compile(_))
    }
}
