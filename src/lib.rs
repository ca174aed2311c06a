//! Quill: a small statically-typed language compiled to a NaN-boxed stack
//! bytecode and run on a companion virtual machine.
//!
//! This is the library root that exports all modules.
//!
//! # Pipeline
//!
//! Source text is scanned into tokens, parsed into an AST, then compiled in a
//! single pass that checks types and emits bytecode. The resulting
//! [`bytecode::CompiledProgram`] is loaded into a [`bytecode::Vm`] and run
//! from its entry function.

#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod types;

use std::io::{self, Write};

use bytecode::{CompiledProgram, Compiler, Vm, VmConfig};
use error::QuillError;

/// Scan and parse source text.
pub fn parse(source: &str) -> Result<ast::Program, QuillError> {
    let tokens = lexer::Scanner::new(source).scan_tokens()?;
    Ok(parser::Parser::new(tokens).parse()?)
}

/// Compile source text to bytecode.
pub fn compile(source: &str) -> Result<CompiledProgram, QuillError> {
    let program = parse(source)?;
    Ok(Compiler::new().compile(&program)?)
}

/// Compile and disassemble source text.
pub fn disassemble(source: &str) -> Result<String, QuillError> {
    let compiled = compile(source)?;
    Ok(bytecode::disassemble_compiled(&compiled))
}

/// Run a Quill program, printing to stdout.
pub fn run(source: &str) -> Result<(), QuillError> {
    run_with_output(source, io::stdout(), VmConfig::default()).map(|_| ())
}

/// Run a Quill program, writing `print` output to `out`. The writer is
/// handed back once the program halts.
pub fn run_with_output<W: Write>(
    source: &str,
    out: W,
    config: VmConfig,
) -> Result<W, QuillError> {
    let compiled = compile(source)?;
    execute(compiled, out, config)
}

/// Run an already compiled program.
pub fn execute<W: Write>(
    compiled: CompiledProgram,
    out: W,
    config: VmConfig,
) -> Result<W, QuillError> {
    let mut vm = Vm::with_output(out).with_config(config);
    vm.load(compiled.program, compiled.entry);
    vm.run()?;
    Ok(vm.into_output())
}
