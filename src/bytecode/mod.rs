//! Bytecode toolchain: value encoding, instruction set, code generation and
//! the virtual machine that executes it.
//!
//! # Architecture
//!
//! - `value`: NaN-boxed scalar values
//! - `instruction`: OpCode definitions and the decoded instruction view
//! - `program`: Append-only bytecode buffer with jump back-patching
//! - `scope`: Symbol and function tables used during code generation
//! - `compiler`: Transforms AST into bytecode, checking types as it goes
//! - `vm`: Stack-based virtual machine for executing bytecode
//! - `disassembler`: Debug output for bytecode inspection

pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod program;
pub mod scope;
pub mod value;
pub mod vm;

pub use compiler::{CompiledProgram, Compiler};
pub use disassembler::{disassemble, disassemble_compiled};
pub use instruction::{Instruction, OpCode};
pub use program::Program;
pub use value::{Value, ValueKind};
pub use vm::{Status, Vm, VmConfig};
