//! Append-only bytecode buffer.

use std::fmt;

use crate::bytecode::instruction::{Instruction, OpCode, MAX_INSTRUCTION_SIZE};

/// Addresses are encoded as u32, so code can never grow past this.
pub const MAX_PROGRAM_SIZE: usize = u32::MAX as usize;

const INITIAL_CAPACITY: usize = 64;

/// A flat buffer of encoded instructions.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<u8>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            code: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Wrap raw bytes, for hand-assembled or loaded programs.
    pub fn from_bytes(code: Vec<u8>) -> Self {
        Self { code }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }

    /// Offset the next instruction will be written at.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Make room for one more instruction of any size, doubling the buffer
    /// when the remaining slack is too small.
    fn reserve_instruction(&mut self) {
        let len = self.code.len();
        if self.code.capacity() - len < MAX_INSTRUCTION_SIZE {
            let target = (self.code.capacity() * 2)
                .max(len + MAX_INSTRUCTION_SIZE)
                .max(INITIAL_CAPACITY);
            self.code.reserve_exact(target - len);
        }
    }

    /// Append an instruction and return its offset.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.reserve_instruction();
        let at = self.code.len();
        instruction.encode(&mut self.code);
        at
    }

    /// Append an instruction that has no immediates.
    pub fn emit_op(&mut self, op: OpCode) -> usize {
        assert_eq!(op.operand_size(), 0, "{:?} takes immediates", op);
        match op {
            OpCode::Halt => self.emit(Instruction::Halt),
            OpCode::Pop => self.emit(Instruction::Pop),
            OpCode::Print => self.emit(Instruction::Print),
            OpCode::Return => self.emit(Instruction::Return),
            arith => self.emit(Instruction::Binary(arith)),
        }
    }

    pub fn emit_push_int(&mut self, value: i32) -> usize {
        self.emit(Instruction::PushInt(value))
    }

    pub fn emit_push_double(&mut self, value: f64) -> usize {
        self.emit(Instruction::PushDouble(value))
    }

    pub fn emit_dup(&mut self, depth: u32) -> usize {
        self.emit(Instruction::Dup(depth))
    }

    /// Emit a `Jump` whose target will be patched later.
    pub fn emit_jump(&mut self) -> usize {
        self.emit(Instruction::Jump(0))
    }

    /// Emit a `JumpIfTrue` whose target will be patched later.
    pub fn emit_jump_if_true(&mut self) -> usize {
        self.emit(Instruction::JumpIfTrue(0))
    }

    pub fn emit_call(&mut self, address: u32, argc: u32) -> usize {
        self.emit(Instruction::Call { address, argc })
    }

    pub fn emit_load_arg(&mut self, index: u32) -> usize {
        self.emit(Instruction::LoadArg(index))
    }

    pub fn emit_store_local(&mut self, depth: u32) -> usize {
        self.emit(Instruction::StoreLocal(depth))
    }

    pub fn emit_store_arg(&mut self, index: u32) -> usize {
        self.emit(Instruction::StoreArg(index))
    }

    /// Point the jump at `at` to `target`. Only the address bytes change.
    ///
    /// # Panics
    ///
    /// Panics if `at` is not the offset of a `Jump` or `JumpIfTrue`.
    pub fn patch_jump(&mut self, at: usize, target: u32) {
        let op = self.code.get(at).copied().and_then(OpCode::from_u8);
        assert!(
            matches!(op, Some(op) if op.is_jump()) && at + 5 <= self.code.len(),
            "no jump instruction at offset {}",
            at
        );
        self.code[at + 1..at + 5].copy_from_slice(&target.to_le_bytes());
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("len", &self.code.len())
            .finish()
    }
}
