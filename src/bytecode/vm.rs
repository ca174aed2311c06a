//! Stack-based virtual machine for executing bytecode.
//!
//! # Calling convention
//!
//! `Call` leaves the arguments where the caller pushed them and adds a frame
//! triple on top: `[.., arg0 .. argN-1, argc, saved FP, saved IP]`. The frame
//! pointer is the index of the saved IP slot, so argument `i` lives at
//! `fp - 2 - argc + i`. `Return` collapses the arguments and the triple and
//! leaves exactly one value, the callee's top of stack.

use std::io::{self, Write};

use tracing::Level;

use crate::bytecode::instruction::{DecodeError, Instruction, OpCode};
use crate::bytecode::program::Program;
use crate::bytecode::value::{Value, ValueKind};
use crate::error::Trap;

/// Default operand stack capacity, in slots.
pub const DEFAULT_STACK_CAPACITY: usize = 1024;

/// Largest usable stack capacity. Saved frame pointers are stored as `Int`
/// values, so every slot index must fit in an `i32`.
pub const MAX_STACK_CAPACITY: usize = i32::MAX as usize;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, Trap>;

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub stack_capacity: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
        }
    }
}

/// What the machine did on its last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

/// The virtual machine. `print` output goes to `W`.
pub struct Vm<W: Write = io::Stdout> {
    code: Vec<u8>,
    ip: usize,
    stack: Vec<Value>,
    fp: Option<usize>,
    config: VmConfig,
    out: W,
}

impl Vm<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Vm<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Vm<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            code: Vec::new(),
            ip: 0,
            stack: Vec::new(),
            fp: None,
            config: VmConfig::default(),
            out,
        }
    }

    /// Capacities above [`MAX_STACK_CAPACITY`] are clamped to it.
    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = VmConfig {
            stack_capacity: config.stack_capacity.min(MAX_STACK_CAPACITY),
        };
        self
    }

    /// Take ownership of `program` and reset to start at `entry`.
    pub fn load(&mut self, program: Program, entry: u32) {
        self.code = program.into_bytes();
        self.ip = entry as usize;
        // The stack grows on demand; only the common case is reserved up front.
        self.stack = Vec::with_capacity(self.config.stack_capacity.min(DEFAULT_STACK_CAPACITY));
        self.fp = None;
        tracing::debug!(bytes = self.code.len(), entry, "program loaded");
    }

    /// Run until `Halt` or a trap. The stack is left in place either way.
    pub fn run(&mut self) -> VmResult<()> {
        while self.step()? == Status::Running {}
        self.out.flush()?;
        Ok(())
    }

    /// Execute one instruction. On a trap nothing is modified, including
    /// the instruction pointer.
    pub fn step(&mut self) -> VmResult<Status> {
        let at = self.ip;
        let instruction = Instruction::decode(&self.code, at).map_err(|e| match e {
            DecodeError::UnknownOpcode(opcode) => Trap::UnknownOpcode { opcode, ip: at },
            DecodeError::Truncated => Trap::ProgramOverrun { ip: at },
        })?;

        if tracing::enabled!(Level::TRACE) {
            tracing::trace!(ip = at, depth = self.stack.len(), "{}", instruction);
        }

        self.ip = at + instruction.size();
        let status = self.execute(instruction, at);
        if status.is_err() {
            self.ip = at;
        }
        status
    }

    fn execute(&mut self, instruction: Instruction, at: usize) -> VmResult<Status> {
        match instruction {
            Instruction::Halt => {
                self.ip = at;
                return Ok(Status::Halted);
            }

            Instruction::PushInt(n) => self.push(Value::from_int(n), at)?,
            Instruction::PushDouble(d) => self.push(Value::from_double(d), at)?,

            Instruction::Pop => {
                self.pop(at)?;
            }

            Instruction::Dup(depth) => {
                let value = self.peek(depth as usize, at)?;
                self.push(value, at)?;
            }

            Instruction::Print => {
                let value = self.peek(0, at)?;
                writeln!(self.out, "{}", value)?;
                self.stack.pop();
            }

            Instruction::Binary(op) => self.binary(op, at)?,

            Instruction::Jump(target) => self.jump(target, at)?,

            Instruction::JumpIfTrue(target) => {
                let condition = self.expect_int(self.peek(0, at)?, at)?;
                if condition != 0 {
                    self.jump(target, at)?;
                }
                self.stack.pop();
            }

            Instruction::Call { address, argc } => {
                if argc as usize > self.stack.len() {
                    return Err(Trap::StackUnderflow { ip: at });
                }
                if self.stack.len() + 3 > self.config.stack_capacity {
                    return Err(Trap::StackOverflow { ip: at });
                }
                let saved_fp = match self.fp {
                    Some(fp) => i32::try_from(fp).map_err(|_| Trap::StackOverflow { ip: at })?,
                    None => -1,
                };
                let return_to = self.ip;
                self.jump(address, at)?;

                self.stack.push(Value::from_int(argc as i32));
                self.stack.push(Value::from_int(saved_fp));
                self.stack.push(Value::from_int(return_to as u32 as i32));
                self.fp = Some(self.stack.len() - 1);
            }

            Instruction::Return => self.ret(at)?,

            Instruction::LoadArg(index) => {
                let slot = self.arg_slot(index, at)?;
                self.push(self.stack[slot], at)?;
            }

            Instruction::StoreLocal(depth) => {
                let len = self.stack.len();
                if len < depth as usize + 2 {
                    return Err(Trap::StackUnderflow { ip: at });
                }
                let value = self.stack[len - 1];
                self.stack[len - 2 - depth as usize] = value;
                self.stack.pop();
            }

            Instruction::StoreArg(index) => {
                let slot = self.arg_slot(index, at)?;
                let value = self.peek(0, at)?;
                self.stack[slot] = value;
                self.stack.pop();
            }
        }

        Ok(Status::Running)
    }

    fn binary(&mut self, op: OpCode, at: usize) -> VmResult<()> {
        let len = self.stack.len();
        if len < 2 {
            return Err(Trap::StackUnderflow { ip: at });
        }
        let (a, b) = (self.stack[len - 2], self.stack[len - 1]);

        let result = if (OpCode::AddInt as u8..=OpCode::GreaterEqInt as u8).contains(&(op as u8)) {
            let (x, y) = (self.expect_int(a, at)?, self.expect_int(b, at)?);
            match op {
                OpCode::AddInt => Value::from_int(x.wrapping_add(y)),
                OpCode::SubInt => Value::from_int(x.wrapping_sub(y)),
                OpCode::MulInt => Value::from_int(x.wrapping_mul(y)),
                OpCode::DivInt => {
                    if y == 0 {
                        return Err(Trap::DivisionByZero { ip: at });
                    }
                    Value::from_int(x.wrapping_div(y))
                }
                OpCode::EqInt => truth(x == y),
                OpCode::NotEqInt => truth(x != y),
                OpCode::LessInt => truth(x < y),
                OpCode::GreaterInt => truth(x > y),
                OpCode::LessEqInt => truth(x <= y),
                _ => truth(x >= y),
            }
        } else {
            let (x, y) = (self.expect_double(a, at)?, self.expect_double(b, at)?);
            match op {
                OpCode::AddDouble => Value::from_double(x + y),
                OpCode::SubDouble => Value::from_double(x - y),
                OpCode::MulDouble => Value::from_double(x * y),
                OpCode::DivDouble => Value::from_double(x / y),
                OpCode::EqDouble => truth(x == y),
                OpCode::NotEqDouble => truth(x != y),
                OpCode::LessDouble => truth(x < y),
                OpCode::GreaterDouble => truth(x > y),
                OpCode::LessEqDouble => truth(x <= y),
                _ => truth(x >= y),
            }
        };

        self.stack.truncate(len - 2);
        self.stack.push(result);
        Ok(())
    }

    fn ret(&mut self, at: usize) -> VmResult<()> {
        let fp = self.fp.ok_or(Trap::StackUnderflow { ip: at })?;
        if fp < 2 || self.stack.len() <= fp + 1 {
            return Err(Trap::StackUnderflow { ip: at });
        }

        let return_to = self.expect_int(self.stack[fp], at)? as u32 as usize;
        let saved_fp = self.expect_int(self.stack[fp - 1], at)?;
        let argc = self.expect_int(self.stack[fp - 2], at)? as u32 as usize;
        if argc > fp - 2 {
            return Err(Trap::StackUnderflow { ip: at });
        }
        let result = self.stack[self.stack.len() - 1];

        self.stack.truncate(fp - 2 - argc);
        self.stack.push(result);
        self.fp = usize::try_from(saved_fp).ok();
        self.ip = return_to;
        Ok(())
    }

    /// Stack index of argument `index` of the active frame.
    fn arg_slot(&self, index: u32, at: usize) -> VmResult<usize> {
        let fp = self.fp.ok_or(Trap::StackUnderflow { ip: at })?;
        if fp < 2 || fp >= self.stack.len() {
            return Err(Trap::StackUnderflow { ip: at });
        }
        let argc = self.expect_int(self.stack[fp - 2], at)? as u32 as usize;
        if index as usize >= argc || argc > fp - 2 {
            return Err(Trap::StackUnderflow { ip: at });
        }
        Ok(fp - 2 - argc + index as usize)
    }

    fn jump(&mut self, target: u32, at: usize) -> VmResult<()> {
        if target as usize >= self.code.len() {
            return Err(Trap::ProgramOverrun { ip: at });
        }
        self.ip = target as usize;
        Ok(())
    }

    fn push(&mut self, value: Value, at: usize) -> VmResult<()> {
        if self.stack.len() >= self.config.stack_capacity {
            return Err(Trap::StackOverflow { ip: at });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, at: usize) -> VmResult<Value> {
        self.stack.pop().ok_or(Trap::StackUnderflow { ip: at })
    }

    fn peek(&self, distance: usize, at: usize) -> VmResult<Value> {
        self.stack
            .len()
            .checked_sub(1 + distance)
            .map(|i| self.stack[i])
            .ok_or(Trap::StackUnderflow { ip: at })
    }

    fn expect_int(&self, value: Value, at: usize) -> VmResult<i32> {
        value.try_as_int().ok_or(Trap::OperandKind {
            expected: ValueKind::Integer,
            found: value.kind(),
            ip: at,
        })
    }

    fn expect_double(&self, value: Value, at: usize) -> VmResult<f64> {
        value.try_as_double().ok_or(Trap::OperandKind {
            expected: ValueKind::Double,
            found: value.kind(),
            ip: at,
        })
    }

    // ===== Inspection =====

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn fp(&self) -> Option<usize> {
        self.fp
    }

    pub fn config(&self) -> VmConfig {
        self.config
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

fn truth(b: bool) -> Value {
    Value::from_int(b as i32)
}
