//! Instruction set: opcodes, their immediate layout and a decoded view.
//!
//! Encoding is `[opcode:1][immediates]`, little-endian. Integers, addresses,
//! depths and counts are 4 bytes; doubles are 8 bytes.

use std::fmt;

use thiserror::Error;

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Stack ============
    /// Stop execution
    Halt = 0,
    /// Push an integer: PUSH_INT <value:i32>
    PushInt,
    /// Push a double: PUSH_DOUBLE <value:f64>
    PushDouble,
    /// Discard the top value
    Pop,
    /// Copy the slot `depth` below the top: DUP <depth:u32>
    Dup,
    /// Pop and print the top value
    Print,

    // ============ Integer arithmetic ============
    AddInt,
    SubInt,
    MulInt,
    DivInt,

    // ============ Integer comparison ============
    EqInt,
    NotEqInt,
    LessInt,
    GreaterInt,
    LessEqInt,
    GreaterEqInt,

    // ============ Double arithmetic ============
    AddDouble,
    SubDouble,
    MulDouble,
    DivDouble,

    // ============ Double comparison ============
    EqDouble,
    NotEqDouble,
    LessDouble,
    GreaterDouble,
    LessEqDouble,
    GreaterEqDouble,

    // ============ Control Flow ============
    /// Unconditional jump: JUMP <address:u32>
    Jump,
    /// Pop; jump if a nonzero integer: JUMP_IF_TRUE <address:u32>
    JumpIfTrue,
    /// Call a function: CALL <address:u32> <argc:u32>
    Call,
    /// Return from the current frame
    Return,

    // ============ Variables ============
    /// Push an argument of the current frame: LOAD_ARG <index:u32>
    LoadArg,
    /// Pop, then overwrite the slot `depth` below the new top: STORE_LOCAL <depth:u32>
    StoreLocal,
    /// Pop into an argument of the current frame: STORE_ARG <index:u32>
    StoreArg,
}

/// The largest encoded instruction (`Call`: opcode + two u32).
pub const MAX_INSTRUCTION_SIZE: usize = 9;

impl OpCode {
    /// Get the number of operand bytes for this opcode.
    pub fn operand_size(self) -> usize {
        match self {
            OpCode::PushDouble => 8,
            OpCode::Call => 8,
            OpCode::PushInt
            | OpCode::Dup
            | OpCode::Jump
            | OpCode::JumpIfTrue
            | OpCode::LoadArg
            | OpCode::StoreLocal
            | OpCode::StoreArg => 4,
            _ => 0,
        }
    }

    pub fn from_u8(byte: u8) -> Option<OpCode> {
        if byte <= OpCode::StoreArg as u8 {
            // SAFETY: OpCode is repr(u8) with contiguous discriminants from 0
            // to StoreArg.
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfTrue)
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

/// Why a byte sequence could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("truncated instruction")]
    Truncated,
}

/// A decoded instruction with its immediates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Halt,
    PushInt(i32),
    PushDouble(f64),
    Pop,
    Dup(u32),
    Print,
    /// Any of the operand-free arithmetic or comparison opcodes.
    Binary(OpCode),
    Jump(u32),
    JumpIfTrue(u32),
    Call { address: u32, argc: u32 },
    Return,
    LoadArg(u32),
    StoreLocal(u32),
    StoreArg(u32),
}

impl Instruction {
    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::Halt => OpCode::Halt,
            Instruction::PushInt(_) => OpCode::PushInt,
            Instruction::PushDouble(_) => OpCode::PushDouble,
            Instruction::Pop => OpCode::Pop,
            Instruction::Dup(_) => OpCode::Dup,
            Instruction::Print => OpCode::Print,
            Instruction::Binary(op) => *op,
            Instruction::Jump(_) => OpCode::Jump,
            Instruction::JumpIfTrue(_) => OpCode::JumpIfTrue,
            Instruction::Call { .. } => OpCode::Call,
            Instruction::Return => OpCode::Return,
            Instruction::LoadArg(_) => OpCode::LoadArg,
            Instruction::StoreLocal(_) => OpCode::StoreLocal,
            Instruction::StoreArg(_) => OpCode::StoreArg,
        }
    }

    /// Encoded length in bytes.
    pub fn size(&self) -> usize {
        1 + self.opcode().operand_size()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode().into());
        match *self {
            Instruction::PushInt(n) => out.extend_from_slice(&n.to_le_bytes()),
            Instruction::PushDouble(d) => out.extend_from_slice(&d.to_bits().to_le_bytes()),
            Instruction::Dup(n)
            | Instruction::Jump(n)
            | Instruction::JumpIfTrue(n)
            | Instruction::LoadArg(n)
            | Instruction::StoreLocal(n)
            | Instruction::StoreArg(n) => out.extend_from_slice(&n.to_le_bytes()),
            Instruction::Call { address, argc } => {
                out.extend_from_slice(&address.to_le_bytes());
                out.extend_from_slice(&argc.to_le_bytes());
            }
            _ => {}
        }
    }

    /// Decode the instruction starting at `at`.
    pub fn decode(code: &[u8], at: usize) -> Result<Instruction, DecodeError> {
        let byte = *code.get(at).ok_or(DecodeError::Truncated)?;
        let op = OpCode::from_u8(byte).ok_or(DecodeError::UnknownOpcode(byte))?;
        let operands = code
            .get(at + 1..at + 1 + op.operand_size())
            .ok_or(DecodeError::Truncated)?;

        let u32_at = |i: usize| {
            u32::from_le_bytes([operands[i], operands[i + 1], operands[i + 2], operands[i + 3]])
        };

        Ok(match op {
            OpCode::Halt => Instruction::Halt,
            OpCode::PushInt => Instruction::PushInt(u32_at(0) as i32),
            OpCode::PushDouble => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(operands);
                Instruction::PushDouble(f64::from_bits(u64::from_le_bytes(bytes)))
            }
            OpCode::Pop => Instruction::Pop,
            OpCode::Dup => Instruction::Dup(u32_at(0)),
            OpCode::Print => Instruction::Print,
            OpCode::Jump => Instruction::Jump(u32_at(0)),
            OpCode::JumpIfTrue => Instruction::JumpIfTrue(u32_at(0)),
            OpCode::Call => Instruction::Call {
                address: u32_at(0),
                argc: u32_at(4),
            },
            OpCode::Return => Instruction::Return,
            OpCode::LoadArg => Instruction::LoadArg(u32_at(0)),
            OpCode::StoreLocal => Instruction::StoreLocal(u32_at(0)),
            OpCode::StoreArg => Instruction::StoreArg(u32_at(0)),
            arith => Instruction::Binary(arith),
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::PushInt(n) => write!(f, "PushInt {}", n),
            Instruction::PushDouble(d) => write!(f, "PushDouble {:?}", d),
            Instruction::Dup(n) => write!(f, "Dup {}", n),
            Instruction::Jump(to) => write!(f, "Jump -> {:04}", to),
            Instruction::JumpIfTrue(to) => write!(f, "JumpIfTrue -> {:04}", to),
            Instruction::Call { address, argc } => write!(f, "Call {:04} args={}", address, argc),
            Instruction::LoadArg(n) => write!(f, "LoadArg {}", n),
            Instruction::StoreLocal(n) => write!(f, "StoreLocal {}", n),
            Instruction::StoreArg(n) => write!(f, "StoreArg {}", n),
            other => write!(f, "{:?}", other.opcode()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=OpCode::StoreArg as u8 {
            let op = OpCode::from_u8(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_u8(OpCode::StoreArg as u8 + 1).is_none());
        assert!(OpCode::from_u8(255).is_none());
    }

    #[test]
    fn test_call_is_the_largest_instruction() {
        let call = Instruction::Call {
            address: 0,
            argc: 0,
        };
        assert_eq!(call.size(), MAX_INSTRUCTION_SIZE);
        for byte in 0..=OpCode::StoreArg as u8 {
            let op = OpCode::from_u8(byte).unwrap();
            assert!(1 + op.operand_size() <= MAX_INSTRUCTION_SIZE);
        }
    }

    #[test]
    fn test_little_endian_layout() {
        let mut code = Vec::new();
        Instruction::Call {
            address: 0x0102,
            argc: 3,
        }
        .encode(&mut code);
        assert_eq!(
            code,
            vec![OpCode::Call as u8, 0x02, 0x01, 0, 0, 3, 0, 0, 0]
        );

        let mut code = Vec::new();
        Instruction::PushInt(-1).encode(&mut code);
        assert_eq!(code, vec![OpCode::PushInt as u8, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_reads_immediates() {
        let mut code = Vec::new();
        Instruction::PushInt(7).encode(&mut code);
        Instruction::PushDouble(2.5).encode(&mut code);
        Instruction::Binary(OpCode::AddDouble).encode(&mut code);

        assert_eq!(Instruction::decode(&code, 0), Ok(Instruction::PushInt(7)));
        assert_eq!(Instruction::decode(&code, 5), Ok(Instruction::PushDouble(2.5)));
        assert_eq!(
            Instruction::decode(&code, 14),
            Ok(Instruction::Binary(OpCode::AddDouble))
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            Instruction::decode(&[0xEE], 0),
            Err(DecodeError::UnknownOpcode(0xEE))
        );
        assert_eq!(
            Instruction::decode(&[OpCode::Jump as u8, 0, 0], 0),
            Err(DecodeError::Truncated)
        );
        assert_eq!(Instruction::decode(&[], 0), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::PushInt(7).to_string(), "PushInt 7");
        assert_eq!(Instruction::Jump(12).to_string(), "Jump -> 0012");
        assert_eq!(
            Instruction::Call {
                address: 12,
                argc: 2
            }
            .to_string(),
            "Call 0012 args=2"
        );
        assert_eq!(Instruction::Binary(OpCode::MulInt).to_string(), "MulInt");
    }
}
