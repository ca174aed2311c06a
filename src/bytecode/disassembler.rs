//! Bytecode disassembler for debugging.

use std::fmt::Write;

use crate::bytecode::compiler::CompiledProgram;
use crate::bytecode::instruction::{DecodeError, Instruction};
use crate::bytecode::program::Program;

/// Disassemble a raw program, one instruction per line.
pub fn disassemble(program: &Program) -> String {
    let mut output = String::new();
    let mut offset = 0;

    while offset < program.len() {
        offset = disassemble_instruction(program.code(), offset, &mut output);
    }

    output
}

/// Disassemble a compiled program with a header at each function start.
pub fn disassemble_compiled(compiled: &CompiledProgram) -> String {
    let code = compiled.program.code();
    let mut output = String::new();
    let mut offset = 0;

    while offset < code.len() {
        for function in compiled.functions.iter().filter(|f| f.address as usize == offset) {
            let params: Vec<String> = function.params.iter().map(|t| t.to_string()).collect();
            writeln!(
                &mut output,
                "== {}({}): {}{} ==",
                function.name,
                params.join(", "),
                function.return_type,
                if function.address == compiled.entry {
                    " [entry]"
                } else {
                    ""
                }
            )
            .unwrap();
        }
        offset = disassemble_instruction(code, offset, &mut output);
    }

    output
}

/// Disassemble a single instruction and return the offset of the next one.
/// An undecodable byte is shown on its own and skipped.
pub fn disassemble_instruction(code: &[u8], offset: usize, output: &mut String) -> usize {
    write!(output, "{:04} ", offset).unwrap();

    match Instruction::decode(code, offset) {
        Ok(instruction) => {
            writeln!(output, "{}", instruction).unwrap();
            offset + instruction.size()
        }
        Err(DecodeError::UnknownOpcode(byte)) => {
            writeln!(output, "Unknown opcode 0x{:02X}", byte).unwrap();
            offset + 1
        }
        Err(DecodeError::Truncated) => {
            writeln!(output, "Truncated instruction").unwrap();
            code.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::OpCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disassemble_program() {
        let mut program = Program::new();
        program.emit_push_int(7);
        let jump = program.emit_jump_if_true();
        program.emit_call(0, 2);
        program.emit_op(OpCode::Halt);
        program.patch_jump(jump, 19);

        assert_eq!(
            disassemble(&program),
            "0000 PushInt 7\n\
             0005 JumpIfTrue -> 0019\n\
             0010 Call 0000 args=2\n\
             0019 Halt\n"
        );
    }

    #[test]
    fn test_unknown_bytes_resynchronise() {
        let mut code = vec![0xEE];
        Instruction::Pop.encode(&mut code);
        assert_eq!(
            disassemble(&Program::from_bytes(code)),
            "0000 Unknown opcode 0xEE\n0001 Pop\n"
        );
    }

    #[test]
    fn test_truncated_tail() {
        let code = vec![OpCode::PushInt as u8, 1];
        assert_eq!(
            disassemble(&Program::from_bytes(code)),
            "0000 Truncated instruction\n"
        );
    }
}
