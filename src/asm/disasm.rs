//! Disassembler for UE1 programs.
//!
//! Converts instruction bytes back to readable assembly. The address
//! field is named according to the opcode it travels with, so `0x88` is
//! `STO OR0` while `0x18` is `LD RR`.

use crate::cpu::decode::{decode, DecodeError};

/// Disassemble a single instruction byte to text.
pub fn disassemble_instruction(byte: u8) -> Result<String, DecodeError> {
    decode(byte).map(|instr| instr.to_string())
}

/// Disassemble a whole program image.
pub fn disassemble(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut output = String::new();
    output.push_str("; UE1 Disassembly\n");
    output.push_str("; ---------------\n\n");

    for (addr, byte) in bytes.iter().enumerate() {
        let line = disassemble_instruction(*byte)?;
        output.push_str(&format!("{:03}: {:<9} ; {:#04X}\n", addr, line, byte));
    }

    Ok(output)
}
