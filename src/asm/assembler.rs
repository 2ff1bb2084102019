//! Assembler for UE1 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! ONE  RR     ; RR := 1
//! IEN  RR     ; enable inputs
//! OEN  RR     ; enable outputs
//! LD   IR1    ; read switch 1
//! STO  OR0    ; light lamp 0
//! ```
//!
//! Every line is an opcode and one address operand. Opcodes and operands
//! are case-insensitive. `ORn` operands are only accepted with STO and
//! STOC, since the output register is only on the bus during a write.

use crate::cpu::decode::{encode, Address, Instruction, Opcode};
use thiserror::Error;

/// Assemble source code to instruction bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    Ok(assemble_instructions(source)?.iter().map(encode).collect())
}

/// Assemble source code to decoded instructions.
pub fn assemble_instructions(source: &str) -> Result<Vec<Instruction>, AssemblerError> {
    let mut output = Vec::new();
    for (line_num, line) in source.lines().enumerate() {
        if let Some(instr) = parse_line(line, line_num + 1)? {
            output.push(instr);
        }
    }
    Ok(output)
}

/// Parse one source line.
///
/// Returns `Ok(None)` for blank and comment-only lines.
pub fn parse_line(line: &str, line_num: usize) -> Result<Option<Instruction>, AssemblerError> {
    // Remove comments
    let code = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };

    let mut tokens = code.split_whitespace();
    let mnemonic = match tokens.next() {
        Some(token) => token,
        None => return Ok(None),
    };

    let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| AssemblerError::UnknownOpcode {
        line: line_num,
        mnemonic: mnemonic.to_uppercase(),
    })?;

    let operand = tokens.next().ok_or_else(|| AssemblerError::MissingOperand {
        line: line_num,
        mnemonic: opcode.mnemonic().to_string(),
    })?;

    if let Some(extra) = tokens.next() {
        return Err(AssemblerError::UnexpectedToken {
            line: line_num,
            token: extra.to_string(),
        });
    }

    let address = parse_address(operand, opcode, line_num)?;
    Ok(Some(Instruction { opcode, address }))
}

/// Address spaces an operand can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Scratch(u8),
    Output(u8),
    Input(u8),
    Result,
}

impl Operand {
    fn parse(token: &str) -> Option<Self> {
        let upper = token.to_ascii_uppercase();
        if upper == "RR" {
            return Some(Operand::Result);
        }
        if upper.len() != 3 || !upper.is_ascii() {
            return None;
        }

        let (space, digit) = upper.split_at(2);
        let n = digit.parse::<u8>().ok()?;
        match (space, n) {
            ("SR", 0..=7) => Some(Operand::Scratch(n)),
            ("OR", 0..=7) => Some(Operand::Output(n)),
            ("IR", 1..=7) => Some(Operand::Input(n)),
            _ => None,
        }
    }

    fn field(self) -> u8 {
        match self {
            Operand::Scratch(n) => n,
            Operand::Result => 0x8,
            Operand::Output(n) | Operand::Input(n) => 0x8 + n,
        }
    }
}

fn parse_address(token: &str, opcode: Opcode, line_num: usize) -> Result<Address, AssemblerError> {
    let operand = Operand::parse(token).ok_or_else(|| AssemblerError::UnknownAddress {
        line: line_num,
        operand: token.to_uppercase(),
    })?;

    if let Operand::Output(_) = operand {
        if !opcode.is_store() {
            return Err(AssemblerError::OutputRequiresStore {
                line: line_num,
                operand: token.to_uppercase(),
                mnemonic: opcode.mnemonic().to_string(),
            });
        }
    }

    // The remaining operands go on the bus as a raw field, so RR and IRn
    // alias OR0 and ORn under a store just as they do in hardware.
    Address::resolve(operand.field(), opcode).map_err(|_| AssemblerError::UnknownAddress {
        line: line_num,
        operand: token.to_uppercase(),
    })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {mnemonic} requires an address operand")]
    MissingOperand { line: usize, mnemonic: String },

    #[error("syntax error on line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    #[error("unknown opcode on line {line}: {mnemonic}")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("unknown address on line {line}: {operand}")]
    UnknownAddress { line: usize, operand: String },

    #[error("invalid address on line {line}: {operand} can only be used with STO or STOC, not {mnemonic}")]
    OutputRequiresStore {
        line: usize,
        operand: String,
        mnemonic: String,
    },
}
