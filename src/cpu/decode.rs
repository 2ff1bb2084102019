//! Instruction decoder for the UE1.
//!
//! Every instruction is a single byte: the high nibble selects one of the
//! 16 opcodes and the low nibble is a 4-bit address field. The meaning of
//! the address field depends on the opcode. Field 0x8 reads RR for every
//! opcode except STO and STOC, which write OR0 instead, and fields 0x9-0xF
//! read IR1-IR7 unless the opcode is a store, in which case they select
//! OR1-OR7.

use std::fmt;

use crate::cpu::registers::Target;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The 16 UE1 opcodes, in nibble order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// No operation, raises the zero flag.
    Nop0 = 0x0,
    /// RR := bit
    Ld = 0x1,
    /// RR, carry := RR + carry + bit
    Add = 0x2,
    /// RR, carry := RR + carry + !bit
    Sub = 0x3,
    /// RR := 1, carry := 0
    One = 0x4,
    /// RR := !(RR & bit)
    Nand = 0x5,
    /// RR := RR | bit
    Or = 0x6,
    /// RR := RR ^ bit
    Xor = 0x7,
    /// bit := RR
    Sto = 0x8,
    /// bit := !RR
    Stoc = 0x9,
    /// IEN := bit
    Ien = 0xA,
    /// OEN := bit
    Oen = 0xB,
    /// I/O control strobe.
    Ioc = 0xC,
    /// Return flag.
    Rtn = 0xD,
    /// Skip-if-zero flag.
    Skz = 0xE,
    /// No operation, raises the F flag.
    Nopf = 0xF,
}

impl Opcode {
    /// All opcodes, indexed by nibble value.
    pub const ALL: [Opcode; 16] = [
        Opcode::Nop0,
        Opcode::Ld,
        Opcode::Add,
        Opcode::Sub,
        Opcode::One,
        Opcode::Nand,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Sto,
        Opcode::Stoc,
        Opcode::Ien,
        Opcode::Oen,
        Opcode::Ioc,
        Opcode::Rtn,
        Opcode::Skz,
        Opcode::Nopf,
    ];

    /// Decode an opcode from its nibble value (0x0-0xF).
    pub fn from_nibble(nibble: u8) -> Result<Self, DecodeError> {
        Self::ALL
            .get(nibble as usize)
            .copied()
            .ok_or(DecodeError::InvalidOpcode(nibble))
    }

    /// The opcode's nibble value.
    pub const fn nibble(self) -> u8 {
        self as u8
    }

    /// Canonical upper-case mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop0 => "NOP0",
            Opcode::Ld => "LD",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::One => "ONE",
            Opcode::Nand => "NAND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Sto => "STO",
            Opcode::Stoc => "STOC",
            Opcode::Ien => "IEN",
            Opcode::Oen => "OEN",
            Opcode::Ioc => "IOC",
            Opcode::Rtn => "RTN",
            Opcode::Skz => "SKZ",
            Opcode::Nopf => "NOPF",
        }
    }

    /// Look up an opcode by mnemonic, ignoring case.
    pub fn from_mnemonic(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(token))
    }

    /// STO and STOC are the only opcodes that drive the write line, and
    /// the only ones that see the output register on the address bus.
    pub const fn is_store(self) -> bool {
        matches!(self, Opcode::Sto | Opcode::Stoc)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

/// A resolved address operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// SR0-SR7: bit `n` of the scratch register.
    Scratch(u8),
    /// RR: the result register.
    Result,
    /// OR0-OR7: bit `n` of the output register. Store opcodes only.
    Output(u8),
    /// IR1-IR7: bit `n` of the input switches.
    Input(u8),
}

impl Address {
    /// Resolve a raw 4-bit address field against the opcode it travels with.
    pub fn resolve(field: u8, opcode: Opcode) -> Result<Self, DecodeError> {
        match field {
            0x0..=0x7 => Ok(Address::Scratch(field)),
            0x8..=0xF if opcode.is_store() => Ok(Address::Output(field - 0x8)),
            0x8 => Ok(Address::Result),
            0x9..=0xF => Ok(Address::Input(field - 0x8)),
            _ => Err(DecodeError::InvalidAddress(field)),
        }
    }

    /// The 4-bit field this address encodes to.
    pub const fn field(self) -> u8 {
        match self {
            Address::Scratch(n) => n,
            Address::Result => 0x8,
            Address::Output(n) | Address::Input(n) => 0x8 + n,
        }
    }

    /// The register a store through this address would write.
    pub const fn target(self) -> Option<Target> {
        match self {
            Address::Scratch(_) => Some(Target::Scratch),
            Address::Output(_) => Some(Target::Output),
            Address::Result | Address::Input(_) => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Scratch(n) => write!(f, "SR{}", n),
            Address::Result => f.write_str("RR"),
            Address::Output(n) => write!(f, "OR{}", n),
            Address::Input(n) => write!(f, "IR{}", n),
        }
    }
}

/// A decoded UE1 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub address: Address,
}

impl Instruction {
    pub fn new(opcode: Opcode, address: Address) -> Self {
        Self { opcode, address }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<4} {}", self.opcode, self.address)
    }
}

/// Decode an instruction from a separate opcode nibble and address field.
pub fn decode_fields(opcode: u8, field: u8) -> Result<Instruction, DecodeError> {
    let opcode = Opcode::from_nibble(opcode)?;
    let address = Address::resolve(field, opcode)?;
    Ok(Instruction { opcode, address })
}

/// Decode a single instruction byte.
pub fn decode(byte: u8) -> Result<Instruction, DecodeError> {
    decode_fields(byte >> 4, byte & 0x0F)
}

/// Encode an instruction back to its byte.
pub fn encode(instr: &Instruction) -> u8 {
    (instr.opcode.nibble() << 4) | instr.address.field()
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode nibble: {0:#X}")]
    InvalidOpcode(u8),

    #[error("invalid address field: {0:#X}")]
    InvalidAddress(u8),
}
