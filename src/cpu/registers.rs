//! UE1 register file.
//!
//! The UE1 has four 1-bit registers and three 8-bit registers:
//! - RR: 1-bit result register (the accumulator)
//! - Carry: 1-bit carry out of the last ADD/SUB
//! - IEN / OEN: 1-bit input and output enables
//! - Scratch: 8 bits of working storage (SR0-SR7)
//! - Output: 8 output lamps (OR0-OR7)
//! - Input: 8 input switches (IR1-IR7, bit 0 is not wired)

use serde::{Deserialize, Serialize};

/// An 8-bit register that can be the target of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// The output lamps.
    Output,
    /// The scratch register.
    Scratch,
}

/// The UE1 register file.
///
/// Single-bit registers are stored as `u8` holding 0 or 1 so the ALU can
/// add them directly, the way the hardware sums lines.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Carry out of the last ADD or SUB.
    pub carry: u8,

    /// Input enable. Gates LD, ADD, SUB, NAND, OR and XOR.
    pub ien: u8,

    /// Output enable. Gates STO and STOC.
    pub oen: u8,

    /// Result register.
    pub rr: u8,

    /// Scratch register, SR0-SR7.
    pub scratch: u8,

    /// Output register, OR0-OR7.
    pub output: u8,

    /// Input switches, IR1-IR7. Never written by the CPU.
    pub input: u8,
}

impl Registers {
    /// Create a zeroed register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zeroed register file with the input switches preset.
    pub fn with_input(input: u8) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    /// Reset everything except the input switches.
    pub fn reset(&mut self) {
        *self = Self::with_input(self.input);
    }

    /// Value of one of the 8-bit storage registers.
    pub fn storage(&self, target: Target) -> u8 {
        match target {
            Target::Output => self.output,
            Target::Scratch => self.scratch,
        }
    }

    /// Mutable access to one of the 8-bit storage registers.
    pub fn storage_mut(&mut self, target: Target) -> &mut u8 {
        match target {
            Target::Output => &mut self.output,
            Target::Scratch => &mut self.scratch,
        }
    }
}

/// Latched control flags.
///
/// Apart from `write`, nothing on the board clears these once set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    /// Set by NOP0.
    pub zero: bool,
    /// Set by STO/STOC when OEN is high. Cleared after every instruction.
    pub write: bool,
    /// Set by IOC.
    pub io_control: bool,
    /// Set by RTN.
    pub rtn: bool,
    /// Set by SKZ.
    pub skz: bool,
    /// Set by NOPF.
    pub f: bool,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }
}
