//! CPU emulation for the UE1.
//!
//! This module implements the UE1 bit-serial architecture:
//! - 1-bit RR, carry, IEN and OEN registers
//! - 8-bit scratch, output and input registers, addressed one bit at a time
//! - 16 opcodes with a 4-bit address field
//! - A clocked stepper that runs mnemonic or binary programs

pub mod registers;
pub mod decode;
pub mod execute;
pub mod stepper;

pub use registers::{Flags, Registers, Target};
pub use decode::{Address, DecodeError, Instruction, Opcode};
pub use execute::{Cpu, CpuError, Selection, StepOutcome};
pub use stepper::{
    run_binary, run_mnemonic, Console, EmuError, Fetched, Position, RunConfig, Stepper,
    TerminalConsole,
};
