//! # UE1 Emulator
//!
//! An assembler and emulator for the UE1, a 1-bit computer built from
//! vacuum tubes around the MC14500 industrial control unit instruction set.
//!
//! Programs are either mnemonic source or assembled bytes. Both run one
//! instruction per clock tick through the same decode, execute and
//! writeback path.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{
    run_binary, run_mnemonic, Address, Console, Cpu, CpuError, DecodeError, EmuError, Instruction,
    Opcode, Registers, RunConfig, TerminalConsole,
};
pub use asm::{assemble, disassemble, hexdump, load_image, save_image, AssemblerError, ImageError};

#[cfg(feature = "tui")]
pub use tui::run_panel;
