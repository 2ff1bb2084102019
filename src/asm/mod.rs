//! Assembler and disassembler for UE1 programs.
//!
//! This module provides:
//! - An assembler (mnemonic text → one byte per instruction)
//! - A disassembler (bytes → readable text)
//! - Program image files and a hex dump view

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, assemble_instructions, parse_line, AssemblerError};
pub use disasm::disassemble;
pub use image::{bin_path_for, hexdump, load_image, save_image, ImageError};
