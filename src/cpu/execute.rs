//! CPU execution engine for the UE1.
//!
//! One instruction runs in three phases: the address decoder selects a
//! single bit, the opcode acts on that bit and the 1-bit registers, and if
//! a store was requested the writeback unit commits the new bit into the
//! selected 8-bit register.

use crate::cpu::decode::{Address, Instruction, Opcode};
use crate::cpu::registers::{Flags, Registers, Target};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The bit picked out by the address decoder for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// The address that was decoded.
    pub address: Address,
    /// Value of the selected bit (0 or 1).
    pub bit: u8,
    /// Power-of-two weight of the selected bit inside its register.
    pub weight: u8,
    /// Register a store would write, if any.
    pub target: Option<Target>,
}

/// What happened while executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub instruction: Instruction,
    /// A store was committed to scratch or output.
    pub wrote: bool,
    /// The IOC strobe fired.
    pub alert: bool,
}

/// The UE1 CPU.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Latched flags.
    pub flags: Flags,
    /// Instructions executed so far.
    pub cycles: u64,
    /// Last executed instruction.
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new CPU with the input switches preset.
    pub fn with_input(input: u8) -> Self {
        Self {
            regs: Registers::with_input(input),
            ..Self::default()
        }
    }

    /// Reset the CPU, keeping the input switches where they are.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.flags = Flags::new();
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Execute a single instruction: select, execute, write back.
    ///
    /// The write flag is left raised so the caller can observe it; clear
    /// it with [`Cpu::end_instruction`] once the instruction is reported.
    pub fn step(&mut self, instr: Instruction) -> Result<StepOutcome, CpuError> {
        let selection = self.select(instr.address)?;
        let pending = self.execute(instr.opcode, &selection);

        let wrote = match pending {
            Some(bit) if self.flags.write => {
                self.write_back(&selection, bit)?;
                true
            }
            _ => false,
        };

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(StepOutcome {
            instruction: instr,
            wrote,
            alert: instr.opcode == Opcode::Ioc,
        })
    }

    /// Drop the write line at the end of an instruction cycle.
    pub fn end_instruction(&mut self) {
        self.flags.write = false;
    }

    /// Address decode: pick one bit out of the register file.
    ///
    /// Addresses built by hand rather than decoded may name a bit the
    /// board does not have; those are rejected.
    pub fn select(&self, address: Address) -> Result<Selection, CpuError> {
        let (bit, weight) = match address {
            Address::Scratch(n @ 0..=7) => bit_of(self.regs.scratch, n),
            Address::Output(n @ 0..=7) => bit_of(self.regs.output, n),
            Address::Input(n @ 1..=7) => bit_of(self.regs.input, n),
            Address::Result => (self.regs.rr, 0),
            _ => return Err(CpuError::InvalidAddress(address)),
        };

        Ok(Selection {
            address,
            bit,
            weight,
            target: address.target(),
        })
    }

    /// Run the opcode against the selected bit.
    ///
    /// Returns the bit to store when the opcode raised the write line.
    pub fn execute(&mut self, opcode: Opcode, selection: &Selection) -> Option<u8> {
        let regs = &mut self.regs;
        let input_enabled = regs.ien == 1;
        let bit = selection.bit;

        match opcode {
            Opcode::Nop0 => self.flags.zero = true,

            Opcode::Ld => {
                if input_enabled {
                    regs.rr = bit;
                }
            }

            Opcode::Add => {
                if input_enabled {
                    let sum = regs.rr + regs.carry + bit;
                    regs.rr = sum & 1;
                    regs.carry = (sum & 0b10) >> 1;
                }
            }

            Opcode::Sub => {
                if input_enabled {
                    let inverted = !bit & 1;
                    let sum = regs.rr + regs.carry + inverted;
                    regs.rr = sum & 1;
                    regs.carry = (sum & 0b10) >> 1;
                }
            }

            Opcode::One => {
                regs.rr = 1;
                regs.carry = 0;
            }

            Opcode::Nand => {
                if input_enabled {
                    if regs.rr & bit == 1 {
                        regs.rr = 0;
                    } else if regs.rr == 0 {
                        regs.rr = 1;
                    }
                }
            }

            Opcode::Or => {
                if input_enabled {
                    regs.rr |= bit;
                }
            }

            Opcode::Xor => {
                if input_enabled {
                    regs.rr ^= bit;
                }
            }

            Opcode::Sto => {
                if regs.oen == 1 {
                    self.flags.write = true;
                    return Some(regs.rr);
                }
            }

            Opcode::Stoc => {
                if regs.oen == 1 {
                    self.flags.write = true;
                    return Some(!regs.rr & 1);
                }
            }

            Opcode::Ien => regs.ien = bit,
            Opcode::Oen => regs.oen = bit,
            Opcode::Ioc => self.flags.io_control = true,
            Opcode::Rtn => self.flags.rtn = true,
            Opcode::Skz => self.flags.skz = true,
            Opcode::Nopf => self.flags.f = true,
        }

        None
    }

    /// Commit `bit` into the selected bit of the target register.
    ///
    /// The register is adjusted by adding or subtracting the bit weight
    /// rather than masking, as the bit-serial write path does.
    pub fn write_back(&mut self, selection: &Selection, bit: u8) -> Result<(), CpuError> {
        let target = selection
            .target
            .ok_or(CpuError::NoWriteTarget(selection.address))?;
        let register = self.regs.storage_mut(target);

        if selection.bit == 1 && bit == 0 {
            *register = register.wrapping_sub(selection.weight);
        } else if selection.bit == 0 && bit == 1 {
            *register = register.wrapping_add(selection.weight);
        }

        log::trace!("{:?} <- {} via {}: {:08b}", target, bit, selection.address, *register);
        Ok(())
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("flags", &self.flags)
            .finish()
    }
}

fn bit_of(register: u8, n: u8) -> (u8, u8) {
    let weight = 1 << n;
    ((register & weight) >> n, weight)
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("address {0:?} names no bit on the board")]
    InvalidAddress(Address),

    #[error("store through {0} has no register to write")]
    NoWriteTarget(Address),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(cpu: &mut Cpu, program: &[(Opcode, Address)]) {
        for &(opcode, address) in program {
            cpu.step(Instruction::new(opcode, address)).unwrap();
            cpu.end_instruction();
        }
    }

    fn enabled() -> Cpu {
        let mut cpu = Cpu::new();
        cpu.regs.ien = 1;
        cpu.regs.oen = 1;
        cpu
    }

    #[test]
    fn test_select_bits() {
        let mut cpu = Cpu::with_input(0b0000_0100);
        cpu.regs.scratch = 0b1000_0000;
        cpu.regs.output = 0b0000_0010;
        cpu.regs.rr = 1;

        let sel = cpu.select(Address::Scratch(7)).unwrap();
        assert_eq!((sel.bit, sel.weight, sel.target), (1, 0x80, Some(Target::Scratch)));

        let sel = cpu.select(Address::Output(1)).unwrap();
        assert_eq!((sel.bit, sel.weight, sel.target), (1, 0x02, Some(Target::Output)));

        let sel = cpu.select(Address::Input(2)).unwrap();
        assert_eq!((sel.bit, sel.target), (1, None));

        let sel = cpu.select(Address::Result).unwrap();
        assert_eq!((sel.bit, sel.target), (1, None));
    }

    #[test]
    fn test_add_with_carry() {
        let mut cpu = enabled();
        cpu.regs.rr = 1;
        cpu.regs.carry = 1;
        cpu.regs.scratch = 1;

        cpu.step(Instruction::new(Opcode::Add, Address::Scratch(0))).unwrap();

        assert_eq!((cpu.regs.rr, cpu.regs.carry), (1, 1));
    }

    #[test]
    fn test_sub_adds_complement() {
        let mut cpu = enabled();
        cpu.regs.rr = 1;
        cpu.regs.carry = 1;
        cpu.regs.scratch = 1;

        cpu.step(Instruction::new(Opcode::Sub, Address::Scratch(0))).unwrap();

        assert_eq!((cpu.regs.rr, cpu.regs.carry), (0, 1));
    }

    #[test]
    fn test_sub_without_carry() {
        let mut cpu = enabled();
        // 1 - 0 with no carry in: 1 + 0 + !0 = 2
        cpu.regs.rr = 1;

        cpu.step(Instruction::new(Opcode::Sub, Address::Scratch(0))).unwrap();

        assert_eq!((cpu.regs.rr, cpu.regs.carry), (0, 1));
    }

    #[test]
    fn test_nand_truth_table() {
        for rr in 0..=1u8 {
            for bit in 0..=1u8 {
                let mut cpu = enabled();
                cpu.regs.rr = rr;
                cpu.regs.scratch = bit;

                cpu.step(Instruction::new(Opcode::Nand, Address::Scratch(0))).unwrap();

                assert_eq!(cpu.regs.rr, !(rr & bit) & 1, "rr={} bit={}", rr, bit);
            }
        }
    }

    #[test]
    fn test_or_xor() {
        let mut cpu = enabled();
        cpu.regs.scratch = 0b01;
        run(&mut cpu, &[(Opcode::Or, Address::Scratch(0))]);
        assert_eq!(cpu.regs.rr, 1);
        run(&mut cpu, &[(Opcode::Xor, Address::Scratch(0))]);
        assert_eq!(cpu.regs.rr, 0);
        run(&mut cpu, &[(Opcode::Xor, Address::Scratch(1))]);
        assert_eq!(cpu.regs.rr, 0);
    }

    #[test]
    fn test_input_gated_ops_are_noops_when_disabled() {
        let mut cpu = Cpu::new();
        cpu.regs.scratch = 1;

        for op in [Opcode::Ld, Opcode::Add, Opcode::Sub, Opcode::Nand, Opcode::Or, Opcode::Xor] {
            let before = cpu.regs.clone();
            cpu.step(Instruction::new(op, Address::Scratch(0))).unwrap();
            assert_eq!(cpu.regs, before, "{} changed state with IEN low", op);
        }
    }

    #[test]
    fn test_one_clears_carry() {
        let mut cpu = Cpu::new();
        cpu.regs.carry = 1;
        run(&mut cpu, &[(Opcode::One, Address::Result)]);
        assert_eq!((cpu.regs.rr, cpu.regs.carry), (1, 0));
    }

    #[test]
    fn test_enables_load_selected_bit() {
        let mut cpu = Cpu::new();
        run(&mut cpu, &[(Opcode::One, Address::Result), (Opcode::Ien, Address::Result), (Opcode::Oen, Address::Result)]);
        assert_eq!((cpu.regs.ien, cpu.regs.oen), (1, 1));

        run(&mut cpu, &[(Opcode::Oen, Address::Scratch(0))]);
        assert_eq!(cpu.regs.oen, 0);
    }

    #[test]
    fn test_store_gated_by_oen() {
        let mut cpu = Cpu::new();
        cpu.regs.rr = 1;

        let outcome = cpu.step(Instruction::new(Opcode::Sto, Address::Output(3))).unwrap();

        assert!(!outcome.wrote);
        assert!(!cpu.flags.write);
        assert_eq!(cpu.regs.output, 0);
    }

    #[test]
    fn test_sto_and_stoc() {
        let mut cpu = enabled();
        cpu.regs.rr = 1;
        cpu.step(Instruction::new(Opcode::Sto, Address::Output(3))).unwrap();
        assert_eq!(cpu.regs.output, 0b0000_1000);
        assert!(cpu.flags.write);

        let mut cpu = enabled();
        cpu.regs.rr = 1;
        cpu.step(Instruction::new(Opcode::Stoc, Address::Output(3))).unwrap();
        assert_eq!(cpu.regs.output, 0);

        let mut cpu = enabled();
        cpu.regs.rr = 0;
        cpu.step(Instruction::new(Opcode::Stoc, Address::Output(3))).unwrap();
        assert_eq!(cpu.regs.output, 0b0000_1000);
    }

    #[test]
    fn test_store_clears_bit() {
        let mut cpu = enabled();
        cpu.regs.scratch = 0xFF;
        cpu.regs.rr = 0;

        cpu.step(Instruction::new(Opcode::Sto, Address::Scratch(4))).unwrap();

        assert_eq!(cpu.regs.scratch, 0xEF);
    }

    #[test]
    fn test_writeback_same_value_is_stable() {
        let mut cpu = enabled();
        cpu.regs.rr = 1;
        run(&mut cpu, &[(Opcode::Sto, Address::Scratch(5)), (Opcode::Sto, Address::Scratch(5))]);
        assert_eq!(cpu.regs.scratch, 0b0010_0000);
    }

    #[test]
    fn test_out_of_range_address_is_rejected() {
        let cpu = Cpu::new();
        for address in [Address::Scratch(9), Address::Output(200), Address::Input(0), Address::Input(8)] {
            assert_eq!(cpu.select(address), Err(CpuError::InvalidAddress(address)));
        }

        let mut cpu = enabled();
        cpu.regs.rr = 1;
        let err = cpu.step(Instruction::new(Opcode::Sto, Address::Scratch(9))).unwrap_err();
        assert_eq!(err, CpuError::InvalidAddress(Address::Scratch(9)));
        assert_eq!(cpu.regs.scratch, 0);
        assert_eq!(cpu.cycles, 0);
    }

    #[test]
    fn test_writeback_without_target_fails() {
        let mut cpu = Cpu::new();
        let sel = cpu.select(Address::Input(1)).unwrap();
        assert_eq!(
            cpu.write_back(&sel, 1),
            Err(CpuError::NoWriteTarget(Address::Input(1)))
        );
    }

    #[test]
    fn test_flags_latch() {
        let mut cpu = Cpu::new();
        let outcome = cpu.step(Instruction::new(Opcode::Ioc, Address::Result)).unwrap();
        assert!(outcome.alert);

        run(&mut cpu, &[
            (Opcode::Nop0, Address::Result),
            (Opcode::Rtn, Address::Result),
            (Opcode::Skz, Address::Result),
            (Opcode::Nopf, Address::Result),
            (Opcode::One, Address::Result),
        ]);

        assert!(cpu.flags.zero);
        assert!(cpu.flags.io_control);
        assert!(cpu.flags.rtn);
        assert!(cpu.flags.skz);
        assert!(cpu.flags.f);
        assert_eq!(cpu.cycles, 6);
    }

    #[test]
    fn test_reset_forgets_program_state() {
        let mut cpu = Cpu::with_input(0b10);
        let instr = Instruction::new(Opcode::One, Address::Result);
        cpu.step(instr).unwrap();
        assert_eq!(cpu.last_instruction(), Some(instr));

        cpu.reset();

        assert_eq!(cpu.last_instruction(), None);
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs.rr, 0);
        assert_eq!(cpu.regs.input, 0b10);
    }

    #[test]
    fn test_end_instruction_drops_write() {
        let mut cpu = enabled();
        cpu.step(Instruction::new(Opcode::Sto, Address::Output(0))).unwrap();
        assert!(cpu.flags.write);
        cpu.end_instruction();
        assert!(!cpu.flags.write);
    }
}
