//! The clocked control loop.
//!
//! The stepper fetches instructions from either a mnemonic text stream or
//! a stream of instruction bytes, runs each one through the CPU, and then
//! either waits for the next clock tick and reports the machine state
//! (interactive mode) or moves straight on (batch mode).

use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::time::Duration;

use crate::asm::assembler::{parse_line, AssemblerError};
use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::execute::{Cpu, CpuError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Where an instruction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// 1-based line in a mnemonic source.
    Line(usize),
    /// 0-based offset in a binary image.
    Byte(usize),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Line(line) => write!(f, "line {}", line),
            Position::Byte(offset) => write!(f, "byte {:#05X}", offset),
        }
    }
}

/// A fetched instruction and its position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched {
    pub position: Position,
    pub instruction: Instruction,
}

impl Fetched {
    /// How the address is shown in reports: the mnemonic for text
    /// sources, the raw hex field for binary ones.
    pub fn address_label(&self) -> String {
        match self.position {
            Position::Line(_) => self.instruction.address.to_string(),
            Position::Byte(_) => format!("{:02X}", self.instruction.address.field()),
        }
    }
}

/// Run settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Clock rate in ticks per second.
    pub speed: u32,
    /// Pace and report every instruction.
    pub interactive: bool,
}

impl RunConfig {
    /// Default clock rate in Hz.
    pub const DEFAULT_SPEED: u32 = 60;

    pub fn new(speed: u32, interactive: bool) -> Result<Self, EmuError> {
        if speed == 0 {
            return Err(EmuError::InvalidSpeed(speed));
        }
        Ok(Self { speed, interactive })
    }

    /// Unpaced, silent until the end.
    pub fn batch() -> Self {
        Self {
            speed: Self::DEFAULT_SPEED,
            interactive: false,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            speed: Self::DEFAULT_SPEED,
            interactive: true,
        }
    }
}

/// The lamps and bell the stepper reports through.
pub trait Console {
    /// The IOC strobe fired.
    fn alert(&mut self) {}

    /// An instruction finished in interactive mode.
    fn report(&mut self, _fetched: &Fetched, _cpu: &Cpu) {}

    /// The program ran out in batch mode.
    fn finish(&mut self, _cpu: &Cpu) {}
}

/// Console that writes to stdout.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn alert(&mut self) {
        // BEL, audible depending on terminal settings
        print!("\x07");
        let _ = std::io::stdout().flush();
    }

    fn report(&mut self, fetched: &Fetched, cpu: &Cpu) {
        println!("INSTRUCTION   :  {}", fetched.instruction.opcode);
        println!("MEMORY ADDRESS:  {}", fetched.address_label());
        print!("{}", state_dump(cpu));
    }

    fn finish(&mut self, cpu: &Cpu) {
        println!("{}", output_summary(cpu));
    }
}

/// Full register and flag dump.
pub fn state_dump(cpu: &Cpu) -> String {
    let regs = &cpu.regs;
    let flags = &cpu.flags;
    let bit = |b: bool| u8::from(b);

    let mut out = String::new();
    out.push_str("--------------------\n");
    out.push_str("REGISTERS\n");
    out.push_str(&format!("CARRY     = {}\n", regs.carry));
    out.push_str(&format!("RESULTS   = {}\n", regs.rr));
    out.push_str(&format!("INPUT EN  = {}\n", regs.ien));
    out.push_str(&format!("OUTPUT EN = {}\n", regs.oen));
    out.push_str(&format!("SCRATCH   = {:08b} ({})\n", regs.scratch, regs.scratch));
    out.push_str(&format!("OUTPUT    = {:08b} ({})\n", regs.output, regs.output));
    out.push_str(&format!("INPUT SW. = {:08b}\n\n", regs.input));
    out.push_str("FLAGS\n");
    out.push_str(&format!("FLAG 0    = {}\n", bit(flags.zero)));
    out.push_str(&format!("WRITE     = {}\n", bit(flags.write)));
    out.push_str(&format!("I/O CON   = {}\n", bit(flags.io_control)));
    out.push_str(&format!("RETURN    = {}\n", bit(flags.rtn)));
    out.push_str(&format!("SKIP Z    = {}\n", bit(flags.skz)));
    out.push_str(&format!("FLAG F    = {}\n\n", bit(flags.f)));
    out
}

/// The one-line summary printed at the end of a batch run.
pub fn output_summary(cpu: &Cpu) -> String {
    format!("OUTPUT    = {:08b} ({})", cpu.regs.output, cpu.regs.output)
}

/// A periodic clock gate on a current-thread Tokio runtime.
pub struct Clock {
    runtime: Runtime,
    interval: Interval,
}

impl Clock {
    /// Build a clock ticking `hz` times per second. The first tick lands
    /// one full period after creation.
    pub fn new(hz: u32) -> Result<Self, EmuError> {
        if hz == 0 {
            return Err(EmuError::InvalidSpeed(hz));
        }

        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| EmuError::IoError(e.to_string()))?;

        let period = (Duration::from_secs(1) / hz).max(Duration::from_nanos(1));
        let interval = runtime.block_on(async {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        Ok(Self { runtime, interval })
    }

    /// Block until the next tick.
    pub fn tick(&mut self) {
        self.runtime.block_on(self.interval.tick());
    }
}

/// Instructions read line by line from mnemonic source.
pub struct MnemonicSource<R> {
    lines: std::io::Lines<R>,
    line_num: usize,
}

impl<R: BufRead> MnemonicSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
        }
    }
}

impl<R: BufRead> Iterator for MnemonicSource<R> {
    type Item = Result<Fetched, EmuError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.lines.next()?;
            self.line_num += 1;
            let line = match next {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(EmuError::Read {
                        position: Position::Line(self.line_num),
                        message: e.to_string(),
                    }))
                }
            };

            match parse_line(&line, self.line_num) {
                Ok(Some(instruction)) => {
                    return Some(Ok(Fetched {
                        position: Position::Line(self.line_num),
                        instruction,
                    }))
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Instructions read one byte at a time from a binary image.
pub struct BinarySource<R> {
    bytes: std::io::Bytes<BufReader<R>>,
    offset: usize,
}

impl<R: Read> BinarySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: BufReader::new(reader).bytes(),
            offset: 0,
        }
    }
}

impl<R: Read> Iterator for BinarySource<R> {
    type Item = Result<Fetched, EmuError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        let byte = match self.bytes.next()? {
            Ok(byte) => byte,
            Err(e) => {
                return Some(Err(EmuError::Read {
                    position: Position::Byte(offset),
                    message: e.to_string(),
                }))
            }
        };
        self.offset += 1;

        Some(
            decode::decode(byte)
                .map(|instruction| Fetched {
                    position: Position::Byte(offset),
                    instruction,
                })
                .map_err(|source| EmuError::Decode { offset, source }),
        )
    }
}

/// Drives a [`Cpu`] through a stream of instructions.
pub struct Stepper<'a, C: Console> {
    cpu: Cpu,
    config: RunConfig,
    console: &'a mut C,
    clock: Option<Clock>,
}

impl<'a, C: Console> Stepper<'a, C> {
    pub fn new(cpu: Cpu, config: RunConfig, console: &'a mut C) -> Result<Self, EmuError> {
        let clock = if config.interactive {
            Some(Clock::new(config.speed)?)
        } else {
            None
        };

        Ok(Self {
            cpu,
            config,
            console,
            clock,
        })
    }

    /// Current machine state.
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Execute, write back and report one instruction.
    pub fn step(&mut self, fetched: Fetched) -> Result<(), EmuError> {
        log::debug!("{}: {}", fetched.position, fetched.instruction);

        let outcome = self
            .cpu
            .step(fetched.instruction)
            .map_err(|source| EmuError::Execute {
                position: fetched.position,
                source,
            })?;

        if outcome.alert {
            self.console.alert();
        }

        if let Some(clock) = self.clock.as_mut() {
            clock.tick();
            self.console.report(&fetched, &self.cpu);
        }

        self.cpu.end_instruction();
        Ok(())
    }

    /// Run until the source is exhausted or an instruction fails.
    pub fn run<I>(mut self, source: I) -> Result<Cpu, EmuError>
    where
        I: IntoIterator<Item = Result<Fetched, EmuError>>,
    {
        for fetched in source {
            self.step(fetched?)?;
        }

        log::info!("halted after {} instructions", self.cpu.cycles);
        if !self.config.interactive {
            self.console.finish(&self.cpu);
        }
        Ok(self.cpu)
    }
}

/// Run a mnemonic program.
pub fn run_mnemonic<R, C>(reader: R, config: RunConfig, input: u8, console: &mut C) -> Result<Cpu, EmuError>
where
    R: BufRead,
    C: Console,
{
    Stepper::new(Cpu::with_input(input), config, console)?.run(MnemonicSource::new(reader))
}

/// Run a binary program.
pub fn run_binary<R, C>(reader: R, config: RunConfig, input: u8, console: &mut C) -> Result<Cpu, EmuError>
where
    R: Read,
    C: Console,
{
    Stepper::new(Cpu::with_input(input), config, console)?.run(BinarySource::new(reader))
}

/// Errors that stop a run.
#[derive(Debug, Clone, Error)]
pub enum EmuError {
    #[error("{0}")]
    Assembler(#[from] AssemblerError),

    #[error("decode error at byte {offset:#05X}: {source}")]
    Decode { offset: usize, source: DecodeError },

    #[error("execution error at {position}: {source}")]
    Execute { position: Position, source: CpuError },

    #[error("clock speed must be greater than zero, got {0}")]
    InvalidSpeed(u32),

    #[error("read error at {position}: {message}")]
    Read { position: Position, message: String },

    #[error("I/O error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{Address, Opcode};
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        alerts: usize,
        reports: Vec<(String, String, bool)>,
        summary: Option<String>,
    }

    impl Console for Recorder {
        fn alert(&mut self) {
            self.alerts += 1;
        }

        fn report(&mut self, fetched: &Fetched, cpu: &Cpu) {
            self.reports.push((
                fetched.instruction.opcode.to_string(),
                fetched.address_label(),
                cpu.flags.write,
            ));
        }

        fn finish(&mut self, cpu: &Cpu) {
            self.summary = Some(output_summary(cpu));
        }
    }

    #[test]
    fn test_config_rejects_zero_speed() {
        assert!(matches!(RunConfig::new(0, true), Err(EmuError::InvalidSpeed(0))));
        assert!(RunConfig::new(1, false).is_ok());
    }

    #[test]
    fn test_mnemonic_source_skips_comments() {
        let src = "; header\n\n  ld sr1 ; load\n;\nSTO OR2\n";
        let fetched: Vec<_> = MnemonicSource::new(Cursor::new(src))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].position, Position::Line(3));
        assert_eq!(fetched[0].instruction, Instruction::new(Opcode::Ld, Address::Scratch(1)));
        assert_eq!(fetched[1].position, Position::Line(5));
        assert_eq!(fetched[1].instruction, Instruction::new(Opcode::Sto, Address::Output(2)));
    }

    #[test]
    fn test_binary_source_offsets() {
        let fetched: Vec<_> = BinarySource::new(Cursor::new(vec![0x40u8, 0xB8, 0x88]))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(fetched[2].position, Position::Byte(2));
        assert_eq!(fetched[2].instruction, Instruction::new(Opcode::Sto, Address::Output(0)));
        assert_eq!(fetched[2].address_label(), "08");
    }

    #[test]
    fn test_batch_run_reports_output_once() {
        let mut console = Recorder::default();
        let src = "ONE RR\nOEN RR\nSTO OR0\n";

        let cpu = run_mnemonic(Cursor::new(src), RunConfig::batch(), 0, &mut console).unwrap();

        assert_eq!(cpu.regs.output, 1);
        assert!(!cpu.flags.write);
        assert!(console.reports.is_empty());
        assert_eq!(console.summary.as_deref(), Some("OUTPUT    = 00000001 (1)"));
    }

    #[test]
    fn test_interactive_report_sees_write_flag() {
        let mut console = Recorder::default();
        let config = RunConfig::new(10_000, true).unwrap();
        let program = [0x48u8, 0xB8, 0x8A, 0xC8];

        let cpu = run_binary(Cursor::new(program), config, 0, &mut console).unwrap();

        assert_eq!(cpu.regs.output, 0b0000_0100);
        assert_eq!(console.alerts, 1);
        assert!(console.summary.is_none());
        assert_eq!(
            console.reports,
            vec![
                ("ONE".to_string(), "08".to_string(), false),
                ("OEN".to_string(), "08".to_string(), false),
                ("STO".to_string(), "0A".to_string(), true),
                ("IOC".to_string(), "08".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_syntax_error_carries_line() {
        let mut console = Recorder::default();
        let err = run_mnemonic(Cursor::new("ONE RR\nLD OR2\n"), RunConfig::batch(), 0, &mut console)
            .unwrap_err();

        match err {
            EmuError::Assembler(AssemblerError::OutputRequiresStore { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected error: {}", other),
        }
        assert!(console.summary.is_none());
    }

    #[test]
    fn test_invalid_utf8_names_line() {
        let mut console = Recorder::default();
        let src: &[u8] = b"ONE RR\nOEN RR\nSTO \xFF\xFE\n";

        let err = run_mnemonic(Cursor::new(src), RunConfig::batch(), 0, &mut console).unwrap_err();

        assert!(matches!(err, EmuError::Read { position: Position::Line(3), .. }));
        assert!(err.to_string().contains("line 3"), "{}", err);
        assert!(console.summary.is_none());
    }

    #[test]
    fn test_binary_read_failure_names_offset() {
        struct Failing(usize);

        impl Read for Failing {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0 == 0 {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, "bus fault"));
                }
                self.0 -= 1;
                buf[0] = 0x48;
                Ok(1)
            }
        }

        let mut console = Recorder::default();
        let err = run_binary(Failing(2), RunConfig::batch(), 0, &mut console).unwrap_err();

        assert!(matches!(err, EmuError::Read { position: Position::Byte(2), .. }));
        assert!(err.to_string().contains("bus fault"), "{}", err);
    }

    #[test]
    fn test_input_switches_seed_run() {
        let mut console = Recorder::default();
        let src = "ONE RR\nIEN RR\nOEN RR\nLD IR5\nSTO SR0\n";

        let cpu = run_mnemonic(Cursor::new(src), RunConfig::batch(), 0b0010_0000, &mut console).unwrap();

        assert_eq!(cpu.regs.scratch, 1);
        assert_eq!(cpu.regs.input, 0b0010_0000);
    }

    #[test]
    fn test_manual_stepping_clears_write() {
        let mut console = Recorder::default();
        let mut stepper = Stepper::new(Cpu::new(), RunConfig::batch(), &mut console).unwrap();

        for (line, byte) in [0x48u8, 0xB8, 0x8F].into_iter().enumerate() {
            let fetched = Fetched {
                position: Position::Line(line + 1),
                instruction: decode::decode(byte).unwrap(),
            };
            stepper.step(fetched).unwrap();
        }

        assert_eq!(stepper.cpu().regs.output, 0b1000_0000);
        assert!(!stepper.cpu().flags.write);
        assert_eq!(stepper.cpu().cycles, 3);
    }

    #[test]
    fn test_state_dump_layout() {
        let mut cpu = Cpu::with_input(0b1000_0000);
        cpu.regs.output = 5;
        let dump = state_dump(&cpu);

        assert!(dump.starts_with("--------------------\nREGISTERS\n"));
        assert!(dump.contains("OUTPUT    = 00000101 (5)\n"));
        assert!(dump.contains("INPUT SW. = 10000000\n"));
        assert!(dump.contains("WRITE     = 0\n"));
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::Line(12).to_string(), "line 12");
        assert_eq!(Position::Byte(2).to_string(), "byte 0x002");
    }
}
