//! Front panel state and logic.

use std::time::Duration;

use crate::{Cpu, Instruction};

/// Front panel application state.
pub struct PanelApp {
    /// The machine on the bench.
    pub cpu: Cpu,
    /// The loaded program.
    pub program: Vec<Instruction>,
    /// Index of the next instruction to execute.
    pub pc: usize,
    /// Is the clock running?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Clock rate in Hz while running.
    pub speed: u32,
    /// Number of IOC strobes seen.
    pub alerts: u64,
}

impl PanelApp {
    /// Create a panel with a loaded program.
    pub fn new(program: Vec<Instruction>, input: u8, speed: u32) -> Self {
        Self {
            cpu: Cpu::with_input(input),
            program,
            pc: 0,
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            speed: speed.max(1),
            alerts: 0,
        }
    }

    /// Has every instruction been executed?
    pub fn finished(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        let Some(&instr) = self.program.get(self.pc) else {
            self.status = format!("Program finished after {} instructions", self.cpu.cycles);
            self.running = false;
            return;
        };

        // the write lamp stays lit until the next instruction starts
        self.cpu.end_instruction();

        match self.cpu.step(instr) {
            Ok(outcome) => {
                if outcome.alert {
                    self.alerts += 1;
                }
                self.status = format!("{:03}: {}", self.pc, instr);
                self.pc += 1;
            }
            Err(e) => {
                self.status = format!("Error at {:03}: {}", self.pc, e);
                self.running = false;
            }
        }
    }

    /// Start the clock.
    pub fn run(&mut self) {
        self.running = true;
        self.status = format!("Running at {} Hz...", self.speed);
    }

    /// Stop the clock.
    pub fn pause(&mut self) {
        self.running = false;
        self.status = "Paused.".into();
    }

    /// One clock tick of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.finished() {
            self.running = false;
            self.status = format!("Program finished after {} instructions", self.cpu.cycles);
            return;
        }

        self.step();
    }

    /// Flip input switch `n` (1-7).
    pub fn toggle_switch(&mut self, n: u8) {
        if !(1..=7).contains(&n) {
            return;
        }
        self.cpu.regs.input ^= 1 << n;
        let state = if self.cpu.regs.input & (1 << n) != 0 { "on" } else { "off" };
        self.status = format!("Switch IR{} {}", n, state);
    }

    /// Reset the machine and rewind the program. Switches stay put.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.pc = 0;
        self.running = false;
        self.alerts = 0;
        self.status = "Reset. Ready.".into();
    }

    /// Time between clock ticks.
    pub fn period(&self) -> Duration {
        (Duration::from_secs(1) / self.speed).max(Duration::from_millis(1))
    }

    /// Program listing around the next instruction.
    pub fn get_listing(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let start = self.pc.saturating_sub(lines / 2);

        self.program
            .iter()
            .enumerate()
            .skip(start)
            .take(lines)
            .map(|(addr, instr)| (addr, instr.to_string(), addr == self.pc))
            .collect()
    }
}

/// Run the front panel with a program.
pub fn run_panel(program: Vec<Instruction>, input: u8, speed: u32) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = PanelApp::new(program, input, speed);

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        let timeout = if app.running { app.period() } else { Duration::from_millis(50) };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => app.pause(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Char(c @ '1'..='7') => app.toggle_switch(c as u8 - b'0'),
                        _ => {}
                    }
                }
            }
        } else if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
