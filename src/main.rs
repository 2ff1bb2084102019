//! UE1 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ue1 build <source>` - Assemble mnemonics to a binary image
//! - `ue1 emu <program>` - Run a binary image or mnemonic source
//! - `ue1 disasm <binary>` - Disassemble a binary image
//! - `ue1 panel <program>` - Interactive front panel

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Parser)]
#[command(name = "ue1")]
#[command(version = "0.1.0")]
#[command(about = "An assembler and emulator for the UE1 vacuum tube computer")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble source to a binary image
    Build {
        /// Path to the source file
        source: String,
        /// Output file (default: <source>.bin)
        #[arg(short, long)]
        output: Option<String>,
        /// Print a hex dump instead of writing a file
        #[arg(short, long)]
        dump: bool,
    },
    /// Run a program to the end
    Emu {
        /// Path to the binary image (or source file with --asm)
        program: String,
        /// Run mnemonic source instead of a binary image
        #[arg(short, long)]
        asm: bool,
        /// Only print the output register at the end
        #[arg(short, long)]
        non_interactive: bool,
        /// Simulated clock speed in Hertz
        #[arg(short, long, default_value = "60")]
        speed: u32,
        /// Input switch settings (decimal, 0x hex or 0b binary)
        #[arg(short, long, default_value = "0", value_parser = parse_switches)]
        input: u8,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Disassemble a binary image to readable text
    Disasm {
        /// Path to the binary image
        binary: String,
    },
    /// Interactive front panel
    #[cfg(feature = "tui")]
    Panel {
        /// Path to the binary image (or source file with --asm)
        program: String,
        /// Load mnemonic source instead of a binary image
        #[arg(short, long)]
        asm: bool,
        /// Clock speed in Hertz while running
        #[arg(short, long, default_value = "60")]
        speed: u32,
        /// Initial input switch settings
        #[arg(short, long, default_value = "0", value_parser = parse_switches)]
        input: u8,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Build { source, output, dump }) => {
            build(&source, output, dump);
        }
        Some(Commands::Emu { program, asm, non_interactive, speed, input, json }) => {
            emulate(&program, asm, !non_interactive, speed, input, json);
        }
        Some(Commands::Disasm { binary }) => {
            disassemble_file(&binary);
        }
        #[cfg(feature = "tui")]
        Some(Commands::Panel { program, asm, speed, input }) => {
            panel(&program, asm, speed, input);
        }
        None => {
            println!("UE1 Emulator v0.1.0");
            println!("A 1-bit vacuum tube computer emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("⚠️  Logging unavailable: {}", e);
    }
}

/// Parse an input switch value: decimal, `0x` hex or `0b` binary.
fn parse_switches(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (bin, 2)
    } else {
        (s, 10)
    };

    u8::from_str_radix(&digits.replace('_', ""), radix)
        .map_err(|e| format!("invalid switch value '{}': {}", s, e))
}

fn read_source(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    }
}

fn build(source_path: &str, output: Option<String>, dump: bool) {
    use ue1::asm::{assemble, bin_path_for, hexdump, save_image};

    let source = read_source(source_path);

    let bytes = match assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("assembled {} instructions from {}", bytes.len(), source_path);

    if dump {
        print!("{}", hexdump(&bytes));
        return;
    }

    let out_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| bin_path_for(source_path));

    match save_image(&out_path, &bytes) {
        Ok(written) => println!("Wrote {} bytes to '{}'", written, out_path.display()),
        Err(e) => {
            eprintln!("❌ Failed to save image: {}", e);
            std::process::exit(1);
        }
    }
}

fn emulate(path: &str, asm: bool, interactive: bool, speed: u32, input: u8, json: bool) {
    use ue1::{run_binary, run_mnemonic, RunConfig, TerminalConsole};

    let config = match RunConfig::new(speed, interactive) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let file = match File::open(Path::new(path)) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("❌ Failed to open {}: {}", path, e);
            std::process::exit(1);
        }
    };
    log::info!("running {} ({}) at {} Hz", path, if asm { "source" } else { "binary" }, speed);

    let mut console = TerminalConsole;
    let result = if asm {
        run_mnemonic(BufReader::new(file), config, input, &mut console)
    } else {
        run_binary(file, config, input, &mut console)
    };

    let cpu = match result {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&cpu) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn disassemble_file(path: &str) {
    use ue1::asm::{disassemble, load_image};

    let bytes = match load_image(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    match disassemble(&bytes) {
        Ok(listing) => print!("{}", listing),
        Err(e) => {
            eprintln!("❌ Decode error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "tui")]
fn panel(path: &str, asm: bool, speed: u32, input: u8) {
    use ue1::asm::{assemble_instructions, load_image};
    use ue1::cpu::decode::decode;
    use ue1::{run_panel, Instruction};

    if speed == 0 {
        eprintln!("❌ clock speed must be greater than zero");
        std::process::exit(1);
    }

    let program: Vec<Instruction> = if asm {
        match assemble_instructions(&read_source(path)) {
            Ok(instrs) => instrs,
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let bytes = match load_image(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        };
        match bytes.iter().map(|&b| decode(b)).collect::<Result<Vec<_>, _>>() {
            Ok(instrs) => instrs,
            Err(e) => {
                eprintln!("❌ Decode error: {}", e);
                std::process::exit(1);
            }
        }
    };

    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }
    log::info!("loaded {} instructions into the panel", program.len());

    if let Err(e) = run_panel(program, input, speed) {
        eprintln!("❌ Panel error: {}", e);
        std::process::exit(1);
    }
}
