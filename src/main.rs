use clap::Parser;
use dmg_emu::gameboy::{GameBoy, DEFAULT_EMULATOR_START};
use std::path::PathBuf;
use std::process;

/// Runs a cartridge image against the CPU core.
#[derive(Parser, Debug)]
#[command(name = "dmg-emu")]
struct Args {
    /// Path to the cartridge image to run
    cartridge: PathBuf,

    /// Overrides the initial program counter
    #[arg(long = "start", value_parser = parse_hex_or_decimal, default_value_t = DEFAULT_EMULATOR_START)]
    start: u16,
}

fn parse_hex_or_decimal(s: &str) -> Result<u16, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let mut gb = GameBoy::new();
    if let Err(e) = gb.load_cartridge(&args.cartridge) {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    gb.run(args.start);
}
