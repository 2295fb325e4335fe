use clap::Parser;
use dmg_emu::cartridge;
use dmg_emu::disassembler::disassemble;
use dmg_emu::gameboy::DEFAULT_DISASSEMBLER_START;
use dmg_emu::opcodes::OpcodeTable;
use std::path::PathBuf;
use std::process;

/// Disassembles a cartridge image starting at a given address.
#[derive(Parser, Debug)]
#[command(name = "dmg-disasm")]
struct Args {
    /// Path to the cartridge image to disassemble
    cartridge: PathBuf,

    /// Address to start disassembling from
    #[arg(long = "start", value_parser = parse_hex_or_decimal, default_value_t = DEFAULT_DISASSEMBLER_START)]
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

    let rom = match cartridge::read_file(&args.cartridge) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let table = OpcodeTable::load_embedded();
    let start = args.start as usize;
    if start >= rom.len() {
        eprintln!("error: start address {:#06x} is past the end of the image", args.start);
        process::exit(1);
    }

    for record in disassemble(&rom[start..], args.start, &table) {
        println!("{}", record);
    }
}
