use clap::Parser;
use dmg_emu::cartridge;
use std::path::PathBuf;
use std::process;

const BYTES_PER_ROW: usize = 16;

/// Prints a hex+ASCII dump of a cartridge image, for poking at a ROM
/// without wiring up the full emulator.
#[derive(Parser, Debug)]
#[command(name = "dmg-hexdump")]
struct Args {
    /// Path to the file to dump
    file: PathBuf,
}

fn replace_non_printable(byte: u8) -> char {
    if byte < 0x20 || byte > 0x7E {
        '.'
    } else {
        byte as char
    }
}

fn print_data(data: &[u8]) {
    for (row_index, row) in data.chunks(BYTES_PER_ROW).enumerate() {
        let offset = row_index * BYTES_PER_ROW;
        let hex: Vec<String> = row.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = row.iter().map(|&b| replace_non_printable(b)).collect();
        println!("{:08X}  {:<48}  {}", offset, hex.join(" "), ascii);
    }
}

fn main() {
    let args = Args::parse();

    let data = match cartridge::read_file(&args.file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    print_data(&data);
}
