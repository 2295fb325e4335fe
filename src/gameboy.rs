//! Wires the address space, register file, and cartridge loader
//! together behind the one entry point a CLI actually calls.

use crate::cartridge;
use crate::cpu::instructions::{self, Cpu};
use crate::cpu::INITIAL_SP;
use crate::error::EmuError;
use crate::memory::AddressSpace;
use log::info;
use std::path::Path;

pub const DEFAULT_EMULATOR_START: u16 = 0x0100;
pub const DEFAULT_DISASSEMBLER_START: u16 = 0x0150;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mem: AddressSpace,
}

impl GameBoy {
    pub fn new() -> GameBoy {
        GameBoy {
            cpu: Cpu::new(),
            mem: AddressSpace::new(),
        }
    }

    pub fn load_cartridge(&mut self, path: &Path) -> Result<(), EmuError> {
        let rom = cartridge::read_file(path)?;
        if let Some(header) = cartridge::parse(&rom) {
            info!(
                "cartridge \"{}\" ({}, {})",
                header.title,
                header.cartridge_type_name(),
                header.rom_size_name()
            );
        }
        cartridge::load_into(&mut self.mem, &rom)
    }

    /// Sets PC to `start_address` and SP to the documented DMG initial
    /// stack pointer, then steps forever. There is no scheduling, no
    /// interrupt servicing, and no exit condition short of an
    /// unimplemented opcode or an external signal.
    pub fn run(mut self, start_address: u16) -> ! {
        self.cpu.regs.pc = start_address;
        self.cpu.regs.sp = INITIAL_SP;
        loop {
            instructions::step(&mut self.cpu, &mut self.mem);
        }
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        GameBoy::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_cartridge_copies_rom_into_address_space() {
        let mut gb = GameBoy::new();
        let dir = std::env::temp_dir();
        let path = dir.join("dmg-emu-test-cart.gb");
        std::fs::write(&path, [0x00, 0xC3, 0x00, 0x01]).unwrap();
        gb.load_cartridge(&path).unwrap();
        assert_eq!(gb.mem.read(0), 0x00);
        assert_eq!(gb.mem.read(1), 0xC3);
        std::fs::remove_file(&path).ok();
    }
}
