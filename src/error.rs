use std::error::Error;
use std::fmt;
use std::io;

/// Startup-time failures: anything that can go wrong before the CPU starts
/// stepping. Unrecoverable conditions reached *during* execution are plain
/// panics instead (see the module docs on `cpu::instructions`).
#[derive(Debug)]
pub enum EmuError {
    Io(io::Error),
    CartridgeTooLarge { size: usize, max: usize },
    OpcodeTable(serde_json::Error),
}

impl fmt::Display for EmuError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmuError::Io(e) => write!(f, "could not read cartridge file: {}", e),
            EmuError::CartridgeTooLarge { size, max } => write!(
                f,
                "cartridge image is {} bytes, larger than the {} byte address space",
                size, max
            ),
            EmuError::OpcodeTable(e) => write!(f, "malformed opcode table: {}", e),
        }
    }
}

impl Error for EmuError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EmuError::Io(e) => Some(e),
            EmuError::CartridgeTooLarge { .. } => None,
            EmuError::OpcodeTable(e) => Some(e),
        }
    }
}

impl From<io::Error> for EmuError {
    fn from(e: io::Error) -> Self {
        EmuError::Io(e)
    }
}

impl From<serde_json::Error> for EmuError {
    fn from(e: serde_json::Error) -> Self {
        EmuError::OpcodeTable(e)
    }
}
