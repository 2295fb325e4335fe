//! A read-only pass over a byte buffer: looks up each opcode in the
//! descriptor table, renders its operands, and advances by the
//! descriptor's declared length. Never touches a `Cpu` or an
//! `AddressSpace` - it only needs a slice and a starting address.

use crate::opcodes::OpcodeTable;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone)]
pub struct Record {
    pub start_address: u16,
    pub end_address: u16,
    pub text: String,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x}  {}", self.start_address, self.text)
    }
}

fn read_u16_le(bytes: &[u8]) -> u16 {
    let mut cursor = Cursor::new(bytes);
    cursor.read_u16::<LittleEndian>().unwrap()
}

fn render_operand(name: &str, immediate: bool, operand_bytes: &[u8]) -> String {
    let rendered = match name {
        "n8" | "a8" => format!("{:#04x}", operand_bytes[0]),
        "n16" | "a16" => format!("{:#06x}", read_u16_le(operand_bytes)),
        "e8" => {
            let signed = operand_bytes[0] as i8;
            format!("{} ({:#04x})", signed, operand_bytes[0])
        }
        "HLI" => return "[HL+]".to_string(),
        "HLD" => return "[HL-]".to_string(),
        rst if rst.starts_with('$') => {
            let vector = u8::from_str_radix(&rst[1..], 16).expect("RST vector is hex");
            return format!("{:#04x}(H)", vector);
        }
        digits if digits.chars().all(|c| c.is_ascii_digit()) => digits.to_string(),
        other => other.to_string(),
    };

    if immediate {
        rendered
    } else {
        format!("[{}]", rendered)
    }
}

/// Disassembles `data` starting at byte offset 0, labeling each record
/// with `base_address + offset`. Stops at the end of `data`; any
/// opcode with no descriptor is skipped as a single unknown byte
/// rather than aborting the whole pass, since a disassembler is
/// expected to tolerate data it cannot decode.
pub fn disassemble(data: &[u8], base_address: u16, table: &OpcodeTable) -> Vec<Record> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let prefixed = data[pos] == 0xCB;
        let opcode_pos = if prefixed { pos + 1 } else { pos };
        if opcode_pos >= data.len() {
            break;
        }
        let opcode_byte = data[opcode_pos];

        let descriptor = match table.lookup(prefixed, opcode_byte) {
            Some(d) => d,
            None => {
                let start = base_address.wrapping_add(pos as u16);
                records.push(Record {
                    start_address: start,
                    end_address: start.wrapping_add(1),
                    text: format!(".byte {:#04x}", data[pos]),
                });
                pos += 1;
                continue;
            }
        };

        let total_len = descriptor.bytes as usize;
        if pos + total_len > data.len() {
            break;
        }

        let prefix_len = if prefixed { 2 } else { 1 };
        let mut cursor = pos + prefix_len;
        let mut rendered_operands = Vec::new();
        for operand in &descriptor.operands {
            let width = operand.bytes.unwrap_or(match operand.name.as_str() {
                "n8" | "a8" | "e8" => 1,
                "n16" | "a16" => 2,
                _ => 0,
            }) as usize;
            let slice = &data[cursor..cursor + width];
            rendered_operands.push(render_operand(&operand.name, operand.immediate, slice));
            cursor += width;
        }

        let text = if rendered_operands.is_empty() {
            descriptor.mnemonic.clone()
        } else {
            format!("{} {}", descriptor.mnemonic, rendered_operands.join(","))
        };

        let start = base_address.wrapping_add(pos as u16);
        let end = base_address.wrapping_add((pos + total_len) as u16);
        records.push(Record {
            start_address: start,
            end_address: end,
            text,
        });

        pos += total_len;
    }

    records
}
