//! Loads the external opcode descriptor table. This table backs the
//! disassembler (mnemonic text, operand rendering, instruction length)
//! and is otherwise independent of the instruction engine: the engine's
//! behavior comes from `cpu::instructions`, not from anything parsed
//! here.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const OPCODES_JSON: &str = include_str!("opcodes.json");

/// A single byte used as a map key in the source JSON, written as a
/// quoted hex string like `"0x1A"`. Mirrors the `RemoveQuotes` then
/// `RemoveHexPrefix` parsing used by the table this was ported from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ByteKey(pub u8);

impl<'de> Deserialize<'de> for ByteKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ByteKeyVisitor;

        impl<'de> Visitor<'de> for ByteKeyVisitor {
            type Value = ByteKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(r#"a one-byte hex string like "0x1A""#)
            }

            fn visit_str<E>(self, v: &str) -> Result<ByteKey, E>
            where
                E: de::Error,
            {
                let trimmed = v.trim().trim_matches('"');
                let without_prefix = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .unwrap_or(trimmed);
                let byte = u8::from_str_radix(without_prefix, 16).map_err(|e| {
                    de::Error::custom(format!("invalid opcode key {:?}: {}", v, e))
                })?;
                Ok(ByteKey(byte))
            }
        }

        deserializer.deserialize_str(ByteKeyVisitor)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Operand {
    pub name: String,
    #[serde(default)]
    pub bytes: Option<u8>,
    pub immediate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Flags {
    #[serde(rename = "Z")]
    pub z: String,
    #[serde(rename = "N")]
    pub n: String,
    #[serde(rename = "H")]
    pub h: String,
    #[serde(rename = "C")]
    pub c: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Opcode {
    pub mnemonic: String,
    pub bytes: u8,
    pub cycles: Vec<u8>,
    pub operands: Vec<Operand>,
    pub immediate: bool,
    pub flags: Flags,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OpcodeTable {
    pub unprefixed: HashMap<ByteKey, Opcode>,
    pub cbprefixed: HashMap<ByteKey, Opcode>,
}

impl OpcodeTable {
    pub fn load_embedded() -> OpcodeTable {
        serde_json::from_str(OPCODES_JSON).expect("embedded opcode table is malformed")
    }

    pub fn parse(json: &str) -> Result<OpcodeTable, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn lookup(&self, prefixed: bool, opcode: u8) -> Option<&Opcode> {
        let table = if prefixed {
            &self.cbprefixed
        } else {
            &self.unprefixed
        };
        table.get(&ByteKey(opcode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_key_parses_quoted_hex_strings() {
        let key: ByteKey = serde_json::from_str("\"0x1A\"").unwrap();
        assert_eq!(key.0, 0x1A);
    }

    #[test]
    fn embedded_table_loads_and_has_both_partitions() {
        let table = OpcodeTable::load_embedded();
        assert!(!table.unprefixed.is_empty());
        assert!(!table.cbprefixed.is_empty());
        let nop = table.lookup(false, 0x00).expect("0x00 should be NOP");
        assert_eq!(nop.mnemonic, "NOP");
        assert_eq!(nop.bytes, 1);
    }

    #[test]
    fn prefixed_lookup_is_distinct_from_unprefixed() {
        let table = OpcodeTable::load_embedded();
        let unprefixed_00 = table.lookup(false, 0x00).unwrap();
        let prefixed_00 = table.lookup(true, 0x00).unwrap();
        assert_ne!(unprefixed_00.mnemonic, prefixed_00.mnemonic);
    }
}
