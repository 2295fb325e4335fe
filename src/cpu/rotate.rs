//! The four rotate families. Every variant clears N and H and writes
//! the bit shifted out into C; the only thing that differs between the
//! accumulator opcodes (`RLCA`/`RRCA`/`RLA`/`RRA`) and the prefixed
//! register/`[HL]` forms (`RLC r` etc.) is whether Z is computed or
//! simply cleared - hence the explicit `compute_zero` flag threaded
//! through every function here instead of two near-duplicate copies.

use crate::cpu::{Flag, Registers};

fn finish(regs: &mut Registers, result: u8, carry_out: bool, compute_zero: bool) -> u8 {
    regs.set_flag(Flag::Z, compute_zero && result == 0);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::C, carry_out);
    result
}

/// RLC / RLCA: rotate left, bit 7 re-enters at bit 0 and becomes C.
pub fn rotate_left_circular(regs: &mut Registers, value: u8, compute_zero: bool) -> u8 {
    let carry_out = value & 0x80 != 0;
    let result = value.rotate_left(1);
    finish(regs, result, carry_out, compute_zero)
}

/// RRC / RRCA: rotate right, bit 0 re-enters at bit 7 and becomes C.
pub fn rotate_right_circular(regs: &mut Registers, value: u8, compute_zero: bool) -> u8 {
    let carry_out = value & 0x01 != 0;
    let result = value.rotate_right(1);
    finish(regs, result, carry_out, compute_zero)
}

/// RL / RLA: rotate left through carry - the old C enters at bit 0.
pub fn rotate_left(regs: &mut Registers, value: u8, compute_zero: bool) -> u8 {
    let old_carry = regs.flag(Flag::C) as u8;
    let carry_out = value & 0x80 != 0;
    let result = (value << 1) | old_carry;
    finish(regs, result, carry_out, compute_zero)
}

/// RR / RRA: rotate right through carry - the old C enters at bit 7.
pub fn rotate_right(regs: &mut Registers, value: u8, compute_zero: bool) -> u8 {
    let old_carry = regs.flag(Flag::C) as u8;
    let carry_out = value & 0x01 != 0;
    let result = (value >> 1) | (old_carry << 7);
    finish(regs, result, carry_out, compute_zero)
}
