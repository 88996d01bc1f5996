//! Opcode encoders: one function per encoding *shape* shared by several
//! mnemonics, rather than one hand-written encoder per mnemonic.

use crate::error::{Error, Result};
use crate::value::Value;
use crate::Options;
use num_traits::clamp;

/// One of the FV-1's six fixed-point operand shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fixed {
    S4_6,
    S1_9,
    S_10,
    S1_14,
    S_15,
    S_23,
}

impl Fixed {
    pub fn bits(self) -> u32 {
        match self {
            Fixed::S4_6 => 11,
            Fixed::S1_9 => 11,
            Fixed::S_10 => 11,
            Fixed::S1_14 => 16,
            Fixed::S_15 => 16,
            Fixed::S_23 => 24,
        }
    }

    /// The format's integer representation of +1.0.
    pub fn reference(self) -> i64 {
        match self {
            Fixed::S4_6 => 64,
            Fixed::S1_9 => 512,
            Fixed::S_10 => 1024,
            Fixed::S1_14 => 16384,
            Fixed::S_15 => 32768,
            Fixed::S_23 => 8_388_608,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    Fixed(Fixed),
    Uint(u32),
}

fn mask(value: i64, bits: u32) -> u32 {
    let bits = bits.min(32);
    let m: u32 = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
    (value as u32) & m
}

fn range_for_bits(bits: u32) -> (i64, i64) {
    let max_unsigned = if bits >= 63 { i64::MAX } else { (1i64 << bits) - 1 };
    let min_signed = -(1i64 << (bits - 1));
    (min_signed, max_unsigned)
}

fn clamp_into_range(
    value: i64,
    min: i64,
    max: i64,
    bits: u32,
    options: &Options,
    name: &str,
    line: u32,
) -> Result<(u32, Option<String>)> {
    if value >= min && value <= max {
        Ok((mask(value, bits), None))
    } else if options.clamp {
        let clamped = clamp(value, min, max);
        Ok((
            mask(clamped, bits),
            Some(format!(
                "operand '{}' out of range ({}), clamped to {}",
                name, value, clamped
            )),
        ))
    } else {
        Err(Error::range(
            line,
            format!("operand '{}' out of range: {}", name, value),
        ))
    }
}

/// Coerces a `Value` into a bit field, applying fixed-point scaling for real
/// values assigned to a `Fixed`-shaped slot, or placing an integer value
/// directly as a (possibly two's-complement) raw bit pattern otherwise.
/// `spinreals`'s literal retagging has already happened at evaluation time.
pub fn coerce_field(
    value: Value,
    kind: FieldKind,
    options: &Options,
    name: &str,
    line: u32,
) -> Result<(u32, Option<String>)> {
    match (kind, value) {
        (FieldKind::Fixed(fmt), Value::Real(r)) => {
            let reference = fmt.reference();
            let scaled = (r * reference as f64).round() as i64;
            clamp_into_range(scaled, -reference, reference - 1, fmt.bits(), options, name, line)
        }
        (FieldKind::Fixed(fmt), Value::Integer(i)) => {
            let (min, max) = range_for_bits(fmt.bits());
            clamp_into_range(i, min, max, fmt.bits(), options, name, line)
        }
        (FieldKind::Uint(bits), Value::Integer(i)) => {
            let (min, max) = range_for_bits(bits);
            clamp_into_range(i, min, max, bits, options, name, line)
        }
        (FieldKind::Uint(_), Value::Real(_)) => Err(Error::type_error(
            line,
            format!("operand '{}' must be an integer", name),
        )),
    }
}

macro_rules! opcode {
    ($name:ident, $value:expr) => {
        pub const $name: u32 = $value;
    };
}

opcode!(OP_RDA, 0x00);
opcode!(OP_RMPA, 0x01);
opcode!(OP_WRA, 0x02);
opcode!(OP_WRAP, 0x03);
opcode!(OP_RDAX, 0x04);
opcode!(OP_RDFX, 0x05);
opcode!(OP_WRAX, 0x06);
opcode!(OP_WRHX, 0x07);
opcode!(OP_WRLX, 0x08);
opcode!(OP_MAXX, 0x09);
opcode!(OP_MULX, 0x0A);
opcode!(OP_LOG, 0x0B);
opcode!(OP_EXP, 0x0C);
opcode!(OP_SOF, 0x0D);
opcode!(OP_AND, 0x0E);
opcode!(OP_OR, 0x0F);
opcode!(OP_XOR, 0x10);
opcode!(OP_SKP, 0x11);
opcode!(OP_WLDS_WLDR, 0x12);
opcode!(OP_JAM, 0x13);
opcode!(OP_CHO, 0x14);

/// `rda`/`wra`/`wrap` shape: `MULT(S1_9) << 21 | ADDR(uint15) << 5 | opcode`.
pub fn encode_addr_mult(addr: u32, mult: u32, opcode: u32) -> u32 {
    (mult << 21) | ((addr & 0x7FFF) << 5) | opcode
}

/// `rdax`/`rdfx`/`wrax`/`wrhx`/`wrlx`/`maxx` shape:
/// `MULT(S1_14) << 16 | REG(uint6) << 5 | opcode`.
pub fn encode_reg_mult(reg: u32, mult: u32, opcode: u32) -> u32 {
    (mult << 16) | ((reg & 0x3F) << 5) | opcode
}

/// `mulx` shape: `REG(uint6) << 5 | opcode`, no coefficient field.
pub fn encode_reg(reg: u32, opcode: u32) -> u32 {
    ((reg & 0x3F) << 5) | opcode
}

/// `log`/`exp`/`sof` shape: `MULT(S1_14) << 16 | OFFSET(11 bit) << 5 | opcode`.
pub fn encode_mult_offset(mult: u32, offset: u32, opcode: u32) -> u32 {
    (mult << 16) | ((offset & 0x7FF) << 5) | opcode
}

/// `and`/`or`/`xor` shape: `VAL(S_23) << 8 | opcode`.
pub fn encode_mask(val: u32, opcode: u32) -> u32 {
    (val << 8) | opcode
}

/// `skp`/`nop`/`jmp` shape: `COND(uint5) << 27 | N(uint6) << 21 | opcode`.
pub fn encode_skp(cond: u32, offset: u32, opcode: u32) -> u32 {
    ((cond & 0x1F) << 27) | ((offset & 0x3F) << 21) | opcode
}

/// `cho` shape: type bits [30:31], flags [24:29], lfo [21:22], addr/offset
/// [5:20], opcode `0b10100`.
pub fn encode_cho(type_bits: u32, flags: u32, lfo: u32, addr: u32) -> u32 {
    ((type_bits & 0x3) << 30)
        | ((flags & 0x3F) << 24)
        | ((lfo & 0x3) << 21)
        | ((addr & 0xFFFF) << 5)
        | OP_CHO
}

/// `wlds` shape, best-effort per the FV-1 datasheet: format bit 31 = 0,
/// LFO select at bit 29, 9-bit FREQ at [28:20], 15-bit AMP at [19:5]. Not
/// bit-verified against a reference binary; see DESIGN.md.
pub fn encode_wlds(lfo_select: u32, freq: u32, amp: u32) -> u32 {
    ((lfo_select & 0x1) << 29) | ((freq & 0x1FF) << 20) | ((amp & 0x7FFF) << 5) | OP_WLDS_WLDR
}

/// `wldr` shape, best-effort: format bit 31 = 1, ramp select at bit 29,
/// 16-bit signed FREQ at [28:13], 8-bit AMP/KR at [12:5].
pub fn encode_wldr(ramp_select: u32, freq: u32, amp: u32) -> u32 {
    (1u32 << 31)
        | ((ramp_select & 0x1) << 29)
        | ((freq & 0xFFFF) << 13)
        | ((amp & 0xFF) << 5)
        | OP_WLDS_WLDR
}

/// `jam`, best-effort: ramp select at bit 6.
pub fn encode_jam(ramp_select: u32) -> u32 {
    ((ramp_select & 0x1) << 6) | OP_JAM
}

/// `raw`: the literal 32-bit value, verbatim.
pub fn encode_raw(word: u32) -> u32 {
    word
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn or_literal_matches_direct_mask() {
        let (field, _) = coerce_field(
            Value::Integer(0xc88080),
            FieldKind::Fixed(Fixed::S_23),
            &Options::default(),
            "VAL",
            1,
        )
        .unwrap();
        assert_eq!(encode_mask(field, OP_OR), 0xC880800F);
    }

    #[test]
    fn or_real_literal_scales_by_reference() {
        let (field, _) = coerce_field(
            Value::Real(-0.4335784912109375),
            FieldKind::Fixed(Fixed::S_23),
            &Options::default(),
            "VAL",
            1,
        )
        .unwrap();
        assert_eq!(encode_mask(field, OP_OR), 0xC880800F);
    }

    #[test]
    fn integer_in_fixed_slot_is_a_raw_bit_pattern_not_scaled() {
        // `rdax REG0,1` with `spinreals` off places raw integer 1 into the
        // 16-bit field rather than scaling it by S1_14's reference.
        let (field, _) = coerce_field(
            Value::Integer(1),
            FieldKind::Fixed(Fixed::S1_14),
            &Options::default(),
            "MULT",
            1,
        )
        .unwrap();
        assert_eq!(field, 1);
    }

    #[test]
    fn strict_mode_rejects_overflow() {
        let result = coerce_field(
            Value::Real(2.0),
            FieldKind::Fixed(Fixed::S1_14),
            &Options::default(),
            "MULT",
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn clamp_mode_clamps_and_warns() {
        let mut options = Options::default();
        options.clamp = true;
        let (field, warning) = coerce_field(
            Value::Real(2.0),
            FieldKind::Fixed(Fixed::S1_14),
            &options,
            "MULT",
            1,
        )
        .unwrap();
        assert!(warning.is_some());
        assert_eq!(field, 0x7FFF);
    }

    #[test]
    fn negative_integer_two_complements_into_unsigned_field() {
        let (field, _) = coerce_field(
            Value::Integer(-1),
            FieldKind::Uint(16),
            &Options::default(),
            "MULT",
            1,
        )
        .unwrap();
        assert_eq!(field, 0xFFFF);
    }
}
