//! The 640-bit status register and its named fields.
//!
//! The device exposes its whole configuration and telemetry as one 80-byte
//! little-endian word. It is read and written wholesale; the named
//! [`BitField`] constants in [`fields`] are the only way the driver addresses
//! sub-ranges of it.

use crate::constants::{MAX_HV_VOLTS, MAX_PULSE_WIDTH_US, MIN_PULSE_WIDTH_US, STATUS_REGISTER_LEN};
use crate::error::{DigibaseError, Result};
use std::fmt;

/// Total number of addressable bits.
pub const STATUS_REGISTER_BITS: u16 = (STATUS_REGISTER_LEN * 8) as u16;

/// Conversion between a raw field value and a physical quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    /// `volts = raw * 5 / 4`
    AffineHv,
    /// `us = 0.0625 * (raw - 12) + 0.75`
    AffinePulseWidth,
}

impl Transform {
    pub fn to_physical(self, raw: u32) -> f64 {
        match self {
            Transform::Identity => raw as f64,
            Transform::AffineHv => raw as f64 * 5.0 / 4.0,
            Transform::AffinePulseWidth => 0.0625 * (raw as f64 - 12.0) + 0.75,
        }
    }

    /// Converts a physical value to its raw encoding, rejecting values outside
    /// the range the device accepts.
    pub fn to_raw(self, value: f64) -> Result<u32> {
        match self {
            Transform::Identity => {
                if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
                    return Err(DigibaseError::InvalidArgument(format!(
                        "raw field value {value} is not representable"
                    )));
                }
                Ok(value as u32)
            }
            Transform::AffineHv => {
                if !(0.0..MAX_HV_VOLTS).contains(&value) {
                    return Err(DigibaseError::HvOutOfRange { volts: value });
                }
                // Whole volts first, then integer scaling.
                Ok((value.trunc() as u32 * 4) / 5)
            }
            Transform::AffinePulseWidth => {
                if !(MIN_PULSE_WIDTH_US..=MAX_PULSE_WIDTH_US).contains(&value) {
                    return Err(DigibaseError::PulseWidthOutOfRange { micros: value });
                }
                Ok((16.0 * (value - MIN_PULSE_WIDTH_US) + 12.0).round() as u32)
            }
        }
    }
}

/// A named, fixed sub-range of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub offset: u16,
    pub width: u16,
    pub transform: Transform,
}

impl BitField {
    pub const fn new(name: &'static str, offset: u16, width: u16) -> Self {
        Self::with_transform(name, offset, width, Transform::Identity)
    }

    pub const fn with_transform(name: &'static str, offset: u16, width: u16, transform: Transform) -> Self {
        assert!(width >= 1 && width <= 32, "field width must be 1..=32 bits");
        assert!(offset as u32 + width as u32 <= STATUS_REGISTER_BITS as u32, "field exceeds register");
        Self {
            name,
            offset,
            width,
            transform,
        }
    }

    /// Largest raw value the field can hold.
    pub const fn max_raw(&self) -> u32 {
        mask(self.width) as u32
    }
}

/// Fields observed on both hardware revisions.
///
/// Discriminator layouts differ per revision and live in
/// [`VariantConfig`](crate::variant::VariantConfig).
pub mod fields {
    use super::{BitField, Transform};

    /// Bit 0 selects PHA (1) or list (0) acquisition.
    pub const ACQ_MODE: BitField = BitField::new("acq_mode", 0, 1);
    pub const RUN_ENABLE: BitField = BitField::new("run_enable", 1, 1);
    /// Mode and run bits together; cleared as one when entering list mode.
    pub const MODE_AND_RUN: BitField = BitField::new("mode_and_run", 0, 2);
    pub const HV_ENABLE: BitField = BitField::new("hv_enable", 6, 1);
    pub const LIST_LATCH: BitField = BitField::new("list_latch", 7, 1);
    pub const PULSE_WIDTH: BitField =
        BitField::with_transform("pulse_width", 16, 8, Transform::AffinePulseWidth);
    pub const HV_READBACK: BitField = BitField::new("hv_readback", 24, 16);
    pub const ULD: BitField = BitField::new("uld", 176, 16);
    pub const LIVETIME: BitField = BitField::new("livetime", 224, 32);
    pub const REALTIME: BitField = BitField::new("realtime", 288, 32);
    pub const HV_SETPOINT: BitField = BitField::with_transform("hv_setpoint", 336, 16, Transform::AffineHv);
    pub const COUNTER_RESET: BitField = BitField::new("counter_reset", 608, 1);
    pub const CNT_STROBE: BitField = BitField::new("cnt_strobe", 610, 1);
}

const fn mask(width: u16) -> u64 {
    (1u64 << width) - 1
}

/// In-memory mirror of the device's status register.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister([u8; STATUS_REGISTER_LEN]);

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRegister {
    pub const fn new() -> Self {
        Self([0; STATUS_REGISTER_LEN])
    }

    pub const fn from_bytes(bytes: [u8; STATUS_REGISTER_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a register from a device response. Short responses are
    /// zero-extended, bytes past the register length are ignored.
    pub fn from_response(bytes: &[u8]) -> Self {
        let mut reg = [0u8; STATUS_REGISTER_LEN];
        let n = bytes.len().min(STATUS_REGISTER_LEN);
        reg[..n].copy_from_slice(&bytes[..n]);
        Self(reg)
    }

    pub const fn to_bytes(&self) -> [u8; STATUS_REGISTER_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; STATUS_REGISTER_LEN] {
        &self.0
    }

    /// Reads `width` bits starting at absolute bit `offset`.
    ///
    /// # Panics
    /// If `width` is 0 or above 32, or the range runs past bit 639.
    pub fn get(&self, offset: u16, width: u16) -> u32 {
        let (first, last) = Self::byte_span(offset, width);
        let window = self.load(first, last);
        ((window >> (offset % 8)) & mask(width)) as u32
    }

    /// Writes the low `width` bits of `value` at absolute bit `offset`. Bits
    /// outside `[offset, offset + width)` are left untouched.
    ///
    /// # Panics
    /// Same conditions as [`get`](Self::get).
    pub fn set(&mut self, offset: u16, width: u16, value: u32) {
        let (first, last) = Self::byte_span(offset, width);
        let shift = offset % 8;
        let field_mask = mask(width) << shift;
        let window = self.load(first, last);
        let window = (window & !field_mask) | ((value as u64 & mask(width)) << shift);
        for (i, byte) in self.0[first..=last].iter_mut().enumerate() {
            *byte = (window >> (8 * i)) as u8;
        }
    }

    pub fn bit(&self, index: u16) -> bool {
        self.get(index, 1) == 1
    }

    pub fn set_bit(&mut self, index: u16, on: bool) {
        self.set(index, 1, on as u32);
    }

    pub fn field(&self, field: BitField) -> u32 {
        self.get(field.offset, field.width)
    }

    pub fn set_field(&mut self, field: BitField, value: u32) {
        self.set(field.offset, field.width, value);
    }

    pub fn flag(&self, field: BitField) -> bool {
        self.field(field) != 0
    }

    pub fn set_flag(&mut self, field: BitField, on: bool) {
        self.set_field(field, on as u32);
    }

    /// Field value with its unit transform applied.
    pub fn physical(&self, field: BitField) -> f64 {
        field.transform.to_physical(self.field(field))
    }

    /// Validates and encodes `value`, then stores it. The register is left
    /// untouched if the value is rejected.
    pub fn set_physical(&mut self, field: BitField, value: f64) -> Result<u32> {
        let raw = field.transform.to_raw(value)?;
        self.set_field(field, raw);
        Ok(raw)
    }

    pub fn hv_volts(&self) -> f64 {
        self.physical(fields::HV_SETPOINT)
    }

    pub fn set_hv_volts(&mut self, volts: f64) -> Result<u32> {
        self.set_physical(fields::HV_SETPOINT, volts)
    }

    pub fn pulse_width_us(&self) -> f64 {
        self.physical(fields::PULSE_WIDTH)
    }

    pub fn set_pulse_width_us(&mut self, micros: f64) -> Result<u32> {
        self.set_physical(fields::PULSE_WIDTH, micros)
    }

    fn byte_span(offset: u16, width: u16) -> (usize, usize) {
        assert!((1..=32).contains(&width), "field width {width} not in 1..=32");
        let end = offset as usize + width as usize;
        assert!(end <= STATUS_REGISTER_BITS as usize, "bit range {offset}+{width} exceeds register");
        (offset as usize / 8, (end - 1) / 8)
    }

    fn load(&self, first: usize, last: usize) -> u64 {
        self.0[first..=last]
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, b)| acc | ((*b as u64) << (8 * i)))
    }
}

impl fmt::Debug for StatusRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusRegister({})", hex::encode(self.0))
    }
}

/// Hex dump, 16 bytes per line.
impl fmt::Display for StatusRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.0.chunks(16).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let bytes: Vec<String> = line.iter().map(|b| format!("{b:02x}")).collect();
            write!(f, "{:04x}: {}", i * 16, bytes.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_fields() -> Vec<BitField> {
        vec![
            fields::ACQ_MODE,
            fields::RUN_ENABLE,
            fields::MODE_AND_RUN,
            fields::HV_ENABLE,
            fields::LIST_LATCH,
            fields::PULSE_WIDTH,
            fields::HV_READBACK,
            fields::ULD,
            fields::LIVETIME,
            fields::REALTIME,
            fields::HV_SETPOINT,
            fields::COUNTER_RESET,
            fields::CNT_STROBE,
            crate::variant::RH.lld,
            crate::variant::CLASSIC.lld,
        ]
    }

    fn patterned() -> StatusRegister {
        let mut bytes = [0u8; STATUS_REGISTER_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        StatusRegister::from_bytes(bytes)
    }

    #[test]
    fn field_write_is_masked_and_isolated() {
        for field in &all_fields() {
            for value in [0u32, 1, 0x5a5a_5a5a, u32::MAX, field.max_raw()] {
                let before = patterned();
                let mut reg = before;
                reg.set_field(*field, value);
                assert_eq!(reg.field(*field), value & field.max_raw(), "{}", field.name);
                for bit in 0..STATUS_REGISTER_BITS {
                    if bit < field.offset || bit >= field.offset + field.width {
                        assert_eq!(reg.bit(bit), before.bit(bit), "{} bled into bit {bit}", field.name);
                    }
                }
            }
        }
    }

    #[test]
    fn unaligned_field_spans_five_bytes() {
        let mut reg = StatusRegister::new();
        reg.set(7, 32, 0xdead_beef);
        assert_eq!(reg.get(7, 32), 0xdead_beef);
        assert!(!reg.bit(6));
        assert!(!reg.bit(39));
    }

    #[test]
    fn byte_round_trip() {
        let reg = patterned();
        assert_eq!(StatusRegister::from_bytes(reg.to_bytes()), reg);
    }

    #[test]
    fn little_endian_bit_order() {
        let mut reg = StatusRegister::new();
        reg.set_flag(fields::RUN_ENABLE, true);
        reg.set_flag(fields::CNT_STROBE, true);
        let bytes = reg.to_bytes();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[76], 0x04);
    }

    #[test]
    fn short_response_is_zero_extended() {
        let reg = StatusRegister::from_response(&[0xff, 0x01]);
        assert_eq!(reg.get(0, 16), 0x01ff);
        assert_eq!(reg.get(16, 32), 0);
        assert_eq!(StatusRegister::from_response(&[]), StatusRegister::new());
    }

    #[test]
    fn hv_transform() {
        let mut reg = StatusRegister::new();
        assert_eq!(reg.set_hv_volts(800.0).unwrap(), 640);
        assert_eq!(reg.field(fields::HV_SETPOINT), 640);
        assert_eq!(reg.hv_volts(), 800.0);
    }

    #[test]
    fn hv_rejection_leaves_register_untouched() {
        let mut reg = patterned();
        let before = reg;
        for volts in [1200.0, 1500.0, -1.0, f64::NAN] {
            let err = reg.set_hv_volts(volts).unwrap_err();
            assert!(err.is_range_error());
        }
        assert_eq!(reg, before);
        assert_eq!(reg.set_hv_volts(1199.9).unwrap(), 959);
    }

    #[test]
    fn pulse_width_transform() {
        let mut reg = StatusRegister::new();
        assert_eq!(reg.set_pulse_width_us(1.0).unwrap(), 16);
        assert!((reg.pulse_width_us() - 1.0).abs() < 1e-9);
        assert_eq!(reg.set_pulse_width_us(0.75).unwrap(), 12);
        assert_eq!(reg.set_pulse_width_us(2.0).unwrap(), 32);

        let before = reg;
        assert!(matches!(
            reg.set_pulse_width_us(0.5),
            Err(DigibaseError::PulseWidthOutOfRange { .. })
        ));
        assert!(reg.set_pulse_width_us(2.01).is_err());
        assert_eq!(reg, before);
    }

    #[test]
    fn identity_fields_reject_unrepresentable_values() {
        let mut reg = patterned();
        let before = reg;
        for value in [-1.0, f64::NAN, f64::INFINITY, 1e12] {
            assert!(
                matches!(reg.set_physical(fields::LIVETIME, value), Err(DigibaseError::InvalidArgument(_))),
                "{value}"
            );
        }
        assert_eq!(reg, before);

        // In range but wider than the field: masked like any raw write.
        assert_eq!(reg.set_physical(fields::HV_READBACK, 70_000.0).unwrap(), 70_000);
        assert_eq!(reg.field(fields::HV_READBACK), 70_000 & 0xffff);
    }

    #[test]
    fn hex_dump_layout() {
        let dump = StatusRegister::new().to_string();
        assert_eq!(dump.lines().count(), 5);
        assert!(dump.starts_with("0000: 00 00"));
        assert!(dump.lines().last().unwrap().starts_with("0040: "));
    }
}
