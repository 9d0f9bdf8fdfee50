//! Status snapshots written during firmware bring-up.
//!
//! These are protocol constants captured from the vendor driver's bring-up
//! sequence. Apart from the bytes noted below they are not decoded; the
//! driver writes them verbatim through the normal status-write command.

use crate::constants::STATUS_REGISTER_LEN;

// RH sequence. STAT_1 and STAT_2 differ in bytes 0, 18, 65 and 76;
// STAT_3 and STAT_4 differ from STAT_2 only in byte 76 (0x01, 0x04).

#[rustfmt::skip]
pub const RH_STAT_1: [u8; STATUS_REGISTER_LEN] = [
    0xb3, 0x00, 0x0c, 0x20, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0x00, 0xa0, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x80, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5e, 0x01, 0x2c, 0x01, 0xfa, 0x00, 0x00, 0x00,
    0x00, 0x80, 0x9e, 0x00, 0x85, 0x00, 0x6c, 0x00, 0x40, 0x00, 0x00, 0x00, 0x10, 0x0c, 0x24, 0x00,
];

#[rustfmt::skip]
pub const RH_STAT_2: [u8; STATUS_REGISTER_LEN] = [
    0x31, 0x00, 0x0c, 0x20, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x20, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x80, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5e, 0x01, 0x2c, 0x01, 0xfa, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x9e, 0x00, 0x85, 0x00, 0x6c, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x24, 0x00,
];

#[rustfmt::skip]
pub const RH_STAT_3: [u8; STATUS_REGISTER_LEN] = [
    0x31, 0x00, 0x0c, 0x20, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x20, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x80, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5e, 0x01, 0x2c, 0x01, 0xfa, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x9e, 0x00, 0x85, 0x00, 0x6c, 0x00, 0x40, 0x00, 0x00, 0x00, 0x01, 0x0c, 0x24, 0x00,
];

#[rustfmt::skip]
pub const RH_STAT_4: [u8; STATUS_REGISTER_LEN] = [
    0x31, 0x00, 0x0c, 0x20, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x20, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x80, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5e, 0x01, 0x2c, 0x01, 0xfa, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x9e, 0x00, 0x85, 0x00, 0x6c, 0x00, 0x40, 0x00, 0x00, 0x00, 0x04, 0x0c, 0x24, 0x00,
];

// Classic sequence, sent in order STAT_5, STAT_6, STAT_6_STROBE, STAT_6,
// STAT_6_FINAL. The strobe sets byte 76 to 1; the final snapshot clears
// bits 2 and 3 of byte 0.

#[rustfmt::skip]
pub const CLASSIC_STAT_5: [u8; STATUS_REGISTER_LEN] = [
    0xbd, 0x00, 0x0c, 0x00, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0xb5, 0xa9, 0x00, 0xb0, 0x1e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x58, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x00, 0x00,
    0x00, 0x80, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x40, 0x00, 0x00, 0x00, 0x10, 0x00, 0x2e, 0x0b,
];

#[rustfmt::skip]
pub const CLASSIC_STAT_6: [u8; STATUS_REGISTER_LEN] = [
    0x3d, 0x00, 0x0c, 0x00, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0xb5, 0x29, 0x00, 0xb0, 0x1e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x58, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x00, 0x00,
    0x00, 0x00, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2e, 0x0b,
];

#[rustfmt::skip]
pub const CLASSIC_STAT_6_STROBE: [u8; STATUS_REGISTER_LEN] = [
    0x3d, 0x00, 0x0c, 0x00, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0xb5, 0x29, 0x00, 0xb0, 0x1e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x58, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x00, 0x00,
    0x00, 0x00, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x40, 0x00, 0x00, 0x00, 0x01, 0x00, 0x2e, 0x0b,
];

#[rustfmt::skip]
pub const CLASSIC_STAT_6_FINAL: [u8; STATUS_REGISTER_LEN] = [
    0x31, 0x00, 0x0c, 0x00, 0x00, 0x30, 0x20, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0xb5, 0x29, 0x00, 0xb0, 0x1e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x03, 0x58, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x00, 0x00,
    0x00, 0x00, 0xfa, 0x01, 0xd5, 0x01, 0xb0, 0x01, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2e, 0x0b,
];
