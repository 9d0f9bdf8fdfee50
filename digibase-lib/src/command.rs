//! Command framing.
//!
//! Normal-phase commands are a single opcode byte followed by an optional
//! payload. RH bring-up commands on the init pair carry a 4-byte header
//! instead.

use crate::constants::{
    CLEAR_SPECTRUM_LEN, CMD_CLEAR_SPECTRUM, CMD_READ_SPECTRUM, CMD_READ_STATUS, CMD_WRITE_STATUS, STATUS_REGISTER_LEN,
};
use crate::status::StatusRegister;
use bytes::{BufMut, BytesMut};
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};

/// Header of a command on the RH init endpoint pair.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitHeader {
    pub opcode: u8,
    #[skip]
    reserved: u8,
    pub selector: u16,
}

/// Opcodes observed on the RH init endpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum InitOpcode {
    StartUpload = 0x04,
    Page = 0x05,
    /// Probe before bring-up, end-of-upload marker after the pages
    Query = 0x06,
    Commit = 0x11,
    Finish = 0x12,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Selector carried by every bring-up command except the final one.
pub const SELECTOR_UPLOAD: u16 = 0x0002;
/// Selector of the end-of-initialization command.
pub const SELECTOR_FINISH: u16 = 0x0006;

/// Builds an RH init-pair command: 4-byte header followed by `payload`.
pub fn init_command(opcode: InitOpcode, selector: u16, payload: &[u8]) -> Vec<u8> {
    let header = InitHeader::new()
        .with_opcode(opcode.into())
        .with_selector(selector);
    let mut command = BytesMut::with_capacity(4 + payload.len());
    command.put_slice(&header.into_bytes());
    command.put_slice(payload);
    command.to_vec()
}

/// Builds a single-opcode command followed by `payload`.
pub fn opcode_command(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut command = BytesMut::with_capacity(1 + payload.len());
    command.put_u8(opcode);
    command.put_slice(payload);
    command.to_vec()
}

/// Full-register write: opcode 0x00 followed by all 80 bytes.
pub fn write_status(register: &StatusRegister) -> Vec<u8> {
    write_status_bytes(register.as_bytes())
}

pub fn write_status_bytes(snapshot: &[u8; STATUS_REGISTER_LEN]) -> Vec<u8> {
    opcode_command(CMD_WRITE_STATUS, snapshot)
}

pub fn read_status() -> Vec<u8> {
    vec![CMD_READ_STATUS]
}

pub fn clear_spectrum() -> Vec<u8> {
    opcode_command(CMD_CLEAR_SPECTRUM, &[0u8; CLEAR_SPECTRUM_LEN])
}

pub fn read_spectrum() -> Vec<u8> {
    vec![CMD_READ_SPECTRUM]
}
