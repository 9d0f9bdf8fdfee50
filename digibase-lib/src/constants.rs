// Protocol constants for the ORTEC digiBase family

use std::time::Duration;

/// ORTEC / AMETEK USB vendor ID
pub const VENDOR_ID: u16 = 0x0a2d;

/// Product ID of the digiBase-RH. Every other ORTEC product ID is driven as a classic digiBase.
pub const PRODUCT_ID_RH: u16 = 0x001f;

/// Size of the status register (640 bits)
pub const STATUS_REGISTER_LEN: usize = 80;

/// Number of PHA channels in a spectrum
pub const SPECTRUM_CHANNELS: usize = 1024;

/// Bytes in a well-formed spectrum response
pub const SPECTRUM_BYTES: usize = SPECTRUM_CHANNELS * 4;

/// Read capacity for a spectrum request, larger than the payload to absorb device framing
pub const SPECTRUM_READ_CAPACITY: usize = 5000;

/// Read capacity for a list-mode hit request
pub const HITS_READ_CAPACITY: usize = 16384;

/// Default read capacity, sized for a status register response
pub const DEFAULT_READ_CAPACITY: usize = STATUS_REGISTER_LEN;

/// Zero payload length of the clear-spectrum command
pub const CLEAR_SPECTRUM_LEN: usize = 4096;

pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);
pub const READ_TIMEOUT: Duration = Duration::from_millis(125);

/// HV setpoints at or above this are rejected
pub const MAX_HV_VOLTS: f64 = 1200.0;

pub const MIN_PULSE_WIDTH_US: f64 = 0.75;
pub const MAX_PULSE_WIDTH_US: f64 = 2.0;

/// Single-byte opcodes on the normal endpoint pair
pub const CMD_WRITE_STATUS: u8 = 0x00;
pub const CMD_READ_STATUS: u8 = 0x01;
pub const CMD_CLEAR_SPECTRUM: u8 = 0x02;
pub const CMD_START_UPLOAD: u8 = 0x04;
pub const CMD_FIRMWARE_PAGE: u8 = 0x05;
pub const CMD_END_UPLOAD: u8 = 0x06;
pub const CMD_READ_SPECTRUM: u8 = 0x80;
