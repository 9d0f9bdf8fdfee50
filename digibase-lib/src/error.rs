use crate::variant::Variant;
use std::io;
use thiserror::Error;

/// The primary error type for the `digibase-lib` crate.
#[derive(Error, Debug)]
pub enum DigibaseError {
    #[error("No digiBase found (vendor {vendor_id:#06x}, serial filter {serial:?}). Is the base connected?")]
    DeviceNotFound { vendor_id: u16, serial: Option<String> },

    #[error("USB error: {0}")]
    Usb(#[source] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("Timeout during USB write: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Incomplete write to endpoint {endpoint:#04x}: {actual} of {expected} bytes")]
    ShortWrite { endpoint: u8, expected: usize, actual: usize },

    #[error("{variant} probe returned an unrecognized response: [{}]", hex::encode(.response))]
    ProtocolViolation { variant: Variant, response: Vec<u8> },

    #[error("HV setting {volts} V exceeds max value of 1200 V")]
    HvOutOfRange { volts: f64 },

    #[error("Pulse width {micros} us out of range [0.75, 2.0]")]
    PulseWidthOutOfRange { micros: f64 },

    #[error("Unknown file format (magic {})", hex::encode(.magic))]
    UnknownFormat { magic: [u8; 8] },

    #[error("Truncated file: expected {expected} bytes, got {actual}")]
    TruncatedFile { expected: usize, actual: usize },

    #[error("Background comment is not valid UTF-8")]
    InvalidComment,

    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Firmware image too short: need {expected} bytes, got {actual}")]
    FirmwareTooShort { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DigibaseError {
    /// Failures of the USB wire itself. The operation was not retried.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            DigibaseError::Usb(_)
                | DigibaseError::Transfer(_)
                | DigibaseError::Timeout(_)
                | DigibaseError::ShortWrite { .. }
        )
    }

    /// Physical setpoints rejected before the register was touched.
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            DigibaseError::HvOutOfRange { .. } | DigibaseError::PulseWidthOutOfRange { .. }
        )
    }

    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            DigibaseError::UnknownFormat { .. } | DigibaseError::TruncatedFile { .. } | DigibaseError::InvalidComment
        )
    }
}

pub type Result<T> = std::result::Result<T, DigibaseError>;
