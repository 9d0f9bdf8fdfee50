//! Common test utilities: a scripted stand-in for a digiBase on the bus.

// Shared across test files; not every helper is used in each.
#![allow(dead_code)]

use digibase_lib::constants::{CMD_READ_SPECTRUM, CMD_READ_STATUS, CMD_WRITE_STATUS, STATUS_REGISTER_LEN};
use digibase_lib::variant::{Phase, Variant};
use digibase_lib::{BulkTransport, DeviceIdentity, Digibase, DigibaseError, FirmwarePackage, Result};
use std::collections::VecDeque;
use std::time::Duration;

pub const VENDOR_ID: u16 = 0x0a2d;
pub const PRODUCT_ID_CLASSIC: u16 = 0x000f;
pub const PRODUCT_ID_RH: u16 = 0x001f;

pub const RH_COLD: [u8; 4] = [0x04, 0x80, 0x00, 0x00];
pub const RH_WARM: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
pub const CLASSIC_COLD: [u8; 1] = [0x04];
pub const CLASSIC_WARM: [u8; 1] = [0x00];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub endpoint: u8,
    pub data: Vec<u8>,
}

impl Write {
    pub fn opcode(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Register payload of a status write.
    pub fn register(&self) -> Option<&[u8]> {
        (self.opcode() == Some(CMD_WRITE_STATUS) && self.data.len() == 1 + STATUS_REGISTER_LEN)
            .then(|| &self.data[1..])
    }
}

/// Emulates the base closely enough for the driver: answers the probe,
/// echoes the last written register on status reads and serves queued
/// spectra and hit lists.
#[derive(Debug, Default)]
pub struct MockBase {
    pub writes: Vec<Write>,
    pub reads: Vec<(u8, usize)>,
    pub probe: Vec<u8>,
    pub register: Vec<u8>,
    pub spectra: VecDeque<Vec<u8>>,
    pub hit_lists: VecDeque<Vec<u8>>,
    /// Accept only this many bytes of the next write.
    pub short_write: Option<usize>,
    last_write: Vec<u8>,
}

impl MockBase {
    pub fn new(probe: &[u8]) -> Self {
        Self {
            probe: probe.to_vec(),
            register: vec![0; STATUS_REGISTER_LEN],
            ..Default::default()
        }
    }

    pub fn with_register(mut self, register: [u8; STATUS_REGISTER_LEN]) -> Self {
        self.register = register.to_vec();
        self
    }

    pub fn queue_spectrum(&mut self, counts: &[u32]) {
        self.spectra.push_back(counts.iter().flat_map(|c| c.to_le_bytes()).collect());
    }

    /// Register payloads of every status write, oldest first.
    pub fn register_writes(&self) -> Vec<&[u8]> {
        self.writes.iter().filter_map(Write::register).collect()
    }

    pub fn last_register_write(&self) -> Option<&[u8]> {
        self.writes.iter().rev().find_map(Write::register)
    }

    pub fn clear(&mut self) {
        self.writes.clear();
        self.reads.clear();
    }
}

impl BulkTransport for MockBase {
    fn write(&mut self, endpoint: u8, data: &[u8], _timeout: Duration) -> Result<usize> {
        self.writes.push(Write {
            endpoint,
            data: data.to_vec(),
        });
        if let Some(accepted) = self.short_write.take() {
            return Ok(accepted);
        }
        if data.first() == Some(&CMD_WRITE_STATUS) && data.len() == 1 + STATUS_REGISTER_LEN {
            self.register = data[1..].to_vec();
        }
        self.last_write = data.to_vec();
        Ok(data.len())
    }

    fn read(&mut self, endpoint: u8, capacity: usize, _timeout: Duration) -> Result<Vec<u8>> {
        self.reads.push((endpoint, capacity));
        let response = match self.last_write.as_slice() {
            // Probe command of either revision; reused later as an upload marker.
            [0x06] | [0x06, 0x00, 0x02, 0x00] => self.probe.clone(),
            [CMD_READ_STATUS] => self.register.clone(),
            [CMD_READ_SPECTRUM] if capacity > 5000 => self.hit_lists.pop_front().unwrap_or_default(),
            [CMD_READ_SPECTRUM] => self.spectra.pop_front().unwrap_or_default(),
            _ => Vec::new(),
        };
        if response.len() > capacity {
            return Err(DigibaseError::InvalidArgument(format!(
                "mock response of {} bytes exceeds capacity {capacity}",
                response.len()
            )));
        }
        Ok(response)
    }
}

pub fn identity(variant: Variant) -> DeviceIdentity {
    let product_id = match variant {
        Variant::Classic => PRODUCT_ID_CLASSIC,
        Variant::Rh => PRODUCT_ID_RH,
    };
    DeviceIdentity::new(VENDOR_ID, product_id, Some("12345678".to_string()))
}

/// Firmware image exactly as long as the variant's page table, each byte
/// its offset modulo 251.
pub fn firmware(variant: Variant) -> FirmwarePackage {
    let len = variant.config().firmware_len();
    FirmwarePackage::new((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

/// Routes driver logs to the test harness; `RUST_LOG=debug` shows every transfer.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A base that is already configured, opened and with its bring-up traffic
/// cleared.
pub fn ready(variant: Variant) -> Digibase<MockBase> {
    init_tracing();
    let probe: &[u8] = match variant {
        Variant::Classic => &CLASSIC_WARM,
        Variant::Rh => &RH_WARM,
    };
    let mut device = Digibase::with_transport(MockBase::new(probe), identity(variant), firmware(variant))
        .expect("warm open");
    bulk(&mut device).clear();
    device
}

pub fn bulk(device: &mut Digibase<MockBase>) -> &mut MockBase {
    device.bulk_mut()
}

pub fn normal_out(variant: Variant) -> u8 {
    variant.config().endpoints(Phase::Normal).out
}
