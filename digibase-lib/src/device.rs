use crate::command;
use crate::config::DeviceConfig;
use crate::constants::{CLEAR_SPECTRUM_LEN, DEFAULT_READ_CAPACITY, STATUS_REGISTER_LEN};
use crate::error::{DigibaseError, Result};
use crate::firmware::FirmwarePackage;
use crate::init::{self, FirmwareSource, InitState};
use crate::status::StatusRegister;
use crate::transport::{BulkTransport, Transport};
use crate::usb::NusbBulk;
use crate::variant::{Phase, Variant, VariantConfig};
use tracing::{debug, info, warn};

/// Who the base is and where it sits on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub variant: Variant,
    pub serial: Option<String>,
    pub bus_number: Option<u8>,
    pub device_address: Option<u8>,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, product_id: u16, serial: Option<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            variant: Variant::from_product_id(product_id),
            serial,
            bus_number: None,
            device_address: None,
        }
    }

    pub fn with_location(mut self, bus_number: u8, device_address: u8) -> Self {
        self.bus_number = Some(bus_number);
        self.device_address = Some(device_address);
        self
    }
}

/// An opened, initialized digiBase.
///
/// Owns the wire and the in-memory status mirror exclusively. The mirror is
/// only refreshed by explicit reads ([`refresh`](Self::refresh) and the
/// telemetry getters) and only reaches the device through full 80-byte
/// writes.
pub struct Digibase<B: BulkTransport = NusbBulk> {
    transport: Transport<B>,
    status: StatusRegister,
    identity: DeviceIdentity,
    init_state: InitState,
}

impl Digibase<NusbBulk> {
    /// Opens the first matching base and brings it to [`InitState::Ready`],
    /// loading firmware from `config.firmware_dir` if the FPGA is cold.
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        let (bulk, identity) = NusbBulk::open(config)?;
        let transport =
            Transport::new(bulk, identity.variant.config()).with_timeouts(config.write_timeout, config.read_timeout);
        let mut firmware = |variant: &VariantConfig| FirmwarePackage::load(config.firmware_path(variant.firmware_file));
        Self::bring_up(transport, identity, &mut firmware)
    }
}

impl<B: BulkTransport> Digibase<B> {
    /// Runs initialization over an already opened bulk capability.
    pub fn with_transport(bulk: B, identity: DeviceIdentity, mut firmware: impl FirmwareSource) -> Result<Self> {
        let transport = Transport::new(bulk, identity.variant.config());
        Self::bring_up(transport, identity, &mut firmware)
    }

    fn bring_up(transport: Transport<B>, identity: DeviceIdentity, firmware: &mut dyn FirmwareSource) -> Result<Self> {
        let mut device = Self {
            transport,
            status: StatusRegister::new(),
            identity,
            init_state: InitState::Unprobed,
        };
        if let Some(serial) = &device.identity.serial {
            info!(%serial, variant = %device.identity.variant, "Opening base");
        }
        init::initialize(&mut device, firmware)?;
        Ok(device)
    }

    /// Re-runs the bring-up sequence. Safe on a base that is already ready.
    pub fn reinitialize(&mut self, mut firmware: impl FirmwareSource) -> Result<()> {
        init::initialize(self, &mut firmware)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn variant(&self) -> Variant {
        self.identity.variant
    }

    pub fn serial(&self) -> Option<&str> {
        self.identity.serial.as_deref()
    }

    pub fn config(&self) -> &'static VariantConfig {
        self.transport.config()
    }

    pub fn init_state(&self) -> InitState {
        self.init_state
    }

    /// The status mirror as of the last read or write.
    pub fn status(&self) -> &StatusRegister {
        &self.status
    }

    pub fn transport(&self) -> &Transport<B> {
        &self.transport
    }

    /// The raw bulk capability underneath the transport.
    pub fn bulk(&self) -> &B {
        self.transport.bulk()
    }

    pub fn bulk_mut(&mut self) -> &mut B {
        self.transport.bulk_mut()
    }

    /// Replaces the mirror with the device's current register. Anything but a
    /// full 80-byte reply is an error and leaves the mirror as it was.
    pub fn refresh(&mut self) -> Result<()> {
        let response = self
            .transport
            .exchange(&command::read_status(), Phase::Normal, DEFAULT_READ_CAPACITY)?;
        if response.len() != STATUS_REGISTER_LEN {
            warn!(len = response.len(), "Status register read returned the wrong length");
            return Err(DigibaseError::InsufficientData {
                expected: STATUS_REGISTER_LEN,
                actual: response.len(),
            });
        }
        self.status = StatusRegister::from_response(&response);
        Ok(())
    }

    /// Writes the whole mirror to the device.
    pub fn flush(&mut self) -> Result<()> {
        let response =
            self.transport
                .exchange(&command::write_status(&self.status), Phase::Normal, DEFAULT_READ_CAPACITY)?;
        if !response.is_empty() {
            debug!(response = hex::encode(&response), "Status write answered");
        }
        Ok(())
    }

    /// Zeroes the on-board spectrum. Does not touch the status register.
    pub fn clear_spectrum(&mut self) -> Result<()> {
        debug!(len = CLEAR_SPECTRUM_LEN, "Clearing spectrum");
        self.transport
            .exchange(&command::clear_spectrum(), Phase::Normal, DEFAULT_READ_CAPACITY)?;
        Ok(())
    }

    pub fn into_transport(self) -> B {
        self.transport.into_inner()
    }

    pub(crate) fn transport_mut(&mut self) -> &mut Transport<B> {
        &mut self.transport
    }

    pub(crate) fn status_mut(&mut self) -> &mut StatusRegister {
        &mut self.status
    }

    pub(crate) fn set_init_state(&mut self, state: InitState) {
        self.init_state = state;
    }

    /// Writes an opaque bring-up snapshot verbatim. The mirror is not updated.
    pub(crate) fn write_snapshot(&mut self, snapshot: &[u8; STATUS_REGISTER_LEN]) -> Result<()> {
        self.transport
            .exchange(&command::write_status_bytes(snapshot), Phase::Normal, DEFAULT_READ_CAPACITY)?;
        Ok(())
    }
}
