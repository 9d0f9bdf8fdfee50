//! `nusb`-backed bulk capability and device discovery.

use crate::config::DeviceConfig;
use crate::constants::VENDOR_ID;
use crate::device::DeviceIdentity;
use crate::error::{DigibaseError, Result};
use crate::transport::BulkTransport;
use nusb::transfer::RequestBuffer;
use nusb::{DeviceInfo, Interface};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{info, trace};

const INTERFACE: u8 = 0;
const CONFIGURATION: u8 = 1;
const RESET_SETTLE: Duration = Duration::from_millis(50);

impl From<&DeviceInfo> for DeviceIdentity {
    fn from(info: &DeviceInfo) -> Self {
        DeviceIdentity::new(
            info.vendor_id(),
            info.product_id(),
            info.serial_number().map(|s| s.trim_end_matches('\0').to_string()),
        )
        .with_location(info.bus_number(), info.device_address())
    }
}

/// Lists every attached device carrying the ORTEC vendor ID.
pub fn enumerate() -> Result<Vec<DeviceIdentity>> {
    let devices = nusb::list_devices().map_err(DigibaseError::Usb)?;
    Ok(devices
        .filter(|d| d.vendor_id() == VENDOR_ID)
        .map(|d| DeviceIdentity::from(&d))
        .collect())
}

/// Blocking bulk transfers on a claimed interface.
///
/// Transfers are futures in nusb; a private current-thread runtime bounds
/// each one with a timeout so callers stay synchronous.
pub struct NusbBulk {
    interface: Interface,
    runtime: Runtime,
}

impl NusbBulk {
    pub fn new(interface: Interface) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self { interface, runtime })
    }

    /// Finds, resets, configures and claims the base selected by `config`.
    pub fn open(config: &DeviceConfig) -> Result<(Self, DeviceIdentity)> {
        info!("Searching for digiBase...");
        let device_info = nusb::list_devices()
            .map_err(DigibaseError::Usb)?
            .filter(|d| d.vendor_id() == VENDOR_ID)
            .find(|d| {
                config
                    .serial
                    .as_deref()
                    .is_none_or(|wanted| d.serial_number().map(|s| s.trim_end_matches('\0')) == Some(wanted))
            })
            .ok_or_else(|| DigibaseError::DeviceNotFound {
                vendor_id: VENDOR_ID,
                serial: config.serial.clone(),
            })?;

        let identity = DeviceIdentity::from(&device_info);
        info!(
            vid = format!("{:04x}", identity.vendor_id),
            pid = format!("{:04x}", identity.product_id),
            variant = %identity.variant,
            bus = device_info.bus_number(),
            addr = device_info.device_address(),
            "Found device"
        );

        let device = device_info.open().map_err(DigibaseError::Usb)?;
        if config.reset_on_open {
            info!("Performing USB device reset...");
            device.reset().map_err(DigibaseError::Usb)?;
            std::thread::sleep(RESET_SETTLE);
        }
        device.set_configuration(CONFIGURATION).map_err(DigibaseError::Usb)?;
        let interface = device
            .detach_and_claim_interface(INTERFACE)
            .map_err(DigibaseError::Usb)?;
        info!(serial = identity.serial.as_deref().unwrap_or("<none>"), "Interface claimed");

        Ok((Self::new(interface)?, identity))
    }
}

impl BulkTransport for NusbBulk {
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let transfer = self.interface.bulk_out(endpoint, data.to_vec());
        let completion = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, transfer).await })?;
        let sent = completion.into_result()?;
        Ok(sent.actual_length())
    }

    fn read(&mut self, endpoint: u8, capacity: usize, timeout: Duration) -> Result<Vec<u8>> {
        let transfer = self.interface.bulk_in(endpoint, RequestBuffer::new(capacity));
        match self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, transfer).await })
        {
            Ok(completion) => Ok(completion.into_result()?),
            Err(_) => {
                // Dropping the future cancels the pending transfer.
                trace!(endpoint = format!("{endpoint:#04x}"), "Read timed out, nothing pending");
                Ok(Vec::new())
            }
        }
    }
}
