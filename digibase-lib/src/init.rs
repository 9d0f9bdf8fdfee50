//! Device bring-up: probe, optional firmware upload, settle.
//!
//! ```text
//! Unprobed ──probe──> NeedsFirmware ──upload + templates──> Ready
//!                └──> AlreadyConfigured ──settle reads────> Ready
//! ```
//!
//! The two hardware revisions answer the probe with opposite polarity and use
//! different settle sequences. Both are kept as observed.

use crate::command::{self, InitOpcode, SELECTOR_FINISH, SELECTOR_UPLOAD};
use crate::constants::{CMD_END_UPLOAD, CMD_FIRMWARE_PAGE, CMD_START_UPLOAD, DEFAULT_READ_CAPACITY};
use crate::device::Digibase;
use crate::error::{DigibaseError, Result};
use crate::firmware::FirmwarePackage;
use crate::status::fields;
use crate::templates::*;
use crate::transport::BulkTransport;
use crate::variant::{Phase, Variant, VariantConfig};
use strum_macros::Display;
use tracing::{debug, info};

/// Where the bring-up state machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InitState {
    Unprobed,
    NeedsFirmware,
    AlreadyConfigured,
    Ready,
}

/// Interprets the probe response.
///
/// * RH: `04 80 ..` is a cold FPGA, `00 00 ..` is already configured.
/// * Classic: a leading `00` is already configured, any other leading byte
///   is a cold FPGA.
///
/// Anything else, including an empty response, is a protocol violation.
pub fn classify_probe(variant: Variant, response: &[u8]) -> Result<InitState> {
    let state = match (variant, response) {
        (Variant::Rh, [0x04, 0x80, ..]) => Some(InitState::NeedsFirmware),
        (Variant::Rh, [0x00, 0x00, ..]) => Some(InitState::AlreadyConfigured),
        (Variant::Classic, [0x00, ..]) => Some(InitState::AlreadyConfigured),
        (Variant::Classic, [_, ..]) => Some(InitState::NeedsFirmware),
        _ => None,
    };
    state.ok_or_else(|| DigibaseError::ProtocolViolation {
        variant,
        response: response.to_vec(),
    })
}

/// Supplies the firmware image on demand; only called on the cold path.
pub trait FirmwareSource {
    fn firmware(&mut self, config: &VariantConfig) -> Result<FirmwarePackage>;
}

impl<F> FirmwareSource for F
where
    F: FnMut(&VariantConfig) -> Result<FirmwarePackage>,
{
    fn firmware(&mut self, config: &VariantConfig) -> Result<FirmwarePackage> {
        self(config)
    }
}

impl FirmwareSource for FirmwarePackage {
    fn firmware(&mut self, _config: &VariantConfig) -> Result<FirmwarePackage> {
        Ok(self.clone())
    }
}

/// Runs the whole state machine. On success the device is in
/// [`InitState::Ready`] and its status mirror is freshly read.
pub(crate) fn initialize<B: BulkTransport>(
    device: &mut Digibase<B>,
    firmware: &mut dyn FirmwareSource,
) -> Result<()> {
    device.set_init_state(InitState::Unprobed);
    let config = device.config();

    let probe = device
        .transport_mut()
        .exchange(config.probe_command, Phase::Init, DEFAULT_READ_CAPACITY)?;
    let state = classify_probe(config.variant, &probe)?;
    info!(variant = %config.variant, response = hex::encode(&probe), %state, "Probed base");
    device.set_init_state(state);

    if state == InitState::NeedsFirmware {
        let package = firmware.firmware(config)?;
        match config.variant {
            Variant::Rh => upload_rh(device, &package)?,
            Variant::Classic => upload_classic(device, &package)?,
        }
        device.clear_spectrum()?;
        device.refresh()?;
    } else {
        // The base needs repeated reads before the register settles.
        for _ in 0..3 {
            device.refresh()?;
        }
        match config.variant {
            Variant::Rh => settle_rh(device)?,
            Variant::Classic => settle_classic(device)?,
        }
    }

    device.set_init_state(InitState::Ready);
    info!(variant = %config.variant, "Base ready");
    Ok(())
}

fn upload_rh<B: BulkTransport>(device: &mut Digibase<B>, package: &FirmwarePackage) -> Result<()> {
    let config = device.config();
    let pages = package.pages(config)?;
    let transport = device.transport_mut();

    info!("Loading digiBase-RH firmware");
    let init = |opcode, payload: &[u8]| command::init_command(opcode, SELECTOR_UPLOAD, payload);
    transport.exchange(&init(InitOpcode::StartUpload, &[]), Phase::Init, DEFAULT_READ_CAPACITY)?;
    for (i, page) in pages.iter().enumerate() {
        transport.exchange(&init(InitOpcode::Page, &page[..]), Phase::Init, DEFAULT_READ_CAPACITY)?;
        debug!(page = i, len = page.len(), "Uploaded firmware page");
    }
    transport.exchange(&init(InitOpcode::Query, &[]), Phase::Init, DEFAULT_READ_CAPACITY)?;
    transport.exchange(&init(InitOpcode::Commit, &[]), Phase::Init, DEFAULT_READ_CAPACITY)?;

    for snapshot in [&RH_STAT_1, &RH_STAT_2, &RH_STAT_2] {
        device.write_snapshot(snapshot)?;
    }
    device
        .transport_mut()
        .exchange(&[CMD_START_UPLOAD], Phase::Normal, DEFAULT_READ_CAPACITY)?;
    for snapshot in [&RH_STAT_3, &RH_STAT_2, &RH_STAT_2] {
        device.write_snapshot(snapshot)?;
    }

    let finish = command::init_command(InitOpcode::Finish, SELECTOR_FINISH, &[]);
    let response = device
        .transport_mut()
        .exchange(&finish, Phase::Init, DEFAULT_READ_CAPACITY)?;
    debug!(response = hex::encode(&response), "End of init message");

    for snapshot in [&RH_STAT_2, &RH_STAT_4] {
        device.write_snapshot(snapshot)?;
    }
    Ok(())
}

fn upload_classic<B: BulkTransport>(device: &mut Digibase<B>, package: &FirmwarePackage) -> Result<()> {
    let config = device.config();
    let pages = package.pages(config)?;
    let [first, second, third] = pages.as_slice() else {
        return Err(DigibaseError::InvalidArgument(format!(
            "classic upload expects three firmware pages, page table has {}",
            pages.len()
        )));
    };
    let transport = device.transport_mut();

    transport.exchange(&[CMD_START_UPLOAD], Phase::Normal, DEFAULT_READ_CAPACITY)?;
    info!("Loading digiBase firmware");
    transport.exchange(
        &command::opcode_command(CMD_FIRMWARE_PAGE, first),
        Phase::Normal,
        DEFAULT_READ_CAPACITY,
    )?;
    transport.send(&command::opcode_command(CMD_FIRMWARE_PAGE, second), Phase::Normal)?;
    // Zero-length flush between the second and third page.
    transport.send(&[], Phase::Normal)?;
    transport.exchange(
        &command::opcode_command(CMD_FIRMWARE_PAGE, third),
        Phase::Normal,
        DEFAULT_READ_CAPACITY,
    )?;
    transport.exchange(&[CMD_END_UPLOAD], Phase::Normal, DEFAULT_READ_CAPACITY)?;

    for snapshot in [
        &CLASSIC_STAT_5,
        &CLASSIC_STAT_6,
        &CLASSIC_STAT_6_STROBE,
        &CLASSIC_STAT_6,
        &CLASSIC_STAT_6_FINAL,
    ] {
        device.write_snapshot(snapshot)?;
    }
    Ok(())
}

/// Classic: pulse the CNT strobe low then high, then read back.
fn settle_classic<B: BulkTransport>(device: &mut Digibase<B>) -> Result<()> {
    device.status_mut().set_flag(fields::CNT_STROBE, false);
    device.flush()?;
    device.status_mut().set_flag(fields::CNT_STROBE, true);
    device.flush()?;
    device.refresh()
}

/// RH: drop the counter reset and raise the CNT strobe in one write.
fn settle_rh<B: BulkTransport>(device: &mut Digibase<B>) -> Result<()> {
    let status = device.status_mut();
    status.set_flag(fields::COUNTER_RESET, false);
    status.set_flag(fields::CNT_STROBE, true);
    device.flush()?;
    device.refresh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rh_probe_patterns() {
        assert_eq!(
            classify_probe(Variant::Rh, &[0x04, 0x80, 0x00, 0x00]).unwrap(),
            InitState::NeedsFirmware
        );
        assert_eq!(
            classify_probe(Variant::Rh, &[0x00, 0x00, 0x12]).unwrap(),
            InitState::AlreadyConfigured
        );
        for bad in [&[0x04, 0x00][..], &[0x00, 0x80], &[0x01, 0x02], &[0x04], &[]] {
            let err = classify_probe(Variant::Rh, bad).unwrap_err();
            assert!(matches!(err, DigibaseError::ProtocolViolation { variant: Variant::Rh, .. }));
        }
    }

    #[test]
    fn classic_probe_polarity_is_reversed() {
        assert_eq!(
            classify_probe(Variant::Classic, &[0x00]).unwrap(),
            InitState::AlreadyConfigured
        );
        assert_eq!(
            classify_probe(Variant::Classic, &[0x04, 0x80]).unwrap(),
            InitState::NeedsFirmware
        );
        assert!(classify_probe(Variant::Classic, &[]).is_err());
    }
}
