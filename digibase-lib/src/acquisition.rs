//! Acquisition control: run/stop, HV, discriminators, pulse width and readout.
//!
//! Every setter mutates the mirror and re-issues the full 80-byte register
//! write. Getters refresh the mirror from the device first.

use crate::command;
use crate::constants::{HITS_READ_CAPACITY, MAX_HV_VOLTS, SPECTRUM_READ_CAPACITY};
use crate::device::Digibase;
use crate::error::{DigibaseError, Result};
use crate::spectrum::{self, SpectrumFrame};
use crate::status::fields;
use crate::transport::BulkTransport;
use crate::variant::Phase;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, warn};

impl<B: BulkTransport> Digibase<B> {
    /// Starts acquisition.
    pub fn start(&mut self) -> Result<()> {
        self.status_mut().set_flag(fields::RUN_ENABLE, true);
        self.flush()
    }

    /// Stops acquisition.
    pub fn stop(&mut self) -> Result<()> {
        self.status_mut().set_flag(fields::RUN_ENABLE, false);
        self.flush()
    }

    /// Clears the livetime and realtime counters.
    pub fn clear_counters(&mut self) -> Result<()> {
        self.status_mut().set_flag(fields::COUNTER_RESET, true);
        self.flush()?;
        self.status_mut().set_flag(fields::COUNTER_RESET, false);
        self.flush()
    }

    /// Turns on the PMT high voltage after checking the device's current setpoint.
    pub fn enable_hv(&mut self) -> Result<()> {
        let volts = self.hv()?;
        if volts > MAX_HV_VOLTS {
            return Err(DigibaseError::HvOutOfRange { volts });
        }
        info!(volts, "Enabling HV");
        self.status_mut().set_flag(fields::HV_ENABLE, true);
        self.flush()
    }

    pub fn disable_hv(&mut self) -> Result<()> {
        info!("Disabling HV");
        self.status_mut().set_flag(fields::HV_ENABLE, false);
        self.flush()
    }

    /// HV setpoint in volts.
    pub fn hv(&mut self) -> Result<f64> {
        self.refresh()?;
        Ok(self.status().hv_volts())
    }

    /// Sets the HV setpoint. Fractional volts are truncated; values at or
    /// above 1200 V are rejected without touching the register.
    pub fn set_hv(&mut self, volts: f64) -> Result<()> {
        let raw = self.status_mut().set_hv_volts(volts)?;
        debug!(volts, raw, "HV setpoint");
        self.flush()
    }

    /// Shaping time in microseconds.
    pub fn pulse_width(&mut self) -> Result<f64> {
        self.refresh()?;
        Ok(self.status().pulse_width_us())
    }

    pub fn set_pulse_width(&mut self, micros: f64) -> Result<()> {
        let raw = self.status_mut().set_pulse_width_us(micros)?;
        debug!(micros, raw, "Pulse width");
        self.flush()
    }

    /// Lower level discriminator, raw channel units.
    pub fn lld(&mut self) -> Result<u32> {
        self.refresh()?;
        Ok(self.status().field(self.config().lld))
    }

    /// Sets the lower level discriminator, masked to the revision's field width.
    pub fn set_lld(&mut self, value: u32) -> Result<()> {
        let field = self.config().lld;
        let masked = value & field.max_raw();
        if masked != value {
            warn!(value, masked, width = field.width, "LLD truncated to field width");
        }
        self.status_mut().set_field(field, masked);
        self.flush()
    }

    /// Upper level discriminator, raw channel units.
    pub fn uld(&mut self) -> Result<u32> {
        self.refresh()?;
        Ok(self.status().field(self.config().uld))
    }

    pub fn set_uld(&mut self, value: u32) -> Result<()> {
        let field = self.config().uld;
        self.status_mut().set_field(field, value & field.max_raw());
        self.flush()
    }

    /// Switches to list mode: clears mode and run, then pulses the list latch
    /// together with the counter reset.
    pub fn set_acq_mode_list(&mut self) -> Result<()> {
        let status = self.status_mut();
        status.set_field(fields::MODE_AND_RUN, 0);
        status.set_flag(fields::LIST_LATCH, true);
        status.set_flag(fields::COUNTER_RESET, true);
        self.flush()?;

        let status = self.status_mut();
        status.set_flag(fields::LIST_LATCH, false);
        status.set_flag(fields::COUNTER_RESET, false);
        self.flush()
    }

    /// Switches to pulse-height analysis mode.
    pub fn set_acq_mode_pha(&mut self) -> Result<()> {
        self.status_mut().set_flag(fields::ACQ_MODE, true);
        self.flush()
    }

    /// Reads the cumulative 1024-channel spectrum.
    pub fn spectrum(&mut self) -> Result<SpectrumFrame> {
        let response = self
            .transport_mut()
            .exchange(&command::read_spectrum(), Phase::Normal, SPECTRUM_READ_CAPACITY)?;
        SpectrumFrame::from_response(&response)
    }

    /// Reads whatever list-mode hits the device has buffered.
    pub fn hits(&mut self) -> Result<Vec<u32>> {
        let response = self
            .transport_mut()
            .exchange(&command::read_spectrum(), Phase::Normal, HITS_READ_CAPACITY)?;
        Ok(spectrum::parse_hits(&response))
    }

    /// Live time counter, raw ticks.
    pub fn livetime(&mut self) -> Result<u32> {
        self.refresh()?;
        Ok(self.status().field(fields::LIVETIME))
    }

    /// Real time counter, raw ticks.
    pub fn realtime(&mut self) -> Result<u32> {
        self.refresh()?;
        Ok(self.status().field(fields::REALTIME))
    }

    /// Raw HV readback.
    pub fn hv_readback(&mut self) -> Result<u32> {
        self.refresh()?;
        Ok(self.status().field(fields::HV_READBACK))
    }

    /// Hex dump of the freshly read register.
    pub fn status_dump(&mut self) -> Result<String> {
        self.refresh()?;
        Ok(self.status().to_string())
    }

    /// Stops acquisition and drops HV.
    pub fn shutdown(&mut self) -> Result<()> {
        self.stop()?;
        self.disable_hv()
    }

    /// Wraps the handle so acquisition is stopped and HV disabled when the
    /// guard goes out of scope.
    pub fn arm(&mut self) -> ArmedAcquisition<'_, B> {
        ArmedAcquisition { device: self }
    }
}

/// Holds a running base. Dropping it runs [`Digibase::shutdown`], logging
/// rather than propagating any failure.
pub struct ArmedAcquisition<'a, B: BulkTransport> {
    device: &'a mut Digibase<B>,
}

impl<B: BulkTransport> ArmedAcquisition<'_, B> {
    /// Shuts down now and reports the outcome.
    pub fn disarm(self) -> Result<()> {
        let result = self.device.shutdown();
        std::mem::forget(self);
        result
    }
}

impl<B: BulkTransport> Deref for ArmedAcquisition<'_, B> {
    type Target = Digibase<B>;

    fn deref(&self) -> &Self::Target {
        self.device
    }
}

impl<B: BulkTransport> DerefMut for ArmedAcquisition<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.device
    }
}

impl<B: BulkTransport> Drop for ArmedAcquisition<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.device.shutdown() {
            warn!(error = %e, "Shutdown after acquisition failed");
        }
    }
}
