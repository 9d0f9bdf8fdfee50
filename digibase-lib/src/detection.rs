//! Background-subtracted count monitoring.
//!
//! The device accumulates its spectrum, so each interval's counts are the
//! difference between consecutive reads. The scaled background is subtracted,
//! the region of interest summed and the result smoothed with an EMA.

use crate::background::BackgroundModel;
use crate::constants::SPECTRUM_CHANNELS;
use crate::device::Digibase;
use crate::error::{DigibaseError, Result};
use crate::spectrum::SpectrumFrame;
use crate::transport::BulkTransport;
use chrono::{DateTime, Local};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Anything that yields cumulative spectra.
pub trait SpectrumSource {
    fn read_spectrum(&mut self) -> Result<SpectrumFrame>;
}

impl<B: BulkTransport> SpectrumSource for Digibase<B> {
    fn read_spectrum(&mut self) -> Result<SpectrumFrame> {
        self.spectrum()
    }
}

impl<S: SpectrumSource + ?Sized> SpectrumSource for &mut S {
    fn read_spectrum(&mut self) -> Result<SpectrumFrame> {
        (**self).read_spectrum()
    }
}

/// Exponential moving average, `ema' = alpha * c + (1 - alpha) * ema`.
///
/// The first sample initializes the average. Without an alpha every sample
/// passes through unsmoothed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    alpha: Option<f64>,
    value: Option<f64>,
}

impl Ema {
    /// `alpha` must lie in (0, 1].
    pub fn new(alpha: Option<f64>) -> Result<Self> {
        if let Some(a) = alpha {
            if !(a > 0.0 && a <= 1.0) {
                return Err(DigibaseError::InvalidArgument(format!("EMA alpha {a} not in (0, 1]")));
            }
        }
        Ok(Self { alpha, value: None })
    }

    pub fn alpha(&self) -> Option<f64> {
        self.alpha
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match (self.alpha, self.value) {
            (Some(alpha), Some(previous)) => alpha * sample + (1.0 - alpha) * previous,
            _ => sample,
        };
        self.value = Some(next);
        next
    }
}

/// Per-run state carried between sampling intervals.
#[derive(Debug, Clone)]
pub struct DetectionState {
    last_spectrum: Vec<i32>,
    ema: Ema,
}

impl DetectionState {
    pub fn new(ema: Ema) -> Self {
        Self {
            last_spectrum: vec![0; SPECTRUM_CHANNELS],
            ema,
        }
    }

    pub fn last_spectrum(&self) -> &[i32] {
        &self.last_spectrum
    }

    pub fn ema(&self) -> &Ema {
        &self.ema
    }

    /// Folds one cumulative spectrum in. Returns the background-subtracted
    /// interval counts over `roi` and the smoothed value.
    pub fn update(&mut self, spectrum: &[i32], background: &[f64], roi: Range<usize>) -> (f64, f64) {
        let counts: f64 = roi
            .map(|ch| {
                let live = spectrum.get(ch).copied().unwrap_or(0);
                let last = self.last_spectrum.get(ch).copied().unwrap_or(0);
                live.wrapping_sub(last) as f64 - background.get(ch).copied().unwrap_or(0.0)
            })
            .sum();
        self.last_spectrum.clear();
        self.last_spectrum.extend_from_slice(spectrum);
        (counts, self.ema.update(counts))
    }
}

/// One reported interval.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DetectionSample {
    pub timestamp: DateTime<Local>,
    pub interval_counts: f64,
    pub smoothed: f64,
}

impl fmt::Display for DetectionSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - counts {:.1}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.smoothed
        )
    }
}

/// Periodic sampler: sleep, read, difference, subtract, smooth.
#[derive(Debug)]
pub struct DetectionLoop {
    duration: Duration,
    iterations: usize,
    roi: Range<usize>,
    background: Vec<f64>,
    state: DetectionState,
    stop: Option<Arc<AtomicBool>>,
}

impl DetectionLoop {
    /// Prepares a run of `iterations` samples of `duration` each, summing
    /// channels `roi` after subtracting `background` scaled to `duration`.
    pub fn new(
        background: &BackgroundModel,
        duration: Duration,
        iterations: usize,
        roi: Range<usize>,
        alpha: Option<f64>,
    ) -> Result<Self> {
        if roi.is_empty() {
            return Err(DigibaseError::InvalidArgument(format!(
                "empty region of interest {}..{}",
                roi.start, roi.end
            )));
        }
        let limit = SPECTRUM_CHANNELS.min(background.spectrum.len());
        if roi.end > limit {
            return Err(DigibaseError::InvalidArgument(format!(
                "region of interest {}..{} exceeds {limit} channels",
                roi.start, roi.end
            )));
        }
        let ema = Ema::new(alpha)?;
        let scaled = background.scaled(duration.as_secs_f64())?;
        debug!(
            exposure = background.exposure_seconds,
            roi_background = scaled[roi.clone()].iter().sum::<f64>(),
            "Background scaled to interval"
        );

        Ok(Self {
            duration,
            iterations,
            roi,
            background: scaled,
            state: DetectionState::new(ema),
            stop: None,
        })
    }

    /// Checked after every sleep; once set the loop returns early.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    /// Runs with real sleeps, calling `on_sample` after each interval.
    pub fn run<S: SpectrumSource>(
        &mut self,
        source: &mut S,
        on_sample: impl FnMut(&DetectionSample),
    ) -> Result<Vec<DetectionSample>> {
        self.run_with(source, std::thread::sleep, on_sample)
    }

    /// As [`run`](Self::run), with the wait between reads supplied by the caller.
    pub fn run_with<S: SpectrumSource>(
        &mut self,
        source: &mut S,
        mut sleep: impl FnMut(Duration),
        mut on_sample: impl FnMut(&DetectionSample),
    ) -> Result<Vec<DetectionSample>> {
        info!(
            iterations = self.iterations,
            duration = ?self.duration,
            roi = ?self.roi,
            "Starting detection"
        );
        let mut samples = Vec::with_capacity(self.iterations);
        for i in 0..self.iterations {
            sleep(self.duration);
            if self.stopped() {
                info!(completed = i, "Detection stopped");
                break;
            }
            let spectrum = source.read_spectrum()?.to_i32();
            let (interval_counts, smoothed) = self.state.update(&spectrum, &self.background, self.roi.clone());
            let sample = DetectionSample {
                timestamp: Local::now(),
                interval_counts,
                smoothed,
            };
            debug!(i, interval_counts, smoothed, "Detection sample");
            on_sample(&sample);
            samples.push(sample);
        }
        Ok(samples)
    }

    fn stopped(&self) -> bool {
        self.stop.as_ref().is_some_and(|s| s.load(Ordering::Relaxed))
    }
}
