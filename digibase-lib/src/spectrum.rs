use crate::constants::{SPECTRUM_BYTES, SPECTRUM_CHANNELS};
use crate::error::{DigibaseError, Result};
use tracing::warn;
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::U32;

#[cfg(feature = "serde")]
use serde::Serialize;

/// One PHA readout: 1024 cumulative channel counts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SpectrumFrame {
    counts: Vec<u32>,
}

fn decode_words(bytes: &[u8]) -> Vec<u32> {
    // U32 is unaligned, so any whole-word slice casts.
    <[U32]>::ref_from_bytes(bytes)
        .map(|words| words.iter().map(|w| w.get()).collect())
        .unwrap_or_default()
}

impl SpectrumFrame {
    pub fn new(counts: Vec<u32>) -> Result<Self> {
        if counts.len() != SPECTRUM_CHANNELS {
            return Err(DigibaseError::InsufficientData {
                expected: SPECTRUM_CHANNELS,
                actual: counts.len(),
            });
        }
        Ok(Self { counts })
    }

    /// Parses a spectrum response. Extra bytes past the 4096-byte payload are
    /// device framing and dropped.
    pub fn from_response(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SPECTRUM_BYTES {
            return Err(DigibaseError::InsufficientData {
                expected: SPECTRUM_BYTES,
                actual: bytes.len(),
            });
        }
        if bytes.len() > SPECTRUM_BYTES {
            warn!(extra = bytes.len() - SPECTRUM_BYTES, "Spectrum response longer than 1024 channels");
        }
        Ok(Self {
            counts: decode_words(&bytes[..SPECTRUM_BYTES]),
        })
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Counts reinterpreted as signed 32-bit, as stored in background files.
    pub fn to_i32(&self) -> Vec<i32> {
        self.counts.iter().map(|&c| c as i32).collect()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }
}

/// Decodes a list-mode response into 32-bit words. A trailing partial word
/// is dropped.
pub fn parse_hits(bytes: &[u8]) -> Vec<u32> {
    let whole = bytes.len() - bytes.len() % 4;
    if whole != bytes.len() {
        warn!(trailing = bytes.len() - whole, "Hit list ends in a partial word");
    }
    decode_words(&bytes[..whole])
}
