//! Background spectrum files ("DBKG").
//!
//! ```text
//! 0   8    magic "DBKG\0\0\0\0"
//! 8   8    capture time, f64 seconds since the epoch
//! 16  8    exposure, f64 seconds
//! 24  64   comment, UTF-8, at most 63 bytes, NUL padded
//! 88  4*N  spectrum, i32 counts
//! ```
//!
//! All numbers are little-endian. N is whatever the remaining file length
//! implies; a trailing partial count is dropped.

use crate::error::{DigibaseError, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use zerocopy::byteorder::little_endian::{F64, I32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::Serialize;

pub const MAGIC: [u8; 8] = *b"DBKG\0\0\0\0";
pub const COMMENT_LEN: usize = 64;
/// Longest comment stored, leaving room for the terminating NUL.
pub const MAX_COMMENT_BYTES: usize = COMMENT_LEN - 1;
pub const HEADER_LEN: usize = size_of::<DbkgHeader>();

/// On-disk header (88 bytes)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DbkgHeader {
    pub magic: [u8; 8],
    pub timestamp: F64,
    pub exposure: F64,
    pub comment: [u8; COMMENT_LEN],
}

/// A reference spectrum with its exposure, used for background subtraction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BackgroundModel {
    pub spectrum: Vec<i32>,
    /// Capture time, seconds since the Unix epoch
    pub timestamp: f64,
    pub exposure_seconds: f64,
    pub comment: String,
}

/// Cuts `comment` to at most 63 bytes without splitting a character.
fn truncate_comment(comment: &str) -> &str {
    if comment.len() <= MAX_COMMENT_BYTES {
        return comment;
    }
    let mut end = MAX_COMMENT_BYTES;
    while !comment.is_char_boundary(end) {
        end -= 1;
    }
    &comment[..end]
}

impl BackgroundModel {
    /// A model captured now.
    pub fn new(spectrum: Vec<i32>, exposure_seconds: f64, comment: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            spectrum,
            timestamp: now.timestamp_micros() as f64 / 1e6,
            exposure_seconds,
            comment: comment.into(),
        }
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros((self.timestamp * 1e6).round() as i64)
    }

    /// Expected background per channel over `duration` seconds.
    pub fn scaled(&self, duration: f64) -> Result<Vec<f64>> {
        if self.exposure_seconds.is_nan() || self.exposure_seconds <= 0.0 {
            return Err(DigibaseError::InvalidArgument(format!(
                "background exposure must be positive, got {}",
                self.exposure_seconds
            )));
        }
        let ratio = duration / self.exposure_seconds;
        Ok(self.spectrum.iter().map(|&c| c as f64 * ratio).collect())
    }

    fn header(&self) -> DbkgHeader {
        let stored = truncate_comment(&self.comment);
        if stored.len() < self.comment.len() {
            warn!(len = self.comment.len(), "Background comment truncated to {MAX_COMMENT_BYTES} bytes");
        }
        let mut comment = [0u8; COMMENT_LEN];
        comment[..stored.len()].copy_from_slice(stored.as_bytes());
        DbkgHeader {
            magic: MAGIC,
            timestamp: F64::new(self.timestamp),
            exposure: F64::new(self.exposure_seconds),
            comment,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + 4 * self.spectrum.len());
        bytes.extend_from_slice(self.header().as_bytes());
        for &count in &self.spectrum {
            bytes.extend_from_slice(I32::new(count).as_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Some(magic) = bytes.get(..MAGIC.len()) {
            if magic != MAGIC {
                let mut found = [0u8; 8];
                found.copy_from_slice(magic);
                return Err(DigibaseError::UnknownFormat { magic: found });
            }
        }
        let (header, body) = DbkgHeader::read_from_prefix(bytes).map_err(|_| DigibaseError::TruncatedFile {
            expected: HEADER_LEN,
            actual: bytes.len(),
        })?;
        let tail = body.len() % 4;
        if tail != 0 {
            warn!(trailing = tail, "Background file ends in a partial count; ignored");
        }
        let body = &body[..body.len() - tail];

        let text_len = header.comment.iter().position(|&b| b == 0).unwrap_or(COMMENT_LEN);
        let comment = std::str::from_utf8(&header.comment[..text_len])
            .map_err(|_| DigibaseError::InvalidComment)?
            .to_string();
        let spectrum = <[I32]>::ref_from_bytes(body)
            .map(|counts| counts.iter().map(|c| c.get()).collect())
            .map_err(|_| DigibaseError::TruncatedFile {
                expected: HEADER_LEN + body.len(),
                actual: bytes.len(),
            })?;

        Ok(Self {
            spectrum,
            timestamp: header.timestamp.get(),
            exposure_seconds: header.exposure.get(),
            comment,
        })
    }

    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.write_to(BufWriter::new(File::create(path)?))?;
        debug!(path = %path.display(), channels = self.spectrum.len(), "Saved background");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let model = Self::read_from(BufReader::new(File::open(path)?))?;
        debug!(
            path = %path.display(),
            channels = model.spectrum.len(),
            exposure = model.exposure_seconds,
            "Loaded background"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> BackgroundModel {
        BackgroundModel {
            spectrum: (0..1024).map(|c| c * 7 - 300).collect(),
            timestamp: 1_700_000_000.25,
            exposure_seconds: 10.0,
            comment: "test".to_string(),
        }
    }

    #[test]
    fn header_is_88_bytes() {
        assert_eq!(HEADER_LEN, 88);
    }

    #[test]
    fn layout() {
        let bytes = model().to_bytes();
        assert_eq!(bytes.len(), 88 + 4096);
        assert_eq!(&bytes[..8], b"DBKG\0\0\0\0");
        assert_eq!(&bytes[8..16], &1_700_000_000.25f64.to_le_bytes());
        assert_eq!(&bytes[16..24], &10.0f64.to_le_bytes());
        assert_eq!(&bytes[24..28], b"test");
        assert!(bytes[28..88].iter().all(|&b| b == 0));
        assert_eq!(&bytes[88..92], &(-300i32).to_le_bytes());
    }

    #[test]
    fn round_trip() {
        let original = model();
        let parsed = BackgroundModel::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn corrupted_magic() {
        let mut bytes = model().to_bytes();
        bytes[0] = b'X';
        let err = BackgroundModel::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DigibaseError::UnknownFormat { magic } if &magic[..4] == b"XBKG"));
        assert!(err.is_format_error());
    }

    #[test]
    fn accepts_any_channel_count() {
        let mut short = model();
        short.spectrum.truncate(3);
        let parsed = BackgroundModel::from_bytes(&short.to_bytes()).unwrap();
        assert_eq!(parsed.spectrum, vec![-300, -293, -286]);

        short.spectrum.clear();
        assert!(BackgroundModel::from_bytes(&short.to_bytes()).unwrap().spectrum.is_empty());
    }

    #[test]
    fn truncated_inputs() {
        let bytes = model().to_bytes();
        assert!(matches!(
            BackgroundModel::from_bytes(&bytes[..50]),
            Err(DigibaseError::TruncatedFile { expected: 88, actual: 50 })
        ));
    }

    #[test]
    fn partial_trailing_count_is_dropped() {
        let bytes = model().to_bytes();
        let parsed = BackgroundModel::from_bytes(&bytes[..94]).unwrap();
        assert_eq!(parsed.spectrum, vec![-300]);
        assert_eq!(parsed.comment, "test");

        let parsed = BackgroundModel::from_bytes(&bytes[..HEADER_LEN + 3]).unwrap();
        assert!(parsed.spectrum.is_empty());
    }

    #[test]
    fn long_comment_is_cut_on_char_boundary() {
        let mut m = model();
        // 31 two-byte characters plus one more do not fit in 63 bytes.
        m.comment = "é".repeat(32);
        let parsed = BackgroundModel::from_bytes(&m.to_bytes()).unwrap();
        assert_eq!(parsed.comment, "é".repeat(31));

        m.comment = "a".repeat(100);
        let parsed = BackgroundModel::from_bytes(&m.to_bytes()).unwrap();
        assert_eq!(parsed.comment.len(), 63);
    }

    #[test]
    fn invalid_comment() {
        let mut bytes = model().to_bytes();
        bytes[24] = 0xff;
        assert!(matches!(
            BackgroundModel::from_bytes(&bytes),
            Err(DigibaseError::InvalidComment)
        ));
    }

    #[test]
    fn scaling() {
        let m = model();
        let scaled = m.scaled(1.0).unwrap();
        assert!((scaled[0] + 30.0).abs() < 1e-9);
        assert!((scaled[100] - 40.0).abs() < 1e-9);

        let zero = BackgroundModel {
            exposure_seconds: 0.0,
            ..model()
        };
        assert!(zero.scaled(1.0).is_err());
    }

    #[test]
    fn capture_time() {
        let at = model().captured_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 250);
    }
}
