use crate::error::{DigibaseError, Result};
use crate::variant::VariantConfig;
use bytes::Bytes;
use std::path::Path;
use tracing::{info, warn};

/// FPGA bitstream, read once and sliced into the variant's upload pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwarePackage {
    image: Bytes,
}

impl FirmwarePackage {
    pub fn new(image: impl Into<Bytes>) -> Self {
        Self { image: image.into() }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = std::fs::read(path)?;
        info!(path = %path.display(), len = image.len(), "Loaded firmware image");
        Ok(Self::new(image))
    }

    /// Splits the image along the variant's page table.
    pub fn pages(&self, config: &VariantConfig) -> Result<Vec<Bytes>> {
        let required = config.firmware_len();
        if self.image.len() < required {
            return Err(DigibaseError::FirmwareTooShort {
                expected: required,
                actual: self.image.len(),
            });
        }
        if self.image.len() > required {
            warn!(
                extra = self.image.len() - required,
                "Firmware image is longer than the page table; trailing bytes are not uploaded"
            );
        }
        Ok(config
            .firmware_pages
            .iter()
            .map(|page| self.image.slice(page.start..page.end))
            .collect())
    }
}
