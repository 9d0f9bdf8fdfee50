use crate::constants::PRODUCT_ID_RH;
use crate::status::BitField;
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Hardware revision of the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Variant {
    #[strum(to_string = "digiBase")]
    Classic,
    #[strum(to_string = "digiBase-RH")]
    Rh,
}

impl Variant {
    pub fn from_product_id(product_id: u16) -> Self {
        if product_id == PRODUCT_ID_RH {
            Variant::Rh
        } else {
            Variant::Classic
        }
    }

    pub fn config(self) -> &'static VariantConfig {
        match self {
            Variant::Classic => &CLASSIC,
            Variant::Rh => &RH,
        }
    }
}

/// Which endpoint pair a command travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Probe and firmware bring-up
    Init,
    /// Status, spectrum and everything else
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPair {
    pub out: u8,
    pub r#in: u8,
}

/// Byte range of the firmware bitstream uploaded in one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwarePage {
    pub start: usize,
    pub end: usize,
}

impl FirmwarePage {
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Immutable per-revision constants.
#[derive(Debug)]
pub struct VariantConfig {
    pub variant: Variant,
    pub init_endpoints: EndpointPair,
    pub normal_endpoints: EndpointPair,
    pub probe_command: &'static [u8],
    pub firmware_file: &'static str,
    pub firmware_pages: &'static [FirmwarePage],
    pub lld: BitField,
    pub uld: BitField,
}

impl VariantConfig {
    pub fn endpoints(&self, phase: Phase) -> EndpointPair {
        match phase {
            Phase::Init => self.init_endpoints,
            Phase::Normal => self.normal_endpoints,
        }
    }

    /// Firmware image length the page table requires.
    pub fn firmware_len(&self) -> usize {
        self.firmware_pages.last().map_or(0, |p| p.end)
    }
}

pub static CLASSIC: VariantConfig = VariantConfig {
    variant: Variant::Classic,
    // The classic base has a single pair for both phases.
    init_endpoints: EndpointPair { out: 0x02, r#in: 0x82 },
    normal_endpoints: EndpointPair { out: 0x02, r#in: 0x82 },
    probe_command: &[0x06],
    firmware_file: "digiBase.rbf",
    firmware_pages: &[
        FirmwarePage { start: 0, end: 61438 },
        FirmwarePage { start: 61438, end: 122877 },
        FirmwarePage { start: 122877, end: 166965 },
    ],
    lld: BitField::new("lld", 168, 8),
    uld: BitField::new("uld", 176, 16),
};

pub static RH: VariantConfig = VariantConfig {
    variant: Variant::Rh,
    init_endpoints: EndpointPair { out: 0x01, r#in: 0x81 },
    normal_endpoints: EndpointPair { out: 0x08, r#in: 0x82 },
    probe_command: &[0x06, 0x00, 0x02, 0x00],
    firmware_file: "digiBaseRH.rbf",
    firmware_pages: &[
        FirmwarePage { start: 0, end: 61424 },
        FirmwarePage { start: 61424, end: 75463 },
    ],
    // Overlaps the low ULD bits; this is the layout the RH firmware uses.
    lld: BitField::new("lld", 170, 10),
    uld: BitField::new("uld", 176, 16),
};
