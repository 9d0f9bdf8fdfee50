pub mod acquisition;
pub mod background;
pub mod command;
pub mod config;
pub mod constants;
pub mod detection;
pub mod device;
pub mod error;
pub mod firmware;
pub mod init;
pub mod spectrum;
pub mod status;
pub mod templates;
pub mod transport;
pub mod usb;
pub mod variant;

// Re-export the device handle and the types most callers touch
pub use acquisition::ArmedAcquisition;
pub use background::BackgroundModel;
pub use config::DeviceConfig;
pub use detection::{DetectionLoop, DetectionSample, Ema, SpectrumSource};
pub use device::{Digibase, DeviceIdentity};
pub use error::{DigibaseError, Result};
pub use firmware::FirmwarePackage;
pub use init::InitState;
pub use spectrum::SpectrumFrame;
pub use status::StatusRegister;
pub use transport::BulkTransport;
pub use variant::Variant;
