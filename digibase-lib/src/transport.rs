//! Half-duplex command/response exchange over a pair of bulk endpoints.

use crate::constants::{READ_TIMEOUT, WRITE_TIMEOUT};
use crate::error::{DigibaseError, Result};
use crate::variant::{Phase, VariantConfig};
use std::time::Duration;
use tracing::debug;

/// Payload bytes included in a debug log line.
const LOG_PREVIEW_LEN: usize = 64;

/// Raw bulk-transfer capability of an opened device.
pub trait BulkTransport {
    /// Writes `data` to `endpoint`, returning the number of bytes the device accepted.
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Reads up to `capacity` bytes from `endpoint`. Nothing pending before
    /// `timeout` expires yields an empty vector rather than an error.
    fn read(&mut self, endpoint: u8, capacity: usize, timeout: Duration) -> Result<Vec<u8>>;
}

impl<T: BulkTransport + ?Sized> BulkTransport for &mut T {
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(endpoint, data, timeout)
    }

    fn read(&mut self, endpoint: u8, capacity: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read(endpoint, capacity, timeout)
    }
}

impl<T: BulkTransport + ?Sized> BulkTransport for Box<T> {
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(endpoint, data, timeout)
    }

    fn read(&mut self, endpoint: u8, capacity: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read(endpoint, capacity, timeout)
    }
}

fn preview(data: &[u8]) -> String {
    if data.len() > LOG_PREVIEW_LEN {
        format!("{}...", hex::encode(&data[..LOG_PREVIEW_LEN]))
    } else {
        hex::encode(data)
    }
}

/// Pure framing over a [`BulkTransport`]: picks the endpoint pair for the
/// phase, enforces complete writes and never looks at payloads.
pub struct Transport<B> {
    bulk: B,
    config: &'static VariantConfig,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl<B: BulkTransport> Transport<B> {
    pub fn new(bulk: B, config: &'static VariantConfig) -> Self {
        Self {
            bulk,
            config,
            write_timeout: WRITE_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, write_timeout: Duration, read_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self.read_timeout = read_timeout;
        self
    }

    pub fn config(&self) -> &'static VariantConfig {
        self.config
    }

    /// Writes `command` and reads back up to `capacity` bytes. A read timeout
    /// returns an empty response.
    pub fn exchange(&mut self, command: &[u8], phase: Phase, capacity: usize) -> Result<Vec<u8>> {
        self.write_all(command, phase)?;
        let endpoint = self.config.endpoints(phase).r#in;
        let response = self.bulk.read(endpoint, capacity, self.read_timeout)?;
        debug!(
            endpoint = %format!("{endpoint:#04x}"),
            len = response.len(),
            bytes = preview(&response),
            "USB Read"
        );
        Ok(response)
    }

    /// Fire-and-forget write for commands the device does not answer.
    pub fn send(&mut self, command: &[u8], phase: Phase) -> Result<()> {
        self.write_all(command, phase)
    }

    fn write_all(&mut self, command: &[u8], phase: Phase) -> Result<()> {
        let endpoint = self.config.endpoints(phase).out;
        debug!(
            endpoint = %format!("{endpoint:#04x}"),
            len = command.len(),
            bytes = preview(command),
            "USB Write"
        );
        let written = self.bulk.write(endpoint, command, self.write_timeout)?;
        if written != command.len() {
            return Err(DigibaseError::ShortWrite {
                endpoint,
                expected: command.len(),
                actual: written,
            });
        }
        Ok(())
    }

    pub fn bulk(&self) -> &B {
        &self.bulk
    }

    pub fn bulk_mut(&mut self) -> &mut B {
        &mut self.bulk
    }

    pub fn into_inner(self) -> B {
        self.bulk
    }
}
