//! Playback and capture streams.
//!
//! Both stream kinds share one shape: they start in standby with no hardware
//! handle, open the PCM lazily on the first transfer, and return to standby
//! on request, on close, or after a hardware failure.

mod flow;
pub(crate) mod input;
pub(crate) mod output;
mod pull;

pub use input::StreamIn;
pub use output::StreamOut;

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::HalError;

/// Stable identifier of an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub(crate) u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a [`StreamOut::write`] or [`StreamIn::read`] call.
///
/// `bytes` always equals the requested length, so callers that pace
/// themselves on the returned size keep their cadence. A failure is carried
/// separately in `error`.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes reported as transferred.
    pub bytes: usize,
    /// The failure, if the transfer did not reach the hardware.
    pub error: Option<HalError>,
}

impl Transfer {
    pub(crate) fn complete(bytes: usize) -> Self {
        Self { bytes, error: None }
    }

    pub(crate) fn failed(bytes: usize, error: HalError) -> Self {
        Self {
            bytes,
            error: Some(error),
        }
    }

    /// Returns true if the transfer succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into a `Result`, dropping the byte count on failure.
    pub fn into_result(self) -> Result<usize, HalError> {
        match self.error {
            None => Ok(self.bytes),
            Some(e) => Err(e),
        }
    }
}

/// Non-owning reference from the device to its active stream.
pub(crate) struct ActiveStream<T> {
    pub(crate) id: StreamId,
    core: Weak<T>,
}

impl<T> ActiveStream<T> {
    pub(crate) fn new(id: StreamId, core: &Arc<T>) -> Self {
        Self {
            id,
            core: Arc::downgrade(core),
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<T>> {
        self.core.upgrade()
    }
}

/// Time a successful transfer of `bytes` would have taken, capped at `max`.
pub(crate) fn compensating_delay(
    bytes: usize,
    frame_size: usize,
    rate: u32,
    max: Duration,
) -> Duration {
    if frame_size == 0 || rate == 0 {
        return Duration::ZERO;
    }
    let micros = bytes as u64 * 1_000_000 / frame_size as u64 / u64::from(rate);
    Duration::from_micros(micros).min(max)
}
