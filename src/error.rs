//! Error types for audio-hal.
//!
//! Errors are split into two categories:
//! - **Caller-facing errors** ([`HalError`]): returned by device and stream
//!   operations, or carried by a [`Transfer`](crate::Transfer) on the I/O paths
//! - **Driver errors** ([`PcmError`]): reported by a [`Pcm`](crate::hw::Pcm)
//!   handle and interpreted by the streams (an underrun is recoverable)

use crate::audio_config::AudioConfig;

/// Errors surfaced by the device and its streams.
///
/// Every failure is scoped to a single call or stream; none of them is fatal
/// to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// A scratch buffer could not be allocated.
    #[error("resource exhausted: {what}")]
    ResourceExhausted {
        /// What was being allocated.
        what: &'static str,
    },

    /// The hardware PCM device could not be opened or used.
    #[error("device unavailable: {reason}")]
    DeviceUnavailable {
        /// Why the device is unavailable.
        reason: String,
    },

    /// A hardware transfer failed.
    #[error("pcm error: {0}")]
    Pcm(#[from] PcmError),

    /// The playback ring buffer ran dry.
    ///
    /// Output streams absorb this by re-opening the device and retrying, so
    /// callers only see it if they drive a [`Pcm`](crate::hw::Pcm) directly.
    #[error("buffer underrun")]
    Underrun,

    /// The requested stream configuration is not supported.
    ///
    /// `suggested` holds the configuration the device would accept.
    #[error("configuration rejected (suggested: {suggested:?})")]
    ConfigRejected {
        /// Configuration the caller should retry with.
        suggested: AudioConfig,
    },

    /// The operation is permanently unimplemented.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// An argument was malformed or out of range.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the problem.
        reason: String,
    },
}

impl HalError {
    /// Creates a device unavailable error with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a not supported error for the named operation.
    pub fn not_supported(operation: &'static str) -> Self {
        Self::NotSupported { operation }
    }

    /// Creates an invalid argument error with the given reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Errors reported by a hardware PCM handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PcmError {
    /// The playback buffer underran; recoverable by re-opening the handle.
    #[error("underrun")]
    Underrun,

    /// No PCM handle is open.
    #[error("no device")]
    NoDevice,

    /// The driver returned an errno-style failure code.
    #[error("i/o error (code {code})")]
    Io {
        /// Driver error code.
        code: i32,
    },
}
