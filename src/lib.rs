//! # audio-hal
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Runtime core of a primary audio hardware abstraction layer.
//!
//! `audio-hal` sits between an audio framework and a kernel PCM driver. It
//! opens playback and capture streams, routes them through a mixer, converts
//! sample rates and channel layouts, paces writes against the hardware ring
//! buffer, and recovers from underruns without the caller noticing.
//!
//! ## Quick Start
//!
//! ```rust
//! use audio_hal::hw::mock::{MockMixer, MockPcmDriver};
//! use audio_hal::{
//!     AudioConfig, AudioHal, ChannelMask, DeviceMask, OutputFlags, AUDIO_HARDWARE_INTERFACE,
//! };
//!
//! let device = AudioHal::builder()
//!     .driver(MockPcmDriver::new())
//!     .mixer(MockMixer::with_builtin_paths())
//!     .open(AUDIO_HARDWARE_INTERFACE)?;
//!
//! let requested = AudioConfig::new(44100, ChannelMask::OUT_STEREO);
//! let (out, negotiated) =
//!     device.open_output_stream(DeviceMask::OUT_SPEAKER, OutputFlags::NONE, &requested)?;
//! assert_eq!(negotiated.sample_rate, 44100);
//!
//! // Interleaved stereo S16LE
//! let transfer = out.write(&[0u8; 3840]);
//! assert_eq!(transfer.bytes, 3840);
//! # Ok::<(), audio_hal::HalError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Device**: owns routing state and the mixer, and keeps at most one
//!   active output and one active input whose rates belong to compatible
//!   clock families
//! - **Streams**: each stream sits in standby until its first transfer,
//!   opens the PCM lazily and returns to standby on request or failure
//! - **Locking**: the device lock is always taken before a stream lock; the
//!   blocking hardware call runs holding only the stream lock
//!
//! The kernel driver, the mixer and the rate converter are traits, so the
//! whole state machine runs against [`hw::mock`] in tests.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod audio_config;
mod builder;
pub mod config;
mod device;
mod error;
pub mod format;
pub mod hw;
mod lock;
pub mod params;
pub mod routing;
mod stream;

pub use audio_config::{
    AudioConfig, AudioMode, ChannelMask, Orientation, OutputFlags, SampleFormat,
};
pub use builder::{
    AudioHal, AudioHalBuilder, AUDIO_HARDWARE_INTERFACE, AUDIO_HARDWARE_MODULE_ID, MODULE_NAME,
};
pub use config::HalConfig;
pub use device::{rates_conflict, Device};
pub use error::{HalError, PcmError};
pub use routing::DeviceMask;
pub use stream::{StreamId, StreamIn, StreamOut, Transfer};
