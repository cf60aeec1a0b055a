//! Audio format conversion utilities.
//!
//! This module provides:
//! - Sample layout conversion (S16LE bytes ↔ samples, stereo → mono)
//! - Sample rate conversion behind the [`Resampler`] seam

mod convert;
mod resample;

pub use convert::{bytes_to_samples, discard_right_channel, round_up_16, samples_to_bytes};
pub use resample::{
    BufferProvider, Conversion, LinearResampler, LinearResamplerFactory, Quality, Resampler,
    ResamplerFactory,
};
