//! Hardware collaborator interfaces.
//!
//! The kernel PCM driver and the mixer are consumed through the traits in
//! this module. [`mock`] provides simulated implementations that run without
//! a sound card.

pub mod mock;
mod pcm_config;

pub use pcm_config::PcmConfig;

use std::fmt;
use std::time::Instant;

use crate::error::PcmError;

/// Transfer direction of a PCM handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Playback.
    Out,
    /// Capture.
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Out => f.write_str("out"),
            Self::In => f.write_str("in"),
        }
    }
}

/// Sound card device index.
///
/// Indices name the PCM nodes of the on-board codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmDevice(pub u32);

impl PcmDevice {
    /// Low-power multimedia playback.
    pub const MM_LP: Self = Self(0);
    /// Multimedia playback.
    pub const MM: Self = Self(1);
    /// Multimedia capture.
    pub const MM_UL: Self = Self(3);
    /// Bluetooth SCO capture.
    pub const SCO_IN: Self = Self(5);
    /// Default playback node.
    pub const DEFAULT_OUT: Self = Self::MM;
    /// Default capture node.
    pub const DEFAULT_IN: Self = Self::MM_UL;
}

/// Playback buffer fill level at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Frames queued in the ring buffer and not yet played.
    pub frames: usize,
    /// When the level was sampled.
    pub timestamp: Instant,
}

/// An open hardware PCM handle.
///
/// The handle is closed when dropped.
pub trait Pcm: Send {
    /// Writes interleaved samples, returning the number of frames accepted.
    ///
    /// # Errors
    ///
    /// [`PcmError::Underrun`] signals a recoverable ring buffer underrun;
    /// any other error is a hardware failure.
    fn write(&mut self, samples: &[i16]) -> Result<usize, PcmError>;

    /// Fills `samples` with interleaved captured audio, blocking as needed.
    fn read(&mut self, samples: &mut [i16]) -> Result<(), PcmError>;

    /// Reports how many frames are queued in the playback ring buffer.
    fn occupancy(&mut self) -> Result<Occupancy, PcmError>;

    /// Returns the ring buffer size in frames.
    fn buffer_size(&self) -> usize;
}

/// Opens PCM handles on the sound cards.
pub trait PcmDriver: Send + Sync {
    /// Opens `device` on `card` for the given direction and configuration.
    fn open(
        &self,
        card: u32,
        device: PcmDevice,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, PcmError>;
}

/// Hardware mixer with named routing paths.
///
/// Path changes are staged by [`apply_path`](Self::apply_path) and take
/// effect on [`commit`](Self::commit).
pub trait Mixer: Send {
    /// Stages the neutral (all paths off) state.
    fn reset(&mut self);

    /// Stages the named path on top of the current staged state.
    fn apply_path(&mut self, name: &str) -> Result<(), crate::HalError>;

    /// Writes the staged state to the hardware.
    fn commit(&mut self);

    /// Returns the names of every path the mixer knows.
    fn path_names(&self) -> Vec<String>;
}
