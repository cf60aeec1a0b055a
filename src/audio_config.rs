//! Application-facing stream configuration types.

use std::fmt;

/// PCM sample encoding of the application-facing side of a stream.
///
/// Only signed 16-bit little-endian samples are exchanged with callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Signed 16-bit, little-endian.
    #[default]
    Pcm16Bit,
}

impl SampleFormat {
    /// Returns the size of one sample in bytes.
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Pcm16Bit => 2,
        }
    }
}

/// Channel layout bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelMask(pub u32);

impl ChannelMask {
    /// Left + right output channels.
    pub const OUT_STEREO: Self = Self(0x3);
    /// Single input channel.
    pub const IN_MONO: Self = Self(0x10);
    /// Left + right input channels.
    pub const IN_STEREO: Self = Self(0xC);

    /// Returns the number of channels described by the mask.
    #[must_use]
    pub const fn channel_count(self) -> u32 {
        self.0.count_ones()
    }
}

impl fmt::Debug for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelMask({:#x})", self.0)
    }
}

/// Stream configuration requested by, and echoed back to, the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel layout.
    pub channel_mask: ChannelMask,
    /// Sample encoding.
    pub format: SampleFormat,
}

impl AudioConfig {
    /// Creates a 16-bit configuration.
    #[must_use]
    pub const fn new(sample_rate: u32, channel_mask: ChannelMask) -> Self {
        Self {
            sample_rate,
            channel_mask,
            format: SampleFormat::Pcm16Bit,
        }
    }

    /// Returns the size of one interleaved frame in bytes.
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        self.channel_mask.channel_count() as usize * self.format.bytes_per_sample()
    }
}

/// Flags passed when opening an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputFlags {
    /// Request the long-period, low-power playback path.
    pub deep_buffer: bool,
}

impl OutputFlags {
    /// Flags for the standard low-latency path.
    pub const NONE: Self = Self { deep_buffer: false };
    /// Flags for the deep-buffer path.
    pub const DEEP_BUFFER: Self = Self { deep_buffer: true };
}

/// Telephony mode reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    /// No call in progress.
    #[default]
    Normal,
    /// An incoming call is ringing.
    Ringtone,
    /// A cellular call is active.
    InCall,
    /// A VoIP or other communication session is active.
    InCommunication,
}

/// Physical orientation reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Landscape.
    Landscape,
    /// Portrait.
    Portrait,
    /// Square.
    Square,
    /// Unknown or unreported.
    #[default]
    Undefined,
}

impl Orientation {
    /// Parses a parameter value; unknown strings map to `Undefined`.
    #[must_use]
    pub fn from_param(value: &str) -> Self {
        match value {
            "landscape" => Self::Landscape,
            "portrait" => Self::Portrait,
            "square" => Self::Square,
            _ => Self::Undefined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_count() {
        assert_eq!(ChannelMask::OUT_STEREO.channel_count(), 2);
        assert_eq!(ChannelMask::IN_MONO.channel_count(), 1);
        assert_eq!(ChannelMask::IN_STEREO.channel_count(), 2);
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(AudioConfig::new(44100, ChannelMask::OUT_STEREO).frame_size(), 4);
        assert_eq!(AudioConfig::new(8000, ChannelMask::IN_MONO).frame_size(), 2);
    }

    #[test]
    fn test_orientation_from_param() {
        assert_eq!(Orientation::from_param("portrait"), Orientation::Portrait);
        assert_eq!(Orientation::from_param("landscape"), Orientation::Landscape);
        assert_eq!(Orientation::from_param("square"), Orientation::Square);
        assert_eq!(Orientation::from_param("sideways"), Orientation::Undefined);
    }
}
