//! Hardware-facing PCM configuration records.

use crate::config::{
    CAPTURE_PERIOD_COUNT, LONG_PERIOD_SIZE, OUT_SAMPLING_RATE, PLAYBACK_PERIOD_COUNT,
    SCO_PERIOD_COUNT, SCO_PERIOD_SIZE, SCO_SAMPLING_RATE, SHORT_PERIOD_SIZE,
};

/// Configuration handed to [`PcmDriver::open`](super::PcmDriver::open).
///
/// Thresholds of zero leave the choice to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmConfig {
    /// Interleaved channel count.
    pub channels: u32,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Frames per period.
    pub period_size: usize,
    /// Periods in the ring buffer.
    pub period_count: usize,
    /// Frames queued before playback starts.
    pub start_threshold: usize,
    /// Free frames at which the driver stops the stream.
    pub stop_threshold: usize,
    /// Minimum free frames before a writer is woken.
    pub avail_min: usize,
}

impl PcmConfig {
    const fn preset(channels: u32, rate: u32, period_size: usize, period_count: usize) -> Self {
        Self {
            channels,
            rate,
            period_size,
            period_count,
            start_threshold: 0,
            stop_threshold: 0,
            avail_min: 0,
        }
    }

    /// Standard low-latency playback.
    #[must_use]
    pub const fn playback() -> Self {
        Self::preset(2, OUT_SAMPLING_RATE, SHORT_PERIOD_SIZE, PLAYBACK_PERIOD_COUNT)
    }

    /// Long-period low-power playback.
    #[must_use]
    pub const fn playback_deep_buffer() -> Self {
        Self::preset(2, OUT_SAMPLING_RATE, LONG_PERIOD_SIZE, PLAYBACK_PERIOD_COUNT)
    }

    /// Main microphone capture.
    #[must_use]
    pub const fn capture() -> Self {
        Self::preset(2, OUT_SAMPLING_RATE, SHORT_PERIOD_SIZE, CAPTURE_PERIOD_COUNT)
    }

    /// Bluetooth SCO voice link.
    #[must_use]
    pub const fn sco() -> Self {
        Self::preset(1, SCO_SAMPLING_RATE, SCO_PERIOD_SIZE, SCO_PERIOD_COUNT)
    }

    /// HDMI transmitter.
    #[must_use]
    pub const fn hdmi() -> Self {
        let mut config = Self::preset(2, 48000, LONG_PERIOD_SIZE, PLAYBACK_PERIOD_COUNT);
        config.start_threshold = LONG_PERIOD_SIZE * 2;
        config
    }

    /// Returns the ring buffer size in frames.
    #[must_use]
    pub const fn buffer_frames(&self) -> usize {
        self.period_size * self.period_count
    }

    /// Returns the number of interleaved samples in one period.
    #[must_use]
    pub const fn period_samples(&self) -> usize {
        self.period_size * self.channels as usize
    }
}

impl Default for PcmConfig {
    fn default() -> Self {
        Self::playback()
    }
}
