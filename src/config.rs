//! Runtime configuration and hardware timing constants.

use std::time::Duration;

use crate::format::Quality;

/// Frames per ABE base transfer unit.
pub const ABE_BASE_FRAME_COUNT: usize = 24;
/// Short period: 20 ms at 48 kHz.
pub const SHORT_PERIOD_SIZE: usize = ABE_BASE_FRAME_COUNT * 40;
/// Long period: twice the short period (40 ms).
pub const LONG_PERIOD_SIZE: usize = SHORT_PERIOD_SIZE * 2;

/// Number of periods in the playback ring buffer.
pub const PLAYBACK_PERIOD_COUNT: usize = 4;
/// Number of periods in the capture ring buffer.
pub const CAPTURE_PERIOD_COUNT: usize = 2;

/// Rate at which output streams accept audio from the application.
pub const OUT_SAMPLING_RATE: u32 = 44100;
/// Rate of the full-power multimedia path.
pub const MM_FULL_POWER_SAMPLING_RATE: u32 = 48000;

/// SCO period size in frames.
pub const SCO_PERIOD_SIZE: usize = 256;
/// SCO period count.
pub const SCO_PERIOD_COUNT: usize = 4;
/// SCO (narrowband voice) sample rate.
pub const SCO_SAMPLING_RATE: u32 = 8000;

/// Frames of converted output the playback scratch buffer holds.
pub const RESAMPLER_BUFFER_FRAMES: usize = SHORT_PERIOD_SIZE * 2;

/// Runtime tunables for a [`Device`](crate::Device).
///
/// Use [`HalConfig::default()`] for the values the hardware was tuned for, or
/// shrink the timings to drive the state machines quickly against simulated
/// hardware.
///
/// # Example
///
/// ```
/// use audio_hal::HalConfig;
/// use std::time::Duration;
///
/// let config = HalConfig {
///     min_write_sleep: Duration::from_micros(200),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct HalConfig {
    /// Shortest sleep taken by the write throttle while the playback buffer
    /// is above its threshold.
    ///
    /// Default: 5ms
    pub min_write_sleep: Duration,

    /// Rate used to turn a frame surplus into a throttle delay.
    ///
    /// Default: 48000
    pub throttle_rate: u32,

    /// Upper bound on the compensating delay inserted after a failed
    /// read or write.
    ///
    /// Default: 999999µs
    pub max_error_delay: Duration,

    /// Sound card of the on-board codec.
    ///
    /// Default: 0
    pub default_card: u32,

    /// Sound card of the HDMI transmitter.
    ///
    /// Default: 1
    pub hdmi_card: u32,

    /// Quality requested from the resampler factory.
    ///
    /// Default: [`Quality::Default`]
    pub resampler_quality: Quality,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            min_write_sleep: Duration::from_micros(5000),
            throttle_rate: MM_FULL_POWER_SAMPLING_RATE,
            max_error_delay: Duration::from_micros(999_999),
            default_card: 0,
            hdmi_card: 1,
            resampler_quality: Quality::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_sizes() {
        assert_eq!(SHORT_PERIOD_SIZE, 960);
        assert_eq!(LONG_PERIOD_SIZE, 1920);
        assert_eq!(RESAMPLER_BUFFER_FRAMES, 1920);
    }

    #[test]
    fn test_hal_config_defaults() {
        let config = HalConfig::default();
        assert_eq!(config.min_write_sleep, Duration::from_millis(5));
        assert_eq!(config.throttle_rate, 48000);
        assert_eq!(config.max_error_delay, Duration::from_micros(999_999));
        assert_eq!(config.default_card, 0);
        assert_eq!(config.hdmi_card, 1);
        assert_eq!(config.resampler_quality, Quality::Default);
    }
}
