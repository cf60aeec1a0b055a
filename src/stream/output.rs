//! Playback stream.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::flow::{self, FlowControl};
use super::{compensating_delay, ActiveStream, StreamId, Transfer};
use crate::audio_config::{AudioConfig, ChannelMask, SampleFormat};
use crate::config::{
    LONG_PERIOD_SIZE, MM_FULL_POWER_SAMPLING_RATE, OUT_SAMPLING_RATE, PLAYBACK_PERIOD_COUNT,
    RESAMPLER_BUFFER_FRAMES, SHORT_PERIOD_SIZE,
};
use crate::device::{evict_conflicting_input, Device, DeviceGuard, DeviceState};
use crate::error::PcmError;
use crate::format::{bytes_to_samples, discard_right_channel, round_up_16, Resampler};
use crate::hw::{Direction, Pcm, PcmConfig, PcmDevice};
use crate::lock::StreamLock;
use crate::params::{Parameters, ROUTING};
use crate::routing::DeviceMask;
use crate::HalError;

/// Channels in the application's playback buffers.
const APP_CHANNELS: usize = 2;
/// Bytes per application playback frame.
const APP_FRAME_SIZE: usize = APP_CHANNELS * 2;

const RESAMPLER_BUFFER: &str = "playback resampler buffer";

pub(crate) struct OutCore {
    pub(crate) id: StreamId,
    pub(crate) low_power: bool,
    pub(crate) state: StreamLock<OutState>,
}

pub(crate) struct OutState {
    pcm: Option<Box<dyn Pcm>>,
    pub(crate) config: PcmConfig,
    write_threshold: usize,
    resampler: Option<Box<dyn Resampler>>,
    /// Resampler output.
    buffer: Vec<i16>,
    /// Decoded application samples.
    app: Vec<i16>,
}

impl OutState {
    fn new(low_power: bool, devices: DeviceMask) -> Self {
        let mut state = Self {
            pcm: None,
            config: PcmConfig::playback(),
            write_threshold: 0,
            resampler: None,
            buffer: Vec::new(),
            app: Vec::new(),
        };
        state.configure(low_power, devices);
        state
    }

    pub(crate) fn is_standby(&self) -> bool {
        self.pcm.is_none()
    }

    /// Picks the PCM preset and thresholds for the selected devices.
    ///
    /// Returns the card-relative device index to open.
    fn configure(&mut self, low_power: bool, devices: DeviceMask) -> PcmDevice {
        if devices.intersects(DeviceMask::OUT_AUX_DIGITAL) {
            self.config = PcmConfig::hdmi();
            self.write_threshold = PLAYBACK_PERIOD_COUNT * LONG_PERIOD_SIZE;
            return PcmDevice::DEFAULT_OUT;
        }

        let (mut config, period, device) = if low_power {
            (
                PcmConfig::playback_deep_buffer(),
                LONG_PERIOD_SIZE,
                PcmDevice::MM_LP,
            )
        } else {
            (PcmConfig::playback(), SHORT_PERIOD_SIZE, PcmDevice::MM)
        };
        config.start_threshold = period * 2;
        config.avail_min = period;
        self.config = config;
        self.write_threshold = PLAYBACK_PERIOD_COUNT * period;
        device
    }
}

/// Returns the output resampler, creating it if the hardware rate changed.
fn ensure_resampler<'a>(
    slot: &'a mut Option<Box<dyn Resampler>>,
    device: &Device,
    output_rate: u32,
    channels: usize,
) -> Result<&'a mut Box<dyn Resampler>, HalError> {
    let resampler = match slot.take() {
        Some(existing)
            if existing.output_rate() == output_rate && existing.channels() == channels =>
        {
            existing
        }
        _ => {
            let created = device.resamplers().create(
                OUT_SAMPLING_RATE,
                output_rate,
                channels,
                device.config().resampler_quality,
            )?;
            tracing::debug!(
                input_rate = OUT_SAMPLING_RATE,
                output_rate,
                channels,
                "Output resampler created"
            );
            created
        }
    };
    Ok(slot.insert(resampler))
}

/// Drops the PCM handle and clears the device's active output reference.
pub(crate) fn enter_standby(id: StreamId, state: &mut OutState, device: &mut DeviceState) {
    if state.pcm.take().is_some() {
        if device.active_out.as_ref().is_some_and(|a| a.id == id) {
            device.active_out = None;
        }
        tracing::debug!(stream = %id, "Output entered standby");
    }
}

/// A playback stream.
///
/// Accepts interleaved stereo 16-bit audio at 44.1 kHz. The hardware is
/// opened on the first [`write`](Self::write) and released on
/// [`standby`](Self::standby) or drop.
pub struct StreamOut {
    device: Arc<Device>,
    core: Arc<OutCore>,
}

impl StreamOut {
    pub(crate) fn new(
        device: Arc<Device>,
        id: StreamId,
        low_power: bool,
        devices: DeviceMask,
    ) -> Result<Self, HalError> {
        let mut state = OutState::new(low_power, devices);
        if devices.intersects(DeviceMask::OUT_ALL_SCO) {
            ensure_resampler(
                &mut state.resampler,
                &device,
                MM_FULL_POWER_SAMPLING_RATE,
                APP_CHANNELS,
            )?;
            reserve_samples(
                &mut state.buffer,
                RESAMPLER_BUFFER_FRAMES * APP_CHANNELS,
                RESAMPLER_BUFFER,
            )?;
        }
        Ok(Self {
            device,
            core: Arc::new(OutCore {
                id,
                low_power,
                state: StreamLock::new(state),
            }),
        })
    }

    /// Stream identifier.
    pub fn id(&self) -> StreamId {
        self.core.id
    }

    /// Returns true if the stream was opened with the deep-buffer flag.
    pub fn is_low_power(&self) -> bool {
        self.core.low_power
    }

    /// Application-side sample rate.
    pub fn sample_rate(&self) -> u32 {
        OUT_SAMPLING_RATE
    }

    /// The application rate is fixed.
    pub fn set_sample_rate(&self, _rate: u32) -> Result<(), HalError> {
        Err(HalError::not_supported("set_sample_rate"))
    }

    /// Application-side channel layout.
    pub fn channels(&self) -> ChannelMask {
        ChannelMask::OUT_STEREO
    }

    /// Application-side sample format.
    pub fn format(&self) -> SampleFormat {
        SampleFormat::Pcm16Bit
    }

    /// The sample format is fixed.
    pub fn set_format(&self, _format: SampleFormat) -> Result<(), HalError> {
        Err(HalError::not_supported("set_format"))
    }

    /// Negotiated application configuration.
    pub fn config(&self) -> AudioConfig {
        AudioConfig::new(OUT_SAMPLING_RATE, ChannelMask::OUT_STEREO)
    }

    /// Preferred write size in bytes.
    ///
    /// One short period at the hardware rate, scaled to the application rate
    /// and rounded up to 16 frames.
    pub fn buffer_size(&self) -> usize {
        let rate = self.pcm_config().rate.max(1) as usize;
        round_up_16(SHORT_PERIOD_SIZE * OUT_SAMPLING_RATE as usize / rate) * APP_FRAME_SIZE
    }

    /// Playback latency in milliseconds.
    pub fn latency_ms(&self) -> u32 {
        let rate = self.pcm_config().rate.max(1) as usize;
        u32::try_from(SHORT_PERIOD_SIZE * PLAYBACK_PERIOD_COUNT * 1000 / rate).unwrap_or(u32::MAX)
    }

    /// Volume is applied by the mixer elsewhere; accepted and ignored.
    pub fn set_volume(&self, left: f32, right: f32) -> Result<(), HalError> {
        tracing::trace!(stream = %self.core.id, left, right, "Ignoring stream volume");
        Ok(())
    }

    /// Frames rendered by the DSP.
    pub fn render_position(&self) -> Result<u32, HalError> {
        Err(HalError::not_supported("render_position"))
    }

    /// Presentation time of the next write.
    pub fn next_write_timestamp(&self) -> Result<i64, HalError> {
        Err(HalError::not_supported("next_write_timestamp"))
    }

    /// Current hardware configuration.
    pub fn pcm_config(&self) -> PcmConfig {
        let dev = self.device.lock();
        self.core.state.lock(&dev).config
    }

    /// Occupancy above which writes are throttled, in frames.
    pub fn write_threshold(&self) -> usize {
        let dev = self.device.lock();
        self.core.state.lock(&dev).write_threshold
    }

    /// Returns true if no hardware handle is open.
    pub fn is_standby(&self) -> bool {
        let dev = self.device.lock();
        self.core.state.lock(&dev).is_standby()
    }

    /// Releases the hardware. A later write reopens it.
    pub fn standby(&self) {
        let mut dev = self.device.lock();
        let mut state = self.core.state.lock(&dev);
        enter_standby(self.core.id, &mut state, &mut dev);
    }

    /// Applies `routing=<mask>`. Other keys are ignored.
    ///
    /// Changing to or from an SCO output forces standby so the next write
    /// reopens the hardware on the right path.
    pub fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError> {
        let params = Parameters::parse(kvpairs);
        let Some(bits) = params.get_u32(ROUTING)? else {
            return Ok(());
        };
        let requested = DeviceMask(bits);

        let mut dev = self.device.lock();
        if requested.is_empty() || requested == dev.out_devices {
            return Ok(());
        }
        let sco_toggled =
            (requested & DeviceMask::OUT_ALL_SCO) != (dev.out_devices & DeviceMask::OUT_ALL_SCO);
        if sco_toggled {
            let mut state = self.core.state.lock(&dev);
            enter_standby(self.core.id, &mut state, &mut dev);
        }
        tracing::debug!(stream = %self.core.id, devices = ?requested, "Output routing changed");
        dev.out_devices = requested;
        self.device.apply_routing(&mut dev);
        Ok(())
    }

    /// No parameters are reported.
    pub fn parameters(&self, _keys: &str) -> String {
        String::new()
    }

    /// Writes interleaved stereo 16-bit little-endian audio.
    ///
    /// Blocks until the hardware buffer has room. The returned byte count is
    /// always `buffer.len()`. An underrun is recovered by reopening the
    /// hardware and retrying; any other failure puts the stream in standby
    /// and is reported in [`Transfer::error`].
    pub fn write(&self, buffer: &[u8]) -> Transfer {
        let bytes = buffer.len();
        loop {
            let Err(err) = self.write_once(buffer) else {
                return Transfer::complete(bytes);
            };
            tracing::error!(stream = %self.core.id, error = %err, "Playback write failed");
            thread::sleep(self.error_delay(bytes));

            match err {
                HalError::Underrun => {
                    tracing::warn!(stream = %self.core.id, "Underrun, restarting playback");
                    self.standby();
                }
                HalError::Pcm(_) => {
                    self.standby();
                    return Transfer::failed(bytes, err);
                }
                _ => return Transfer::failed(bytes, err),
            }
        }
    }

    fn error_delay(&self, bytes: usize) -> Duration {
        compensating_delay(
            bytes,
            APP_FRAME_SIZE,
            OUT_SAMPLING_RATE,
            self.device.config().max_error_delay,
        )
    }

    fn write_once(&self, buffer: &[u8]) -> Result<(), HalError> {
        let mut dev = self.device.lock();
        let mut guard = self.core.state.lock(&dev);
        if guard.is_standby() {
            self.start(&mut guard, &mut dev)?;
        }
        let bypass_throttle = dev.out_devices.intersects(DeviceMask::OUT_ALL_SCO);
        drop(dev);

        let OutState {
            pcm,
            config,
            write_threshold,
            resampler,
            buffer: scratch,
            app,
        } = &mut *guard;

        bytes_to_samples(buffer, app);
        let hw_channels = config.channels as usize;
        let frames = app.len() / APP_CHANNELS;
        if hw_channels < APP_CHANNELS {
            discard_right_channel(app, frames);
        }
        let channels = hw_channels.min(APP_CHANNELS);

        let samples: &[i16] = if config.rate == OUT_SAMPLING_RATE {
            &app[..frames * channels]
        } else {
            let resampler = ensure_resampler(resampler, &self.device, config.rate, channels)?;
            let out_frames = frames * config.rate as usize / OUT_SAMPLING_RATE as usize + 2;
            reserve_samples(
                scratch,
                out_frames.max(RESAMPLER_BUFFER_FRAMES) * channels,
                RESAMPLER_BUFFER,
            )?;
            let conversion = resampler.resample_from_input(&app[..frames * channels], scratch);
            &scratch[..conversion.produced * channels]
        };

        let Some(pcm) = pcm.as_mut() else {
            return Err(HalError::Pcm(PcmError::NoDevice));
        };
        if !bypass_throttle {
            let stats = flow::throttle(
                &mut **pcm,
                *write_threshold,
                &FlowControl::from_config(self.device.config()),
            );
            if stats.sleeps > 0 {
                tracing::trace!(
                    stream = %self.core.id,
                    polls = stats.polls,
                    slept_us = stats.slept.as_micros() as u64,
                    "Throttled write"
                );
            }
        }
        match pcm.write(samples) {
            Ok(_) => Ok(()),
            Err(PcmError::Underrun) => Err(HalError::Underrun),
            Err(e) => Err(HalError::Pcm(e)),
        }
    }

    fn start(&self, state: &mut OutState, dev: &mut DeviceGuard<'_>) -> Result<(), HalError> {
        let config = self.device.config();
        let hdmi = dev.out_devices.intersects(DeviceMask::OUT_AUX_DIGITAL);
        let card = if hdmi {
            config.hdmi_card
        } else {
            config.default_card
        };
        let device = state.configure(self.core.low_power, dev.out_devices);

        evict_conflicting_input(dev, state.config.rate);

        let pcm = self
            .device
            .driver()
            .open(card, device, Direction::Out, &state.config)
            .map_err(|e| {
                tracing::error!(
                    stream = %self.core.id,
                    card,
                    device = device.0,
                    error = %e,
                    "Cannot open playback PCM"
                );
                HalError::unavailable(format!(
                    "playback open on card {card} device {} failed: {e}",
                    device.0
                ))
            })?;

        state.pcm = Some(pcm);
        dev.active_out = Some(ActiveStream::new(self.core.id, &self.core));
        if let Some(resampler) = state.resampler.as_mut() {
            resampler.reset();
        }
        tracing::debug!(
            stream = %self.core.id,
            card,
            device = device.0,
            rate = state.config.rate,
            period_size = state.config.period_size,
            write_threshold = state.write_threshold,
            "Playback started"
        );
        Ok(())
    }
}

impl fmt::Debug for StreamOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOut")
            .field("id", &self.core.id)
            .field("low_power", &self.core.low_power)
            .finish_non_exhaustive()
    }
}

impl Drop for StreamOut {
    fn drop(&mut self) {
        self.standby();
        tracing::debug!(stream = %self.core.id, "Output stream closed");
    }
}

/// Grows `buffer` to `samples`, reporting allocation failure.
pub(crate) fn reserve_samples(
    buffer: &mut Vec<i16>,
    samples: usize,
    what: &'static str,
) -> Result<(), HalError> {
    if buffer.len() < samples {
        buffer
            .try_reserve_exact(samples - buffer.len())
            .map_err(|_| HalError::ResourceExhausted { what })?;
        buffer.resize(samples, 0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_standard() {
        let state = OutState::new(false, DeviceMask::OUT_SPEAKER);
        assert_eq!(state.config.period_size, SHORT_PERIOD_SIZE);
        assert_eq!(state.config.start_threshold, SHORT_PERIOD_SIZE * 2);
        assert_eq!(state.config.avail_min, SHORT_PERIOD_SIZE);
        assert_eq!(state.write_threshold, SHORT_PERIOD_SIZE * 4);
        assert!(state.is_standby());
    }

    #[test]
    fn test_configure_low_power() {
        let mut state = OutState::new(true, DeviceMask::OUT_SPEAKER);
        assert_eq!(state.config.period_size, LONG_PERIOD_SIZE);
        assert_eq!(state.write_threshold, 7680);
        assert_eq!(
            state.configure(true, DeviceMask::OUT_SPEAKER),
            PcmDevice::MM_LP
        );
    }

    #[test]
    fn test_configure_hdmi_overrides_low_power() {
        let mut state = OutState::new(true, DeviceMask::OUT_SPEAKER);
        state.configure(true, DeviceMask::OUT_AUX_DIGITAL);
        assert_eq!(state.config, PcmConfig::hdmi());
        assert_eq!(state.write_threshold, LONG_PERIOD_SIZE * 4);

        // Leaving HDMI restores the low-power preset
        state.configure(true, DeviceMask::OUT_SPEAKER);
        assert_eq!(state.config.rate, OUT_SAMPLING_RATE);
        assert_eq!(state.config.period_size, LONG_PERIOD_SIZE);
    }

    #[test]
    fn test_reserve_samples_grows_only() {
        let mut buf = vec![1i16; 8];
        reserve_samples(&mut buf, 4, RESAMPLER_BUFFER).unwrap();
        assert_eq!(buf.len(), 8);
        reserve_samples(&mut buf, 16, RESAMPLER_BUFFER).unwrap();
        assert_eq!(buf.len(), 16);
    }
}
