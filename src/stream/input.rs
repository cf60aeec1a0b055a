//! Capture stream.

use std::fmt;
use std::sync::Arc;
use std::thread;

use super::output::reserve_samples;
use super::pull::PullAdapter;
use super::{compensating_delay, ActiveStream, StreamId, Transfer};
use crate::audio_config::{AudioConfig, ChannelMask, SampleFormat};
use crate::device::{evict_conflicting_output, Device, DeviceGuard, DeviceState};
use crate::error::PcmError;
use crate::format::{round_up_16, samples_to_bytes, Resampler};
use crate::hw::{Direction, Pcm, PcmConfig, PcmDevice};
use crate::lock::StreamLock;
use crate::params::{Parameters, ROUTING};
use crate::routing::DeviceMask;
use crate::HalError;

/// Bytes per application capture frame (mono 16-bit).
const APP_FRAME_SIZE: usize = 2;

pub(crate) struct InCore {
    pub(crate) id: StreamId,
    requested_rate: u32,
    pub(crate) state: StreamLock<InState>,
}

pub(crate) struct InState {
    pcm: Option<Box<dyn Pcm>>,
    pub(crate) config: PcmConfig,
    resampler: Option<Box<dyn Resampler>>,
    adapter: PullAdapter,
    /// Stereo hardware frames read without a resampler.
    scratch: Vec<i16>,
    /// Mono application samples.
    frames: Vec<i16>,
}

impl InState {
    pub(crate) fn is_standby(&self) -> bool {
        self.pcm.is_none()
    }

    /// Sizes the sample buffers for a read of `count` frames.
    fn reserve(&mut self, count: usize) -> Result<(), HalError> {
        reserve_samples(&mut self.frames, count, "capture buffer")?;
        if self.resampler.is_none() && self.config.channels == 2 {
            reserve_samples(&mut self.scratch, count * 2, "capture scratch buffer")?;
        }
        Ok(())
    }

    /// Fills the front of `self.frames` with `count` mono frames.
    ///
    /// [`reserve`](Self::reserve) must have been called for `count`.
    fn capture(&mut self, count: usize) -> Result<(), PcmError> {
        let Self {
            pcm,
            config,
            resampler,
            adapter,
            scratch,
            frames,
        } = self;
        let out = &mut frames[..count];

        if let Some(resampler) = resampler.as_mut() {
            let mut produced = 0;
            while produced < count {
                let n = resampler.resample_from_provider(
                    &mut adapter.source(pcm.as_mut()),
                    &mut out[produced..],
                );
                adapter.status()?;
                if n == 0 {
                    break;
                }
                produced += n;
            }
            return Ok(());
        }

        let Some(pcm) = pcm.as_mut() else {
            adapter.record(Err(PcmError::NoDevice));
            return Err(PcmError::NoDevice);
        };
        let status = if config.channels == 2 {
            pcm.read(&mut scratch[..count * 2]).map(|()| {
                for (dst, frame) in out.iter_mut().zip(scratch.chunks_exact(2)) {
                    *dst = frame[0];
                }
            })
        } else {
            pcm.read(out)
        };
        adapter.record(status.clone());
        status
    }
}

/// Drops the PCM handle and clears the device's active input reference.
pub(crate) fn enter_standby(id: StreamId, state: &mut InState, device: &mut DeviceState) {
    if state.pcm.take().is_some() {
        if device.active_in.as_ref().is_some_and(|a| a.id == id) {
            device.active_in = None;
        }
        tracing::debug!(stream = %id, "Input entered standby");
    }
}

/// A capture stream.
///
/// Delivers mono 16-bit audio at the rate requested on open, converting from
/// the hardware rate when the two differ.
pub struct StreamIn {
    device: Arc<Device>,
    core: Arc<InCore>,
}

impl StreamIn {
    pub(crate) fn new(
        device: Arc<Device>,
        id: StreamId,
        requested_rate: u32,
    ) -> Result<Self, HalError> {
        let config = PcmConfig::capture();
        let mut adapter = PullAdapter::new();
        adapter.configure(&config)?;
        let mut state = InState {
            pcm: None,
            config,
            resampler: None,
            adapter,
            scratch: Vec::new(),
            frames: Vec::new(),
        };
        sync_resampler(&mut state, &device, requested_rate)?;

        Ok(Self {
            device,
            core: Arc::new(InCore {
                id,
                requested_rate,
                state: StreamLock::new(state),
            }),
        })
    }

    /// Stream identifier.
    pub fn id(&self) -> StreamId {
        self.core.id
    }

    /// Application-side sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.core.requested_rate
    }

    /// Accepted and ignored; the rate is fixed at open.
    pub fn set_sample_rate(&self, _rate: u32) -> Result<(), HalError> {
        Ok(())
    }

    /// Application-side channel layout.
    pub fn channels(&self) -> ChannelMask {
        ChannelMask::IN_MONO
    }

    /// Application-side sample format.
    pub fn format(&self) -> SampleFormat {
        SampleFormat::Pcm16Bit
    }

    /// The sample format is fixed.
    pub fn set_format(&self, _format: SampleFormat) -> Result<(), HalError> {
        Err(HalError::not_supported("set_format"))
    }

    /// Application configuration.
    pub fn config(&self) -> AudioConfig {
        AudioConfig::new(self.core.requested_rate, ChannelMask::IN_MONO)
    }

    /// Preferred read size in bytes.
    pub fn buffer_size(&self) -> usize {
        let config = self.pcm_config();
        let frames = config.period_size * self.core.requested_rate as usize
            / config.rate.max(1) as usize;
        round_up_16(frames) * APP_FRAME_SIZE
    }

    /// Accepted and ignored.
    pub fn set_gain(&self, gain: f32) -> Result<(), HalError> {
        tracing::trace!(stream = %self.core.id, gain, "Ignoring input gain");
        Ok(())
    }

    /// Frames dropped by the hardware. Overruns are not tracked.
    pub fn input_frames_lost(&self) -> u32 {
        0
    }

    /// Result of the most recent hardware read.
    pub fn last_read_status(&self) -> Result<(), PcmError> {
        let dev = self.device.lock();
        self.core.state.lock(&dev).adapter.status()
    }

    /// Current hardware configuration.
    pub fn pcm_config(&self) -> PcmConfig {
        let dev = self.device.lock();
        self.core.state.lock(&dev).config
    }

    /// Returns true if a resampler converts from the hardware rate.
    pub fn is_resampling(&self) -> bool {
        let dev = self.device.lock();
        self.core.state.lock(&dev).resampler.is_some()
    }

    /// Returns true if no hardware handle is open.
    pub fn is_standby(&self) -> bool {
        let dev = self.device.lock();
        self.core.state.lock(&dev).is_standby()
    }

    /// Releases the hardware. A later read reopens it.
    pub fn standby(&self) {
        let mut dev = self.device.lock();
        let mut state = self.core.state.lock(&dev);
        enter_standby(self.core.id, &mut state, &mut dev);
    }

    /// Applies `routing=<mask>`. Other keys are ignored.
    pub fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError> {
        let params = Parameters::parse(kvpairs);
        let Some(bits) = params.get_u32(ROUTING)? else {
            return Ok(());
        };
        let requested = DeviceMask(bits).without_marker();

        let mut dev = self.device.lock();
        if requested.is_empty() || requested == dev.in_devices {
            return Ok(());
        }
        let sco = DeviceMask::IN_ALL_SCO.without_marker();
        if (requested & sco) != (dev.in_devices & sco) {
            let mut state = self.core.state.lock(&dev);
            enter_standby(self.core.id, &mut state, &mut dev);
        }
        tracing::debug!(stream = %self.core.id, devices = ?requested, "Input routing changed");
        dev.in_devices = requested;
        self.device.apply_routing(&mut dev);
        Ok(())
    }

    /// No parameters are reported.
    pub fn parameters(&self, _keys: &str) -> String {
        String::new()
    }

    /// Reads mono 16-bit little-endian audio into `buffer`.
    ///
    /// The returned byte count is always `buffer.len()`. With the microphone
    /// muted a successful read yields silence. A hardware failure puts the
    /// stream in standby and is reported in [`Transfer::error`].
    pub fn read(&self, buffer: &mut [u8]) -> Transfer {
        let bytes = buffer.len();
        match self.read_once(buffer) {
            Ok(()) => {
                if self.device.mic_mute() {
                    buffer.fill(0);
                }
                Transfer::complete(bytes)
            }
            Err(err) => {
                tracing::error!(stream = %self.core.id, error = %err, "Capture read failed");
                self.standby();
                thread::sleep(compensating_delay(
                    bytes,
                    APP_FRAME_SIZE,
                    self.core.requested_rate,
                    self.device.config().max_error_delay,
                ));
                Transfer::failed(bytes, err)
            }
        }
    }

    fn read_once(&self, buffer: &mut [u8]) -> Result<(), HalError> {
        let mut dev = self.device.lock();
        let mut state = self.core.state.lock(&dev);
        if state.is_standby() {
            self.start(&mut state, &mut dev)?;
        }
        drop(dev);

        let count = buffer.len() / APP_FRAME_SIZE;
        state.reserve(count)?;
        state.capture(count)?;
        let written = samples_to_bytes(&state.frames[..count], buffer);
        buffer[written..].fill(0);
        Ok(())
    }

    fn start(&self, state: &mut InState, dev: &mut DeviceGuard<'_>) -> Result<(), HalError> {
        let (device, config) = if dev.in_devices.intersects_input(DeviceMask::IN_ALL_SCO) {
            (PcmDevice::SCO_IN, PcmConfig::sco())
        } else {
            (PcmDevice::DEFAULT_IN, PcmConfig::capture())
        };
        state.config = config;
        state.adapter.configure(&config)?;
        sync_resampler(state, &self.device, self.core.requested_rate)?;

        evict_conflicting_output(dev, config.rate);

        let card = self.device.config().default_card;
        let pcm = self
            .device
            .driver()
            .open(card, device, Direction::In, &config)
            .map_err(|e| {
                tracing::error!(
                    stream = %self.core.id,
                    card,
                    device = device.0,
                    error = %e,
                    "Cannot open capture PCM"
                );
                HalError::unavailable(format!(
                    "capture open on card {card} device {} failed: {e}",
                    device.0
                ))
            })?;

        state.pcm = Some(pcm);
        dev.active_in = Some(ActiveStream::new(self.core.id, &self.core));
        if let Some(resampler) = state.resampler.as_mut() {
            resampler.reset();
        }
        state.adapter.clear();
        debug_assert_eq!(state.adapter.residual(), 0);
        tracing::debug!(
            stream = %self.core.id,
            device = device.0,
            rate = config.rate,
            channels = config.channels,
            resampling = state.resampler.is_some(),
            "Capture started"
        );
        Ok(())
    }
}

impl fmt::Debug for StreamIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamIn")
            .field("id", &self.core.id)
            .field("requested_rate", &self.core.requested_rate)
            .finish_non_exhaustive()
    }
}

impl Drop for StreamIn {
    fn drop(&mut self) {
        self.standby();
        tracing::debug!(stream = %self.core.id, "Input stream closed");
    }
}

/// Matches the resampler to the current hardware rate.
///
/// Creates one when the rates differ, recreates it when the hardware rate
/// changed, and drops it when the rates now match.
fn sync_resampler(
    state: &mut InState,
    device: &Device,
    requested_rate: u32,
) -> Result<(), HalError> {
    let hw_rate = state.config.rate;
    if hw_rate == requested_rate {
        if state.resampler.take().is_some() {
            tracing::debug!(rate = hw_rate, "Capture resampler dropped");
        }
        return Ok(());
    }
    if state
        .resampler
        .as_ref()
        .is_some_and(|r| r.input_rate() == hw_rate)
    {
        return Ok(());
    }
    state.resampler = Some(device.resamplers().create(
        hw_rate,
        requested_rate,
        1,
        device.config().resampler_quality,
    )?);
    tracing::debug!(
        input_rate = hw_rate,
        output_rate = requested_rate,
        "Capture resampler created"
    );
    Ok(())
}
