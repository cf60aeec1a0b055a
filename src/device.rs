//! The audio device: routing state, cross-stream policy and stream factory.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio_config::{AudioConfig, AudioMode, ChannelMask, OutputFlags, Orientation};
use crate::config::{HalConfig, OUT_SAMPLING_RATE, SHORT_PERIOD_SIZE};
use crate::format::{round_up_16, ResamplerFactory};
use crate::hw::{Mixer, PcmDriver};
use crate::lock::{self, DeviceLock};
use crate::params::{Parameters, ORIENTATION, SCREEN_STATE, VALUE_ON};
use crate::routing::{DeviceMask, RoutingTable};
use crate::stream::input::{self, InCore};
use crate::stream::output::{self, OutCore};
use crate::stream::{ActiveStream, StreamId, StreamIn, StreamOut};
use crate::HalError;

/// Proof that the device lock is held.
pub(crate) type DeviceGuard<'a> = lock::DeviceGuard<'a, DeviceState>;

/// Returns true if a stream starting at `starting` cannot coexist with an
/// active stream at `other`.
///
/// The hardware clocks one family at a time: a start in one family conflicts
/// with any rate outside it.
pub const fn rates_conflict(starting: u32, other: u32) -> bool {
    (starting % 8000 == 0 && other % 8000 != 0) || (starting % 11025 == 0 && other % 11025 != 0)
}

pub(crate) struct DeviceState {
    pub(crate) out_devices: DeviceMask,
    /// Selected input devices, marker bit stripped.
    pub(crate) in_devices: DeviceMask,
    orientation: Orientation,
    low_power: bool,
    mode: AudioMode,
    mixer: Box<dyn Mixer>,
    pub(crate) active_out: Option<ActiveStream<OutCore>>,
    pub(crate) active_in: Option<ActiveStream<InCore>>,
}

/// An opened audio device.
///
/// Owns the mixer and routing table, tracks which output and input are
/// currently driving hardware, and opens streams. Obtained from
/// [`AudioHal::builder`](crate::AudioHal::builder).
pub struct Device {
    state: DeviceLock<DeviceState>,
    routing: RoutingTable,
    driver: Arc<dyn PcmDriver>,
    resamplers: Arc<dyn ResamplerFactory>,
    config: HalConfig,
    mic_mute: AtomicBool,
    next_stream_id: AtomicU64,
}

impl Device {
    pub(crate) fn new(
        driver: Arc<dyn PcmDriver>,
        mixer: Box<dyn Mixer>,
        resamplers: Arc<dyn ResamplerFactory>,
        routing: RoutingTable,
        config: HalConfig,
    ) -> Self {
        Self {
            state: DeviceLock::new(DeviceState {
                out_devices: DeviceMask::OUT_SPEAKER,
                in_devices: DeviceMask::IN_BUILTIN_MIC.without_marker(),
                orientation: Orientation::Undefined,
                low_power: false,
                mode: AudioMode::Normal,
                mixer,
                active_out: None,
                active_in: None,
            }),
            routing,
            driver,
            resamplers,
            config,
            mic_mute: AtomicBool::new(false),
            next_stream_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn lock(&self) -> DeviceGuard<'_> {
        self.state.lock()
    }

    pub(crate) fn driver(&self) -> &dyn PcmDriver {
        self.driver.as_ref()
    }

    pub(crate) fn resamplers(&self) -> &dyn ResamplerFactory {
        self.resamplers.as_ref()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    fn next_id(&self) -> StreamId {
        StreamId(self.next_stream_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Pushes the current device selection to the mixer.
    pub(crate) fn apply_routing(&self, state: &mut DeviceState) {
        let (out_devices, in_devices) = (state.out_devices, state.in_devices);
        self.routing
            .select(state.mixer.as_mut(), out_devices, in_devices);
    }

    /// Re-applies the current routing.
    pub fn select_devices(&self) {
        let mut dev = self.lock();
        self.apply_routing(&mut dev);
    }

    /// Devices the mixer can route to.
    pub fn supported_devices(&self) -> DeviceMask {
        let dev = self.lock();
        self.routing.supported_devices(dev.mixer.as_ref())
    }

    /// Always succeeds once the device is open.
    pub fn init_check(&self) -> Result<(), HalError> {
        Ok(())
    }

    /// Voice call volume is not controllable.
    pub fn set_voice_volume(&self, _volume: f32) -> Result<(), HalError> {
        Err(HalError::not_supported("set_voice_volume"))
    }

    /// Accepted and ignored.
    pub fn set_master_volume(&self, volume: f32) -> Result<(), HalError> {
        tracing::trace!(volume, "Ignoring master volume");
        Ok(())
    }

    /// Records the telephony mode. Routing does not depend on it.
    pub fn set_mode(&self, mode: AudioMode) -> Result<(), HalError> {
        self.lock().mode = mode;
        tracing::debug!(?mode, "Audio mode set");
        Ok(())
    }

    /// Last mode passed to [`set_mode`](Self::set_mode).
    pub fn mode(&self) -> AudioMode {
        self.lock().mode
    }

    /// Mutes or unmutes every capture stream.
    pub fn set_mic_mute(&self, muted: bool) {
        self.mic_mute.store(muted, Ordering::Relaxed);
    }

    /// Returns true if capture is muted.
    pub fn mic_mute(&self) -> bool {
        self.mic_mute.load(Ordering::Relaxed)
    }

    /// Capture buffer size in bytes for `config`.
    pub fn input_buffer_size(&self, config: &AudioConfig) -> usize {
        let frames = SHORT_PERIOD_SIZE * config.sample_rate as usize / OUT_SAMPLING_RATE as usize;
        round_up_16(frames) * config.frame_size()
    }

    /// Selected output devices.
    pub fn out_devices(&self) -> DeviceMask {
        self.lock().out_devices
    }

    /// Selected input devices, without the input marker bit.
    pub fn in_devices(&self) -> DeviceMask {
        self.lock().in_devices
    }

    /// Current orientation.
    pub fn orientation(&self) -> Orientation {
        self.lock().orientation
    }

    /// Returns true while the screen is off.
    pub fn is_low_power(&self) -> bool {
        self.lock().low_power
    }

    /// Output currently holding the hardware, if any.
    pub fn active_output(&self) -> Option<StreamId> {
        let dev = self.lock();
        dev.active_out
            .as_ref()
            .filter(|a| a.upgrade().is_some())
            .map(|a| a.id)
    }

    /// Input currently holding the hardware, if any.
    pub fn active_input(&self) -> Option<StreamId> {
        let dev = self.lock();
        dev.active_in
            .as_ref()
            .filter(|a| a.upgrade().is_some())
            .map(|a| a.id)
    }

    /// Updates the orientation, re-routing if it changed.
    pub fn set_orientation(&self, orientation: Orientation) {
        let mut dev = self.lock();
        if dev.orientation != orientation {
            tracing::debug!(from = ?dev.orientation, to = ?orientation, "Orientation changed");
            dev.orientation = orientation;
            self.apply_routing(&mut dev);
        }
    }

    /// Tracks the screen state. A dark screen puts the device in low power.
    pub fn set_screen_on(&self, on: bool) {
        let mut dev = self.lock();
        dev.low_power = !on;
        tracing::debug!(low_power = dev.low_power, "Screen state changed");
    }

    /// Applies `orientation` and `screen_state` pairs. Other keys are ignored.
    pub fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError> {
        let params = Parameters::parse(kvpairs);
        if let Some(value) = params.get(ORIENTATION) {
            self.set_orientation(Orientation::from_param(value));
        }
        if let Some(value) = params.get(SCREEN_STATE) {
            self.set_screen_on(value == VALUE_ON);
        }
        Ok(())
    }

    /// No parameters are reported.
    pub fn parameters(&self, _keys: &str) -> String {
        String::new()
    }

    /// Opens a playback stream on `devices`.
    ///
    /// The application side is always 44.1 kHz stereo 16-bit; the returned
    /// config is what the caller must supply, whatever it requested.
    pub fn open_output_stream(
        self: &Arc<Self>,
        devices: DeviceMask,
        flags: OutputFlags,
        requested: &AudioConfig,
    ) -> Result<(StreamOut, AudioConfig), HalError> {
        let id = self.next_id();
        let stream = StreamOut::new(Arc::clone(self), id, flags.deep_buffer, devices)?;
        let negotiated = stream.config();

        let mut dev = self.lock();
        dev.out_devices = (dev.out_devices & !DeviceMask::OUT_ALL) | devices;
        self.apply_routing(&mut dev);
        drop(dev);

        tracing::info!(
            stream = %id,
            devices = ?devices,
            deep_buffer = flags.deep_buffer,
            requested_rate = requested.sample_rate,
            "Output stream opened"
        );
        Ok((stream, negotiated))
    }

    /// Opens a capture stream on `devices`.
    ///
    /// # Errors
    ///
    /// [`HalError::ConfigRejected`] if `requested` is not mono; the
    /// suggested config carries the mono layout to retry with.
    pub fn open_input_stream(
        self: &Arc<Self>,
        devices: DeviceMask,
        requested: &AudioConfig,
    ) -> Result<StreamIn, HalError> {
        if requested.channel_mask != ChannelMask::IN_MONO {
            let suggested = AudioConfig {
                channel_mask: ChannelMask::IN_MONO,
                ..*requested
            };
            tracing::warn!(
                channel_mask = requested.channel_mask.0,
                "Rejecting non-mono capture config"
            );
            return Err(HalError::ConfigRejected { suggested });
        }

        let id = self.next_id();
        let stream = StreamIn::new(Arc::clone(self), id, requested.sample_rate)?;

        let mut dev = self.lock();
        dev.in_devices = devices.without_marker();
        self.apply_routing(&mut dev);
        drop(dev);

        tracing::info!(
            stream = %id,
            devices = ?devices,
            rate = requested.sample_rate,
            "Input stream opened"
        );
        Ok(stream)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("mic_mute", &self.mic_mute())
            .finish_non_exhaustive()
    }
}

/// Forces the active input to standby if it cannot run next to an output
/// starting at `rate`.
pub(crate) fn evict_conflicting_input(dev: &mut DeviceGuard<'_>, rate: u32) {
    let Some(core) = dev.active_in.as_ref().and_then(ActiveStream::upgrade) else {
        return;
    };
    let mut state = core.state.lock(dev);
    if rates_conflict(rate, state.config.rate) {
        tracing::warn!(
            stream = %core.id,
            out_rate = rate,
            in_rate = state.config.rate,
            "Rate family conflict, forcing input to standby"
        );
        input::enter_standby(core.id, &mut state, dev);
    }
}

/// Forces the active output to standby if it cannot run next to an input
/// starting at `rate`.
pub(crate) fn evict_conflicting_output(dev: &mut DeviceGuard<'_>, rate: u32) {
    let Some(core) = dev.active_out.as_ref().and_then(ActiveStream::upgrade) else {
        return;
    };
    let mut state = core.state.lock(dev);
    if rates_conflict(rate, state.config.rate) {
        tracing::warn!(
            stream = %core.id,
            in_rate = rate,
            out_rate = state.config.rate,
            "Rate family conflict, forcing output to standby"
        );
        output::enter_standby(core.id, &mut state, dev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mock::{MockMixer, MockPcmDriver};
    use crate::params::VALUE_OFF;
    use crate::{AudioHal, AUDIO_HARDWARE_INTERFACE};

    fn device() -> Arc<Device> {
        AudioHal::builder()
            .driver(MockPcmDriver::new())
            .mixer(MockMixer::with_builtin_paths())
            .open(AUDIO_HARDWARE_INTERFACE)
            .unwrap()
    }

    #[test]
    fn test_rates_conflict() {
        assert!(rates_conflict(8000, 44100));
        assert!(rates_conflict(44100, 8000));
        assert!(rates_conflict(48000, 44100));
        assert!(!rates_conflict(8000, 48000));
        assert!(!rates_conflict(44100, 22050));
        // Starting outside both families never conflicts
        assert!(!rates_conflict(12345, 44100));
    }

    #[test]
    fn test_screen_state_lit_only_when_on() {
        let device = device();
        device.set_parameters(&format!("{SCREEN_STATE}={VALUE_OFF}")).unwrap();
        assert!(device.is_low_power());

        device.set_parameters(&format!("{SCREEN_STATE}={VALUE_ON}")).unwrap();
        assert!(!device.is_low_power());

        // Anything but "on" counts as a dark screen
        device.set_parameters("screen_state=dim").unwrap();
        assert!(device.is_low_power());
        device.set_parameters("screen_state=").unwrap();
        assert!(device.is_low_power());
    }
}
