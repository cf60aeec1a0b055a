//! Builder pattern for opening a [`Device`].

use std::sync::Arc;

use crate::device::Device;
use crate::format::{LinearResamplerFactory, ResamplerFactory};
use crate::hw::{Mixer, PcmDriver};
use crate::routing::RoutingTable;
use crate::{HalConfig, HalError};

/// Interface name a host must ask for.
pub const AUDIO_HARDWARE_INTERFACE: &str = "audio_hw_if";
/// Module identifier.
pub const AUDIO_HARDWARE_MODULE_ID: &str = "audio";
/// Human-readable module name.
pub const MODULE_NAME: &str = "Amazon audio HW HAL";

/// Entry point of the crate.
pub struct AudioHal;

impl AudioHal {
    /// Creates a new builder with default settings.
    pub fn builder() -> AudioHalBuilder {
        AudioHalBuilder::new()
    }
}

/// Builder for configuring and opening the audio device.
///
/// A PCM driver and a mixer are required. The resampler factory defaults to
/// [`LinearResamplerFactory`] and the routing table to
/// [`RoutingTable::builtin`].
///
/// # Example
///
/// ```
/// use audio_hal::hw::mock::{MockMixer, MockPcmDriver};
/// use audio_hal::{AudioHal, AUDIO_HARDWARE_INTERFACE};
///
/// let device = AudioHal::builder()
///     .driver(MockPcmDriver::new())
///     .mixer(MockMixer::with_builtin_paths())
///     .open(AUDIO_HARDWARE_INTERFACE)?;
/// assert!(device.init_check().is_ok());
/// # Ok::<(), audio_hal::HalError>(())
/// ```
#[must_use]
pub struct AudioHalBuilder {
    /// Kernel PCM access.
    driver: Option<Arc<dyn PcmDriver>>,
    /// Routing control.
    mixer: Option<Box<dyn Mixer>>,
    /// Rate converter factory.
    resamplers: Arc<dyn ResamplerFactory>,
    /// Device-to-path table.
    routing: RoutingTable,
    /// Runtime tunables.
    config: HalConfig,
}

impl Default for AudioHalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHalBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            driver: None,
            mixer: None,
            resamplers: Arc::new(LinearResamplerFactory),
            routing: RoutingTable::builtin(),
            config: HalConfig::default(),
        }
    }

    /// Set the PCM driver.
    pub fn driver<D: PcmDriver + 'static>(mut self, driver: D) -> Self {
        self.driver = Some(Arc::new(driver));
        self
    }

    /// Set the mixer.
    pub fn mixer<M: Mixer + 'static>(mut self, mixer: M) -> Self {
        self.mixer = Some(Box::new(mixer));
        self
    }

    /// Set the resampler factory.
    pub fn resampler_factory<F: ResamplerFactory + 'static>(mut self, factory: F) -> Self {
        self.resamplers = Arc::new(factory);
        self
    }

    /// Replace the routing table.
    pub fn routing(mut self, routing: RoutingTable) -> Self {
        self.routing = routing;
        self
    }

    /// Set custom runtime configuration.
    pub fn config(mut self, config: HalConfig) -> Self {
        self.config = config;
        self
    }

    /// Opens the device.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `name` is not [`AUDIO_HARDWARE_INTERFACE`]
    /// - No PCM driver is configured
    /// - No mixer is configured
    pub fn open(self, name: &str) -> Result<Arc<Device>, HalError> {
        if name != AUDIO_HARDWARE_INTERFACE {
            return Err(HalError::invalid(format!(
                "unknown interface '{name}', expected '{AUDIO_HARDWARE_INTERFACE}'"
            )));
        }
        let driver = self
            .driver
            .ok_or_else(|| HalError::invalid("no PCM driver configured"))?;
        let mixer = self
            .mixer
            .ok_or_else(|| HalError::unavailable("unable to open the mixer"))?;

        tracing::info!(module = MODULE_NAME, "Audio device opened");
        Ok(Arc::new(Device::new(
            driver,
            mixer,
            self.resamplers,
            self.routing,
            self.config,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mock::{MockMixer, MockPcmDriver};
    use crate::routing::DeviceMask;
    use crate::Orientation;

    fn builder() -> AudioHalBuilder {
        AudioHal::builder()
            .driver(MockPcmDriver::new())
            .mixer(MockMixer::with_builtin_paths())
    }

    #[test]
    fn test_open_initial_state() {
        let device = builder().open(AUDIO_HARDWARE_INTERFACE).unwrap();
        assert_eq!(device.out_devices(), DeviceMask::OUT_SPEAKER);
        assert_eq!(
            device.in_devices(),
            DeviceMask::IN_BUILTIN_MIC.without_marker()
        );
        assert_eq!(device.orientation(), Orientation::Undefined);
        assert!(!device.mic_mute());
        assert!(device.active_output().is_none());
    }

    #[test]
    fn test_module_identity() {
        assert_eq!(AUDIO_HARDWARE_INTERFACE, "audio_hw_if");
        assert_eq!(AUDIO_HARDWARE_MODULE_ID, "audio");
        assert_eq!(MODULE_NAME, "Amazon audio HW HAL");
    }

    #[test]
    fn test_open_wrong_name() {
        let result = builder().open("audio_policy");
        assert!(matches!(result, Err(HalError::InvalidArgument { .. })));
    }

    #[test]
    fn test_open_without_driver() {
        let result = AudioHal::builder()
            .mixer(MockMixer::with_builtin_paths())
            .open(AUDIO_HARDWARE_INTERFACE);
        assert!(matches!(result, Err(HalError::InvalidArgument { .. })));
    }

    #[test]
    fn test_open_without_mixer() {
        let result = AudioHal::builder()
            .driver(MockPcmDriver::new())
            .open(AUDIO_HARDWARE_INTERFACE);
        assert!(matches!(result, Err(HalError::DeviceUnavailable { .. })));
    }
}
