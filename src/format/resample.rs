//! Sample rate conversion.
//!
//! Converters come in through [`ResamplerFactory`] so the conversion engine
//! can be swapped. The crate ships [`LinearResampler`], a stateful linear
//! interpolator that is cheap and adequate for voice and for the small
//! 44.1 kHz ↔ 48 kHz steps of the playback path.
//!
//! Two driving styles are supported:
//! - **push** ([`Resampler::resample_from_input`]): the caller hands over an
//!   input buffer and receives as many output frames as fit
//! - **pull** ([`Resampler::resample_from_provider`]): the converter asks a
//!   [`BufferProvider`] for input frames on demand until the output is full

use crate::error::PcmError;
use crate::HalError;

/// Conversion quality requested from a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Cheapest available conversion.
    Low,
    /// Balanced quality and cost.
    #[default]
    Default,
    /// Best available conversion.
    High,
}

/// Frame accounting for one push conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conversion {
    /// Input frames taken from the input buffer.
    pub consumed: usize,
    /// Output frames written to the output buffer.
    pub produced: usize,
}

/// Demand-driven source of input frames for a pull conversion.
pub trait BufferProvider {
    /// Returns up to `frames` interleaved input frames.
    ///
    /// The returned view may be shorter than requested. An empty view or an
    /// error ends the current pull.
    fn acquire(&mut self, frames: usize) -> Result<&[i16], PcmError>;

    /// Marks `frames` frames of the last acquired view as used.
    fn release(&mut self, frames: usize);
}

/// A stateful sample rate converter over interleaved 16-bit frames.
pub trait Resampler: Send {
    /// Input sample rate in Hz.
    fn input_rate(&self) -> u32;

    /// Output sample rate in Hz.
    fn output_rate(&self) -> u32;

    /// Interleaved channel count.
    fn channels(&self) -> usize;

    /// Clears filter history.
    fn reset(&mut self);

    /// Converts from `input` into `output`, stopping when either runs out.
    fn resample_from_input(&mut self, input: &[i16], output: &mut [i16]) -> Conversion;

    /// Fills `output` with frames pulled from `provider`.
    ///
    /// Returns the number of frames produced, which is short of the output
    /// length only when the provider stopped supplying input.
    fn resample_from_provider(
        &mut self,
        provider: &mut dyn BufferProvider,
        output: &mut [i16],
    ) -> usize;
}

/// Creates converters.
pub trait ResamplerFactory: Send + Sync {
    /// Creates a converter from `input_rate` to `output_rate`.
    fn create(
        &self,
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        quality: Quality,
    ) -> Result<Box<dyn Resampler>, HalError>;
}

/// Linear interpolation converter.
///
/// The converter keeps the last consumed frame and the fractional position
/// of the next output frame, so consecutive calls produce one continuous
/// signal.
///
/// # Example
///
/// ```
/// use audio_hal::format::{LinearResampler, Resampler};
///
/// let mut resampler = LinearResampler::new(8000, 16000, 1).unwrap();
/// let mut out = [0i16; 8];
/// let conv = resampler.resample_from_input(&[0, 1000, 2000, 3000], &mut out);
/// assert_eq!(conv.consumed, 4);
/// assert_eq!(&out[..conv.produced], &[0, 500, 1000, 1500, 2000, 2500]);
/// ```
#[derive(Debug, Clone)]
pub struct LinearResampler {
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Input frames advanced per output frame.
    step: f64,
    /// Position of the next output frame past `prev`, in input frames.
    pos: f64,
    prev: Vec<i16>,
}

impl LinearResampler {
    /// Creates a converter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a rate or the channel count is zero.
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self, HalError> {
        if input_rate == 0 || output_rate == 0 {
            return Err(HalError::invalid(format!(
                "resampler rates must be non-zero ({input_rate} -> {output_rate})"
            )));
        }
        if channels == 0 {
            return Err(HalError::invalid("resampler needs at least one channel"));
        }
        Ok(Self {
            input_rate,
            output_rate,
            channels,
            step: f64::from(input_rate) / f64::from(output_rate),
            pos: 1.0,
            prev: vec![0; channels],
        })
    }

    fn process(&mut self, input: &[i16], output: &mut [i16]) -> Conversion {
        let ch = self.channels;
        let in_frames = input.len() / ch;
        let out_frames = output.len() / ch;
        let mut conv = Conversion::default();

        loop {
            // Advance past every input frame the output position has crossed
            while self.pos >= 1.0 && conv.consumed < in_frames {
                let start = conv.consumed * ch;
                self.prev.copy_from_slice(&input[start..start + ch]);
                conv.consumed += 1;
                self.pos -= 1.0;
            }
            if self.pos >= 1.0 || conv.consumed >= in_frames || conv.produced >= out_frames {
                break;
            }

            let next = &input[conv.consumed * ch..(conv.consumed + 1) * ch];
            let out = &mut output[conv.produced * ch..(conv.produced + 1) * ch];
            for ((dst, &a), &b) in out.iter_mut().zip(&self.prev).zip(next) {
                let a = f64::from(a);
                let b = f64::from(b);
                *dst = (a + (b - a) * self.pos).round() as i16;
            }
            conv.produced += 1;
            self.pos += self.step;
        }

        conv
    }
}

impl Resampler for LinearResampler {
    fn input_rate(&self) -> u32 {
        self.input_rate
    }

    fn output_rate(&self) -> u32 {
        self.output_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn reset(&mut self) {
        self.pos = 1.0;
        self.prev.fill(0);
    }

    fn resample_from_input(&mut self, input: &[i16], output: &mut [i16]) -> Conversion {
        self.process(input, output)
    }

    fn resample_from_provider(
        &mut self,
        provider: &mut dyn BufferProvider,
        output: &mut [i16],
    ) -> usize {
        let ch = self.channels;
        let out_frames = output.len() / ch;
        let mut produced = 0;

        while produced < out_frames {
            let wanted = ((out_frames - produced) as f64 * self.step).ceil() as usize + 1;
            let Ok(chunk) = provider.acquire(wanted) else {
                break;
            };
            if chunk.is_empty() {
                break;
            }
            let conv = self.process(chunk, &mut output[produced * ch..out_frames * ch]);
            provider.release(conv.consumed);
            produced += conv.produced;
        }

        produced
    }
}

/// Factory for [`LinearResampler`].
///
/// Every quality level maps to linear interpolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearResamplerFactory;

impl ResamplerFactory for LinearResamplerFactory {
    fn create(
        &self,
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        quality: Quality,
    ) -> Result<Box<dyn Resampler>, HalError> {
        tracing::debug!(input_rate, output_rate, channels, ?quality, "Creating resampler");
        Ok(Box::new(LinearResampler::new(input_rate, output_rate, channels)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves a fixed signal in chunks of at most `chunk` frames.
    struct VecProvider {
        samples: Vec<i16>,
        offset: usize,
        chunk: usize,
        acquired: usize,
    }

    impl VecProvider {
        fn new(samples: Vec<i16>, chunk: usize) -> Self {
            Self {
                samples,
                offset: 0,
                chunk,
                acquired: 0,
            }
        }
    }

    impl BufferProvider for VecProvider {
        fn acquire(&mut self, frames: usize) -> Result<&[i16], PcmError> {
            if self.offset >= self.samples.len() {
                return Err(PcmError::NoDevice);
            }
            let end = (self.offset + frames.min(self.chunk)).min(self.samples.len());
            self.acquired = end - self.offset;
            Ok(&self.samples[self.offset..end])
        }

        fn release(&mut self, frames: usize) {
            assert!(frames <= self.acquired, "released more than acquired");
            self.offset += frames;
            self.acquired = 0;
        }
    }

    #[test]
    fn test_same_rate_passthrough() {
        let mut r = LinearResampler::new(16000, 16000, 1).unwrap();
        let mut out = [0i16; 3];
        let conv = r.resample_from_input(&[100, 200, 300], &mut out);
        // The last frame is held as the next interpolation anchor
        assert_eq!(conv.consumed, 3);
        assert_eq!(conv.produced, 2);
        assert_eq!(&out[..2], &[100, 200]);
    }

    #[test]
    fn test_upsample_interpolates() {
        let mut r = LinearResampler::new(1, 2, 1).unwrap();
        let mut out = [0i16; 16];
        let conv = r.resample_from_input(&[0, 100, 200, 300], &mut out);
        assert_eq!(&out[..conv.produced], &[0, 50, 100, 150, 200, 250]);
    }

    #[test]
    fn test_downsample_ratio() {
        // 48kHz to 16kHz = 3:1 ratio
        let input: Vec<i16> = (0..480).map(|i| (i * 10) as i16).collect();
        let mut r = LinearResampler::new(48000, 16000, 1).unwrap();
        let mut out = vec![0i16; 480];
        let conv = r.resample_from_input(&input, &mut out);
        assert_eq!(conv.produced, 160);
        assert_eq!(out[1], 30);
    }

    #[test]
    fn test_output_limit_stops_consumption() {
        let mut r = LinearResampler::new(1, 2, 1).unwrap();
        let mut out = [0i16; 2];
        let conv = r.resample_from_input(&[0, 100, 200, 300], &mut out);
        assert_eq!(conv.produced, 2);
        // The second frame became the interpolation anchor for the next call
        assert_eq!(conv.consumed, 2);
    }

    #[test]
    fn test_stereo_channels_independent() {
        let mut r = LinearResampler::new(1, 2, 2).unwrap();
        let mut out = [0i16; 8];
        let conv = r.resample_from_input(&[0, 1000, 100, 900], &mut out);
        assert_eq!(conv.produced, 2);
        assert_eq!(&out[..4], &[0, 1000, 50, 950]);
    }

    #[test]
    fn test_continuity_across_calls() {
        let mut r = LinearResampler::new(1, 2, 1).unwrap();
        let mut out = [0i16; 8];
        let first = r.resample_from_input(&[0, 100], &mut out);
        assert_eq!(&out[..first.produced], &[0, 50]);
        let second = r.resample_from_input(&[200, 300], &mut out);
        assert_eq!(&out[..second.produced], &[100, 150, 200, 250]);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut r = LinearResampler::new(1, 2, 1).unwrap();
        let mut out = [0i16; 8];
        let _ = r.resample_from_input(&[500, 600, 700], &mut out);
        r.reset();
        let conv = r.resample_from_input(&[0, 100], &mut out);
        assert_eq!(&out[..conv.produced], &[0, 50]);
    }

    #[test]
    fn test_pull_fills_output_across_chunks() {
        let input: Vec<i16> = (0..100).map(|i| i * 10).collect();
        let mut provider = VecProvider::new(input, 7);
        let mut r = LinearResampler::new(1, 2, 1).unwrap();
        let mut out = vec![0i16; 50];

        let produced = r.resample_from_provider(&mut provider, &mut out);

        assert_eq!(produced, 50);
        let expected: Vec<i16> = (0..50).map(|i| i * 5).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_pull_stops_when_provider_fails() {
        let mut provider = VecProvider::new(vec![0, 10, 20, 30], 4);
        let mut r = LinearResampler::new(1, 2, 1).unwrap();
        let mut out = vec![0i16; 100];

        let produced = r.resample_from_provider(&mut provider, &mut out);

        assert_eq!(produced, 6);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(LinearResampler::new(0, 16000, 1).is_err());
        assert!(LinearResampler::new(16000, 0, 1).is_err());
        assert!(LinearResampler::new(16000, 8000, 0).is_err());
    }

    #[test]
    fn test_factory_creates_converter() {
        let r = LinearResamplerFactory
            .create(44100, 48000, 2, Quality::Default)
            .unwrap();
        assert_eq!(r.input_rate(), 44100);
        assert_eq!(r.output_rate(), 48000);
        assert_eq!(r.channels(), 2);
    }
}
