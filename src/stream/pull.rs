//! Capture-side pull adapter.
//!
//! The input resampler asks for frames on demand. The adapter serves them
//! from a one-period cache that is refilled with exactly one PCM read
//! whenever it runs dry.

use crate::error::PcmError;
use crate::format::{discard_right_channel, BufferProvider};
use crate::hw::{Pcm, PcmConfig};
use crate::HalError;

pub(crate) struct PullAdapter {
    buffer: Vec<i16>,
    /// Unconsumed frames at the tail of the current period.
    frames_in: usize,
    period_size: usize,
    channels: usize,
    status: Result<(), PcmError>,
}

impl PullAdapter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Vec::new(),
            frames_in: 0,
            period_size: 0,
            channels: 1,
            status: Ok(()),
        }
    }

    /// Sizes the cache for one period of `config` and empties it.
    pub(crate) fn configure(&mut self, config: &PcmConfig) -> Result<(), HalError> {
        let samples = config.period_samples();
        if self.buffer.len() < samples {
            self.buffer
                .try_reserve_exact(samples - self.buffer.len())
                .map_err(|_| HalError::ResourceExhausted {
                    what: "capture pull buffer",
                })?;
            self.buffer.resize(samples, 0);
        }
        self.period_size = config.period_size;
        self.channels = config.channels as usize;
        self.clear();
        Ok(())
    }

    /// Drops any residual frames and clears the read status.
    pub(crate) fn clear(&mut self) {
        self.frames_in = 0;
        self.status = Ok(());
    }

    pub(crate) fn residual(&self) -> usize {
        self.frames_in
    }

    pub(crate) fn status(&self) -> Result<(), PcmError> {
        self.status.clone()
    }

    pub(crate) fn record(&mut self, status: Result<(), PcmError>) {
        self.status = status;
    }

    /// Binds the adapter to a PCM handle for one pull conversion.
    pub(crate) fn source<'a>(&'a mut self, pcm: Option<&'a mut Box<dyn Pcm>>) -> PullSource<'a> {
        PullSource { adapter: self, pcm }
    }
}

/// A [`BufferProvider`] reading through a [`PullAdapter`].
pub(crate) struct PullSource<'a> {
    adapter: &'a mut PullAdapter,
    pcm: Option<&'a mut Box<dyn Pcm>>,
}

impl BufferProvider for PullSource<'_> {
    fn acquire(&mut self, frames: usize) -> Result<&[i16], PcmError> {
        let adapter = &mut *self.adapter;
        let Some(pcm) = self.pcm.as_deref_mut() else {
            adapter.status = Err(PcmError::NoDevice);
            return Err(PcmError::NoDevice);
        };

        if adapter.frames_in == 0 {
            let samples = adapter.period_size * adapter.channels;
            if let Err(e) = pcm.read(&mut adapter.buffer[..samples]) {
                tracing::error!(error = %e, "Capture read failed");
                adapter.status = Err(e.clone());
                return Err(e);
            }
            adapter.status = Ok(());
            adapter.frames_in = adapter.period_size;
            if adapter.channels == 2 {
                discard_right_channel(&mut adapter.buffer, adapter.period_size);
            }
        }

        let count = frames.min(adapter.frames_in);
        let start = adapter.period_size - adapter.frames_in;
        Ok(&adapter.buffer[start..start + count])
    }

    fn release(&mut self, frames: usize) {
        debug_assert!(frames <= self.adapter.frames_in);
        self.adapter.frames_in = self.adapter.frames_in.saturating_sub(frames);
    }
}
