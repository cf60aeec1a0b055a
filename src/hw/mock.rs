//! Simulated hardware for testing without a sound card.
//!
//! [`MockPcmDriver`] and [`MockMixer`] are cheap to clone; every clone shares
//! the same simulated state, so a test can keep a handle while the
//! [`Device`](crate::Device) owns another.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;

use super::{Direction, Mixer, Occupancy, Pcm, PcmConfig, PcmDevice, PcmDriver};
use crate::error::PcmError;
use crate::HalError;

/// Capacity of the simulated capture feed, in samples.
const CAPTURE_FEED_CAPACITY: usize = 1 << 20;

/// Something that happened on the simulated hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwEvent {
    /// A PCM handle was opened.
    Opened {
        /// Transfer direction.
        direction: Direction,
        /// Sound card.
        card: u32,
        /// Device index.
        device: PcmDevice,
        /// Configuration passed to the driver.
        config: PcmConfig,
    },
    /// A PCM handle was closed.
    Closed {
        /// Transfer direction.
        direction: Direction,
    },
    /// Frames were accepted by a playback handle.
    Wrote {
        /// Frames written.
        frames: usize,
    },
    /// A playback write failed.
    WriteFailed {
        /// The error returned.
        error: PcmError,
    },
    /// A capture handle delivered samples.
    Read {
        /// Interleaved samples requested.
        samples: usize,
    },
    /// A capture read failed.
    ReadFailed {
        /// The error returned.
        error: PcmError,
    },
}

struct MockHw {
    events: Vec<HwEvent>,
    open_failures: VecDeque<PcmError>,
    write_script: VecDeque<PcmError>,
    read_failures: VecDeque<PcmError>,
    capture_in: ringbuf::HeapProd<i16>,
    capture_out: ringbuf::HeapCons<i16>,
    written: Vec<i16>,
    queued: usize,
    drain_per_poll: usize,
    polls: usize,
    max_queued_at_write: usize,
}

impl MockHw {
    fn new() -> Self {
        let (capture_in, capture_out) = HeapRb::<i16>::new(CAPTURE_FEED_CAPACITY).split();
        Self {
            events: Vec::new(),
            open_failures: VecDeque::new(),
            write_script: VecDeque::new(),
            read_failures: VecDeque::new(),
            capture_in,
            capture_out,
            written: Vec::new(),
            queued: 0,
            drain_per_poll: usize::MAX,
            polls: 0,
            max_queued_at_write: 0,
        }
    }
}

/// A simulated PCM driver.
///
/// Playback handles model a ring buffer that fills on every write and drains
/// by a fixed number of frames each time its occupancy is polled. Capture
/// handles read from a feed the test fills with [`feed_capture`]; a starved
/// feed yields silence.
///
/// [`feed_capture`]: MockPcmDriver::feed_capture
///
/// # Example
///
/// ```
/// use audio_hal::hw::mock::MockPcmDriver;
///
/// let driver = MockPcmDriver::new();
/// driver.feed_capture(&[1, 2, 3, 4]);
/// assert!(driver.events().is_empty());
/// ```
#[derive(Clone)]
pub struct MockPcmDriver {
    hw: Arc<Mutex<MockHw>>,
}

impl MockPcmDriver {
    /// Creates a driver whose playback buffer empties on every poll.
    pub fn new() -> Self {
        Self {
            hw: Arc::new(Mutex::new(MockHw::new())),
        }
    }

    /// Sets how many frames the playback buffer drains per occupancy poll.
    #[must_use]
    pub fn with_drain_per_poll(self, frames: usize) -> Self {
        self.hw.lock().drain_per_poll = frames;
        self
    }

    /// Makes the next [`PcmDriver::open`] call fail with `error`.
    pub fn fail_next_open(&self, error: PcmError) {
        self.hw.lock().open_failures.push_back(error);
    }

    /// Makes the next playback write fail with `error`.
    ///
    /// Calls queue up: each failing write consumes one entry.
    pub fn fail_next_write(&self, error: PcmError) {
        self.hw.lock().write_script.push_back(error);
    }

    /// Makes the next capture read fail with `error`.
    pub fn fail_next_read(&self, error: PcmError) {
        self.hw.lock().read_failures.push_back(error);
    }

    /// Appends interleaved samples to the capture feed.
    pub fn feed_capture(&self, samples: &[i16]) {
        let _ = self.hw.lock().capture_in.push_slice(samples);
    }

    /// Pre-fills the simulated playback buffer.
    pub fn set_queued(&self, frames: usize) {
        self.hw.lock().queued = frames;
    }

    /// Returns every event recorded so far.
    pub fn events(&self) -> Vec<HwEvent> {
        self.hw.lock().events.clone()
    }

    /// Clears the event log.
    pub fn clear_events(&self) {
        self.hw.lock().events.clear();
    }

    /// Returns every sample accepted by playback handles.
    pub fn written(&self) -> Vec<i16> {
        self.hw.lock().written.clone()
    }

    /// Returns how many handles were opened for `direction`.
    pub fn opens(&self, direction: Direction) -> usize {
        self.hw
            .lock()
            .events
            .iter()
            .filter(|e| matches!(e, HwEvent::Opened { direction: d, .. } if *d == direction))
            .count()
    }

    /// Returns how many handles for `direction` are currently open.
    pub fn open_handles(&self, direction: Direction) -> usize {
        let hw = self.hw.lock();
        let opened = hw
            .events
            .iter()
            .filter(|e| matches!(e, HwEvent::Opened { direction: d, .. } if *d == direction))
            .count();
        let closed = hw
            .events
            .iter()
            .filter(|e| matches!(e, HwEvent::Closed { direction: d } if *d == direction))
            .count();
        opened.saturating_sub(closed)
    }

    /// Returns the number of occupancy polls.
    pub fn polls(&self) -> usize {
        self.hw.lock().polls
    }

    /// Returns the highest buffer fill seen at the start of a write.
    pub fn max_queued_at_write(&self) -> usize {
        self.hw.lock().max_queued_at_write
    }
}

impl Default for MockPcmDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmDriver for MockPcmDriver {
    fn open(
        &self,
        card: u32,
        device: PcmDevice,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, PcmError> {
        let mut hw = self.hw.lock();
        if let Some(error) = hw.open_failures.pop_front() {
            return Err(error);
        }
        hw.events.push(HwEvent::Opened {
            direction,
            card,
            device,
            config: *config,
        });
        if direction == Direction::Out {
            hw.queued = 0;
        }
        Ok(Box::new(MockPcm {
            hw: Arc::clone(&self.hw),
            direction,
            config: *config,
        }))
    }
}

struct MockPcm {
    hw: Arc<Mutex<MockHw>>,
    direction: Direction,
    config: PcmConfig,
}

impl Pcm for MockPcm {
    fn write(&mut self, samples: &[i16]) -> Result<usize, PcmError> {
        let mut hw = self.hw.lock();
        if let Some(error) = hw.write_script.pop_front() {
            hw.events.push(HwEvent::WriteFailed {
                error: error.clone(),
            });
            return Err(error);
        }
        let frames = samples.len() / self.config.channels.max(1) as usize;
        hw.max_queued_at_write = hw.max_queued_at_write.max(hw.queued);
        hw.queued = (hw.queued + frames).min(self.config.buffer_frames());
        hw.written.extend_from_slice(samples);
        hw.events.push(HwEvent::Wrote { frames });
        Ok(frames)
    }

    fn read(&mut self, samples: &mut [i16]) -> Result<(), PcmError> {
        let mut hw = self.hw.lock();
        if let Some(error) = hw.read_failures.pop_front() {
            hw.events.push(HwEvent::ReadFailed {
                error: error.clone(),
            });
            return Err(error);
        }
        let filled = hw.capture_out.pop_slice(samples);
        samples[filled..].fill(0);
        hw.events.push(HwEvent::Read {
            samples: samples.len(),
        });
        Ok(())
    }

    fn occupancy(&mut self) -> Result<Occupancy, PcmError> {
        let mut hw = self.hw.lock();
        hw.polls += 1;
        let drain = hw.drain_per_poll;
        hw.queued = hw.queued.saturating_sub(drain);
        Ok(Occupancy {
            frames: hw.queued,
            timestamp: Instant::now(),
        })
    }

    fn buffer_size(&self) -> usize {
        self.config.buffer_frames()
    }
}

impl Drop for MockPcm {
    fn drop(&mut self) {
        self.hw.lock().events.push(HwEvent::Closed {
            direction: self.direction,
        });
    }
}

struct MixerState {
    known: Vec<String>,
    staged: BTreeSet<String>,
    committed: BTreeSet<String>,
    commits: usize,
}

/// A simulated mixer that records which routing paths are enabled.
#[derive(Clone)]
pub struct MockMixer {
    state: Arc<Mutex<MixerState>>,
}

impl MockMixer {
    /// Creates a mixer that knows the given path names.
    pub fn new<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MixerState {
                known: paths.into_iter().map(Into::into).collect(),
                staged: BTreeSet::new(),
                committed: BTreeSet::new(),
                commits: 0,
            })),
        }
    }

    /// Creates a mixer that knows every built-in routing path.
    pub fn with_builtin_paths() -> Self {
        Self::new(crate::routing::RoutingTable::builtin().paths().iter().map(|p| p.name))
    }

    /// Returns the committed path set.
    pub fn active_paths(&self) -> BTreeSet<String> {
        self.state.lock().committed.clone()
    }

    /// Returns how many times the staged state was committed.
    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }
}

impl Mixer for MockMixer {
    fn reset(&mut self) {
        self.state.lock().staged.clear();
    }

    fn apply_path(&mut self, name: &str) -> Result<(), HalError> {
        let mut state = self.state.lock();
        if !state.known.iter().any(|p| p == name) {
            return Err(HalError::invalid(format!("unknown mixer path '{name}'")));
        }
        state.staged.insert(name.to_string());
        Ok(())
    }

    fn commit(&mut self) {
        let mut state = self.state.lock();
        state.committed = state.staged.clone();
        state.commits += 1;
    }

    fn path_names(&self) -> Vec<String> {
        self.state.lock().known.clone()
    }
}
