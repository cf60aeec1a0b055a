//! Write-side flow control.
//!
//! The playback ring buffer is kept at or below a write threshold by polling
//! its occupancy and sleeping for the time the surplus takes to play out.

use std::thread;
use std::time::Duration;

use crate::config::HalConfig;
use crate::hw::Pcm;

/// Poll granularity and the rate used to size the sleeps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlowControl {
    pub min_sleep: Duration,
    pub rate: u32,
}

impl FlowControl {
    pub(crate) fn from_config(config: &HalConfig) -> Self {
        Self {
            min_sleep: config.min_write_sleep,
            rate: config.throttle_rate,
        }
    }

    /// Time `surplus` frames take to play, never below the poll granularity.
    pub(crate) fn delay_for(&self, surplus: usize) -> Duration {
        let micros = surplus as u64 * 1_000_000 / u64::from(self.rate.max(1));
        Duration::from_micros(micros).max(self.min_sleep)
    }
}

/// What one throttle pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Throttle {
    pub polls: usize,
    pub sleeps: usize,
    pub slept: Duration,
}

/// Blocks until the playback buffer holds at most `threshold` frames.
///
/// A failed occupancy query ends the wait early.
pub(crate) fn throttle(pcm: &mut dyn Pcm, threshold: usize, flow: &FlowControl) -> Throttle {
    let mut stats = Throttle::default();
    loop {
        let Ok(occupancy) = pcm.occupancy() else {
            break;
        };
        stats.polls += 1;
        if occupancy.frames <= threshold {
            break;
        }
        let delay = flow.delay_for(occupancy.frames - threshold);
        thread::sleep(delay);
        stats.sleeps += 1;
        stats.slept += delay;
    }
    stats
}
