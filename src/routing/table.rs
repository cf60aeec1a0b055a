//! Static routing table from logical devices to mixer paths.
//!
//! Each [`RoutingPath`] names the mixer configuration that enables one
//! physical device. Several paths may be enabled at once, e.g. speaker plus
//! headphone while a headset is plugged in.

use super::DeviceMask;
use crate::hw::{Direction, Mixer};

/// A named mixer path for one device combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPath {
    /// Devices this path serves.
    pub mask: DeviceMask,
    /// Whether the path belongs to playback or capture.
    pub direction: Direction,
    /// Mixer path name.
    pub name: &'static str,
}

impl RoutingPath {
    const fn out(mask: DeviceMask, name: &'static str) -> Self {
        Self {
            mask,
            direction: Direction::Out,
            name,
        }
    }

    const fn input(mask: DeviceMask, name: &'static str) -> Self {
        Self {
            mask,
            direction: Direction::In,
            name,
        }
    }

    /// Returns true if this path should be enabled for the given selection.
    ///
    /// Input masks are compared with the input marker bit cleared.
    #[must_use]
    pub const fn matches(&self, out_devices: DeviceMask, in_devices: DeviceMask) -> bool {
        match self.direction {
            Direction::Out => out_devices.intersects(self.mask),
            Direction::In => in_devices.intersects_input(self.mask),
        }
    }
}

const BUILTIN_PATHS: &[RoutingPath] = &[
    RoutingPath::out(DeviceMask::OUT_EARPIECE, "earpiece"),
    RoutingPath::out(DeviceMask::OUT_SPEAKER, "speaker"),
    RoutingPath::out(
        DeviceMask(DeviceMask::OUT_WIRED_HEADSET.0 | DeviceMask::OUT_WIRED_HEADPHONE.0),
        "headphone",
    ),
    RoutingPath::out(DeviceMask::OUT_AUX_DIGITAL, "aux-digital-out"),
    RoutingPath::out(DeviceMask::OUT_ANLG_DOCK_HEADSET, "analog-dock"),
    RoutingPath::out(DeviceMask::OUT_DGTL_DOCK_HEADSET, "digital-dock"),
    RoutingPath::input(DeviceMask::IN_COMMUNICATION, "comms"),
    RoutingPath::input(DeviceMask::IN_AMBIENT, "ambient"),
    RoutingPath::input(DeviceMask::IN_BUILTIN_MIC, "builtin-mic"),
    RoutingPath::input(DeviceMask::IN_WIRED_HEADSET, "headset"),
    RoutingPath::input(DeviceMask::IN_AUX_DIGITAL, "aux-digital-in"),
    RoutingPath::input(DeviceMask::IN_BACK_MIC, "back-mic"),
];

/// Immutable set of routing paths.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    paths: Vec<RoutingPath>,
}

impl RoutingTable {
    /// Creates a table from explicit entries.
    pub fn new(paths: impl IntoIterator<Item = RoutingPath>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    /// Returns the table for the on-board codec.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_PATHS.iter().copied())
    }

    /// Returns every entry.
    pub fn paths(&self) -> &[RoutingPath] {
        &self.paths
    }

    /// Returns the entries matching the given selection, in table order.
    pub fn matching(
        &self,
        out_devices: DeviceMask,
        in_devices: DeviceMask,
    ) -> impl Iterator<Item = &RoutingPath> {
        self.paths
            .iter()
            .filter(move |path| path.matches(out_devices, in_devices))
    }

    /// Resets the mixer and enables every path matching the selection.
    ///
    /// Returns the union of the masks of the enabled paths. An unmatched
    /// selection enables nothing; a path the mixer rejects is skipped.
    pub fn select(
        &self,
        mixer: &mut dyn Mixer,
        out_devices: DeviceMask,
        in_devices: DeviceMask,
    ) -> (DeviceMask, DeviceMask) {
        let mut selected_out = DeviceMask::NONE;
        let mut selected_in = DeviceMask::NONE;

        mixer.reset();
        for path in self.matching(out_devices, in_devices) {
            if let Err(e) = mixer.apply_path(path.name) {
                tracing::warn!(path = path.name, error = %e, "Failed to apply routing path");
                continue;
            }
            tracing::trace!(path = path.name, direction = %path.direction, "Routing path matched");
            match path.direction {
                Direction::Out => selected_out = selected_out | path.mask,
                Direction::In => selected_in = selected_in | path.mask,
            }
        }
        mixer.commit();

        tracing::debug!(
            out_devices = ?selected_out,
            in_devices = ?selected_in,
            "Devices selected"
        );
        (selected_out, selected_in)
    }

    /// Returns the union of masks whose path names the mixer knows.
    pub fn supported_devices(&self, mixer: &dyn Mixer) -> DeviceMask {
        let known = mixer.path_names();
        self.paths
            .iter()
            .filter(|path| known.iter().any(|name| name == path.name))
            .fold(DeviceMask::NONE, |acc, path| acc | path.mask)
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mock::MockMixer;

    #[test]
    fn test_speaker_only() {
        let table = RoutingTable::builtin();
        let mut mixer = MockMixer::with_builtin_paths();

        table.select(&mut mixer, DeviceMask::OUT_SPEAKER, DeviceMask::NONE);

        let active = mixer.active_paths();
        assert_eq!(active.len(), 1);
        assert!(active.contains("speaker"));
    }

    #[test]
    fn test_multiple_paths_applied_together() {
        let table = RoutingTable::builtin();
        let mut mixer = MockMixer::with_builtin_paths();

        let (out, _) = table.select(
            &mut mixer,
            DeviceMask::OUT_SPEAKER | DeviceMask::OUT_WIRED_HEADPHONE,
            DeviceMask::IN_BUILTIN_MIC.without_marker(),
        );

        let active = mixer.active_paths();
        assert!(active.contains("speaker"));
        assert!(active.contains("headphone"));
        assert!(active.contains("builtin-mic"));
        assert!(out.intersects(DeviceMask::OUT_WIRED_HEADSET));
    }

    #[test]
    fn test_input_marker_alone_matches_nothing() {
        let table = RoutingTable::builtin();
        let mut mixer = MockMixer::with_builtin_paths();

        table.select(&mut mixer, DeviceMask::NONE, DeviceMask::IN_MARKER);

        assert!(mixer.active_paths().is_empty());
    }

    #[test]
    fn test_unmatched_selection_is_silent() {
        let table = RoutingTable::builtin();
        let mut mixer = MockMixer::with_builtin_paths();

        let (out, input) = table.select(
            &mut mixer,
            DeviceMask::OUT_BLUETOOTH_A2DP,
            DeviceMask::IN_VOICE_CALL.without_marker(),
        );

        assert!(out.is_empty());
        assert!(input.is_empty());
        assert!(mixer.active_paths().is_empty());
        assert_eq!(mixer.commits(), 1);
    }

    #[test]
    fn test_rejected_path_is_skipped() {
        let table = RoutingTable::builtin();
        let mut mixer = MockMixer::new(["headphone"]);

        let (out, _) = table.select(
            &mut mixer,
            DeviceMask::OUT_SPEAKER | DeviceMask::OUT_WIRED_HEADSET,
            DeviceMask::NONE,
        );

        assert!(!out.intersects(DeviceMask::OUT_SPEAKER));
        assert!(mixer.active_paths().contains("headphone"));
    }

    #[test]
    fn test_supported_devices() {
        let table = RoutingTable::builtin();
        let mixer = MockMixer::new(["speaker", "builtin-mic", "not-a-device"]);

        let supported = table.supported_devices(&mixer);
        assert_eq!(supported, DeviceMask::OUT_SPEAKER | DeviceMask::IN_BUILTIN_MIC);
    }
}
