//! Logical audio device bitmasks.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// Bitmask of logical audio devices.
///
/// Output devices occupy the low 31 bits. Input devices carry the
/// [`IN_MARKER`](Self::IN_MARKER) bit in addition to their own bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DeviceMask(pub u32);

#[allow(missing_docs)]
impl DeviceMask {
    /// No device.
    pub const NONE: Self = Self(0);

    pub const OUT_EARPIECE: Self = Self(0x1);
    pub const OUT_SPEAKER: Self = Self(0x2);
    pub const OUT_WIRED_HEADSET: Self = Self(0x4);
    pub const OUT_WIRED_HEADPHONE: Self = Self(0x8);
    pub const OUT_BLUETOOTH_SCO: Self = Self(0x10);
    pub const OUT_BLUETOOTH_SCO_HEADSET: Self = Self(0x20);
    pub const OUT_BLUETOOTH_SCO_CARKIT: Self = Self(0x40);
    pub const OUT_BLUETOOTH_A2DP: Self = Self(0x80);
    pub const OUT_AUX_DIGITAL: Self = Self(0x400);
    pub const OUT_ANLG_DOCK_HEADSET: Self = Self(0x800);
    pub const OUT_DGTL_DOCK_HEADSET: Self = Self(0x1000);
    /// Every SCO output.
    pub const OUT_ALL_SCO: Self = Self(0x10 | 0x20 | 0x40);
    /// Every output device bit.
    pub const OUT_ALL: Self = Self(0x7FFF_FFFF);

    /// Marker bit set on every input device.
    pub const IN_MARKER: Self = Self(0x8000_0000);
    pub const IN_COMMUNICATION: Self = Self(0x8000_0001);
    pub const IN_AMBIENT: Self = Self(0x8000_0002);
    pub const IN_BUILTIN_MIC: Self = Self(0x8000_0004);
    pub const IN_BLUETOOTH_SCO_HEADSET: Self = Self(0x8000_0008);
    pub const IN_WIRED_HEADSET: Self = Self(0x8000_0010);
    pub const IN_AUX_DIGITAL: Self = Self(0x8000_0020);
    pub const IN_VOICE_CALL: Self = Self(0x8000_0040);
    pub const IN_BACK_MIC: Self = Self(0x8000_0080);
    /// Every SCO input.
    pub const IN_ALL_SCO: Self = Self::IN_BLUETOOTH_SCO_HEADSET;
    /// Every input device bit, marker included.
    pub const IN_ALL: Self = Self(0x8000_00FF);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if any bit is shared with `other`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if the input marker bit is set.
    #[must_use]
    pub const fn is_input(self) -> bool {
        self.0 & Self::IN_MARKER.0 != 0
    }

    /// Returns the mask with the input marker bit cleared.
    #[must_use]
    pub const fn without_marker(self) -> Self {
        Self(self.0 & !Self::IN_MARKER.0)
    }

    /// Returns true if the two masks share a device bit, ignoring the marker.
    #[must_use]
    pub const fn intersects_input(self, other: Self) -> bool {
        self.without_marker().intersects(other.without_marker())
    }
}

impl BitOr for DeviceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for DeviceMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for DeviceMask {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for DeviceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceMask({:#010x})", self.0)
    }
}

impl From<u32> for DeviceMask {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_stripping() {
        assert_eq!(
            DeviceMask::IN_BUILTIN_MIC.without_marker(),
            DeviceMask(0x4)
        );
        assert!(DeviceMask::IN_BUILTIN_MIC.is_input());
        assert!(!DeviceMask::OUT_SPEAKER.is_input());
    }

    #[test]
    fn test_input_intersection_ignores_marker() {
        // Two different inputs share only the marker bit
        assert!(DeviceMask::IN_BUILTIN_MIC.intersects(DeviceMask::IN_BACK_MIC));
        assert!(!DeviceMask::IN_BUILTIN_MIC.intersects_input(DeviceMask::IN_BACK_MIC));
        assert!(DeviceMask::IN_BUILTIN_MIC
            .without_marker()
            .intersects_input(DeviceMask::IN_BUILTIN_MIC));
    }

    #[test]
    fn test_out_all_clears_outputs() {
        let mask = DeviceMask::OUT_SPEAKER | DeviceMask::OUT_WIRED_HEADSET;
        assert!((mask & !DeviceMask::OUT_ALL).is_empty());
    }

    #[test]
    fn test_sco_groups() {
        assert!(DeviceMask::OUT_BLUETOOTH_SCO_HEADSET.intersects(DeviceMask::OUT_ALL_SCO));
        assert!(!DeviceMask::OUT_BLUETOOTH_A2DP.intersects(DeviceMask::OUT_ALL_SCO));
        assert!(DeviceMask::IN_BLUETOOTH_SCO_HEADSET
            .without_marker()
            .intersects_input(DeviceMask::IN_ALL_SCO));
    }
}
