//! Property tests for routing and the stream state machines.

use std::sync::Arc;
use std::time::Duration;

use audio_hal::hw::mock::{MockMixer, MockPcmDriver};
use audio_hal::hw::Direction;
use audio_hal::routing::RoutingTable;
use audio_hal::{
    rates_conflict, AudioConfig, AudioHal, ChannelMask, Device, DeviceMask, HalConfig, OutputFlags,
    PcmError, AUDIO_HARDWARE_INTERFACE,
};
use proptest::prelude::*;

fn open(driver: &MockPcmDriver) -> Arc<Device> {
    AudioHal::builder()
        .driver(driver.clone())
        .mixer(MockMixer::with_builtin_paths())
        .config(HalConfig {
            min_write_sleep: Duration::from_micros(10),
            max_error_delay: Duration::from_micros(100),
            ..Default::default()
        })
        .open(AUDIO_HARDWARE_INTERFACE)
        .unwrap()
}

#[derive(Debug, Clone)]
enum OutOp {
    Write,
    Underrun,
    IoError,
    OpenFailure,
    Standby,
}

fn out_op() -> impl Strategy<Value = OutOp> {
    prop_oneof![
        4 => Just(OutOp::Write),
        1 => Just(OutOp::Underrun),
        1 => Just(OutOp::IoError),
        1 => Just(OutOp::OpenFailure),
        1 => Just(OutOp::Standby),
    ]
}

#[derive(Debug, Clone)]
enum DuplexOp {
    Write,
    Read,
    RouteOut(u32),
    RouteIn(u32),
    StandbyOut,
    StandbyIn,
}

fn duplex_op() -> impl Strategy<Value = DuplexOp> {
    let out_masks = prop_oneof![
        Just(DeviceMask::OUT_SPEAKER.bits()),
        Just(DeviceMask::OUT_AUX_DIGITAL.bits()),
        Just(DeviceMask::OUT_BLUETOOTH_SCO.bits()),
        Just(DeviceMask::OUT_WIRED_HEADPHONE.bits()),
    ];
    let in_masks = prop_oneof![
        Just(DeviceMask::IN_BUILTIN_MIC.bits()),
        Just(DeviceMask::IN_BLUETOOTH_SCO_HEADSET.bits()),
        Just(DeviceMask::IN_BACK_MIC.bits()),
    ];
    prop_oneof![
        3 => Just(DuplexOp::Write),
        3 => Just(DuplexOp::Read),
        2 => out_masks.prop_map(DuplexOp::RouteOut),
        2 => in_masks.prop_map(DuplexOp::RouteIn),
        1 => Just(DuplexOp::StandbyOut),
        1 => Just(DuplexOp::StandbyIn),
    ]
}

proptest! {
    #[test]
    fn prop_select_devices_is_idempotent(out in any::<u32>(), input in any::<u32>()) {
        let table = RoutingTable::builtin();
        let mut mixer = MockMixer::with_builtin_paths();
        let out = DeviceMask(out & DeviceMask::OUT_ALL.bits());
        let input = DeviceMask(input) | DeviceMask::IN_MARKER;

        let first = table.select(&mut mixer, out, input);
        let first_paths = mixer.active_paths();
        let second = table.select(&mut mixer, out, input);

        prop_assert_eq!(first, second);
        prop_assert_eq!(first_paths, mixer.active_paths());
    }

    #[test]
    fn prop_rate_conflict_matches_families(a in 1u32..200_000, b in 1u32..200_000) {
        let expected = (a % 8000 == 0 && b % 8000 != 0) || (a % 11025 == 0 && b % 11025 != 0);
        prop_assert_eq!(rates_conflict(a, b), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_output_handle_tracks_standby(ops in prop::collection::vec(out_op(), 1..24)) {
        let driver = MockPcmDriver::new();
        let device = open(&driver);
        let requested = AudioConfig::new(44100, ChannelMask::OUT_STEREO);
        let (out, _) = device
            .open_output_stream(DeviceMask::OUT_SPEAKER, OutputFlags::NONE, &requested)
            .unwrap();
        let data = vec![0u8; 512];

        for op in ops {
            match op {
                OutOp::Write => {
                    prop_assert_eq!(out.write(&data).bytes, data.len());
                }
                OutOp::Underrun => {
                    driver.fail_next_write(PcmError::Underrun);
                    let transfer = out.write(&data);
                    prop_assert!(transfer.is_ok());
                    prop_assert!(!out.is_standby());
                }
                OutOp::IoError => {
                    driver.fail_next_write(PcmError::Io { code: -5 });
                    let transfer = out.write(&data);
                    prop_assert_eq!(transfer.bytes, data.len());
                    prop_assert!(transfer.error.is_some());
                    prop_assert!(out.is_standby());
                }
                OutOp::OpenFailure => {
                    // Only a stream in standby opens the hardware
                    if out.is_standby() {
                        driver.fail_next_open(PcmError::NoDevice);
                        let transfer = out.write(&data);
                        prop_assert_eq!(transfer.bytes, data.len());
                        prop_assert!(transfer.error.is_some());
                        prop_assert!(out.is_standby());
                    }
                }
                OutOp::Standby => out.standby(),
            }
            let open_handles = driver.open_handles(Direction::Out);
            prop_assert_eq!(out.is_standby(), open_handles == 0);
            prop_assert_eq!(device.active_output().is_some(), open_handles == 1);
        }
    }

    #[test]
    fn prop_muted_reads_are_silent(
        rate in prop_oneof![Just(8000u32), Just(16000), Just(22050), Just(44100)],
        frames in prop::collection::vec(1usize..1200, 1..6),
    ) {
        let driver = MockPcmDriver::new();
        let device = open(&driver);
        let requested = AudioConfig::new(rate, ChannelMask::IN_MONO);
        let input = device
            .open_input_stream(DeviceMask::IN_BUILTIN_MIC, &requested)
            .unwrap();
        device.set_mic_mute(true);

        for count in frames {
            driver.feed_capture(&vec![1234i16; count * 4]);
            let mut buf = vec![0x5Au8; count * 2];
            let transfer = input.read(&mut buf);
            prop_assert!(transfer.is_ok());
            prop_assert_eq!(transfer.bytes, count * 2);
            prop_assert!(buf.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn prop_active_streams_share_rate_family(ops in prop::collection::vec(duplex_op(), 1..32)) {
        let driver = MockPcmDriver::new();
        let device = open(&driver);
        let (out, _) = device
            .open_output_stream(
                DeviceMask::OUT_SPEAKER,
                OutputFlags::NONE,
                &AudioConfig::new(44100, ChannelMask::OUT_STEREO),
            )
            .unwrap();
        let input = device
            .open_input_stream(
                DeviceMask::IN_BUILTIN_MIC,
                &AudioConfig::new(8000, ChannelMask::IN_MONO),
            )
            .unwrap();
        let data = vec![0u8; 256];
        let mut buf = vec![0u8; 160];

        for op in ops {
            match op {
                DuplexOp::Write => prop_assert!(out.write(&data).is_ok()),
                DuplexOp::Read => prop_assert!(input.read(&mut buf).is_ok()),
                DuplexOp::RouteOut(mask) => {
                    out.set_parameters(&format!("routing={mask}")).unwrap();
                }
                DuplexOp::RouteIn(mask) => {
                    input.set_parameters(&format!("routing={mask}")).unwrap();
                }
                DuplexOp::StandbyOut => out.standby(),
                DuplexOp::StandbyIn => input.standby(),
            }
            if !out.is_standby() && !input.is_standby() {
                let out_rate = out.pcm_config().rate;
                let in_rate = input.pcm_config().rate;
                prop_assert!(!rates_conflict(out_rate, in_rate), "{} vs {}", out_rate, in_rate);
                prop_assert!(!rates_conflict(in_rate, out_rate), "{} vs {}", in_rate, out_rate);
            }
        }
    }
}
