//! Device state dispatch tests

use lightctl_core::{
    Compose, DeviceState, Glitter, LightMode, OnBoardLedStrength, PackageType, ParseOutcome,
    Pulse, PulseDirection, RunningSections, SharedDeviceState, Strobe,
};
use std::thread;

#[test]
fn test_dispatch_fills_each_slot() {
    let mut state = DeviceState::new();

    let light = LightMode::color(10, 20, 30).with_strength(0.5);
    let strobe = Strobe {
        on_time_us: 1,
        off_time_us: 2,
    };
    let glitter = Glitter {
        update_rate_us: 3,
        random_color: false,
        percent_on: 4.0,
    };
    let pulse = Pulse {
        pulse_time_ms: 5,
        direction: PulseDirection::Inward,
        single_shot: true,
    };
    let sections = RunningSections {
        update_rate_ms: 6,
        section_count: 7,
        section_size: 8,
    };

    assert_eq!(
        state.parse_message(&light.compose()),
        ParseOutcome::Stored(PackageType::LightMode)
    );
    state.parse_message(&strobe.compose());
    state.parse_message(&glitter.compose());
    state.parse_message(&pulse.compose());
    state.parse_message(&sections.compose());
    state.parse_message(&[PackageType::OnBoardLedStrength.as_u8(), 42]);

    assert_eq!(state.light_mode, Some(light));
    assert_eq!(state.strobe, Some(strobe));
    assert_eq!(state.glitter, Some(glitter));
    assert_eq!(state.pulse, Some(pulse));
    assert_eq!(state.running_sections, Some(sections));
    assert_eq!(
        state.on_board_led_strength,
        Some(OnBoardLedStrength { strength: 42.0 })
    );
    assert!(state.rainbow.is_none());
}

#[test]
fn test_known_unhandled_types_are_dropped() {
    let mut state = DeviceState::new();
    let ignored = [
        PackageType::FrequencyInfo,
        PackageType::Samples,
        PackageType::TetrisMove,
        PackageType::WifiSettings,
        PackageType::ScanWifi,
        PackageType::OtaData,
        PackageType::Ping,
        PackageType::GameOfLifeSettings,
        PackageType::FrequencySettings,
    ];

    for kind in ignored {
        assert!(!kind.is_modeled());
        let outcome = state.parse_message(&[kind.as_u8(), 1, 2, 3, 4]);
        assert_eq!(outcome, ParseOutcome::Ignored(kind));
    }
    assert!(state.light_mode.is_none());
    assert!(state.nodes.is_empty());
}

#[test]
fn test_unknown_and_empty_frames() {
    let mut state = DeviceState::new();
    assert_eq!(state.parse_message(&[0x7f, 0, 0]), ParseOutcome::Unknown(0x7f));
    assert_eq!(state.parse_message(&[]), ParseOutcome::Empty);
}

#[test]
fn test_undersized_frame_is_malformed_not_fatal() {
    let mut state = DeviceState::new();
    let outcome = state.parse_message(&[PackageType::LightMode.as_u8(), 1, 0, 0]);
    assert_eq!(outcome, ParseOutcome::Malformed(PackageType::LightMode));
    assert!(state.light_mode.is_none());

    // Later frames still decode
    state.parse_message(&LightMode::off().compose());
    assert_eq!(state.light_mode, Some(LightMode::off()));
}

#[test]
fn test_node_list_replaced_wholesale() {
    let mut state = DeviceState::new();

    let mut payload = 2u32.to_le_bytes().to_vec();
    payload.extend_from_slice(&[0u8; 2 * 113]);
    assert_eq!(state.update_nodes(&payload), Ok(2));
    assert_eq!(state.node_count(), 2);

    let mut frame = vec![PackageType::NodeInfo.as_u8()];
    frame.extend_from_slice(&1u32.to_le_bytes());
    frame.extend_from_slice(&[0u8; 113]);
    state.parse_message(&frame);
    assert_eq!(state.node_count(), 1);
}

#[test]
fn test_shared_state_concurrent_access() {
    let shared = SharedDeviceState::new();

    let writer = {
        let shared = shared.clone();
        thread::spawn(move || {
            for i in 0..200u32 {
                shared.parse_message(&Strobe {
                    on_time_us: i,
                    off_time_us: i,
                }
                .compose());
            }
        })
    };

    for _ in 0..200 {
        if let Some(strobe) = shared.snapshot().strobe {
            assert_eq!(strobe.on_time_us, strobe.off_time_us);
        }
    }

    writer.join().unwrap();
    assert_eq!(shared.snapshot().strobe.map(|s| s.on_time_us), Some(199));
}
