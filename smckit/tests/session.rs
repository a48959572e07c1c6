//! Session and transaction behaviour against an in-memory controller.

use rstest::{fixture, rstest};
use smckit::{
    ByteOrder, ChannelStatus, Smc, SmcConfig, SmcError, SmcValue,
    memory::MemoryChannel,
    sensors::TEMPERATURE_SENSORS,
};

#[fixture]
fn channel() -> MemoryChannel {
    MemoryChannel::new()
        .with_key("FNum", b"ui8 ", &[2])
        .with_key("F0Ac", b"fpe2", &[31, 64])
        .with_key("F0Mn", b"fpe2", &[18, 192])
        .with_key("F0Mx", b"fpe2", &[96, 220])
        .with_key("F1Ac", b"fpe2", &[56, 244])
        .with_key("F1Mn", b"fpe2", &[18, 192])
        .with_key("F1Mx", b"fpe2", &[96, 220])
        .with_key("TC0P", b"sp78", &[0x2f, 0x80])
        .with_key("TC0D", b"sp78", &[0xfb, 0x00])
        .with_key("TA0P", b"sp78", &[0x7f, 0xff])
        .with_key("MSDI", b"flag", &[0])
}

fn connect(channel: &MemoryChannel) -> Smc<MemoryChannel> {
    let config = SmcConfig::default().with_byte_order(ByteOrder::Big);
    Smc::connect(channel.clone(), config).expect("open")
}

#[rstest]
#[case("")]
#[case("Vi")]
#[case("Vim")]
#[case("What is this new devilry?")]
#[case("ZZZZ")]
fn invalid_keys_are_rejected(channel: MemoryChannel, #[case] name: &str) {
    let smc = connect(&channel);
    assert!(!smc.is_key_valid(name));
}

#[rstest]
#[case("FNum")]
#[case("#KEY")]
fn stable_keys_are_valid(channel: MemoryChannel, #[case] name: &str) {
    let smc = connect(&channel);
    assert!(smc.is_key_valid(name));
}

#[rstest]
fn open_twice_keeps_session_usable(channel: MemoryChannel) {
    let smc = connect(&channel);
    assert!(matches!(smc.open(), Err(SmcError::AlreadyOpen)));
    assert!(smc.sensors().fan_count().expect("fans") >= 1);
}

#[rstest]
fn close_twice_then_reopen(channel: MemoryChannel) {
    let smc = connect(&channel);
    smc.close().expect("first close");
    assert!(matches!(smc.close(), Err(SmcError::AlreadyClosed)));
    assert!(matches!(smc.read("FNum"), Err(SmcError::NotOpen)));

    smc.open().expect("reopen");
    assert!(smc.sensors().fan_count().expect("fans") >= 1);
    assert!(smc.is_key_valid("#KEY"));
    smc.close().expect("close");
}

#[rstest]
fn temperatures_stay_within_sp78_bounds(channel: MemoryChannel) {
    let smc = connect(&channel);
    let readings = smc.sensors().all_temperatures().expect("temperatures");
    assert_eq!(readings.len(), 3);
    for reading in readings {
        assert!(TEMPERATURE_SENSORS.contains(&reading.sensor));
        assert!(reading.celsius > -128.0, "{:?}", reading);
        assert!(reading.celsius < 128.0, "{:?}", reading);
    }
}

#[rstest]
fn fan_speeds_decode_from_fpe2(channel: MemoryChannel) {
    let smc = connect(&channel);
    let fans = smc.sensors().fans().expect("fans");
    let speeds: Vec<_> = fans.iter().map(|f| f.current_rpm).collect();
    assert_eq!(speeds, [2000, 3645]);
    assert!(fans.iter().all(|f| f.min_rpm == 1200 && f.max_rpm == 6199));
}

#[rstest]
fn write_then_read_round_trips(channel: MemoryChannel) {
    let smc = connect(&channel);
    smc.write("F1Mn", &SmcValue::Fixed(2000.0)).expect("write");
    assert_eq!(channel.value("F1Mn"), Some(vec![31, 64]));
    assert_eq!(smc.read("F1Mn").expect("read"), SmcValue::Fixed(2000.0));

    smc.write("MSDI", &SmcValue::Bool(true)).expect("write flag");
    assert!(smc.sensors().is_optical_drive_full().expect("flag"));
}

#[rstest]
fn oversized_value_never_reaches_controller(channel: MemoryChannel) {
    let smc = connect(&channel);
    let err = smc
        .write("F0Mn", &SmcValue::U32(2000))
        .expect_err("u32 into fpe2");
    assert!(matches!(
        err,
        SmcError::SizeMismatch {
            expected: 2,
            actual: 4,
            ..
        }
    ));
    let stats = channel.stats();
    assert_eq!(stats.key_infos, 1);
    assert_eq!(stats.writes, 0);
    assert_eq!(channel.value("F0Mn"), Some(vec![18, 192]));
}

#[rstest]
fn channel_errors_are_transient_and_protocol_errors_are_not(channel: MemoryChannel) {
    let smc = connect(&channel);
    channel.fail_next(ChannelStatus::Kern(-536870199));
    let err = smc.read("TC0P").expect_err("injected");
    assert!(err.is_transient());

    let err = smc.read("Tx9Z").expect_err("missing");
    assert!(!err.is_transient());
    assert!(matches!(err, SmcError::KeyNotFound { .. }));
}

#[rstest]
fn shared_session_serializes_threads(channel: MemoryChannel) {
    let smc = connect(&channel);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    assert_eq!(smc.read("FNum").expect("read"), SmcValue::U8(2));
                }
            });
        }
    });
}
