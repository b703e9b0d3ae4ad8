//! Time tag tests

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use oscpack_core::time::{MSB_0_BASE_TIME, MSB_1_BASE_TIME};
use oscpack_core::{codec, Bundle, Message, TimeTag};

#[test]
fn test_instant_roundtrip_within_one_ms() {
    let samples = [
        UNIX_EPOCH,
        UNIX_EPOCH + Duration::from_millis(1_234_567_890_987),
        UNIX_EPOCH + Duration::from_nanos(1_600_000_000_123_456_789),
        UNIX_EPOCH - Duration::from_secs(31_536_000),
        SystemTime::now(),
    ];

    for t in samples {
        let tag = TimeTag::from(t);
        let back = tag.to_system_time().expect("not immediate");
        let diff = match back.duration_since(t) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };
        assert!(diff <= Duration::from_millis(1), "{:?} drifted by {:?}", t, diff);
    }
}

#[test]
fn test_raw_tag_roundtrip() {
    for raw in [0x83aa_7e80_0000_0000u64, 0xe8f3_3a40_8000_0000, 0x0000_0010_4000_0000] {
        let tag = TimeTag::from_raw(raw);
        let millis = tag.to_unix_millis().unwrap();
        let again = TimeTag::from_unix_millis(millis);
        let drift = (again.as_raw() as i128 - raw as i128).abs();
        // one millisecond in NTP fraction units
        assert!(drift <= (1u64 << 32) as i128 / 1000 + 1, "raw {:x}", raw);
    }
}

#[test]
fn test_immediate_roundtrips_exactly() {
    let bundle = Bundle::new().packet(Message::new("/now").unwrap());
    let bytes = codec::encode(&bundle.into()).unwrap();
    let decoded = codec::decode(&bytes).unwrap();
    let tag = decoded.as_bundle().unwrap().timetag();

    assert_eq!(tag, TimeTag::IMMEDIATE);
    assert!(tag.is_immediate());
    assert!(tag.to_system_time().is_none());
}

#[test]
fn test_era_bases() {
    assert_eq!(TimeTag::from_parts(0x8000_0000, 0).to_unix_millis(), Some(MSB_1_BASE_TIME + 0x8000_0000i64 * 1000));
    assert_eq!(TimeTag::from_parts(0, 0).to_unix_millis(), Some(MSB_0_BASE_TIME));
    assert_eq!(TimeTag::from_parts(10, 0).to_unix_millis(), Some(MSB_0_BASE_TIME + 10_000));
}

#[test]
fn test_post_2036_instant() {
    let t = UNIX_EPOCH + Duration::from_millis(MSB_0_BASE_TIME as u64 + 86_400_000);
    let tag = TimeTag::from(t);
    assert_eq!(tag.seconds(), 86_400);
    assert_eq!(tag.to_system_time(), Some(t));
}

#[test]
fn test_hex_form() {
    let tag = TimeTag::from_unix_millis(0);
    assert_eq!(tag.to_string(), "83aa7e80.00000000");
    assert_eq!("83aa7e80.00000000".parse::<TimeTag>().unwrap(), tag);
}
