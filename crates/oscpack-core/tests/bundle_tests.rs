//! Bundle framing tests

use oscpack_core::{
    codec, Argument, Bundle, EncodeOptions, Encoding, Error, Message, Packet, TimeTag,
    DEFAULT_MAX_DEPTH,
};

fn encoding_for(depth: usize, index: usize) -> Encoding {
    if (depth + index) % 2 == 0 {
        Encoding::Plain
    } else {
        Encoding::Pack
    }
}

/// Bundle of `depth` levels; each level holds two messages around the next
/// level, with encodings alternating
fn nested(depth: usize, max: usize) -> Bundle {
    let mut bundle = Bundle::with_timetag(TimeTag::from_parts(1000 + depth as u32, 0))
        .with_encoding(encoding_for(depth, 1));

    bundle.add(
        Message::new(format!("/level/{}/first", depth))
            .unwrap()
            .arg(depth as i32)
            .with_encoding(encoding_for(depth, 0)),
    );
    if depth < max {
        bundle.add(nested(depth + 1, max));
    }
    bundle.add(
        Message::new(format!("/level/{}/last", depth))
            .unwrap()
            .arg("end")
            .with_encoding(encoding_for(depth, 2)),
    );
    bundle
}

fn check(original: &Bundle, decoded: &Bundle) {
    assert_eq!(decoded.timetag(), original.timetag());
    assert_eq!(decoded.encoding(), original.encoding());
    assert_eq!(decoded.len(), original.len());

    for (a, b) in original.packets().iter().zip(decoded.packets()) {
        assert_eq!(a.encoding(), b.encoding());
        match (a, b) {
            (Packet::Message(a), Packet::Message(b)) => {
                assert_eq!(a.address(), b.address());
                assert_eq!(a.arguments(), b.arguments());
            }
            (Packet::Bundle(a), Packet::Bundle(b)) => check(a, b),
            _ => panic!("packet kind changed"),
        }
    }
}

#[test]
fn test_nesting_depths_roundtrip() {
    for max in 0..=5 {
        let bundle = nested(0, max);
        let bytes = codec::encode(&bundle.clone().into()).expect("encode failed");
        let decoded = codec::decode(&bytes).expect("decode failed");
        check(&bundle, decoded.as_bundle().expect("Expected bundle"));
    }
}

#[test]
fn test_plain_bundle_alignment() {
    let mut bundle = Bundle::new();
    bundle.add(Message::new("/a").unwrap().arg("xyz"));
    bundle.add(Message::new("/pack").unwrap().arg(1).with_encoding(Encoding::Pack));
    bundle.add(Bundle::new().packet(Message::new("/inner").unwrap()));

    let bytes = codec::encode(&bundle.into()).unwrap();
    assert_eq!(bytes.len() % 4, 0);
    assert_eq!(&bytes[..8], b"#bundle\0");
    assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 0, 0, 0, 1]);
}

#[test]
fn test_empty_bundle() {
    for encoding in [Encoding::Plain, Encoding::Pack] {
        let bundle = Bundle::new().with_encoding(encoding);
        let bytes = codec::encode(&bundle.into()).unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        let decoded = decoded.as_bundle().unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.timetag().is_immediate());
    }
}

#[test]
fn test_child_order_preserved() {
    let mut bundle = Bundle::new().with_encoding(Encoding::Pack);
    for i in 0..20 {
        bundle.add(Message::new("/n").unwrap().arg(i));
    }
    let bytes = codec::encode(&bundle.into()).unwrap();
    let decoded = codec::decode(&bytes).unwrap();

    let values: Vec<i32> = decoded
        .as_bundle()
        .unwrap()
        .packets()
        .iter()
        .map(|p| p.as_message().unwrap().arguments()[0].as_i32().unwrap())
        .collect();
    assert_eq!(values, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_timetag_survives_both_encodings() {
    let tag = TimeTag::from_unix_millis(1_700_000_000_123);
    for encoding in [Encoding::Plain, Encoding::Pack] {
        let bundle = Bundle::with_timetag(tag).packet(Message::new("/t").unwrap());
        let bytes = codec::encode_with(
            &bundle.into(),
            &EncodeOptions::default().encoding(encoding),
        )
        .unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        assert_eq!(decoded.as_bundle().unwrap().timetag(), tag);
    }
}

#[test]
fn test_truncated_child_is_an_error() {
    let bundle = Bundle::new().packet(Message::new("/long/address").unwrap().arg(Argument::Double(1.0)));
    let bytes = codec::encode(&bundle.into()).unwrap();
    assert!(codec::decode(&bytes[..bytes.len() - 4]).is_err());
}

/// `levels` plain bundles wrapped around "/x", built from raw bytes
fn plain_nesting(levels: usize) -> Vec<u8> {
    let mut bytes = b"/x\0\0,\0\0\0".to_vec();
    for _ in 0..levels {
        let mut outer = b"#bundle\0".to_vec();
        outer.extend_from_slice(&1u64.to_be_bytes());
        outer.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
        outer.extend_from_slice(&bytes);
        bytes = outer;
    }
    bytes
}

/// `levels` pack bundles wrapped around "/x", built from raw bytes
fn pack_nesting(levels: usize) -> Vec<u8> {
    let mut bytes = vec![b'!', 0xa2, b'/', b'x', 0xa0];
    for _ in 0..levels {
        let mut outer = vec![b'!', b'#', 0x01];
        match bytes.len() {
            n if n <= 0xff => outer.extend_from_slice(&[0xc4, n as u8]),
            n if n <= 0xffff => {
                outer.push(0xc5);
                outer.extend_from_slice(&(n as u16).to_be_bytes());
            }
            n => {
                outer.push(0xc6);
                outer.extend_from_slice(&(n as u32).to_be_bytes());
            }
        }
        outer.extend_from_slice(&bytes);
        bytes = outer;
    }
    bytes
}

#[test]
fn test_nesting_limit() {
    for build in [plain_nesting as fn(usize) -> Vec<u8>, pack_nesting] {
        let ok = codec::decode(&build(DEFAULT_MAX_DEPTH)).unwrap();
        assert!(ok.is_bundle());

        assert!(matches!(
            codec::decode(&build(DEFAULT_MAX_DEPTH + 1)),
            Err(Error::DecodeError(_))
        ));
    }
}

#[test]
fn test_deep_nesting_fails_without_overflowing_the_stack() {
    let plain = plain_nesting(3_000);
    assert!(plain.len() < 65_507);
    let pack = pack_nesting(3_000);

    // Default thread stack, like a receive thread
    let handle = std::thread::Builder::new()
        .spawn(move || {
            (
                codec::decode(&plain).is_err(),
                codec::decode(&pack).is_err(),
            )
        })
        .unwrap();
    assert_eq!(handle.join().unwrap(), (true, true));
}
