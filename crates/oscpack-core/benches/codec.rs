//! Codec benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use oscpack_core::{codec, Argument, Bundle, EncodeOptions, Encoding, Message, Packet, TimeTag};

fn sample_message() -> Message {
    Message::new("/synth/1/params")
        .unwrap()
        .arg(440.0f32)
        .arg(3)
        .arg("saw")
        .arg(Argument::Array(vec![Argument::Double(0.25), Argument::Bool(true)]))
        .arg(vec![1u8, 2, 3, 4, 5])
}

fn encode_benchmark(c: &mut Criterion) {
    let packet: Packet = sample_message().into();

    c.bench_function("encode_plain_message", |b| {
        b.iter(|| black_box(codec::encode_with(&packet, &EncodeOptions::default()).unwrap()))
    });

    let pack = EncodeOptions::default().encoding(Encoding::Pack);
    c.bench_function("encode_pack_message", |b| {
        b.iter(|| black_box(codec::encode_with(&packet, &pack).unwrap()))
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let packet: Packet = sample_message().into();
    let plain = codec::encode(&packet).unwrap();
    let pack = codec::encode_with(&packet, &EncodeOptions::default().encoding(Encoding::Pack)).unwrap();

    c.bench_function("decode_plain_message", |b| {
        b.iter(|| black_box(codec::decode(&plain).unwrap()))
    });

    c.bench_function("decode_pack_message", |b| {
        b.iter(|| black_box(codec::decode(&pack).unwrap()))
    });
}

fn bundle_benchmark(c: &mut Criterion) {
    let mut bundle = Bundle::with_timetag(TimeTag::now());
    for i in 0..16 {
        let msg = sample_message().with_encoding(if i % 2 == 0 { Encoding::Plain } else { Encoding::Pack });
        bundle.add(msg);
    }
    let encoded = codec::encode(&bundle.into()).unwrap();

    c.bench_function("decode_mixed_bundle", |b| {
        b.iter(|| black_box(codec::decode(&encoded).unwrap()))
    });
}

criterion_group!(benches, encode_benchmark, decode_benchmark, bundle_benchmark);
criterion_main!(benches);
