//! Dispatcher fan-out tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use oscpack_core::{codec, Bundle, Dispatcher, Encoding, Listener, Message, TimeTag};

fn counting(dispatcher: &Dispatcher, pattern: &str) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    dispatcher
        .add_listener(pattern, move |_: Option<TimeTag>, _: &Message| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .expect("valid pattern");
    count
}

#[test]
fn test_fan_out_to_every_match() {
    let dispatcher = Dispatcher::new();
    let star = counting(&dispatcher, "/a/*");
    let anywhere = counting(&dispatcher, "//*");

    let delivered = dispatcher.dispatch(&Message::new("/a/b").unwrap().into());
    assert_eq!(delivered, 2);
    assert_eq!(star.load(Ordering::SeqCst), 1);
    assert_eq!(anywhere.load(Ordering::SeqCst), 1);

    let delivered = dispatcher.dispatch(&Message::new("/c/d").unwrap().into());
    assert_eq!(delivered, 1);
    assert_eq!(star.load(Ordering::SeqCst), 1);
    assert_eq!(anywhere.load(Ordering::SeqCst), 2);
}

#[test]
fn test_same_pattern_twice() {
    let dispatcher = Dispatcher::new();
    let first = counting(&dispatcher, "/x");
    let second = counting(&dispatcher, "/x");

    assert_eq!(dispatcher.dispatch(&Message::new("/x").unwrap().into()), 2);
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn test_no_match() {
    let dispatcher = Dispatcher::new();
    let hits = counting(&dispatcher, "/a/*");
    assert_eq!(dispatcher.dispatch(&Message::new("/b").unwrap().into()), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_nested_bundle_delivery() {
    let dispatcher = Dispatcher::new();
    let hits = counting(&dispatcher, "//*");

    let inner = Bundle::new()
        .packet(Message::new("/in/1").unwrap())
        .packet(Message::new("/in/2").unwrap().with_encoding(Encoding::Pack));
    let outer = Bundle::with_timetag(TimeTag::from_unix_millis(1_000))
        .packet(Message::new("/out").unwrap())
        .packet(inner);

    let bytes = codec::encode(&outer.into()).unwrap();
    let delivered = dispatcher
        .dispatch_bytes(&bytes, "127.0.0.1:1".parse().unwrap())
        .unwrap();
    assert_eq!(delivered, 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

struct Recorder {
    seen: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl Listener for Recorder {
    fn accept(&self, _time: Option<TimeTag>, message: &Message) {
        self.seen.lock().push(message.address().to_string());
    }
}

#[test]
fn test_struct_listener() {
    let dispatcher = Dispatcher::new();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    dispatcher
        .add_listener("/synth/*/freq", Recorder { seen: Arc::clone(&seen) })
        .unwrap();

    for addr in ["/synth/1/freq", "/synth/2/gain", "/synth/3/freq"] {
        dispatcher.dispatch(&Message::new(addr).unwrap().into());
    }
    assert_eq!(*seen.lock(), vec!["/synth/1/freq", "/synth/3/freq"]);
}

#[test]
fn test_listener_may_register_during_dispatch() {
    let dispatcher = Arc::new(Dispatcher::new());
    let d = Arc::clone(&dispatcher);
    dispatcher
        .add_listener("/grow", move |_: Option<TimeTag>, _: &Message| {
            d.add_listener("/grown", |_: Option<TimeTag>, _: &Message| {}).unwrap();
        })
        .unwrap();

    dispatcher.dispatch(&Message::new("/grow").unwrap().into());
    assert_eq!(dispatcher.len(), 2);
}

#[test]
fn test_bad_datagram_is_an_error_not_a_panic() {
    let dispatcher = Dispatcher::new();
    let hits = counting(&dispatcher, "//*");
    assert!(dispatcher
        .dispatch_bytes(&[0x2f, 0x61], "127.0.0.1:1".parse().unwrap())
        .is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
