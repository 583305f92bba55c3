//! Integration tests for the autoplug decision.

mod common;

use audiosieve::{MediaClass, SieveOptions, StreamDescriptor, autoplug_continue};

use common::{MockGraph, session_with};

#[test]
fn decisions_depend_on_media_type_only() {
    let cases = [
        ("video/mpegts", true),
        ("video/x-h264", false),
        ("video/x-raw", false),
        ("audio/mpeg", true),
        ("audio/x-raw", true),
        ("audio/x-ac3", true),
        ("subpicture/x-dvb", false),
        ("application/x-id3", false),
        ("text/x-raw", false),
    ];
    for (media_type, expected) in cases {
        let plain = StreamDescriptor::new(media_type);
        let detailed = StreamDescriptor::new(media_type)
            .with_details(format!("{media_type}, rate=(int)48000, channels=(int)2"));
        assert_eq!(autoplug_continue(&plain), expected, "{media_type}");
        assert_eq!(autoplug_continue(&detailed), expected, "{media_type} with fields");
    }
}

#[test]
fn transport_stream_is_not_treated_as_video() {
    let ts = StreamDescriptor::new("video/mpegts");
    assert_eq!(ts.class(), MediaClass::TransportStream);
    assert!(autoplug_continue(&ts));
}

#[test]
fn session_stops_when_caps_are_missing() {
    let (session, _sink) = session_with(MockGraph::new(), SieveOptions::new());
    assert!(!session.autoplug_continue(None));
    assert!(session.autoplug_continue(Some(&StreamDescriptor::new("audio/x-aac"))));
    assert!(!session.autoplug_continue(Some(&StreamDescriptor::new("video/x-vp9"))));
}

#[test]
fn decisions_are_stable_across_calls() {
    let (session, _sink) = session_with(MockGraph::new(), SieveOptions::new());
    let caps = StreamDescriptor::new("audio/mpeg");
    let first = session.autoplug_continue(Some(&caps));
    for _ in 0..10 {
        assert_eq!(session.autoplug_continue(Some(&caps)), first);
    }
    assert_eq!(session.graph().added_factories(), Vec::<String>::new());
}
