//! End-to-end-ish tests that exercise real GStreamer element construction
//! and linking without a live network feed, mirroring the way the upstream
//! prototype's test mode swaps `videotestsrc` in for the camera/network
//! source.

use gstreamer as gst;
use gst::prelude::*;

use resilient_relay::config::{Config, OutputCodec, OutputContainer};
use resilient_relay::graph::fallback::build_fallback_branch;
use resilient_relay::graph::normalize::canonical_caps;
use resilient_relay::graph::output::{build_appsrc, build_output_branch};
use resilient_relay::graph::selector::Selector;
use resilient_relay::sync::{Counters, FrameSlot};
use resilient_relay::watchdog;

fn init() {
    gst::init().expect("gstreamer must be installed to run these tests");
}

#[test]
fn test_selector_acquire_release_ingest_sink_roundtrip() {
    init();
    let selector = Selector::new(gst::Caps::new_empty_simple("video/x-raw")).unwrap();

    let pad = selector.acquire_ingest_sink().expect("first acquire must succeed");
    assert!(selector.ingest_pad().is_some());

    selector
        .release_ingest_sink()
        .expect("releasing a non-active pad must succeed");
    assert!(selector.ingest_pad().is_none());
    drop(pad);

    selector
        .acquire_ingest_sink()
        .expect("re-acquiring after a clean release must succeed");
}

#[test]
fn test_selector_refuses_double_acquire() {
    init();
    let selector = Selector::new(gst::Caps::new_empty_simple("video/x-raw")).unwrap();
    selector.acquire_ingest_sink().unwrap();
    assert!(
        selector.acquire_ingest_sink().is_err(),
        "acquiring a second ingest sink while one is held must fail"
    );
}

#[test]
fn test_selector_refuses_releasing_active_pad() {
    init();
    let selector = Selector::new(gst::Caps::new_empty_simple("video/x-raw")).unwrap();
    selector.acquire_ingest_sink().unwrap();
    selector.activate_ingest().unwrap();
    assert!(selector.is_ingest_active());

    assert!(
        selector.release_ingest_sink().is_err(),
        "releasing the active sink pad must be refused"
    );
    // the pad must still be held after the refused release
    assert!(selector.ingest_pad().is_some());
}

#[test]
fn test_fallback_branch_links_into_selector() {
    init();
    let config = Config::default();
    let caps = canonical_caps(&config);
    let pipeline = gst::Pipeline::new();
    let selector = Selector::new(caps).unwrap();
    pipeline.add(selector.element()).unwrap();

    let fallback = build_fallback_branch(&pipeline, &selector).unwrap();

    let src_pad = fallback.normalize.src_element().static_pad("src").unwrap();
    let peer = src_pad.peer().expect("fallback chain must be linked to the selector");
    assert_eq!(&peer, selector.fallback_pad());
}

#[test]
fn test_output_branch_shared_memory_skips_encoder() {
    init();
    let mut config = Config::default();
    config.output.container = OutputContainer::SharedMemory;
    config.output.codec = OutputCodec::Raw;

    let caps = canonical_caps(&config);
    let output_pipeline = gst::Pipeline::new();
    let appsrc = build_appsrc(&caps).unwrap();
    let branch = build_output_branch(&output_pipeline, &appsrc, &config).unwrap();

    assert_eq!(branch.elements.len(), 1, "shared-memory output is appsrc -> shmsink, no encoder");
    assert_eq!(branch.elements[0].factory().map(|f| f.name().to_string()), Some("shmsink".to_string()));
}

#[test]
fn test_output_branch_rtp_h264_chain() {
    init();
    let mut config = Config::default();
    config.output.container = OutputContainer::Rtp;
    config.output.codec = OutputCodec::H264;

    let caps = canonical_caps(&config);
    let output_pipeline = gst::Pipeline::new();
    let appsrc = build_appsrc(&caps).unwrap();
    let branch = build_output_branch(&output_pipeline, &appsrc, &config).unwrap();

    // encoder, payloader, udpsink
    assert_eq!(branch.elements.len(), 3);
}

#[test]
fn test_frame_slot_falls_back_once_stale_even_while_cached() {
    init();
    use std::sync::Arc;
    use std::time::Duration;

    let counters = Arc::new(Counters::new());
    let slot = FrameSlot::new(Arc::clone(&counters));
    slot.write(gst::Buffer::with_size(4).unwrap());

    assert!(
        slot.read_fresh(Duration::from_secs(5)).is_some(),
        "a just-written frame is fresh under the default no_signal_timeout"
    );

    std::thread::sleep(Duration::from_millis(30));
    assert!(
        slot.read_fresh(Duration::from_millis(10)).is_none(),
        "a cached frame older than no_signal_timeout must not be trusted by the render loop"
    );
}

#[test]
fn test_watchdog_state_machine_end_to_end() {
    use std::time::Duration;
    use watchdog::{Watchdog, WatchdogEvent};

    let wd = Watchdog::new(Duration::from_millis(30), Duration::from_millis(20));
    assert_eq!(wd.on_buffer(), WatchdogEvent::None);

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(wd.tick(), WatchdogEvent::SwitchToFallback);

    wd.on_buffer();
    std::thread::sleep(Duration::from_millis(25));
    assert_eq!(wd.on_buffer(), WatchdogEvent::SwitchToIngest);
}
