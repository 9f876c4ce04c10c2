use gst::prelude::*;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tile_layouter::{
    CompositorRuntime, LayoutConfig, LayoutError, Layouter, SourceHandle, TileGeometry,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_test_environment() -> bool {
    if gst::init().is_err() {
        return false;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tile_layouter=debug")
        .with_test_writer()
        .try_init();

    ["compositor", "videotestsrc", "capsfilter", "fakesink"]
        .iter()
        .all(|name| gst::ElementFactory::find(name).is_some())
}

fn video_caps(width: i32, height: i32) -> gst::Caps {
    gst::Caps::builder("video/x-raw")
        .field("width", width)
        .field("height", height)
        .build()
}

fn capsfilter(width: i32, height: i32) -> gst::Element {
    gst::ElementFactory::make("capsfilter")
        .property("caps", video_caps(width, height))
        .build()
        .unwrap()
}

/// `compositor ! capsfilter ! fakesink` forcing the output size
struct Harness {
    pipeline: gst::Pipeline,
    compositor: gst::Element,
    layouter: Layouter<CompositorRuntime>,
}

impl Harness {
    fn new(width: i32, height: i32) -> Self {
        let pipeline = gst::Pipeline::new();
        let compositor = gst::ElementFactory::make("compositor").build().unwrap();
        let output_caps = capsfilter(width, height);
        let sink = gst::ElementFactory::make("fakesink")
            .property("sync", false)
            .build()
            .unwrap();

        pipeline
            .add_many([&compositor, &output_caps, &sink])
            .unwrap();
        gst::Element::link_many([&compositor, &output_caps, &sink]).unwrap();

        let config = LayoutConfig::default();
        let runtime = CompositorRuntime::new(&compositor, &config).unwrap();
        let layouter = Layouter::new(runtime, config).unwrap();

        Self {
            pipeline,
            compositor,
            layouter,
        }
    }

    /// Adds `videotestsrc ! capsfilter` and attaches the filter's src pad.
    fn add_source(&self, width: i32, height: i32) -> (Vec<gst::Element>, SourceHandle) {
        let source = gst::ElementFactory::make("videotestsrc").build().unwrap();
        let caps = capsfilter(width, height);
        self.pipeline.add_many([&source, &caps]).unwrap();
        source.link(&caps).unwrap();

        let handle = self
            .layouter
            .attach(caps.static_pad("src").unwrap(), false)
            .unwrap();

        caps.sync_state_with_parent().unwrap();
        source.sync_state_with_parent().unwrap();
        (vec![source, caps], handle)
    }

    fn geometry(&self, slot: &str) -> Option<TileGeometry> {
        let pad = self.compositor.static_pad(slot)?;
        Some(TileGeometry {
            x: pad.property("xpos"),
            y: pad.property("ypos"),
            width: pad.property("width"),
            height: pad.property("height"),
        })
    }

    fn wait_for_geometry(&self, slot: &str, expected: TileGeometry) -> bool {
        wait_until(|| self.geometry(slot) == Some(expected))
    }

    fn play(&self) {
        self.pipeline.set_state(gst::State::Playing).unwrap();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

fn wait_until<F: FnMut() -> bool>(mut done: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}

#[test]
fn test_single_source_is_centered() {
    if !init_test_environment() {
        return;
    }

    let harness = Harness::new(1280, 720);
    harness.play();
    let (_elements, handle) = harness.add_source(640, 480);

    let expected = TileGeometry {
        x: 160,
        y: 0,
        width: 960,
        height: 720,
    };
    assert!(
        harness.wait_for_geometry(handle.slot_name(), expected),
        "got {:?}",
        harness.geometry(handle.slot_name())
    );
    assert!(wait_until(|| harness.layouter.output_size().width == 1280));
}

#[test]
fn test_two_sources_share_a_row() {
    if !init_test_environment() {
        return;
    }

    let harness = Harness::new(1280, 720);
    harness.play();
    let (_first_elements, first) = harness.add_source(640, 480);
    let (_second_elements, second) = harness.add_source(640, 480);

    assert!(harness.wait_for_geometry(
        first.slot_name(),
        TileGeometry {
            x: 0,
            y: 120,
            width: 640,
            height: 480,
        }
    ));
    assert!(harness.wait_for_geometry(
        second.slot_name(),
        TileGeometry {
            x: 640,
            y: 120,
            width: 640,
            height: 480,
        }
    ));
}

#[test]
fn test_mute_sets_alpha() {
    if !init_test_environment() {
        return;
    }

    let harness = Harness::new(1280, 720);
    let (_elements, handle) = harness.add_source(640, 480);
    let pad = harness.compositor.static_pad(handle.slot_name()).unwrap();
    assert_eq!(pad.property::<f64>("alpha"), 1.0);

    harness.layouter.mute(&handle, true).unwrap();
    assert_eq!(pad.property::<f64>("alpha"), 0.0);

    harness.layouter.mute(&handle, false).unwrap();
    assert_eq!(pad.property::<f64>("alpha"), 1.0);
}

#[test]
fn test_slots_hold_last_frame() {
    if !init_test_environment() {
        return;
    }

    let harness = Harness::new(640, 360);
    let (_elements, handle) = harness.add_source(320, 180);
    let pad = harness.compositor.static_pad(handle.slot_name()).unwrap();

    if pad.find_property("max-last-buffer-repeat").is_some() {
        assert_eq!(pad.property::<u64>("max-last-buffer-repeat"), u64::MAX);
    }
}

#[test]
fn test_detach_releases_slot_once_idle() {
    if !init_test_environment() {
        return;
    }

    let harness = Harness::new(1280, 720);
    harness.play();
    let (elements, handle) = harness.add_source(640, 480);
    let slot_name = handle.slot_name().to_string();
    assert!(wait_until(|| harness.geometry(&slot_name).is_some()));

    let (sender, receiver) = mpsc::channel();
    harness
        .layouter
        .detach(handle, move |pad| {
            let _ = sender.send(pad);
        })
        .unwrap();
    assert_eq!(harness.layouter.source_count(), 0);

    let pad = receiver.recv_timeout(TIMEOUT).expect("endpoint was not handed back");
    assert!(pad.peer().is_none());
    assert!(harness.compositor.static_pad(&slot_name).is_none());

    for element in elements {
        element.set_state(gst::State::Null).unwrap();
        harness.pipeline.remove(&element).unwrap();
    }
}

#[test]
fn test_non_mixer_element_is_rejected() {
    if !init_test_environment() {
        return;
    }

    let sink = gst::ElementFactory::make("fakesink").build().unwrap();
    let err = CompositorRuntime::new(&sink, &LayoutConfig::default()).unwrap_err();
    assert!(matches!(err, LayoutError::MissingTemplate(_)));
}
