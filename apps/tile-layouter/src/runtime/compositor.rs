use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gst::prelude::*;
use parking_lot::Mutex;
use tracing::{debug, error};

use super::{IdleCallback, MixerRuntime, NegotiationHandler};
use crate::config::LayoutConfig;
use crate::layout::{Resolution, TileGeometry};
use crate::probe::{resolution_from_caps, ProbeOutcome};
use crate::{LayoutError, Result};

const MAX_LAST_BUFFER_REPEAT: &str = "max-last-buffer-repeat";

/// Caps probe installed by [`CompositorRuntime::watch_negotiation`].
#[derive(Debug)]
pub struct NegotiationWatch {
    id: gst::PadProbeId,
    removed: Arc<AtomicBool>,
}

/// [`MixerRuntime`] backed by a GStreamer `compositor` (or any element with the
/// same request pad properties).
#[derive(Debug, Clone)]
pub struct CompositorRuntime {
    compositor: gst::Element,
    template: gst::PadTemplate,
}

impl CompositorRuntime {
    pub fn new(compositor: &gst::Element, config: &LayoutConfig) -> Result<Self> {
        let template = compositor
            .pad_template(&config.slot_template)
            .ok_or_else(|| LayoutError::MissingTemplate(config.slot_template.clone()))?;

        if compositor.static_pad("src").is_none() {
            error!("Element {} has no src pad", compositor.name());
            return Err(LayoutError::MissingOutput);
        }

        Ok(Self {
            compositor: compositor.clone(),
            template,
        })
    }

    pub fn compositor(&self) -> &gst::Element {
        &self.compositor
    }
}

impl MixerRuntime for CompositorRuntime {
    type Endpoint = gst::Pad;
    type Slot = gst::Pad;
    type Watch = NegotiationWatch;

    fn output_endpoint(&self) -> Option<gst::Pad> {
        self.compositor.static_pad("src")
    }

    fn request_slot(&self, name: &str) -> Result<gst::Pad> {
        self.compositor
            .request_pad(&self.template, Some(name), None)
            .ok_or_else(|| LayoutError::SlotRequest(name.to_string()))
    }

    fn release_slot(&self, slot: &gst::Pad) {
        self.compositor.release_request_pad(slot);
    }

    fn slot_name(&self, slot: &gst::Pad) -> String {
        slot.name().to_string()
    }

    fn link(&self, endpoint: &gst::Pad, slot: &gst::Pad) -> Result<()> {
        endpoint
            .link(slot)
            .map(|_| ())
            .map_err(|err| LayoutError::Link {
                slot: slot.name().to_string(),
                reason: format!("{:?}", err),
            })
    }

    fn unlink(&self, endpoint: &gst::Pad, slot: &gst::Pad) -> Result<()> {
        endpoint.unlink(slot).map_err(|err| LayoutError::Unlink {
            slot: slot.name().to_string(),
            reason: err.to_string(),
        })
    }

    fn set_geometry(&self, slot: &gst::Pad, geometry: TileGeometry) {
        slot.set_properties(&[
            ("xpos", &geometry.x),
            ("ypos", &geometry.y),
            ("width", &geometry.width),
            ("height", &geometry.height),
        ]);
    }

    fn set_alpha(&self, slot: &gst::Pad, alpha: f64) {
        slot.set_property("alpha", alpha);
    }

    fn hold_last_frame(&self, slot: &gst::Pad) {
        // GST_CLOCK_TIME_NONE repeats the last frame forever
        if slot.find_property(MAX_LAST_BUFFER_REPEAT).is_some() {
            slot.set_property(MAX_LAST_BUFFER_REPEAT, u64::MAX);
        } else {
            debug!("{} has no {} property", slot.name(), MAX_LAST_BUFFER_REPEAT);
        }
    }

    fn current_resolution(&self, endpoint: &gst::Pad) -> Option<Resolution> {
        endpoint
            .current_caps()
            .and_then(|caps| resolution_from_caps(&caps))
    }

    fn watch_negotiation(
        &self,
        endpoint: &gst::Pad,
        handler: NegotiationHandler,
    ) -> Option<NegotiationWatch> {
        let removed = Arc::new(AtomicBool::new(false));
        let uninstalled = removed.clone();

        let id = endpoint.add_probe(gst::PadProbeType::EVENT_DOWNSTREAM, move |_pad, info| {
            let Some(gst::PadProbeData::Event(ref event)) = info.data else {
                return gst::PadProbeReturn::Ok;
            };
            let gst::EventView::Caps(caps) = event.view() else {
                return gst::PadProbeReturn::Ok;
            };

            match handler(resolution_from_caps(caps.caps())) {
                ProbeOutcome::Continue => gst::PadProbeReturn::Ok,
                ProbeOutcome::Uninstall => {
                    uninstalled.store(true, Ordering::SeqCst);
                    gst::PadProbeReturn::Remove
                }
            }
        })?;

        Some(NegotiationWatch { id, removed })
    }

    fn unwatch(&self, endpoint: &gst::Pad, watch: NegotiationWatch) {
        // removing an id gstreamer already dropped only warns, skip it
        if !watch.removed.swap(true, Ordering::SeqCst) {
            endpoint.remove_probe(watch.id);
        }
    }

    fn when_idle(&self, endpoint: &gst::Pad, callback: IdleCallback) {
        let callback = Mutex::new(Some(callback));
        endpoint.add_probe(gst::PadProbeType::IDLE, move |pad, _info| {
            match callback.lock().take() {
                Some(callback) => callback(),
                None => error!("Idle probe on {} delivered more than once", pad.name()),
            }
            gst::PadProbeReturn::Remove
        });
    }
}
