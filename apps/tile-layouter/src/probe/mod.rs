//! Resolution probe adapter.
//!
//! Turns format-negotiation events observed on an endpoint into resolution
//! updates for an owner, and decides whether the observer stays installed.

use tracing::debug;

use crate::layout::Resolution;
use crate::runtime::{MixerRuntime, NegotiationHandler};

/// What an endpoint observer wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Keep observing future negotiations.
    Continue,
    /// Remove the observer from the endpoint.
    Uninstall,
}

/// Extracts the first integer `width`/`height` pair found in any structure
/// of `caps`.
pub fn resolution_from_caps(caps: &gst::CapsRef) -> Option<Resolution> {
    caps.iter().find_map(|s| {
        let width = s.get::<i32>("width").ok()?;
        let height = s.get::<i32>("height").ok()?;
        (width > 0 && height > 0).then_some(Resolution::new(width, height))
    })
}

/// Observes every negotiation on an endpoint and forwards parsed sizes.
pub struct ResolutionProbe;

impl ResolutionProbe {
    /// Wraps `on_resolution` so an unparsable negotiation uninstalls the probe
    /// and a parsed one is forwarded, the owner deciding whether to continue.
    pub fn handler<F>(label: String, on_resolution: F) -> NegotiationHandler
    where
        F: Fn(Resolution) -> ProbeOutcome + Send + Sync + 'static,
    {
        Box::new(move |resolution| match resolution {
            Some(resolution) => on_resolution(resolution),
            None => {
                debug!("{}: negotiated format has no size, removing probe", label);
                ProbeOutcome::Uninstall
            }
        })
    }

    /// Installs the probe on `endpoint` of `runtime`.
    pub fn install<R, F>(
        runtime: &R,
        endpoint: &R::Endpoint,
        label: String,
        on_resolution: F,
    ) -> Option<R::Watch>
    where
        R: MixerRuntime,
        F: Fn(Resolution) -> ProbeOutcome + Send + Sync + 'static,
    {
        runtime.watch_negotiation(endpoint, Self::handler(label, on_resolution))
    }
}
