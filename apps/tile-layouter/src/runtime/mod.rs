//! Capabilities the layouter consumes from the pipeline runtime.

use std::fmt;

use crate::layout::{Resolution, TileGeometry};
use crate::probe::ProbeOutcome;
use crate::Result;

mod compositor;
#[cfg(test)]
pub(crate) mod mock;

pub use compositor::{CompositorRuntime, NegotiationWatch};

/// Observer for format negotiations on one endpoint.
///
/// Receives the parsed size, `None` when the negotiated format carries none.
pub type NegotiationHandler = Box<dyn Fn(Option<Resolution>) -> ProbeOutcome + Send + Sync>;

/// Continuation run once an endpoint has no data in flight.
pub type IdleCallback = Box<dyn FnOnce() + Send>;

/// A mixer element together with the pipeline operations the layouter needs.
///
/// Negotiation handlers and idle callbacks may run on any runtime thread and
/// may run before the installing call returns.
pub trait MixerRuntime: Send + Sync + 'static {
    /// A connection point through which one stream flows.
    type Endpoint: Clone + fmt::Debug + Send + Sync + 'static;
    /// An input slot allocated by the mixer.
    type Slot: Clone + fmt::Debug + Send + Sync + 'static;
    /// Token of an installed negotiation observer.
    type Watch: Send + Sync + 'static;

    /// The mixer's own output endpoint.
    fn output_endpoint(&self) -> Option<Self::Endpoint>;

    fn request_slot(&self, name: &str) -> Result<Self::Slot>;
    fn release_slot(&self, slot: &Self::Slot);
    fn slot_name(&self, slot: &Self::Slot) -> String;

    fn link(&self, endpoint: &Self::Endpoint, slot: &Self::Slot) -> Result<()>;
    fn unlink(&self, endpoint: &Self::Endpoint, slot: &Self::Slot) -> Result<()>;

    fn set_geometry(&self, slot: &Self::Slot, geometry: TileGeometry);
    fn set_alpha(&self, slot: &Self::Slot, alpha: f64);
    /// Keep showing the last frame when the producer stalls.
    fn hold_last_frame(&self, slot: &Self::Slot);

    /// Size of the currently negotiated format, if any.
    fn current_resolution(&self, endpoint: &Self::Endpoint) -> Option<Resolution>;

    /// Installs `handler`, returning `None` if the endpoint refused it.
    fn watch_negotiation(
        &self,
        endpoint: &Self::Endpoint,
        handler: NegotiationHandler,
    ) -> Option<Self::Watch>;

    /// Removes an observer, a no-op if it already uninstalled itself.
    fn unwatch(&self, endpoint: &Self::Endpoint, watch: Self::Watch);

    /// Runs `callback` exactly once when `endpoint` is idle.
    fn when_idle(&self, endpoint: &Self::Endpoint, callback: IdleCallback);
}
