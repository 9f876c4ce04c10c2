use std::sync::Arc;

use tracing::{error, info};

use super::source::{Source, SourceState};
use crate::runtime::MixerRuntime;

pub(crate) type DisposeCallback<E> = Box<dyn FnOnce(E) + Send>;

/// Second phase of a detach, handed to the runtime's idle notification.
///
/// Owns the source from registry removal until its resources are released.
pub(crate) struct Teardown<R: MixerRuntime> {
    runtime: Arc<R>,
    source: Source<R>,
    on_removed: DisposeCallback<R::Endpoint>,
}

impl<R: MixerRuntime> Teardown<R> {
    pub fn new(
        runtime: Arc<R>,
        source: Source<R>,
        on_removed: DisposeCallback<R::Endpoint>,
    ) -> Self {
        Self {
            runtime,
            source,
            on_removed,
        }
    }

    /// Unlinks and releases the slot, then hands the endpoint back.
    ///
    /// Must only run while no frame is in flight on the endpoint.
    pub fn complete(self) {
        let Teardown {
            runtime,
            mut source,
            on_removed,
        } = self;

        if let Err(err) = runtime.unlink(&source.endpoint, &source.slot) {
            // still linked: neither the slot nor the endpoint may be freed
            error!("{}: {}", source.id, err);
            return;
        }
        if let Some(watch) = source.watch.take() {
            runtime.unwatch(&source.endpoint, watch);
        }
        runtime.release_slot(&source.slot);
        source.transition(SourceState::Released);

        info!("{}: released {}", source.id, source.slot_name);
        on_removed(source.endpoint);
    }
}
