//! Source registry and layout reactor.
//!
//! A [`Layouter`] owns every source attached to one mixer. Membership and size
//! changes, whether they come from the caller or from runtime threads, are
//! serialized by a single registry lock, and each of them recomputes the grid
//! and writes per-slot geometry while that lock is held.
//!
//! Detaching is two-phase: the source leaves the registry (and the layout)
//! immediately, while unlinking and releasing its slot waits for the runtime
//! to report the endpoint idle. The caller learns about the second phase
//! through the disposal callback or [`Layouter::detach_future`].

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use futures::channel::oneshot;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::LayoutConfig;
use crate::layout::{self, Resolution, Size};
use crate::probe::{ProbeOutcome, ResolutionProbe};
use crate::runtime::MixerRuntime;
use crate::{LayoutError, Result};

mod source;
mod teardown;


pub use source::{SourceHandle, SourceId, SourceSnapshot, SourceState};

use source::Source;
use teardown::Teardown;

fn alpha_for(muted: bool) -> f64 {
    if muted {
        0.0
    } else {
        1.0
    }
}

struct Registry<R: MixerRuntime> {
    canvas: Size,
    /// Insertion order is the cell assignment order.
    sources: Vec<Source<R>>,
}

impl<R: MixerRuntime> Registry<R> {
    fn position(&self, id: SourceId) -> Option<usize> {
        self.sources.iter().position(|s| s.id == id)
    }

    fn find_mut(&mut self, id: SourceId) -> Option<&mut Source<R>> {
        self.sources.iter_mut().find(|s| s.id == id)
    }
}

struct Inner<R: MixerRuntime> {
    runtime: Arc<R>,
    config: LayoutConfig,
    registry: Mutex<Registry<R>>,
    id_serial: AtomicU32,
}

impl<R: MixerRuntime> Inner<R> {
    fn set_canvas(&self, resolution: Resolution) {
        let mut registry = self.registry.lock();
        registry.canvas = Size::new(resolution.width, resolution.height);
        debug!("output: size=({},{})", resolution.width, resolution.height);
        self.relayout_locked(&mut registry);
    }

    fn set_source_resolution(&self, id: SourceId, resolution: Resolution) -> ProbeOutcome {
        let mut registry = self.registry.lock();
        let Some(source) = registry.find_mut(id) else {
            debug!("{} is no longer attached, removing probe", id);
            return ProbeOutcome::Uninstall;
        };

        source.resolution = Some(resolution);
        let muted = source.muted;
        debug!("{}: size=({},{})", id, resolution.width, resolution.height);

        if !muted {
            self.relayout_locked(&mut registry);
        }
        ProbeOutcome::Continue
    }

    fn relayout_locked(&self, registry: &mut Registry<R>) {
        let canvas = registry.canvas;
        let mut visible: Vec<&mut Source<R>> = registry
            .sources
            .iter_mut()
            .filter(|s| s.is_visible())
            .collect();
        let sizes: Vec<Resolution> = visible.iter().filter_map(|s| s.resolution).collect();

        let Some(plan) = layout::plan(canvas, &sizes) else {
            trace!("No visible sources, keeping previous layout");
            return;
        };

        debug!(
            "Layout of {} sources on {} canvas: {}x{} grid",
            sizes.len(),
            canvas,
            plan.shape.rows,
            plan.shape.columns
        );

        for (source, geometry) in visible.iter_mut().zip(plan.tiles) {
            self.runtime.set_geometry(&source.slot, geometry);
            source.geometry = Some(geometry);
            debug!("{}: layout at {}", source.slot_name, geometry);
        }
    }
}

/// Arranges the inputs of one mixer in a grid and manages their lifecycle.
pub struct Layouter<R: MixerRuntime> {
    inner: Arc<Inner<R>>,
}

impl<R: MixerRuntime> Clone for Layouter<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: MixerRuntime> Layouter<R> {
    /// Creates the layouter and starts following the mixer's output size.
    pub fn new(runtime: R, config: LayoutConfig) -> Result<Self> {
        config.validate().map_err(LayoutError::Config)?;

        let output = runtime.output_endpoint().ok_or_else(|| {
            error!("Mixer does not have an output endpoint");
            LayoutError::MissingOutput
        })?;

        let inner = Arc::new(Inner {
            runtime: Arc::new(runtime),
            registry: Mutex::new(Registry {
                canvas: config.fallback_size(),
                sources: Vec::new(),
            }),
            config,
            id_serial: AtomicU32::new(0),
        });

        let weak: Weak<Inner<R>> = Arc::downgrade(&inner);
        ResolutionProbe::install(&*inner.runtime, &output, "output".to_string(), move |resolution| {
            let Some(inner) = weak.upgrade() else {
                return ProbeOutcome::Uninstall;
            };
            inner.set_canvas(resolution);
            ProbeOutcome::Continue
        });

        Ok(Self { inner })
    }

    pub fn runtime(&self) -> &R {
        &self.inner.runtime
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.inner.config
    }

    /// Current canvas size, the configured fallback until the output negotiates.
    pub fn output_size(&self) -> Size {
        self.inner.registry.lock().canvas
    }

    pub fn source_count(&self) -> usize {
        self.inner.registry.lock().sources.len()
    }

    /// Registered sources in cell assignment order.
    pub fn snapshot(&self) -> Vec<SourceSnapshot> {
        self.inner
            .registry
            .lock()
            .sources
            .iter()
            .map(Source::snapshot)
            .collect()
    }

    /// Links `endpoint` to a new mixer slot and registers it.
    ///
    /// The source joins the layout as soon as its size is known, immediately
    /// if the endpoint has already negotiated. A refused slot or link aborts
    /// the attach.
    pub fn attach(&self, endpoint: R::Endpoint, muted: bool) -> Result<SourceHandle> {
        let inner = &self.inner;
        let runtime = &inner.runtime;

        let serial = inner.id_serial.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}{}", inner.config.slot_prefix, serial);

        let slot = runtime.request_slot(&name).map_err(|err| {
            error!("Failed to request slot {}: {}", name, err);
            err
        })?;
        let slot_name = runtime.slot_name(&slot);

        if inner.config.hold_last_frame {
            runtime.hold_last_frame(&slot);
        }
        runtime.set_alpha(&slot, alpha_for(muted));

        if let Err(err) = runtime.link(&endpoint, &slot) {
            error!("{}", err);
            runtime.release_slot(&slot);
            return Err(err);
        }

        let source = Source::new(endpoint.clone(), slot, slot_name.clone(), muted);
        let id = source.id;
        inner.registry.lock().sources.push(source);
        info!("{}: attached to {} (muted: {})", id, slot_name, muted);

        // watch before reading the current caps so no negotiation is missed
        let weak = Arc::downgrade(inner);
        let on_resolution = move |resolution| match weak.upgrade() {
            Some(inner) => inner.set_source_resolution(id, resolution),
            None => ProbeOutcome::Uninstall,
        };
        let watch = ResolutionProbe::install(&**runtime, &endpoint, id.to_string(), on_resolution);
        if watch.is_none() {
            warn!("{}: endpoint refused the negotiation probe", id);
        }
        if let Some(resolution) = runtime.current_resolution(&endpoint) {
            inner.set_source_resolution(id, resolution);
        }

        if let Some(source) = inner.registry.lock().find_mut(id) {
            source.watch = watch;
            source.transition(SourceState::Active);
        }

        Ok(SourceHandle { id, slot_name })
    }

    /// Hides or shows a source without detaching it.
    pub fn mute(&self, handle: &SourceHandle, muted: bool) -> Result<()> {
        let mut registry = self.inner.registry.lock();
        let source = registry
            .find_mut(handle.id)
            .ok_or(LayoutError::UnknownSource(handle.id))?;

        self.inner.runtime.set_alpha(&source.slot, alpha_for(muted));
        source.muted = muted;
        let sized = source.resolution.is_some();
        debug!("{}: muted={}", handle.id, muted);

        if sized {
            self.inner.relayout_locked(&mut registry);
        }
        Ok(())
    }

    /// Removes a source from the layout now and releases it once idle.
    ///
    /// Returns without waiting. `on_removed` receives the unlinked endpoint on
    /// the runtime thread that reported idleness; only then may the producer
    /// be disposed of.
    ///
    /// If the endpoint cannot be unlinked once idle, the slot is kept, an error
    /// is logged and `on_removed` is dropped without being called. Callers that
    /// need to observe that outcome should use
    /// [`detach_future`](Self::detach_future), which then resolves to `None`.
    pub fn detach<F>(&self, handle: SourceHandle, on_removed: F) -> Result<()>
    where
        F: FnOnce(R::Endpoint) + Send + 'static,
    {
        let source = {
            let mut registry = self.inner.registry.lock();
            let index = registry
                .position(handle.id)
                .ok_or(LayoutError::UnknownSource(handle.id))?;

            let mut source = registry.sources.remove(index);
            source.transition(SourceState::Detaching);
            if source.is_visible() {
                self.inner.relayout_locked(&mut registry);
            }
            source
        };

        info!("{}: detaching from {}, waiting for idle", source.id, source.slot_name);

        // the runtime may run the idle callback right here, so unlocked
        let endpoint = source.endpoint.clone();
        let teardown = Teardown::new(self.inner.runtime.clone(), source, Box::new(on_removed));
        self.inner
            .runtime
            .when_idle(&endpoint, Box::new(move || teardown.complete()));

        Ok(())
    }

    /// Like [`detach`](Self::detach), resolving to the released endpoint.
    ///
    /// Resolves to `None` if the teardown was abandoned because the endpoint
    /// could not be unlinked.
    pub fn detach_future(
        &self,
        handle: SourceHandle,
    ) -> Result<impl Future<Output = Option<R::Endpoint>> + Send + 'static> {
        let (sender, receiver) = oneshot::channel();
        self.detach(handle, move |endpoint| {
            let _ = sender.send(endpoint);
        })?;
        Ok(receiver.map(|result| result.ok()))
    }

    /// Recomputes and writes the geometry of all visible sources.
    pub fn relayout(&self) {
        let mut registry = self.inner.registry.lock();
        self.inner.relayout_locked(&mut registry);
    }
}
