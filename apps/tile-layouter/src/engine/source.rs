use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, trace};

use crate::layout::{Resolution, TileGeometry};
use crate::runtime::MixerRuntime;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identity of an attached stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Lifecycle of a source, from slot request to released resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Slot requested and linked, probes being set up.
    Attaching,
    /// Registered; visible or muted.
    Active,
    /// Out of the registry, waiting for the endpoint to go idle.
    Detaching,
    /// Unlinked and slot returned to the mixer.
    Released,
}

impl SourceState {
    fn can_become(self, next: SourceState) -> bool {
        use SourceState::*;

        matches!(
            (self, next),
            (Attaching, Active)
                | (Attaching, Detaching)
                | (Active, Detaching)
                | (Detaching, Released)
        )
    }
}

/// Caller's token for an attached source.
///
/// Not clonable: [`Layouter::detach`](super::Layouter::detach) consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceHandle {
    pub(crate) id: SourceId,
    pub(crate) slot_name: String,
}

impl SourceHandle {
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Name of the mixer slot the stream is linked to.
    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }
}

/// Point-in-time view of one registered source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    pub id: SourceId,
    pub slot_name: String,
    pub resolution: Option<Resolution>,
    pub muted: bool,
    pub visible: bool,
    pub state: SourceState,
    /// Last geometry written to the slot
    pub geometry: Option<TileGeometry>,
}

pub(crate) struct Source<R: MixerRuntime> {
    pub id: SourceId,
    pub endpoint: R::Endpoint,
    pub slot: R::Slot,
    pub slot_name: String,
    pub resolution: Option<Resolution>,
    pub muted: bool,
    pub state: SourceState,
    pub geometry: Option<TileGeometry>,
    /// Negotiation observer, removed on release
    pub watch: Option<R::Watch>,
}

impl<R: MixerRuntime> Source<R> {
    pub fn new(endpoint: R::Endpoint, slot: R::Slot, slot_name: String, muted: bool) -> Self {
        Self {
            id: SourceId::next(),
            endpoint,
            slot,
            slot_name,
            resolution: None,
            muted,
            state: SourceState::Attaching,
            geometry: None,
            watch: None,
        }
    }

    /// Sources of unknown size never take part in the layout.
    pub fn is_visible(&self) -> bool {
        self.resolution.is_some() && !self.muted
    }

    pub fn transition(&mut self, next: SourceState) {
        if !self.state.can_become(next) {
            error!(
                "{}: invalid state transition {:?} -> {:?}",
                self.id, self.state, next
            );
            return;
        }
        trace!("{}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    pub fn snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            id: self.id,
            slot_name: self.slot_name.clone(),
            resolution: self.resolution,
            muted: self.muted,
            visible: self.is_visible(),
            state: self.state,
            geometry: self.geometry,
        }
    }
}
