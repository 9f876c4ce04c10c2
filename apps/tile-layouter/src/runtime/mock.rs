//! Recording runtime for engine tests.
//!
//! Negotiation handlers and idle callbacks are stored so tests can deliver
//! them from whatever thread they like, standing in for streaming threads.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{IdleCallback, MixerRuntime, NegotiationHandler};
use crate::layout::{Resolution, TileGeometry};
use crate::probe::ProbeOutcome;
use crate::{LayoutError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockPad(pub u32);

pub const OUTPUT: MockPad = MockPad(0);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Request(String),
    Release(String),
    Link(MockPad, String),
    Unlink(MockPad, String),
    Geometry(String, TileGeometry),
    Alpha(String, f64),
    HoldLastFrame(String),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    negotiated: HashMap<MockPad, Resolution>,
    handlers: HashMap<MockPad, Vec<(u64, NegotiationHandler)>>,
    next_watch: u64,
    idle: HashMap<MockPad, Vec<IdleCallback>>,
    requested: HashSet<String>,
}

#[derive(Default)]
pub struct MockRuntime {
    state: Mutex<State>,
    idle_immediately: bool,
    refuse_slots: bool,
    refuse_link: bool,
    refuse_unlink: bool,
    no_output: bool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs idle callbacks inside `when_idle`.
    pub fn idle_immediately() -> Self {
        Self {
            idle_immediately: true,
            ..Self::default()
        }
    }

    pub fn refusing_slots() -> Self {
        Self {
            refuse_slots: true,
            ..Self::default()
        }
    }

    pub fn refusing_link() -> Self {
        Self {
            refuse_link: true,
            ..Self::default()
        }
    }

    pub fn refusing_unlink() -> Self {
        Self {
            refuse_unlink: true,
            ..Self::default()
        }
    }

    pub fn without_output() -> Self {
        Self {
            no_output: true,
            ..Self::default()
        }
    }

    /// Pretends `pad` negotiated before anyone watched it.
    pub fn preset_resolution(&self, pad: MockPad, resolution: Resolution) {
        self.state.lock().negotiated.insert(pad, resolution);
    }

    /// Delivers a negotiation event to the handlers installed on `pad`.
    pub fn negotiate(&self, pad: MockPad, resolution: Option<Resolution>) {
        let handlers = {
            let mut state = self.state.lock();
            if let Some(resolution) = resolution {
                state.negotiated.insert(pad, resolution);
            }
            state.handlers.remove(&pad).unwrap_or_default()
        };

        // handlers run without the mock lock, like on a streaming thread
        let kept: Vec<_> = handlers
            .into_iter()
            .filter(|(_, handler)| handler(resolution) == ProbeOutcome::Continue)
            .collect();

        self.state
            .lock()
            .handlers
            .entry(pad)
            .or_default()
            .extend(kept);
    }

    /// Marks `pad` idle, running pending idle callbacks once.
    pub fn go_idle(&self, pad: MockPad) {
        let callbacks = self.state.lock().idle.remove(&pad).unwrap_or_default();
        for callback in callbacks {
            callback();
        }
    }

    pub fn watchers(&self, pad: MockPad) -> usize {
        self.state.lock().handlers.get(&pad).map_or(0, Vec::len)
    }

    pub fn pending_idle(&self, pad: MockPad) -> usize {
        self.state.lock().idle.get(&pad).map_or(0, Vec::len)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().calls)
    }

    /// Geometry writes since the last `take_calls`, in write order.
    pub fn take_geometry(&self) -> Vec<(String, TileGeometry)> {
        self.take_calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Geometry(slot, geometry) => Some((slot, geometry)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

impl MixerRuntime for MockRuntime {
    type Endpoint = MockPad;
    type Slot = String;
    type Watch = u64;

    fn output_endpoint(&self) -> Option<MockPad> {
        (!self.no_output).then_some(OUTPUT)
    }

    fn request_slot(&self, name: &str) -> Result<String> {
        if self.refuse_slots {
            return Err(LayoutError::SlotRequest(name.to_string()));
        }
        let mut state = self.state.lock();
        assert!(state.requested.insert(name.to_string()), "duplicate slot {name}");
        state.calls.push(Call::Request(name.to_string()));
        Ok(name.to_string())
    }

    fn release_slot(&self, slot: &String) {
        let mut state = self.state.lock();
        assert!(state.requested.remove(slot), "release of unknown slot {slot}");
        state.calls.push(Call::Release(slot.clone()));
    }

    fn slot_name(&self, slot: &String) -> String {
        slot.clone()
    }

    fn link(&self, endpoint: &MockPad, slot: &String) -> Result<()> {
        if self.refuse_link {
            return Err(LayoutError::Link {
                slot: slot.clone(),
                reason: "refused".to_string(),
            });
        }
        self.record(Call::Link(*endpoint, slot.clone()));
        Ok(())
    }

    fn unlink(&self, endpoint: &MockPad, slot: &String) -> Result<()> {
        if self.refuse_unlink {
            return Err(LayoutError::Unlink {
                slot: slot.clone(),
                reason: "refused".to_string(),
            });
        }
        self.record(Call::Unlink(*endpoint, slot.clone()));
        Ok(())
    }

    fn set_geometry(&self, slot: &String, geometry: TileGeometry) {
        self.record(Call::Geometry(slot.clone(), geometry));
    }

    fn set_alpha(&self, slot: &String, alpha: f64) {
        self.record(Call::Alpha(slot.clone(), alpha));
    }

    fn hold_last_frame(&self, slot: &String) {
        self.record(Call::HoldLastFrame(slot.clone()));
    }

    fn current_resolution(&self, endpoint: &MockPad) -> Option<Resolution> {
        self.state.lock().negotiated.get(endpoint).copied()
    }

    fn watch_negotiation(&self, endpoint: &MockPad, handler: NegotiationHandler) -> Option<u64> {
        let mut state = self.state.lock();
        state.next_watch += 1;
        let watch = state.next_watch;
        state
            .handlers
            .entry(*endpoint)
            .or_default()
            .push((watch, handler));
        Some(watch)
    }

    fn unwatch(&self, endpoint: &MockPad, watch: u64) {
        if let Some(handlers) = self.state.lock().handlers.get_mut(endpoint) {
            handlers.retain(|(id, _)| *id != watch);
        }
    }

    fn when_idle(&self, endpoint: &MockPad, callback: IdleCallback) {
        if self.idle_immediately {
            callback();
            return;
        }
        self.state
            .lock()
            .idle
            .entry(*endpoint)
            .or_default()
            .push(callback);
    }
}
