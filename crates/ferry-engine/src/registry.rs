//! Per-entry state map and the map of active runs.
//!
//! Both maps change under one lock, and every change is published while that
//! lock is held, so subscribers see the changes for an entry in the order they
//! were made. A run's handle is removed in the same step that records its
//! terminal state.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use crate::{Snapshot, StateEvent, TransferHandle, TransferState};

/// Result of trying to claim an entry for a new run.
#[derive(Debug)]
pub(crate) enum Claim {
    /// A new run was registered; the caller must drive it and then `finish` it.
    Claimed(TransferHandle),
    /// A live run already owns the entry.
    Attached(TransferHandle),
    /// A cancelled run has not released the staging file yet.
    Draining(TransferHandle),
}

pub(crate) struct Registry {
    inner:  Mutex<Inner>,
    states: watch::Sender<Snapshot>,
    events: broadcast::Sender<StateEvent>,
}

#[derive(Default)]
struct Inner {
    runs:            HashMap<String, TransferHandle>,
    next_generation: u64,
}

impl Registry {
    pub fn new(event_capacity: usize) -> Self {
        let (states, _) = watch::channel(Snapshot::new());
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Mutex::new(Inner::default()),
            states,
            events,
        }
    }

    /// Atomically claim `id` unless a run already owns it.
    pub fn claim(&self, id: &str) -> Claim {
        let mut inner = self.inner.lock();
        if let Some(run) = inner.runs.get(id) {
            return if run.is_cancelled() {
                Claim::Draining(run.clone())
            } else {
                Claim::Attached(run.clone())
            };
        }

        inner.next_generation += 1;
        let handle = TransferHandle::new(id, inner.next_generation);
        inner.runs.insert(id.to_string(), handle.clone());
        Claim::Claimed(handle)
    }

    /// Record a non-terminal state for the run identified by `generation`.
    ///
    /// Returns false, changing nothing, when that run no longer owns the entry.
    pub fn update(&self, id: &str, generation: u64, state: TransferState) -> bool {
        let inner = self.inner.lock();
        if !owns(&inner, id, generation) {
            trace!(entry = id, generation, "dropping update from a superseded run");
            return false;
        }
        self.publish(id, state);
        true
    }

    /// Record the terminal state of a run and release its claim.
    pub fn finish(&self, id: &str, generation: u64, state: TransferState) -> bool {
        let mut inner = self.inner.lock();
        if !owns(&inner, id, generation) {
            return false;
        }
        let Some(handle) = inner.runs.remove(id) else {
            return false;
        };
        self.publish(id, state.clone());
        handle.resolve(state);
        true
    }

    /// Set the state of an entry that has no active run.
    pub fn set_unclaimed(&self, id: &str, state: TransferState) -> bool {
        let inner = self.inner.lock();
        if inner.runs.contains_key(id) {
            return false;
        }
        self.publish(id, state);
        true
    }

    pub fn active(&self, id: &str) -> Option<TransferHandle> { self.inner.lock().runs.get(id).cloned() }

    pub fn active_runs(&self) -> Vec<TransferHandle> { self.inner.lock().runs.values().cloned().collect() }

    pub fn state(&self, id: &str) -> Option<TransferState> { self.states.borrow().get(id).cloned() }

    pub fn snapshot(&self) -> Snapshot { self.states.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> { self.states.subscribe() }

    pub fn events(&self) -> broadcast::Receiver<StateEvent> { self.events.subscribe() }

    fn publish(&self, id: &str, state: TransferState) {
        self.states.send_modify(|snapshot| {
            snapshot.insert(id.to_string(), state.clone());
        });
        if self
            .events
            .send(StateEvent {
                entry_id: id.to_string(),
                state,
            })
            .is_err()
        {
            trace!("no receivers for state events");
        }
    }
}

fn owns(inner: &Inner, id: &str, generation: u64) -> bool {
    inner.runs.get(id).is_some_and(|run| run.generation() == generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimed(claim: Claim) -> TransferHandle {
        match claim {
            Claim::Claimed(handle) => handle,
            other => panic!("expected a fresh claim, got {other:?}"),
        }
    }

    #[test]
    fn test_claim_is_exclusive() {
        let registry = Registry::new(16);
        let first = claimed(registry.claim("m"));

        match registry.claim("m") {
            Claim::Attached(handle) => assert_eq!(handle.generation(), first.generation()),
            other => panic!("expected to attach, got {other:?}"),
        }

        // Other ids are independent.
        claimed(registry.claim("other"));
    }

    #[test]
    fn test_cancelled_run_is_draining() {
        let registry = Registry::new(16);
        let run = claimed(registry.claim("m"));
        run.cancel();

        assert!(matches!(registry.claim("m"), Claim::Draining(_)));

        assert!(registry.finish("m", run.generation(), TransferState::Idle));
        let next = claimed(registry.claim("m"));
        assert!(next.generation() > run.generation());
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let registry = Registry::new(16);
        let old = claimed(registry.claim("m"));
        registry.finish("m", old.generation(), TransferState::Idle);
        let new = claimed(registry.claim("m"));

        assert!(!registry.update("m", old.generation(), TransferState::downloading(1, None)));
        assert!(!registry.finish("m", old.generation(), TransferState::Error {
            message: "late".into(),
        }));
        assert!(registry.update("m", new.generation(), TransferState::Verifying));
        assert_eq!(registry.state("m"), Some(TransferState::Verifying));
    }

    #[test]
    fn test_finish_clears_run_and_resolves_handle() {
        let registry = Registry::new(16);
        let run = claimed(registry.claim("m"));
        registry.update("m", run.generation(), TransferState::downloading(10, Some(10)));

        let done = TransferState::Error {
            message: "server responded with HTTP 500".into(),
        };
        assert!(registry.finish("m", run.generation(), done.clone()));
        assert!(registry.active("m").is_none());
        assert!(run.is_finished());
        assert_eq!(registry.state("m"), Some(done));
    }

    #[test]
    fn test_events_are_ordered() {
        let registry = Registry::new(16);
        let mut events = registry.events();
        let run = claimed(registry.claim("m"));

        registry.update("m", run.generation(), TransferState::downloading(1, Some(2)));
        registry.update("m", run.generation(), TransferState::downloading(2, Some(2)));
        registry.update("m", run.generation(), TransferState::Verifying);
        registry.finish("m", run.generation(), TransferState::Idle);

        let names: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.state.name())
            .collect();
        assert_eq!(names, ["downloading", "downloading", "verifying", "idle"]);
    }

    #[test]
    fn test_set_unclaimed_refuses_active_entry() {
        let registry = Registry::new(16);
        assert!(registry.set_unclaimed("a", TransferState::Idle));

        claimed(registry.claim("b"));
        assert!(!registry.set_unclaimed("b", TransferState::Idle));
        assert_eq!(registry.snapshot().len(), 1);
    }
}
