use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::TransferState;

/// Shared handle to one acquisition run.
///
/// Every caller that attaches to the same run gets a clone of the same handle.
/// Cancelling through any clone cancels the run.
#[derive(Clone)]
pub struct TransferHandle {
    inner: Arc<Inner>,
}

struct Inner {
    entry_id:   String,
    generation: u64,
    cancel:     CancellationToken,
    outcome:    watch::Sender<Option<TransferState>>,
}

impl TransferHandle {
    pub(crate) fn new(entry_id: impl Into<String>, generation: u64) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                entry_id: entry_id.into(),
                generation,
                cancel: CancellationToken::new(),
                outcome,
            }),
        }
    }

    pub fn entry_id(&self) -> &str { &self.inner.entry_id }

    pub(crate) fn generation(&self) -> u64 { self.inner.generation }

    pub(crate) fn token(&self) -> CancellationToken { self.inner.cancel.clone() }

    /// Request cooperative cancellation. The run stops at its next chunk boundary.
    pub fn cancel(&self) { self.inner.cancel.cancel(); }

    pub fn is_cancelled(&self) -> bool { self.inner.cancel.is_cancelled() }

    /// Whether the run has reached its terminal state.
    pub fn is_finished(&self) -> bool { self.inner.outcome.borrow().is_some() }

    /// Wait for the run to end and return the state it left the entry in:
    /// `Complete`, `Error`, or `Idle` after cancellation.
    pub async fn wait(&self) -> TransferState {
        let mut outcome = self.inner.outcome.subscribe();
        match outcome.wait_for(Option::is_some).await {
            Ok(state) => state.clone().unwrap_or_default(),
            // The sender lives in `inner`, which `self` keeps alive.
            Err(_) => TransferState::Idle,
        }
    }

    pub(crate) fn resolve(&self, state: TransferState) { self.inner.outcome.send_replace(Some(state)); }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferHandle")
            .field("entry_id", &self.inner.entry_id)
            .field("generation", &self.inner.generation)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
