//! Cancellation Token Module
//!
//! Cooperative cancellation signal shared between an owner and the work it
//! started. Cancelling never interrupts anything by itself: the receiving side
//! has to check `is_cancelled()` or await `cancelled()` at its own checkpoints.

use std::sync::Arc;

use tokio::sync::watch;

// == Cancellation Token ==
/// Cloneable cancellation signal. All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    /// `true` once cancelled; never goes back to `false`
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    // == Constructor ==
    /// Creates a new, not yet cancelled token.
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    // == Cancel ==
    /// Signals cancellation to every clone. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    // == Is Cancelled ==
    /// Returns true if `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    // == Cancelled ==
    /// Resolves once the token is cancelled, immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
