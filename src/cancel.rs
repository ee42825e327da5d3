use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// What a front end needs to draw the blocking overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayState {
    pub active: bool,
    /// A cancel button should be offered.
    pub cancellable: bool,
}

struct ActiveOperation {
    id: Uuid,
    cancel: CancellationToken,
}

/// Single-slot registry of the one cancellable operation in flight.
///
/// [`begin`](Self::begin) hands out a fresh token for the operation and keeps
/// a clone for the UI's cancel hook. Only one operation may be registered at
/// a time; a second `begin` is rejected.
#[derive(Clone)]
pub struct CancellationCoordinator {
    slot: Arc<Mutex<Option<ActiveOperation>>>,
    overlay: Arc<watch::Sender<OverlayState>>,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(OverlayState::default());
        Self { slot: Arc::new(Mutex::new(None)), overlay: Arc::new(tx) }
    }

    /// Registers a new operation and raises the overlay.
    pub fn begin(&self) -> ClientResult<OperationGuard> {
        let mut slot = self.lock_slot();
        if slot.is_some() {
            return Err(ClientError::OperationInProgress);
        }
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        *slot = Some(ActiveOperation { id, cancel: cancel.clone() });
        drop(slot);

        self.overlay.send_replace(OverlayState { active: true, cancellable: true });
        tracing::debug!(%id, "cancellable operation started");
        Ok(OperationGuard { id, cancel, coordinator: self.clone(), released: false })
    }

    /// UI cancel hook: fires the active token and frees the slot.
    ///
    /// Returns `false` when nothing was running.
    pub fn cancel(&self) -> bool {
        let taken = self.lock_slot().take();
        match taken {
            Some(op) => {
                op.cancel.cancel();
                self.overlay.send_replace(OverlayState::default());
                tracing::info!(id = %op.id, "operation cancelled by user");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_slot().is_some()
    }

    pub fn overlay(&self) -> OverlayState {
        *self.overlay.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.overlay.subscribe()
    }

    /// Frees the slot if `id` still holds it. `false` means a cancel took
    /// the slot first.
    fn end(&self, id: Uuid) -> bool {
        let mut slot = self.lock_slot();
        if !slot.as_ref().is_some_and(|op| op.id == id) {
            return false;
        }
        *slot = None;
        drop(slot);
        self.overlay.send_replace(OverlayState::default());
        tracing::debug!(%id, "cancellable operation ended");
        true
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<ActiveOperation>> {
        // The slot holds plain data, a poisoned lock is still consistent
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CancellationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of a registered operation. Dropping it (or calling
/// [`end`](Self::end)) frees the coordinator slot.
pub struct OperationGuard {
    id: Uuid,
    cancel: CancellationToken,
    coordinator: CancellationCoordinator,
    released: bool,
}

impl OperationGuard {
    /// Token to pass into the cancellable operation.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Releases the slot. Returns `false` when the operation was cancelled
    /// before it could end; its result must then be discarded.
    #[must_use]
    pub fn end(mut self) -> bool {
        self.released = true;
        self.coordinator.end(self.id) && !self.cancel.is_cancelled()
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if !self.released {
            self.coordinator.end(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_end() {
        let coord = CancellationCoordinator::new();
        assert!(!coord.is_active());

        let guard = coord.begin().unwrap();
        assert!(coord.is_active());
        assert_eq!(coord.overlay(), OverlayState { active: true, cancellable: true });

        assert!(guard.end());
        assert!(!coord.is_active());
        assert_eq!(coord.overlay(), OverlayState::default());
    }

    #[test]
    fn test_end_after_cancel_reports_lost_slot() {
        let coord = CancellationCoordinator::new();
        let guard = coord.begin().unwrap();

        // Cancel lands after the operation finished but before it ended
        assert!(coord.cancel());
        assert!(!guard.end());
        assert!(!coord.is_active());

        // A later operation is not affected by the stale guard
        let next = coord.begin().unwrap();
        assert!(next.end());
    }

    #[test]
    fn test_second_begin_rejected() {
        let coord = CancellationCoordinator::new();
        let _guard = coord.begin().unwrap();
        assert!(matches!(coord.begin(), Err(ClientError::OperationInProgress)));
    }

    #[test]
    fn test_cancel_fires_token_and_frees_slot() {
        let coord = CancellationCoordinator::new();
        let guard = coord.begin().unwrap();
        let token = guard.token().clone();

        assert!(coord.cancel());
        assert!(token.is_cancelled());
        assert!(!coord.is_active());
        assert!(!coord.cancel());

        // A new operation can start while the cancelled guard is still alive,
        // and dropping the old guard must not clear it.
        let next = coord.begin().unwrap();
        drop(guard);
        assert!(coord.is_active());
        assert!(!next.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_overlay_subscription() {
        let coord = CancellationCoordinator::new();
        let mut rx = coord.subscribe();
        let guard = coord.begin().unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().active);
        drop(guard);
        rx.changed().await.unwrap();
        assert!(!rx.borrow().active);
    }
}
