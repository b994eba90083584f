//! Inbound frame fan-out.
//!
//! Subscribers register a callback and hold the returned guard for as
//! long as they want deliveries; dropping the guard deregisters.
//! Dispatch iterates a snapshot of the registry taken outside the lock,
//! so a callback may itself register or deregister listeners without
//! deadlocking. Registry changes take effect from the next frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use parley_shared::protocol::InboundFrame;

type Callback = Arc<dyn Fn(&InboundFrame) + Send + Sync + 'static>;

/// Listener registry shared between the connection task and its handles.
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    entries: Arc<Mutex<Vec<(u64, Callback)>>>,
    next_id: Arc<AtomicU64>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every parsed inbound frame.
    pub(crate) fn add(
        &self,
        callback: impl Fn(&InboundFrame) + Send + Sync + 'static,
    ) -> ListenerGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_entries().push((id, Arc::new(callback)));
        ListenerGuard {
            id,
            registry: self.clone(),
        }
    }

    /// Deliver one frame to every registered listener.
    pub(crate) fn dispatch(&self, frame: &InboundFrame) {
        let snapshot: Vec<Callback> = self
            .lock_entries()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in snapshot {
            callback(frame);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock_entries().len()
    }

    fn remove(&self, id: u64) {
        self.lock_entries().retain(|(entry_id, _)| *entry_id != id);
    }

    // A panicking subscriber poisons the mutex; fan-out to the others
    // must survive that.
    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Callback)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deregistration handle returned by listener registration. The listener
/// stays active until this guard is dropped.
pub struct ListenerGuard {
    id: u64,
    registry: ListenerRegistry,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard").field("id", &self.id).finish()
    }
}
