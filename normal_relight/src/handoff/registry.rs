use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::RequestId;
use crate::error::{Error, Result};

/// Which callback woke the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Delivered,
    Cancelled,
}

/// Per-request state: the payload slot and the one-time wake-up.
struct Slot {
    payload: Mutex<Option<String>>,
    signal: Mutex<Option<oneshot::Sender<Signal>>>,
}

impl Slot {
    /// Fires the wake-up. Returns false if it was already fired.
    fn fire(&self, signal: Signal) -> bool {
        match self.signal.lock().take() {
            Some(tx) => tx.send(signal).is_ok(),
            None => false,
        }
    }
}

/// Outstanding interactive requests, keyed by id.
#[derive(Default)]
pub struct HandoffRegistry {
    slots: Mutex<HashMap<RequestId, Arc<Slot>>>,
}

impl HandoffRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` and returns the ticket that owns the entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRequest`] if `id` is already outstanding.
    pub fn open(self: &Arc<Self>, id: RequestId) -> Result<HandoffTicket> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Slot {
            payload: Mutex::new(None),
            signal: Mutex::new(Some(tx)),
        });

        {
            let mut slots = self.slots.lock();
            if slots.contains_key(&id) {
                return Err(Error::DuplicateRequest { id: id.to_string() });
            }
            slots.insert(id.clone(), Arc::clone(&slot));
        }

        Ok(HandoffTicket {
            registry: Arc::clone(self),
            id,
            slot,
            signal: Some(rx),
        })
    }

    /// Stores the editor's result for `id` and wakes its worker.
    ///
    /// A second delivery before the worker reads the slot replaces the first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequest`] if nothing is waiting on `id`; the
    /// registry is left untouched.
    pub fn deliver(&self, id: &RequestId, payload: String) -> Result<()> {
        let slot = self.slot(id)?;
        *slot.payload.lock() = Some(payload);
        if !slot.fire(Signal::Delivered) {
            tracing::debug!("request {id} was already signalled, payload replaced");
        }
        Ok(())
    }

    /// Wakes the worker for `id` without a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequest`] if nothing is waiting on `id`.
    pub fn cancel(&self, id: &RequestId) -> Result<()> {
        let slot = self.slot(id)?;
        if !slot.fire(Signal::Cancelled) {
            tracing::debug!("request {id} was already signalled, cancel ignored");
        }
        Ok(())
    }

    /// Cancels every outstanding request. Returns how many workers were woken.
    pub fn cancel_all(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self.slots.lock().values().cloned().collect();
        slots
            .iter()
            .filter(|slot| slot.fire(Signal::Cancelled))
            .count()
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.slots.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    fn slot(&self, id: &RequestId) -> Result<Arc<Slot>> {
        self.slots
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownRequest { id: id.to_string() })
    }

    /// Removes `id` only if it still maps to `slot`.
    fn release(&self, id: &RequestId, slot: &Arc<Slot>) {
        let mut slots = self.slots.lock();
        if slots.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(id);
        }
    }
}

/// What the worker found after waking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The editor posted an encoded image.
    Delivered(String),
    /// Cancelled, or woken with nothing in the slot.
    Cancelled,
}

/// Ownership of one registry entry. Dropping the ticket removes the entry.
pub struct HandoffTicket {
    registry: Arc<HandoffRegistry>,
    id: RequestId,
    slot: Arc<Slot>,
    signal: Option<oneshot::Receiver<Signal>>,
}

impl HandoffTicket {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Blocks the current thread until the request is signalled.
    ///
    /// Must not be called from inside an async runtime; use [`Self::wait`].
    pub fn wait_blocking(&mut self) -> Resolution {
        let signal = self.signal.take().and_then(|rx| rx.blocking_recv().ok());
        self.resolve(signal)
    }

    /// Waits for the request to be signalled without blocking a thread.
    pub async fn wait(&mut self) -> Resolution {
        let signal = match self.signal.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        };
        self.resolve(signal)
    }

    fn resolve(&self, signal: Option<Signal>) -> Resolution {
        match signal {
            Some(signal) => tracing::debug!("request {} woke on {signal:?}", self.id),
            None => tracing::debug!("request {} woke without a signal", self.id),
        }
        match self.slot.payload.lock().take() {
            Some(payload) => Resolution::Delivered(payload),
            None => Resolution::Cancelled,
        }
    }
}

impl Drop for HandoffTicket {
    fn drop(&mut self) {
        tracing::debug!("releasing request {}", self.id);
        self.registry.release(&self.id, &self.slot);
    }
}
