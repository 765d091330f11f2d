// THEORY:
// The handoff lets a pipeline worker delegate a relight to a human. The worker
// publishes a preview, parks, and resumes when an editor posts a result or a
// cancellation through the inbound callbacks.
//
// Key architectural principles:
// 1.  **Injected state**: the `HandoffRegistry` is an ordinary value shared by
//     `Arc` between the bridge and the callback handlers. Nothing is global.
// 2.  **One signal per request**: each outstanding request owns a oneshot
//     channel. The handler writes the payload first and fires the signal
//     second, so whatever the worker reads on waking is already in place.
// 3.  **No lock across the wait**: the registry map is locked only long enough
//     to look a slot up. The worker waits on its own receiver, never on a lock.
// 4.  **Scoped cleanup**: a `HandoffTicket` owns the registry entry and removes
//     it on drop, so the entry disappears on every exit path.

mod bridge;
mod registry;

pub use bridge::HandoffBridge;
pub use registry::{HandoffRegistry, HandoffTicket, Resolution};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque host-supplied token tying a notice, a registry entry and a callback
/// together. Hosts hand out either strings or integers; both end up as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}
