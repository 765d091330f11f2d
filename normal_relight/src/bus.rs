use tokio::sync::broadcast;

use serde::{Deserialize, Serialize};

/// Event name editor clients listen for.
pub const PREVIEW_EVENT: &str = "relight_init";

/// What the editor needs to start an interactive relight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewNotice {
    pub node_id: String,
    /// PNG data URI of the image to relight.
    pub image: String,
    /// PNG data URI of the matching normal map.
    pub normals: String,
}

/// Outbound channel towards editor clients. Fire-and-forget: there is no
/// acknowledgement, and a notice nobody receives is indistinguishable from an
/// editor that never answers.
pub trait PreviewSink: Send + Sync {
    fn publish(&self, notice: PreviewNotice);
}

#[derive(Clone)]
pub struct EditorBus {
    pub notices_tx: broadcast::Sender<PreviewNotice>,
}

impl EditorBus {
    pub fn new(capacity: usize) -> Self {
        let (notices_tx, _) = broadcast::channel::<PreviewNotice>(capacity.max(1));
        Self { notices_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewNotice> {
        self.notices_tx.subscribe()
    }
}

impl PreviewSink for EditorBus {
    fn publish(&self, notice: PreviewNotice) {
        let node_id = notice.node_id.clone();
        match self.notices_tx.send(notice) {
            Ok(receivers) => tracing::debug!("preview for {node_id} sent to {receivers} editor(s)"),
            Err(_) => tracing::warn!("preview for {node_id} published with no editor connected"),
        }
    }
}
