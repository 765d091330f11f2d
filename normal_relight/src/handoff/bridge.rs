use std::panic::{self, UnwindSafe};
use std::sync::Arc;

use super::registry::{HandoffRegistry, HandoffTicket, Resolution};
use super::RequestId;
use crate::bus::{PreviewNotice, PreviewSink};
use crate::codec;
use crate::error::Result;
use crate::Image;

/// Runs interactive relights: publish a preview, park, pick up the editor's
/// answer. Every failure after the request is accepted degrades to returning
/// the original image, so the host pipeline never sees an error from here.
pub struct HandoffBridge {
    registry: Arc<HandoffRegistry>,
    sink: Arc<dyn PreviewSink>,
}

impl HandoffBridge {
    pub fn new(registry: Arc<HandoffRegistry>, sink: Arc<dyn PreviewSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Arc<HandoffRegistry> {
        &self.registry
    }

    /// Hands `image` to the editor and blocks the calling thread until the
    /// request is delivered or cancelled. There is no timeout.
    ///
    /// Call this from a worker thread (or `spawn_blocking`), never from inside
    /// an async task; async callers use [`Self::interactive_relight_async`].
    pub fn interactive_relight(
        &self,
        image: &Image,
        normals: &Image,
        id: impl Into<RequestId>,
    ) -> Image {
        let Some(mut ticket) = self.hand_off(image, normals, id.into()) else {
            return image.clone();
        };
        let resolution = ticket.wait_blocking();
        finish(&ticket, resolution, image)
    }

    /// Same protocol as [`Self::interactive_relight`], awaiting the signal.
    pub async fn interactive_relight_async(
        &self,
        image: &Image,
        normals: &Image,
        id: impl Into<RequestId>,
    ) -> Image {
        let Some(mut ticket) = self.hand_off(image, normals, id.into()) else {
            return image.clone();
        };
        let resolution = ticket.wait().await;
        finish(&ticket, resolution, image)
    }

    /// Registers the request and publishes its preview. `None` means the
    /// handoff could not start and the caller should fall back immediately.
    fn hand_off(&self, image: &Image, normals: &Image, id: RequestId) -> Option<HandoffTicket> {
        let ticket = match self.registry.open(id) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::error!("interactive relight refused: {e}");
                return None;
            }
        };

        let notice = match preview_notice(ticket.id(), image, normals) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::error!("request {}: could not encode preview: {e}", ticket.id());
                return None;
            }
        };

        tracing::info!("request {}: waiting for editor", ticket.id());
        self.sink.publish(notice);
        Some(ticket)
    }
}

fn preview_notice(id: &RequestId, image: &Image, normals: &Image) -> Result<PreviewNotice> {
    Ok(PreviewNotice {
        node_id: id.to_string(),
        image: codec::encode_data_uri(image)?,
        normals: codec::encode_data_uri(normals)?,
    })
}

fn finish(ticket: &HandoffTicket, resolution: Resolution, original: &Image) -> Image {
    let id = ticket.id();
    match resolution {
        Resolution::Cancelled => {
            tracing::info!("request {id}: cancelled, keeping original image");
            original.clone()
        }
        Resolution::Delivered(payload) => {
            decode_or_original(id, original, || codec::decode_payload(&payload))
        }
    }
}

/// Runs `decode`, keeping `original` if it fails or panics.
fn decode_or_original(
    id: &RequestId,
    original: &Image,
    decode: impl FnOnce() -> Result<Image> + UnwindSafe,
) -> Image {
    match panic::catch_unwind(decode) {
        Ok(Ok(relit)) => {
            tracing::info!("request {id}: editor result received {:?}", relit.dim());
            relit
        }
        Ok(Err(e)) => {
            tracing::error!("request {id}: editor result unusable, keeping original image: {e}");
            original.clone()
        }
        Err(_) => {
            tracing::error!("request {id}: decoding editor result panicked, keeping original image");
            original.clone()
        }
    }
}
