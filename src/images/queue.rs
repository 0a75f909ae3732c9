use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{fetch::ImageFetcher, services::finalize_metadata};

/// Hands freshly uploaded image ids to a background task that derives
/// their metadata, so the upload request never waits on the fetch.
#[derive(Clone)]
pub struct MetadataQueue {
    tx: mpsc::Sender<Uuid>,
}

impl MetadataQueue {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(db: PgPool, fetcher: Arc<dyn ImageFetcher>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Uuid>(capacity);
        tokio::spawn(async move {
            while let Some(image_id) = rx.recv().await {
                match finalize_metadata(&db, fetcher.as_ref(), image_id).await {
                    Ok(image) => info!(
                        %image_id,
                        format = image.original_format.as_deref().unwrap_or("-"),
                        "image metadata finalized"
                    ),
                    Err(e) => warn!(%image_id, error = %e, "image metadata enrichment failed"),
                }
            }
            debug!("metadata queue closed");
        });
        Self { tx }
    }

    /// A queue with no worker behind it; every enqueue is dropped.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    /// Returns false when the id could not be queued. The row then stays in
    /// `created` until it is finalized explicitly or at the next startup.
    pub fn enqueue(&self, image_id: Uuid) -> bool {
        match self.tx.try_send(image_id) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(%image_id, "metadata queue full; leaving image unfinalized");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(%image_id, "metadata queue closed; leaving image unfinalized");
                false
            }
        }
    }
}
