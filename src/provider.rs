//! The purchase provider seam and its notification stream.

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::models::*;
use crate::Result;

const STREAM_CAPACITY: usize = 64;

/// One delivery on the purchase stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseNotification {
    /// A batch of purchase updates, handled in order.
    Updated(Vec<PurchaseDetails>),
    /// The stream itself failed to deliver.
    Failed(String),
}

/// Backing store an [`crate::PurchaseBridge`] talks to.
///
/// Purchases and restores only report whether the request was issued; their
/// outcome is delivered on [`PurchaseProvider::purchase_stream`].
#[async_trait]
pub trait PurchaseProvider: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn query_product_details(&self, product_ids: &[String]) -> Result<ProductDetailsResponse>;

    async fn buy_consumable(&self, param: PurchaseParam) -> Result<()>;

    async fn buy_non_consumable(&self, param: PurchaseParam) -> Result<()>;

    async fn restore_purchases(&self) -> Result<()>;

    /// Acknowledge a purchase so the store stops redelivering it.
    async fn complete_purchase(&self, purchase: &PurchaseDetails) -> Result<()>;

    async fn query_past_purchases(&self) -> Result<Vec<PurchaseDetails>>;

    fn purchase_stream(&self) -> PurchaseStream;
}

/// Sending half of the purchase stream, owned by a provider.
#[derive(Debug, Clone)]
pub struct PurchaseUpdates {
    sender: broadcast::Sender<PurchaseNotification>,
}

impl Default for PurchaseUpdates {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseUpdates {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(STREAM_CAPACITY);
        Self { sender }
    }

    /// Deliver a batch to every live subscriber. Batches sent while nobody
    /// listens are dropped.
    pub fn publish(&self, batch: Vec<PurchaseDetails>) {
        if batch.is_empty() {
            return;
        }
        if self.sender.send(PurchaseNotification::Updated(batch)).is_err() {
            tracing::debug!("purchase batch dropped: no subscribers");
        }
    }

    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.sender.send(PurchaseNotification::Failed(message.into()));
    }

    pub fn subscribe(&self) -> PurchaseStream {
        PurchaseStream {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiving half of the purchase stream.
pub struct PurchaseStream {
    receiver: broadcast::Receiver<PurchaseNotification>,
}

impl PurchaseStream {
    /// Returns `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<PurchaseNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "purchase stream lagged, notifications dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
