use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::command::BridgeCommand;
use crate::events::{ControlEvent, EventName, EventSink};
use crate::models::*;
use crate::provider::{PurchaseNotification, PurchaseProvider};
use crate::{Error, Result};

/// Connects one host control to a purchase provider.
///
/// Commands are forwarded to the provider and every failure is reported to
/// the host as a `purchase_error` event. While active, the bridge also
/// listens to the provider's purchase stream and re-emits each notification
/// as `purchase_updated`.
pub struct PurchaseBridge {
    inner: Arc<Inner>,
    /// Stops the stream task once the notification in hand is handled.
    subscription: Mutex<Option<oneshot::Sender<()>>>,
}

struct Inner {
    control_id: String,
    product_ids: Vec<String>,
    provider: Arc<dyn PurchaseProvider>,
    sink: Arc<dyn EventSink>,
    /// Products from the last successful query.
    products: Mutex<Vec<Product>>,
    /// Purchases still awaiting a completion call, by transaction id.
    unfinished: Mutex<HashMap<String, PurchaseDetails>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PurchaseBridge {
    pub fn new(
        control_id: impl Into<String>,
        product_ids: Vec<String>,
        provider: Arc<dyn PurchaseProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                control_id: control_id.into(),
                product_ids,
                provider,
                sink,
                products: Mutex::new(Vec::new()),
                unfinished: Mutex::new(HashMap::new()),
            }),
            subscription: Mutex::new(None),
        }
    }

    pub fn control_id(&self) -> &str {
        &self.inner.control_id
    }

    /// Subscribes to the provider's purchase stream. Calling it on an active
    /// bridge does nothing.
    pub fn activate(&self) {
        let mut subscription = lock(&self.subscription);
        if subscription.is_some() {
            return;
        }

        let mut stream = self.inner.provider.purchase_stream();
        let (stop, mut stopped) = oneshot::channel::<()>();
        let inner = self.inner.clone();
        tauri::async_runtime::spawn(async move {
            loop {
                // stop is only observed between notifications, never while a
                // provider call is awaited
                let notification = tokio::select! {
                    biased;
                    _ = &mut stopped => break,
                    next = stream.next() => match next {
                        Some(notification) => notification,
                        None => {
                            tracing::debug!(control = %inner.control_id, "purchase stream closed");
                            break;
                        }
                    },
                };
                inner.on_notification(notification).await;
            }
        });
        *subscription = Some(stop);
        tracing::debug!(control = %self.inner.control_id, "purchase bridge activated");
    }

    /// Cancels the stream subscription. A notification already being handled
    /// finishes, including its completion call, and nothing after it is read.
    pub fn deactivate(&self) {
        if let Some(stop) = lock(&self.subscription).take() {
            let _ = stop.send(());
            tracing::debug!(control = %self.inner.control_id, "purchase bridge deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    pub fn cached_products(&self) -> Vec<Product> {
        lock(&self.inner.products).clone()
    }

    pub fn unfinished_transactions(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.inner.unfinished).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Dispatches a host method call by name.
    pub async fn invoke(&self, method: &str, args: &Map<String, Value>) -> Option<String> {
        match BridgeCommand::parse(method, args) {
            Ok(Some(command)) => self.handle(command).await,
            Ok(None) => {
                tracing::warn!(control = %self.inner.control_id, method, "unknown method");
                None
            }
            Err(e) => {
                self.inner.report(&e);
                None
            }
        }
    }

    /// Runs a command. Only `GetPastPurchases` resolves to a value.
    pub async fn handle(&self, command: BridgeCommand) -> Option<String> {
        let method = command.method();
        tracing::debug!(control = %self.inner.control_id, method, "handling command");

        let outcome = match command {
            BridgeCommand::Initialize => self.initialize().await.map(|_| None),
            BridgeCommand::QueryProducts { product_ids } => {
                let product_ids = product_ids.unwrap_or_else(|| self.inner.product_ids.clone());
                self.query_products(&product_ids).await.map(|_| None)
            }
            BridgeCommand::BuyProduct { product_id } => {
                self.buy_product(&product_id).await.map(|_| None)
            }
            BridgeCommand::RestorePurchases => self.restore_purchases().await.map(|_| None),
            BridgeCommand::GetPastPurchases => self.get_past_purchases().await.map(Some),
            BridgeCommand::FinishTransaction { transaction_id } => {
                self.finish_transaction(&transaction_id).await.map(|_| None)
            }
        };

        match outcome {
            Ok(value) => value,
            Err(e) => {
                self.inner.report(&e);
                None
            }
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        if !self.inner.provider.is_available().await {
            return Err(Error::StoreUnavailable);
        }
        Ok(())
    }

    pub async fn query_products(&self, product_ids: &[String]) -> Result<()> {
        if product_ids.is_empty() {
            return Ok(());
        }

        let response = self
            .inner
            .provider
            .query_product_details(product_ids)
            .await
            .map_err(|e| Error::QueryProducts(e.to_string()))?;

        if !response.not_found_ids.is_empty() {
            tracing::warn!(
                control = %self.inner.control_id,
                not_found = ?response.not_found_ids,
                "products not found in store"
            );
        }

        let records: Vec<ProductRecord> = response.product_details.iter().map(ProductRecord::from).collect();
        let data = serde_json::to_string(&records)?;
        *lock(&self.inner.products) = response.product_details;

        self.inner.emit(EventName::ProductsReady, data);
        Ok(())
    }

    pub async fn buy_product(&self, product_id: &str) -> Result<()> {
        let product = lock(&self.inner.products)
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| Error::ProductNotFound(product_id.to_string()))?;

        let kind = product.kind();
        tracing::info!(control = %self.inner.control_id, product_id, ?kind, "starting purchase");

        let param = PurchaseParam::new(product);
        let requested = match kind {
            ProductKind::Subscription => self.inner.provider.buy_non_consumable(param).await,
            ProductKind::Consumable => self.inner.provider.buy_consumable(param).await,
        };
        requested.map_err(|e| Error::Purchase(e.to_string()))
    }

    pub async fn restore_purchases(&self) -> Result<()> {
        self.inner
            .provider
            .restore_purchases()
            .await
            .map_err(|e| Error::Restore(e.to_string()))
    }

    pub async fn get_past_purchases(&self) -> Result<String> {
        let purchases = self
            .inner
            .provider
            .query_past_purchases()
            .await
            .map_err(|e| Error::PastPurchases(e.to_string()))?;
        let updates: Vec<PurchaseUpdate> = purchases.iter().map(PurchaseUpdate::from).collect();
        Ok(serde_json::to_string(&updates)?)
    }

    pub async fn finish_transaction(&self, transaction_id: &str) -> Result<()> {
        let purchase = lock(&self.inner.unfinished)
            .remove(transaction_id)
            .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))?;

        if let Err(e) = self.inner.provider.complete_purchase(&purchase).await {
            lock(&self.inner.unfinished).insert(transaction_id.to_string(), purchase);
            return Err(Error::CompletePurchase(e.to_string()));
        }
        tracing::info!(control = %self.inner.control_id, transaction_id, "transaction finished");
        Ok(())
    }
}

impl Drop for PurchaseBridge {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl Inner {
    fn emit(&self, name: EventName, data: String) {
        self.sink.emit(ControlEvent {
            target: self.control_id.clone(),
            name,
            data,
        });
    }

    fn report(&self, error: &Error) {
        tracing::warn!(control = %self.control_id, %error, "purchase error");
        self.emit(EventName::PurchaseError, error.to_string());
    }

    async fn on_notification(&self, notification: PurchaseNotification) {
        match notification {
            PurchaseNotification::Updated(batch) => {
                for purchase in batch {
                    self.on_purchase(purchase).await;
                }
            }
            PurchaseNotification::Failed(message) => {
                self.report(&Error::PurchaseStream(message));
            }
        }
    }

    // Completion is awaited here so the next purchase of the batch is only
    // looked at once the store has been told about this one.
    async fn on_purchase(&self, purchase: PurchaseDetails) {
        tracing::debug!(
            control = %self.control_id,
            product_id = %purchase.product_id,
            transaction_id = purchase.transaction_id(),
            status = ?purchase.status,
            "purchase update"
        );

        if purchase.pending_complete_purchase {
            let auto_complete = matches!(
                purchase.status,
                PurchaseStatus::Purchased | PurchaseStatus::Restored
            );
            if auto_complete {
                match self.provider.complete_purchase(&purchase).await {
                    Ok(()) => self.release(&purchase),
                    Err(e) => {
                        self.report(&Error::CompletePurchase(e.to_string()));
                        self.hold(&purchase);
                    }
                }
            } else {
                self.hold(&purchase);
            }
        } else {
            self.release(&purchase);
        }

        match serde_json::to_string(&PurchaseUpdate::from(&purchase)) {
            Ok(data) => self.emit(EventName::PurchaseUpdated, data),
            Err(e) => self.report(&Error::from(e)),
        }
    }

    // A redelivered transaction that no longer needs completion is done.
    fn release(&self, purchase: &PurchaseDetails) {
        if let Some(transaction_id) = purchase.purchase_id.as_deref() {
            lock(&self.unfinished).remove(transaction_id);
        }
    }

    fn hold(&self, purchase: &PurchaseDetails) {
        let Some(transaction_id) = purchase.purchase_id.clone() else {
            tracing::warn!(
                control = %self.control_id,
                product_id = %purchase.product_id,
                "purchase needs completion but has no transaction id"
            );
            return;
        };
        lock(&self.unfinished).insert(transaction_id, purchase.clone());
    }
}
