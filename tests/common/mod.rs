#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tauri_plugin_iap_bridge::*;
use tokio::sync::mpsc;

/// Ordered record of provider calls and emitted events.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct RecordingSink {
    journal: Journal,
    events: mpsc::UnboundedSender<ControlEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ControlEvent) {
        self.journal
            .push(format!("event:{}:{}", event.name.as_str(), event.data));
        let _ = self.events.send(event);
    }
}

pub struct Events(mpsc::UnboundedReceiver<ControlEvent>);

impl Events {
    pub async fn next(&mut self) -> ControlEvent {
        tokio::time::timeout(Duration::from_secs(5), self.0.recv())
            .await
            .expect("timed out waiting for event")
            .expect("sink dropped")
    }

    pub fn assert_empty(&mut self) {
        if let Ok(event) = self.0.try_recv() {
            panic!("unexpected event: {event:?}");
        }
    }
}

#[derive(Default)]
pub struct Script {
    pub unavailable: bool,
    pub products: Vec<Product>,
    pub not_found: Vec<String>,
    pub query_error: Option<String>,
    pub purchase_error: Option<String>,
    pub restore_error: Option<String>,
    pub complete_error: Option<String>,
    pub past_error: Option<String>,
    /// How long an acknowledgement takes, 5ms when unset.
    pub complete_delay: Option<Duration>,
    pub restored: Vec<PurchaseDetails>,
    pub past: Vec<PurchaseDetails>,
}

/// In-memory provider driven by a [`Script`].
pub struct ScriptedProvider {
    pub script: Mutex<Script>,
    pub journal: Journal,
    pub updates: PurchaseUpdates,
}

impl ScriptedProvider {
    pub fn new(script: Script, journal: Journal) -> Self {
        Self {
            script: Mutex::new(script),
            journal,
            updates: PurchaseUpdates::new(),
        }
    }

    fn failure(&self, pick: impl Fn(&Script) -> Option<String>) -> Result<()> {
        match pick(&*self.script.lock().unwrap()) {
            Some(message) => Err(Error::Provider(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PurchaseProvider for ScriptedProvider {
    async fn is_available(&self) -> bool {
        self.journal.push("available");
        !self.script.lock().unwrap().unavailable
    }

    async fn query_product_details(&self, product_ids: &[String]) -> Result<ProductDetailsResponse> {
        self.journal.push(format!("query:{}", product_ids.join(",")));
        self.failure(|s| s.query_error.clone())?;
        let script = self.script.lock().unwrap();
        Ok(ProductDetailsResponse {
            product_details: script
                .products
                .iter()
                .filter(|p| product_ids.contains(&p.id))
                .cloned()
                .collect(),
            not_found_ids: script.not_found.clone(),
        })
    }

    async fn buy_consumable(&self, param: PurchaseParam) -> Result<()> {
        self.journal
            .push(format!("buy_consumable:{}:{}", param.product.id, param.quantity));
        self.failure(|s| s.purchase_error.clone())
    }

    async fn buy_non_consumable(&self, param: PurchaseParam) -> Result<()> {
        self.journal
            .push(format!("buy_non_consumable:{}:{}", param.product.id, param.quantity));
        self.failure(|s| s.purchase_error.clone())
    }

    async fn restore_purchases(&self) -> Result<()> {
        self.journal.push("restore");
        self.failure(|s| s.restore_error.clone())?;
        let restored = self.script.lock().unwrap().restored.clone();
        self.updates.publish(restored);
        Ok(())
    }

    async fn complete_purchase(&self, purchase: &PurchaseDetails) -> Result<()> {
        self.journal
            .push(format!("complete:{}", purchase.transaction_id()));
        // give a concurrent handler the chance to run if ordering were broken
        let delay = self
            .script
            .lock()
            .unwrap()
            .complete_delay
            .unwrap_or(Duration::from_millis(5));
        tokio::time::sleep(delay).await;
        self.failure(|s| s.complete_error.clone())?;
        self.journal
            .push(format!("completed:{}", purchase.transaction_id()));
        Ok(())
    }

    async fn query_past_purchases(&self) -> Result<Vec<PurchaseDetails>> {
        self.journal.push("past");
        self.failure(|s| s.past_error.clone())?;
        Ok(self.script.lock().unwrap().past.clone())
    }

    fn purchase_stream(&self) -> PurchaseStream {
        self.updates.subscribe()
    }
}

pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub sink: Arc<RecordingSink>,
    pub journal: Journal,
    pub events: Events,
}

impl Harness {
    pub fn new(script: Script) -> Self {
        let journal = Journal::default();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider: Arc::new(ScriptedProvider::new(script, journal.clone())),
            sink: Arc::new(RecordingSink {
                journal: journal.clone(),
                events: tx,
            }),
            journal,
            events: Events(rx),
        }
    }

    pub fn bridge(&self, control_id: &str, product_ids: &[&str]) -> PurchaseBridge {
        PurchaseBridge::new(
            control_id,
            product_ids.iter().map(|s| s.to_string()).collect(),
            self.provider.clone(),
            self.sink.clone(),
        )
    }

    pub fn factory(&self) -> ControlFactory {
        ControlFactory::new(self.provider.clone(), self.sink.clone())
    }
}

pub fn product(id: &str, price: &str, store: StoreDetails) -> Product {
    Product {
        id: id.to_string(),
        title: format!("{id} title"),
        description: format!("{id} description"),
        price: price.to_string(),
        raw_price: 4.99,
        currency_code: "USD".to_string(),
        store,
    }
}

pub fn consumable(id: &str) -> Product {
    product(
        id,
        "$4.99",
        StoreDetails::GooglePlay {
            subscription_offer_details: None,
        },
    )
}

pub fn subscription(id: &str) -> Product {
    product(
        id,
        "$4.99",
        StoreDetails::GooglePlay {
            subscription_offer_details: Some(vec![SubscriptionOffer {
                offer_token: format!("{id}-offer"),
                base_plan_id: "monthly".to_string(),
                offer_id: None,
                pricing_phases: vec![],
            }]),
        },
    )
}

pub fn purchase(product_id: &str, transaction_id: &str, status: PurchaseStatus, pending: bool) -> PurchaseDetails {
    PurchaseDetails {
        purchase_id: Some(transaction_id.to_string()),
        pending_complete_purchase: pending,
        ..PurchaseDetails::new(product_id, status)
    }
}
