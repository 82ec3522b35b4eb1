use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bridge::PurchaseBridge;
use crate::events::EventSink;
use crate::models::ControlSpec;
use crate::provider::PurchaseProvider;

/// Control type handled by this plugin.
pub const CONTROL_TYPE: &str = "inapppurchase";

/// Builds bridges for the control types this plugin knows.
#[derive(Clone)]
pub struct ControlFactory {
    provider: Arc<dyn PurchaseProvider>,
    sink: Arc<dyn EventSink>,
}

impl ControlFactory {
    pub fn new(provider: Arc<dyn PurchaseProvider>, sink: Arc<dyn EventSink>) -> Self {
        Self { provider, sink }
    }

    /// Returns `None` for control types other than [`CONTROL_TYPE`]. The
    /// returned bridge is not yet activated.
    pub fn create_control(&self, spec: &ControlSpec) -> Option<PurchaseBridge> {
        match spec.control_type.as_str() {
            CONTROL_TYPE => Some(PurchaseBridge::new(
                spec.id.clone(),
                spec.product_ids.clone(),
                self.provider.clone(),
                self.sink.clone(),
            )),
            _ => None,
        }
    }
}

/// Live controls of one application, keyed by control id.
pub struct ControlRegistry {
    factory: ControlFactory,
    controls: Mutex<HashMap<String, Arc<PurchaseBridge>>>,
}

impl ControlRegistry {
    pub fn new(factory: ControlFactory) -> Self {
        Self {
            factory,
            controls: Mutex::new(HashMap::new()),
        }
    }

    fn controls(&self) -> MutexGuard<'_, HashMap<String, Arc<PurchaseBridge>>> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and activates a control. A control already registered under
    /// the same id is replaced and deactivated.
    pub fn create(&self, spec: &ControlSpec) -> bool {
        let Some(bridge) = self.factory.create_control(spec) else {
            tracing::debug!(control_type = %spec.control_type, "unknown control type");
            return false;
        };
        bridge.activate();

        let previous = self.controls().insert(spec.id.clone(), Arc::new(bridge));
        if let Some(previous) = previous {
            previous.deactivate();
        }
        tracing::info!(control = %spec.id, "control created");
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<PurchaseBridge>> {
        self.controls().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.controls().remove(id);
        match removed {
            Some(bridge) => {
                bridge.deactivate();
                tracing::info!(control = %id, "control removed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.controls().len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls().is_empty()
    }
}
