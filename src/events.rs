use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Emitter, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    PurchaseError,
    ProductsReady,
    PurchaseUpdated,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::PurchaseError => "purchase_error",
            EventName::ProductsReady => "products_ready",
            EventName::PurchaseUpdated => "purchase_updated",
        }
    }
}

/// Event addressed to a single control.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlEvent {
    pub target: String,
    pub name: EventName,
    pub data: String,
}

/// Where bridges deliver their events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ControlEvent);
}

/// Emits control events to every webview on one Tauri event channel.
pub struct TauriEventSink<R: Runtime> {
    app: AppHandle<R>,
    channel: String,
}

impl<R: Runtime> TauriEventSink<R> {
    pub fn new(app: AppHandle<R>, channel: impl Into<String>) -> Self {
        Self {
            app,
            channel: channel.into(),
        }
    }
}

impl<R: Runtime> EventSink for TauriEventSink<R> {
    fn emit(&self, event: ControlEvent) {
        if let Err(e) = self.app.emit(&self.channel, &event) {
            tracing::warn!(
                target_control = %event.target,
                event = event.name.as_str(),
                error = %e,
                "failed to emit control event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_wire_names() {
        for name in [
            EventName::PurchaseError,
            EventName::ProductsReady,
            EventName::PurchaseUpdated,
        ] {
            assert_eq!(
                serde_json::to_value(name).unwrap(),
                serde_json::Value::String(name.as_str().to_string())
            );
        }
    }
}
