use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tauri::{plugin::PluginApi, AppHandle, Runtime};

use crate::models::*;
use crate::provider::{PurchaseProvider, PurchaseStream, PurchaseUpdates};

pub fn init<R: Runtime, C: DeserializeOwned>(
    _app: &AppHandle<R>,
    _api: PluginApi<R, C>,
) -> crate::Result<UnsupportedStore> {
    Ok(UnsupportedStore::default())
}

/// Provider for targets without a supported store. It is never available and
/// every store call fails.
#[derive(Default)]
pub struct UnsupportedStore {
    updates: PurchaseUpdates,
}

fn unsupported<T>() -> crate::Result<T> {
    Err(crate::Error::Provider(
        "IAP is not supported on this platform".to_string(),
    ))
}

#[async_trait]
impl PurchaseProvider for UnsupportedStore {
    async fn is_available(&self) -> bool {
        false
    }

    async fn query_product_details(
        &self,
        _product_ids: &[String],
    ) -> crate::Result<ProductDetailsResponse> {
        unsupported()
    }

    async fn buy_consumable(&self, _param: PurchaseParam) -> crate::Result<()> {
        unsupported()
    }

    async fn buy_non_consumable(&self, _param: PurchaseParam) -> crate::Result<()> {
        unsupported()
    }

    async fn restore_purchases(&self) -> crate::Result<()> {
        unsupported()
    }

    async fn complete_purchase(&self, _purchase: &PurchaseDetails) -> crate::Result<()> {
        unsupported()
    }

    async fn query_past_purchases(&self) -> crate::Result<Vec<PurchaseDetails>> {
        unsupported()
    }

    fn purchase_stream(&self) -> PurchaseStream {
        self.updates.subscribe()
    }
}
