use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tauri::{
    plugin::{PluginApi, PluginHandle},
    AppHandle, Runtime,
};

use crate::models::*;
use crate::provider::{PurchaseProvider, PurchaseStream, PurchaseUpdates};

const PLUGIN_IDENTIFIER: &str = "app.tauri.iapbridge";

const INAPP: &str = "inapp";
const SUBS: &str = "subs";

// initializes the Kotlin billing plugin shipped by the host app
pub fn init<R: Runtime, C: DeserializeOwned>(
    _app: &AppHandle<R>,
    api: PluginApi<R, C>,
) -> crate::Result<GooglePlayStore<R>> {
    let handle = api.register_android_plugin(PLUGIN_IDENTIFIER, "IapBridgePlugin")?;
    Ok(GooglePlayStore {
        handle,
        updates: PurchaseUpdates::new(),
    })
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetProductsRequest<'a> {
    product_ids: &'a [String],
    product_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayProduct {
    product_id: String,
    title: String,
    description: String,
    formatted_price: Option<String>,
    price_currency_code: Option<String>,
    price_amount_micros: Option<i64>,
    subscription_offer_details: Option<Vec<SubscriptionOffer>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetProductsResponse {
    products: Vec<PlayProduct>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseRequest<'a> {
    product_id: &'a str,
    product_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    offer_token: Option<&'a str>,
    quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayPurchase {
    order_id: Option<String>,
    product_id: String,
    purchase_time: i64,
    purchase_token: String,
    purchase_state: i32,
    is_acknowledged: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RestorePurchasesRequest {
    product_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestorePurchasesResponse {
    purchases: Vec<PlayPurchase>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseHistoryRecord {
    product_id: String,
    purchase_time: i64,
    purchase_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetPurchaseHistoryResponse {
    history: Vec<PurchaseHistoryRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgePurchaseRequest<'a> {
    purchase_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgePurchaseResponse {
    success: bool,
}

impl From<PlayProduct> for Product {
    fn from(product: PlayProduct) -> Self {
        Product {
            id: product.product_id,
            title: product.title,
            description: product.description,
            price: product.formatted_price.unwrap_or_default(),
            raw_price: product.price_amount_micros.unwrap_or_default() as f64 / 1_000_000.0,
            currency_code: product.price_currency_code.unwrap_or_default(),
            store: StoreDetails::GooglePlay {
                subscription_offer_details: product.subscription_offer_details,
            },
        }
    }
}

impl PlayPurchase {
    // Billing purchase states: 0 purchased, 1 canceled, 2 pending
    fn into_details(self, restored: bool) -> PurchaseDetails {
        let status = match (self.purchase_state, restored) {
            (0, true) => PurchaseStatus::Restored,
            (0, false) => PurchaseStatus::Purchased,
            (1, _) => PurchaseStatus::Canceled,
            (2, _) => PurchaseStatus::Pending,
            _ => PurchaseStatus::Error,
        };
        let error_message = (status == PurchaseStatus::Error)
            .then(|| format!("Invalid purchase state: {}", self.purchase_state));
        PurchaseDetails {
            purchase_id: Some(self.order_id.unwrap_or_else(|| self.purchase_token.clone())),
            product_id: self.product_id,
            status,
            error_message,
            pending_complete_purchase: !self.is_acknowledged && self.purchase_state == 0,
            purchase_token: Some(self.purchase_token),
            transaction_date: Some(self.purchase_time),
        }
    }
}

/// Google Play Billing provider, reached through the native mobile plugin.
pub struct GooglePlayStore<R: Runtime> {
    handle: PluginHandle<R>,
    updates: PurchaseUpdates,
}

impl<R: Runtime> GooglePlayStore<R> {
    fn purchase(&self, param: &PurchaseParam, product_type: &'static str) -> crate::Result<()> {
        let offer_token = param
            .product
            .subscription_offers()
            .first()
            .map(|offer| offer.offer_token.as_str());
        let purchase: PlayPurchase = self.handle.run_mobile_plugin(
            "purchase",
            PurchaseRequest {
                product_id: &param.product.id,
                product_type,
                offer_token,
                quantity: param.quantity,
            },
        )?;
        self.updates.publish(vec![purchase.into_details(false)]);
        Ok(())
    }

    fn owned(&self, product_type: &'static str) -> crate::Result<Vec<PlayPurchase>> {
        let response: RestorePurchasesResponse = self
            .handle
            .run_mobile_plugin("restorePurchases", RestorePurchasesRequest { product_type })?;
        Ok(response.purchases)
    }
}

#[async_trait]
impl<R: Runtime> PurchaseProvider for GooglePlayStore<R> {
    async fn is_available(&self) -> bool {
        let response: Result<InitializeResponse, _> =
            self.handle.run_mobile_plugin("initialize", Empty {});
        match response {
            Ok(response) => response.success,
            Err(e) => {
                tracing::warn!(error = %e, "billing client unavailable");
                false
            }
        }
    }

    async fn query_product_details(
        &self,
        product_ids: &[String],
    ) -> crate::Result<ProductDetailsResponse> {
        let mut product_details: Vec<Product> = Vec::new();
        for product_type in [INAPP, SUBS] {
            let response: GetProductsResponse = self.handle.run_mobile_plugin(
                "getProducts",
                GetProductsRequest {
                    product_ids,
                    product_type,
                },
            )?;
            for product in response.products {
                if !product_details.iter().any(|p| p.id == product.product_id) {
                    product_details.push(product.into());
                }
            }
        }

        let not_found_ids = product_ids
            .iter()
            .filter(|id| !product_details.iter().any(|p| &p.id == *id))
            .cloned()
            .collect();
        Ok(ProductDetailsResponse {
            product_details,
            not_found_ids,
        })
    }

    async fn buy_consumable(&self, param: PurchaseParam) -> crate::Result<()> {
        self.purchase(&param, INAPP)
    }

    async fn buy_non_consumable(&self, param: PurchaseParam) -> crate::Result<()> {
        let product_type = match param.product.kind() {
            ProductKind::Subscription => SUBS,
            ProductKind::Consumable => INAPP,
        };
        self.purchase(&param, product_type)
    }

    async fn restore_purchases(&self) -> crate::Result<()> {
        let mut restored = Vec::new();
        for product_type in [INAPP, SUBS] {
            restored.extend(self.owned(product_type)?.into_iter().map(|p| p.into_details(true)));
        }
        tracing::info!(count = restored.len(), "restored Google Play purchases");
        self.updates.publish(restored);
        Ok(())
    }

    async fn complete_purchase(&self, purchase: &PurchaseDetails) -> crate::Result<()> {
        let Some(purchase_token) = purchase.purchase_token.as_deref() else {
            return Err(crate::Error::Provider(format!(
                "purchase of {} has no purchase token",
                purchase.product_id
            )));
        };
        let response: AcknowledgePurchaseResponse = self
            .handle
            .run_mobile_plugin("acknowledgePurchase", AcknowledgePurchaseRequest { purchase_token })?;
        if !response.success {
            return Err(crate::Error::Provider(format!(
                "acknowledgement rejected for {}",
                purchase.product_id
            )));
        }
        Ok(())
    }

    async fn query_past_purchases(&self) -> crate::Result<Vec<PurchaseDetails>> {
        let response: GetPurchaseHistoryResponse =
            self.handle.run_mobile_plugin("getPurchaseHistory", Empty {})?;
        Ok(response
            .history
            .into_iter()
            .map(|record| PurchaseDetails {
                purchase_id: Some(record.purchase_token.clone()),
                product_id: record.product_id,
                status: PurchaseStatus::Purchased,
                error_message: None,
                pending_complete_purchase: false,
                purchase_token: Some(record.purchase_token),
                transaction_date: Some(record.purchase_time),
            })
            .collect())
    }

    fn purchase_stream(&self) -> PurchaseStream {
        self.updates.subscribe()
    }
}
