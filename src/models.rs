use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPhase {
    pub formatted_price: String,
    pub price_currency_code: String,
    pub price_amount_micros: i64,
    pub billing_period: String,
    pub billing_cycle_count: i32,
    pub recurrence_mode: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOffer {
    pub offer_token: String,
    pub base_plan_id: String,
    pub offer_id: Option<String>,
    pub pricing_phases: Vec<PricingPhase>,
}

/// Store specific part of a [`Product`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "store", rename_all = "camelCase")]
pub enum StoreDetails {
    #[serde(rename_all = "camelCase")]
    GooglePlay {
        subscription_offer_details: Option<Vec<SubscriptionOffer>>,
    },
    #[serde(rename_all = "camelCase")]
    MicrosoftStore { product_kind: String },
    Generic,
}

/// Product metadata as returned by a provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display price, including the currency symbol when the store adds one.
    pub price: String,
    pub raw_price: f64,
    pub currency_code: String,
    #[serde(flatten)]
    pub store: StoreDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Consumable,
    Subscription,
}

impl Product {
    /// First character of the display price unless it is a digit, otherwise
    /// the currency code.
    pub fn currency_symbol(&self) -> String {
        match self.price.chars().next() {
            Some(c) if !c.is_ascii_digit() => c.to_string(),
            _ => self.currency_code.clone(),
        }
    }

    /// Only Google Play exposes subscription offers; every other store is
    /// reported as consumable.
    pub fn kind(&self) -> ProductKind {
        match &self.store {
            StoreDetails::GooglePlay {
                subscription_offer_details: Some(_),
            } => ProductKind::Subscription,
            _ => ProductKind::Consumable,
        }
    }

    pub fn subscription_offers(&self) -> &[SubscriptionOffer] {
        match &self.store {
            StoreDetails::GooglePlay {
                subscription_offer_details: Some(offers),
            } => offers,
            _ => &[],
        }
    }
}

/// Numeric value of a localized display price such as `"$1,234.56"` or
/// `"4,99 €"`. The last `.` or `,` is the decimal separator when one or two
/// digits follow it; every other separator is grouping.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn parse_display_price(price: &str) -> f64 {
    let kept: Vec<char> = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let decimal_at = kept
        .iter()
        .rposition(|c| !c.is_ascii_digit())
        .filter(|&at| matches!(kept.len() - at - 1, 1 | 2));

    let normalized: String = kept
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            '0'..='9' => Some(*c),
            _ if Some(i) == decimal_at => Some('.'),
            _ => None,
        })
        .collect();
    normalized.parse().unwrap_or(0.0)
}

/// Product store id of a SKU store id (`"9NBLGGH4R2R6/0010"` → `"9NBLGGH4R2R6"`),
/// the id products are queried by.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn product_store_id(sku_store_id: &str) -> &str {
    sku_store_id.split('/').next().unwrap_or(sku_store_id)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetailsResponse {
    pub product_details: Vec<Product>,
    pub not_found_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseParam {
    pub product: Product,
    pub quantity: u32,
}

impl PurchaseParam {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            quantity: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Purchased,
    Restored,
    Error,
    Canceled,
}

/// A single purchase notification delivered by a provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDetails {
    pub purchase_id: Option<String>,
    pub product_id: String,
    pub status: PurchaseStatus,
    pub error_message: Option<String>,
    pub pending_complete_purchase: bool,
    pub purchase_token: Option<String>,
    pub transaction_date: Option<i64>,
}

impl PurchaseDetails {
    pub fn new(product_id: impl Into<String>, status: PurchaseStatus) -> Self {
        Self {
            purchase_id: None,
            product_id: product_id.into(),
            status,
            error_message: None,
            pending_complete_purchase: false,
            purchase_token: None,
            transaction_date: None,
        }
    }

    pub fn transaction_id(&self) -> &str {
        self.purchase_id.as_deref().unwrap_or_default()
    }
}

/// Product as emitted to the host in `products_ready`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub raw_price: f64,
    pub currency_code: String,
    pub currency_symbol: String,
    #[serde(rename = "type")]
    pub kind: ProductKind,
}

impl From<&Product> for ProductRecord {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price.clone(),
            raw_price: product.raw_price,
            currency_code: product.currency_code.clone(),
            currency_symbol: product.currency_symbol(),
            kind: product.kind(),
        }
    }
}

/// Purchase notification as emitted to the host in `purchase_updated`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseUpdate {
    pub product_id: String,
    pub status: PurchaseStatus,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&PurchaseDetails> for PurchaseUpdate {
    fn from(purchase: &PurchaseDetails) -> Self {
        let error_message = match purchase.status {
            PurchaseStatus::Error => Some(
                purchase
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            _ => None,
        };
        Self {
            product_id: purchase.product_id.clone(),
            status: purchase.status,
            transaction_id: purchase.transaction_id().to_string(),
            error_message,
        }
    }
}

/// Declarative description of a control sent by the host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub control_type: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateControlRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub control_type: String,
    pub product_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateControlResponse {
    pub created: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeMethodRequest {
    pub control_id: String,
    pub method: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveControlRequest {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveControlResponse {
    pub removed: bool,
}
