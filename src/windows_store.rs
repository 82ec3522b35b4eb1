use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tauri::{plugin::PluginApi, AppHandle, Runtime};
use windows::core::HSTRING;
use windows::Foundation::DateTime;
use windows::Services::Store::{StoreContext, StoreLicense, StoreProduct, StorePurchaseStatus};
use windows_collections::IIterable;
use windows_result::HRESULT;

use crate::models::*;
use crate::provider::{PurchaseProvider, PurchaseStream, PurchaseUpdates};

const PRODUCT_KINDS: [&str; 4] = ["Consumable", "UnmanagedConsumable", "Durable", "Subscription"];

pub fn init<R: Runtime, C: DeserializeOwned>(
    _app: &AppHandle<R>,
    _api: PluginApi<R, C>,
) -> crate::Result<MicrosoftStore> {
    Ok(MicrosoftStore::default())
}

/// Microsoft Store provider backed by `Windows.Services.Store`.
///
/// The store acknowledges purchases itself, so purchases are never delivered
/// as pending completion.
#[derive(Default)]
pub struct MicrosoftStore {
    store_context: RwLock<Option<StoreContext>>,
    updates: PurchaseUpdates,
}

fn store_error(context: &str, e: impl std::fmt::Debug) -> crate::Error {
    crate::Error::Provider(format!("{context}: {e:?}"))
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Convert Windows DateTime to Unix timestamp in milliseconds
fn datetime_to_unix_millis(datetime: &DateTime) -> i64 {
    // 100-nanosecond intervals since January 1, 1601
    const WINDOWS_TICK: i64 = 10000000;
    const SEC_TO_UNIX_EPOCH: i64 = 11644473600;

    let seconds_since_1601 = datetime.UniversalTime / WINDOWS_TICK;
    (seconds_since_1601 - SEC_TO_UNIX_EPOCH) * 1000
}

fn check_extended_error(code: HRESULT, context: &str) -> crate::Result<()> {
    if code.is_err() {
        return Err(crate::Error::Provider(format!("{context}: {}", code.message())));
    }
    Ok(())
}

impl MicrosoftStore {
    /// Get or create the StoreContext instance
    fn store_context(&self) -> crate::Result<StoreContext> {
        if let Some(context) = self
            .store_context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(context.clone());
        }

        let context =
            StoreContext::GetDefault().map_err(|e| store_error("Failed to get store context", e))?;
        *self
            .store_context
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(context.clone());
        Ok(context)
    }

    fn convert_store_product(store_product: &StoreProduct) -> crate::Result<Product> {
        let price = store_product.Price()?;

        let raw_price = parse_display_price(&price.FormattedBasePrice()?.to_string());

        Ok(Product {
            id: store_product.StoreId()?.to_string(),
            title: store_product.Title()?.to_string(),
            description: store_product.Description()?.to_string(),
            price: price.FormattedPrice()?.to_string(),
            raw_price,
            currency_code: price.CurrencyCode()?.to_string(),
            store: StoreDetails::MicrosoftStore {
                product_kind: store_product.ProductKind()?.to_string(),
            },
        })
    }

    fn convert_license(license: &StoreLicense, status: PurchaseStatus) -> crate::Result<PurchaseDetails> {
        let expiration = datetime_to_unix_millis(&license.ExpirationDate()?);
        let sku_store_id = license.SkuStoreId()?.to_string();
        Ok(PurchaseDetails {
            product_id: product_store_id(&sku_store_id).to_string(),
            purchase_id: Some(sku_store_id),
            status,
            error_message: None,
            pending_complete_purchase: false,
            purchase_token: None,
            transaction_date: (expiration > 0).then_some(expiration),
        })
    }

    fn active_licenses(&self, status: PurchaseStatus) -> crate::Result<Vec<PurchaseDetails>> {
        let context = self.store_context()?;
        let app_license = context
            .GetAppLicenseAsync()
            .and_then(|async_op| async_op.get())
            .map_err(|e| store_error("Failed to get app license", e))?;

        let mut purchases = Vec::new();
        let iterator = app_license.AddOnLicenses()?.First()?;
        while iterator.HasCurrent()? {
            let license = iterator.Current()?.Value()?;
            if license.IsActive()? {
                purchases.push(Self::convert_license(&license, status)?);
            }
            iterator.MoveNext()?;
        }
        Ok(purchases)
    }

    fn request_purchase(&self, product: &Product) -> crate::Result<()> {
        let context = self.store_context()?;
        let result = context
            .RequestPurchaseAsync(&HSTRING::from(product.id.as_str()))
            .and_then(|async_op| async_op.get())
            .map_err(|e| store_error("Purchase request failed", e))?;

        let status = result.Status()?;
        let (status, error_message) = match status {
            StorePurchaseStatus::Succeeded | StorePurchaseStatus::AlreadyPurchased => {
                (PurchaseStatus::Purchased, None)
            }
            StorePurchaseStatus::NotPurchased => (PurchaseStatus::Canceled, None),
            StorePurchaseStatus::NetworkError => {
                (PurchaseStatus::Error, Some("Network error during purchase".to_string()))
            }
            StorePurchaseStatus::ServerError => {
                (PurchaseStatus::Error, Some("Server error during purchase".to_string()))
            }
            _ => (
                PurchaseStatus::Error,
                result.ExtendedError().ok().map(|code| code.message()),
            ),
        };

        let transaction_date = now_millis();
        self.updates.publish(vec![PurchaseDetails {
            purchase_id: Some(format!("win_{}_{}", product.id, transaction_date)),
            product_id: product.id.clone(),
            status,
            error_message,
            pending_complete_purchase: false,
            purchase_token: None,
            transaction_date: Some(transaction_date),
        }]);
        Ok(())
    }
}

#[async_trait]
impl PurchaseProvider for MicrosoftStore {
    async fn is_available(&self) -> bool {
        match self.store_context() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Microsoft Store unavailable");
                false
            }
        }
    }

    async fn query_product_details(
        &self,
        product_ids: &[String],
    ) -> crate::Result<ProductDetailsResponse> {
        let context = self.store_context()?;

        let kinds: Vec<HSTRING> = PRODUCT_KINDS.iter().map(|k| HSTRING::from(*k)).collect();
        let store_ids: Vec<HSTRING> = product_ids
            .iter()
            .map(|id| HSTRING::from(id.as_str()))
            .collect();

        let kinds_it: IIterable<HSTRING> = IIterable::try_from(kinds)
            .map_err(|e| store_error("Failed to create IIterable", e))?;
        let ids_it: IIterable<HSTRING> = IIterable::try_from(store_ids)
            .map_err(|e| store_error("Failed to create IIterable", e))?;

        let query_result = context
            .GetStoreProductsAsync(&kinds_it, &ids_it)
            .and_then(|async_op| async_op.get())
            .map_err(|e| store_error("Failed to get products", e))?;
        check_extended_error(query_result.ExtendedError()?, "Store query failed")?;

        let mut product_details = Vec::new();
        let iterator = query_result.Products()?.First()?;
        while iterator.HasCurrent()? {
            let store_product = iterator.Current()?.Value()?;
            product_details.push(Self::convert_store_product(&store_product)?);
            iterator.MoveNext()?;
        }

        let found: HashSet<&str> = product_details.iter().map(|p| p.id.as_str()).collect();
        let not_found_ids = product_ids
            .iter()
            .filter(|id| !found.contains(id.as_str()))
            .cloned()
            .collect();

        Ok(ProductDetailsResponse {
            product_details,
            not_found_ids,
        })
    }

    async fn buy_consumable(&self, param: PurchaseParam) -> crate::Result<()> {
        self.request_purchase(&param.product)
    }

    async fn buy_non_consumable(&self, param: PurchaseParam) -> crate::Result<()> {
        self.request_purchase(&param.product)
    }

    async fn restore_purchases(&self) -> crate::Result<()> {
        let restored = self.active_licenses(PurchaseStatus::Restored)?;
        tracing::info!(count = restored.len(), "restored add-on licenses");
        self.updates.publish(restored);
        Ok(())
    }

    async fn complete_purchase(&self, _purchase: &PurchaseDetails) -> crate::Result<()> {
        Ok(())
    }

    async fn query_past_purchases(&self) -> crate::Result<Vec<PurchaseDetails>> {
        self.active_licenses(PurchaseStatus::Purchased)
    }

    fn purchase_stream(&self) -> PurchaseStream {
        self.updates.subscribe()
    }
}
