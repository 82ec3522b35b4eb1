use serde::{ser::Serializer, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by providers and bridges.
///
/// The display string of each bridge variant is the exact text carried by the
/// `purchase_error` event.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Store not available")]
  StoreUnavailable,
  #[error("Product not found: {0}")]
  ProductNotFound(String),
  #[error("Failed to query products: {0}")]
  QueryProducts(String),
  #[error("Purchase failed: {0}")]
  Purchase(String),
  #[error("Failed to restore purchases: {0}")]
  Restore(String),
  #[error("Failed to query past purchases: {0}")]
  PastPurchases(String),
  #[error("Failed to complete purchase: {0}")]
  CompletePurchase(String),
  #[error("Transaction not found: {0}")]
  TransactionNotFound(String),
  #[error("Purchase stream error: {0}")]
  PurchaseStream(String),
  #[error("Invalid arguments for {method}: {reason}")]
  InvalidArguments { method: String, reason: String },
  #[error("Unknown control: {0}")]
  UnknownControl(String),
  #[error("{0}")]
  Provider(String),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[cfg(target_os = "android")]
  #[error(transparent)]
  PluginInvoke(#[from] tauri::plugin::mobile::PluginInvokeError),
  #[cfg(target_os = "windows")]
  #[error(transparent)]
  Windows(#[from] windows_result::Error),
}

impl Error {
  pub(crate) fn invalid_arguments(method: &str, reason: impl ToString) -> Self {
    Error::InvalidArguments {
      method: method.to_string(),
      reason: reason.to_string(),
    }
  }
}

impl Serialize for Error {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(self.to_string().as_ref())
  }
}
