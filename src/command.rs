use serde_json::{Map, Value};

use crate::{Error, Result};

/// Methods a host can invoke on an in-app purchase control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Initialize,
    /// `None` means the host sent no id list and the control's configured
    /// ids apply.
    QueryProducts { product_ids: Option<Vec<String>> },
    BuyProduct { product_id: String },
    RestorePurchases,
    GetPastPurchases,
    FinishTransaction { transaction_id: String },
}

impl BridgeCommand {
    /// Parses a method invocation. Returns `Ok(None)` for methods this control
    /// does not know.
    pub fn parse(method: &str, args: &Map<String, Value>) -> Result<Option<Self>> {
        let command = match method {
            "initialize" => BridgeCommand::Initialize,
            "query_products" => BridgeCommand::QueryProducts {
                product_ids: args
                    .get("productIds")
                    .map(|value| string_list(method, value))
                    .transpose()?,
            },
            "buy_product" => BridgeCommand::BuyProduct {
                product_id: required_string(method, args, "productId")?,
            },
            "restore_purchases" => BridgeCommand::RestorePurchases,
            "get_past_purchases" => BridgeCommand::GetPastPurchases,
            "finish_transaction" => BridgeCommand::FinishTransaction {
                transaction_id: required_string(method, args, "transactionId")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    pub fn method(&self) -> &'static str {
        match self {
            BridgeCommand::Initialize => "initialize",
            BridgeCommand::QueryProducts { .. } => "query_products",
            BridgeCommand::BuyProduct { .. } => "buy_product",
            BridgeCommand::RestorePurchases => "restore_purchases",
            BridgeCommand::GetPastPurchases => "get_past_purchases",
            BridgeCommand::FinishTransaction { .. } => "finish_transaction",
        }
    }
}

fn required_string(method: &str, args: &Map<String, Value>, key: &str) -> Result<String> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::invalid_arguments(
            method,
            format!("`{key}` must be a string, got {other}"),
        )),
        None => Err(Error::invalid_arguments(method, format!("missing `{key}`"))),
    }
}

// Hosts either pass the list as-is or JSON-encode it into a string argument.
fn string_list(method: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(encoded) => serde_json::from_str(encoded)
            .map_err(|e| Error::invalid_arguments(method, format!("`productIds`: {e}"))),
        other => serde_json::from_value(other.clone())
            .map_err(|e| Error::invalid_arguments(method, format!("`productIds`: {e}"))),
    }
}
