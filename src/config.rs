use serde::Deserialize;

fn default_event_name() -> String {
    "iap-bridge://event".to_string()
}

/// Plugin configuration, read from `plugins.iap-bridge` in `tauri.conf.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Tauri event every control event is emitted on.
    #[serde(default = "default_event_name")]
    pub event_name: String,
    /// Products queried by controls created without their own list.
    #[serde(default)]
    pub product_ids: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_name: default_event_name(),
            product_ids: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.event_name, "iap-bridge://event");
        assert!(config.product_ids.is_empty());
    }

    #[test]
    fn reads_camel_case_fields() {
        let config: Config =
            serde_json::from_str(r#"{ "eventName": "store://events", "productIds": ["pro"] }"#)
                .unwrap();
        assert_eq!(config.event_name, "store://events");
        assert_eq!(config.product_ids, vec!["pro".to_string()]);
    }
}
