use std::sync::Arc;

use tauri::{
  plugin::{Builder, TauriPlugin},
  Manager, Runtime,
};

pub use models::*;

#[cfg(not(any(target_os = "android", target_os = "windows")))]
mod desktop;
#[cfg(target_os = "android")]
mod mobile;
#[cfg(target_os = "windows")]
mod windows_store;

mod bridge;
mod command;
mod commands;
mod config;
mod error;
mod events;
mod factory;
mod models;
mod provider;

pub use bridge::PurchaseBridge;
pub use command::BridgeCommand;
pub use config::Config;
pub use error::{Error, Result};
pub use events::{ControlEvent, EventName, EventSink, TauriEventSink};
pub use factory::{ControlFactory, ControlRegistry, CONTROL_TYPE};
pub use provider::{PurchaseNotification, PurchaseProvider, PurchaseStream, PurchaseUpdates};

#[cfg(not(any(target_os = "android", target_os = "windows")))]
pub use desktop::UnsupportedStore;
#[cfg(target_os = "android")]
pub use mobile::GooglePlayStore;
#[cfg(target_os = "windows")]
pub use windows_store::MicrosoftStore;

/// Plugin state: configuration and the live in-app purchase controls.
pub struct IapBridge {
  config: Config,
  registry: ControlRegistry,
}

impl IapBridge {
  pub fn new(config: Config, provider: Arc<dyn PurchaseProvider>, sink: Arc<dyn EventSink>) -> Self {
    Self {
      config,
      registry: ControlRegistry::new(ControlFactory::new(provider, sink)),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn registry(&self) -> &ControlRegistry {
    &self.registry
  }
}

/// Extensions to [`tauri::App`], [`tauri::AppHandle`] and [`tauri::Window`] to access the iap bridge.
pub trait IapBridgeExt<R: Runtime> {
  fn iap_bridge(&self) -> &IapBridge;
}

impl<R: Runtime, T: Manager<R>> crate::IapBridgeExt<R> for T {
  fn iap_bridge(&self) -> &IapBridge {
    self.state::<IapBridge>().inner()
  }
}

/// Initializes the plugin.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<Config>> {
  Builder::<R, Option<Config>>::new("iap-bridge")
    .invoke_handler(tauri::generate_handler![
      commands::create_control,
      commands::invoke_method,
      commands::remove_control,
    ])
    .setup(|app, api| {
      let config = api.config().clone().unwrap_or_default();

      #[cfg(target_os = "android")]
      let provider: Arc<dyn PurchaseProvider> = Arc::new(mobile::init(app, api)?);
      #[cfg(target_os = "windows")]
      let provider: Arc<dyn PurchaseProvider> = Arc::new(windows_store::init(app, api)?);
      #[cfg(not(any(target_os = "android", target_os = "windows")))]
      let provider: Arc<dyn PurchaseProvider> = Arc::new(desktop::init(app, api)?);

      let sink: Arc<dyn EventSink> = Arc::new(TauriEventSink::new(app.clone(), config.event_name.clone()));
      tracing::debug!(event = %config.event_name, "iap bridge ready");
      app.manage(IapBridge::new(config, provider, sink));
      Ok(())
    })
    .build()
}
