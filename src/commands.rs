use tauri::{command, AppHandle, Runtime};

use crate::models::*;
use crate::{Error, IapBridgeExt, Result};

#[command]
pub(crate) async fn create_control<R: Runtime>(
    app: AppHandle<R>,
    payload: CreateControlRequest,
) -> Result<CreateControlResponse> {
    let bridge = app.iap_bridge();
    let spec = ControlSpec {
        id: payload.id,
        control_type: payload.control_type,
        product_ids: payload
            .product_ids
            .unwrap_or_else(|| bridge.config().product_ids.clone()),
    };
    Ok(CreateControlResponse {
        created: bridge.registry().create(&spec),
    })
}

#[command]
pub(crate) async fn invoke_method<R: Runtime>(
    app: AppHandle<R>,
    payload: InvokeMethodRequest,
) -> Result<Option<String>> {
    let control = app
        .iap_bridge()
        .registry()
        .get(&payload.control_id)
        .ok_or_else(|| Error::UnknownControl(payload.control_id.clone()))?;
    Ok(control.invoke(&payload.method, &payload.args).await)
}

#[command]
pub(crate) async fn remove_control<R: Runtime>(
    app: AppHandle<R>,
    payload: RemoveControlRequest,
) -> Result<RemoveControlResponse> {
    Ok(RemoveControlResponse {
        removed: app.iap_bridge().registry().remove(&payload.id),
    })
}
