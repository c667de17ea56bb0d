use std::sync::Arc;
use std::time::Duration;

use lookback_bridge::diagnostics::init_logger;
use lookback_bridge::testing::{MockEnvironment, MockNativeBridge};
use lookback_bridge::{
    CallbackValue, Lookback, LookbackConfig, NativeEvent, UPDATE_SETTING_EVENT,
};
use serde_json::json;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger("debug");

    println!("Lookback Bridge Example");
    println!("=======================");

    let native = Arc::new(MockNativeBridge::with_settings(
        json!({"shakeToRecord": true, "showIntroductionDialogs": false})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    ));
    let environment =
        Arc::new(MockEnvironment::new().with_initial_url("lookback-demo://participate?id=42"));

    let config = LookbackConfig::from_json(r#"{"diagnostics": {"verbose": true}}"#)?;
    let lookback = Lookback::with_config(native.clone(), environment.clone(), config);

    lookback.setup_with_app_token("demo-team-token");

    lookback
        .set_on_settings_update(CallbackValue::settings_observer(|update| {
            println!("Settings update: {}", json!(update));
        }))
        .await;

    lookback
        .set_on_started_upload(CallbackValue::upload_observer(|upload| {
            println!(
                "Upload to {} (session started {})",
                upload.destination_url, upload.session_started_at
            );
        }))
        .await;

    // Misuse is reported, not raised
    lookback.set_on_settings_update(CallbackValue::Value(json!("not a function"))).await;

    let report = lookback.setup_participate("lookback-demo").await.join().await?;
    println!("Participate setup: {:?}", report);

    let (tx, rx) = mpsc::unbounded_channel();
    let pump = lookback.attach(rx);

    tx.send(NativeEvent::from_named(UPDATE_SETTING_EVENT, json!({"recording": true}))?)?;
    tx.send(NativeEvent::from_named(
        "onStartedUpload",
        json!({
            "destinationURL": "https://lookback.io/watch/demo",
            "sessionStartedAt": "2024-03-01T09:30:00Z"
        }),
    )?)?;

    environment.emit_url("https://example.com/unrelated");
    environment.emit_url("lookback-demo://participate?id=43");

    drop(tx);
    pump.await?;

    let opened = native.wait_for_opened(2, Duration::from_secs(1)).await;
    println!("Links forwarded to the SDK: {:?}", opened);
    println!("Final settings: {}", json!(lookback.settings().await));

    Ok(())
}
