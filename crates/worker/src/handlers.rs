use pgjobs::jobs::{boxed, HandlerRegistry};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Deserialize)]
struct SleepPayload {
    millis: u64,
}

/// Demo handlers. Replace these with your real tasks; names are dotted so
/// consumers can partition them with topic patterns ("demo.%").
pub fn build_registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    registry.register("demo.echo", |body| boxed(async move { Ok(body) }));

    registry.register("demo.sleep", |body| {
        boxed(async move {
            let payload: SleepPayload = serde_json::from_value(body)?;
            tokio::time::sleep(Duration::from_millis(payload.millis)).await;
            Ok(json!({ "slept_ms": payload.millis }))
        })
    });

    registry.register("demo.fail", |_body| {
        boxed(async move { anyhow::bail!("simulated failure") })
    });

    Arc::new(registry)
}
