use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use tracing::info;

use crate::engine::{Engine, EngineError};

/// One idempotent pass: materialize today's instance for every recurrence
/// template falling on today's weekday. Returns how many templates were
/// visited without error.
pub async fn materialize_today(engine: &Engine) -> Result<u32, EngineError> {
    let today = chrono::Utc::now().naive_utc().date();
    let mut visited = 0u32;
    for template in engine.recurrences_for_weekday(today.weekday()).await? {
        match engine.materialize(template.id, today).await {
            Ok(_) => visited += 1,
            Err(e) => {
                // A single bad template must not starve the rest
                tracing::debug!("backfill skip recurrence {}: {e}", template.id);
            }
        }
    }
    Ok(visited)
}

/// Background task that keeps today's agenda materialized from the weekly
/// templates. Safe at any cadence; materialization reuses existing
/// instances.
pub async fn run_backfill(engine: Arc<Engine>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        match materialize_today(&engine).await {
            Ok(visited) => info!("backfill pass complete: {visited} templates for today"),
            Err(e) => tracing::warn!("backfill pass failed: {e}"),
        }
    }
}
