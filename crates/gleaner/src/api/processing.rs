use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    message: String,
}

/// Kicks off one processing cycle in the background and answers immediately.
/// Refused while the scheduler is missing or a store is unreachable; an
/// already running cycle is not an error, the trigger just coalesces into it.
pub async fn trigger(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TriggerResponse>), (StatusCode, String)> {
    tracing::info!("manual processing cycle requested");

    if state.scheduler.is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            "processing job is not registered".to_string(),
        ));
    }

    let source_ok = state.source.ping().await;
    let sink_ok = state.sink.ping().await;
    if !(source_ok && sink_ok) {
        tracing::error!(source_ok, sink_ok, "refusing manual trigger while stores are down");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "stores are not ready; check /health".to_string(),
        ));
    }

    let processor = state.processor.clone();
    tokio::spawn(async move {
        if processor.try_run().await.is_none() {
            tracing::warn!("a cycle is already running; manual trigger coalesced");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            message: "processing cycle started in the background".to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_requires_registered_job() {
        let (state, _source, _sink) = test_support::state(true, true, false);
        let err = trigger(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_trigger_refused_while_stores_down() {
        let (state, _source, _sink) = test_support::state(false, true, true);
        let err = trigger(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);

        let (state, _source, _sink) = test_support::state(true, false, true);
        let err = trigger(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_trigger_accepted_and_cycle_runs() {
        let (state, source, _sink) = test_support::state(true, true, true);
        let (status, Json(body)) = trigger(State(state)).await.unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.message.contains("background"));

        // The spawned cycle fetches from the source shortly after.
        for _ in 0..50 {
            if source.fetch_calls() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(source.fetch_calls() > 0);
    }
}
