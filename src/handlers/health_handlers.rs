//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that writes and discards a probe object

use crate::{services::chunk_sink::StorageError, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// Never committed, so checks leave no object behind.
const PROBE_KEY: &str = ".readyz";
const PROBE_BODY: &[u8] = b"readyz";

/// `GET /healthz`
///
/// Liveness probe: always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Writes a small probe object through a fresh sink, discards it and checks
/// that the backend reports it absent. HTTP 200 when every step succeeds,
/// 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let storage_check = match probe(&state).await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(message) => CheckStatus {
            ok: false,
            error: Some(message),
        },
    };

    let overall_ok = storage_check.ok;
    let mut checks = HashMap::new();
    checks.insert(state.store.backend_name(), storage_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn probe(state: &AppState) -> Result<(), String> {
    let mut sink = state.store.sink();
    sink.open(PROBE_KEY)
        .await
        .map_err(|e| format!("could not open probe: {}", e))?;
    let written = sink.write(PROBE_BODY).await;
    sink.discard()
        .await
        .map_err(|e| format!("could not discard probe: {}", e))?;
    written.map_err(|e| format!("could not write probe: {}", e))?;

    match state.store.load(PROBE_KEY).await {
        Err(StorageError::NotFound(_)) => Ok(()),
        Ok(_) => Err("discarded probe is still visible".into()),
        Err(e) => Err(format!("could not read from backend: {}", e)),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
