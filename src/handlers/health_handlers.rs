//! Liveness and readiness probes, mounted outside the auth layer.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

const PROBE_BYTES: &[u8] = b"readyz";

/// `GET /healthz`. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `GET /readyz`: 200 when SQLite answers and the upload directory is
/// writable, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite = check_sqlite(&state).await;
    let disk = check_upload_dir(&state.attachments.base_path).await;
    let ready = sqlite.ok && disk.ok;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        status: if ready { "ok" } else { "error" },
        checks: Checks { sqlite, disk },
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: Checks,
}

#[derive(Serialize)]
struct Checks {
    sqlite: CheckStatus,
    disk: CheckStatus,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CheckStatus {
    fn passed() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

async fn check_sqlite(state: &AppState) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(1) => CheckStatus::passed(),
        Ok(other) => CheckStatus::failed(format!("unexpected result: {}", other)),
        Err(err) => CheckStatus::failed(format!("query failed: {}", err)),
    }
}

/// Write, read back and remove a probe file next to the attachments.
async fn check_upload_dir(dir: &Path) -> CheckStatus {
    if let Err(err) = fs::create_dir_all(dir).await {
        return CheckStatus::failed(format!("could not create upload dir: {}", err));
    }

    let probe = dir.join(format!(".readyz-{}", Uuid::new_v4()));
    if let Err(err) = fs::write(&probe, PROBE_BYTES).await {
        return CheckStatus::failed(format!("could not write probe: {}", err));
    }

    let read_back = fs::read(&probe).await;
    if let Err(err) = fs::remove_file(&probe).await {
        tracing::warn!("could not remove readiness probe {}: {}", probe.display(), err);
    }

    match read_back {
        Ok(bytes) if bytes == PROBE_BYTES => CheckStatus::passed(),
        Ok(_) => CheckStatus::failed("probe content mismatch"),
        Err(err) => CheckStatus::failed(format!("could not read probe: {}", err)),
    }
}
