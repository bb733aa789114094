//! Admin routes
//!
//! - `GET /status`
//! - `POST /backup/run`
//! - `POST /backup/export?comment=...`

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use crate::http::{url_decode, HttpRequest, HttpResponse, Method};
use crate::{AppState, VERSION};

/// Dispatch a request to its handler
pub async fn route(state: &Arc<AppState>, request: &HttpRequest) -> HttpResponse {
    match (request.method, request.path()) {
        (Method::Get, "/status") => status(state),
        (Method::Post, "/backup/run") => run_backup(state).await,
        (Method::Post, "/backup/export") => export_backups(state, request).await,
        _ => HttpResponse::error(404, "Not Found", "Not found"),
    }
}

fn status(state: &AppState) -> HttpResponse {
    HttpResponse::json(&json!({
        "server": state.config.server_name,
        "version": VERSION,
        "uptime_secs": state.uptime_secs(),
        "backup_running": state.backups.is_running(),
        "last_backup": state.backups.last_backup_time().to_rfc3339(),
    }))
}

async fn run_backup(state: &Arc<AppState>) -> HttpResponse {
    let state = Arc::clone(state);
    match tokio::task::spawn_blocking(move || state.backups.backup_now()).await {
        Ok(count) => HttpResponse::json(&json!({ "backed_up": count })),
        Err(e) => {
            error!(error = %e, "On-demand backup task failed");
            HttpResponse::error(500, "Internal Server Error", "Backup failed")
        }
    }
}

async fn export_backups(state: &Arc<AppState>, request: &HttpRequest) -> HttpResponse {
    // query parameter first, plain-text body as fallback
    let comment = match request.query("comment") {
        "" => String::from_utf8_lossy(request.body()).trim().to_string(),
        raw => url_decode(raw),
    };
    let job_state = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || {
        let job = job_state.backups.job();
        job.export_latest_into(&job.backup_dir().join("exports"), &comment)
    })
    .await;

    match result {
        Ok(Ok((entries, dest))) => {
            info!(archive = %dest.display(), entries, "Backup export written");
            HttpResponse::json(&json!({
                "entries": entries,
                "path": dest.display().to_string(),
            }))
        }
        Ok(Err(e)) => {
            error!(error = %e, "Backup export failed");
            HttpResponse::error(500, "Internal Server Error", &e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Backup export task failed");
            HttpResponse::error(500, "Internal Server Error", "Export failed")
        }
    }
}
