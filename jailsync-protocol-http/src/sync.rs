use chrono::Utc;
use jailsync_common::protocol::{
    PingResponse, SyncAction, SyncRequest, SyncResponse, API_KEY_HEADER,
};
use jailsync_common::{ApiKey, JailsyncError};
use jailsync_core::{CentralStore, Services};
use jailsync_db_entities::Server;
use poem::web::{Data, Json};
use poem::{handler, Body, IntoResponse, Request, Response};
use sea_orm::DbErr;
use tracing::*;

use crate::error::ApiError;

pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Resolves the `X-API-Key` header to an active server. Runs before the
/// body is read, so rejected requests never touch data.
pub(crate) async fn authenticate(
    store: &CentralStore,
    header: Option<&str>,
) -> Result<Server::Model, JailsyncError> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(JailsyncError::Unauthorized("Missing API key"))?;
    let key: ApiKey = header.parse()?;

    let server = store
        .find_server_by_api_key(&key)
        .await?
        .ok_or(JailsyncError::Unauthorized("Invalid API key"))?;

    if !server.is_active {
        warn!(server = %server.server_name, "Rejected sync from inactive server");
        return Err(JailsyncError::Forbidden("Server is not active"));
    }
    Ok(server)
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, JailsyncError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(JailsyncError::Validation(field, "field is required".to_owned())),
    }
}

async fn handle(
    services: &Services,
    req: &Request,
    body: Body,
) -> Result<Response, JailsyncError> {
    let server = authenticate(&services.store, req.header(API_KEY_HEADER)).await?;

    let body = body
        .into_bytes_limit(MAX_BODY_SIZE)
        .await
        .map_err(|e| JailsyncError::Validation("request body", e.to_string()))?;
    let request: SyncRequest = serde_json::from_slice(&body)?;

    match SyncAction::parse(&request.action) {
        Some(SyncAction::Ping) => Ok(Json(PingResponse {
            status: "ok".to_owned(),
            message: "pong".to_owned(),
            server_id: server.id,
            server_name: server.server_name,
            timestamp: Utc::now(),
        })
        .into_response()),

        Some(SyncAction::Sync) => {
            let server_name = required(request.server_name.as_deref(), "server_name")?;
            let server_ip = required(request.server_ip.as_deref(), "server_ip")?;
            if server_name != server.server_name {
                warn!(
                    server = %server.server_name,
                    reported = %server_name,
                    "Sync request names a different server, using the API key owner"
                );
            }

            if !services.store.touch_server(server.id, &server_ip).await {
                return Err(JailsyncError::Database(DbErr::Custom(
                    "could not update server".to_owned(),
                )));
            }

            let report = services.store.apply_snapshot(server.id, &request.jails).await;
            info!(
                server = %server.server_name,
                jails = report.jails_processed,
                ips_synced = report.ips_synced,
                warnings = report.warnings.len(),
                "Sync received"
            );

            Ok(Json(SyncResponse {
                status: "success".to_owned(),
                message: "Data synced successfully".to_owned(),
                server_id: server.id,
                server_name: server.server_name,
                jails_processed: report.jails_processed,
                ips_synced: report.ips_synced,
                timestamp: Utc::now(),
                warnings: report.warnings,
            })
            .into_response())
        }

        None => Err(JailsyncError::Validation(
            "action",
            format!("{:?}", request.action),
        )),
    }
}

#[handler]
pub async fn sync_endpoint(req: &Request, body: Body, services: Data<&Services>) -> Response {
    match handle(&services, req, body).await {
        Ok(response) => response,
        Err(error) => ApiError(error).into_response(),
    }
}
