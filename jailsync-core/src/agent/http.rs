use jailsync_common::protocol::{
    ErrorResponse, JailDescriptor, PingResponse, SyncAction, SyncRequest, SyncResponse,
    API_KEY_HEADER,
};
use jailsync_common::{CentralConfig, JailsyncError, Secret};
use jailsync_db_entities::GlobalBan;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::target::{ResolvedServer, ServerIdentity, SyncTarget};
use crate::SyncReport;

/// Pushes through the central `POST /sync` endpoint
pub struct HttpTarget {
    client: reqwest::Client,
    url: Url,
    api_key: Secret<String>,
}

impl HttpTarget {
    pub fn new(config: &CentralConfig) -> Result<Self, JailsyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.sync_url()?,
            api_key: config.api_key.clone(),
        })
    }

    async fn send<R: DeserializeOwned>(&self, request: &SyncRequest) -> Result<R, JailsyncError> {
        debug!(url = %self.url, action = %request.action, "Sending sync request");
        let response = self
            .client
            .post(self.url.clone())
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn error_from_response(status: u16, body: &str) -> JailsyncError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_owned());
    match status {
        401 | 403 => JailsyncError::Configuration(format!(
            "central endpoint rejected the API key ({status}): {message}"
        )),
        400..=499 => JailsyncError::Validation("sync request", message),
        _ => JailsyncError::Connectivity("central endpoint", format!("{status}: {message}")),
    }
}

#[async_trait::async_trait]
impl SyncTarget for HttpTarget {
    fn describe(&self) -> String {
        format!("endpoint {}", self.url)
    }

    async fn check(&self) -> Result<(), JailsyncError> {
        self.send::<PingResponse>(&SyncRequest::ping()).await.map(|_| ())
    }

    async fn resolve_server(
        &self,
        identity: &ServerIdentity,
    ) -> Result<ResolvedServer, JailsyncError> {
        let pong: PingResponse = self.send(&SyncRequest::ping()).await?;
        if pong.server_name != identity.name {
            warn!(
                configured = %identity.name,
                central = %pong.server_name,
                "API key belongs to a differently named server"
            );
        }
        Ok(ResolvedServer {
            id: pong.server_id,
            name: pong.server_name,
        })
    }

    async fn push(
        &self,
        _server: &ResolvedServer,
        identity: &ServerIdentity,
        jails: Vec<JailDescriptor>,
    ) -> Result<SyncReport, JailsyncError> {
        let request = SyncRequest {
            action: SyncAction::Sync.as_str().to_owned(),
            server_name: Some(identity.name.clone()),
            server_ip: Some(identity.ip.clone()),
            jails,
        };
        let response: SyncResponse = self.send(&request).await?;
        Ok(SyncReport {
            jails_processed: response.jails_processed,
            ips_synced: response.ips_synced,
            warnings: response.warnings,
        })
    }

    async fn global_bans(&self) -> Result<Vec<GlobalBan::Model>, JailsyncError> {
        Err(JailsyncError::Configuration(
            "global bans can only be applied with a database connection".to_owned(),
        ))
    }
}
