use std::sync::Arc;
use std::time::Instant;

use jailsync_core::Services;
use poem::http::{Method, StatusCode, Uri};
use poem::web::Data;
use poem::{Endpoint, FromRequest, IntoResponse, Request, Response};
use tracing::*;

pub fn get_client_ip(req: &Request, services: Option<&Services>) -> Option<String> {
    let trust_x_forwarded_headers = services
        .map(|s| s.config.store.http.trust_x_forwarded_headers)
        .unwrap_or(false);

    let remote_ip = req.remote_addr().as_socket_addr().map(|x| x.ip().to_string());

    if trust_x_forwarded_headers {
        req.header("x-forwarded-for")
            .map(|x| x.to_string())
            .or(remote_ip)
    } else {
        remote_ip
    }
}

fn log_request_result(
    method: &Method,
    url: &Uri,
    client_ip: Option<&str>,
    status: &StatusCode,
    started: Instant,
) {
    let client_ip = client_ip.unwrap_or("<unknown>");
    let elapsed = started.elapsed();
    if status.is_server_error() || status.is_client_error() {
        warn!(%method, %url, %status, %client_ip, ?elapsed, "Request failed");
    } else {
        info!(%method, %url, %status, %client_ip, ?elapsed, "Request");
    }
}

pub async fn log_requests<E: Endpoint>(ep: Arc<E>, req: Request) -> poem::Result<Response> {
    let services = Data::<&Services>::from_request_without_body(&req).await.ok();
    let client_ip = get_client_ip(&req, services.as_deref().copied());
    let method = req.method().clone();
    let url = req.uri().clone();
    let started = Instant::now();

    match ep.call(req).await {
        Ok(response) => {
            let response = response.into_response();
            log_request_result(&method, &url, client_ip.as_deref(), &response.status(), started);
            Ok(response)
        }
        Err(error) => {
            log_request_result(&method, &url, client_ip.as_deref(), &error.status(), started);
            Err(error)
        }
    }
}
