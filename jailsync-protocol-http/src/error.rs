use jailsync_common::protocol::ErrorResponse;
use jailsync_common::JailsyncError;
use poem::error::ResponseError;
use poem::web::Json;
use poem::{IntoResponse, Response};
use tracing::error;

/// Renders a [JailsyncError] as `{"error": kind, "message": text}`.
/// Server-side failures get a generic message.
#[derive(Debug)]
pub struct ApiError(pub JailsyncError);

impl From<JailsyncError> for ApiError {
    fn from(e: JailsyncError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let message = if status.is_server_error() {
            error!(error = %self.0, "Sync request failed");
            "Internal server error".to_owned()
        } else {
            self.0.to_string()
        };
        Json(ErrorResponse {
            error: self.0.kind().to_owned(),
            message,
        })
        .with_status(status)
        .into_response()
    }
}
