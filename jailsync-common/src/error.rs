use poem::error::ResponseError;
use poem::http::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum JailsyncError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0} is unreachable: {1}")]
    Connectivity(&'static str, String),
    #[error("invalid {0}: {1}")]
    Validation(&'static str, String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("fail2ban error: {0}")]
    Adapter(String),
    #[error("deserialization failed: {0}")]
    DeserializeJson(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl JailsyncError {
    /// Stable, machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::Connectivity(..) | Self::Http(_) => "ConnectivityError",
            Self::Validation(..) | Self::DeserializeJson(_) | Self::UrlParse(_) => {
                "ValidationError"
            }
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::Database(_) | Self::Adapter(_) => "ServerError",
        }
    }
}

impl ResponseError for JailsyncError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(..) | Self::DeserializeJson(_) | Self::UrlParse(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
