mod api_key;
mod listen_endpoint;
mod secret;

pub use api_key::ApiKey;
pub use listen_endpoint::ListenEndpoint;
pub use secret::Secret;
