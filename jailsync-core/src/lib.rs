pub mod agent;
pub mod db;
mod services;
mod store;

pub use services::*;
pub use store::*;
