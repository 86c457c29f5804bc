pub mod ban;
pub mod bans;
pub mod check;
mod common;
pub mod global_ban;
pub mod run;
pub mod server;
pub mod sync;
