#![allow(non_snake_case)]

pub mod AuditLogEntry;
pub mod BannedIp;
pub mod GlobalBan;
pub mod Jail;
pub mod Server;
