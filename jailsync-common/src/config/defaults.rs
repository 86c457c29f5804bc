use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::ListenEndpoint;

pub(crate) const fn _default_false() -> bool {
    false
}

#[inline]
pub(crate) fn _default_server_ip() -> String {
    "127.0.0.1".to_owned()
}

#[inline]
pub(crate) fn _default_http_listen() -> ListenEndpoint {
    ListenEndpoint(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8888)))
}

#[inline]
pub(crate) fn _default_fail2ban_client() -> String {
    "fail2ban-client".to_owned()
}

#[inline]
pub(crate) fn _default_fail2ban_timeout() -> Duration {
    Duration::from_secs(10)
}

#[inline]
pub(crate) fn _default_central_timeout() -> Duration {
    Duration::from_secs(15)
}

#[inline]
pub(crate) fn _default_db_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

#[inline]
pub(crate) fn _default_db_acquire_timeout() -> Duration {
    Duration::from_secs(10)
}

pub(crate) const fn _default_db_max_connections() -> u32 {
    10
}
