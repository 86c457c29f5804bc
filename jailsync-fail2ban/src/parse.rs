use std::net::IpAddr;

use crate::{AdapterError, BanOutcome};

fn value_after<'a>(output: &'a str, label: &str) -> Option<&'a str> {
    output
        .lines()
        .find_map(|line| line.find(label).map(|idx| &line[idx + label.len()..]))
        .map(str::trim)
}

/// `fail2ban-client status`
pub(crate) fn parse_jail_list(output: &str) -> Result<Vec<String>, AdapterError> {
    let list = value_after(output, "Jail list:")
        .ok_or_else(|| AdapterError::UnexpectedOutput(output.trim().to_owned()))?;
    Ok(list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect())
}

/// `fail2ban-client status <jail>`. Entries that are not IP addresses are dropped.
pub(crate) fn parse_banned_list(output: &str) -> Result<Vec<IpAddr>, AdapterError> {
    let list = value_after(output, "Banned IP list:")
        .ok_or_else(|| AdapterError::UnexpectedOutput(output.trim().to_owned()))?;
    Ok(list
        .split_whitespace()
        .filter_map(|entry| entry.parse().ok())
        .collect())
}

/// `fail2ban-client get <jail> <param>`
pub(crate) fn parse_number(output: &str) -> Option<i64> {
    output.lines().rev().map(str::trim).find(|l| !l.is_empty())?.parse().ok()
}

/// `fail2ban-client set <jail> banip|unbanip <ip>`, after a zero exit status.
/// Only `0` means nothing changed; some versions echo the IP instead of `1`.
pub(crate) fn parse_ban_outcome(output: &str) -> BanOutcome {
    match output.trim() {
        "0" => BanOutcome::Unchanged,
        _ => BanOutcome::Changed,
    }
}

pub(crate) fn is_pong(output: &str) -> bool {
    output.contains("pong")
}
