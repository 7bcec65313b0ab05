//! Node address selection.

use std::cmp::Ordering;
use std::net::IpAddr;

use sluice_types::NodeId;

use crate::error::RegistryError;

/// Parse and order the addresses a node reports.
///
/// IPv4 addresses come first, then IPv6; within each family addresses are
/// ordered by their bytes. The sort is stable. Any unparsable address fails
/// the whole node, as does an empty list.
pub fn sort_addresses(node: &NodeId, reported: &[String]) -> Result<Vec<IpAddr>, RegistryError> {
    let mut addrs = reported
        .iter()
        .map(|raw| {
            raw.trim()
                .parse::<IpAddr>()
                .map(|ip| ip.to_canonical())
                .map_err(|_| RegistryError::InvalidAddress {
                    node: node.clone(),
                    address: raw.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if addrs.is_empty() {
        return Err(RegistryError::NoAddresses { node: node.clone() });
    }

    addrs.sort_by(compare);
    Ok(addrs)
}

/// The address used to reach a node: the first of [`sort_addresses`].
pub fn select_address(node: &NodeId, reported: &[String]) -> Result<IpAddr, RegistryError> {
    sort_addresses(node, reported)?
        .into_iter()
        .next()
        .ok_or_else(|| RegistryError::NoAddresses { node: node.clone() })
}

fn compare(a: &IpAddr, b: &IpAddr) -> Ordering {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => a.octets().cmp(&b.octets()),
        (IpAddr::V6(a), IpAddr::V6(b)) => a.octets().cmp(&b.octets()),
        (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Less,
        (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Greater,
    }
}
