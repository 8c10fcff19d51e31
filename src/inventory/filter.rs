use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::SwitchDevice;

/// Devices sharing a /24.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetGroup {
    pub subnet: String,
    pub devices: Vec<SwitchDevice>,
}

/// Case-insensitive substring search over name, IP, vendor label and location.
///
/// An empty or whitespace-only query matches everything.
pub fn filter_devices(devices: &[SwitchDevice], query: &str) -> Vec<SwitchDevice> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return devices.to_vec();
    }

    devices
        .iter()
        .filter(|d| {
            [d.name.as_str(), d.ip.as_str(), d.vendor.label(), d.location.as_str()]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Grouping key: the first three octets plus `.0/24`, or the address
/// verbatim when it has fewer than three.
pub fn subnet_key(ip: &str) -> String {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() < 3 {
        return ip.to_string();
    }
    format!("{}.{}.{}.0/24", octets[0], octets[1], octets[2])
}

/// Group devices by /24, keys sorted, input order kept inside each group.
pub fn group_by_subnet(devices: &[SwitchDevice]) -> Vec<SubnetGroup> {
    let mut groups: BTreeMap<String, Vec<SwitchDevice>> = BTreeMap::new();
    for device in devices {
        groups
            .entry(subnet_key(&device.ip))
            .or_default()
            .push(device.clone());
    }

    groups
        .into_iter()
        .map(|(subnet, devices)| SubnetGroup { subnet, devices })
        .collect()
}
