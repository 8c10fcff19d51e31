use serde::Serialize;
use std::collections::HashSet;

use crate::models::{SwitchDevice, Vendor};

/// A named, vendor-tagged list of CLI commands offered for quick selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub vendor: Vendor,
    pub commands: &'static [&'static str],
}

pub const PRESETS: &[CommandPreset] = &[
    CommandPreset {
        id: "cisco-running-config",
        name: "Running configuration",
        vendor: Vendor::Cisco,
        commands: &["terminal length 0", "show running-config"],
    },
    CommandPreset {
        id: "cisco-inventory",
        name: "Version and inventory",
        vendor: Vendor::Cisco,
        commands: &["terminal length 0", "show version", "show inventory"],
    },
    CommandPreset {
        id: "huawei-current-config",
        name: "Current configuration",
        vendor: Vendor::Huawei,
        commands: &["screen-length 0 temporary", "display current-configuration"],
    },
    CommandPreset {
        id: "huawei-version",
        name: "Version and devices",
        vendor: Vendor::Huawei,
        commands: &["screen-length 0 temporary", "display version", "display device"],
    },
    CommandPreset {
        id: "juniper-config-set",
        name: "Configuration (set format)",
        vendor: Vendor::Juniper,
        commands: &["show configuration | display set | no-more"],
    },
    CommandPreset {
        id: "arista-running-config",
        name: "Running configuration",
        vendor: Vendor::Arista,
        commands: &["terminal length 0", "show running-config"],
    },
    CommandPreset {
        id: "hp-current-config",
        name: "Current configuration",
        vendor: Vendor::Hp,
        commands: &["screen-length disable", "display current-configuration"],
    },
];

pub fn preset(id: &str) -> Option<&'static CommandPreset> {
    PRESETS.iter().find(|p| p.id == id)
}

/// Presets applicable to the selected devices.
///
/// Nothing selected returns the whole catalog. Mixed selections get the
/// union of every selected vendor's presets.
pub fn filter_command_presets(selected: &[SwitchDevice]) -> Vec<&'static CommandPreset> {
    if selected.is_empty() {
        return PRESETS.iter().collect();
    }

    let vendors: HashSet<Vendor> = selected.iter().map(|d| d.vendor).collect();
    PRESETS.iter().filter(|p| vendors.contains(&p.vendor)).collect()
}
