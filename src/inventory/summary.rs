use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ConfigBackup, SwitchDevice, Vendor};

const RECENT_BACKUPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorCount {
    pub vendor: Vendor,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentBackup {
    pub id: String,
    pub switch_id: String,
    pub device_name: Option<String>,
    pub vendor: Option<Vendor>,
    pub timestamp: DateTime<Utc>,
    pub filename: Option<String>,
}

/// Dashboard figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub device_count: usize,
    pub backup_count: usize,
    /// Share of devices with at least one backup, 0-100.
    pub coverage_percent: u32,
    pub vendors: Vec<VendorCount>,
    pub recent_backups: Vec<RecentBackup>,
}

pub fn summarize(devices: &[SwitchDevice], backups: &[ConfigBackup]) -> InventorySummary {
    let covered = devices.iter().filter(|d| d.last_backup.is_some()).count();
    let coverage_percent = (covered as f64 * 100.0 / devices.len().max(1) as f64).round() as u32;

    let vendors = Vendor::ALL
        .into_iter()
        .map(|vendor| VendorCount {
            vendor,
            count: devices.iter().filter(|d| d.vendor == vendor).count(),
        })
        .filter(|vc| vc.count > 0)
        .collect();

    let mut recent: Vec<&ConfigBackup> = backups.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let recent_backups = recent
        .into_iter()
        .take(RECENT_BACKUPS)
        .map(|b| {
            let device = devices.iter().find(|d| d.id == b.switch_id);
            RecentBackup {
                id: b.id.clone(),
                switch_id: b.switch_id.clone(),
                device_name: device.map(|d| d.name.clone()),
                vendor: device.map(|d| d.vendor),
                timestamp: b.timestamp,
                filename: b.filename.clone(),
            }
        })
        .collect();

    InventorySummary {
        device_count: devices.len(),
        backup_count: backups.len(),
        coverage_percent,
        vendors,
        recent_backups,
    }
}
