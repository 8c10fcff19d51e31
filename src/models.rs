//! Domain entities shared by the state store, the orchestrator and the web layer.
//!
//! These are the normalized, camelCase shapes. Backend wire records live in
//! `db::models` and are converted by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default location for devices registered without one.
pub const DEFAULT_LOCATION: &str = "unknown";

/// Default SSH port for login templates.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Switch operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Vendor {
    #[serde(rename = "Cisco IOS")]
    Cisco,
    #[serde(rename = "Huawei VRP")]
    Huawei,
    #[serde(rename = "Juniper Junos")]
    Juniper,
    #[serde(rename = "Arista EOS")]
    Arista,
    #[serde(rename = "HP Comware")]
    Hp,
}

impl Vendor {
    /// All vendors in declaration order.
    pub const ALL: [Vendor; 5] = [
        Vendor::Cisco,
        Vendor::Huawei,
        Vendor::Juniper,
        Vendor::Arista,
        Vendor::Hp,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Vendor::Cisco => "Cisco IOS",
            Vendor::Huawei => "Huawei VRP",
            Vendor::Juniper => "Juniper Junos",
            Vendor::Arista => "Arista EOS",
            Vendor::Hp => "HP Comware",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            Vendor::Cisco => "cisco",
            Vendor::Huawei => "huawei",
            Vendor::Juniper => "juniper",
            Vendor::Arista => "arista",
            Vendor::Hp => "hp",
        }
    }

    /// Match a label or short name, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Vendor> {
        let needle = s.trim();
        Vendor::ALL.into_iter().find(|v| {
            v.label().eq_ignore_ascii_case(needle) || v.short_name().eq_ignore_ascii_case(needle)
        })
    }

    /// Like [`Vendor::parse`], falling back to the first vendor.
    pub fn parse_or_default(s: &str) -> Vendor {
        Vendor::parse(s).unwrap_or_default()
    }
}

impl Default for Vendor {
    fn default() -> Self {
        Vendor::ALL[0]
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A registered switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDevice {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub vendor: Vendor,
    pub location: String,
    /// Date of the most recent backup (`YYYY-MM-DD`), maintained by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<String>,
}

/// Input for registering a device. Identity is assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub vendor: Vendor,
    #[serde(default)]
    pub location: Option<String>,
}

/// Partial device update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePatch {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub vendor: Option<Vendor>,
    pub location: Option<String>,
}

/// A stored configuration snapshot. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBackup {
    pub id: String,
    pub switch_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
}

/// Input for recording a backup of one device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBackup {
    pub switch_id: String,
    pub content: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub template_name: Option<String>,
}

/// Login secret for a template.
///
/// Zeroized on drop and masked in `Debug` and `Serialize` output. The clear
/// value is only reachable through [`Password::expose`], which the gateway
/// uses when building backend requests.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Password(String);

impl Password {
    pub const MASK: &'static str = "********";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(")?;
        f.write_str(Self::MASK)?;
        f.write_str(")")
    }
}

impl Serialize for Password {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::MASK)
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Password)
    }
}

/// Named SSH credentials used to authenticate batch jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginTemplate {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password: Password,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    pub username: String,
    pub password: Password,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<Password>,
    pub port: Option<u16>,
    pub description: Option<String>,
}

/// A batch backup job as handed to the gateway.
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub device_ids: Vec<String>,
    pub commands: Vec<String>,
    pub template: LoginTemplate,
    pub backup_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_labels_round_trip_through_serde() {
        for vendor in Vendor::ALL {
            let json = serde_json::to_string(&vendor).unwrap();
            assert_eq!(json, format!("\"{}\"", vendor.label()));
            let back: Vendor = serde_json::from_str(&json).unwrap();
            assert_eq!(back, vendor);
        }
    }

    #[test]
    fn test_vendor_parse() {
        assert_eq!(Vendor::parse("huawei vrp"), Some(Vendor::Huawei));
        assert_eq!(Vendor::parse(" Arista "), Some(Vendor::Arista));
        assert_eq!(Vendor::parse("HP"), Some(Vendor::Hp));
        assert_eq!(Vendor::parse("Nokia SR OS"), None);
        assert_eq!(Vendor::parse_or_default("Nokia SR OS"), Vendor::Cisco);
    }

    #[test]
    fn test_password_is_masked() {
        let template = LoginTemplate {
            id: "t1".to_string(),
            name: "core".to_string(),
            username: "admin".to_string(),
            password: Password::new("hunter2"),
            port: DEFAULT_SSH_PORT,
            description: None,
        };

        let debug = format!("{:?}", template);
        assert!(!debug.contains("hunter2"));

        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["password"], Password::MASK);
        assert_eq!(template.password.expose(), "hunter2");
    }

    #[test]
    fn test_new_device_defaults() {
        let dev: NewDevice =
            serde_json::from_str(r#"{"name":"SW1","ip":"10.0.0.1"}"#).unwrap();
        assert_eq!(dev.vendor, Vendor::Cisco);
        assert!(dev.location.is_none());
    }
}
