//! Backend record types.
//!
//! These mirror the REST backend's snake_case JSON bodies. The local store
//! produces the same records so both gateways share one normalization path.

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    crate::models::DEFAULT_SSH_PORT
}

/// A device as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub vendor: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub last_backup: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCreate {
    pub name: String,
    pub ip: String,
    pub vendor: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    pub device_ids: Vec<String>,
}

/// A configuration backup as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub switch_id: String,
    pub timestamp: String,
    pub content: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub template_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCreate {
    pub switch_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
}

/// A login template as returned by the backend. The password is in clear.
#[derive(Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TemplateCreate {
    pub name: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub description: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TemplateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Template block embedded in a backup job request.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub port: u16,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackupJobRequest {
    pub device_ids: Vec<String>,
    pub commands: Vec<String>,
    pub template: JobTemplate,
    #[serde(default)]
    pub backup_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDeviceResult {
    pub device_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDeviceError {
    pub device_id: String,
    pub error: String,
}

/// Outcome of a batch backup job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJobResult {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    #[serde(default)]
    pub results: Vec<JobDeviceResult>,
    #[serde(default)]
    pub errors: Vec<JobDeviceError>,
}
