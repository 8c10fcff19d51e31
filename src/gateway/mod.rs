//! Remote data gateway.
//!
//! Translates domain operations into backend calls and normalizes the
//! backend's snake_case records into domain entities. Two implementations:
//! [`HttpGateway`] for a REST backend and [`LocalGateway`] for local mode.

mod http;
mod local;

pub use http::*;
pub use local::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{
    parse_timestamp, BackupCreate, BackupJobRequest, BackupJobResult, BackupRecord, DeviceCreate,
    DeviceRecord, DeviceUpdate, JobTemplate, StoreError, TemplateCreate, TemplateRecord,
    TemplateUpdate,
};
use crate::models::{
    BackupJob, ConfigBackup, DevicePatch, LoginTemplate, NewBackup, NewDevice, NewTemplate,
    Password, SwitchDevice, TemplatePatch, Vendor, DEFAULT_LOCATION, DEFAULT_SSH_PORT,
};

/// Gateway error types.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("invalid backend response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Backend { status: 404, .. })
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => GatewayError::Backend {
                status: 404,
                message: format!("{} not found", what),
            },
            StoreError::Conflict(message) => GatewayError::Backend { status: 409, message },
            other => GatewayError::Backend {
                status: 500,
                message: other.to_string(),
            },
        }
    }
}

/// Backend operations over the four resource collections.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Short label for logs and the health endpoint.
    fn mode(&self) -> &'static str;

    async fn list_devices(&self) -> Result<Vec<SwitchDevice>, GatewayError>;
    async fn get_device(&self, id: &str) -> Result<SwitchDevice, GatewayError>;
    async fn create_device(&self, device: &NewDevice) -> Result<SwitchDevice, GatewayError>;
    async fn update_device(&self, id: &str, patch: &DevicePatch) -> Result<SwitchDevice, GatewayError>;
    async fn delete_device(&self, id: &str) -> Result<(), GatewayError>;
    async fn delete_devices(&self, ids: &[String]) -> Result<(), GatewayError>;

    async fn list_backups(&self) -> Result<Vec<ConfigBackup>, GatewayError>;
    async fn get_backup(&self, id: &str) -> Result<ConfigBackup, GatewayError>;
    async fn create_backup(&self, backup: &NewBackup) -> Result<ConfigBackup, GatewayError>;
    async fn delete_backup(&self, id: &str) -> Result<(), GatewayError>;
    async fn download_backup(&self, id: &str) -> Result<Vec<u8>, GatewayError>;

    async fn list_templates(&self) -> Result<Vec<LoginTemplate>, GatewayError>;
    async fn create_template(&self, template: &NewTemplate) -> Result<LoginTemplate, GatewayError>;
    async fn update_template(&self, id: &str, patch: &TemplatePatch) -> Result<LoginTemplate, GatewayError>;
    async fn delete_template(&self, id: &str) -> Result<(), GatewayError>;

    async fn execute_backup_job(&self, job: &BackupJob) -> Result<BackupJobResult, GatewayError>;
}

// ============================================================================
// Record -> entity
// ============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reduce a backend timestamp to an ISO date (`YYYY-MM-DD`).
pub(crate) fn date_only(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(t) = parse_timestamp(raw) {
        return Some(t.format("%Y-%m-%d").to_string());
    }
    chrono::NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

pub(crate) fn device_from_record(record: DeviceRecord) -> SwitchDevice {
    let vendor = Vendor::parse(&record.vendor).unwrap_or_else(|| {
        tracing::warn!(
            "Device {} has unknown vendor {:?}, using {}",
            record.id,
            record.vendor,
            Vendor::default()
        );
        Vendor::default()
    });

    SwitchDevice {
        last_backup: date_only(record.last_backup.as_deref()),
        location: non_empty(record.location).unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        id: record.id,
        name: record.name,
        ip: record.ip,
        vendor,
    }
}

pub(crate) fn backup_from_record(record: BackupRecord) -> ConfigBackup {
    let timestamp = parse_timestamp(&record.timestamp).unwrap_or_else(|| {
        tracing::warn!(
            "Backup {} has unparseable timestamp {:?}",
            record.id,
            record.timestamp
        );
        Default::default()
    });

    ConfigBackup {
        id: record.id,
        switch_id: record.switch_id,
        timestamp,
        content: record.content,
        filename: non_empty(record.filename),
        commands: record.commands,
        template_name: non_empty(record.template_name),
    }
}

pub(crate) fn template_from_record(record: TemplateRecord) -> LoginTemplate {
    LoginTemplate {
        id: record.id,
        name: record.name,
        username: record.username,
        password: Password::new(record.password),
        port: if record.port == 0 { DEFAULT_SSH_PORT } else { record.port },
        description: non_empty(record.description),
    }
}

// ============================================================================
// Entity -> request body
// ============================================================================

pub(crate) fn device_create(device: &NewDevice) -> DeviceCreate {
    DeviceCreate {
        name: device.name.trim().to_string(),
        ip: device.ip.trim().to_string(),
        vendor: device.vendor.label().to_string(),
        location: non_empty(device.location.clone()).unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
    }
}

pub(crate) fn device_update(patch: &DevicePatch) -> DeviceUpdate {
    DeviceUpdate {
        name: non_empty(patch.name.clone()),
        ip: non_empty(patch.ip.clone()),
        vendor: patch.vendor.map(|v| v.label().to_string()),
        location: non_empty(patch.location.clone()),
    }
}

pub(crate) fn backup_create(backup: &NewBackup) -> BackupCreate {
    BackupCreate {
        switch_id: backup.switch_id.clone(),
        content: backup.content.clone(),
        filename: non_empty(backup.filename.clone()),
        commands: backup.commands.clone(),
        template_name: non_empty(backup.template_name.clone()),
    }
}

pub(crate) fn template_create(template: &NewTemplate) -> TemplateCreate {
    TemplateCreate {
        name: template.name.clone(),
        username: template.username.clone(),
        password: template.password.expose().to_string(),
        port: template.port.filter(|p| *p > 0).unwrap_or(DEFAULT_SSH_PORT),
        description: template.description.clone().unwrap_or_default(),
    }
}

pub(crate) fn template_update(patch: &TemplatePatch) -> TemplateUpdate {
    TemplateUpdate {
        name: patch.name.clone(),
        username: patch.username.clone(),
        password: patch
            .password
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| p.expose().to_string()),
        port: patch.port,
        description: patch.description.clone(),
    }
}

/// Build the job body. Credentials travel in clear to the backend.
pub(crate) fn job_request(job: &BackupJob) -> BackupJobRequest {
    BackupJobRequest {
        device_ids: job.device_ids.clone(),
        commands: job.commands.clone(),
        template: JobTemplate {
            id: job.template.id.clone(),
            name: job.template.name.clone(),
            username: job.template.username.clone(),
            password: job.template.password.expose().to_string(),
            port: job.template.port,
        },
        backup_path: non_empty(job.backup_path.clone()),
    }
}
