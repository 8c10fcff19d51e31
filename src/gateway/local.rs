//! Local-mode gateway backed by the embedded SQLite store.

use async_trait::async_trait;
use uuid::Uuid;

use super::*;
use crate::db::{JobDeviceError, Store};

const NO_CONNECTIVITY: &str =
    "device connectivity is unavailable in local mode; run the commands from a management host";

/// Gateway used when no REST backend is configured.
#[derive(Clone)]
pub struct LocalGateway {
    store: Store,
}

impl LocalGateway {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Gateway for LocalGateway {
    fn mode(&self) -> &'static str {
        "local"
    }

    async fn list_devices(&self) -> Result<Vec<SwitchDevice>, GatewayError> {
        let records = self.store.get_devices()?;
        Ok(records.into_iter().map(device_from_record).collect())
    }

    async fn get_device(&self, id: &str) -> Result<SwitchDevice, GatewayError> {
        Ok(device_from_record(self.store.get_device(id)?))
    }

    async fn create_device(&self, device: &NewDevice) -> Result<SwitchDevice, GatewayError> {
        let record = self.store.add_device(&device_create(device))?;
        Ok(device_from_record(record))
    }

    async fn update_device(&self, id: &str, patch: &DevicePatch) -> Result<SwitchDevice, GatewayError> {
        let record = self.store.update_device(id, &device_update(patch))?;
        Ok(device_from_record(record))
    }

    async fn delete_device(&self, id: &str) -> Result<(), GatewayError> {
        Ok(self.store.delete_device(id)?)
    }

    async fn delete_devices(&self, ids: &[String]) -> Result<(), GatewayError> {
        let deleted = self.store.delete_devices(ids)?;
        tracing::debug!("Local store deleted {} of {} devices", deleted, ids.len());
        Ok(())
    }

    async fn list_backups(&self) -> Result<Vec<ConfigBackup>, GatewayError> {
        let records = self.store.get_backups()?;
        Ok(records.into_iter().map(backup_from_record).collect())
    }

    async fn get_backup(&self, id: &str) -> Result<ConfigBackup, GatewayError> {
        Ok(backup_from_record(self.store.get_backup(id)?))
    }

    async fn create_backup(&self, backup: &NewBackup) -> Result<ConfigBackup, GatewayError> {
        let record = self.store.add_backup(&backup_create(backup))?;
        Ok(backup_from_record(record))
    }

    async fn delete_backup(&self, id: &str) -> Result<(), GatewayError> {
        Ok(self.store.delete_backup(id)?)
    }

    async fn download_backup(&self, id: &str) -> Result<Vec<u8>, GatewayError> {
        Ok(self.store.get_backup(id)?.content.into_bytes())
    }

    async fn list_templates(&self) -> Result<Vec<LoginTemplate>, GatewayError> {
        let records = self.store.get_templates()?;
        Ok(records.into_iter().map(template_from_record).collect())
    }

    async fn create_template(&self, template: &NewTemplate) -> Result<LoginTemplate, GatewayError> {
        let record = self.store.add_template(&template_create(template))?;
        Ok(template_from_record(record))
    }

    async fn update_template(&self, id: &str, patch: &TemplatePatch) -> Result<LoginTemplate, GatewayError> {
        let record = self.store.update_template(id, &template_update(patch))?;
        Ok(template_from_record(record))
    }

    async fn delete_template(&self, id: &str) -> Result<(), GatewayError> {
        Ok(self.store.delete_template(id)?)
    }

    /// Every device is reported as failed: local mode never opens sessions.
    async fn execute_backup_job(&self, job: &BackupJob) -> Result<BackupJobResult, GatewayError> {
        if job.device_ids.is_empty() {
            return Err(GatewayError::Backend {
                status: 400,
                message: "No devices selected".to_string(),
            });
        }
        if job.commands.is_empty() {
            return Err(GatewayError::Backend {
                status: 400,
                message: "No commands provided".to_string(),
            });
        }

        let mut errors = Vec::with_capacity(job.device_ids.len());
        for device_id in &job.device_ids {
            let error = match self.store.get_device(device_id) {
                Ok(_) => NO_CONNECTIVITY.to_string(),
                Err(StoreError::NotFound(_)) => "Device not found".to_string(),
                Err(e) => e.to_string(),
            };
            errors.push(JobDeviceError {
                device_id: device_id.clone(),
                error,
            });
        }

        Ok(BackupJobResult {
            job_id: Uuid::new_v4().to_string(),
            total: job.device_ids.len(),
            success: 0,
            failed: errors.len(),
            results: Vec::new(),
            errors,
        })
    }
}
