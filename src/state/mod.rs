//! Application state store.
//!
//! In-memory devices, backups and login templates kept consistent with the
//! gateway. Every mutation is write-through: the gateway call happens first
//! and the local collections change only when it succeeds. Mutations run
//! one at a time under the writer lock so the local order matches the
//! backend's; reads never wait on it.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::gateway::{Gateway, GatewayError};
use crate::inventory::{parse_device_csv, ImportError};
use crate::models::{
    ConfigBackup, DevicePatch, LoginTemplate, NewBackup, NewDevice, NewTemplate, SwitchDevice,
    TemplatePatch,
};

/// State store error types.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to load inventory: {0}")]
    Load(#[source] GatewayError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Import(#[from] ImportError),
}

#[derive(Debug, Default)]
struct Collections {
    devices: Vec<SwitchDevice>,
    backups: Vec<ConfigBackup>,
}

/// Per-row outcome of a CSV import that reached the gateway and failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    pub name: String,
    pub ip: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: Vec<SwitchDevice>,
    pub skipped: usize,
    pub failures: Vec<ImportFailure>,
}

/// Write-through cache of the inventory.
pub struct StateStore {
    gateway: Arc<dyn Gateway>,
    collections: RwLock<Collections>,
    templates: RwLock<Vec<LoginTemplate>>,
    writer: Mutex<()>,
}

impl StateStore {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            collections: RwLock::new(Collections::default()),
            templates: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> &'static str {
        self.gateway.mode()
    }

    // --- Loading ---

    /// Replace devices and backups with the gateway's view.
    ///
    /// Both lists are fetched concurrently and swapped in together; if either
    /// fetch fails the previous collections are kept.
    pub async fn load_all(&self) -> Result<(), StateError> {
        let _writer = self.writer.lock().await;
        self.load_all_locked().await
    }

    /// Re-read everything from the gateway, login templates included, e.g.
    /// after a batch job.
    pub async fn refresh_state(&self) -> Result<(), StateError> {
        let _writer = self.writer.lock().await;
        self.load_all_locked().await?;
        self.load_templates_locked().await.map_err(StateError::Load)?;
        Ok(())
    }

    async fn load_all_locked(&self) -> Result<(), StateError> {
        let (devices, backups) =
            tokio::try_join!(self.gateway.list_devices(), self.gateway.list_backups())
                .map_err(StateError::Load)?;

        tracing::debug!("Loaded {} devices and {} backups", devices.len(), backups.len());

        let mut collections = self.collections.write().await;
        collections.devices = devices;
        collections.backups = backups;
        Ok(())
    }

    // --- Queries ---

    pub async fn devices(&self) -> Vec<SwitchDevice> {
        self.collections.read().await.devices.clone()
    }

    pub async fn backups(&self) -> Vec<ConfigBackup> {
        self.collections.read().await.backups.clone()
    }

    pub async fn device(&self, id: &str) -> Option<SwitchDevice> {
        let collections = self.collections.read().await;
        collections.devices.iter().find(|d| d.id == id).cloned()
    }

    pub async fn backup(&self, id: &str) -> Option<ConfigBackup> {
        let collections = self.collections.read().await;
        collections.backups.iter().find(|b| b.id == id).cloned()
    }

    /// Read a device straight from the gateway.
    pub async fn fetch_device(&self, id: &str) -> Result<SwitchDevice, StateError> {
        Ok(self.gateway.get_device(id).await?)
    }

    /// Read a backup straight from the gateway.
    pub async fn fetch_backup(&self, id: &str) -> Result<ConfigBackup, StateError> {
        Ok(self.gateway.get_backup(id).await?)
    }

    // --- Devices ---

    /// Register a device. The backend-confirmed record is appended.
    pub async fn add_device(&self, device: NewDevice) -> Result<SwitchDevice, StateError> {
        if device.name.trim().is_empty() || device.ip.trim().is_empty() {
            return Err(StateError::Validation(
                "device name and IP are required".to_string(),
            ));
        }

        let _writer = self.writer.lock().await;
        let created = self.gateway.create_device(&device).await?;
        tracing::info!("Added device {} ({})", created.name, created.id);

        self.collections.write().await.devices.push(created.clone());
        Ok(created)
    }

    pub async fn update_device(&self, id: &str, patch: DevicePatch) -> Result<SwitchDevice, StateError> {
        let _writer = self.writer.lock().await;
        let updated = self.gateway.update_device(id, &patch).await?;

        let mut collections = self.collections.write().await;
        match collections.devices.iter_mut().find(|d| d.id == updated.id) {
            Some(slot) => *slot = updated.clone(),
            None => collections.devices.push(updated.clone()),
        }
        Ok(updated)
    }

    /// Delete a device. Its backups stay until the next load.
    pub async fn delete_device(&self, id: &str) -> Result<(), StateError> {
        let _writer = self.writer.lock().await;
        self.gateway.delete_device(id).await?;
        tracing::info!("Deleted device {}", id);

        self.collections.write().await.devices.retain(|d| d.id != id);
        Ok(())
    }

    pub async fn delete_devices(&self, ids: &[String]) -> Result<(), StateError> {
        if ids.is_empty() {
            return Err(StateError::Validation("no devices selected".to_string()));
        }

        let _writer = self.writer.lock().await;
        self.gateway.delete_devices(ids).await?;
        tracing::info!("Deleted {} devices", ids.len());

        self.collections
            .write()
            .await
            .devices
            .retain(|d| !ids.contains(&d.id));
        Ok(())
    }

    /// Register devices from CSV text, one gateway call per row in order.
    ///
    /// A row the gateway rejects is reported and does not stop later rows.
    pub async fn import_devices_csv(&self, text: &str) -> Result<ImportReport, StateError> {
        let parsed = parse_device_csv(text)?;
        let mut report = ImportReport {
            imported: Vec::with_capacity(parsed.devices.len()),
            skipped: parsed.skipped,
            failures: Vec::new(),
        };

        for device in parsed.devices {
            let (name, ip) = (device.name.clone(), device.ip.clone());
            match self.add_device(device).await {
                Ok(created) => report.imported.push(created),
                Err(e) => {
                    tracing::warn!("CSV import of {} ({}) failed: {}", name, ip, e);
                    report.failures.push(ImportFailure {
                        name,
                        ip,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "CSV import: {} imported, {} skipped, {} failed",
            report.imported.len(),
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }

    // --- Backups ---

    /// Store one device backup, then reload so the device's `last_backup`
    /// reflects the backend.
    pub async fn record_backup(&self, backup: NewBackup) -> Result<ConfigBackup, StateError> {
        if backup.switch_id.trim().is_empty() {
            return Err(StateError::Validation(
                "a backup must reference a device".to_string(),
            ));
        }
        if backup.content.trim().is_empty() {
            return Err(StateError::Validation("backup content is empty".to_string()));
        }

        let _writer = self.writer.lock().await;
        let created = self.gateway.create_backup(&backup).await?;
        tracing::info!("Recorded backup {} for device {}", created.id, created.switch_id);

        self.collections.write().await.backups.insert(0, created.clone());

        if let Err(e) = self.load_all_locked().await {
            tracing::warn!("Reload after backup {} failed: {}", created.id, e);
        }
        Ok(created)
    }

    pub async fn delete_backup(&self, id: &str) -> Result<(), StateError> {
        let _writer = self.writer.lock().await;
        self.gateway.delete_backup(id).await?;

        self.collections.write().await.backups.retain(|b| b.id != id);
        Ok(())
    }

    /// Raw backup bytes plus a file name for them.
    pub async fn download_backup(&self, id: &str) -> Result<(String, Vec<u8>), StateError> {
        let bytes = self.gateway.download_backup(id).await?;
        let filename = self
            .backup(id)
            .await
            .and_then(|b| b.filename)
            .unwrap_or_else(|| format!("{}.txt", id));
        Ok((filename, bytes))
    }

    // --- Login templates ---

    pub async fn load_templates(&self) -> Result<Vec<LoginTemplate>, StateError> {
        let _writer = self.writer.lock().await;
        Ok(self.load_templates_locked().await?)
    }

    async fn load_templates_locked(&self) -> Result<Vec<LoginTemplate>, GatewayError> {
        let templates = self.gateway.list_templates().await?;
        tracing::debug!("Loaded {} login templates", templates.len());
        *self.templates.write().await = templates.clone();
        Ok(templates)
    }

    pub async fn templates(&self) -> Vec<LoginTemplate> {
        self.templates.read().await.clone()
    }

    pub async fn template(&self, id: &str) -> Option<LoginTemplate> {
        self.templates.read().await.iter().find(|t| t.id == id).cloned()
    }

    pub async fn add_template(&self, template: NewTemplate) -> Result<LoginTemplate, StateError> {
        if template.name.trim().is_empty() || template.username.trim().is_empty() {
            return Err(StateError::Validation(
                "template name and username are required".to_string(),
            ));
        }
        if template.password.is_empty() {
            return Err(StateError::Validation("template password is required".to_string()));
        }

        let _writer = self.writer.lock().await;
        let created = self.gateway.create_template(&template).await?;
        tracing::info!("Added login template {} ({})", created.name, created.id);

        self.templates.write().await.push(created.clone());
        Ok(created)
    }

    pub async fn update_template(&self, id: &str, patch: TemplatePatch) -> Result<LoginTemplate, StateError> {
        let _writer = self.writer.lock().await;
        let updated = self.gateway.update_template(id, &patch).await?;

        let mut templates = self.templates.write().await;
        match templates.iter_mut().find(|t| t.id == updated.id) {
            Some(slot) => *slot = updated.clone(),
            None => templates.push(updated.clone()),
        }
        Ok(updated)
    }

    pub async fn delete_template(&self, id: &str) -> Result<(), StateError> {
        let _writer = self.writer.lock().await;
        self.gateway.delete_template(id).await?;

        self.templates.write().await.retain(|t| t.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vendor;
    use crate::testing::TestGateway;
    use std::sync::atomic::Ordering;

    fn new_device(name: &str, ip: &str) -> NewDevice {
        NewDevice {
            name: name.to_string(),
            ip: ip.to_string(),
            vendor: Vendor::Cisco,
            location: None,
        }
    }

    fn store() -> (Arc<TestGateway>, StateStore) {
        let gateway = Arc::new(TestGateway::new());
        let state = StateStore::new(gateway.clone());
        (gateway, state)
    }

    #[tokio::test]
    async fn test_add_device_appends_backend_record() {
        let (_gw, state) = store();
        state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        let before = state.devices().await.len();

        let created = state.add_device(new_device("SW2", "10.0.0.2")).await.unwrap();

        let devices = state.devices().await;
        assert_eq!(devices.len(), before + 1);
        assert_eq!(devices.iter().filter(|d| d.id == created.id).count(), 1);
        assert!(!created.id.is_empty());
    }

    #[tokio::test]
    async fn test_failed_add_leaves_collection_unchanged() {
        let (gw, state) = store();
        state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        let before = state.devices().await;

        // Duplicate IP is rejected by the backend
        let err = state.add_device(new_device("SW1-dup", "10.0.0.1")).await;
        assert!(matches!(err, Err(StateError::Gateway(_))));
        assert_eq!(state.devices().await, before);

        gw.fail_create_device.store(true, Ordering::SeqCst);
        let err = state.add_device(new_device("SW3", "10.0.0.3")).await;
        assert!(err.is_err());
        assert_eq!(state.devices().await, before);
    }

    #[tokio::test]
    async fn test_add_device_requires_name_and_ip() {
        let (gw, state) = store();
        let err = state.add_device(new_device("", "10.0.0.1")).await.unwrap_err();
        assert!(matches!(err, StateError::Validation(_)));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_all_is_all_or_nothing() {
        let (gw, state) = store();
        state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        state.load_all().await.unwrap();
        let before = state.devices().await;

        // A device the cache has not seen yet, then a failing backups fetch
        gw.inner()
            .create_device(&new_device("SW2", "10.0.0.2"))
            .await
            .unwrap();
        gw.fail_list_backups.store(true, Ordering::SeqCst);

        let err = state.load_all().await.unwrap_err();
        assert!(matches!(err, StateError::Load(_)));
        assert_eq!(state.devices().await, before);
    }

    #[tokio::test]
    async fn test_load_all_is_idempotent() {
        let (_gw, state) = store();
        let dev = state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        state
            .record_backup(NewBackup {
                switch_id: dev.id.clone(),
                content: "hostname SW1".to_string(),
                filename: None,
                commands: vec![],
                template_name: None,
            })
            .await
            .unwrap();

        state.load_all().await.unwrap();
        let first = (state.devices().await, state.backups().await);
        state.load_all().await.unwrap();
        let second = (state.devices().await, state.backups().await);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_delete_device_keeps_backups() {
        let (_gw, state) = store();
        let dev = state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        state
            .record_backup(NewBackup {
                switch_id: dev.id.clone(),
                content: "X".to_string(),
                filename: None,
                commands: vec![],
                template_name: None,
            })
            .await
            .unwrap();

        state.delete_device(&dev.id).await.unwrap();
        assert!(state.device(&dev.id).await.is_none());
        assert_eq!(state.backups().await.len(), 1);

        let err = state.delete_device(&dev.id).await.unwrap_err();
        assert!(matches!(err, StateError::Gateway(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_record_backup_refreshes_last_backup() {
        let (_gw, state) = store();
        let dev = state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        assert!(dev.last_backup.is_none());

        let backup = state
            .record_backup(NewBackup {
                switch_id: dev.id.clone(),
                content: "X".to_string(),
                filename: None,
                commands: vec!["show run".to_string()],
                template_name: None,
            })
            .await
            .unwrap();

        let dev = state.device(&dev.id).await.unwrap();
        assert_eq!(
            dev.last_backup,
            Some(backup.timestamp.format("%Y-%m-%d").to_string())
        );
        assert_eq!(state.backups().await[0].id, backup.id);
        assert_eq!(state.fetch_backup(&backup.id).await.unwrap().content, "X");
    }

    #[tokio::test]
    async fn test_record_backup_without_device_is_rejected_locally() {
        let (gw, state) = store();
        let err = state
            .record_backup(NewBackup {
                switch_id: "  ".to_string(),
                content: "X".to_string(),
                filename: None,
                commands: vec![],
                template_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Validation(_)));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_import_csv_reports_rows() {
        let (_gw, state) = store();
        state.add_device(new_device("Existing", "10.0.0.9")).await.unwrap();

        let csv = "name,ip,vendor,location\n\
                   SW1,10.0.0.1,Cisco IOS,Rack1\n\
                   ,10.0.0.2,,\n\
                   Dup,10.0.0.9,Arista EOS,\n";
        let report = state.import_devices_csv(csv).await.unwrap();

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.imported[0].name, "SW1");
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ip, "10.0.0.9");
        assert_eq!(state.devices().await.len(), 2);
    }

    #[tokio::test]
    async fn test_template_cache_is_write_through() {
        let (_gw, state) = store();
        let created = state
            .add_template(NewTemplate {
                name: "core".to_string(),
                username: "admin".to_string(),
                password: crate::models::Password::new("pw"),
                port: Some(2222),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(state.template(&created.id).await.unwrap().port, 2222);

        let updated = state
            .update_template(
                &created.id,
                TemplatePatch {
                    name: Some("core-ro".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "core-ro");
        assert_eq!(state.templates().await, vec![updated]);

        state.delete_template(&created.id).await.unwrap();
        assert!(state.templates().await.is_empty());
        assert!(state.load_templates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_device_replaces_entry() {
        let (_gw, state) = store();
        let first = state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        let second = state.add_device(new_device("SW2", "10.0.0.2")).await.unwrap();

        let updated = state
            .update_device(
                &first.id,
                DevicePatch {
                    name: Some("SW1-renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, first.id);
        assert_eq!(updated.ip, "10.0.0.1");

        let devices = state.devices().await;
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0], updated);
        assert_eq!(devices[1], second);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_collection_unchanged() {
        let (gw, state) = store();
        let dev = state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        state.add_device(new_device("SW2", "10.0.0.2")).await.unwrap();
        let before = state.devices().await;

        // Taking another device's IP is a backend conflict
        let err = state
            .update_device(
                &dev.id,
                DevicePatch {
                    ip: Some("10.0.0.2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Gateway(_)));
        assert_eq!(state.devices().await, before);

        gw.fail_mutations.store(true, Ordering::SeqCst);
        let err = state
            .update_device(
                &dev.id,
                DevicePatch {
                    name: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(err.is_err());
        assert_eq!(state.devices().await, before);

        gw.fail_mutations.store(false, Ordering::SeqCst);
        let err = state
            .update_device("ghost", DevicePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Gateway(ref e) if e.is_not_found()));
        assert_eq!(state.devices().await, before);
    }

    #[tokio::test]
    async fn test_delete_devices_removes_only_on_success() {
        let (gw, state) = store();
        let a = state.add_device(new_device("SW1", "10.0.0.1")).await.unwrap();
        let b = state.add_device(new_device("SW2", "10.0.0.2")).await.unwrap();
        let c = state.add_device(new_device("SW3", "10.0.0.3")).await.unwrap();
        let before = state.devices().await;

        gw.fail_mutations.store(true, Ordering::SeqCst);
        let err = state.delete_devices(&[a.id.clone(), b.id.clone()]).await;
        assert!(matches!(err, Err(StateError::Gateway(_))));
        assert_eq!(state.devices().await, before);

        gw.fail_mutations.store(false, Ordering::SeqCst);
        state.delete_devices(&[a.id.clone(), b.id.clone()]).await.unwrap();
        assert_eq!(state.devices().await, vec![c]);
        assert_eq!(gw.inner().list_devices().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_devices_requires_selection() {
        let (gw, state) = store();
        let err = state.delete_devices(&[]).await.unwrap_err();
        assert!(matches!(err, StateError::Validation(_)));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_state_picks_up_new_templates() {
        let (gw, state) = store();
        state.load_templates().await.unwrap();
        assert!(state.templates().await.is_empty());

        // Created on the backend after the cache was filled
        let created = gw
            .inner()
            .create_template(&NewTemplate {
                name: "edge".to_string(),
                username: "ops".to_string(),
                password: crate::models::Password::new("pw"),
                port: None,
                description: None,
            })
            .await
            .unwrap();

        state.refresh_state().await.unwrap();
        assert_eq!(state.template(&created.id).await.unwrap().name, "edge");
    }
}
