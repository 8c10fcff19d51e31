//! Test doubles shared by the state, orchestrator and web tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tokio::sync::Notify;

use crate::db::{BackupJobResult, Store};
use crate::gateway::{Gateway, GatewayError, LocalGateway};
use crate::models::{
    BackupJob, ConfigBackup, DevicePatch, LoginTemplate, NewBackup, NewDevice, NewTemplate,
    SwitchDevice, TemplatePatch,
};

/// Local gateway over a temp database with switchable faults and call counts.
pub struct TestGateway {
    inner: LocalGateway,
    _db: NamedTempFile,
    pub calls: AtomicUsize,
    pub job_calls: AtomicUsize,
    pub fail_list_backups: AtomicBool,
    pub fail_create_device: AtomicBool,
    /// Fails `update_device` and `delete_devices`.
    pub fail_mutations: AtomicBool,
    pub fail_list_devices_after_job: AtomicBool,
    pub fail_jobs: AtomicBool,
    pub job_result: Mutex<Option<BackupJobResult>>,
    pub last_job: Mutex<Option<BackupJob>>,
    pub hold_jobs: AtomicBool,
    pub job_entered: Notify,
    pub job_release: Notify,
}

impl TestGateway {
    pub fn new() -> Self {
        let db = NamedTempFile::new().unwrap();
        let store = Store::new(db.path()).unwrap();
        Self {
            inner: LocalGateway::new(store),
            _db: db,
            calls: AtomicUsize::new(0),
            job_calls: AtomicUsize::new(0),
            fail_list_backups: AtomicBool::new(false),
            fail_create_device: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
            fail_list_devices_after_job: AtomicBool::new(false),
            fail_jobs: AtomicBool::new(false),
            job_result: Mutex::new(None),
            last_job: Mutex::new(None),
            hold_jobs: AtomicBool::new(false),
            job_entered: Notify::new(),
            job_release: Notify::new(),
        }
    }

    /// Bypass the counters and faults.
    pub fn inner(&self) -> &LocalGateway {
        &self.inner
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn injected(message: &str) -> GatewayError {
        GatewayError::Backend {
            status: 500,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Gateway for TestGateway {
    fn mode(&self) -> &'static str {
        "test"
    }

    async fn list_devices(&self) -> Result<Vec<SwitchDevice>, GatewayError> {
        self.hit();
        if self.fail_list_devices_after_job.load(Ordering::SeqCst)
            && self.job_calls.load(Ordering::SeqCst) > 0
        {
            return Err(Self::injected("devices unavailable"));
        }
        self.inner.list_devices().await
    }

    async fn get_device(&self, id: &str) -> Result<SwitchDevice, GatewayError> {
        self.hit();
        self.inner.get_device(id).await
    }

    async fn create_device(&self, device: &NewDevice) -> Result<SwitchDevice, GatewayError> {
        self.hit();
        if self.fail_create_device.load(Ordering::SeqCst) {
            return Err(Self::injected("create failed"));
        }
        self.inner.create_device(device).await
    }

    async fn update_device(&self, id: &str, patch: &DevicePatch) -> Result<SwitchDevice, GatewayError> {
        self.hit();
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(Self::injected("update failed"));
        }
        self.inner.update_device(id, patch).await
    }

    async fn delete_device(&self, id: &str) -> Result<(), GatewayError> {
        self.hit();
        self.inner.delete_device(id).await
    }

    async fn delete_devices(&self, ids: &[String]) -> Result<(), GatewayError> {
        self.hit();
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(Self::injected("batch delete failed"));
        }
        self.inner.delete_devices(ids).await
    }

    async fn list_backups(&self) -> Result<Vec<ConfigBackup>, GatewayError> {
        self.hit();
        if self.fail_list_backups.load(Ordering::SeqCst) {
            return Err(Self::injected("backups unavailable"));
        }
        self.inner.list_backups().await
    }

    async fn get_backup(&self, id: &str) -> Result<ConfigBackup, GatewayError> {
        self.hit();
        self.inner.get_backup(id).await
    }

    async fn create_backup(&self, backup: &NewBackup) -> Result<ConfigBackup, GatewayError> {
        self.hit();
        self.inner.create_backup(backup).await
    }

    async fn delete_backup(&self, id: &str) -> Result<(), GatewayError> {
        self.hit();
        self.inner.delete_backup(id).await
    }

    async fn download_backup(&self, id: &str) -> Result<Vec<u8>, GatewayError> {
        self.hit();
        self.inner.download_backup(id).await
    }

    async fn list_templates(&self) -> Result<Vec<LoginTemplate>, GatewayError> {
        self.hit();
        self.inner.list_templates().await
    }

    async fn create_template(&self, template: &NewTemplate) -> Result<LoginTemplate, GatewayError> {
        self.hit();
        self.inner.create_template(template).await
    }

    async fn update_template(&self, id: &str, patch: &TemplatePatch) -> Result<LoginTemplate, GatewayError> {
        self.hit();
        self.inner.update_template(id, patch).await
    }

    async fn delete_template(&self, id: &str) -> Result<(), GatewayError> {
        self.hit();
        self.inner.delete_template(id).await
    }

    async fn execute_backup_job(&self, job: &BackupJob) -> Result<BackupJobResult, GatewayError> {
        self.hit();
        self.job_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_job.lock().unwrap() = Some(job.clone());

        if self.hold_jobs.load(Ordering::SeqCst) {
            self.job_entered.notify_one();
            self.job_release.notified().await;
        }

        if self.fail_jobs.load(Ordering::SeqCst) {
            return Err(Self::injected("job runner unavailable"));
        }

        let canned = self.job_result.lock().unwrap().clone();
        match canned {
            Some(result) => Ok(result),
            None => self.inner.execute_backup_job(job).await,
        }
    }
}
