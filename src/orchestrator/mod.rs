//! Batch backup orchestrator.
//!
//! Validates a batch request against the state store, dispatches a single
//! backup job through the gateway and reloads state once the job completes.
//! Only one job runs at a time.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::gateway::{Gateway, GatewayError};
use crate::inventory::preset;
use crate::models::BackupJob;
use crate::state::StateStore;

/// Request rejected before anything was sent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no devices selected")]
    NoDevices,
    #[error("no login template")]
    NoTemplate,
    #[error("no commands")]
    NoCommands,
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a backup job is already running")]
    Busy,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// A batch backup as submitted by an operator.
///
/// `preset_id` takes precedence over free-text `commands`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub device_ids: Vec<String>,
    pub template_id: Option<String>,
    pub preset_id: Option<String>,
    pub commands: Option<String>,
    pub backup_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFailure {
    pub device_id: String,
    pub device_name: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub job_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<DeviceFailure>,
    /// False when the reload after the job failed; the job itself completed.
    pub refreshed: bool,
}

/// Split free text into commands: one per line, trimmed, blank lines dropped.
pub fn parse_commands(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    state: Arc<StateStore>,
    busy: AtomicBool,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn Gateway>, state: Arc<StateStore>) -> Self {
        Self {
            gateway,
            state,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    /// Resolve a request into a job. The only gateway call is a template
    /// reload when the id is missing from the cache.
    async fn prepare(&self, request: &BatchRequest) -> Result<BackupJob, ValidationError> {
        if request.device_ids.is_empty() {
            return Err(ValidationError::NoDevices);
        }

        let template_id = request
            .template_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::NoTemplate)?;
        let template = match self.state.template(template_id).await {
            Some(template) => template,
            None => {
                // Created elsewhere since the last load
                if let Err(e) = self.state.load_templates().await {
                    tracing::warn!("Reloading login templates failed: {}", e);
                }
                self.state
                    .template(template_id)
                    .await
                    .ok_or(ValidationError::NoTemplate)?
            }
        };

        let commands = match request.preset_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => preset(id)
                .map(|p| p.commands.iter().map(|c| c.to_string()).collect::<Vec<_>>())
                .unwrap_or_default(),
            None => parse_commands(request.commands.as_deref().unwrap_or_default()),
        };
        if commands.is_empty() {
            return Err(ValidationError::NoCommands);
        }

        Ok(BackupJob {
            device_ids: request.device_ids.clone(),
            commands,
            template,
            backup_path: request.backup_path.clone(),
        })
    }

    /// Run one batch backup and reload state afterwards.
    ///
    /// Per-device failures are part of a successful outcome.
    pub async fn submit(&self, request: BatchRequest) -> Result<BatchOutcome, BatchError> {
        let job = self.prepare(&request).await?;
        let _guard = self.try_acquire().ok_or(BatchError::Busy)?;

        tracing::info!(
            "Starting backup job for {} devices with template {} ({} commands)",
            job.device_ids.len(),
            job.template.name,
            job.commands.len()
        );
        let result = self.gateway.execute_backup_job(&job).await?;
        tracing::info!(
            "Backup job {} finished: {} ok, {} failed of {}",
            result.job_id,
            result.success,
            result.failed,
            result.total
        );

        let mut failures = Vec::with_capacity(result.errors.len());
        for err in &result.errors {
            failures.push(DeviceFailure {
                device_id: err.device_id.clone(),
                device_name: self.state.device(&err.device_id).await.map(|d| d.name),
                error: err.error.clone(),
            });
        }

        let refreshed = match self.state.refresh_state().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Reload after backup job {} failed: {}", result.job_id, e);
                false
            }
        };

        Ok(BatchOutcome {
            job_id: result.job_id,
            total: result.total,
            succeeded: result.success,
            failed: result.failed,
            failures,
            refreshed,
        })
    }
}
