//! REST backend gateway.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::*;
use crate::db::BatchDeleteRequest;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Gateway talking to the NetGuard REST backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid backend URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Transport(format!(
                "invalid backend URL {}: not a base URL",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Build an endpoint URL from path segments. Every segment is
    /// percent-encoded, so an id always stays a single path component.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        // The URL parser drops dot segments instead of encoding them
        if let Some(dot) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(GatewayError::Backend {
                status: 404,
                message: format!("No resource with id {:?}", dot),
            });
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport(format!("invalid backend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, turning non-2xx responses into backend errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Backend {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn with_json<B: Serialize>(request: RequestBuilder, body: &B) -> Result<RequestBuilder, GatewayError> {
        let bytes = serde_json::to_vec(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(request.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(bytes))
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, GatewayError> {
        let response = self.send(self.client.get(self.url(path)?)).await?;
        Self::read_json(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &[&str], body: &B) -> Result<T, GatewayError> {
        let request = Self::with_json(self.client.post(self.url(path)?), body)?;
        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &[&str], body: &B) -> Result<T, GatewayError> {
        let request = Self::with_json(self.client.put(self.url(path)?), body)?;
        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn delete(&self, path: &[&str]) -> Result<(), GatewayError> {
        let response = self.send(self.client.delete(self.url(path)?)).await?;
        if response.status() != StatusCode::NO_CONTENT {
            // Body, if any, carries nothing we need
            let _ = response.bytes().await;
        }
        Ok(())
    }
}

/// Extract a human-readable message from an error body.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return "Request failed".to_string();
    };

    ["error", "message", "detail"]
        .iter()
        .find_map(|key| match value.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_else(|| "Request failed".to_string())
}

#[async_trait]
impl Gateway for HttpGateway {
    fn mode(&self) -> &'static str {
        "remote"
    }

    async fn list_devices(&self) -> Result<Vec<SwitchDevice>, GatewayError> {
        let records: Vec<DeviceRecord> = self.get(&["api", "devices", ""]).await?;
        Ok(records.into_iter().map(device_from_record).collect())
    }

    async fn get_device(&self, id: &str) -> Result<SwitchDevice, GatewayError> {
        let record: DeviceRecord = self.get(&["api", "devices", id]).await?;
        Ok(device_from_record(record))
    }

    async fn create_device(&self, device: &NewDevice) -> Result<SwitchDevice, GatewayError> {
        let record: DeviceRecord = self.post(&["api", "devices", ""], &device_create(device)).await?;
        Ok(device_from_record(record))
    }

    async fn update_device(&self, id: &str, patch: &DevicePatch) -> Result<SwitchDevice, GatewayError> {
        let record: DeviceRecord = self
            .put(&["api", "devices", id], &device_update(patch))
            .await?;
        Ok(device_from_record(record))
    }

    async fn delete_device(&self, id: &str) -> Result<(), GatewayError> {
        self.delete(&["api", "devices", id]).await
    }

    async fn delete_devices(&self, ids: &[String]) -> Result<(), GatewayError> {
        let body = BatchDeleteRequest {
            device_ids: ids.to_vec(),
        };
        let request = Self::with_json(self.client.post(self.url(&["api", "devices", "batch-delete"])?), &body)?;
        let response = self.send(request).await?;
        let _ = response.bytes().await;
        Ok(())
    }

    async fn list_backups(&self) -> Result<Vec<ConfigBackup>, GatewayError> {
        let records: Vec<BackupRecord> = self.get(&["api", "backups", ""]).await?;
        Ok(records.into_iter().map(backup_from_record).collect())
    }

    async fn get_backup(&self, id: &str) -> Result<ConfigBackup, GatewayError> {
        let record: BackupRecord = self.get(&["api", "backups", id]).await?;
        Ok(backup_from_record(record))
    }

    async fn create_backup(&self, backup: &NewBackup) -> Result<ConfigBackup, GatewayError> {
        let record: BackupRecord = self.post(&["api", "backups", ""], &backup_create(backup)).await?;
        Ok(backup_from_record(record))
    }

    async fn delete_backup(&self, id: &str) -> Result<(), GatewayError> {
        self.delete(&["api", "backups", id]).await
    }

    async fn download_backup(&self, id: &str) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .send(self.client.get(self.url(&["api", "backups", id, "download"])?))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn list_templates(&self) -> Result<Vec<LoginTemplate>, GatewayError> {
        let records: Vec<TemplateRecord> = self.get(&["api", "templates", ""]).await?;
        Ok(records.into_iter().map(template_from_record).collect())
    }

    async fn create_template(&self, template: &NewTemplate) -> Result<LoginTemplate, GatewayError> {
        let record: TemplateRecord = self.post(&["api", "templates", ""], &template_create(template)).await?;
        Ok(template_from_record(record))
    }

    async fn update_template(&self, id: &str, patch: &TemplatePatch) -> Result<LoginTemplate, GatewayError> {
        let record: TemplateRecord = self
            .put(&["api", "templates", id], &template_update(patch))
            .await?;
        Ok(template_from_record(record))
    }

    async fn delete_template(&self, id: &str) -> Result<(), GatewayError> {
        self.delete(&["api", "templates", id]).await
    }

    async fn execute_backup_job(&self, job: &BackupJob) -> Result<BackupJobResult, GatewayError> {
        self.post(&["api", "backup-jobs", ""], &job_request(job)).await
    }
}
