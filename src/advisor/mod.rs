//! AI configuration audits and batch script generation.

mod gemini;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AiConfig;
use crate::models::{ConfigBackup, Vendor};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("AI service credential is not configured")]
    MissingCredential,
    #[error("{0}")]
    InvalidInput(String),
    #[error("AI service request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("AI service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("AI response has no candidate text")]
    EmptyResponse,
    #[error("AI response is not the expected JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

// reqwest errors carry the request URL; keep it out of messages and logs.
impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        AnalysisError::Transport(e.without_url())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditIssue {
    pub severity: Severity,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_content: Option<String>,
    #[serde(default)]
    pub remediation: String,
}

/// The model's raw audit answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    #[serde(default)]
    pub issues: Vec<AuditIssue>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub score: f64,
}

/// One audit run of one backup. Never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub id: String,
    pub backup_id: String,
    pub timestamp: DateTime<Utc>,
    pub issues: Vec<AuditIssue>,
    pub summary: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScript {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub commands: String,
    #[serde(default)]
    pub python_script: String,
}

/// Client for the generative-AI service.
#[derive(Debug, Clone)]
pub struct Advisor {
    client: Client,
    config: AiConfig,
}

impl Advisor {
    pub fn new(config: AiConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: AiConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    fn api_key(&self) -> Result<&str, AnalysisError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AnalysisError::MissingCredential)
    }

    /// Ask the audit model for security and best-practice issues in a
    /// configuration dump.
    pub async fn request_audit(&self, config_text: &str, vendor: Vendor) -> Result<AuditResult, AnalysisError> {
        let api_key = self.api_key()?;

        let instructions = format!(
            "You are a senior network security engineer. Analyze the following {} configuration. \
             Identify security vulnerabilities, misconfigurations and deviations from best practice \
             (weak passwords, Telnet enabled, missing ACLs, spanning-tree problems and similar). \
             Return a JSON object with: 'issues' (severity HIGH/MEDIUM/LOW/INFO, category, \
             description, remediation, lineContent), 'summary' (a short assessment of the device) \
             and 'score' (0 to 100, where 100 is a flawless configuration).",
            vendor
        );
        let body = gemini::request_body(
            &[instructions, format!("CONFIG:\n{}", config_text)],
            gemini::audit_schema(),
        );

        let text = gemini::generate(
            &self.client,
            &self.config.endpoint,
            &self.config.audit_model,
            api_key,
            &body,
        )
        .await?;
        gemini::parse_answer(&text)
    }

    /// Ask the generation model for CLI commands and a Netmiko script.
    pub async fn request_batch_script(
        &self,
        intent: &str,
        vendor: Vendor,
        device_count: usize,
    ) -> Result<BatchScript, AnalysisError> {
        let api_key = self.api_key()?;
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(AnalysisError::InvalidInput("intent is empty".to_string()));
        }

        let prompt = format!(
            "Task: generate network configuration commands and an automation script.\n\
             Target vendor: {}\n\
             Operator intent: {}\n\
             Context: applies to {} devices.\n\n\
             Output JSON with: 'explanation' (a short explanation of the change), \
             'commands' (the exact CLI commands to run on the switch) and 'pythonScript' \
             (a Python script using the 'netmiko' library to apply the commands to a \
             placeholder device list).",
            vendor, intent, device_count
        );
        let body = gemini::request_body(&[prompt], gemini::script_schema());

        let text = gemini::generate(
            &self.client,
            &self.config.endpoint,
            &self.config.generate_model,
            api_key,
            &body,
        )
        .await?;
        gemini::parse_answer(&text)
    }

    /// Audit a stored backup and wrap the answer into a fresh report.
    pub async fn audit_backup(&self, backup: &ConfigBackup, vendor: Vendor) -> Result<AuditReport, AnalysisError> {
        let result = self.request_audit(&backup.content, vendor).await?;
        tracing::info!(
            "Audit of backup {} scored {} with {} issues",
            backup.id,
            result.score,
            result.issues.len()
        );

        Ok(AuditReport {
            id: Uuid::new_v4().to_string(),
            backup_id: backup.id.clone(),
            timestamp: Utc::now(),
            issues: result.issues,
            summary: result.summary,
            score: result.score.round().clamp(0.0, 100.0) as u8,
        })
    }
}
