//! Configuration module for NetGuard.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Base URL of the REST backend. `None` runs in local mode.
    pub api_url: Option<String>,
    /// Path to the SQLite file used in local mode (default: "netguard.db")
    pub db_path: String,
    pub ai: AiConfig,
}

/// Settings for the generative-AI service.
#[derive(Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Model used for configuration audits.
    pub audit_model: String,
    /// Model used for command and script generation.
    pub generate_model: String,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("audit_model", &self.audit_model)
            .field("generate_model", &self.generate_model)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            audit_model: "gemini-3-flash-preview".to_string(),
            generate_model: "gemini-3-pro-preview".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            api_url: None,
            db_path: "netguard.db".to_string(),
            ai: AiConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `NETGUARD_HTTP_PORT`: HTTP port (default: 8080)
    /// - `NETGUARD_API_URL`: REST backend base URL (default: unset, local mode)
    /// - `NETGUARD_DB_PATH`: local mode database file (default: "netguard.db")
    /// - `NETGUARD_AI_API_KEY` or `API_KEY`: AI service credential
    /// - `NETGUARD_AI_ENDPOINT`: AI service base URL
    /// - `NETGUARD_AUDIT_MODEL`, `NETGUARD_GENERATE_MODEL`: model names
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port_str) = non_empty("NETGUARD_HTTP_PORT") {
            if let Ok(port) = port_str.trim().parse() {
                cfg.http_port = port;
            }
        }

        if let Some(url) = non_empty("NETGUARD_API_URL") {
            cfg.api_url = Some(url.trim().trim_end_matches('/').to_string());
        }

        if let Some(db_path) = non_empty("NETGUARD_DB_PATH") {
            cfg.db_path = db_path;
        }

        cfg.ai.api_key = non_empty("NETGUARD_AI_API_KEY").or_else(|| non_empty("API_KEY"));

        if let Some(endpoint) = non_empty("NETGUARD_AI_ENDPOINT") {
            cfg.ai.endpoint = endpoint;
        }
        if let Some(model) = non_empty("NETGUARD_AUDIT_MODEL") {
            cfg.ai.audit_model = model;
        }
        if let Some(model) = non_empty("NETGUARD_GENERATE_MODEL") {
            cfg.ai.generate_model = model;
        }

        cfg
    }

    /// Whether the service runs without a remote backend.
    pub fn is_local_mode(&self) -> bool {
        self.api_url.is_none()
    }
}
