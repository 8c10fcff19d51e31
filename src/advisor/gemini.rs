//! Gemini `generateContent` plumbing: request bodies, response schemas and
//! extraction of the model's JSON answer.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::AnalysisError;

pub(super) const SEVERITIES: [&str; 4] = ["HIGH", "MEDIUM", "LOW", "INFO"];

pub(super) fn audit_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "issues": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "severity": { "type": "STRING", "enum": SEVERITIES },
                        "category": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "remediation": { "type": "STRING" },
                        "lineContent": {
                            "type": "STRING",
                            "description": "The configuration line causing the issue, if any"
                        }
                    }
                }
            },
            "summary": { "type": "STRING" },
            "score": { "type": "INTEGER" }
        }
    })
}

pub(super) fn script_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "explanation": { "type": "STRING" },
            "commands": { "type": "STRING" },
            "pythonScript": { "type": "STRING" }
        }
    })
}

pub(super) fn request_body(parts: &[String], schema: Value) -> Value {
    let contents: Vec<Value> = parts
        .iter()
        .map(|text| json!({ "role": "user", "parts": [{ "text": text }] }))
        .collect();

    json!({
        "contents": contents,
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": schema
        }
    })
}

/// POST a `generateContent` call and return the first candidate's text.
pub(super) async fn generate(
    client: &Client,
    endpoint: &str,
    model: &str,
    api_key: &str,
    body: &Value,
) -> Result<String, AnalysisError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    );

    let response = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AnalysisError::Service {
            status: status.as_u16(),
            body,
        });
    }

    let payload: Value = response.json().await?;
    candidate_text(&payload)
        .map(str::to_string)
        .ok_or(AnalysisError::EmptyResponse)
}

fn candidate_text(payload: &Value) -> Option<&str> {
    payload
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
}

fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse the model's answer, tolerating markdown code fences around it.
pub(super) fn parse_answer<T: DeserializeOwned>(raw: &str) -> Result<T, AnalysisError> {
    let trimmed = raw.trim();
    let body = if trimmed.starts_with("```") {
        json_object(trimmed).unwrap_or(trimmed)
    } else {
        trimmed
    };
    Ok(serde_json::from_str(body)?)
}
