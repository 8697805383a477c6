//! Gemini `generateContent` client.

use super::AnalysisClient;
use crate::error::PipelineError;
use crate::models::AnalysisFields;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const VIDEO_MIME_TYPE: &str = "video/mp4";

/// Settings for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client for analysis")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn build_request(resource_uri: &str, context_text: &str, system_prompt: &str) -> GenerateRequest {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(system_prompt.to_string()),
                    file_data: None,
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part {
                        text: None,
                        file_data: Some(FileData {
                            mime_type: VIDEO_MIME_TYPE.to_string(),
                            file_uri: resource_uri.to_string(),
                        }),
                    },
                    Part {
                        text: Some(context_text.to_string()),
                        file_data: None,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn analyze(
        &self,
        resource_uri: &str,
        context_text: &str,
        system_prompt: &str,
    ) -> Result<AnalysisFields, PipelineError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        );
        let request = Self::build_request(resource_uri, context_text, system_prompt);

        debug!("Sending generateContent request for {}", resource_uri);

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Transport(format!(
                        "Analysis request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else {
                    PipelineError::Transport(format!("Failed to send analysis request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::classify_api_failure(status, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Transport(format!("Failed to parse model response: {}", e)))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| PipelineError::Transport("Model returned no text".to_string()))?;

        parse_fields(&text)
    }
}

/// Parse the model's text as a JSON object, tolerating a markdown code fence.
fn parse_fields(text: &str) -> Result<AnalysisFields, PipelineError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PipelineError::Transport(format!(
            "Model response is not a JSON object: {}",
            other
        ))),
        Err(e) => Err(PipelineError::Transport(format!(
            "Model response is not valid JSON: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GeminiClient::build_request(
            "https://www.youtube.com/watch?v=abc",
            "Analyze : 'Title'",
            "You are an analyst.",
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "You are an analyst."
        );
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(
            value["contents"][0]["parts"][0]["fileData"]["fileUri"],
            "https://www.youtube.com/watch?v=abc"
        );
        assert_eq!(
            value["contents"][0]["parts"][0]["fileData"]["mimeType"],
            "video/mp4"
        );
        assert_eq!(value["contents"][0]["parts"][1]["text"], "Analyze : 'Title'");
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_parse_fields_object() {
        let fields = parse_fields(r#"{"tone": "calm", "claims": 3}"#).unwrap();
        assert_eq!(fields["tone"], "calm");
        assert_eq!(fields["claims"], 3);
    }

    #[test]
    fn test_parse_fields_code_fence() {
        let fields = parse_fields("```json\n{\"tone\": \"calm\"}\n```").unwrap();
        assert_eq!(fields["tone"], "calm");
    }

    #[test]
    fn test_parse_fields_rejects_non_object() {
        let err = parse_fields("[1, 2]").unwrap_err();
        assert!(!err.is_rate_limit());
        assert!(parse_fields("not json").is_err());
    }

    #[test]
    fn test_parse_response_text() {
        let body = r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "{\"a\": 1}"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .unwrap();
        assert_eq!(text, "{\"a\": 1}");
    }
}
