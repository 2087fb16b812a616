use std::time::Duration;

use anyhow::{Context, Result};
use lumina_contracts::chat::{ChatMessage, ChatRole};
use lumina_contracts::UpstreamError;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};

use crate::client::{EditRequest, ImageRequest, UpstreamClient};
use crate::config::LuminaConfig;
use crate::payload::{inline_part, EncodedImage};
use crate::prompts::{with_negative_prompt, CHAT_SYSTEM_INSTRUCTION};

const ERROR_BODY_LIMIT: usize = 512;

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            http: HttpClient::new(),
        }
    }

    pub fn from_config(config: &LuminaConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("GEMINI_API_KEY or GOOGLE_API_KEY or API_KEY not set (use --dryrun to work offline)")?;
        Ok(Self::new(api_key, config.api_base.clone(), config.request_timeout))
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn post(&self, model: &str, payload: &Value, pro_tier: bool) -> Result<Value, UpstreamError> {
        let endpoint = self.endpoint_for_model(model);
        log::debug!("POST {endpoint}");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(payload)
            .send()
            .map_err(|err| UpstreamError::generic(format!("Gemini request failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| UpstreamError::generic(format!("Gemini response body read failed: {err}")))?;
        if !status.is_success() {
            return Err(UpstreamError::classify(
                Some(status.as_u16()),
                &truncate_text(&error_message(&body), ERROR_BODY_LIMIT),
                pro_tier,
            ));
        }
        serde_json::from_str(&body)
            .map_err(|err| UpstreamError::generic(format!("Gemini returned invalid JSON payload: {err}")))
    }

    fn image_payload(parts: Vec<Value>, image_config: Map<String, Value>) -> Value {
        let mut generation_config = Map::new();
        generation_config.insert(
            "responseModalities".to_string(),
            json!(["TEXT", "IMAGE"]),
        );
        if !image_config.is_empty() {
            generation_config.insert("imageConfig".to_string(), Value::Object(image_config));
        }
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        })
    }
}

impl UpstreamClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<EncodedImage, UpstreamError> {
        let mut parts = Vec::new();
        if let Some(reference) = request.reference.as_deref() {
            parts.push(
                inline_part(reference)
                    .ok_or_else(|| UpstreamError::generic("reference image is not a data URL"))?,
            );
        }
        parts.push(json!({
            "text": with_negative_prompt(&request.prompt, request.negative_prompt.as_deref()),
        }));

        let mut image_config = Map::new();
        image_config.insert(
            "aspectRatio".to_string(),
            Value::String(request.ratio.as_str().to_string()),
        );
        if let Some(tier) = request.size_tier {
            image_config.insert(
                "imageSize".to_string(),
                Value::String(tier.as_str().to_string()),
            );
        }

        let payload = Self::image_payload(parts, image_config);
        let response = self.post(&request.model, &payload, request.pro_tier)?;
        first_image(&response).ok_or_else(|| UpstreamError::no_result("image"))
    }

    fn edit_image(&self, request: &EditRequest) -> Result<EncodedImage, UpstreamError> {
        let source = inline_part(&request.image)
            .ok_or_else(|| UpstreamError::generic("edit source is not a data URL"))?;
        let parts = vec![source, json!({ "text": request.prompt.trim() })];

        let mut image_config = Map::new();
        if let Some(ratio) = request.ratio {
            image_config.insert(
                "aspectRatio".to_string(),
                Value::String(ratio.as_str().to_string()),
            );
        }

        let payload = Self::image_payload(parts, image_config);
        let response = self.post(&request.model, &payload, request.pro_tier)?;
        first_image(&response).ok_or_else(|| UpstreamError::no_result("image"))
    }

    fn send_chat_message(
        &self,
        model: &str,
        history: &[ChatMessage],
        message: &str,
        extended_reasoning: bool,
    ) -> Result<String, UpstreamError> {
        let payload = chat_payload(history, message, extended_reasoning);
        let response = self.post(model, &payload, false)?;
        let text = response_text(&response);
        if text.trim().is_empty() {
            return Err(UpstreamError::no_result("response"));
        }
        Ok(text)
    }
}

fn chat_payload(history: &[ChatMessage], message: &str, extended_reasoning: bool) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .filter(|turn| !turn.text.trim().is_empty())
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            json!({ "role": role, "parts": [{ "text": turn.text }] })
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));

    let mut payload = Map::new();
    payload.insert("contents".to_string(), Value::Array(contents));
    payload.insert(
        "systemInstruction".to_string(),
        json!({ "parts": [{ "text": CHAT_SYSTEM_INSTRUCTION }] }),
    );
    if extended_reasoning {
        payload.insert(
            "generationConfig".to_string(),
            json!({ "thinkingConfig": { "thinkingBudget": -1 } }),
        );
    }
    Value::Object(payload)
}

fn candidate_parts(response: &Value) -> Vec<Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| {
            candidates
                .iter()
                .filter_map(|candidate| {
                    candidate
                        .get("content")
                        .and_then(|content| content.get("parts"))
                        .and_then(Value::as_array)
                })
                .flatten()
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn first_image(response: &Value) -> Option<EncodedImage> {
    for part in candidate_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        return Some(EncodedImage {
            mime_type: mime_type.to_string(),
            base64: data.to_string(),
        });
    }
    None
}

/// Visible answer text; thought summaries are skipped.
fn response_text(response: &Value) -> String {
    candidate_parts(response)
        .iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

/// Prefers `error.status: error.message` from a Google error envelope.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|value| value.get("error"));
    let status = error
        .and_then(|error| error.get("status"))
        .and_then(Value::as_str);
    let message = error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str);
    match (status, message) {
        (Some(status), Some(message)) => format!("{status}: {message}"),
        (None, Some(message)) => message.to_string(),
        _ => body.trim().to_string(),
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
