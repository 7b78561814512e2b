// src/ai/client.rs - External LLM adapter

use crate::ai::call_log::{AiCallEntry, AiLogService};
use crate::config::LlmConfig;
use crate::core::{CoreError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// One piece of user content in a chat request. Images travel as base64
/// data URIs.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    ImageDataUri(String),
}

impl ContentPart {
    pub fn image_from_bytes(bytes: &[u8]) -> Self {
        use base64::prelude::*;
        let encoded = BASE64_STANDARD.encode(bytes);
        Self::ImageDataUri(format!("data:image/jpeg;base64,{encoded}"))
    }
}

/// Classified AI call, used for model selection and call logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    FoodAnalysis,
    MenuRecognition,
    TripGeneration,
    ExerciseIntent,
    AllergenCheck,
    MealComparison,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodAnalysis => "food_analysis",
            Self::MenuRecognition => "menu_recognition",
            Self::TripGeneration => "trip_generation",
            Self::ExerciseIntent => "exercise_intent",
            Self::AllergenCheck => "allergen_check",
            Self::MealComparison => "meal_comparison",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FoodAnalysis => "菜品营养分析",
            Self::MenuRecognition => "菜单图片识别",
            Self::TripGeneration => "运动计划生成",
            Self::ExerciseIntent => "运动意图提取",
            Self::AllergenCheck => "过敏原检测",
            Self::MealComparison => "餐前餐后对比",
        }
    }
}

/// Wire seam of the vendor API. Production uses the HTTP transport;
/// analyzer tests script responses through this trait.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, model: &str, parts: &[ContentPart], timeout: Duration) -> Result<String>;
}

/// OpenAI-compatible chat-completions transport
pub struct HttpChatTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpChatTransport {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    fn build_content(parts: &[ContentPart]) -> Value {
        if parts.len() == 1 {
            if let ContentPart::Text(text) = &parts[0] {
                return json!(text);
            }
        }
        let items: Vec<Value> = parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({"type": "text", "text": text}),
                ContentPart::ImageDataUri(uri) => {
                    json!({"type": "image_url", "image_url": {"url": uri}})
                }
            })
            .collect();
        json!(items)
    }
}

fn truncate_for_log(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(max_len).collect();
        format!("{prefix}...")
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, model: &str, parts: &[ContentPart], timeout: Duration) -> Result<String> {
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": Self::build_content(parts),
            }],
        });

        let request = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(timeout);

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::upstream("llm", format!("request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| CoreError::upstream("llm", format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(CoreError::upstream(
                "llm",
                format!(
                    "status {}: {}",
                    status,
                    truncate_for_log(&response_text, 500)
                ),
            ));
        }

        let payload: Value = serde_json::from_str(&response_text).map_err(|e| {
            CoreError::upstream(
                "llm",
                format!(
                    "response parse error: {e}; body: {}",
                    truncate_for_log(&response_text, 500)
                ),
            )
        })?;

        // Walk the known vendor response path; anything else is a
        // structural mismatch.
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                CoreError::upstream(
                    "llm",
                    format!(
                        "missing content in response: {}",
                        truncate_for_log(&payload.to_string(), 500)
                    ),
                )
            })
    }
}

/// LLM adapter. Chooses the configured model per call type, bounds the
/// request with a timeout, and records every call (success or failure)
/// through the log sink. Deliberately does not retry; callers supply
/// defaults on failure.
pub struct AiClient {
    transport: Arc<dyn ChatTransport>,
    config: LlmConfig,
    log: Arc<AiLogService>,
}

impl AiClient {
    pub fn new(transport: Arc<dyn ChatTransport>, config: LlmConfig, log: Arc<AiLogService>) -> Self {
        Self {
            transport,
            config,
            log,
        }
    }

    pub fn from_config(config: LlmConfig, log: Arc<AiLogService>) -> Self {
        let transport = Arc::new(HttpChatTransport::new(
            config.base_url.clone(),
            config.api_key.clone(),
        ));
        Self::new(transport, config, log)
    }

    fn model_for(&self, call_type: CallType) -> &str {
        match call_type {
            CallType::TripGeneration | CallType::ExerciseIntent => &self.config.text_model,
            _ => &self.config.vision_model,
        }
    }

    fn timeout_for(&self, parts: &[ContentPart]) -> Duration {
        let has_image = parts
            .iter()
            .any(|p| matches!(p, ContentPart::ImageDataUri(_)));
        if has_image {
            Duration::from_secs(self.config.multimodal_timeout_seconds)
        } else {
            Duration::from_secs(self.config.generation_timeout_seconds)
        }
    }

    /// Text-only generation with a single prompt
    pub async fn generate_text(
        &self,
        call_type: CallType,
        user_id: Option<i64>,
        input_summary: &str,
        prompt: String,
    ) -> Result<String> {
        self.chat(call_type, user_id, input_summary, vec![ContentPart::Text(prompt)])
            .await
    }

    /// Multimodal chat with any interleaving of text and image parts
    pub async fn chat(
        &self,
        call_type: CallType,
        user_id: Option<i64>,
        input_summary: &str,
        parts: Vec<ContentPart>,
    ) -> Result<String> {
        let model = self.model_for(call_type).to_string();
        let timeout = self.timeout_for(&parts);
        let started = Instant::now();

        let outcome = self.transport.send(&model, &parts, timeout).await;
        let latency_ms = started.elapsed().as_millis() as i64;

        match &outcome {
            Ok(content) => {
                self.log
                    .log_call(AiCallEntry {
                        user_id,
                        call_type: call_type.as_str().to_string(),
                        model_name: model,
                        input_summary: Some(input_summary.to_string()),
                        output_summary: Some(content.clone()),
                        success: true,
                        error_message: None,
                        latency_ms,
                        token_usage: None,
                    })
                    .await;
            }
            Err(e) => {
                warn!("LLM call {} failed: {e}", call_type.as_str());
                self.log
                    .log_call(AiCallEntry {
                        user_id,
                        call_type: call_type.as_str().to_string(),
                        model_name: model,
                        input_summary: Some(input_summary.to_string()),
                        output_summary: None,
                        success: false,
                        error_message: Some(e.to_string()),
                        latency_ms,
                        token_usage: None,
                    })
                    .await;
            }
        }

        outcome
    }
}

/// Extract the first `{...}` span from model output. The model is treated
/// as returning an untyped blob that may wrap JSON in prose.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end > start {
        Some(&content[start..=end])
    } else {
        None
    }
}

/// Extract the first `[...]` span from model output
pub fn extract_json_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end > start {
        Some(&content[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_skips_prose() {
        let content = "好的，以下是分析结果：\n{\"calories\": 150.0}\n请参考。";
        assert_eq!(extract_json_object(content), Some("{\"calories\": 150.0}"));
    }

    #[test]
    fn test_extract_json_array() {
        let content = "```json\n[\"宫保鸡丁\", \"麻婆豆腐\"]\n```";
        assert_eq!(
            extract_json_array(content),
            Some("[\"宫保鸡丁\", \"麻婆豆腐\"]")
        );
    }

    #[test]
    fn test_extract_json_object_missing() {
        assert_eq!(extract_json_object("no json here"), None);
    }
}
