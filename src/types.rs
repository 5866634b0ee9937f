//! Request and response records for the llama-server HTTP API.
//!
//! Wire structs mirror the server's JSON field names exactly; caller-facing
//! parameter sets ([`CompletionParams`] and friends) use friendlier names and
//! are translated at the single merge point inside each client method.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Readiness reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Loading,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(default)]
    pub slots_idle: Option<u32>,
    #[serde(default)]
    pub slots_processing: Option<u32>,
}

/// OpenAI-compatible model listing from `GET /v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

/// One concurrency slot from `GET /slots`. The server reports extra
/// per-slot detail that varies by version; it is kept as-is in `fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

// --- tokenization ---

#[derive(Debug, Clone, Serialize)]
pub struct TokenizeRequest {
    pub content: String,
    pub add_special: bool,
    pub with_pieces: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeResponse {
    pub tokens: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pieces: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetokenizeRequest {
    pub tokens: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetokenizeResponse {
    pub content: String,
}

// --- chat templating ---

/// One turn of a conversation. Also reused by the MCP tool surface, hence
/// the schema derive.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyTemplateRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyTemplateResponse {
    pub prompt: String,
}

// --- completion ---

/// Caller-facing tunables for `POST /completion`. Every field is optional;
/// unset fields take the endpoint defaults at the merge point.
#[derive(Debug, Clone, Default)]
pub struct CompletionParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub seed: Option<i64>,
}

/// Wire body for `POST /completion`. `stop` and `seed` are omitted from the
/// serialized body when absent, never sent as null.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub n_predict: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timings {
    #[serde(default)]
    pub prompt_n: Option<u32>,
    #[serde(default)]
    pub prompt_ms: Option<f64>,
    #[serde(default)]
    pub prompt_per_second: Option<f64>,
    #[serde(default)]
    pub predicted_n: Option<u32>,
    #[serde(default)]
    pub predicted_ms: Option<f64>,
    #[serde(default)]
    pub predicted_per_second: Option<f64>,
}

// --- chat completion ---

#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop: Option<Vec<String>>,
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    #[serde(default)]
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// --- embedding / infill / rerank ---

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct InfillParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfillRequest {
    pub input_prefix: String,
    pub input_suffix: String,
    pub n_predict: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfillResponse {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
}

/// Results are kept in the order the server returned them; the client does
/// not re-sort by score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResponse {
    pub results: Vec<RerankResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f64,
}

// --- model management (router mode) ---

#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub model: String,
}

// --- LoRA adapters ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraAdapter {
    pub id: i32,
    pub path: String,
    pub scale: f32,
}

/// Scale update for one adapter; scale 0 disables it.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct LoraScale {
    pub id: i32,
    pub scale: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_parses_all_variants() {
        for (raw, expected) in [
            ("\"ok\"", HealthStatus::Ok),
            ("\"loading\"", HealthStatus::Loading),
            ("\"error\"", HealthStatus::Error),
        ] {
            let status: HealthStatus = serde_json::from_str(raw).unwrap();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn completion_request_omits_absent_stop_and_seed() {
        let body = serde_json::to_value(CompletionRequest {
            prompt: "hello".into(),
            n_predict: 256,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            stop: None,
            seed: None,
        })
        .unwrap();
        let obj = body.as_object().unwrap();
        assert!(!obj.contains_key("stop"));
        assert!(!obj.contains_key("seed"));
        assert_eq!(obj.len(), 5);
    }

    #[test]
    fn slot_keeps_unknown_fields() {
        let slot: Slot =
            serde_json::from_str(r#"{"id":0,"state":1,"prompt":"hi"}"#).unwrap();
        assert_eq!(slot.id, 0);
        assert_eq!(slot.fields["state"], 1);
        assert_eq!(slot.fields["prompt"], "hi");
    }
}
