//! Typed HTTP client for the llama-server API.
//!
//! One method per server capability. Each method performs exactly one HTTP
//! round trip: merge endpoint defaults with caller overrides, serialize the
//! wire body, deserialize the typed response. Failures map onto
//! [`ClientError`] and are never retried here.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::ClientError;
use crate::types::*;

const DEFAULT_MAX_TOKENS: u32 = 256;
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_TOP_P: f64 = 0.9;
const DEFAULT_TOP_K: u32 = 40;

#[derive(Debug, Clone)]
pub struct LlamaClient {
    http: reqwest::Client,
    config: Config,
}

impl LlamaClient {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Issue one request with the configured deadline and normalize the
    /// outcome: 2xx passes through, anything else becomes a `ClientError`.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        tracing::debug!(%method, path, "llama-server request");

        let response = builder
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(response)
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else {
            ClientError::Request(err.to_string())
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .execute(Method::GET, path, self.http.get(self.url(path)))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get_text(&self, path: &str) -> Result<String, ClientError> {
        let response = self
            .execute(Method::GET, path, self.http.get(self.url(path)))
            .await?;
        response
            .text()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .execute(Method::POST, path, self.http.post(self.url(path)).json(body))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// POST whose response body is irrelevant; success is a 2xx status.
    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ClientError> {
        self.execute(Method::POST, path, self.http.post(self.url(path)).json(body))
            .await
            .map(|_| ())
    }

    // --- capabilities ---

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get_json("/health").await
    }

    /// Read server properties, or update default generation settings when
    /// `settings` is supplied. The current properties are returned either way.
    pub async fn props(&self, settings: Option<Value>) -> Result<Value, ClientError> {
        match settings {
            Some(settings) => {
                let body = serde_json::json!({ "default_generation_settings": settings });
                self.post_json("/props", &body).await
            }
            None => self.get_json("/props").await,
        }
    }

    pub async fn models(&self) -> Result<ModelList, ClientError> {
        self.get_json("/v1/models").await
    }

    pub async fn slots(&self) -> Result<Vec<Slot>, ClientError> {
        self.get_json("/slots").await
    }

    /// Prometheus exposition text, returned verbatim.
    pub async fn metrics(&self) -> Result<String, ClientError> {
        self.get_text("/metrics").await
    }

    pub async fn tokenize(
        &self,
        content: &str,
        add_special: Option<bool>,
        with_pieces: Option<bool>,
    ) -> Result<TokenizeResponse, ClientError> {
        let body = TokenizeRequest {
            content: content.to_string(),
            add_special: add_special.unwrap_or(true),
            with_pieces: with_pieces.unwrap_or(false),
        };
        self.post_json("/tokenize", &body).await
    }

    pub async fn detokenize(&self, tokens: Vec<i32>) -> Result<DetokenizeResponse, ClientError> {
        self.post_json("/detokenize", &DetokenizeRequest { tokens }).await
    }

    /// Render the model's chat template over `messages` without running
    /// any inference.
    pub async fn apply_template(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<ApplyTemplateResponse, ClientError> {
        self.post_json("/apply-template", &ApplyTemplateRequest { messages })
            .await
    }

    pub async fn completion(
        &self,
        prompt: &str,
        params: CompletionParams,
    ) -> Result<CompletionResponse, ClientError> {
        // Single merge point: caller overrides win, endpoint defaults otherwise.
        let body = CompletionRequest {
            prompt: prompt.to_string(),
            n_predict: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: params.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: params.top_p.unwrap_or(DEFAULT_TOP_P),
            top_k: params.top_k.unwrap_or(DEFAULT_TOP_K),
            stop: params.stop,
            seed: params.seed,
        };
        self.post_json("/completion", &body).await
    }

    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        params: ChatParams,
    ) -> Result<ChatCompletionResponse, ClientError> {
        let body = ChatCompletionRequest {
            messages,
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: params.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: params.top_p.unwrap_or(DEFAULT_TOP_P),
            stop: params.stop,
            seed: params.seed,
        };
        self.post_json("/v1/chat/completions", &body).await
    }

    pub async fn embedding(&self, content: &str) -> Result<EmbeddingResponse, ClientError> {
        let body = EmbeddingRequest {
            content: content.to_string(),
        };
        self.post_json("/embedding", &body).await
    }

    pub async fn infill(
        &self,
        input_prefix: &str,
        input_suffix: &str,
        params: InfillParams,
    ) -> Result<InfillResponse, ClientError> {
        let body = InfillRequest {
            input_prefix: input_prefix.to_string(),
            input_suffix: input_suffix.to_string(),
            n_predict: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: params.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            stop: params.stop,
        };
        self.post_json("/infill", &body).await
    }

    /// Score `documents` against `query`. Result order is whatever the
    /// server returned.
    pub async fn rerank(
        &self,
        query: &str,
        documents: Vec<String>,
    ) -> Result<RerankResponse, ClientError> {
        let body = RerankRequest {
            query: query.to_string(),
            documents,
        };
        self.post_json("/reranking", &body).await
    }

    /// Load a model by identifier (router mode).
    pub async fn load_model(&self, model: &str) -> Result<(), ClientError> {
        self.post_unit(
            "/models/load",
            &ModelRequest {
                model: model.to_string(),
            },
        )
        .await
    }

    /// Unload a model by identifier (router mode).
    pub async fn unload_model(&self, model: &str) -> Result<(), ClientError> {
        self.post_unit(
            "/models/unload",
            &ModelRequest {
                model: model.to_string(),
            },
        )
        .await
    }

    pub async fn lora_adapters(&self) -> Result<Vec<LoraAdapter>, ClientError> {
        self.get_json("/lora-adapters").await
    }

    /// Apply new adapter scales and return the updated adapter list.
    pub async fn set_lora_adapters(
        &self,
        scales: Vec<LoraScale>,
    ) -> Result<Vec<LoraAdapter>, ClientError> {
        self.post_json("/lora-adapters", &scales).await
    }
}
