//! MCP tool surface: one tool per llama-server capability, plus local
//! server lifecycle tools. Arguments arrive schema-validated; each tool is a
//! thin translation onto the client or the manager.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ErrorData as McpError, *},
    schemars, tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::Value;
use std::{borrow::Cow, sync::Arc};

use crate::client::LlamaClient;
use crate::config::Config;
use crate::process::{ServerManager, StartOptions};
use crate::types::{ChatMessage, ChatParams, CompletionParams, InfillParams, LoraScale};

#[derive(Clone)]
pub struct LlamaMcpService {
    client: Arc<LlamaClient>,
    manager: Arc<ServerManager>,
    tool_router: ToolRouter<LlamaMcpService>,
}

fn internal_error(message: impl std::fmt::Display) -> McpError {
    McpError {
        code: ErrorCode(-32603),
        message: Cow::from(message.to_string()),
        data: None,
    }
}

fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(internal_error)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// Request types for MCP tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PropsRequest {
    #[serde(default)]
    #[schemars(description = "Generation settings to apply; omit to read current properties")]
    pub settings: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TokenizeRequest {
    #[schemars(description = "Text to tokenize")]
    pub content: String,
    #[schemars(description = "Add special tokens such as BOS (default: true)")]
    pub add_special: Option<bool>,
    #[schemars(description = "Include per-token piece strings (default: false)")]
    pub with_pieces: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DetokenizeRequest {
    #[schemars(description = "Token ids to convert back to text")]
    pub tokens: Vec<i32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ApplyTemplateRequest {
    #[schemars(description = "Conversation messages (role and content)")]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CompletionRequest {
    #[schemars(description = "The prompt to complete")]
    pub prompt: String,
    #[schemars(description = "Maximum tokens to generate (default: 256)")]
    pub max_tokens: Option<u32>,
    #[schemars(description = "Sampling temperature (default: 0.7)")]
    pub temperature: Option<f64>,
    #[schemars(description = "Nucleus sampling threshold (default: 0.9)")]
    pub top_p: Option<f64>,
    #[schemars(description = "Top-k sampling cutoff (default: 40)")]
    pub top_k: Option<u32>,
    #[schemars(description = "Stop sequences")]
    pub stop: Option<Vec<String>>,
    #[schemars(description = "Random seed")]
    pub seed: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ChatCompletionRequest {
    #[schemars(description = "Conversation messages (role and content)")]
    pub messages: Vec<ChatMessage>,
    #[schemars(description = "Maximum tokens to generate (default: 256)")]
    pub max_tokens: Option<u32>,
    #[schemars(description = "Sampling temperature (default: 0.7)")]
    pub temperature: Option<f64>,
    #[schemars(description = "Nucleus sampling threshold (default: 0.9)")]
    pub top_p: Option<f64>,
    #[schemars(description = "Stop sequences")]
    pub stop: Option<Vec<String>>,
    #[schemars(description = "Random seed")]
    pub seed: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EmbeddingRequest {
    #[schemars(description = "Text to embed")]
    pub content: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InfillRequest {
    #[schemars(description = "Code/text before the insertion point")]
    pub input_prefix: String,
    #[schemars(description = "Code/text after the insertion point")]
    pub input_suffix: String,
    #[schemars(description = "Maximum tokens to generate (default: 256)")]
    pub max_tokens: Option<u32>,
    #[schemars(description = "Sampling temperature (default: 0.7)")]
    pub temperature: Option<f64>,
    #[schemars(description = "Stop sequences")]
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RerankRequest {
    #[schemars(description = "Query to rank documents against")]
    pub query: String,
    #[schemars(description = "Documents to score")]
    pub documents: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ModelRequest {
    #[schemars(description = "Model identifier")]
    pub model: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetLoraRequest {
    #[schemars(description = "Adapter scales to apply; scale 0 disables an adapter")]
    pub adapters: Vec<LoraScale>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StartServerRequest {
    #[schemars(description = "Path to the GGUF model file")]
    pub model: String,
    #[schemars(description = "Port to listen on (default: 8080)")]
    pub port: Option<u16>,
    #[schemars(description = "Context size in tokens (default: 2048)")]
    pub ctx_size: Option<u32>,
    #[schemars(description = "GPU layers to offload, -1 for all (default: -1)")]
    pub n_gpu_layers: Option<i32>,
    #[schemars(description = "CPU threads; server default when omitted")]
    pub threads: Option<u32>,
}

#[tool_router(router = tool_router)]
impl LlamaMcpService {
    pub fn new(config: Config) -> Self {
        let client = Arc::new(LlamaClient::new(config.clone()));
        let manager = Arc::new(ServerManager::new(config));
        Self {
            client,
            manager,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Check llama-server health and slot availability")]
    async fn health(&self) -> Result<CallToolResult, McpError> {
        let health = self.client.health().await.map_err(internal_error)?;
        json_result(&health)
    }

    #[tool(description = "Read server properties, or update default generation settings when provided")]
    async fn props(
        &self,
        Parameters(request): Parameters<PropsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let props = self
            .client
            .props(request.settings)
            .await
            .map_err(internal_error)?;
        json_result(&props)
    }

    #[tool(description = "List models known to llama-server (OpenAI-compatible shape)")]
    async fn list_models(&self) -> Result<CallToolResult, McpError> {
        let models = self.client.models().await.map_err(internal_error)?;
        json_result(&models)
    }

    #[tool(description = "Inspect per-slot processing state")]
    async fn slots(&self) -> Result<CallToolResult, McpError> {
        let slots = self.client.slots().await.map_err(internal_error)?;
        json_result(&slots)
    }

    #[tool(description = "Fetch Prometheus metrics as raw text")]
    async fn metrics(&self) -> Result<CallToolResult, McpError> {
        let metrics = self.client.metrics().await.map_err(internal_error)?;
        Ok(CallToolResult::success(vec![Content::text(metrics)]))
    }

    #[tool(description = "Tokenize text into model token ids")]
    async fn tokenize(
        &self,
        Parameters(request): Parameters<TokenizeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let tokens = self
            .client
            .tokenize(&request.content, request.add_special, request.with_pieces)
            .await
            .map_err(internal_error)?;
        json_result(&tokens)
    }

    #[tool(description = "Convert token ids back into text")]
    async fn detokenize(
        &self,
        Parameters(request): Parameters<DetokenizeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let text = self
            .client
            .detokenize(request.tokens)
            .await
            .map_err(internal_error)?;
        json_result(&text)
    }

    #[tool(description = "Render the model's chat template over messages without running inference")]
    async fn apply_template(
        &self,
        Parameters(request): Parameters<ApplyTemplateRequest>,
    ) -> Result<CallToolResult, McpError> {
        let rendered = self
            .client
            .apply_template(request.messages)
            .await
            .map_err(internal_error)?;
        json_result(&rendered)
    }

    #[tool(description = "Generate a text completion for a prompt")]
    async fn completion(
        &self,
        Parameters(request): Parameters<CompletionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = CompletionParams {
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: request.top_k,
            stop: request.stop,
            seed: request.seed,
        };
        let completion = self
            .client
            .completion(&request.prompt, params)
            .await
            .map_err(internal_error)?;
        json_result(&completion)
    }

    #[tool(description = "Run an OpenAI-compatible chat completion")]
    async fn chat_completion(
        &self,
        Parameters(request): Parameters<ChatCompletionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = ChatParams {
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop,
            seed: request.seed,
        };
        let chat = self
            .client
            .chat_completion(request.messages, params)
            .await
            .map_err(internal_error)?;
        json_result(&chat)
    }

    #[tool(description = "Compute an embedding vector for text")]
    async fn embedding(
        &self,
        Parameters(request): Parameters<EmbeddingRequest>,
    ) -> Result<CallToolResult, McpError> {
        let embedding = self
            .client
            .embedding(&request.content)
            .await
            .map_err(internal_error)?;
        json_result(&embedding)
    }

    #[tool(description = "Fill-in-middle completion between a prefix and a suffix")]
    async fn infill(
        &self,
        Parameters(request): Parameters<InfillRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = InfillParams {
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: request.stop,
        };
        let infill = self
            .client
            .infill(&request.input_prefix, &request.input_suffix, params)
            .await
            .map_err(internal_error)?;
        json_result(&infill)
    }

    #[tool(description = "Score documents by relevance to a query")]
    async fn rerank(
        &self,
        Parameters(request): Parameters<RerankRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ranking = self
            .client
            .rerank(&request.query, request.documents)
            .await
            .map_err(internal_error)?;
        json_result(&ranking)
    }

    #[tool(description = "Load a model by identifier (router mode)")]
    async fn load_model(
        &self,
        Parameters(request): Parameters<ModelRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.client
            .load_model(&request.model)
            .await
            .map_err(internal_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Loaded model: {}",
            request.model
        ))]))
    }

    #[tool(description = "Unload a model by identifier (router mode)")]
    async fn unload_model(
        &self,
        Parameters(request): Parameters<ModelRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.client
            .unload_model(&request.model)
            .await
            .map_err(internal_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Unloaded model: {}",
            request.model
        ))]))
    }

    #[tool(description = "List LoRA adapters with their current scales")]
    async fn list_lora_adapters(&self) -> Result<CallToolResult, McpError> {
        let adapters = self.client.lora_adapters().await.map_err(internal_error)?;
        json_result(&adapters)
    }

    #[tool(description = "Set LoRA adapter scales; returns the updated adapter list")]
    async fn set_lora_adapters(
        &self,
        Parameters(request): Parameters<SetLoraRequest>,
    ) -> Result<CallToolResult, McpError> {
        let adapters = self
            .client
            .set_lora_adapters(request.adapters)
            .await
            .map_err(internal_error)?;
        json_result(&adapters)
    }

    #[tool(description = "Start a local llama-server process and wait until it is healthy")]
    async fn start_server(
        &self,
        Parameters(request): Parameters<StartServerRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut opts = StartOptions::new(request.model);
        if let Some(port) = request.port {
            opts.port = port;
        }
        if let Some(ctx_size) = request.ctx_size {
            opts.ctx_size = ctx_size;
        }
        if let Some(n_gpu_layers) = request.n_gpu_layers {
            opts.n_gpu_layers = n_gpu_layers;
        }
        opts.threads = request.threads;

        let started = self.manager.start(opts).await.map_err(internal_error)?;
        json_result(&started)
    }

    #[tool(description = "Stop the locally managed llama-server process")]
    async fn stop_server(&self) -> Result<CallToolResult, McpError> {
        let stopped = self.manager.stop().await.map_err(internal_error)?;
        json_result(&stopped)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for LlamaMcpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "llama-server-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: Some(
                "Bridge to a local llama.cpp server. Inference tools: completion, chat_completion, \
                 embedding, infill, rerank, tokenize, detokenize, apply_template. Introspection: \
                 health, props, list_models, slots, metrics. Management: load_model, unload_model, \
                 list_lora_adapters, set_lora_adapters, start_server, stop_server."
                    .into(),
            ),
        }
    }
}
