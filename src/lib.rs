//! llama-server-mcp: MCP bridge for the llama.cpp server HTTP API
//!
//! This library provides:
//! - A typed async client for every llama-server endpoint (health, tokenize,
//!   completion, chat, embedding, infill, rerank, model and LoRA management)
//! - A lifecycle manager that spawns llama-server as a child process and
//!   waits until it reports healthy
//! - An MCP (Model Context Protocol) service exposing both as tools
//!
//! # Example
//!
//! ```no_run
//! use llama_server_mcp::{Config, LlamaClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = LlamaClient::new(Config::from_env()?);
//!
//!     let health = client.health().await?;
//!     println!("server status: {:?}", health.status);
//!
//!     let completion = client.completion("Hello", Default::default()).await?;
//!     println!("{}", completion.content);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod mcp;
pub mod process;
pub mod types;

// Re-export main types for library users
pub use client::LlamaClient;
pub use config::Config;
pub use error::{ClientError, ProcessError};
pub use mcp::LlamaMcpService;
pub use process::{ProcessState, ServerManager, StartOptions, StartResult, StopResult};

// Re-export common types
pub type Result<T> = std::result::Result<T, anyhow::Error>;
