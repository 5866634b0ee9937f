use clap::{Parser, Subcommand, ValueEnum};
use llama_server_mcp::{Config, LlamaClient, LlamaMcpService, Result};
use llama_server_mcp::types::CompletionParams;

#[derive(Parser)]
#[command(name = "llama-server-mcp")]
#[command(about = "MCP bridge for the llama.cpp server HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum McpTransport {
    /// Standard input/output (for local MCP clients)
    Stdio,
    /// Server-Sent Events over HTTP
    Sse,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server
    Mcp {
        /// Transport method: stdio or sse
        #[arg(short, long, default_value = "stdio")]
        transport: McpTransport,
        /// Port for the SSE transport (ignored for stdio)
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Query llama-server health
    Health,
    /// Run a one-shot completion against llama-server
    Complete {
        prompt: String,
        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the stdio MCP transport stays clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Mcp { transport, port } => run_mcp_server(config, transport, port).await?,
        Commands::Health => {
            let client = LlamaClient::new(config);
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Complete {
            prompt,
            max_tokens,
            temperature,
        } => {
            let client = LlamaClient::new(config);
            let params = CompletionParams {
                max_tokens,
                temperature,
                ..Default::default()
            };
            let completion = client.completion(&prompt, params).await?;
            println!("{}", completion.content);
        }
    }

    Ok(())
}

async fn run_mcp_server(config: Config, transport: McpTransport, port: u16) -> Result<()> {
    use rmcp::ServiceExt;

    let service = LlamaMcpService::new(config);

    match transport {
        McpTransport::Stdio => {
            tracing::info!("Starting MCP server with stdio transport");
            let (stdin, stdout) = (tokio::io::stdin(), tokio::io::stdout());
            let running = service.serve((stdin, stdout)).await?;
            running.waiting().await?;
        }
        McpTransport::Sse => {
            tracing::info!("Starting MCP server with SSE transport on port {}", port);

            let ct = tokio_util::sync::CancellationToken::new();
            let sse_config = rmcp::transport::sse_server::SseServerConfig {
                bind: format!("0.0.0.0:{}", port).parse()?,
                sse_path: "/sse".to_string(),
                post_path: "/message".to_string(),
                ct: ct.clone(),
                sse_keep_alive: Some(std::time::Duration::from_secs(30)),
            };

            let sse_server = rmcp::transport::sse_server::SseServer::serve_with_config(sse_config).await?;
            let _ct = sse_server.with_service_directly(move || service.clone());

            tokio::signal::ctrl_c().await?;
        }
    }

    Ok(())
}
