//! Literature assistant server binary
//!
//! Run with: cargo run -p scholar-rag --bin scholar-rag-server -- serve

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use scholar_rag::{
    config::{AppConfig, EmbeddingBackend},
    ingestion::{hash_content, DocumentParser, OcrEngine},
    server::ScholarServer,
    types::Document,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scholar-rag-server", version, about = "Paper summaries and grounded Q&A")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Override HOST
        #[arg(long)]
        host: Option<String>,
        /// Override PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Parse a file and print the document tree as JSON
    Parse {
        file: PathBuf,
    },
    /// Validate configuration and print it (secrets omitted)
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scholar_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => serve(host, port).await,
        Command::Parse { file } => parse(file).await,
        Command::CheckConfig => {
            let config = AppConfig::from_env()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                       Scholar RAG                         ║
║        Paper Summaries and Grounded Question Answering    ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = AppConfig::from_env()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - LLM: {} at {}", config.llm.model, config.llm.base_url);
    match config.embeddings.backend {
        EmbeddingBackend::OpenAi => tracing::info!("  - Embeddings: {} at {}", config.embeddings.model, config.embeddings.base_url),
        EmbeddingBackend::Hashing => tracing::info!("  - Embeddings: local hashing ({} dims)", config.embeddings.dimensions),
    }
    tracing::info!("  - Chunk size: {} (overlap {})", config.chunking.chunk_size, config.chunking.chunk_overlap);
    tracing::info!("  - Prompt budget: {} chars", config.prompt.max_chars);
    tracing::info!("  - Data dir: {}", config.storage.data_dir.display());

    let server = ScholarServer::new(config).await?;
    if let Err(e) = server.state().llm_provider().health_check().await {
        tracing::warn!("LLM API not reachable yet: {}", e);
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/documents  - Upload papers");
    println!("  POST /api/summaries  - Summarize a paper");
    println!("  POST /api/qa/ask     - Ask a question");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

/// Parse without touching any external API
async fn parse(file: PathBuf) -> anyhow::Result<()> {
    let data = tokio::fs::read(&file).await?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    // parsing needs no API key, so fall back to OCR defaults when the env is incomplete
    let ocr_config = AppConfig::from_env().map(|c| c.ocr).unwrap_or_default();
    let min_chars = ocr_config.min_chars_per_page;
    let parser = DocumentParser::new(OcrEngine::new(ocr_config), min_chars);

    let parsed = parser.parse(&filename, &data, None).await?;
    let mut doc = Document::new(&filename, parsed.format, data.len() as u64, hash_content(&data));
    parsed.apply_to(&mut doc);

    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
