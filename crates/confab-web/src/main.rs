//! confab - chat with a locally hosted model from your browser

mod config;
mod deployment;
mod routes;
mod state;

use clap::Parser;

/// confab - local browser chat for Ollama-hosted models
#[derive(Parser, Debug)]
#[command(name = "confab")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to chat with (default from config)
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of the model server
    #[arg(long)]
    ollama_url: Option<String>,

    /// Address to bind the web server on
    #[arg(long)]
    host: Option<String>,

    /// Port to bind the web server on
    #[arg(short, long)]
    port: Option<u16>,

    /// Skip the local-deployment guard
    #[arg(long)]
    allow_public: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file and merge CLI args (CLI takes precedence)
    let mut cfg = config::Config::load();
    if let Some(model) = args.model {
        cfg.model = model;
    }
    if let Some(url) = args.ollama_url {
        cfg.ollama_url = url;
    }
    if let Some(host) = args.host {
        cfg.host = host;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if args.allow_public {
        cfg.allow_public = true;
    }

    deployment::verify_local(cfg.allow_public)?;

    let state = state::AppState::new(&cfg);
    let router = routes::create_router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        model = %cfg.model,
        backend = %cfg.ollama_url,
        "listening on http://{addr}"
    );

    axum::serve(listener, router).await?;
    Ok(())
}
