use chat_relay::providers::ProviderPreset;
use chat_relay::{build_router, AppState, OpenAiProvider, RelayConfig, SharedLogger};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "chat-relay",
    about = "HTTP chat relay for OpenAI-compatible providers",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Provider preset name (overrides config)
    #[arg(long)]
    provider: Option<String>,

    /// Event log file path
    #[arg(long, default_value = "chat-relay.log")]
    log_file: PathBuf,

    /// List provider presets and exit
    #[arg(long)]
    list_providers: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.list_providers {
        println!("Provider presets:");
        for preset in ProviderPreset::all() {
            println!("  {:<12} {}", preset.name, preset.base_url);
        }
        return Ok(());
    }

    let mut config = RelayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env()?;

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(provider) = cli.provider {
        config.provider.name = provider;
    }

    config.validate()?;
    if config.provider.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; provider calls will likely be rejected");
    }

    let logger = SharedLogger::new(&cli.log_file)?;
    let provider = OpenAiProvider::new(config.provider.clone())?;

    info!("chat-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Provider:  {}", config.provider.name);
    info!("  Endpoint:  {}", provider.endpoint());
    info!("  Model:     {}", config.provider.model);
    info!(
        "  Timeout:   {:?} (max {} retries)",
        config.provider.timeout(),
        config.provider.max_retries
    );
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting chat-relay provider={} model={} port={}",
            config.provider.name, config.provider.model, config.server.port
        ),
    );

    let state = Arc::new(AppState {
        provider: Arc::new(provider),
        logger,
    });

    let app = build_router(state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  POST http://{}/api/v1/chat/", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
