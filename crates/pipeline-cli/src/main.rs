mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pipeline_core::GenerationLocks;
use pipeline_provider::{OpenAiProvider, OpenAiSpeech};
use pipeline_server::state::AppState;
use pipeline_store::Store;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "pipeline", about = "Internship marketplace agent backend")]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "pipeline.yaml")]
    config: PathBuf,

    /// Override the bind address from the config
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let log_dir = PathBuf::from(&config.logging.dir);
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pipeline.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "pipeline_server=info,pipeline_core=info,tower_http=debug".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let store = Store::open(&config.store.path)?;
    tracing::info!(path = %config.store.path, "store opened");

    let api_key = config.api_key();
    if api_key.is_empty() {
        tracing::warn!("no provider api key configured; completions will fail");
    }

    // The provider clients are built once here and shared; nothing else in
    // the tree constructs one.
    let provider = Arc::new(OpenAiProvider::new(api_key.clone(), config.provider.api_base.clone()));
    let speech = Arc::new(OpenAiSpeech::new(api_key, config.provider.api_base.clone()));

    let state = AppState {
        store,
        provider,
        speech,
        locks: GenerationLocks::new(),
        model: config.provider.model.clone(),
        voice: config.provider.voice.clone(),
    };

    let addr = args.bind.unwrap_or(config.server.bind);
    pipeline_server::serve(state, &addr).await
}
