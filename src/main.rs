//! colloquy entrypoint: config, keys, session, subscriber endpoint.

use anyhow::{Context, bail};
use clap::Parser;
use colloquy::ai::remote::HttpGenerativeClient;
use colloquy::audio::wav::WavAudioSource;
use colloquy::cli::{Cli, Commands};
use colloquy::config::Config;
use colloquy::server::routes::{self, AppState};
use colloquy::session::runtime::{Session, SessionConfig};
use colloquy::transcribe::remote::HttpTranscriptionClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the transcription API key.
const TRANSCRIPTION_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable holding the generative API key.
const GENERATIVE_KEY_ENV: &str = "GOOGLE_API_KEY";

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "colloquy=info",
        1 => "colloquy=debug",
        _ => "colloquy=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&path)
        .with_context(|| format!("loading config from {}", path.display()))?
        .with_env_overrides();
    config.validate().context("validating configuration")?;
    Ok(config)
}

fn require_key(var: &str) -> anyhow::Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => bail!("{var} environment variable required"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Check) => check(&cli),
        Some(Commands::Serve {
            ref host,
            port,
            ref audio_file,
        }) => {
            let host = host.clone();
            let audio_file = audio_file.clone();
            serve(&cli, host, port, audio_file).await
        }
        None => serve(&cli, None, None, None).await,
    }
}

fn check(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    println!("configuration ok");
    println!("  primary model:  {}", config.transcription.transcription_model);
    println!("  fallback chain: {:?}", config.transcription.model_fallback);
    println!("  ai model:       {}", config.ai.model);
    println!(
        "  endpoint:       {}:{}",
        config.server.server_host, config.server.server_port
    );

    for var in [TRANSCRIPTION_KEY_ENV, GENERATIVE_KEY_ENV] {
        match require_key(var) {
            Ok(_) => println!("  {var}: set"),
            Err(_) => println!("  {var}: MISSING"),
        }
    }
    Ok(())
}

async fn serve(
    cli: &Cli,
    host: Option<String>,
    port: Option<u16>,
    audio_file: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let mut config = load_config(cli)?;
    if let Some(host) = host {
        config.server.server_host = host;
    }
    if let Some(port) = port {
        config.server.server_port = port;
    }

    let transcription_key = require_key(TRANSCRIPTION_KEY_ENV)?;
    let generative_key = require_key(GENERATIVE_KEY_ENV)?;

    // Platform capture drivers live outside the core; the binary runs in
    // pipe mode against WAV input.
    let source: Box<dyn colloquy::audio::AudioSource> = match audio_file {
        Some(path) => Box::new(
            WavAudioSource::from_path(&path)
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(WavAudioSource::from_stdin().context("reading WAV from stdin")?),
    };

    let transcription = Arc::new(HttpTranscriptionClient::new(
        config.transcription.api_base.clone(),
        transcription_key,
    ));
    let generative = Arc::new(HttpGenerativeClient::new(
        config.ai.api_base.clone(),
        generative_key,
        config.ai.model.clone(),
    ));

    let session = Session::start(
        SessionConfig::from_config(&config),
        source,
        transcription,
        generative,
    )?;

    let state = Arc::new(AppState {
        hub: session.hub(),
        stats: session.stats(),
    });
    let router = routes::router(state);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };

    routes::serve(
        router,
        &config.server.server_host,
        config.server.server_port,
        shutdown,
    )
    .await?;

    session.shutdown().await;
    tracing::info!("session stopped");
    Ok(())
}
