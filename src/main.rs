use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tracing::{error, info};

mod background;
mod config;
mod error;
mod handlers;
mod llm;
mod pipeline;
mod scratch;
mod state;
#[cfg(test)]
mod testing;
mod utils;

use background::RemoveBgClient;
use config::Config;
use llm::OpenAiAssessor;
use pipeline::{AssessmentPipeline, ExposureRequest};
use scratch::ScratchDir;
use state::AppState;
use utils::http::build_http_client;
use utils::logging::init_logging;

#[derive(Debug, PartialEq)]
struct AnalyzeArgs {
    file_path: PathBuf,
    metadata: String,
    previous_settings: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Serve,
    Analyze(AnalyzeArgs),
}

fn usage() -> &'static str {
    "Usage: booth-exposure-assistant [serve]\n       booth-exposure-assistant analyze --file <path> --metadata <text> [--previous-settings <text>]"
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    match args.get(1).map(|value| value.as_str()) {
        None | Some("serve") => {
            if let Some(extra) = args.get(2) {
                return Err(anyhow!("Unknown serve argument: {extra}\n{}", usage()));
            }
            Ok(Command::Serve)
        }
        Some("analyze") => parse_analyze_args(&args[2..]).map(Command::Analyze),
        Some("--help") | Some("-h") | Some("help") => Err(anyhow!(usage())),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

fn parse_analyze_args(args: &[String]) -> anyhow::Result<AnalyzeArgs> {
    let mut file_path: Option<PathBuf> = None;
    let mut metadata: Option<String> = None;
    let mut previous_settings: Option<String> = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--file" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --file"))?;
                file_path = Some(PathBuf::from(value));
            }
            "--metadata" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --metadata"))?;
                metadata = Some(value.clone());
            }
            "--previous-settings" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --previous-settings"))?;
                previous_settings = Some(value.clone());
            }
            "--help" | "-h" => {
                return Err(anyhow!(usage()));
            }
            other => {
                return Err(anyhow!(
                    "Unknown analyze argument: {other}\n{}",
                    usage()
                ));
            }
        }
        index += 1;
    }

    let file_path = file_path.ok_or_else(|| anyhow!("--file is required"))?;
    let metadata = metadata
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("--metadata is required"))?;

    Ok(AnalyzeArgs {
        file_path,
        metadata,
        previous_settings: previous_settings.filter(|value| !value.trim().is_empty()),
    })
}

fn build_pipeline(config: &Config) -> anyhow::Result<AssessmentPipeline> {
    let client = build_http_client(config.http_timeout_secs)
        .context("Failed to build HTTP client")?;

    let assessor = OpenAiAssessor::new(
        client.clone(),
        config.openai.clone(),
        config.reference_images.clone(),
        config.preferences.clone(),
    );
    let mut pipeline =
        AssessmentPipeline::new(Arc::new(assessor), ScratchDir::new(&config.scratch_dir));

    if let Some(removal) = &config.background_removal {
        pipeline = pipeline
            .with_background_replacer(Arc::new(RemoveBgClient::new(client, removal.clone())));
    }

    Ok(pipeline)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn serve(config: Config, pipeline: AssessmentPipeline) -> anyhow::Result<()> {
    let state = AppState::new(pipeline, config.reference_images.len());
    let app = handlers::router(state, config.server.max_upload_bytes);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn run_analyze(pipeline: AssessmentPipeline, args: AnalyzeArgs) -> anyhow::Result<()> {
    let image = tokio::fs::read(&args.file_path)
        .await
        .with_context(|| format!("Failed to read {}", args.file_path.display()))?;
    if image.is_empty() {
        return Err(anyhow!("{} is empty", args.file_path.display()));
    }

    let suggestion = pipeline
        .run(ExposureRequest {
            image,
            metadata: args.metadata,
            previous_settings: args.previous_settings,
        })
        .await?;
    println!("{suggestion}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_command(&args)?;

    let config = Config::load()?;
    let _guards = init_logging(&config.log_dir, &config.log_level);

    info!(
        "Starting booth exposure assistant (model={}, background_removal={}, reference_images={}, scratch_dir={})",
        config.openai.model,
        config.background_removal.is_some(),
        config.reference_images.len(),
        config.scratch_dir.display()
    );
    if let Some(path) = &config.reference_images_path {
        info!("Reference image config: {}", path.display());
    }

    let pipeline = build_pipeline(&config)?;

    match command {
        Command::Serve => serve(config, pipeline).await,
        Command::Analyze(analyze_args) => run_analyze(pipeline, analyze_args).await,
    }
}
