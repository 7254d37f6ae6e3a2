use std::process::ExitCode;

use clap::Parser;
use nvds_bus::{
    builder::{PipelineBuilder, PipelineRequest},
    deepstream::DeepStreamBackend,
    labels::LabelSet,
    platform::PlatformClass,
    runtime::{PipelineRuntime, RunOutcome},
    settings::BatcherMode,
    source::resolve_sources,
    topology::{OutputMode, OutputTarget},
};
use tokio_util::sync::CancellationToken;

mod cli;
mod config;

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("nvds_bus", log::LevelFilter::Debug)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = cli::Args::parse();

    match run(args).await {
        Ok(outcome) => {
            log::info!("Exiting: {:?}", outcome);
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: cli::Args) -> anyhow::Result<RunOutcome> {
    let config = config::AppConfig::load(&args.config)?;
    let output_mode = OutputMode::from(args.output);
    let batcher_mode = BatcherMode::from_env();
    let platform = args
        .platform
        .map(PlatformClass::from)
        .or(config.platform)
        .unwrap_or_else(PlatformClass::detect);
    log::info!(
        "Starting: output {}, platform {}, batcher {:?}",
        output_mode,
        platform,
        batcher_mode
    );

    let labels = LabelSet::load(&config.model.labels_path)?;
    let sources = resolve_sources(&config.sources);

    nvds_bus::init()?;
    let backend = DeepStreamBackend::new(config.pipeline.batcher_frame_size(batcher_mode))?;
    let request = PipelineRequest {
        output_mode,
        platform,
        batcher_mode,
        model: config.model,
        tracker: config.tracker,
        settings: config.pipeline,
        labels,
        started_at: chrono::Local::now().naive_local(),
    };
    let pipeline = PipelineBuilder::new(request).build(backend, sources)?;

    match pipeline.output() {
        OutputTarget::File(path) => println!("Writing annotated output to {}", path.display()),
        OutputTarget::Relay(_) => {
            if let Some(endpoint) = pipeline.relay_endpoint() {
                println!("*** RTSP stream ready at {} ***", endpoint);
            }
        }
        OutputTarget::Display(_) | OutputTarget::Discard => {}
    }

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received, stopping");
            cancel_clone.cancel();
        }
    });

    let mut runtime = PipelineRuntime::new(pipeline);
    runtime.run(cancel).await
}
