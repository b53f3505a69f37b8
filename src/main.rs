use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

mod config;
mod error;
mod extractor;
mod hms;
mod llm;
mod logger;
mod pipeline;
mod predictor;
mod providers;
mod trace;
mod ui;

use config::Config;
use llm::{LLMManager, LLMProvider, LocalProvider};
use pipeline::Pipeline;
use predictor::{LinearModel, PointPredictor};
use providers::openai::OpenAIProvider;
use trace::TraceSink;
use ui::UiHandler;

#[derive(Parser)]
#[command(name = "pacecast")]
struct Args {
    /// Path to a config file (default: pacecast.toml)
    #[arg(short, long)]
    config: Option<String>,
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
    /// OpenAI API key (falls back to OPENAI_API_KEY, then an interactive prompt)
    #[arg(long)]
    api_key: Option<String>,
    /// Free-text self-description; runs once and exits when given
    #[arg(last = true)]
    text: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logger::init(args.verbose);

    let config = Config::load(&args.config)?;
    let ui = UiHandler::new(config.ui.colorful);

    let predictor: Box<dyn PointPredictor> = match &config.predictor.coefficients {
        Some(path) => {
            let expanded = shellexpand::tilde(path);
            Box::new(LinearModel::from_file(expanded.as_ref())?)
        }
        None => Box::new(LinearModel::default()),
    };

    let sink = Arc::new(TraceSink::new(256));
    if args.verbose {
        spawn_trace_logger(&sink);
    }

    let provider = build_provider(&config, args.api_key)?;
    let llm = LLMManager::new(provider, sink.clone());
    let pipeline = Pipeline::new(llm, predictor, sink);

    let one_shot = args.text.join(" ");
    if !one_shot.trim().is_empty() {
        let succeeded = run_once(&pipeline, &ui, &one_shot).await?;
        return Ok(if succeeded {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    run_interactive(&pipeline, &ui).await?;
    Ok(ExitCode::SUCCESS)
}

/// Resolve the provider from config, threading the credential in
/// explicitly rather than stashing it in the environment.
fn build_provider(config: &Config, api_key_arg: Option<String>) -> Result<Box<dyn LLMProvider>> {
    match config.provider.kind.as_str() {
        "local" => Ok(Box::new(LocalProvider)),
        "openai" => {
            let api_key = match api_key_arg.or_else(|| std::env::var("OPENAI_API_KEY").ok()) {
                Some(key) if !key.trim().is_empty() => key,
                _ => read_api_key()?,
            };
            let provider = OpenAIProvider::new(
                api_key,
                config.provider.model.clone(),
                config.provider.temperature,
                Duration::from_secs(config.provider.request_timeout_secs),
            )?;
            Ok(Box::new(provider))
        }
        other => bail!("unknown provider kind: {}", other),
    }
}

/// Interactive credential entry, gating everything else.
fn read_api_key() -> Result<String> {
    print!("OpenAI API key: ");
    io::stdout().flush()?;
    let mut key = String::new();
    io::stdin().lock().read_line(&mut key)?;
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!("an OpenAI API key is required (set OPENAI_API_KEY or pass --api-key)");
    }
    Ok(key)
}

/// One submission, then exit. The error is already rendered here; the
/// returned flag only drives the process exit code so destructors still
/// run on the way out.
async fn run_once(pipeline: &Pipeline, ui: &UiHandler, input: &str) -> Result<bool> {
    match pipeline.estimate(input).await {
        Ok(estimate) => {
            ui.show_estimate(&estimate);
            Ok(true)
        }
        Err(err) => {
            ui.show_error(&err);
            Ok(false)
        }
    }
}

async fn run_interactive(pipeline: &Pipeline, ui: &UiHandler) -> Result<()> {
    ui.banner();
    let stdin = io::stdin();
    loop {
        ui.prompt();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        match line.trim() {
            ":quit" | ":q" => break,
            ":clear" => ui.clear_screen(),
            input => match pipeline.estimate(input).await {
                Ok(estimate) => ui.show_estimate(&estimate),
                Err(err) => ui.show_error(&err),
            },
        }
    }
    Ok(())
}

/// Mirror every trace record into the log when running verbose.
fn spawn_trace_logger(sink: &Arc<TraceSink>) {
    let mut receiver = sink.subscribe();
    tokio::spawn(async move {
        while let Ok(record) = receiver.recv().await {
            info!(
                "trace {}",
                serde_json::to_string(&record).unwrap_or_else(|_| format!("{:?}", record))
            );
        }
    });
}
