//! agentrace CLI - submit one question and print generations as they stream in.
//!
//! ```text
//! main() -> load config -> Submitter::submit() -> StreamUpdate channel -> StreamPrinter
//!                                                      ^
//!                                      Ctrl-C -> CancelToken::cancel()
//! ```
//!
//! Exit status is 0 for a completed or cancelled stream and 1 when the request
//! fails or cannot be configured.

mod render;

use std::env;
use std::fs::{self, OpenOptions};
use std::future;
use std::io::{self, IsTerminal, Read, stdout};
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Mutex;

use agentrace_config::{API_KEY_ENV, API_URL_ENV, AgentraceConfig, config_dir};
use agentrace_providers::{ApiConfig, StreamUpdate, Submitter};
use anyhow::{Context, Result, bail};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::render::StreamPrinter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries the answer, so logs fall back to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.agentrace/logs/agentrace.log
    if let Some(dir) = config_dir() {
        candidates.push(dir.join("logs").join("agentrace.log"));
    }

    candidates.push(PathBuf::from(".agentrace").join("logs").join("agentrace.log"));

    candidates
}

/// Question from the command line, or from stdin when no arguments are given.
fn read_question() -> Result<String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let question = if args.is_empty() {
        if io::stdin().is_terminal() {
            bail!("usage: agentrace <question...>  (or pipe the question on stdin)");
        }
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("failed to read question from stdin")?;
        input
    } else {
        args.join(" ")
    };

    let question = question.trim();
    if question.is_empty() {
        bail!("question is empty");
    }
    Ok(question.to_string())
}

fn build_api_config(config: &AgentraceConfig) -> Result<ApiConfig> {
    let config_hint = AgentraceConfig::path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "~/.agentrace/config.toml".to_string());

    let url = config.resolved_api_url().with_context(|| {
        format!("no API URL configured; set {API_URL_ENV} or [api] url in {config_hint}")
    })?;
    let key = config.resolved_api_key().with_context(|| {
        format!("no API key configured; set {API_KEY_ENV} or [api] api_key in {config_hint}")
    })?;

    let mut api = ApiConfig::new(url, key)?;
    if let Some(version) = config.version() {
        api = api.with_version(version);
    }
    if let Some(idle_timeout) = config.idle_timeout() {
        api = api.with_idle_timeout(idle_timeout);
    }
    if let Some(max_buffer_bytes) = config.max_buffer_bytes() {
        api = api.with_max_buffer_bytes(max_buffer_bytes);
    }
    Ok(api)
}

async fn run() -> Result<ExitCode> {
    let question = read_question()?;
    let config = AgentraceConfig::load()?.unwrap_or_default();
    let api = build_api_config(&config)?;

    let mut submitter = Submitter::new();
    let mut updates = submitter.submit(api, question);
    let mut printer = StreamPrinter::new(stdout());
    let mut ctrl_c = pin!(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(%e, "Failed to listen for Ctrl-C");
            future::pending::<()>().await;
        }
    });

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(StreamUpdate::Snapshot(snapshot)) => printer.show(&snapshot)?,
                Some(StreamUpdate::Completed(snapshot)) => {
                    printer.show(&snapshot)?;
                    printer.end()?;
                    return Ok(ExitCode::SUCCESS);
                }
                Some(StreamUpdate::Cancelled) | None => {
                    printer.end()?;
                    return Ok(ExitCode::SUCCESS);
                }
                Some(StreamUpdate::Failed(message)) => {
                    printer.end()?;
                    eprintln!("Error: {message}");
                    return Ok(ExitCode::FAILURE);
                }
            },
            () = &mut ctrl_c => {
                submitter.cancel();
                tracing::info!("Cancelled by user");
                printer.end()?;
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
