use std::{future::Future, io::IsTerminal, path::PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::{Term, style};
use tokio::fs;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tubedigest_core::{
    ChunkLimit, EventBus, EventReceiver, LanguageModel, OpenAiClient, Orchestrator, Provider,
    Report, ReportLength, SummaryRequest, TruncationPolicy, VideoSource, YoutubeSource,
};

use crate::render::Renderer;

mod render;

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Groq,
    Openai,
    Grok,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Groq => Provider::Groq,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
        }
    }
}

#[derive(Clone, Default, ValueEnum)]
enum CliLength {
    #[default]
    Long,
    Short,
}

impl From<CliLength> for ReportLength {
    fn from(cli: CliLength) -> Self {
        match cli {
            CliLength::Long => ReportLength::Long,
            CliLength::Short => ReportLength::Short,
        }
    }
}

#[derive(Clone, Default, ValueEnum)]
enum CliTruncation {
    /// Keep partial output and flag the report
    #[default]
    AcceptPartial,
    /// Abort the run
    Fail,
}

impl From<CliTruncation> for TruncationPolicy {
    fn from(cli: CliTruncation) -> Self {
        match cli {
            CliTruncation::AcceptPartial => TruncationPolicy::AcceptPartial,
            CliTruncation::Fail => TruncationPolicy::Fail,
        }
    }
}

#[derive(Parser)]
#[command(name = "tubedigest")]
#[command(about = "Summarize YouTube videos from their captions with chunked, streamed LLM reports")]
struct Cli {
    /// Video URL
    url: String,

    /// AI provider for summarization
    #[arg(short, long, default_value = "groq")]
    provider: CliProvider,

    /// Model identifier. Defaults to the provider's first listed model.
    #[arg(short, long)]
    model: Option<String>,

    /// Report length
    #[arg(short, long, default_value = "long")]
    length: CliLength,

    /// Words per chunk (1000-10000)
    #[arg(long, default_value_t = ChunkLimit::DEFAULT)]
    chunk_limit: usize,

    /// Chunks summarized at once (1-8)
    #[arg(long, default_value_t = 1)]
    parallel: usize,

    /// What to do when the model stops mid-answer
    #[arg(long, default_value = "accept-partial")]
    on_truncation: CliTruncation,

    /// Override the provider's OpenAI-compatible base URL
    #[arg(long, env = "TUBEDIGEST_BASE_URL")]
    base_url: Option<String>,

    /// Caption languages passed to yt-dlp
    #[arg(long, default_value = YoutubeSource::DEFAULT_SUB_LANGS)]
    sub_langs: String,

    /// Write the final report markdown to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print pipeline events as NDJSON instead of rendering them
    #[arg(long)]
    json: bool,

    /// Exit after the first run
    #[arg(long)]
    no_interactive: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

enum Outcome {
    Completed(Report),
    Failed,
    Cancelled,
}

enum Action {
    Regenerate,
    NewUrl(String),
    SwitchModel(String),
    Quit,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter)
        .init();
}

fn build_request(cli: &Cli, model: String) -> tubedigest_core::Result<SummaryRequest> {
    SummaryRequest::new(&cli.url, model)?
        .with_length(cli.length.clone().into())
        .with_chunk_limit(ChunkLimit::new(cli.chunk_limit)?)
        .with_truncation_policy(cli.on_truncation.clone().into())
        .with_concurrency(cli.parallel)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Drive one run, rendering its events as they arrive. Resolving `cancel`
/// drops the run.
async fn run_once<S: VideoSource, M: LanguageModel>(
    orchestrator: &Orchestrator<S, M>,
    request: &SummaryRequest,
    events: &mut EventReceiver,
    renderer: &mut Renderer,
    cancel: impl Future<Output = ()>,
) -> Outcome {
    let run = orchestrator.run(request);
    tokio::pin!(run);
    tokio::pin!(cancel);

    let outcome = loop {
        tokio::select! {
            result = &mut run => break match result {
                Ok(report) => Outcome::Completed(report),
                Err(_) => Outcome::Failed,
            },
            Some(event) = events.recv() => {
                if event.run_id == request.run_id {
                    renderer.handle(&event);
                }
            }
            _ = &mut cancel => break Outcome::Cancelled,
        }
    };

    while let Ok(event) = events.try_recv() {
        if event.run_id == request.run_id {
            renderer.handle(&event);
        }
    }

    outcome
}

/// Ctrl-C at a prompt exits the process.
async fn read_line(prompt: String) -> Result<String> {
    let read = tokio::task::spawn_blocking(move || {
        let term = Term::stderr();
        term.write_str(&prompt)?;
        term.read_line()
    });

    tokio::select! {
        line = read => Ok(line??.trim().to_string()),
        _ = interrupted() => {
            eprintln!();
            std::process::exit(130);
        }
    }
}

async fn prompt_action(provider: &Provider, current_model: &str) -> Result<Action> {
    loop {
        let choice = read_line(format!(
            "{} {}egenerate  {}ew URL  switch {}odel  {}uit: ",
            style("?").cyan().bold(),
            style("[r]").bold(),
            style("[u]").bold(),
            style("[m]").bold(),
            style("[q]").bold(),
        ))
        .await?;

        match choice.to_lowercase().as_str() {
            "r" => return Ok(Action::Regenerate),
            "q" | "" => return Ok(Action::Quit),
            "u" => {
                let url = read_line(format!("{} Video URL: ", style("?").cyan().bold())).await?;
                if !url.is_empty() {
                    return Ok(Action::NewUrl(url));
                }
            }
            "m" => {
                let models = provider.config().models;
                for (i, model) in models.iter().enumerate() {
                    let marker = if *model == current_model { "*" } else { " " };
                    eprintln!("  {} {:>2}. {}", marker, i + 1, model);
                }
                let pick = read_line(format!(
                    "{} Model (number or name): ",
                    style("?").cyan().bold()
                ))
                .await?;
                let model = match pick.parse::<usize>() {
                    Ok(n) if (1..=models.len()).contains(&n) => models[n - 1].to_string(),
                    _ => pick,
                };
                if !model.is_empty() {
                    return Ok(Action::SwitchModel(model));
                }
            }
            other => eprintln!("{} Unknown choice: {}", style("!").yellow().bold(), other),
        }
    }
}

async fn save_report(report: &Report, path: &PathBuf) {
    match fs::write(path, &report.markdown).await {
        Ok(()) => eprintln!(
            "{} {}",
            style("Saved:").dim(),
            style(path.display()).cyan()
        ),
        Err(e) => eprintln!(
            "{} could not write {}: {}",
            style("Error:").red().bold(),
            path.display(),
            e
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let provider: Provider = cli.provider.clone().into();

    // Validate API key early
    let api_key = match provider.validate_api_key() {
        Ok(key) => key,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| provider.config().default_model.to_string());

    let mut request = match build_request(&cli, model) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let mut client = OpenAiClient::for_provider(&provider, api_key);
    if let Some(base_url) = &cli.base_url {
        client = client.with_base_url(base_url);
    }
    tracing::debug!(provider = provider.name(), base_url = client.base_url(), "Client ready");

    let source = YoutubeSource::new().with_sub_langs(&cli.sub_langs);
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let orchestrator = Orchestrator::new(source, client, bus);
    let mut renderer = Renderer::new(cli.json);

    let interactive = !cli.no_interactive && !cli.json && std::io::stdin().is_terminal();

    if !cli.json {
        eprintln!(
            "\n{}  {}\n",
            style("tubedigest").cyan().bold(),
            style("Video Summarizer").dim()
        );
    }

    loop {
        if !provider.is_known_model(&request.model) {
            tracing::warn!(model = %request.model, provider = provider.name(), "Model is not in the provider's list");
        }
        if !cli.json {
            eprintln!(
                "{} {} {}",
                style("▶").cyan().bold(),
                style(&request.url).bold(),
                style(format!("({}, {})", request.model, request.length.name())).dim()
            );
            eprintln!("{}", style("─".repeat(60)).dim());
        }

        let outcome = run_once(
            &orchestrator,
            &request,
            &mut events,
            &mut renderer,
            interrupted(),
        )
        .await;

        let succeeded = match &outcome {
            Outcome::Completed(report) => {
                if let Some(path) = &cli.output {
                    save_report(report, path).await;
                }
                true
            }
            Outcome::Failed => false,
            Outcome::Cancelled => {
                renderer.reset();
                eprintln!("\n{}", style("Cancelled.").yellow());
                false
            }
        };

        if !interactive {
            if !succeeded {
                std::process::exit(1);
            }
            break;
        }

        request = loop {
            let next = match prompt_action(&provider, &request.model).await? {
                Action::Quit => return Ok(()),
                Action::Regenerate => Ok(request.regenerate()),
                Action::NewUrl(url) => request.with_url(url),
                Action::SwitchModel(model) => request.with_model(model),
            };
            match next {
                Ok(next) => break next,
                Err(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
            }
        };
    }

    Ok(())
}
