use anyhow::Context;
use clap::{Parser, Subcommand};
use codedoc_core::{
    render_entry, render_header, ArtifactSet, DiagramKind, FlowBoard, GatewayConfig, HttpGateway,
    ProjectCounts, SessionController, SessionError, SessionState, Stage, WorkflowOutcome,
    DEFAULT_MAX_DEPTH,
};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "codedoc", version, about = "Drive the documentation analysis service")]
struct Cli {
    /// Base URL of the analysis service (overrides CODEDOC_API_BASE_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds (overrides CODEDOC_API_TIMEOUT_SECS)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a repository and run the analysis workflow
    Analyze {
        repo_url: String,
        /// Also fetch call flows and artifacts once the repository is known
        #[arg(long)]
        artifacts: bool,
        #[arg(long, default_value_t = DiagramKind::Class)]
        diagram: DiagramKind,
    },
    /// Show call-flow traces for an analyzed repository
    Flows {
        repo_name: String,
        #[arg(long)]
        expand_all: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },
    /// Fetch entities, schema, swagger, feature files and a diagram
    Artifacts {
        repo_name: String,
        #[arg(long, default_value_t = DiagramKind::Class)]
        diagram: DiagramKind,
    },
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct SessionProgressPayload {
    generation: u64,
    stage: Stage,
    label: &'static str,
    repo_name: Option<String>,
    notice: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeCompletePayload {
    state: SessionState,
    counts: ProjectCounts,
    markdown_url: Option<String>,
    features_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowEntryPayload {
    header: String,
    expanded: bool,
    lines: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowsPayload {
    repo_name: String,
    entries: Vec<FlowEntryPayload>,
}

#[derive(Debug, Serialize)]
struct EventLine<'a, T: Serialize> {
    event: &'a str,
    payload: &'a T,
}

fn emit<T: Serialize>(event: &str, payload: &T) {
    match serde_json::to_string(&EventLine { event, payload }) {
        Ok(line) => println!("{line}"),
        Err(error) => warn!(event, %error, "failed to serialize event"),
    }
}

fn build_gateway(cli: &Cli) -> Result<HttpGateway, SessionError> {
    let mut config = GatewayConfig::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_base_url(url)?;
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    HttpGateway::new(config)
}

async fn forward_progress(mut receiver: watch::Receiver<SessionState>) {
    while receiver.changed().await.is_ok() {
        let payload = {
            let state = receiver.borrow_and_update();
            SessionProgressPayload {
                generation: state.generation,
                stage: state.stage,
                label: state.stage.label(),
                repo_name: state.snapshot.repo_name().map(str::to_string),
                notice: state.notice.clone(),
            }
        };
        emit("session.progress", &payload);
    }
}

fn link<U: ToString>(url: Result<U, SessionError>) -> Option<String> {
    url.ok().map(|url| url.to_string())
}

fn flows_payload(board: &FlowBoard, max_depth: usize) -> FlowsPayload {
    let entries = board
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let expanded = board.is_expanded(index);
            FlowEntryPayload {
                header: render_header(entry),
                expanded,
                lines: if expanded {
                    render_entry(entry, max_depth)
                } else {
                    Vec::new()
                },
            }
        })
        .collect();

    FlowsPayload {
        repo_name: board.repo_name().to_string(),
        entries,
    }
}

async fn analyze_start(
    gateway: HttpGateway,
    repo_url: &str,
    artifacts: bool,
    diagram: DiagramKind,
) -> Result<bool, String> {
    let controller = SessionController::new(Arc::new(gateway));
    let progress = tokio::spawn(forward_progress(controller.subscribe()));

    let outcome = controller.submit(repo_url).await;
    let state = controller.current();
    let repo_name = state.snapshot.repo_name().map(str::to_string);
    let gateway = controller.gateway().clone();
    drop(controller);
    progress
        .await
        .map_err(|error| format!("Progress task failed: {error}"))?;

    emit(
        "session.complete",
        &AnalyzeCompletePayload {
            counts: state.snapshot.counts(),
            markdown_url: repo_name
                .as_deref()
                .and_then(|name| link(gateway.markdown_export_url(name))),
            features_url: repo_name
                .as_deref()
                .and_then(|name| link(gateway.features_download_url(name))),
            state,
        },
    );

    let succeeded = match &outcome {
        WorkflowOutcome::Completed { warning, .. } => {
            if let Some(warning) = warning {
                warn!(%warning, "workflow completed with a warning");
            }
            true
        }
        WorkflowOutcome::Failed(error) => {
            warn!(kind = ?error.kind(), %error, "workflow failed");
            false
        }
        WorkflowOutcome::Superseded { generation } => {
            warn!(generation, "workflow superseded");
            false
        }
    };

    // Views keyed by repo_name stay usable even when a later stage failed.
    if artifacts {
        if let Some(name) = repo_name.as_deref() {
            let (board, set) = tokio::join!(
                FlowBoard::load(&*gateway, name),
                ArtifactSet::load(&*gateway, name, diagram),
            );
            match board {
                Ok(mut board) => {
                    board.expand_all();
                    emit("flows.loaded", &flows_payload(&board, DEFAULT_MAX_DEPTH));
                }
                Err(error) => emit("flows.failed", &error),
            }
            emit("artifacts.loaded", &set);
        }
    }

    Ok(succeeded)
}

async fn flows_show(
    gateway: HttpGateway,
    repo_name: &str,
    expand_all: bool,
    max_depth: usize,
) -> Result<(), String> {
    let mut board = FlowBoard::load(&gateway, repo_name)
        .await
        .map_err(|error| error.to_string())?;
    if expand_all {
        board.expand_all();
    }
    for (index, entry) in board.entries().iter().enumerate() {
        let marker = if board.is_expanded(index) { "▼" } else { "▶" };
        println!("{marker} {}", render_header(entry));
        if board.is_expanded(index) {
            for line in render_entry(entry, max_depth).into_iter().skip(1) {
                println!("{line}");
            }
        }
    }
    if board.is_empty() {
        println!("No endpoint flows available");
    }
    Ok(())
}

async fn artifacts_fetch(gateway: HttpGateway, repo_name: &str, diagram: DiagramKind) -> Result<(), String> {
    let set = ArtifactSet::load(&gateway, repo_name, diagram).await;
    let rendered = serde_json::to_string_pretty(&set).map_err(|error| error.to_string())?;
    println!("{rendered}");
    if let Ok(schema) = &set.schema {
        info!(tables = schema.tables.len(), "schema relations:\n{}", schema.relations_graph());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let gateway = build_gateway(&cli).context("invalid gateway configuration")?;

    let succeeded = match &cli.command {
        Command::Analyze {
            repo_url,
            artifacts,
            diagram,
        } => analyze_start(gateway, repo_url, *artifacts, *diagram)
            .await
            .map_err(anyhow::Error::msg)?,
        Command::Flows {
            repo_name,
            expand_all,
            max_depth,
        } => {
            flows_show(gateway, repo_name, *expand_all, *max_depth)
                .await
                .map_err(anyhow::Error::msg)?;
            true
        }
        Command::Artifacts { repo_name, diagram } => {
            artifacts_fetch(gateway, repo_name, *diagram)
                .await
                .map_err(anyhow::Error::msg)?;
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
