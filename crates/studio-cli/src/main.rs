use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_chat::library::WorkflowLibrary;
use studio_chat::preview::preview_url;
use studio_chat::store::{SharedState, StudioState};
use studio_chat::task_id::TaskIdStore;
use studio_client::api::StudioClient;
use studio_client::runner::StreamOutcome;
use studio_client::session::{StreamRun, WebCreatorSession, WorkflowSession};
use studio_core::config::StudioConfig;
use studio_core::error::{Result, StudioError};
use studio_core::message::ChatMode;
use studio_layout::flow::workflow_to_flow;

mod render;

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Build workflows and their websites from a chat prompt", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Backend API base URL
    #[arg(long, global = true, env = "STUDIO_API_URL")]
    api_url: Option<String>,

    /// Base URL deployed previews are served from
    #[arg(long, global = true, env = "STUDIO_PREVIEW_URL")]
    preview_url: Option<String>,

    /// Seconds a stream may stay silent before it is dropped
    #[arg(long, global = true)]
    idle_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a workflow and let the backend build it
    Workflow {
        /// What the workflow should do
        prompt: String,
    },

    /// Build or refine the website of a workflow
    Web {
        /// Workflow ID
        workflow_id: String,

        /// What to build or change
        prompt: String,

        /// Print the stored conversation before sending
        #[arg(long)]
        history: bool,
    },

    /// Reattach to an execution that is still running
    Resume {
        /// Workflow ID
        workflow_id: String,

        /// Execution ID returned when the turn was submitted
        execution_id: String,

        /// Follow a web-creator execution instead of a workflow build
        #[arg(long)]
        web: bool,
    },

    /// Print the laid-out agent graph of a workflow
    Graph {
        /// Workflow ID
        id: String,

        /// Output the positioned graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// List workflows, most recently updated first
    List {
        /// Page size
        #[arg(short, long, default_value = "20")]
        size: u32,
    },

    /// Delete a workflow
    Delete {
        /// Workflow ID
        id: String,
    },

    /// Rename a workflow
    Rename {
        /// Workflow ID
        id: String,

        /// New name
        name: String,
    },

    /// List available models
    Models,

    /// List available agent tools
    Tools,
}

fn load_config(args: &Args) -> Result<StudioConfig> {
    let mut config = StudioConfig::from_env()?;
    if let Some(url) = &args.api_url {
        config = config.with_api_url(url.as_str());
    }
    if let Some(url) = &args.preview_url {
        config = config.with_preview_url(url.as_str());
    }
    if let Some(secs) = args.idle_timeout {
        if secs == 0 {
            return Err(StudioError::Config("--idle-timeout must be positive".into()));
        }
        config = config.with_idle_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio=info".into()),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "command failed");
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let client = StudioClient::new(config.clone());
    let state = StudioState::shared();

    match args.command {
        Commands::Workflow { prompt } => {
            let session = WorkflowSession::new(client, state.clone(), TaskIdStore::workflow());
            let aborter = session.clone();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    aborter.abort().await;
                }
            });
            let run = session.send_message(&prompt).await;
            ctrl_c.abort();
            let run = run?;
            print_transcript(&state, ChatMode::Workflow).await;
            report(&run);
            if run.outcome.is_success() {
                println!("workflow: {}", run.graph_id);
            }
        }
        Commands::Web {
            workflow_id,
            prompt,
            history,
        } => {
            let session =
                WebCreatorSession::new(client, state.clone(), TaskIdStore::web_creator());
            if history {
                session.load_history(&workflow_id).await?;
            }
            let aborter = session.clone();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    aborter.abort().await;
                }
            });
            let run = session.send_message(&workflow_id, &prompt).await;
            ctrl_c.abort();
            let run = run?;
            print_transcript(&state, ChatMode::WebCreator).await;
            report(&run);
            let preview = state.read().await.preview.url.clone();
            if !preview.is_empty() {
                println!("preview: {preview}");
            } else if run.outcome.is_success() {
                println!("preview: {}", preview_url(&config.preview_url, &workflow_id));
            }
        }
        Commands::Resume {
            workflow_id,
            execution_id,
            web,
        } => {
            let (mode, tasks) = if web {
                (ChatMode::WebCreator, TaskIdStore::web_creator())
            } else {
                (ChatMode::Workflow, TaskIdStore::workflow())
            };
            tasks.set(&workflow_id, execution_id).await;
            let run = match mode {
                ChatMode::WebCreator => {
                    WebCreatorSession::new(client, state.clone(), tasks)
                        .resume(&workflow_id)
                        .await?
                }
                ChatMode::Workflow => {
                    WorkflowSession::new(client, state.clone(), tasks)
                        .resume(&workflow_id)
                        .await?
                }
            };
            match run {
                Some(run) => {
                    print_transcript(&state, mode).await;
                    report(&run);
                }
                None => println!("execution is no longer running"),
            }
        }
        Commands::Graph { id, json } => {
            let detail = client.workflow(&id).await?;
            let flow = workflow_to_flow(&detail.current_spec);
            if json {
                println!("{}", serde_json::to_string_pretty(&flow)?);
            } else {
                print!("{}", render::graph(&detail, &flow));
            }
        }
        Commands::List { size } => {
            let mut library = WorkflowLibrary::new();
            library.refresh(&client, size).await?;
            for workflow in library.items() {
                println!(
                    "{}  {}  {}",
                    workflow.id,
                    workflow.updated_at.format("%Y-%m-%d %H:%M"),
                    workflow.name
                );
            }
        }
        Commands::Delete { id } => {
            client.delete(&id).await?;
            println!("deleted {id}");
        }
        Commands::Rename { id, name } => {
            client.rename(&id, &name).await?;
            println!("renamed {id} to {name}");
        }
        Commands::Models => {
            for model in client.models().await? {
                println!("{}  {}", model.id, model.name);
            }
        }
        Commands::Tools => {
            for tool in client.tools().await? {
                println!("{}  {}", tool.name, tool.description);
            }
        }
    }
    Ok(())
}

async fn print_transcript(state: &SharedState, mode: ChatMode) {
    let mut state = state.write().await;
    print!("{}", render::transcript(state.chat(mode).transcript()));
    while let Some(notice) = state.take_notice() {
        eprintln!("{notice}");
    }
}

fn report(run: &StreamRun) {
    match &run.outcome {
        StreamOutcome::Completed => {}
        StreamOutcome::Failed { reason } => println!("failed: {reason}"),
        StreamOutcome::Aborted => println!("stopped"),
        StreamOutcome::Disconnected { error } => println!("connection lost: {error}"),
        StreamOutcome::Ended => println!("stream closed before the turn finished"),
    }
}
