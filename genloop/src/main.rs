//! genloop: generate and refine a project through chat-driven workflows.
//!
//! A project directory holds the operator's `prompt`, an optional
//! `genloop.toml`, and the `memory/`, `workspace/` and `preprompts/` stores.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use genloop::catalog::{self, WorkflowId};
use genloop::core::errors::StepError;
use genloop::engine::{StepContext, run_workflow};
use genloop::exit_codes;
use genloop::io::config::load_config;
use genloop::io::console::StdConsole;
use genloop::io::files::{WriteReport, encode_files, to_files, to_selected_files};
use genloop::io::session::CommandSession;
use genloop::io::store::{ProjectPaths, Stores};
use genloop::logging;

#[derive(Parser)]
#[command(
    name = "genloop",
    version,
    about = "Generate and refine a project through chat-driven workflows"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a workflow against a project directory.
    Run {
        /// Project directory (holds `prompt` and `genloop.toml`).
        project: PathBuf,
        /// Workflow name; see `genloop workflows`.
        #[arg(short, long, default_value = "default")]
        workflow: WorkflowId,
    },
    /// List workflows and their steps.
    Workflows,
    /// Print workspace files as tagged code blocks, in the given order.
    Encode {
        project: PathBuf,
        /// Workspace-relative paths.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Decode tagged code blocks into the project's workspace.
    Decode {
        project: PathBuf,
        /// Read text from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Only write these workspace-relative paths; other blocks are ignored.
        #[arg(long)]
        only: Vec<PathBuf>,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<StepError>().is_some() {
        exit_codes::ABORTED
    } else {
        exit_codes::INVALID
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { project, workflow } => cmd_run(&project, workflow),
        Command::Workflows => cmd_workflows(),
        Command::Encode { project, paths } => cmd_encode(&project, &paths),
        Command::Decode {
            project,
            input,
            only,
        } => cmd_decode(&project, input.as_deref(), &only),
    }
}

fn cmd_run(project: &Path, workflow: WorkflowId) -> Result<()> {
    if !project.is_dir() {
        bail!("project directory {} does not exist", project.display());
    }
    let problems = catalog::validate();
    if !problems.is_empty() {
        bail!("workflow catalog is invalid:\n- {}", problems.join("\n- "));
    }

    let paths = ProjectPaths::new(project);
    let config = load_config(&paths.config_path)?;
    let stores = Stores::open(&paths);
    let session = CommandSession::new(&config.session);
    let console = StdConsole;
    let ctx = StepContext {
        session: &session,
        stores: &stores,
        console: &console,
        config: &config,
    };

    info!(project = %project.display(), workflow = %workflow, "run");
    run_workflow(workflow, &ctx)
}

fn cmd_workflows() -> Result<()> {
    for id in WorkflowId::ALL {
        let steps: Vec<&str> = id.steps().iter().map(|step| step.name).collect();
        println!("{}: {}", id, steps.join(", "));
    }
    Ok(())
}

fn cmd_encode(project: &Path, paths: &[PathBuf]) -> Result<()> {
    let stores = Stores::open(&ProjectPaths::new(project));
    let keys = path_keys(paths);
    let text = encode_files(&stores.workspace, &keys)?;
    print!("{text}");
    Ok(())
}

fn cmd_decode(project: &Path, input: Option<&Path>, only: &[PathBuf]) -> Result<()> {
    let text = match input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    let stores = Stores::open(&ProjectPaths::new(project));
    let report = if only.is_empty() {
        to_files(&text, &stores.workspace)?
    } else {
        to_selected_files(&text, &stores.workspace, &path_keys(only))?
    };
    print_report(&report);
    if report.is_partial() {
        bail!(
            "{} of {} file blocks could not be written",
            report.failed.len(),
            report.written.len() + report.failed.len()
        );
    }
    Ok(())
}

fn print_report(report: &WriteReport) {
    for path in &report.written {
        println!("wrote {path}");
    }
    for path in &report.skipped {
        println!("ignored {path}");
    }
    for (path, reason) in &report.failed {
        eprintln!("failed {path}: {reason}");
    }
}

fn path_keys(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect()
}
