//! trust - Workspace trust from the command line
//!
//! "Opening a folder is not the same as trusting its authors."

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use trust::{
    config::{is_workspace_trust_enabled, TrustConfig},
    evaluator::Reason,
    request::{DialogPrompt, DialogResult, DialogService, UriTrustResponse, WorkspaceTrustRequests},
    ExtPath, StaticWorkspace, TrustContext, TrustEnvironment, Workspace, WorkspaceTrustManager,
};
use trust_core::{paths::workspace_id, JsonFileStorage, Paths};

/// trust - Workspace trust from the command line
#[derive(Parser)]
#[command(name = "trust")]
#[command(version = "1.0.0")]
#[command(about = "Decide whether code in an opened folder may run")]
#[command(long_about = "Decide whether code in an opened folder may run.\n\n\
    Trust is granted per folder and inherited by everything below it.\n\
    A workspace with several folders is trusted only when all of them are.\n\
    Untrusted workspaces run in Restricted Mode.")]
pub struct Cli {
    /// Workspace folder (repeat for a multi-root workspace)
    #[arg(long = "folder", global = true)]
    folders: Vec<PathBuf>,

    /// Workspace file listing the folders
    #[arg(long, global = true)]
    workspace_file: Option<PathBuf>,

    /// Keep data and settings under this directory instead of the home directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Running extension tests from this location (always trusted)
    #[arg(long, global = true, hide = true)]
    extension_tests_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show trust of the workspace
    #[command(about = "Show trust status of the workspace")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List trusted folders
    #[command(about = "List trusted folders")]
    List,

    /// Show which trusted folder covers a path
    #[command(about = "Check whether a path is trusted")]
    Check {
        path: PathBuf,
    },

    /// Trust folders and everything below them
    #[command(about = "Trust folders")]
    Trust {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Remove folders from the trusted list
    #[command(about = "Stop trusting folders")]
    Untrust {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Replace the trusted list
    #[command(about = "Replace the trusted folder list")]
    Set {
        paths: Vec<PathBuf>,
    },

    /// Trust or untrust the parent of the single open folder
    #[command(about = "Trust the parent folder of the open folder")]
    Parent {
        /// Untrust instead
        #[arg(long)]
        remove: bool,
    },

    /// Ask whether to trust the workspace, as the editor would
    #[command(about = "Request trust for the workspace")]
    Request {
        /// Message shown with the request
        #[arg(long)]
        message: Option<String>,
    },

    /// Decide whether files may open in the trusted workspace
    #[command(about = "Check whether files may open in the workspace")]
    Open {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Forget the remembered decision for files outside the workspace
    #[command(about = "Forget the remembered decision for outside files")]
    ResetChoice,

    /// Turn workspace trust on
    #[command(about = "Enable workspace trust")]
    Enable,

    /// Turn workspace trust off (everything is trusted)
    #[command(about = "Disable workspace trust")]
    Disable,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = match &cli.root {
        Some(root) => Paths::with_root(root),
        None => Paths::new(),
    };

    match cli.command {
        Commands::Enable => return cmd_set_enabled(&paths, true),
        Commands::Disable => return cmd_set_enabled(&paths, false),
        _ => {}
    }

    let session = Session::open(&cli, paths)?;

    match cli.command {
        Commands::Status { json } => cmd_status(&session, json),
        Commands::List => cmd_list(&session),
        Commands::Check { path } => cmd_check(&session, &path),
        Commands::Trust { paths } => cmd_set_trust(&session, &paths, true).await,
        Commands::Untrust { paths } => cmd_set_trust(&session, &paths, false).await,
        Commands::Set { paths } => cmd_set_all(&session, &paths).await,
        Commands::Parent { remove } => cmd_parent(&session, !remove).await,
        Commands::Request { message } => cmd_request(&session, message).await,
        Commands::Open { paths } => cmd_open(&session, &paths).await,
        Commands::ResetChoice => cmd_reset_choice(&session),
        Commands::Enable | Commands::Disable => Ok(()),
    }
}

/// Everything a command needs, wired up for the workspace on the command line
struct Session {
    workspace: Workspace,
    config: TrustConfig,
    manager: Arc<WorkspaceTrustManager>,
    requests: WorkspaceTrustRequests,
}

impl Session {
    fn open(cli: &Cli, paths: Paths) -> Result<Self> {
        let folders = cli
            .folders
            .iter()
            .map(|folder| absolute(folder))
            .collect::<Result<Vec<_>>>()?;
        let configuration = cli.workspace_file.as_deref().map(absolute).transpose()?;

        let workspace = match configuration {
            Some(configuration) => Workspace::multi_root(configuration, folders),
            None if folders.len() > 1 => {
                anyhow::bail!("Several folders need a --workspace-file to form a workspace")
            }
            None => Workspace {
                folders,
                configuration: None,
            },
        };

        let mut locations = workspace.folders.clone();
        locations.extend(workspace.configuration.clone());

        let storage = Arc::new(
            JsonFileStorage::open(
                paths.global_storage(),
                paths.workspace_storage(&workspace_id(&locations)),
            )
            .context("Failed to open trust storage")?,
        );
        let config = TrustConfig::load_from(&paths.settings())?;

        let mut environment = TrustEnvironment::new(paths.untitled_workspaces_home());
        environment.extension_tests_location = cli.extension_tests_path.clone();

        let manager = Arc::new(WorkspaceTrustManager::new(TrustContext {
            config: Arc::new(config.clone()),
            environment,
            storage: storage.clone(),
            identity: Arc::new(ExtPath::for_platform()),
            workspace: Arc::new(StaticWorkspace::new(workspace.clone())),
        })?);
        let requests = WorkspaceTrustRequests::new(manager.clone(), Arc::new(TerminalDialog), storage);

        Ok(Self {
            workspace,
            config,
            manager,
            requests,
        })
    }
}

/// Asks questions on the terminal
struct TerminalDialog;

#[async_trait]
impl DialogService for TerminalDialog {
    async fn show(&self, prompt: DialogPrompt) -> anyhow::Result<DialogResult> {
        tokio::task::spawn_blocking(move || ask_on_terminal(&prompt)).await?
    }
}

fn ask_on_terminal(prompt: &DialogPrompt) -> Result<DialogResult> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    println!();
    println!("{}", prompt.message);
    for detail in &prompt.details {
        println!("  {}", detail);
    }
    println!();
    for (index, button) in prompt.buttons.iter().enumerate() {
        println!("  [{}] {}", index + 1, button);
    }
    print!("Choice: ");
    stdout.flush()?;

    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let choice = line
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .filter(|n| *n < prompt.buttons.len())
        .unwrap_or(prompt.cancel_id);

    let checkbox_checked = match &prompt.checkbox {
        Some(checkbox) if choice != prompt.cancel_id => {
            print!("{} [y/N]: ", checkbox.label);
            stdout.flush()?;
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            Some(matches!(line.trim(), "y" | "Y" | "yes"))
        }
        Some(checkbox) => Some(checkbox.checked),
        None => None,
    };

    Ok(DialogResult {
        choice,
        checkbox_checked,
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn absolute_all(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|path| absolute(path)).collect()
}

#[derive(Serialize)]
struct StatusReport {
    enabled: bool,
    trusted: bool,
    reason: String,
    folders: Vec<PathBuf>,
    workspace_file: Option<PathBuf>,
    can_change_trust: bool,
    accepts_out_of_workspace_files: bool,
}

fn describe(reason: &Reason) -> String {
    match reason {
        Reason::FeatureDisabled => "workspace trust is disabled".to_string(),
        Reason::ExtensionTests => "running extension tests".to_string(),
        Reason::EmptyWindow => "no folder open, using the window's own setting".to_string(),
        Reason::AllLocationsTrusted => "every workspace location is trusted".to_string(),
        Reason::UntrustedLocation(path) => format!("{} is not trusted", path.display()),
    }
}

fn cmd_status(session: &Session, json_output: bool) -> Result<()> {
    let evaluation = session.manager.evaluate();
    let report = StatusReport {
        enabled: is_workspace_trust_enabled(&session.config),
        trusted: session.manager.is_workspace_trusted(),
        reason: describe(&evaluation.reason),
        folders: session.workspace.folders.clone(),
        workspace_file: session.workspace.configuration.clone(),
        can_change_trust: session.manager.can_set_workspace_trust(),
        accepts_out_of_workspace_files: session.manager.accepts_out_of_workspace_files(),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Workspace Trust");
    println!("{}", "=".repeat(50));
    println!();
    if report.folders.is_empty() {
        println!("Workspace: (empty window)");
    }
    for folder in &report.folders {
        println!("Folder: {}", folder.display());
    }
    if let Some(file) = &report.workspace_file {
        println!("Workspace file: {}", file.display());
    }
    println!();
    println!(
        "Trust: {}",
        if report.trusted { "trusted" } else { "restricted mode" }
    );
    println!("  Reason: {}", report.reason);
    println!("  Feature enabled: {}", report.enabled);
    println!("  Can change trust here: {}", report.can_change_trust);
    if report.accepts_out_of_workspace_files {
        println!("  Files from outside the workspace open without asking");
    }

    Ok(())
}

fn cmd_list(session: &Session) -> Result<()> {
    let folders = session.manager.get_trusted_folders();
    if folders.is_empty() {
        println!("No trusted folders");
        return Ok(());
    }

    println!("TRUSTED FOLDERS");
    println!("{}", "-".repeat(50));
    for folder in folders {
        println!("{}", folder.display());
    }
    Ok(())
}

fn cmd_check(session: &Session, path: &Path) -> Result<()> {
    let path = absolute(path)?;
    let info = session.manager.get_uri_trust_info(&path);

    if info.trusted {
        println!("TRUSTED: {}", path.display());
        println!("  Covered by: {}", info.uri.display());
        Ok(())
    } else {
        println!("UNTRUSTED: {}", path.display());
        std::process::exit(1);
    }
}

async fn cmd_set_trust(session: &Session, paths: &[PathBuf], trusted: bool) -> Result<()> {
    let paths = absolute_all(paths)?;
    session.manager.set_uris_trust(&paths, trusted).await?;

    let verb = if trusted { "Trusted" } else { "Untrusted" };
    for path in &paths {
        println!("{}: {}", verb, path.display());
    }
    Ok(())
}

async fn cmd_set_all(session: &Session, paths: &[PathBuf]) -> Result<()> {
    let paths = absolute_all(paths)?;
    session.manager.set_trusted_folders(&paths).await?;
    println!(
        "Trusted folder list replaced ({} entries)",
        session.manager.get_trusted_folders().len()
    );
    Ok(())
}

async fn cmd_parent(session: &Session, trusted: bool) -> Result<()> {
    if !session.manager.can_set_parent_folder_trust() {
        anyhow::bail!("Parent folder trust needs exactly one --folder and no --workspace-file");
    }

    session.manager.set_parent_folder_trust(trusted).await?;
    println!(
        "Workspace is now {}",
        if session.manager.is_workspace_trusted() {
            "trusted"
        } else {
            "in restricted mode"
        }
    );
    Ok(())
}

async fn cmd_request(session: &Session, message: Option<String>) -> Result<()> {
    let requests = &session.requests;
    let mut initiated = requests.subscribe_trust_requests();

    let options = message.map(|message| trust::TrustRequestOptions {
        message: Some(message),
        buttons: Vec::new(),
    });
    let request = requests.begin_request(options);

    if let Ok(options) = initiated.try_recv() {
        let message = options
            .and_then(|o| o.message)
            .unwrap_or_else(|| "Do you trust the authors of the files in this workspace?".to_string());
        print!("{} [y/N/c]: ", message);
        std::io::stdout().flush()?;

        let answer = tokio::task::spawn_blocking(|| -> Result<String> {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim().to_lowercase())
        })
        .await??;

        match answer.as_str() {
            "y" | "yes" => requests.complete_request(Some(true)).await?,
            "c" | "cancel" => requests.cancel_request(),
            _ => requests.complete_request(Some(false)).await?,
        }
    }

    match request.outcome().await {
        Some(true) => println!("Workspace trusted"),
        Some(false) => println!("Workspace stays in restricted mode"),
        None => println!("No decision made"),
    }
    Ok(())
}

async fn cmd_open(session: &Session, paths: &[PathBuf]) -> Result<()> {
    let paths = absolute_all(paths)?;
    let response = session.requests.request_open_uris(&paths).await?;

    match response {
        UriTrustResponse::Open => println!("OPEN"),
        UriTrustResponse::OpenInNewWindow => println!("OPEN IN NEW RESTRICTED WINDOW"),
        UriTrustResponse::Cancel => {
            println!("CANCEL");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_reset_choice(session: &Session) -> Result<()> {
    session.requests.forget_open_uris_choice()?;
    println!("Forgot the remembered decision for files outside the workspace");
    Ok(())
}

fn cmd_set_enabled(paths: &Paths, enabled: bool) -> Result<()> {
    let settings = paths.settings();
    let mut config = TrustConfig::load_from(&settings)?;
    config.set_trust_enabled(Some(enabled));
    config.save_to(&settings)?;

    println!(
        "Workspace trust {} ({})",
        if enabled { "enabled" } else { "disabled" },
        settings.display()
    );
    Ok(())
}
