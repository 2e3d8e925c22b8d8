//! CLI interface for Sparkle.
//!
//! Each subcommand is non-interactive: arguments in, human-readable output
//! out (or JSON with `--json`). Commands split into two groups:
//!
//! - `sparkle project|config|health` work without a loaded project.
//! - everything else operates on the active project's production tree.
//!
//! Node paths are `/`-separated below the production folder, e.g.
//! `Chara/Hero/Modeling/Low/hero.blend`.

mod format;

use std::{
    path::PathBuf,
    sync::{Arc, mpsc},
};

use clap::{Parser, Subcommand};
use serde_json::json;

use sparkle::{
    config::{self, Config},
    engine::ChildStatus,
    model::{Coordinate, Level, NodeStatus, ProjectTemplate},
    monitor::{HealthMonitor, Schedule},
    project,
    remote::{HttpTransport, RemoteClient},
    session::Session,
    sync::Action,
    worker::{Job, Outcome, Worker, WorkerHandle},
};

use format::{format_child, format_hierarchy, format_node, format_tick};

/// Sparkle: local and server sync for 3D production trees.
#[derive(Debug, Parser)]
#[command(name = "sparkle", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Server URL for this invocation. Overrides `SPARKLE_SERVER_URL` and the
    /// config file; pass an empty string to force local-only mode.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: publishing a new asset
  1. sparkle project use Demo
  2. sparkle create Chara/Hero/Modeling/Low
  3. sparkle status Chara/Hero
     → Modeling    local only
  4. sparkle publish Chara/Hero
  5. sparkle publish Chara/Hero/Modeling/Low/hero.blend

Inspect:
  sparkle tree --depth 2
  sparkle status Chara/Hero/Modeling/Low --json
  sparkle watch --ticks 4";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the status of a node and its children.
    ///
    /// Without a path, lists the asset type folders of the project.
    Status {
        /// Node path below the production folder.
        path: Option<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the project tree with per-node status.
    Tree {
        /// How many levels to descend (1 = asset types only).
        #[arg(long, default_value_t = 5)]
        depth: usize,

        /// Walk local disk only, without statuses or server requests.
        #[arg(long)]
        local: bool,
    },

    /// Push a node to the server: folders are created, files uploaded.
    Publish { path: String },

    /// Pull a node from the server: folders are created locally, files fetched.
    Download { path: String },

    /// Publish, then download.
    Sync { path: String },

    /// Create a folder-level node locally.
    Create { path: String },

    /// Delete a node and everything below it from local disk.
    Delete { path: String },

    /// Probe the server once.
    Health,

    /// Keep probing the server and refresh statuses while connected.
    Watch {
        /// Stop after this many probes (runs until interrupted if omitted).
        #[arg(long)]
        ticks: Option<usize>,
    },

    /// Manage projects: create, list, select, delete.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Show or change the configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// Create a project on the server (if reachable) and locally, and make it active.
    New { name: String },

    /// List local projects. The active one is marked with `*`.
    List,

    /// Make an existing local project the active one.
    Use { name: String },

    /// Delete a project from the server. Local files are kept.
    Delete { name: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration and the resolved server URL.
    Show,

    /// Set the server URL. An empty string means local-only.
    SetServer { url: String },

    /// Set the folder new projects are created in.
    SetProjectsFolder { path: PathBuf },
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli, mut config: Config) -> Result<(), String> {
    let server_url = config::resolve_server_url(cli.server.as_deref(), &config);

    match cli.command {
        Command::Status { path, json } => {
            let project = project_of(&config)?;
            let worker = open_worker(&config, &server_url)?;
            cmd_status(&worker.handle(), &project, path.as_deref().unwrap_or(""), json)
        }
        Command::Tree { depth, local } => {
            let session = open_session(&config, &server_url)?;
            if local {
                print!("{}", format_hierarchy(&session.engine().scanner().walk(), depth));
                return Ok(());
            }
            let project = session.project().to_string();
            let worker = Worker::spawn(session);
            cmd_tree(&worker.handle(), &project, depth)
        }
        Command::Publish { path } => cmd_apply(&config, &server_url, Action::Publish, &path),
        Command::Download { path } => cmd_apply(&config, &server_url, Action::Download, &path),
        Command::Sync { path } => cmd_apply(&config, &server_url, Action::Sync, &path),
        Command::Create { path } => cmd_apply(&config, &server_url, Action::Create, &path),
        Command::Delete { path } => cmd_apply(&config, &server_url, Action::Delete, &path),
        Command::Health => cmd_health(&server_url),
        Command::Watch { ticks } => cmd_watch(&config, &server_url, ticks),
        Command::Project { command } => match command {
            ProjectCommand::New { name } => cmd_project_new(&mut config, &server_url, &name),
            ProjectCommand::List => cmd_project_list(&config),
            ProjectCommand::Use { name } => cmd_project_use(&mut config, &name),
            ProjectCommand::Delete { name } => cmd_project_delete(&server_url, &name),
        },
        Command::Config { command } => match command {
            ConfigCommand::Show => cmd_config_show(&config, &server_url),
            ConfigCommand::SetServer { url } => {
                config.set_server_url(&url);
                save(&config)?;
                if config.server_url.is_empty() {
                    eprintln!("Server cleared, local-only mode");
                } else {
                    eprintln!("Server set to {}", config.server_url);
                }
                Ok(())
            }
            ConfigCommand::SetProjectsFolder { path } => {
                config.set_projects_folder(path);
                save(&config)?;
                eprintln!("Projects folder set to {}", config.projects_folder.display());
                Ok(())
            }
        },
    }
}

// ── Session plumbing ──

fn open_session(config: &Config, server_url: &str) -> Result<Session, String> {
    Session::open(config, server_url).map_err(|e| e.to_string())
}

fn open_worker(config: &Config, server_url: &str) -> Result<Worker, String> {
    open_session(config, server_url).map(Worker::spawn)
}

fn remote_client(server_url: &str) -> Result<RemoteClient, String> {
    let transport = HttpTransport::new().map_err(|e| e.to_string())?;
    let remote = RemoteClient::new(transport);
    if !server_url.is_empty() {
        remote.configure(server_url);
    }
    Ok(remote)
}

fn save(config: &Config) -> Result<(), String> {
    config
        .save()
        .map_err(|e| format!("failed to save config: {e}"))
}

fn parse_path(project: &str, path: &str) -> Result<Coordinate, String> {
    Coordinate::parse(project, path).map_err(|e| format!("invalid path '{path}': {e}"))
}

fn ask(handle: &WorkerHandle, job: Job) -> Result<Outcome, String> {
    handle
        .submit(job)
        .recv()
        .map_err(|_| "worker stopped unexpectedly".to_string())
}

fn ask_status(handle: &WorkerHandle, coordinate: &Coordinate) -> Result<NodeStatus, String> {
    match ask(handle, Job::Status(coordinate.clone()))? {
        Outcome::Status(status) => Ok(status),
        other => Err(format!("unexpected worker reply: {other:?}")),
    }
}

fn ask_children(
    handle: &WorkerHandle,
    parent: &Coordinate,
) -> Result<Vec<ChildStatus>, String> {
    match ask(handle, Job::Children(parent.clone()))? {
        Outcome::Children(children) => Ok(children),
        other => Err(format!("unexpected worker reply: {other:?}")),
    }
}

fn project_of(config: &Config) -> Result<String, String> {
    config
        .active_project_name()
        .ok_or_else(|| "no active project: run `sparkle project use <name>` first".to_string())
}

// ── Commands ──

fn cmd_status(handle: &WorkerHandle, project: &str, path: &str, json: bool) -> Result<(), String> {
    let coordinate = parse_path(project, path)?;
    let node = coordinate
        .level()
        .map(|_| ask_status(handle, &coordinate))
        .transpose()?;
    let children = ask_children(handle, &coordinate)?;

    if json {
        let value = json!({
            "coordinate": coordinate,
            "status": node,
            "children": children,
        });
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| format!("failed to serialize status: {e}"))?;
        println!("{text}");
        return Ok(());
    }

    if let (Some(status), Some(name)) = (&node, coordinate.name()) {
        println!("{}", format_node(name, status));
    }
    if children.is_empty() {
        if coordinate.child_level().is_some() {
            eprintln!("Nothing here locally or on the server");
        }
        return Ok(());
    }
    for child in &children {
        println!("{}", format_child(1, child));
    }
    Ok(())
}

fn cmd_tree(handle: &WorkerHandle, project: &str, depth: usize) -> Result<(), String> {
    let root = parse_path(project, "")?;
    print_subtree(handle, &root, 1, depth)
}

fn print_subtree(
    handle: &WorkerHandle,
    parent: &Coordinate,
    depth: usize,
    max_depth: usize,
) -> Result<(), String> {
    if depth > max_depth {
        return Ok(());
    }
    for child in ask_children(handle, parent)? {
        println!("{}", format_child(depth, &child));
        let Ok(coordinate) = parent.child(child.name.as_str()) else {
            continue;
        };
        if coordinate.level().is_some_and(Level::is_directory) {
            print_subtree(handle, &coordinate, depth + 1, max_depth)?;
        }
    }
    Ok(())
}

fn cmd_apply(config: &Config, server_url: &str, action: Action, path: &str) -> Result<(), String> {
    let project = project_of(config)?;
    let coordinate = parse_path(&project, path)?;
    let name = coordinate
        .name()
        .ok_or_else(|| format!("cannot {} the project root", action.verb()))?
        .to_string();
    let worker = open_worker(config, server_url)?;

    match ask(&worker.handle(), Job::Apply(action, coordinate))? {
        Outcome::Applied { result, status, .. } => match result {
            Ok(()) => {
                println!("{}", format_node(&name, &status));
                Ok(())
            }
            Err(e) => Err(format!(
                "failed to {} '{name}': {e}\n{}",
                action.verb(),
                format_node(&name, &status)
            )),
        },
        other => Err(format!("unexpected worker reply: {other:?}")),
    }
}

fn cmd_health(server_url: &str) -> Result<(), String> {
    if server_url.is_empty() {
        println!("No server configured, local-only mode");
        return Ok(());
    }
    let remote = remote_client(server_url)?;
    if remote.is_connected() {
        println!("Connected to {server_url}");
        Ok(())
    } else {
        Err(format!("server at {server_url} is unreachable"))
    }
}

fn cmd_watch(config: &Config, server_url: &str, ticks: Option<usize>) -> Result<(), String> {
    let session = open_session(config, server_url)?;
    let remote = Arc::clone(session.remote());
    let root = parse_path(session.project(), "")?;
    let worker = Worker::spawn(session);
    let handle = worker.handle();

    let (tick_tx, tick_rx) = mpsc::channel();
    let refresh = handle.clone();
    let monitor = HealthMonitor::start(remote, Schedule::from(config.monitor), move |connected| {
        if connected {
            refresh.post(Job::Refresh);
        }
        let _ = tick_tx.send(connected);
    });

    let mut seen = 0;
    while ticks.is_none_or(|limit| seen < limit) {
        let Ok(connected) = tick_rx.recv() else {
            break;
        };
        seen += 1;
        println!("{}", format_tick(jiff::Timestamp::now(), connected));
        if connected {
            for child in ask_children(&handle, &root)? {
                println!("{}", format_child(1, &child));
            }
        }
    }

    monitor.stop();
    worker.shutdown();
    Ok(())
}

fn cmd_project_new(config: &mut Config, server_url: &str, name: &str) -> Result<(), String> {
    let remote = remote_client(server_url)?;
    let path = project::create_project(
        &config.projects_folder,
        &remote,
        name,
        &ProjectTemplate::default(),
    )
    .map_err(|e| format!("failed to create project '{name}': {e}"))?;

    config.update_active_project(&path);
    save(config)?;

    let location = if remote.is_connected() {
        "locally and on the server"
    } else {
        "locally"
    };
    eprintln!("Project '{name}' created {location}");
    println!("{}", path.display());
    Ok(())
}

fn cmd_project_list(config: &Config) -> Result<(), String> {
    let names = project::list_projects(&config.projects_folder)
        .map_err(|e| format!("failed to list projects: {e}"))?;

    if names.is_empty() {
        println!("No projects in {}", config.projects_folder.display());
        return Ok(());
    }

    let active = config.active_project_name();
    for name in &names {
        let marker = if active.as_deref() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {name}");
    }
    Ok(())
}

fn cmd_project_use(config: &mut Config, name: &str) -> Result<(), String> {
    let path = project::locate_project(&config.projects_folder, name).map_err(|e| e.to_string())?;
    config.update_active_project(path);
    save(config)?;
    eprintln!("Loaded project '{name}'");
    Ok(())
}

fn cmd_project_delete(server_url: &str, name: &str) -> Result<(), String> {
    if server_url.is_empty() {
        return Err("no server configured: projects can only be deleted on the server".to_string());
    }
    let remote = remote_client(server_url)?;
    project::delete_project(&remote, name)
        .map_err(|e| format!("failed to delete project '{name}': {e}"))?;
    eprintln!("Project '{name}' deleted on the server");
    Ok(())
}

fn cmd_config_show(config: &Config, server_url: &str) -> Result<(), String> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| format!("failed to serialize config: {e}"))?;
    if let Some(path) = Config::path() {
        println!("# {}", path.display());
    }
    print!("{text}");
    let mode = if server_url.is_empty() {
        "local-only".to_string()
    } else {
        server_url.to_string()
    };
    println!("# resolved server: {mode}");
    Ok(())
}
