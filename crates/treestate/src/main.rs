mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use config::ProjectConfig;
use treestate_git::{
    EngineSettings, FileChanges, GitService, GitServiceRegistry, PullStrategy, PushOutcome,
    WorkingTreeStatus,
};
use treestate_logging::{init_tracing, LogFormat};

#[derive(Parser, Debug)]
#[command(
    name = "treestate",
    about = "Bounded working-tree status and smart sync for git repositories",
    version,
    author
)]
struct Cli {
    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Override the entry cap for status and change lists
    #[arg(long, global = true)]
    max_entries: Option<usize>,

    /// Override the status collection timeout
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bucketed working-tree status
    Status,
    /// Flat list of changed files
    Changes,
    /// Pull: fast-forward, else rebase (aborted on conflict)
    Pull {
        #[arg(long)]
        remote: Option<String>,
        /// Pull this branch with a plain `git pull`
        #[arg(long)]
        branch: Option<String>,
    },
    /// Push, reconciling once with a pull if rejected
    Push {
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        /// Set the upstream of the pushed branch
        #[arg(short = 'u', long)]
        set_upstream: bool,
    },
    /// Diff one file
    Diff {
        path: String,
        /// Diff the index instead of the working tree
        #[arg(long)]
        staged: bool,
    },
    /// Discard working-tree changes to one file
    Discard { path: String },
    /// Stage paths
    Stage {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Unstage paths
    Unstage {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_tracing(&cli.log_level, cli.log_format.into(), cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let settings = load_settings(&cli, &working_dir)?;
    let registry = GitServiceRegistry::new(settings);
    let service = registry
        .get_or_open(&working_dir)
        .with_context(|| format!("Failed to open repository at {}", working_dir.display()))?;
    debug!(root = %service.root().display(), "Using repository");

    run(&cli, &service).await
}

fn load_settings(cli: &Cli, working_dir: &std::path::Path) -> Result<EngineSettings> {
    let mut settings = ProjectConfig::load(working_dir)?
        .map(ProjectConfig::into_settings)
        .unwrap_or_default();

    if let Some(max) = cli.max_entries {
        settings.limits.max_status_entries = max;
        settings.limits.max_change_entries = max;
    }
    if let Some(timeout) = cli.timeout_ms {
        settings.limits.status_timeout_ms = timeout;
    }
    Ok(settings)
}

async fn run(cli: &Cli, service: &GitService) -> Result<()> {
    match &cli.command {
        Command::Status => {
            let status = service.status().await?;
            emit(cli.json, &status, print_status)
        }
        Command::Changes => {
            let changes = service.file_changes().await?;
            emit(cli.json, &changes, print_changes)
        }
        Command::Pull { remote, branch } => {
            let strategy = service.pull(remote.as_deref(), branch.as_deref()).await?;
            emit(cli.json, &json!({ "strategy": strategy }), |_| {
                print_pull(strategy)
            })
        }
        Command::Push {
            remote,
            branch,
            set_upstream,
        } => {
            let outcome = service
                .push(remote.as_deref(), branch.as_deref(), *set_upstream)
                .await?;
            emit(cli.json, &json!({ "outcome": outcome }), |_| {
                print_push(outcome)
            })
        }
        Command::Diff { path, staged } => {
            let diff = service.diff_file(path, *staged).await?;
            emit(cli.json, &json!({ "path": path, "diff": diff }), |_| {
                print!("{}", diff)
            })
        }
        Command::Discard { path } => {
            service.discard_file(path).await?;
            emit(cli.json, &json!({ "discarded": path }), |_| {
                println!("{} {}", "Discarded".yellow(), path)
            })
        }
        Command::Stage { paths } => {
            service.stage(paths).await?;
            emit(cli.json, &json!({ "staged": paths }), |_| {
                println!("{} {} path(s)", "Staged".green(), paths.len())
            })
        }
        Command::Unstage { paths } => {
            service.unstage(paths).await?;
            emit(cli.json, &json!({ "unstaged": paths }), |_| {
                println!("{} {} path(s)", "Unstaged".yellow(), paths.len())
            })
        }
    }
}

/// Print `value` as JSON, or through `human` otherwise
fn emit<T: Serialize>(as_json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_status(status: &WorkingTreeStatus) {
    let branch = &status.branch;
    match &branch.current {
        Some(name) => print!("On branch {}", name.bold()),
        None => print!("{}", "HEAD detached".bold()),
    }
    if let Some(tracking) = &branch.tracking {
        print!(
            " ({}, ahead {}, behind {})",
            tracking.cyan(),
            branch.ahead,
            branch.behind
        );
    }
    println!();

    if status.is_clean() {
        println!("{}", "Nothing to commit, working tree clean".dimmed());
        return;
    }

    if !status.staged.is_empty() {
        println!("\n{}", "Staged:".green().bold());
        for (path, kind) in &status.staged {
            println!("  {:<10} {}", kind.to_string().green(), path);
        }
    }
    print_bucket("Modified:", &status.modified, "modified");
    print_bucket("Deleted:", &status.deleted, "deleted");
    print_bucket("Untracked:", &status.untracked, "untracked");
    print_bucket("Conflicted:", &status.conflicted, "conflicted");

    if status.truncated {
        eprintln!(
            "{} {}",
            "⚠".bright_yellow(),
            truncation_notice(status.truncated_limit, status.total_entries())
        );
    }
}

fn print_bucket<'a>(title: &str, paths: impl IntoIterator<Item = &'a String>, label: &str) {
    let mut paths = paths.into_iter().peekable();
    if paths.peek().is_none() {
        return;
    }
    let styled_title = match label {
        "conflicted" => title.red().bold(),
        "untracked" => title.dimmed().bold(),
        _ => title.yellow().bold(),
    };
    println!("\n{}", styled_title);
    for path in paths {
        println!("  {:<10} {}", label.red(), path);
    }
}

fn print_changes(changes: &FileChanges) {
    if changes.changes.is_empty() {
        println!("{}", "No changes".dimmed());
    }
    for change in &changes.changes {
        let marker = if change.staged {
            "staged".green()
        } else {
            "unstaged".yellow()
        };
        match &change.original_path {
            Some(original) => println!(
                "  {:<10} {:<10} {} -> {}",
                marker,
                change.status.to_string(),
                original.dimmed(),
                change.path
            ),
            None => println!("  {:<10} {:<10} {}", marker, change.status.to_string(), change.path),
        }
    }
    if let Some(skipped) = &changes.skipped_dirs {
        println!(
            "{} {}",
            "Hidden directories:".dimmed(),
            skipped.join(", ").dimmed()
        );
    }
    if changes.truncated {
        eprintln!(
            "{} {}",
            "⚠".bright_yellow(),
            truncation_notice(changes.truncated_limit, changes.changes.len())
        );
    }
}

/// Partial results either hit the cap or were stopped by the timeout short of it
fn truncation_notice(limit: Option<usize>, shown: usize) -> String {
    match limit {
        Some(limit) if shown >= limit => format!("showing the first {} entries", limit),
        _ => format!("result is incomplete, git was stopped after {} entries", shown),
    }
}

fn print_pull(strategy: PullStrategy) {
    let how = match strategy {
        PullStrategy::Explicit => "pulled branch",
        PullStrategy::FastForward => "fast-forwarded",
        PullStrategy::Rebase => "rebased onto remote",
    };
    println!("{} {}", "✓".bright_green(), how);
}

fn print_push(outcome: PushOutcome) {
    let how = match outcome {
        PushOutcome::Pushed => "pushed",
        PushOutcome::PushedAfterReconcile => "pushed after reconciling with remote",
    };
    println!("{} {}", "✓".bright_green(), how);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "treestate",
            "status",
            "--json",
            "-d",
            "/tmp/repo",
            "--max-entries",
            "50",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.working_dir, Some(PathBuf::from("/tmp/repo")));
        assert_eq!(cli.max_entries, Some(50));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn push_flags() {
        let cli =
            Cli::try_parse_from(["treestate", "push", "-u", "--remote", "upstream"]).unwrap();
        match cli.command {
            Command::Push {
                remote,
                branch,
                set_upstream,
            } => {
                assert_eq!(remote.as_deref(), Some("upstream"));
                assert_eq!(branch, None);
                assert!(set_upstream);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn stage_requires_paths() {
        assert!(Cli::try_parse_from(["treestate", "stage"]).is_err());
    }

    #[test]
    fn truncation_notice_names_the_cause() {
        assert_eq!(truncation_notice(Some(5), 5), "showing the first 5 entries");
        assert_eq!(
            truncation_notice(Some(5000), 12),
            "result is incomplete, git was stopped after 12 entries"
        );
    }

    #[test]
    fn cli_overrides_apply_on_top_of_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(config::CONFIG_FILE_NAME),
            "[limits]\nmax_status_entries = 10\nstatus_timeout_ms = 100\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from(["treestate", "changes", "--max-entries", "3"]).unwrap();

        let settings = load_settings(&cli, dir.path()).unwrap();
        assert_eq!(settings.limits.max_status_entries, 3);
        assert_eq!(settings.limits.max_change_entries, 3);
        assert_eq!(settings.limits.status_timeout_ms, 100);
    }
}
