//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::reports::ReportKind;

#[derive(Debug, Parser)]
#[command(name = "jira-reports", version, about = "Sprint, resolution and worklog reports from JIRA")]
pub struct Cli {
    /// Config file (defaults to $JIRA_REPORTS_CONFIG or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also print log records to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where a report's rows go.
#[derive(Debug, Clone, Default, PartialEq, Eq, clap::Args)]
pub struct OutputArgs {
    /// Write the rows as JSON to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Tasks of the configured sprints
    SprintTasks(OutputArgs),
    /// Subtasks of the configured sprints
    SprintSubtasks(OutputArgs),
    /// Tasks resolved within the configured date range
    ResolutionTasks(OutputArgs),
    /// Tempo worklogs of the configured users
    Worklogs {
        /// Only worklogs of this project
        #[arg(long)]
        project_key: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Read a password from stdin and store it in the OS keyring
    StorePassword,
}

impl Command {
    /// The report this command runs, if any.
    pub fn report(&self) -> Option<ReportKind> {
        match self {
            Command::SprintTasks(_) => Some(ReportKind::SprintTasks),
            Command::SprintSubtasks(_) => Some(ReportKind::SprintSubtasks),
            Command::ResolutionTasks(_) => Some(ReportKind::ResolutionTasks),
            Command::Worklogs { .. } => Some(ReportKind::Worklogs),
            Command::StorePassword => None,
        }
    }

    /// Output file of a report command.
    pub fn output(&self) -> Option<&PathBuf> {
        match self {
            Command::SprintTasks(args)
            | Command::SprintSubtasks(args)
            | Command::ResolutionTasks(args)
            | Command::Worklogs { output: args, .. } => args.output.as_ref(),
            Command::StorePassword => None,
        }
    }
}
