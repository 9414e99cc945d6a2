//! jira-reports - sprint, resolution and worklog reports from JIRA.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;

use jira_reports::api;
use jira_reports::cli::{Cli, Command};
use jira_reports::config::{self, Config};
use jira_reports::error::AppError;
use jira_reports::logging;
use jira_reports::reports::{ReportBuilder, ReportRow, ReportTable};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let result = run(cli).await;
    match result {
        Ok(()) => {
            tracing::info!("jira-reports finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            match e.downcast_ref::<AppError>() {
                Some(app_err) => {
                    eprintln!("Error: {}", app_err.user_message());
                    if let Some(action) = app_err.suggested_action() {
                        eprintln!("{}", action);
                    }
                }
                None => eprintln!("Error: {:#}", e),
            }
            if let Some(dir) = logging::log_directory() {
                eprintln!("Logs: {}", dir.display());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path().map_err(AppError::from)?,
    };

    if cli.command == Command::StorePassword {
        return store_password(&config_path);
    }

    let config = Config::load(&config_path).map_err(AppError::from)?;
    let output = cli.command.output().cloned();
    let mut builder = ReportBuilder::new(&config)?;

    match cli.command {
        Command::SprintTasks(_) => emit(&builder.sprint_tasks().await?, output.as_deref()),
        Command::SprintSubtasks(_) => emit(&builder.sprint_subtasks().await?, output.as_deref()),
        Command::ResolutionTasks(_) => {
            emit(&builder.resolution_tasks().await?, output.as_deref())
        }
        Command::Worklogs { project_key, .. } => {
            emit(&builder.worklogs(project_key).await?, output.as_deref())
        }
        Command::StorePassword => Ok(()),
    }
}

/// Write the rows as JSON to the output file or stdout, and the summary to stderr.
fn emit<R: ReportRow + Serialize>(table: &ReportTable<R>, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            table
                .write_json(&mut writer)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            table.write_json(&mut writer).context("Failed to write report")?;
            writeln!(writer)?;
        }
    }

    eprintln!("{}", table.summary());
    Ok(())
}

fn store_password(config_path: &Path) -> anyhow::Result<()> {
    let username = config::configured_username(config_path).map_err(AppError::from)?;

    eprint!("Password for {}: ", username);
    io::stderr().flush()?;

    let mut password = String::new();
    io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("No password given");
    }

    api::store_password(&username, password).map_err(AppError::from)?;
    eprintln!("Password stored in the keyring for {}", username);
    Ok(())
}
