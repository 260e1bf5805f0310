use std::process::ExitCode;

use clap::Parser;
use flow::{
    cli::{Cli, CliProcess, ConfigProcess, ContextProcess, JiraProcess},
    config::ConfigStore,
    errors::{AppError, Result},
    logging,
    process::{AppContext, Process, ProcessOutput},
};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = color_eyre::install() {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            if let Some(stdout) = output.stdout {
                println!("{stdout}");
            }
            if let Some(stderr) = output.stderr {
                eprintln!("{stderr}");
            }
            if output.success { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Err(AppError::UserFacing(err)) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
        Err(AppError::Unexpected(report)) => {
            tracing::error!("{report:?}");
            eprintln!("Error: {report:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ProcessOutput> {
    let store = ConfigStore::new(cli.config)?;
    let config = store.load()?;

    let (logs_path, filter) = logging::resolve_path_and_filter(&config)?;
    logging::init(logs_path, filter)?;

    let ctx = AppContext { config, store };
    match cli.process {
        CliProcess::Generate(p) => p.execute(&ctx).await,
        CliProcess::Review(p) => p.execute(&ctx).await,
        CliProcess::Scaffold(p) => p.execute(&ctx).await,
        CliProcess::Context(sub) => match sub {
            ContextProcess::Show(p) => p.execute(&ctx).await,
            ContextProcess::Preview(p) => p.execute(&ctx).await,
            ContextProcess::Ignore(p) => p.execute(&ctx).await,
        },
        CliProcess::Jira(sub) => match sub {
            JiraProcess::View(p) => p.execute(&ctx).await,
            JiraProcess::Mine(p) => p.execute(&ctx).await,
            JiraProcess::List(p) => p.execute(&ctx).await,
            JiraProcess::Create(p) => p.execute(&ctx).await,
            JiraProcess::Comment(p) => p.execute(&ctx).await,
            JiraProcess::Transition(p) => p.execute(&ctx).await,
            JiraProcess::Projects(p) => p.execute(&ctx).await,
            JiraProcess::Work(p) => p.execute(&ctx).await,
        },
        CliProcess::Config(sub) => match sub {
            ConfigProcess::Init(p) => p.execute(&ctx).await,
            ConfigProcess::Set(p) => p.execute(&ctx).await,
            ConfigProcess::Show(p) => p.execute(&ctx).await,
            ConfigProcess::Path(p) => p.execute(&ctx).await,
        },
    }
}
