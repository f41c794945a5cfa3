use crate::jobs::{run_export, run_notify, run_overview, ExportArgs, NotifyArgs, OverviewArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use kpi_tracker::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "KPI Tracker",
    about = "Score, rank and report monthly employee KPIs from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the top and bottom of every template's ranking for a month
    Overview(OverviewArgs),
    /// Send (or dry-run) the monthly WhatsApp performance messages
    Notify(NotifyArgs),
    /// Write a department report as PDF or HTML, or a cohort ranking as CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Overview(args) => run_overview(args),
        Command::Notify(args) => run_notify(args).await,
        Command::Export(args) => run_export(args),
    }
}
