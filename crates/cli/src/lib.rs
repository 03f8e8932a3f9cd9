pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ticketry",
    about = "Ticketry operator CLI",
    long_about = "Operate Ticketry migrations, config inspection, and readiness checks.",
    after_help = "Examples:\n  ticketry migrate\n  ticketry config\n  ticketry doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply any pending database migrations")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, store connectivity, and transcript directory readiness")]
    Doctor {
        #[arg(long, help = "Emit the raw report as machine-readable JSON")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let result = match Cli::parse().command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
