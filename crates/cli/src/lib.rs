pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "gigbook",
    about = "gigbook operator CLI",
    long_about = "Inspect configuration, apply migrations, and read engagement books and unread activity.",
    after_help = "Examples:\n  gigbook doctor --json\n  gigbook settle --project prj-1 --perspective owner-1\n  gigbook portfolio --perspective dancer-a --filter income"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, notification readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Settle one project's revenue and expense from a party's perspective")]
    Settle {
        #[arg(long, help = "Project id")]
        project: String,
        #[arg(long, help = "Party whose books are computed")]
        perspective: String,
    },
    #[command(about = "Settle every project a party takes part in and total the results")]
    Portfolio {
        #[arg(long, help = "Party whose books are computed")]
        perspective: String,
        #[arg(long, default_value = "all", help = "all | income | expense")]
        filter: String,
    },
    #[command(about = "Count unread negotiation activity across a party's inbox and outbox")]
    Unread {
        #[arg(long, help = "Party reading their proposals")]
        viewer: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Settle { project, perspective } => commands::settle::run(&project, &perspective),
        Command::Portfolio { perspective, filter } => {
            commands::portfolio::run(&perspective, &filter)
        }
        Command::Unread { viewer } => commands::unread::run(&viewer),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
