pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::notes::NotesArgs;

#[derive(Debug, Parser)]
#[command(
    name = "noteit",
    about = "note-it operator CLI",
    long_about = "Operate the note-it store: apply migrations, inspect configuration, and list notes.",
    after_help = "Examples:\n  noteit migrate\n  noteit config\n  noteit notes --author alice --sort=-date --limit 10"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "List stored notes matching the given filters")]
    Notes(NotesArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Notes(args) => commands::notes::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
