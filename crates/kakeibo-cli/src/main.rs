mod cli;
mod dispatch;
mod output;

use std::process::ExitCode;

use clap::{error::ErrorKind, Parser};
use kakeibo_core::ClientError;

fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                print!("{err}");
                return ExitCode::SUCCESS;
            }
            let wants_json = std::env::args().skip(1).any(|value| value == "--json");
            output::print_error(
                &ClientError::invalid_argument(&err.to_string()),
                wants_json,
            );
            return ExitCode::from(1);
        }
    };

    let wants_json = wants_json(&cli.command);
    match dispatch::dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            output::print_error(&error, wants_json);
            exit_code_for_error(&error)
        }
    }
}

fn wants_json(command: &cli::Commands) -> bool {
    use cli::{AccountCommand, CategoryCommand, Commands, ImportCommand, RuleCommand};
    match command {
        Commands::Import { command } => match command {
            ImportCommand::File { json, .. }
            | ImportCommand::List { json }
            | ImportCommand::Undo { json, .. } => *json,
        },
        Commands::Account { command } => match command {
            AccountCommand::List { json } | AccountCommand::Add { json, .. } => *json,
        },
        Commands::Category { command } => match command {
            CategoryCommand::List { json } | CategoryCommand::Add { json, .. } => *json,
        },
        Commands::Rule { command } => match command {
            RuleCommand::List { json } | RuleCommand::Add { json, .. } => *json,
        },
    }
}

fn exit_code_for_error(error: &ClientError) -> ExitCode {
    let internal = error.code.starts_with("internal_")
        || matches!(
            error.code.as_str(),
            "ledger_init_permission_denied"
                | "ledger_locked"
                | "ledger_corrupt"
                | "migration_failed"
                | "ledger_init_failed"
        );
    if internal {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}
