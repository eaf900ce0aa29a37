use std::sync::mpsc;
use std::time::Duration;

use kakeibo_core::import::ai::HttpClassifier;
use kakeibo_core::import::{
    build_batch, classify_unresolved, commit_batch, resolve_unresolved_to_fallback, undo_import,
    AiProgress, CancelToken, ImportRequest, ManualColumnMap, SourceFormat,
};
use kakeibo_core::model::TransactionType;
use kakeibo_core::stores::{AccountStore, LedgerStore};
use kakeibo_core::{ClientError, ClientResult, SqliteLedger};

use crate::cli::{AccountCommand, CategoryCommand, Cli, Commands, ImportCommand, RuleCommand};
use crate::output;

const HISTORY_LIMIT: i64 = 50;

pub fn dispatch(cli: &Cli) -> ClientResult<()> {
    match &cli.command {
        Commands::Import { command } => dispatch_import(command),
        Commands::Account { command } => dispatch_account(command),
        Commands::Category { command } => dispatch_category(command),
        Commands::Rule { command } => dispatch_rule(command),
    }
}

fn dispatch_import(command: &ImportCommand) -> ClientResult<()> {
    match command {
        ImportCommand::File {
            path,
            format,
            account,
            columns,
            dry_run,
            single_shot,
            transfer_account,
            ai_endpoint,
            ai_key,
            ai_timeout_secs,
            json,
        } => import_file(ImportFileArgs {
            path,
            format: *format,
            account,
            columns,
            dry_run: *dry_run,
            single_shot: *single_shot,
            transfer_account: transfer_account.as_deref(),
            ai_endpoint: ai_endpoint.as_deref(),
            ai_key: ai_key.as_deref(),
            ai_timeout: Duration::from_secs(*ai_timeout_secs),
            json: *json,
        }),
        ImportCommand::List { json } => {
            let ledger = SqliteLedger::open(None)?;
            let entries = ledger.list_import_history(HISTORY_LIMIT)?;
            output::print_history(&entries, *json);
            Ok(())
        }
        ImportCommand::Undo { import_id, json } => {
            let mut ledger = SqliteLedger::open(None)?;
            let result = undo_import(&mut ledger, import_id)?;
            output::print_undo(&result, *json);
            Ok(())
        }
    }
}

struct ImportFileArgs<'a> {
    path: &'a str,
    format: SourceFormat,
    account: &'a str,
    columns: &'a [(String, usize)],
    dry_run: bool,
    single_shot: bool,
    transfer_account: Option<&'a str>,
    ai_endpoint: Option<&'a str>,
    ai_key: Option<&'a str>,
    ai_timeout: Duration,
    json: bool,
}

fn manual_columns_from_overrides(overrides: &[(String, usize)]) -> Option<ManualColumnMap> {
    if overrides.is_empty() {
        return None;
    }
    let mut map = ManualColumnMap::default();
    for (field, index) in overrides {
        match field.as_str() {
            "date" => map.date = Some(*index),
            "amount" => map.amount = Some(*index),
            "credit" => map.credit = Some(*index),
            "debit" => map.debit = Some(*index),
            "description" => map.description = Some(*index),
            "memo" => map.memo = Some(*index),
            "category" => map.category = Some(*index),
            _ => {}
        }
    }
    Some(map)
}

fn import_file(args: ImportFileArgs<'_>) -> ClientResult<()> {
    let bytes = std::fs::read(args.path).map_err(|error| {
        ClientError::invalid_argument_with_recovery(
            &format!("cannot read `{}`: {error}", args.path),
            vec!["Check the file path and its permissions".to_string()],
        )
    })?;

    let mut ledger = SqliteLedger::open(None)?;
    let manual_columns = manual_columns_from_overrides(args.columns);
    let mut batch = build_batch(
        ImportRequest {
            bytes: &bytes,
            file_name: args.path,
            declared_format: args.format,
            primary_account_id: args.account,
            manual_columns: manual_columns.as_ref(),
        },
        &ledger,
        &ledger,
        &ledger,
    )?;

    if let Some(endpoint) = args.ai_endpoint {
        run_ai_classification(&mut batch, &ledger, endpoint, args.ai_key, args.ai_timeout)?;
    }

    if let Some(counter) = args.transfer_account {
        let exists = ledger
            .active_accounts()?
            .iter()
            .any(|candidate| candidate.account_id == counter);
        if !exists {
            return Err(ClientError::account_not_found(counter));
        }
        let confirmed = batch.confirm_transfers_bulk(counter);
        if confirmed > 0 && !args.json {
            eprintln!("Confirmed {confirmed} transfer candidate(s) against {counter}.");
        }
    }

    if args.single_shot {
        resolve_unresolved_to_fallback(&mut batch, &mut ledger)?;
    }

    if args.dry_run {
        output::print_dry_run(&batch, args.json);
        return Ok(());
    }

    let result = commit_batch(&mut batch, &mut ledger)?;
    output::print_commit(&result, &batch.failures, args.json);
    Ok(())
}

fn run_ai_classification(
    batch: &mut kakeibo_core::import::ImportBatch,
    ledger: &SqliteLedger,
    endpoint: &str,
    key_override: Option<&str>,
    timeout: Duration,
) -> ClientResult<()> {
    let api_key = match key_override {
        Some(key) => key.to_string(),
        None => std::env::var("KAKEIBO_AI_KEY").map_err(|_| {
            ClientError::invalid_argument_with_recovery(
                "no AI API key provided",
                vec![
                    "Pass --ai-key <key>".to_string(),
                    "Or set the KAKEIBO_AI_KEY environment variable".to_string(),
                ],
            )
        })?,
    };

    let categories: Vec<_> = ledger
        .all_categories()?
        .into_iter()
        .filter(|category| category.txn_type != TransactionType::Transfer)
        .collect();
    let classifier = HttpClassifier::new(endpoint, &api_key, timeout)?;

    let (sender, receiver) = mpsc::channel::<AiProgress>();
    let reporter = std::thread::spawn(move || {
        for progress in receiver {
            eprintln!(
                "AI classification: batch {}/{}",
                progress.current_batch, progress.total_batches
            );
        }
    });
    let outcome = classify_unresolved(
        batch,
        &classifier,
        &categories,
        &CancelToken::new(),
        Some(&sender),
    );
    drop(sender);
    let _ = reporter.join();

    let outcome = outcome?;
    eprintln!(
        "AI classification: {} applied, {} skipped",
        outcome.applied, outcome.skipped
    );
    Ok(())
}

fn dispatch_account(command: &AccountCommand) -> ClientResult<()> {
    match command {
        AccountCommand::List { json } => {
            let ledger = SqliteLedger::open(None)?;
            let accounts = ledger.active_accounts()?;
            output::print_accounts(&accounts, *json);
            Ok(())
        }
        AccountCommand::Add { name, cash, json } => {
            let mut ledger = SqliteLedger::open(None)?;
            let account = ledger.create_account(name, *cash)?;
            if *json {
                output::print_json(&account);
            } else {
                println!("Created account {} ({})", account.account_id, account.name);
            }
            Ok(())
        }
    }
}

fn dispatch_category(command: &CategoryCommand) -> ClientResult<()> {
    match command {
        CategoryCommand::List { json } => {
            let ledger = SqliteLedger::open(None)?;
            let categories = ledger.all_categories()?;
            output::print_categories(&categories, *json);
            Ok(())
        }
        CategoryCommand::Add {
            name,
            txn_type,
            json,
        } => {
            let mut ledger = SqliteLedger::open(None)?;
            let category = ledger.find_or_create_category(name, *txn_type)?;
            if *json {
                output::print_json(&category);
            } else {
                println!(
                    "Category {} ({}) -> {}",
                    category.name,
                    category.txn_type.as_str(),
                    category.category_id
                );
            }
            Ok(())
        }
    }
}

fn dispatch_rule(command: &RuleCommand) -> ClientResult<()> {
    match command {
        RuleCommand::List { json } => {
            let ledger = SqliteLedger::open(None)?;
            let rules = ledger.all_rules()?;
            output::print_rules(&rules, *json);
            Ok(())
        }
        RuleCommand::Add {
            keyword,
            category,
            txn_type,
            priority,
            json,
        } => {
            let mut ledger = SqliteLedger::open(None)?;
            let rule = ledger.create_rule(keyword, category, *txn_type, *priority)?;
            if *json {
                output::print_json(&rule);
            } else {
                println!("Created rule {} (`{}`)", rule.rule_id, rule.keyword);
            }
            Ok(())
        }
    }
}
