use kakeibo_core::import::draft::{BatchSummary, ImportBatch};
use kakeibo_core::import::parse::ParseFailure;
use kakeibo_core::import::UndoResult;
use kakeibo_core::model::{Account, Category, ClassificationRule, CommitResult, ImportHistory};
use kakeibo_core::ClientError;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(error) => eprintln!("failed to render JSON output: {error}"),
    }
}

pub fn print_error(error: &ClientError, json: bool) {
    if json {
        print_json(error);
        return;
    }
    eprintln!("Error ({}): {}", error.code, error.message);
    for step in &error.recovery_steps {
        eprintln!("  - {step}");
    }
}

#[derive(Serialize)]
pub struct DryRunReport<'a> {
    pub file_name: &'a str,
    pub format: &'a str,
    pub summary: BatchSummary,
    pub failures: &'a [ParseFailure],
}

pub fn print_dry_run(batch: &ImportBatch, json: bool) {
    let summary = batch.summary();
    if json {
        print_json(&DryRunReport {
            file_name: &batch.file_name,
            format: batch.format.as_str(),
            summary,
            failures: &batch.failures,
        });
        return;
    }
    println!(
        "Dry run: {} ({}), nothing was written",
        batch.file_name,
        batch.format.as_str()
    );
    print_summary(&summary);
    print_failures(&batch.failures);
    for row in &batch.rows {
        println!(
            "  [{}] {} {} {}円 {}",
            row.status.as_str(),
            row.candidate.date.format("%Y-%m-%d"),
            row.candidate.txn_type.as_str(),
            row.candidate.amount,
            row.candidate.description
        );
    }
}

pub fn print_commit(result: &CommitResult, failures: &[ParseFailure], json: bool) {
    if json {
        #[derive(Serialize)]
        struct CommitReport<'a> {
            result: &'a CommitResult,
            failures: &'a [ParseFailure],
        }
        print_json(&CommitReport { result, failures });
        return;
    }
    println!("Import {} committed.", result.import_id);
    println!(
        "  {} added, {} duplicates, {} invalid, {} transfer pair(s)",
        result.added_count, result.duplicate_count, result.skipped_count, result.transfer_pair_count
    );
    print_failures(failures);
    println!("Undo with: kakeibo import undo {}", result.import_id);
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "  {} rows: {} resolved, {} unresolved, {} transfer candidate(s), {} confirmed, {} duplicate(s), {} invalid",
        summary.total_rows,
        summary.resolved,
        summary.unresolved,
        summary.transfer_candidates,
        summary.transfer_confirmed,
        summary.duplicates,
        summary.invalid
    );
}

const MAX_FAILURES_SHOWN: usize = 20;

fn print_failures(failures: &[ParseFailure]) {
    for failure in failures.iter().take(MAX_FAILURES_SHOWN) {
        println!("  invalid {}", failure.display());
    }
    if failures.len() > MAX_FAILURES_SHOWN {
        println!("  ...and {} more", failures.len() - MAX_FAILURES_SHOWN);
    }
}

pub fn print_history(entries: &[ImportHistory], json: bool) {
    if json {
        print_json(&entries);
        return;
    }
    if entries.is_empty() {
        println!("No imports yet.");
        return;
    }
    for entry in entries {
        println!(
            "{}  {}  [{}]  {} added / {} dup / {} skipped ({})",
            entry.import_id,
            entry.file_name,
            entry.status,
            entry.added,
            entry.duplicates,
            entry.skipped,
            entry.format
        );
    }
}

pub fn print_undo(result: &UndoResult, json: bool) {
    if json {
        print_json(result);
        return;
    }
    println!(
        "Reverted {}: deleted {} transaction(s){}",
        result.import_id,
        result.deleted_count,
        if result.used_legacy_fallback {
            " (matched by source hash)"
        } else {
            ""
        }
    );
}

pub fn print_accounts(accounts: &[Account], json: bool) {
    if json {
        print_json(&accounts);
        return;
    }
    for account in accounts {
        println!(
            "{}  {}{}",
            account.account_id,
            account.name,
            if account.is_cash { "  (cash)" } else { "" }
        );
    }
}

pub fn print_categories(categories: &[Category], json: bool) {
    if json {
        print_json(&categories);
        return;
    }
    for category in categories {
        println!(
            "{}  {}  ({})",
            category.category_id,
            category.name,
            category.txn_type.as_str()
        );
    }
}

pub fn print_rules(rules: &[ClassificationRule], json: bool) {
    if json {
        print_json(&rules);
        return;
    }
    for rule in rules {
        println!(
            "{}  p{}  `{}` -> {} ({}){}",
            rule.rule_id,
            rule.priority,
            rule.keyword,
            rule.target_category_id,
            rule.txn_type.as_str(),
            if rule.enabled { "" } else { "  [disabled]" }
        );
    }
}
