use clap::{Parser, Subcommand};
use kakeibo_core::import::SourceFormat;
use kakeibo_core::model::TransactionType;

pub fn parse_source_format(value: &str) -> Result<SourceFormat, String> {
    SourceFormat::parse(value).ok_or_else(|| {
        "format must be one of: app, bank, card, amazon, resona, paypay".to_string()
    })
}

pub fn parse_transaction_type(value: &str) -> Result<TransactionType, String> {
    TransactionType::parse(value)
        .ok_or_else(|| "type must be one of: income, expense, transfer".to_string())
}

const COLUMN_FIELDS: [&str; 7] = [
    "date",
    "amount",
    "credit",
    "debit",
    "description",
    "memo",
    "category",
];

pub fn parse_column_override(value: &str) -> Result<(String, usize), String> {
    let (field, index) = value
        .split_once('=')
        .ok_or_else(|| "expected FIELD=INDEX, e.g. --col date=0".to_string())?;
    let field = field.trim().to_ascii_lowercase();
    if !COLUMN_FIELDS.contains(&field.as_str()) {
        return Err(format!("field must be one of: {}", COLUMN_FIELDS.join(", ")));
    }
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| "column index must be a non-negative integer".to_string())?;
    Ok((field, index))
}

#[derive(Debug, Parser)]
#[command(
    name = "kakeibo",
    version,
    about = "household ledger with a reviewed CSV import pipeline",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import bank/card/e-wallet exports into the ledger
    #[command(arg_required_else_help = true)]
    Import {
        #[command(subcommand)]
        command: ImportCommand,
    },
    /// Manage ledger accounts
    #[command(arg_required_else_help = true)]
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
    /// Manage categories
    #[command(arg_required_else_help = true)]
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    /// Manage keyword classification rules
    #[command(arg_required_else_help = true)]
    Rule {
        #[command(subcommand)]
        command: RuleCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ImportCommand {
    /// Parse, classify, and commit one export file
    File {
        /// Path to the export file
        path: String,
        /// Source format (app, bank, card, amazon, resona, paypay)
        #[arg(long, value_parser = parse_source_format)]
        format: SourceFormat,
        /// Account id the file belongs to (e.g. acc_abc123)
        #[arg(long)]
        account: String,
        /// Override one column position as FIELD=INDEX, repeatable
        /// (fields: date, amount, credit, debit, description, memo,
        /// category)
        #[arg(long = "col", value_name = "FIELD=INDEX", value_parser = parse_column_override)]
        columns: Vec<(String, usize)>,
        /// Parse and report only; write nothing
        #[arg(long)]
        dry_run: bool,
        /// Resolve leftover unresolved rows to a fallback category
        /// instead of blocking the commit
        #[arg(long)]
        single_shot: bool,
        /// Confirm every remaining transfer candidate against this
        /// counter-account id
        #[arg(long)]
        transfer_account: Option<String>,
        /// Classify unresolved rows via the external AI service at
        /// this endpoint before committing
        #[arg(long)]
        ai_endpoint: Option<String>,
        /// API key for the AI service (defaults to $KAKEIBO_AI_KEY)
        #[arg(long)]
        ai_key: Option<String>,
        /// Per-call timeout for the AI service, in seconds
        #[arg(long, default_value_t = 30)]
        ai_timeout_secs: u64,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// List past imports with their status and row counts
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Revert a previously committed import
    Undo {
        /// The import id to revert (e.g. imp_abc123)
        import_id: String,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum AccountCommand {
    /// List active accounts
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Create an account
    Add {
        /// Account display name
        name: String,
        /// Mark as the designated cash-equivalent account
        #[arg(long)]
        cash: bool,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum CategoryCommand {
    /// List categories across all transaction types
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Create a category (no-op if the normalized name exists)
    Add {
        /// Category display name
        name: String,
        /// Transaction type (income, expense, transfer)
        #[arg(long = "type", value_parser = parse_transaction_type)]
        txn_type: TransactionType,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum RuleCommand {
    /// List classification rules in evaluation order
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Create a keyword rule targeting an existing category
    Add {
        /// Keyword matched against normalized description + memo
        keyword: String,
        /// Target category id (e.g. cat_abc123)
        #[arg(long)]
        category: String,
        /// Transaction type (income, expense, transfer)
        #[arg(long = "type", value_parser = parse_transaction_type)]
        txn_type: TransactionType,
        /// Higher priority rules are evaluated first
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
