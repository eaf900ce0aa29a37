use chrono::NaiveDate;
use serde::Serialize;

/// Direction of a ledger transaction. Transfers carry a positive
/// amount; their direction lives in the account references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub category_id: String,
    pub name: String,
    pub txn_type: TransactionType,
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub account_id: String,
    pub name: String,
    pub is_cash: bool,
    pub is_active: bool,
}

/// Keyword-to-category mapping evaluated in descending priority;
/// first match wins.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRule {
    pub rule_id: String,
    pub keyword: String,
    pub target_category_id: String,
    pub txn_type: TransactionType,
    pub enabled: bool,
    pub priority: i64,
}

/// How a committed row received its category, kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Rule,
    Manual,
    Ai,
    ImportedDefault,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Manual => "manual",
            Self::Ai => "ai",
            Self::ImportedDefault => "imported_default",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rule" => Some(Self::Rule),
            "manual" => Some(Self::Manual),
            "ai" => Some(Self::Ai),
            "imported_default" => Some(Self::ImportedDefault),
            _ => None,
        }
    }
}

/// Canonical ledger transaction as materialized by the commit engine.
/// Amounts are positive integers in yen; the two legs of a transfer
/// pair share one `transfer_id` and reference each other's accounts.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerTransaction {
    pub txn_id: String,
    pub import_id: Option<String>,
    pub transfer_id: Option<String>,
    pub posted_on: NaiveDate,
    pub txn_type: TransactionType,
    pub amount: i64,
    pub category_id: Option<String>,
    pub account_id: String,
    pub counter_account_id: Option<String>,
    pub description: String,
    pub memo: String,
    pub provenance: Provenance,
    /// Duplicate-detection key computed while drafting; re-imports of
    /// the same row compare against this verbatim.
    pub fingerprint: Option<String>,
    pub source_hash: Option<String>,
}

/// Generates a new identifier with the domain's prefix convention
/// (`txn_`, `imp_`, `tfr_`, ...).
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", ulid::Ulid::new().to_string().to_lowercase())
}

/// One record per committed import run, keyed by `import_id`; drives
/// `kakeibo import list` and bulk undo.
#[derive(Debug, Clone, Serialize)]
pub struct ImportHistory {
    pub import_id: String,
    pub file_name: String,
    pub source_hash: String,
    pub format: String,
    pub status: String,
    pub total_rows: i64,
    pub added: i64,
    pub duplicates: i64,
    pub skipped: i64,
    pub transfer_pairs: i64,
}

/// The one structured artifact the surrounding UI/CLI needs after a
/// commit: summary counts plus the ids that drive undo.
#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub import_id: String,
    pub total_rows: i64,
    pub added_count: i64,
    pub duplicate_count: i64,
    pub skipped_count: i64,
    pub transfer_pair_count: i64,
    pub added_transaction_ids: Vec<String>,
}
