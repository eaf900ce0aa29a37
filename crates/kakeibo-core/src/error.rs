use std::path::Path;

use thiserror::Error;

/// Structured error carried across the library boundary.
///
/// `code` is a stable machine-readable identifier; `recovery_steps`
/// are short imperative hints the CLI prints under the message.
#[derive(Debug, Clone, Error, serde::Serialize)]
#[error("{message}")]
pub struct ClientError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn new(code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
        }
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::new(
            "invalid_argument",
            message,
            vec!["Run `kakeibo --help` for usage.".to_string()],
        )
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new("invalid_argument", message, recovery_steps)
    }

    pub fn empty_source(file_name: &str) -> Self {
        Self::new(
            "empty_source",
            &format!("Import file `{file_name}` contains no rows."),
            vec!["Export a non-empty CSV from your bank or wallet app and retry.".to_string()],
        )
    }

    pub fn unsupported_encoding(file_name: &str) -> Self {
        Self::new(
            "unsupported_encoding",
            &format!(
                "Could not decode `{file_name}` as UTF-8, UTF-16, Shift-JIS, or EUC-JP."
            ),
            vec![
                "Re-export the file as UTF-8 CSV.".to_string(),
                "Or convert it with `iconv -t UTF-8` before importing.".to_string(),
            ],
        )
    }

    pub fn commit_blocked(reason: &str) -> Self {
        Self::new(
            "commit_blocked",
            &format!("Cannot commit this import yet: {reason}"),
            vec![
                "Resolve every unresolved row with a category.".to_string(),
                "Confirm or re-label every transfer candidate.".to_string(),
            ],
        )
    }

    pub fn commit_in_progress() -> Self {
        Self::new(
            "commit_in_progress",
            "A commit for this batch is already in progress.",
            vec!["Wait for the running commit to finish before retrying.".to_string()],
        )
    }

    pub fn import_already_committed() -> Self {
        Self::new(
            "import_already_committed",
            "This batch was already committed.",
            vec!["Load the file again to start a new import.".to_string()],
        )
    }

    pub fn import_id_not_found(import_id: &str) -> Self {
        Self::new(
            "import_id_not_found",
            &format!("Import id `{import_id}` was not found."),
            vec![
                "Run `kakeibo import list` to find a valid import id.".to_string(),
                "Retry with `kakeibo import undo <import-id>`.".to_string(),
            ],
        )
    }

    pub fn import_already_reverted(import_id: &str) -> Self {
        Self::new(
            "import_already_reverted",
            &format!("Import id `{import_id}` was already reverted."),
            vec!["Run `kakeibo import list` to inspect import statuses.".to_string()],
        )
    }

    pub fn account_not_found(account_id: &str) -> Self {
        Self::new(
            "account_not_found",
            &format!("Account `{account_id}` was not found or is inactive."),
            vec!["Run `kakeibo account list` to see active accounts.".to_string()],
        )
    }

    pub fn category_not_found(category_id: &str) -> Self {
        Self::new(
            "category_not_found",
            &format!("Category `{category_id}` was not found."),
            vec!["Run `kakeibo category list` to see known categories.".to_string()],
        )
    }

    pub fn ai_unauthorized() -> Self {
        Self::new(
            "ai_unauthorized",
            "The classification service rejected the configured credentials.",
            vec!["Check the `KAKEIBO_AI_KEY` environment variable.".to_string()],
        )
    }

    pub fn ai_rate_limited() -> Self {
        Self::new(
            "ai_rate_limited",
            "The classification service is rate limiting requests.",
            vec!["Wait a moment and rerun the classification.".to_string()],
        )
    }

    pub fn ai_timeout(seconds: u64) -> Self {
        Self::new(
            "ai_timeout",
            &format!("The classification request timed out after {seconds}s."),
            vec![
                "Retry the classification.".to_string(),
                "Or raise the timeout in the AI configuration.".to_string(),
            ],
        )
    }

    pub fn ai_network(detail: &str) -> Self {
        Self::new(
            "ai_network",
            &format!("Could not reach the classification service: {detail}"),
            vec!["Check network connectivity and the configured endpoint.".to_string()],
        )
    }

    pub fn ai_invalid_response(detail: &str) -> Self {
        Self::new(
            "ai_invalid_response",
            &format!("The classification service returned an unusable response: {detail}"),
            vec!["Retry; if this persists, check the service's response schema.".to_string()],
        )
    }

    pub fn ai_refusal(detail: &str) -> Self {
        Self::new(
            "ai_refusal",
            &format!("The classification service declined to classify this batch: {detail}"),
            vec!["Classify the remaining rows manually.".to_string()],
        )
    }

    pub fn ledger_init_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_init_permission_denied",
            &format!("Cannot initialize ledger at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `KAKEIBO_HOME` to a writable directory."
            )],
        )
    }

    pub fn ledger_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_locked",
            &format!("Ledger database is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}` so the lock is released."
            )],
        )
    }

    pub fn ledger_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_corrupt",
            &format!("Ledger database appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid ledger file or restore from backup."
            )],
        )
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "migration_failed",
            &format!("Ledger migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    pub fn ledger_init_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_init_failed",
            &format!("Ledger initialization failed at `{location}`: {detail}"),
            Vec::new(),
        )
    }

    pub fn internal_serialization(detail: &str) -> Self {
        Self::new("internal_serialization_error", detail, Vec::new())
    }

    /// AI errors abort only the current classification call; rows are
    /// never mutated by a failed call. The CLI uses this to decide
    /// whether the batch itself is still reviewable.
    pub fn is_ai_error(&self) -> bool {
        self.code.starts_with("ai_")
    }
}
