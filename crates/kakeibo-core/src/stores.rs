//! Collaborator interfaces consumed by the import pipeline.
//!
//! The pipeline never touches storage directly; it is handed these
//! traits so review/commit logic stays pure over its inputs and the
//! stores stay swappable in tests.

use std::collections::HashSet;

use crate::import::classify::{classify, Suggestion};
use crate::model::{
    Account, Category, ClassificationRule, ImportHistory, LedgerTransaction, TransactionType,
};
use crate::ClientResult;

/// The persisted ledger: fingerprint snapshot for dedupe, category
/// master data, transaction insertion, and import-history bookkeeping.
pub trait LedgerStore {
    /// Fingerprints of every persisted transaction. Computed once per
    /// import run and checked per row.
    fn existing_fingerprints(&self) -> ClientResult<HashSet<String>>;

    fn categories_for(&self, txn_type: TransactionType) -> ClientResult<Vec<Category>>;

    /// Looks a category up by normalized name, creating it when
    /// absent. Used by the legacy single-shot path and app re-import.
    fn find_or_create_category(
        &mut self,
        name: &str,
        txn_type: TransactionType,
    ) -> ClientResult<Category>;

    fn insert_transaction(&mut self, txn: &LedgerTransaction) -> ClientResult<()>;

    fn record_import_history(&mut self, history: &ImportHistory) -> ClientResult<()>;

    fn find_import_history(&self, import_id: &str) -> ClientResult<Option<ImportHistory>>;

    /// Most recent first.
    fn list_import_history(&self, limit: i64) -> ClientResult<Vec<ImportHistory>>;

    fn mark_import_reverted(&mut self, import_id: &str) -> ClientResult<()>;

    /// Returns the number of deleted rows.
    fn delete_transactions_by_import_id(&mut self, import_id: &str) -> ClientResult<i64>;

    /// Legacy deletion path for rows committed before import ids
    /// existed; matches on the per-row source file hash.
    fn delete_transactions_by_source_hash(&mut self, source_hash: &str) -> ClientResult<i64>;
}

/// Read-only view of the user's classification rules.
pub trait RuleStore {
    /// Enabled rules for one transaction type, sorted by priority
    /// descending. The ordering is the classifier's tie-break.
    fn rules_for(&self, txn_type: TransactionType) -> ClientResult<Vec<ClassificationRule>>;

    /// Suggests a category for one candidate's text against this
    /// store's rule set. A matching rule outranks a category name
    /// stated in the file itself.
    fn suggest_category(
        &self,
        description: &str,
        memo: &str,
        raw_category: Option<&str>,
        txn_type: TransactionType,
        categories: &[Category],
    ) -> ClientResult<Suggestion> {
        let rules = self.rules_for(txn_type)?;
        Ok(classify(
            description,
            memo,
            raw_category,
            txn_type,
            &rules,
            categories,
        ))
    }
}

pub trait AccountStore {
    fn active_accounts(&self) -> ClientResult<Vec<Account>>;

    /// The designated cash-equivalent account used to auto-resolve
    /// ATM-style transfer candidates, if one exists.
    fn cash_account(&self) -> ClientResult<Option<Account>>;
}
