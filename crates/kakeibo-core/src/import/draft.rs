use std::collections::HashMap;

use crate::error::{ClientError, ClientResult};
use crate::import::classify::{self, Suggestion};
use crate::import::columns::{build_column_map, ManualColumnMap};
use crate::import::dedupe::{fingerprint, DuplicateChecker};
use crate::import::detect::{detect_format, SourceFormat};
use crate::import::input::{decode_source, source_hash, tokenize};
use crate::import::parse::{parse_row, ParseFailure, ParsedCandidate};
use crate::import::transfer::{self, TransferReason};
use crate::model::{prefixed_id, Category, ClassificationRule, Provenance, TransactionType};
use crate::stores::{AccountStore, LedgerStore, RuleStore};

/// Review status of one draft row. Parse failures are held on the
/// batch as `ParseFailure` records; together with these five states
/// they form the six outcomes a source row can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Unresolved,
    Resolved,
    TransferCandidate,
    TransferConfirmed,
    Duplicate,
}

impl DraftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Resolved => "resolved",
            Self::TransferCandidate => "transfer_candidate",
            Self::TransferConfirmed => "transfer_confirmed",
            Self::Duplicate => "duplicate",
        }
    }
}

/// One reviewable row in an import batch.
#[derive(Debug, Clone)]
pub struct DraftRow {
    pub row_id: String,
    pub candidate: ParsedCandidate,
    pub status: DraftStatus,
    pub suggested_category_id: Option<String>,
    pub suggested_rule_id: Option<String>,
    pub suggested_from_file: bool,
    /// Reviewer or AI override; outranks the suggestion at commit.
    pub final_category_id: Option<String>,
    pub ai_rationale: Option<String>,
    pub transfer_reason: Option<TransferReason>,
    pub counter_account_id: Option<String>,
    /// Generated once at confirmation so a retried commit reuses the
    /// same pair id.
    pub transfer_id: Option<String>,
    pub fingerprint: String,
    pub(crate) committed: bool,
    /// Transfer leg ids already persisted, in write order. A retried
    /// commit resumes from the first missing leg.
    pub(crate) committed_leg_ids: Vec<String>,
}

impl DraftRow {
    pub fn effective_category_id(&self) -> Option<&str> {
        self.final_category_id
            .as_deref()
            .or(self.suggested_category_id.as_deref())
    }

    pub fn commit_eligible(&self) -> bool {
        matches!(
            self.status,
            DraftStatus::Resolved | DraftStatus::TransferConfirmed
        )
    }

    /// How this row's category came to be, for the audit tag.
    pub fn provenance(&self) -> Provenance {
        if self.ai_rationale.is_some() {
            Provenance::Ai
        } else if self.final_category_id.is_some() {
            Provenance::Manual
        } else if self.suggested_rule_id.is_some() {
            Provenance::Rule
        } else {
            Provenance::ImportedDefault
        }
    }
}

/// Per-status counts for the review summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    pub total_rows: i64,
    pub unresolved: i64,
    pub resolved: i64,
    pub transfer_candidates: i64,
    pub transfer_confirmed: i64,
    pub duplicates: i64,
    pub invalid: i64,
}

/// What the caller hands the pipeline to start an import session.
#[derive(Debug, Clone, Copy)]
pub struct ImportRequest<'a> {
    pub bytes: &'a [u8],
    pub file_name: &'a str,
    pub declared_format: SourceFormat,
    pub primary_account_id: &'a str,
    pub manual_columns: Option<&'a ManualColumnMap>,
}

/// One import session: the parsed rows under review plus the metadata
/// the commit engine needs. Mutated by exactly one reviewing agent.
#[derive(Debug)]
pub struct ImportBatch {
    pub file_name: String,
    pub source_hash: String,
    pub format: SourceFormat,
    pub has_header: bool,
    pub primary_account_id: String,
    pub rows: Vec<DraftRow>,
    pub failures: Vec<ParseFailure>,
    /// Generated once at batch build; a retried commit reuses it.
    pub(crate) import_id: String,
    pub(crate) commit_in_progress: bool,
    pub(crate) committed: bool,
}

/// Parses, classifies, transfer-flags, and dedupe-checks a raw source
/// file into a reviewable batch. Pure over its store inputs apart from
/// reading the fingerprint snapshot and master data.
pub fn build_batch(
    request: ImportRequest<'_>,
    ledger: &dyn LedgerStore,
    rules: &dyn RuleStore,
    accounts: &dyn AccountStore,
) -> ClientResult<ImportBatch> {
    let text = decode_source(request.bytes, request.file_name)?;
    let raw_rows = tokenize(&text)?;
    if raw_rows.is_empty() {
        return Err(ClientError::empty_source(request.file_name));
    }

    let primary_exists = accounts
        .active_accounts()?
        .iter()
        .any(|account| account.account_id == request.primary_account_id);
    if !primary_exists {
        return Err(ClientError::account_not_found(request.primary_account_id));
    }
    let cash_account = accounts.cash_account()?;

    let format = detect_format(request.declared_format, &raw_rows);
    let (column_map, has_header) = build_column_map(&raw_rows, format, request.manual_columns);

    let master = MasterData::load(ledger, rules)?;
    let mut checker = DuplicateChecker::new(ledger.existing_fingerprints()?);

    let mut rows = Vec::new();
    let mut failures = Vec::new();
    for (offset, raw_row) in raw_rows.iter().enumerate() {
        let source_row_index = offset as i64 + 1;
        if has_header && offset == 0 {
            continue;
        }
        let candidate = match parse_row(raw_row, &column_map, format, source_row_index) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => continue,
            Err(failure) => {
                failures.push(failure);
                continue;
            }
        };
        rows.push(draft_row(
            candidate,
            &master,
            &mut checker,
            request.primary_account_id,
            cash_account.as_ref().map(|account| account.account_id.as_str()),
        ));
    }

    Ok(ImportBatch {
        file_name: request.file_name.to_string(),
        source_hash: source_hash(request.bytes),
        format,
        has_header,
        primary_account_id: request.primary_account_id.to_string(),
        rows,
        failures,
        import_id: prefixed_id("imp"),
        commit_in_progress: false,
        committed: false,
    })
}

fn draft_row(
    candidate: ParsedCandidate,
    master: &MasterData,
    checker: &mut DuplicateChecker,
    primary_account_id: &str,
    cash_account_id: Option<&str>,
) -> DraftRow {
    let suggestion = master.classify(&candidate);
    let category_name = suggestion
        .category_id
        .as_deref()
        .and_then(|id| master.category_name(candidate.txn_type, id))
        .unwrap_or("");
    let key = fingerprint(
        candidate.date,
        candidate.txn_type,
        candidate.amount,
        category_name,
        &candidate.memo,
        Some(primary_account_id),
        None,
    );

    let mut row = DraftRow {
        row_id: prefixed_id("row"),
        status: DraftStatus::Unresolved,
        suggested_category_id: suggestion.category_id,
        suggested_rule_id: suggestion.rule_id,
        suggested_from_file: suggestion.from_file,
        final_category_id: None,
        ai_rationale: None,
        transfer_reason: None,
        counter_account_id: None,
        transfer_id: None,
        fingerprint: key,
        committed: false,
        committed_leg_ids: Vec::new(),
        candidate,
    };

    // Initial status precedence: duplicate, then transfer candidacy,
    // then classification.
    if checker.check_and_accept(&row.fingerprint) {
        row.status = DraftStatus::Duplicate;
        return row;
    }
    if let Some(reason) = transfer::detect(&row.candidate.description, row.candidate.txn_type) {
        row.transfer_reason = Some(reason);
        if reason.auto_resolvable() {
            if let Some(cash) = cash_account_id {
                row.status = DraftStatus::TransferConfirmed;
                row.counter_account_id = Some(cash.to_string());
                row.transfer_id = Some(prefixed_id("tfr"));
                return row;
            }
        }
        row.status = DraftStatus::TransferCandidate;
        return row;
    }
    if row.suggested_category_id.is_some() {
        row.status = DraftStatus::Resolved;
    }
    row
}

impl ImportBatch {
    pub fn import_id(&self) -> &str {
        &self.import_id
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total_rows: (self.rows.len() + self.failures.len()) as i64,
            invalid: self.failures.len() as i64,
            ..BatchSummary::default()
        };
        for row in &self.rows {
            match row.status {
                DraftStatus::Unresolved => summary.unresolved += 1,
                DraftStatus::Resolved => summary.resolved += 1,
                DraftStatus::TransferCandidate => summary.transfer_candidates += 1,
                DraftStatus::TransferConfirmed => summary.transfer_confirmed += 1,
                DraftStatus::Duplicate => summary.duplicates += 1,
            }
        }
        summary
    }

    pub fn row(&self, row_id: &str) -> ClientResult<&DraftRow> {
        self.rows
            .iter()
            .find(|row| row.row_id == row_id)
            .ok_or_else(|| {
                ClientError::invalid_argument(&format!("no draft row with id `{row_id}`"))
            })
    }

    fn row_mut(&mut self, row_id: &str) -> ClientResult<&mut DraftRow> {
        self.rows
            .iter_mut()
            .find(|row| row.row_id == row_id)
            .ok_or_else(|| {
                ClientError::invalid_argument(&format!("no draft row with id `{row_id}`"))
            })
    }

    /// `unresolved -> resolved` via an explicit category. Also accepts
    /// re-assignment of an already resolved row (manual override).
    pub fn assign_category(&mut self, row_id: &str, category_id: &str) -> ClientResult<()> {
        let row = self.row_mut(row_id)?;
        match row.status {
            DraftStatus::Unresolved | DraftStatus::Resolved => {
                row.final_category_id = Some(category_id.to_string());
                row.ai_rationale = None;
                row.status = DraftStatus::Resolved;
                Ok(())
            }
            other => Err(transition_error(other, "assign a category")),
        }
    }

    /// Applies one category to every unresolved row whose normalized
    /// description matches the given one. Returns how many rows moved.
    pub fn assign_category_bulk(&mut self, description: &str, category_id: &str) -> i64 {
        let wanted = crate::normalize::normalize(description);
        let mut moved = 0;
        for row in &mut self.rows {
            if row.status == DraftStatus::Unresolved
                && crate::normalize::normalize(&row.candidate.description) == wanted
            {
                row.final_category_id = Some(category_id.to_string());
                row.status = DraftStatus::Resolved;
                moved += 1;
            }
        }
        moved
    }

    /// `transfer_candidate -> transfer_confirmed`. Confirming an
    /// already confirmed row replaces the counter-account.
    pub fn confirm_transfer(&mut self, row_id: &str, counter_account_id: &str) -> ClientResult<()> {
        let row = self.row_mut(row_id)?;
        match row.status {
            DraftStatus::TransferCandidate | DraftStatus::TransferConfirmed => {
                row.counter_account_id = Some(counter_account_id.to_string());
                if row.transfer_id.is_none() {
                    row.transfer_id = Some(prefixed_id("tfr"));
                }
                row.status = DraftStatus::TransferConfirmed;
                Ok(())
            }
            other => Err(transition_error(other, "confirm a transfer")),
        }
    }

    /// Confirms every remaining transfer candidate against one
    /// counter-account. Returns how many rows moved.
    pub fn confirm_transfers_bulk(&mut self, counter_account_id: &str) -> i64 {
        let mut moved = 0;
        for row in &mut self.rows {
            if row.status == DraftStatus::TransferCandidate {
                row.counter_account_id = Some(counter_account_id.to_string());
                row.transfer_id = Some(prefixed_id("tfr"));
                row.status = DraftStatus::TransferConfirmed;
                moved += 1;
            }
        }
        moved
    }

    /// `transfer_confirmed -> transfer_candidate`: clears the
    /// counter-account so the reviewer can pick again.
    pub fn revert_transfer(&mut self, row_id: &str) -> ClientResult<()> {
        let row = self.row_mut(row_id)?;
        match row.status {
            DraftStatus::TransferConfirmed => {
                row.counter_account_id = None;
                row.transfer_id = None;
                row.status = DraftStatus::TransferCandidate;
                Ok(())
            }
            other => Err(transition_error(other, "revert a transfer")),
        }
    }

    /// Re-labels a transfer candidate as a normal transaction with an
    /// explicit category, clearing all transfer fields. The type is
    /// re-derived from the amount direction.
    pub fn relabel_as_regular(&mut self, row_id: &str, category_id: &str) -> ClientResult<()> {
        let row = self.row_mut(row_id)?;
        match row.status {
            DraftStatus::TransferCandidate | DraftStatus::TransferConfirmed => {
                row.transfer_reason = None;
                row.counter_account_id = None;
                row.transfer_id = None;
                if row.candidate.txn_type == TransactionType::Transfer {
                    row.candidate.txn_type = match row.candidate.sign {
                        crate::import::parse::AmountSign::Inflow => TransactionType::Income,
                        crate::import::parse::AmountSign::Outflow => TransactionType::Expense,
                    };
                }
                row.final_category_id = Some(category_id.to_string());
                row.status = DraftStatus::Resolved;
                Ok(())
            }
            other => Err(transition_error(other, "re-label as a regular transaction")),
        }
    }

    /// Applies one AI classification result. Returns false when the
    /// row has left `unresolved` in the meantime; an explicit reviewer
    /// action always wins over an in-flight AI response.
    pub(crate) fn apply_ai_update(
        &mut self,
        row_id: &str,
        category_id: &str,
        rationale: &str,
    ) -> bool {
        let Some(row) = self.rows.iter_mut().find(|row| row.row_id == row_id) else {
            return false;
        };
        if row.status != DraftStatus::Unresolved {
            return false;
        }
        row.final_category_id = Some(category_id.to_string());
        row.ai_rationale = Some(rationale.to_string());
        row.status = DraftStatus::Resolved;
        true
    }
}

fn transition_error(status: DraftStatus, action: &str) -> ClientError {
    ClientError::invalid_argument_with_recovery(
        &format!("cannot {action} on a row in status `{}`", status.as_str()),
        vec![
            "Re-run the import with `--dry-run` to see each row's current status".to_string(),
            "Only non-terminal rows accept review actions".to_string(),
        ],
    )
}

/// Resolves every remaining unresolved row to a per-type fallback
/// category, creating it on demand. The legacy single-shot path uses
/// this so a commit never stalls on classification.
pub fn resolve_unresolved_to_fallback(
    batch: &mut ImportBatch,
    ledger: &mut dyn LedgerStore,
) -> ClientResult<i64> {
    const FALLBACK_NAME: &str = "その他";

    let mut cache: HashMap<&'static str, Category> = HashMap::new();
    let mut moved = 0;
    for row in &mut batch.rows {
        if row.status != DraftStatus::Unresolved {
            continue;
        }
        let txn_type = row.candidate.txn_type;
        let category = match cache.get(txn_type.as_str()) {
            Some(category) => category.clone(),
            None => {
                let created = ledger.find_or_create_category(FALLBACK_NAME, txn_type)?;
                cache.insert(txn_type.as_str(), created.clone());
                created
            }
        };
        row.suggested_category_id = Some(category.category_id);
        row.suggested_rule_id = None;
        row.suggested_from_file = false;
        row.status = DraftStatus::Resolved;
        moved += 1;
    }
    Ok(moved)
}

/// Category and rule master data snapshotted once per import run.
struct MasterData {
    rules: HashMap<&'static str, Vec<ClassificationRule>>,
    categories: HashMap<&'static str, Vec<Category>>,
}

impl MasterData {
    fn load(ledger: &dyn LedgerStore, rules: &dyn RuleStore) -> ClientResult<Self> {
        let types = [
            TransactionType::Income,
            TransactionType::Expense,
            TransactionType::Transfer,
        ];
        let mut rule_map = HashMap::new();
        let mut category_map = HashMap::new();
        for txn_type in types {
            rule_map.insert(txn_type.as_str(), rules.rules_for(txn_type)?);
            category_map.insert(txn_type.as_str(), ledger.categories_for(txn_type)?);
        }
        Ok(Self {
            rules: rule_map,
            categories: category_map,
        })
    }

    fn classify(&self, candidate: &ParsedCandidate) -> Suggestion {
        static EMPTY_RULES: Vec<ClassificationRule> = Vec::new();
        static EMPTY_CATEGORIES: Vec<Category> = Vec::new();
        let rules = self
            .rules
            .get(candidate.txn_type.as_str())
            .unwrap_or(&EMPTY_RULES);
        let categories = self
            .categories
            .get(candidate.txn_type.as_str())
            .unwrap_or(&EMPTY_CATEGORIES);
        classify::classify(
            &candidate.description,
            &candidate.memo,
            candidate.raw_category.as_deref(),
            candidate.txn_type,
            rules,
            categories,
        )
    }

    fn category_name(&self, txn_type: TransactionType, category_id: &str) -> Option<&str> {
        self.categories
            .get(txn_type.as_str())?
            .iter()
            .find(|category| category.category_id == category_id)
            .map(|category| category.name.as_str())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{Account, ImportHistory, LedgerTransaction};
    use std::collections::HashSet;

    /// In-memory stores for exercising the pipeline without SQLite.
    #[derive(Default)]
    pub(crate) struct MemoryStores {
        pub fingerprints: HashSet<String>,
        pub categories: Vec<Category>,
        pub rules: Vec<ClassificationRule>,
        pub accounts: Vec<Account>,
        pub cash: Option<Account>,
        pub inserted: Vec<LedgerTransaction>,
        pub history: Vec<ImportHistory>,
    }

    impl MemoryStores {
        pub fn with_bank_account() -> Self {
            let mut stores = Self::default();
            stores.accounts.push(Account {
                account_id: "acc_bank".to_string(),
                name: "みずほ銀行".to_string(),
                is_cash: false,
                is_active: true,
            });
            stores.cash = Some(Account {
                account_id: "acc_cash".to_string(),
                name: "現金".to_string(),
                is_cash: true,
                is_active: true,
            });
            stores
        }
    }

    impl LedgerStore for MemoryStores {
        fn existing_fingerprints(&self) -> ClientResult<HashSet<String>> {
            Ok(self.fingerprints.clone())
        }

        fn categories_for(&self, txn_type: TransactionType) -> ClientResult<Vec<Category>> {
            Ok(self
                .categories
                .iter()
                .filter(|category| category.txn_type == txn_type)
                .cloned()
                .collect())
        }

        fn find_or_create_category(
            &mut self,
            name: &str,
            txn_type: TransactionType,
        ) -> ClientResult<Category> {
            if let Some(existing) = self
                .categories
                .iter()
                .find(|category| category.name == name && category.txn_type == txn_type)
            {
                return Ok(existing.clone());
            }
            let created = Category {
                category_id: prefixed_id("cat"),
                name: name.to_string(),
                txn_type,
            };
            self.categories.push(created.clone());
            Ok(created)
        }

        fn insert_transaction(&mut self, txn: &LedgerTransaction) -> ClientResult<()> {
            self.inserted.push(txn.clone());
            Ok(())
        }

        fn record_import_history(&mut self, history: &ImportHistory) -> ClientResult<()> {
            self.history.push(history.clone());
            Ok(())
        }

        fn find_import_history(&self, import_id: &str) -> ClientResult<Option<ImportHistory>> {
            Ok(self
                .history
                .iter()
                .find(|entry| entry.import_id == import_id)
                .cloned())
        }

        fn list_import_history(&self, limit: i64) -> ClientResult<Vec<ImportHistory>> {
            Ok(self.history.iter().rev().take(limit as usize).cloned().collect())
        }

        fn mark_import_reverted(&mut self, import_id: &str) -> ClientResult<()> {
            for entry in &mut self.history {
                if entry.import_id == import_id {
                    entry.status = "reverted".to_string();
                }
            }
            Ok(())
        }

        fn delete_transactions_by_import_id(&mut self, import_id: &str) -> ClientResult<i64> {
            let before = self.inserted.len();
            self.inserted
                .retain(|txn| txn.import_id.as_deref() != Some(import_id));
            Ok((before - self.inserted.len()) as i64)
        }

        fn delete_transactions_by_source_hash(&mut self, source_hash: &str) -> ClientResult<i64> {
            let before = self.inserted.len();
            self.inserted
                .retain(|txn| txn.source_hash.as_deref() != Some(source_hash));
            Ok((before - self.inserted.len()) as i64)
        }
    }

    impl RuleStore for MemoryStores {
        fn rules_for(&self, txn_type: TransactionType) -> ClientResult<Vec<ClassificationRule>> {
            let mut rules: Vec<_> = self
                .rules
                .iter()
                .filter(|rule| rule.txn_type == txn_type && rule.enabled)
                .cloned()
                .collect();
            rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority));
            Ok(rules)
        }
    }

    impl AccountStore for MemoryStores {
        fn active_accounts(&self) -> ClientResult<Vec<Account>> {
            let mut accounts: Vec<_> = self
                .accounts
                .iter()
                .filter(|account| account.is_active)
                .cloned()
                .collect();
            if let Some(cash) = &self.cash {
                accounts.push(cash.clone());
            }
            Ok(accounts)
        }

        fn cash_account(&self) -> ClientResult<Option<Account>> {
            Ok(self.cash.clone())
        }
    }

    pub(crate) fn batch_from_csv(csv: &str, stores: &MemoryStores) -> ImportBatch {
        build_batch(
            ImportRequest {
                bytes: csv.as_bytes(),
                file_name: "export.csv",
                declared_format: SourceFormat::BankGeneric,
                primary_account_id: "acc_bank",
                manual_columns: None,
            },
            stores,
            stores,
            stores,
        )
        .expect("batch")
    }

    #[test]
    fn rule_store_suggests_categories_from_its_own_rule_set() {
        let mut stores = MemoryStores::with_bank_account();
        stores.categories.push(Category {
            category_id: "cat_dining".to_string(),
            name: "外食".to_string(),
            txn_type: TransactionType::Expense,
        });
        stores.rules.push(ClassificationRule {
            rule_id: "rule_coffee".to_string(),
            keyword: "COFFEE".to_string(),
            target_category_id: "cat_dining".to_string(),
            txn_type: TransactionType::Expense,
            enabled: true,
            priority: 10,
        });

        let suggestion = stores
            .suggest_category(
                "coffee stand",
                "",
                None,
                TransactionType::Expense,
                &stores.categories,
            )
            .expect("suggestion");
        assert_eq!(suggestion.category_id.as_deref(), Some("cat_dining"));
        assert_eq!(suggestion.rule_id.as_deref(), Some("rule_coffee"));
    }

    #[test]
    fn headerless_first_row_survives_batch_building() {
        let stores = MemoryStores::with_bank_account();
        let batch = batch_from_csv(
            "2024/01/15,ATMから出金,-3000\n2024/01/16,Coffee,-500\n",
            &stores,
        );
        assert!(!batch.has_header);
        assert!(batch.failures.is_empty());
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[0].candidate.description, "ATMから出金");
    }

    #[test]
    fn atm_rows_auto_confirm_against_the_cash_account() {
        let stores = MemoryStores::with_bank_account();
        let batch = batch_from_csv("2024/01/15,ｶ-ﾄﾞ ATM,-3000\n", &stores);
        let row = &batch.rows[0];
        assert_eq!(row.status, DraftStatus::TransferConfirmed);
        assert_eq!(row.counter_account_id.as_deref(), Some("acc_cash"));
        assert!(row.transfer_id.is_some());
        assert_eq!(row.transfer_reason, Some(TransferReason::CardAtm));
    }

    #[test]
    fn identical_rows_in_one_file_dedupe_to_one_candidate() {
        let stores = MemoryStores::with_bank_account();
        let batch = batch_from_csv(
            "2024/02/01,Coffee,-500,memo\n2024/02/01,Coffee,-500,memo\n",
            &stores,
        );
        let statuses: Vec<_> = batch.rows.iter().map(|row| row.status).collect();
        assert_eq!(statuses, vec![DraftStatus::Unresolved, DraftStatus::Duplicate]);
    }

    #[test]
    fn summary_counts_every_outcome() {
        let stores = MemoryStores::with_bank_account();
        let batch = batch_from_csv(
            "2024/01/15,ATMから出金,-3000\n2024/02/01,Coffee,-500\n2024/02/02,,oops\n",
            &stores,
        );
        let summary = batch.summary();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.transfer_confirmed, 1);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.invalid, 1);
    }

    #[test]
    fn unresolved_rows_accept_manual_categories() {
        let stores = MemoryStores::with_bank_account();
        let mut batch = batch_from_csv("2024/02/01,Coffee,-500\n", &stores);
        let row_id = batch.rows[0].row_id.clone();
        batch.assign_category(&row_id, "cat_dining").expect("assign");
        let row = batch.row(&row_id).expect("row");
        assert_eq!(row.status, DraftStatus::Resolved);
        assert_eq!(row.final_category_id.as_deref(), Some("cat_dining"));
        assert_eq!(row.provenance(), Provenance::Manual);
    }

    #[test]
    fn bulk_assignment_matches_normalized_descriptions() {
        let stores = MemoryStores::with_bank_account();
        let mut batch = batch_from_csv(
            "2024/02/01,ｽﾀｰﾊﾞｯｸｽ,-500\n2024/02/02,スターバックス,-600\n2024/02/03,Bakery,-300\n",
            &stores,
        );
        let moved = batch.assign_category_bulk("スターバックス", "cat_dining");
        assert_eq!(moved, 2);
        assert_eq!(batch.summary().resolved, 2);
        assert_eq!(batch.summary().unresolved, 1);
    }

    #[test]
    fn transfer_confirm_and_revert_round_trip() {
        let stores = MemoryStores::with_bank_account();
        let mut batch = batch_from_csv("2024/03/01,みずほ銀行 振込,-20000\n", &stores);
        let row_id = batch.rows[0].row_id.clone();
        assert_eq!(batch.rows[0].status, DraftStatus::TransferCandidate);

        batch.confirm_transfer(&row_id, "acc_cash").expect("confirm");
        assert_eq!(batch.rows[0].status, DraftStatus::TransferConfirmed);
        let pair_id = batch.rows[0].transfer_id.clone();
        assert!(pair_id.is_some());

        batch.revert_transfer(&row_id).expect("revert");
        assert_eq!(batch.rows[0].status, DraftStatus::TransferCandidate);
        assert!(batch.rows[0].counter_account_id.is_none());
    }

    #[test]
    fn relabel_clears_transfer_fields_and_rederives_type() {
        let stores = MemoryStores::with_bank_account();
        let mut batch = batch_from_csv("2024/03/01,PayPayチャージ,-5000\n", &stores);
        let row_id = batch.rows[0].row_id.clone();
        batch.relabel_as_regular(&row_id, "cat_misc").expect("relabel");
        let row = batch.row(&row_id).expect("row");
        assert_eq!(row.status, DraftStatus::Resolved);
        assert!(row.transfer_reason.is_none());
        assert!(row.transfer_id.is_none());
    }

    #[test]
    fn terminal_rows_reject_review_actions() {
        let stores = MemoryStores::with_bank_account();
        let mut batch = batch_from_csv(
            "2024/02/01,Coffee,-500,memo\n2024/02/01,Coffee,-500,memo\n",
            &stores,
        );
        let duplicate_id = batch.rows[1].row_id.clone();
        let error = batch
            .assign_category(&duplicate_id, "cat_dining")
            .err()
            .expect("error");
        assert_eq!(error.code, "invalid_argument");
    }

    #[test]
    fn fallback_resolution_creates_the_other_bucket_once() {
        let mut stores = MemoryStores::with_bank_account();
        let mut batch = batch_from_csv("2024/02/01,Coffee,-500\n2024/02/02,Bakery,-300\n", &stores);
        let moved = resolve_unresolved_to_fallback(&mut batch, &mut stores).expect("fallback");
        assert_eq!(moved, 2);
        assert_eq!(batch.summary().resolved, 2);
        assert_eq!(
            stores
                .categories
                .iter()
                .filter(|category| category.name == "その他")
                .count(),
            1
        );
        assert_eq!(batch.rows[0].provenance(), Provenance::ImportedDefault);
    }

    #[test]
    fn ai_updates_never_overwrite_reviewer_actions() {
        let stores = MemoryStores::with_bank_account();
        let mut batch = batch_from_csv("2024/02/01,Coffee,-500\n", &stores);
        let row_id = batch.rows[0].row_id.clone();
        batch.assign_category(&row_id, "cat_dining").expect("assign");
        assert!(!batch.apply_ai_update(&row_id, "cat_other", "looks like dining"));
        assert_eq!(
            batch.row(&row_id).expect("row").final_category_id.as_deref(),
            Some("cat_dining")
        );
    }
}
