use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ClientError, ClientResult};
use crate::import::classify::match_category_name;
use crate::migrations;
use crate::model::{
    prefixed_id, Account, Category, ClassificationRule, ImportHistory, LedgerTransaction,
    TransactionType,
};
use crate::state::{
    ensure_ledger_directory, ledger_db_path, map_sqlite_error, open_connection,
    resolve_ledger_home,
};
use crate::stores::{AccountStore, LedgerStore, RuleStore};

/// The persisted ledger, backed by one SQLite file under the ledger
/// home directory.
pub struct SqliteLedger {
    connection: Connection,
    db_path: PathBuf,
}

impl SqliteLedger {
    /// Opens (and bootstraps, if needed) the ledger at the resolved
    /// home. `home_override` beats the `KAKEIBO_HOME` environment
    /// variable, which beats `~/.kakeibo`.
    pub fn open(home_override: Option<&Path>) -> ClientResult<Self> {
        let home = resolve_ledger_home(home_override)?;
        ensure_ledger_directory(&home)?;
        let db_path = ledger_db_path(&home);
        let mut connection = open_connection(&db_path)?;
        migrations::run_pending(&mut connection)
            .map_err(|error| ClientError::migration_failed(&db_path, &error.to_string()))?;
        Ok(Self {
            connection,
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn map(&self, error: rusqlite::Error) -> ClientError {
        map_sqlite_error(&self.db_path, &error)
    }

    pub fn create_account(&mut self, name: &str, is_cash: bool) -> ClientResult<Account> {
        let account = Account {
            account_id: prefixed_id("acc"),
            name: name.to_string(),
            is_cash,
            is_active: true,
        };
        self.connection
            .execute(
                "INSERT INTO accounts (account_id, name, is_cash, is_active, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![
                    &account.account_id,
                    &account.name,
                    account.is_cash as i64,
                    now_timestamp()
                ],
            )
            .map_err(|error| self.map(error))?;
        Ok(account)
    }

    pub fn create_rule(
        &mut self,
        keyword: &str,
        target_category_id: &str,
        txn_type: TransactionType,
        priority: i64,
    ) -> ClientResult<ClassificationRule> {
        let exists: Option<String> = self
            .connection
            .query_row(
                "SELECT category_id FROM categories WHERE category_id = ?1",
                params![target_category_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| self.map(error))?;
        if exists.is_none() {
            return Err(ClientError::category_not_found(target_category_id));
        }

        let rule = ClassificationRule {
            rule_id: prefixed_id("rule"),
            keyword: keyword.to_string(),
            target_category_id: target_category_id.to_string(),
            txn_type,
            enabled: true,
            priority,
        };
        self.connection
            .execute(
                "INSERT INTO classification_rules (
                    rule_id, keyword, target_category_id, txn_type, enabled, priority, created_at
                 ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
                params![
                    &rule.rule_id,
                    &rule.keyword,
                    &rule.target_category_id,
                    rule.txn_type.as_str(),
                    rule.priority,
                    now_timestamp()
                ],
            )
            .map_err(|error| self.map(error))?;
        Ok(rule)
    }

    pub fn all_rules(&self) -> ClientResult<Vec<ClassificationRule>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT rule_id, keyword, target_category_id, txn_type, enabled, priority
                 FROM classification_rules
                 ORDER BY priority DESC, created_at",
            )
            .map_err(|error| self.map(error))?;
        let rows = statement
            .query_map([], rule_from_row)
            .map_err(|error| self.map(error))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(rows)
    }

    /// Everything one commit wrote, in insertion order.
    pub fn transactions_for_import(&self, import_id: &str) -> ClientResult<Vec<LedgerTransaction>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT txn_id, import_id, transfer_id, posted_on, txn_type, amount,
                        category_id, account_id, counter_account_id, description, memo,
                        provenance, fingerprint, source_hash
                 FROM transactions WHERE import_id = ?1 ORDER BY created_at, txn_id",
            )
            .map_err(|error| self.map(error))?;
        let rows = statement
            .query_map(params![import_id], transaction_from_row)
            .map_err(|error| self.map(error))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(rows)
    }

    pub fn all_categories(&self) -> ClientResult<Vec<Category>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT category_id, name, txn_type FROM categories ORDER BY txn_type, name",
            )
            .map_err(|error| self.map(error))?;
        let rows = statement
            .query_map([], category_from_row)
            .map_err(|error| self.map(error))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(rows)
    }
}

impl LedgerStore for SqliteLedger {
    fn existing_fingerprints(&self) -> ClientResult<HashSet<String>> {
        let mut statement = self
            .connection
            .prepare("SELECT fingerprint FROM transactions WHERE fingerprint IS NOT NULL")
            .map_err(|error| self.map(error))?;
        let keys = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|error| self.map(error))?
            .collect::<Result<HashSet<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(keys)
    }

    fn categories_for(&self, txn_type: TransactionType) -> ClientResult<Vec<Category>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT category_id, name, txn_type FROM categories
                 WHERE txn_type = ?1 ORDER BY name",
            )
            .map_err(|error| self.map(error))?;
        let rows = statement
            .query_map(params![txn_type.as_str()], category_from_row)
            .map_err(|error| self.map(error))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(rows)
    }

    fn find_or_create_category(
        &mut self,
        name: &str,
        txn_type: TransactionType,
    ) -> ClientResult<Category> {
        let existing = self.categories_for(txn_type)?;
        if let Some(found) = match_category_name(name, &existing) {
            return Ok(found.clone());
        }
        let category = Category {
            category_id: prefixed_id("cat"),
            name: name.to_string(),
            txn_type,
        };
        self.connection
            .execute(
                "INSERT INTO categories (category_id, name, txn_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    &category.category_id,
                    &category.name,
                    category.txn_type.as_str(),
                    now_timestamp()
                ],
            )
            .map_err(|error| self.map(error))?;
        Ok(category)
    }

    fn insert_transaction(&mut self, txn: &LedgerTransaction) -> ClientResult<()> {
        self.connection
            .execute(
                "INSERT INTO transactions (
                    txn_id, import_id, transfer_id, posted_on, txn_type, amount,
                    category_id, account_id, counter_account_id, description, memo,
                    provenance, fingerprint, source_hash, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    &txn.txn_id,
                    &txn.import_id,
                    &txn.transfer_id,
                    txn.posted_on.format("%Y-%m-%d").to_string(),
                    txn.txn_type.as_str(),
                    txn.amount,
                    &txn.category_id,
                    &txn.account_id,
                    &txn.counter_account_id,
                    &txn.description,
                    &txn.memo,
                    txn.provenance.as_str(),
                    &txn.fingerprint,
                    &txn.source_hash,
                    now_timestamp()
                ],
            )
            .map_err(|error| self.map(error))?;
        Ok(())
    }

    fn record_import_history(&mut self, history: &ImportHistory) -> ClientResult<()> {
        self.connection
            .execute(
                "INSERT INTO import_history (
                    import_id, file_name, source_hash, format, status, total_rows,
                    added, duplicates, skipped, transfer_pairs, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    &history.import_id,
                    &history.file_name,
                    &history.source_hash,
                    &history.format,
                    &history.status,
                    history.total_rows,
                    history.added,
                    history.duplicates,
                    history.skipped,
                    history.transfer_pairs,
                    now_timestamp()
                ],
            )
            .map_err(|error| self.map(error))?;
        Ok(())
    }

    fn find_import_history(&self, import_id: &str) -> ClientResult<Option<ImportHistory>> {
        self.connection
            .query_row(
                "SELECT import_id, file_name, source_hash, format, status, total_rows,
                        added, duplicates, skipped, transfer_pairs
                 FROM import_history WHERE import_id = ?1",
                params![import_id],
                history_from_row,
            )
            .optional()
            .map_err(|error| self.map(error))
    }

    fn list_import_history(&self, limit: i64) -> ClientResult<Vec<ImportHistory>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT import_id, file_name, source_hash, format, status, total_rows,
                        added, duplicates, skipped, transfer_pairs
                 FROM import_history ORDER BY created_at DESC, import_id DESC LIMIT ?1",
            )
            .map_err(|error| self.map(error))?;
        let rows = statement
            .query_map(params![limit], history_from_row)
            .map_err(|error| self.map(error))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(rows)
    }

    fn mark_import_reverted(&mut self, import_id: &str) -> ClientResult<()> {
        self.connection
            .execute(
                "UPDATE import_history SET status = 'reverted', reverted_at = ?1
                 WHERE import_id = ?2",
                params![now_timestamp(), import_id],
            )
            .map_err(|error| self.map(error))?;
        Ok(())
    }

    fn delete_transactions_by_import_id(&mut self, import_id: &str) -> ClientResult<i64> {
        let deleted = self
            .connection
            .execute(
                "DELETE FROM transactions WHERE import_id = ?1",
                params![import_id],
            )
            .map_err(|error| self.map(error))?;
        Ok(deleted as i64)
    }

    fn delete_transactions_by_source_hash(&mut self, source_hash: &str) -> ClientResult<i64> {
        let deleted = self
            .connection
            .execute(
                "DELETE FROM transactions WHERE source_hash = ?1 AND import_id IS NULL",
                params![source_hash],
            )
            .map_err(|error| self.map(error))?;
        Ok(deleted as i64)
    }
}

impl RuleStore for SqliteLedger {
    fn rules_for(&self, txn_type: TransactionType) -> ClientResult<Vec<ClassificationRule>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT rule_id, keyword, target_category_id, txn_type, enabled, priority
                 FROM classification_rules
                 WHERE txn_type = ?1 AND enabled = 1
                 ORDER BY priority DESC, created_at",
            )
            .map_err(|error| self.map(error))?;
        let rows = statement
            .query_map(params![txn_type.as_str()], rule_from_row)
            .map_err(|error| self.map(error))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(rows)
    }
}

impl AccountStore for SqliteLedger {
    fn active_accounts(&self) -> ClientResult<Vec<Account>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT account_id, name, is_cash, is_active FROM accounts
                 WHERE is_active = 1 ORDER BY name",
            )
            .map_err(|error| self.map(error))?;
        let rows = statement
            .query_map([], account_from_row)
            .map_err(|error| self.map(error))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| self.map(error))?;
        Ok(rows)
    }

    fn cash_account(&self) -> ClientResult<Option<Account>> {
        self.connection
            .query_row(
                "SELECT account_id, name, is_cash, is_active FROM accounts
                 WHERE is_cash = 1 AND is_active = 1
                 ORDER BY created_at LIMIT 1",
                [],
                account_from_row,
            )
            .optional()
            .map_err(|error| self.map(error))
    }
}

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    let type_text: String = row.get(2)?;
    Ok(Category {
        category_id: row.get(0)?,
        name: row.get(1)?,
        txn_type: parse_type(&type_text, 2)?,
    })
}

fn rule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClassificationRule> {
    let type_text: String = row.get(3)?;
    Ok(ClassificationRule {
        rule_id: row.get(0)?,
        keyword: row.get(1)?,
        target_category_id: row.get(2)?,
        txn_type: parse_type(&type_text, 3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        priority: row.get(5)?,
    })
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        account_id: row.get(0)?,
        name: row.get(1)?,
        is_cash: row.get::<_, i64>(2)? != 0,
        is_active: row.get::<_, i64>(3)? != 0,
    })
}

fn history_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportHistory> {
    Ok(ImportHistory {
        import_id: row.get(0)?,
        file_name: row.get(1)?,
        source_hash: row.get(2)?,
        format: row.get(3)?,
        status: row.get(4)?,
        total_rows: row.get(5)?,
        added: row.get(6)?,
        duplicates: row.get(7)?,
        skipped: row.get(8)?,
        transfer_pairs: row.get(9)?,
    })
}

fn transaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerTransaction> {
    let posted_on: String = row.get(3)?;
    let type_text: String = row.get(4)?;
    let provenance_text: String = row.get(11)?;
    Ok(LedgerTransaction {
        txn_id: row.get(0)?,
        import_id: row.get(1)?,
        transfer_id: row.get(2)?,
        posted_on: chrono::NaiveDate::parse_from_str(&posted_on, "%Y-%m-%d").map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                error.to_string().into(),
            )
        })?,
        txn_type: parse_type(&type_text, 4)?,
        amount: row.get(5)?,
        category_id: row.get(6)?,
        account_id: row.get(7)?,
        counter_account_id: row.get(8)?,
        description: row.get(9)?,
        memo: row.get(10)?,
        provenance: crate::model::Provenance::parse(&provenance_text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                11,
                rusqlite::types::Type::Text,
                format!("unknown provenance `{provenance_text}`").into(),
            )
        })?,
        fingerprint: row.get(12)?,
        source_hash: row.get(13)?,
    })
}

fn parse_type(text: &str, column: usize) -> rusqlite::Result<TransactionType> {
    TransactionType::parse(text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("unknown transaction type `{text}`").into(),
        )
    })
}

fn now_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => format!("{}", duration.as_secs()),
        Err(_) => "0".to_string(),
    }
}
