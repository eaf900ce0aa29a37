use crate::error::{ClientError, ClientResult};
use crate::stores::LedgerStore;

/// What a bulk undo removed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UndoResult {
    pub import_id: String,
    pub deleted_count: i64,
    /// True when deletion matched on the legacy per-row source hash
    /// because no transaction carried this import id.
    pub used_legacy_fallback: bool,
}

/// Reverts one committed import: deletes every transaction tagged with
/// its id and marks the history record reverted. Imports committed
/// before ids were tagged onto rows fall back to source-hash matching.
pub fn undo_import(ledger: &mut dyn LedgerStore, import_id: &str) -> ClientResult<UndoResult> {
    let history = ledger
        .find_import_history(import_id)?
        .ok_or_else(|| ClientError::import_id_not_found(import_id))?;
    if history.status == "reverted" {
        return Err(ClientError::import_already_reverted(import_id));
    }

    let mut deleted = ledger.delete_transactions_by_import_id(import_id)?;
    let mut used_legacy_fallback = false;
    if deleted == 0 {
        deleted = ledger.delete_transactions_by_source_hash(&history.source_hash)?;
        used_legacy_fallback = deleted > 0;
    }

    ledger.mark_import_reverted(import_id)?;
    Ok(UndoResult {
        import_id: import_id.to_string(),
        deleted_count: deleted,
        used_legacy_fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::undo_import;
    use crate::import::commit::commit_batch;
    use crate::import::draft::tests::{batch_from_csv, MemoryStores};
    use crate::model::{Category, ClassificationRule, TransactionType};

    fn committed_stores() -> (MemoryStores, String) {
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
        let mut batch = batch_from_csv(
            "2024/02/01,Coffee,-500\n2024/01/15,ｶ-ﾄﾞ ATM,-3000\n",
            &stores,
        );
        let result = commit_batch(&mut batch, &mut stores).expect("commit");
        (stores, result.import_id)
    }

    #[test]
    fn undo_deletes_every_row_of_the_import() {
        let (mut stores, import_id) = committed_stores();
        assert_eq!(stores.inserted.len(), 3);

        let result = undo_import(&mut stores, &import_id).expect("undo");
        assert_eq!(result.deleted_count, 3);
        assert!(!result.used_legacy_fallback);
        assert!(stores.inserted.is_empty());
        assert_eq!(stores.history[0].status, "reverted");
    }

    #[test]
    fn a_reverted_import_cannot_be_undone_twice() {
        let (mut stores, import_id) = committed_stores();
        undo_import(&mut stores, &import_id).expect("undo");
        let error = undo_import(&mut stores, &import_id).err().expect("error");
        assert_eq!(error.code, "import_already_reverted");
    }

    #[test]
    fn unknown_import_ids_are_reported() {
        let (mut stores, _) = committed_stores();
        let error = undo_import(&mut stores, "imp_missing").err().expect("error");
        assert_eq!(error.code, "import_id_not_found");
    }

    #[test]
    fn legacy_rows_fall_back_to_source_hash_matching() {
        let (mut stores, import_id) = committed_stores();
        // Strip the import tag the way pre-tagging commits stored rows.
        for txn in &mut stores.inserted {
            txn.import_id = None;
        }

        let result = undo_import(&mut stores, &import_id).expect("undo");
        assert_eq!(result.deleted_count, 3);
        assert!(result.used_legacy_fallback);
        assert!(stores.inserted.is_empty());
    }
}
