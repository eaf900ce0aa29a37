use kakeibo_core::import::{
    build_batch, commit_batch, undo_import, DraftStatus, ImportBatch, ImportRequest, SourceFormat,
};
use kakeibo_core::model::{Provenance, TransactionType};
use kakeibo_core::stores::LedgerStore;
use kakeibo_core::SqliteLedger;
use tempfile::TempDir;

fn temp_ledger() -> (TempDir, SqliteLedger) {
    let home = tempfile::tempdir().expect("tempdir");
    let ledger = SqliteLedger::open(Some(home.path())).expect("open ledger");
    (home, ledger)
}

/// Creates a bank account plus one coffee rule so classification has
/// something to match.
fn seed(ledger: &mut SqliteLedger) -> String {
    let account = ledger.create_account("みずほ銀行", false).expect("account");
    let dining = ledger
        .find_or_create_category("外食", TransactionType::Expense)
        .expect("category");
    ledger
        .create_rule("COFFEE", &dining.category_id, TransactionType::Expense, 10)
        .expect("rule");
    account.account_id
}

fn batch_for(
    ledger: &SqliteLedger,
    bytes: &[u8],
    format: SourceFormat,
    account_id: &str,
) -> ImportBatch {
    build_batch(
        ImportRequest {
            bytes,
            file_name: "export.csv",
            declared_format: format,
            primary_account_id: account_id,
            manual_columns: None,
        },
        ledger,
        ledger,
        ledger,
    )
    .expect("batch")
}

#[test]
fn atm_row_commits_as_a_balanced_transfer_pair() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);

    let mut batch = batch_for(
        &ledger,
        "2024/01/15,ｶ-ﾄﾞ ATM,3000\n".as_bytes(),
        SourceFormat::BankGeneric,
        &account_id,
    );
    assert_eq!(batch.rows[0].status, DraftStatus::TransferConfirmed);
    assert_eq!(batch.rows[0].counter_account_id.as_deref(), Some("acc_cash"));

    let result = commit_batch(&mut batch, &mut ledger).expect("commit");
    assert_eq!(result.transfer_pair_count, 1);
    assert_eq!(result.added_count, 2);

    let written = ledger
        .transactions_for_import(&result.import_id)
        .expect("read back");
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].transfer_id, written[1].transfer_id);
    assert!(written[0].transfer_id.is_some());
    assert_eq!(written[0].amount, written[1].amount);
    assert_eq!(
        written[0].counter_account_id.as_deref(),
        Some(written[1].account_id.as_str())
    );
    assert_eq!(
        written[1].counter_account_id.as_deref(),
        Some(written[0].account_id.as_str())
    );
    assert!(written
        .iter()
        .all(|txn| txn.txn_type == TransactionType::Transfer));
}

#[test]
fn rule_matched_rows_commit_with_rule_provenance() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);

    let mut batch = batch_for(
        &ledger,
        b"2024/02/01,Coffee Lab,-500\n",
        SourceFormat::BankGeneric,
        &account_id,
    );
    assert_eq!(batch.rows[0].status, DraftStatus::Resolved);

    let result = commit_batch(&mut batch, &mut ledger).expect("commit");
    let written = ledger
        .transactions_for_import(&result.import_id)
        .expect("read back");
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].provenance, Provenance::Rule);
    assert_eq!(written[0].amount, 500);
    assert!(written[0].category_id.is_some());
    assert!(written[0].fingerprint.is_some());
}

#[test]
fn reimporting_the_same_file_adds_nothing() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);
    let csv = b"2024/02/01,Coffee Lab,-500\n2024/02/02,Coffee stand,-300\n";

    let mut first = batch_for(&ledger, csv, SourceFormat::BankGeneric, &account_id);
    let first_result = commit_batch(&mut first, &mut ledger).expect("first commit");
    assert_eq!(first_result.added_count, 2);

    let mut second = batch_for(&ledger, csv, SourceFormat::BankGeneric, &account_id);
    assert!(second
        .rows
        .iter()
        .all(|row| row.status == DraftStatus::Duplicate));

    let second_result = commit_batch(&mut second, &mut ledger).expect("second commit");
    assert_eq!(second_result.added_count, 0);
    assert_eq!(second_result.duplicate_count, 2);
    assert!(ledger
        .transactions_for_import(&second_result.import_id)
        .expect("read back")
        .is_empty());
}

#[test]
fn undo_deletes_the_import_and_unblocks_reimport() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);
    let csv = b"2024/02/01,Coffee Lab,-500\n";

    let mut batch = batch_for(&ledger, csv, SourceFormat::BankGeneric, &account_id);
    let result = commit_batch(&mut batch, &mut ledger).expect("commit");

    let undo = undo_import(&mut ledger, &result.import_id).expect("undo");
    assert_eq!(undo.deleted_count, 1);
    assert!(ledger
        .transactions_for_import(&result.import_id)
        .expect("read back")
        .is_empty());

    // The fingerprint left with the deleted row, so the same file
    // imports cleanly again.
    let mut again = batch_for(&ledger, csv, SourceFormat::BankGeneric, &account_id);
    assert_eq!(again.rows[0].status, DraftStatus::Resolved);
    let second = commit_batch(&mut again, &mut ledger).expect("recommit");
    assert_eq!(second.added_count, 1);
}

#[test]
fn import_history_is_listed_most_recent_first() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);

    let mut first = batch_for(
        &ledger,
        b"2024/02/01,Coffee Lab,-500\n",
        SourceFormat::BankGeneric,
        &account_id,
    );
    commit_batch(&mut first, &mut ledger).expect("commit");
    let mut second = batch_for(
        &ledger,
        b"2024/03/01,Coffee stand,-300\n",
        SourceFormat::BankGeneric,
        &account_id,
    );
    let second_result = commit_batch(&mut second, &mut ledger).expect("commit");

    let history = ledger.list_import_history(10).expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].import_id, second_result.import_id);
    assert_eq!(history[0].status, "committed");
}

#[test]
fn shift_jis_files_decode_transparently() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);

    // "2024/01/15,カード ATM,3000\n" encoded as Shift-JIS.
    let mut bytes = b"2024/01/15,".to_vec();
    bytes.extend_from_slice(&[0x83, 0x4A, 0x81, 0x5B, 0x83, 0x68]);
    bytes.extend_from_slice(b" ATM,3000\n");

    let batch = batch_for(&ledger, &bytes, SourceFormat::BankGeneric, &account_id);
    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.rows[0].candidate.description, "カード ATM");
    assert_eq!(batch.rows[0].status, DraftStatus::TransferConfirmed);
}
