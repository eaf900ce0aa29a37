use kakeibo_core::import::{
    build_batch, commit_batch, resolve_unresolved_to_fallback, DraftStatus, ImportBatch,
    ImportRequest, SourceFormat,
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
fn unparseable_rows_are_reported_with_their_line_numbers() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);

    let batch = batch_for(
        &ledger,
        b"2024/03/01,Coffee Lab,-500\n2024/03/02,Lunch,not-a-number\n",
        SourceFormat::BankGeneric,
        &account_id,
    );

    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].source_row_index, 2);

    let summary = batch.summary();
    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.resolved, 1);
}

#[test]
fn repeated_rows_within_one_file_collapse_to_a_single_transaction() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);

    let mut batch = batch_for(
        &ledger,
        b"2024/03/05,Coffee Lab,-500\n2024/03/05,Coffee Lab,-500\n",
        SourceFormat::BankGeneric,
        &account_id,
    );
    assert_eq!(batch.rows[0].status, DraftStatus::Resolved);
    assert_eq!(batch.rows[1].status, DraftStatus::Duplicate);

    let result = commit_batch(&mut batch, &mut ledger).expect("commit");
    assert_eq!(result.added_count, 1);
    assert_eq!(result.duplicate_count, 1);
}

#[test]
fn wallet_charge_needs_confirmation_before_committing_as_a_pair() {
    let (_home, mut ledger) = temp_ledger();
    let bank_id = seed(&mut ledger);
    let wallet = ledger.create_account("PayPay", false).expect("wallet");

    let mut batch = batch_for(
        &ledger,
        "2024/04/01 12:00:00,ﾁｬｰｼﾞ ｾﾌﾞﾝ銀行,,5000\n".as_bytes(),
        SourceFormat::PayPay,
        &wallet.account_id,
    );
    assert_eq!(batch.rows[0].status, DraftStatus::TransferCandidate);

    // Candidates block the commit until the reviewer decides.
    let blocked = commit_batch(&mut batch, &mut ledger).err().expect("blocked");
    assert_eq!(blocked.code, "commit_blocked");

    let row_id = batch.rows[0].row_id.clone();
    batch.confirm_transfer(&row_id, &bank_id).expect("confirm");
    assert_eq!(batch.rows[0].status, DraftStatus::TransferConfirmed);

    let result = commit_batch(&mut batch, &mut ledger).expect("commit");
    assert_eq!(result.transfer_pair_count, 1);

    let written = ledger
        .transactions_for_import(&result.import_id)
        .expect("read back");
    assert_eq!(written.len(), 2);
    // Money flowed into the wallet, so the bank is the source leg.
    let wallet_leg = written
        .iter()
        .find(|txn| txn.account_id == wallet.account_id)
        .expect("wallet leg");
    assert_eq!(wallet_leg.counter_account_id.as_deref(), Some(bank_id.as_str()));
}

#[test]
fn relabelling_a_candidate_restores_the_signed_transaction_type() {
    let (_home, mut ledger) = temp_ledger();
    seed(&mut ledger);
    let wallet = ledger.create_account("PayPay", false).expect("wallet");
    let income = ledger
        .find_or_create_category("還元", TransactionType::Income)
        .expect("category");

    let mut batch = batch_for(
        &ledger,
        "2024/04/02,ﾁｬｰｼﾞ ﾎﾞｰﾅｽ,,300\n".as_bytes(),
        SourceFormat::PayPay,
        &wallet.account_id,
    );
    assert_eq!(batch.rows[0].status, DraftStatus::TransferCandidate);
    assert_eq!(batch.rows[0].candidate.txn_type, TransactionType::Transfer);

    let row_id = batch.rows[0].row_id.clone();
    batch
        .relabel_as_regular(&row_id, &income.category_id)
        .expect("relabel");
    assert_eq!(batch.rows[0].status, DraftStatus::Resolved);
    assert_eq!(batch.rows[0].candidate.txn_type, TransactionType::Income);
    assert!(batch.rows[0].transfer_reason.is_none());

    let result = commit_batch(&mut batch, &mut ledger).expect("commit");
    let written = ledger
        .transactions_for_import(&result.import_id)
        .expect("read back");
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].txn_type, TransactionType::Income);
    assert_eq!(written[0].provenance, Provenance::Manual);
}

#[test]
fn manual_assignment_overrides_the_suggestion_and_commits_as_manual() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);
    let groceries = ledger
        .find_or_create_category("食費", TransactionType::Expense)
        .expect("category");

    let mut batch = batch_for(
        &ledger,
        b"2024/05/01,Coffee Lab,-500\n",
        SourceFormat::BankGeneric,
        &account_id,
    );
    assert_eq!(batch.rows[0].status, DraftStatus::Resolved);
    assert!(batch.rows[0].suggested_category_id.is_some());

    let row_id = batch.rows[0].row_id.clone();
    batch
        .assign_category(&row_id, &groceries.category_id)
        .expect("assign");

    let result = commit_batch(&mut batch, &mut ledger).expect("commit");
    let written = ledger
        .transactions_for_import(&result.import_id)
        .expect("read back");
    assert_eq!(written[0].category_id.as_deref(), Some(groceries.category_id.as_str()));
    assert_eq!(written[0].provenance, Provenance::Manual);
}

#[test]
fn bulk_assignment_resolves_every_matching_unresolved_row() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);
    let groceries = ledger
        .find_or_create_category("食費", TransactionType::Expense)
        .expect("category");

    let mut batch = batch_for(
        &ledger,
        "2024/05/01,ﾏﾙｴﾂ,-1200\n2024/05/08,ﾏﾙｴﾂ,-900\n2024/05/09,謎の店,-400\n".as_bytes(),
        SourceFormat::BankGeneric,
        &account_id,
    );
    assert!(batch
        .rows
        .iter()
        .all(|row| row.status == DraftStatus::Unresolved));

    // Half-width matches the full-width spelling after normalization.
    let moved = batch.assign_category_bulk("マルエツ", &groceries.category_id);
    assert_eq!(moved, 2);
    assert_eq!(batch.summary().unresolved, 1);
}

#[test]
fn unresolved_rows_block_the_commit_until_resolved_or_defaulted() {
    let (_home, mut ledger) = temp_ledger();
    let account_id = seed(&mut ledger);

    let mut batch = batch_for(
        &ledger,
        "2024/05/01,謎の店,-1200\n".as_bytes(),
        SourceFormat::BankGeneric,
        &account_id,
    );
    assert_eq!(batch.rows[0].status, DraftStatus::Unresolved);

    let blocked = commit_batch(&mut batch, &mut ledger).err().expect("blocked");
    assert_eq!(blocked.code, "commit_blocked");

    let moved = resolve_unresolved_to_fallback(&mut batch, &mut ledger).expect("fallback");
    assert_eq!(moved, 1);

    let result = commit_batch(&mut batch, &mut ledger).expect("commit");
    let written = ledger
        .transactions_for_import(&result.import_id)
        .expect("read back");
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].provenance, Provenance::ImportedDefault);

    let fallback = ledger
        .find_or_create_category("その他", TransactionType::Expense)
        .expect("category");
    assert_eq!(written[0].category_id.as_deref(), Some(fallback.category_id.as_str()));
}
