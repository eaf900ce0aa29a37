use crate::error::{ClientError, ClientResult};
use crate::import::draft::{DraftStatus, ImportBatch};
use crate::import::parse::AmountSign;
use crate::model::{
    prefixed_id, CommitResult, ImportHistory, LedgerTransaction, TransactionType,
};
use crate::stores::LedgerStore;

/// Materializes a fully reviewed batch into the ledger.
///
/// One `import_id` covers the whole commit; transfer-confirmed rows
/// become two reciprocal transactions sharing a `transfer_id`. Both
/// ids were generated while drafting, so a retry after a storage
/// failure re-uses them and the per-row committed flags, never
/// re-inserting rows that already landed.
pub fn commit_batch(
    batch: &mut ImportBatch,
    ledger: &mut dyn LedgerStore,
) -> ClientResult<CommitResult> {
    if batch.committed {
        return Err(ClientError::import_already_committed());
    }
    if batch.commit_in_progress {
        return Err(ClientError::commit_in_progress());
    }

    let summary = batch.summary();
    if summary.unresolved > 0 || summary.transfer_candidates > 0 {
        return Err(ClientError::commit_blocked(&format!(
            "{} unresolved row(s) and {} unconfirmed transfer(s) remain",
            summary.unresolved, summary.transfer_candidates
        )));
    }

    batch.commit_in_progress = true;
    let result = write_rows(batch, ledger);
    batch.commit_in_progress = false;

    let added_transaction_ids = result?;
    let transfer_pair_count = batch
        .rows
        .iter()
        .filter(|row| row.status == DraftStatus::TransferConfirmed)
        .count() as i64;

    let commit_result = CommitResult {
        import_id: batch.import_id.clone(),
        total_rows: summary.total_rows,
        added_count: added_transaction_ids.len() as i64,
        duplicate_count: summary.duplicates,
        skipped_count: summary.invalid,
        transfer_pair_count,
        added_transaction_ids,
    };

    ledger.record_import_history(&ImportHistory {
        import_id: commit_result.import_id.clone(),
        file_name: batch.file_name.clone(),
        source_hash: batch.source_hash.clone(),
        format: batch.format.as_str().to_string(),
        status: "committed".to_string(),
        total_rows: commit_result.total_rows,
        added: commit_result.added_count,
        duplicates: commit_result.duplicate_count,
        skipped: commit_result.skipped_count,
        transfer_pairs: commit_result.transfer_pair_count,
    })?;
    batch.committed = true;

    Ok(commit_result)
}

fn write_rows(batch: &mut ImportBatch, ledger: &mut dyn LedgerStore) -> ClientResult<Vec<String>> {
    let mut added = Vec::new();
    let import_id = batch.import_id.clone();
    let primary = batch.primary_account_id.clone();
    let source_hash = batch.source_hash.clone();

    for row in &mut batch.rows {
        if row.committed {
            continue;
        }
        match row.status {
            DraftStatus::Resolved => {
                let category_id = row.effective_category_id().map(str::to_string);
                let txn = LedgerTransaction {
                    txn_id: prefixed_id("txn"),
                    import_id: Some(import_id.clone()),
                    transfer_id: None,
                    posted_on: row.candidate.date,
                    txn_type: row.candidate.txn_type,
                    amount: row.candidate.amount,
                    category_id,
                    account_id: primary.clone(),
                    counter_account_id: None,
                    description: row.candidate.description.clone(),
                    memo: row.candidate.memo.clone(),
                    provenance: row.provenance(),
                    fingerprint: Some(row.fingerprint.clone()),
                    source_hash: Some(source_hash.clone()),
                };
                ledger.insert_transaction(&txn)?;
                row.committed = true;
                added.push(txn.txn_id);
            }
            DraftStatus::TransferConfirmed => {
                let counter = row.counter_account_id.clone().ok_or_else(|| {
                    ClientError::invalid_argument(
                        "confirmed transfer row is missing its counter-account",
                    )
                })?;
                let pair_id = match &row.transfer_id {
                    Some(id) => id.clone(),
                    None => {
                        let id = prefixed_id("tfr");
                        row.transfer_id = Some(id.clone());
                        id
                    }
                };

                // The first leg sits on the account money leaves.
                let (source, destination) = match row.candidate.sign {
                    AmountSign::Outflow => (primary.clone(), counter),
                    AmountSign::Inflow => (counter, primary.clone()),
                };
                let legs = [
                    (source.clone(), destination.clone(), Some(row.fingerprint.clone())),
                    (destination, source, None),
                ];
                // Legs land one insert at a time; each is recorded on
                // the row as it lands so a retry after a mid-pair
                // failure writes only the missing leg.
                for (leg_index, (account_id, counter_account_id, fingerprint)) in
                    legs.into_iter().enumerate()
                {
                    if leg_index < row.committed_leg_ids.len() {
                        continue;
                    }
                    let txn = LedgerTransaction {
                        txn_id: prefixed_id("txn"),
                        import_id: Some(import_id.clone()),
                        transfer_id: Some(pair_id.clone()),
                        posted_on: row.candidate.date,
                        txn_type: TransactionType::Transfer,
                        amount: row.candidate.amount,
                        category_id: None,
                        account_id,
                        counter_account_id: Some(counter_account_id),
                        description: row.candidate.description.clone(),
                        memo: row.candidate.memo.clone(),
                        provenance: row.provenance(),
                        fingerprint,
                        source_hash: Some(source_hash.clone()),
                    };
                    ledger.insert_transaction(&txn)?;
                    row.committed_leg_ids.push(txn.txn_id.clone());
                    added.push(txn.txn_id);
                }
                row.committed = true;
            }
            DraftStatus::Duplicate => {}
            // Blocked statuses were rejected before writing started.
            DraftStatus::Unresolved | DraftStatus::TransferCandidate => {}
        }
    }

    Ok(added)
}
