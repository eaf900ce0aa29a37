use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::TransactionType;
use crate::normalize::normalize;

/// Builds the duplicate-detection key for one candidate. Two rows with
/// the same fingerprint are the same transaction as far as re-import
/// is concerned.
///
/// The date is day-truncated, category and memo are normalized, and
/// transfers fold both account identifiers in so the two legs of a
/// pair fingerprint differently from a lone transaction.
pub fn fingerprint(
    date: NaiveDate,
    txn_type: TransactionType,
    amount: i64,
    category_name: &str,
    memo: &str,
    account_id: Option<&str>,
    counter_account_id: Option<&str>,
) -> String {
    let mut key = format!(
        "{}|{}|{}|{}|{}",
        date.format("%Y-%m-%d"),
        txn_type.as_str(),
        amount,
        normalize(category_name),
        normalize(memo),
    );
    if txn_type == TransactionType::Transfer {
        key.push('|');
        key.push_str(account_id.unwrap_or(""));
        key.push('|');
        key.push_str(counter_account_id.unwrap_or(""));
    } else if let Some(account) = account_id {
        key.push('|');
        key.push_str(account);
    }
    key
}

/// Ordered duplicate check over one batch: rows are tested against the
/// ledger snapshot and against fingerprints accepted earlier in the
/// same file. Not safe to drive from multiple threads; callers fold
/// over rows in file order.
#[derive(Debug)]
pub struct DuplicateChecker {
    ledger: HashSet<String>,
    accepted: HashSet<String>,
}

impl DuplicateChecker {
    pub fn new(ledger: HashSet<String>) -> Self {
        Self {
            ledger,
            accepted: HashSet::new(),
        }
    }

    /// Returns true when the fingerprint is already taken; otherwise
    /// accepts it for the remainder of the batch.
    pub fn check_and_accept(&mut self, fingerprint: &str) -> bool {
        if self.ledger.contains(fingerprint) || self.accepted.contains(fingerprint) {
            return true;
        }
        self.accepted.insert(fingerprint.to_string());
        false
    }
}
