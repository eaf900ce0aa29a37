use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::import::draft::{DraftStatus, ImportBatch};
use crate::import::parse::AmountSign;
use crate::model::{Category, TransactionType};

/// Confidence below this leaves the row unresolved.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Rows sent per external call.
pub const MAX_BATCH_SIZE: usize = 25;

/// One unresolved row as presented to the external classifier. The
/// row id is opaque to the service and maps the answer back.
#[derive(Debug, Clone, Serialize)]
pub struct AiItem {
    pub id: String,
    pub date: String,
    pub direction: AmountSign,
    pub description: String,
    pub memo: String,
}

/// One classification proposal coming back from the service.
#[derive(Debug, Clone, Deserialize)]
pub struct AiUpdate {
    pub id: String,
    pub category_id: String,
    pub confidence: f64,
    pub rationale: String,
}

/// Outcome of one full classification run over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AiOutcome {
    pub applied: i64,
    pub skipped: i64,
    pub cancelled: bool,
}

/// Progress side-channel: which call out of how many is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiProgress {
    pub current_batch: usize,
    pub total_batches: usize,
}

/// Cooperative cancellation flag shared between the review loop and a
/// classification run. Safe to trip at any point; results of the
/// in-flight call are discarded, already-applied updates stay.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The external classifier boundary. The pipeline's correctness does
/// not depend on which implementation sits behind it.
pub trait AiClassifier {
    fn classify(&self, items: &[AiItem], categories: &[Category]) -> ClientResult<Vec<AiUpdate>>;
}

/// Runs the external classifier over every unresolved, non-transfer
/// row of the batch and applies confidence-gated updates.
///
/// A service failure aborts the current call only; rows already
/// classified by earlier calls keep their category. Malformed or
/// below-threshold answers count as skipped.
pub fn classify_unresolved(
    batch: &mut ImportBatch,
    classifier: &dyn AiClassifier,
    categories: &[Category],
    cancel: &CancelToken,
    progress: Option<&Sender<AiProgress>>,
) -> ClientResult<AiOutcome> {
    let items: Vec<AiItem> = batch
        .rows
        .iter()
        .filter(|row| {
            row.status == DraftStatus::Unresolved
                && row.candidate.txn_type != TransactionType::Transfer
        })
        .map(|row| AiItem {
            id: row.row_id.clone(),
            date: row.candidate.date.format("%Y-%m-%d").to_string(),
            direction: row.candidate.sign,
            description: row.candidate.description.clone(),
            memo: row.candidate.memo.clone(),
        })
        .collect();

    let mut outcome = AiOutcome::default();
    if items.is_empty() {
        return Ok(outcome);
    }

    let total_batches = items.len().div_ceil(MAX_BATCH_SIZE);
    for (index, chunk) in items.chunks(MAX_BATCH_SIZE).enumerate() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            return Ok(outcome);
        }
        if let Some(sender) = progress {
            // The receiver may be gone; progress is best-effort.
            let _ = sender.send(AiProgress {
                current_batch: index + 1,
                total_batches,
            });
        }

        let updates = classifier.classify(chunk, categories)?;
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            return Ok(outcome);
        }

        let mut answered = std::collections::HashSet::new();
        for update in updates {
            answered.insert(update.id.clone());
            let acceptable = update.confidence >= CONFIDENCE_THRESHOLD
                && categories
                    .iter()
                    .any(|category| category.category_id == update.category_id);
            if acceptable
                && batch.apply_ai_update(&update.id, &update.category_id, &update.rationale)
            {
                outcome.applied += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        outcome.skipped += chunk
            .iter()
            .filter(|item| !answered.contains(&item.id))
            .count() as i64;
    }

    Ok(outcome)
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    items: &'a [AiItem],
    categories: Vec<CategoryHint<'a>>,
}

#[derive(Serialize)]
struct CategoryHint<'a> {
    category_id: &'a str,
    name: &'a str,
    txn_type: TransactionType,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    results: Vec<AiUpdate>,
    #[serde(default)]
    refusal: Option<String>,
}

/// HTTP-backed classifier. Blocking; the caller decides which thread
/// it runs on.
pub struct HttpClassifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClientError::ai_network(&error.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }
}

impl AiClassifier for HttpClassifier {
    fn classify(&self, items: &[AiItem], categories: &[Category]) -> ClientResult<Vec<AiUpdate>> {
        let request = ClassifyRequest {
            items,
            categories: categories
                .iter()
                .map(|category| CategoryHint {
                    category_id: &category.category_id,
                    name: &category.name,
                    txn_type: category.txn_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|error| {
                if error.is_timeout() {
                    ClientError::ai_timeout(self.timeout.as_secs())
                } else {
                    ClientError::ai_network(&error.to_string())
                }
            })?;

        match response.status().as_u16() {
            401 | 403 => return Err(ClientError::ai_unauthorized()),
            429 => return Err(ClientError::ai_rate_limited()),
            status if status >= 400 => {
                return Err(ClientError::ai_network(&format!(
                    "classifier returned HTTP {status}"
                )))
            }
            _ => {}
        }

        let body: ClassifyResponse = response
            .json()
            .map_err(|error| ClientError::ai_invalid_response(&error.to_string()))?;
        if let Some(refusal) = body.refusal {
            return Err(ClientError::ai_refusal(&refusal));
        }
        Ok(body.results)
    }
}
