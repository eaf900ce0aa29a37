//! CSV import pipeline: raw export bytes in, reviewable draft batch
//! out, committed ledger transactions at the end.
//!
//! Stages run in a fixed order per file: decode and tokenize, detect
//! the source format, resolve columns, parse rows, then per row
//! classify, transfer-flag, and fingerprint into a [`draft::ImportBatch`]
//! that the reviewer (or the AI adapter) drives to a commit.

pub mod ai;
pub mod classify;
pub mod columns;
pub mod commit;
pub mod dedupe;
pub mod detect;
pub mod draft;
pub mod input;
pub mod parse;
pub mod transfer;
pub mod undo;

pub use ai::{classify_unresolved, AiClassifier, AiOutcome, AiProgress, CancelToken};
pub use columns::ManualColumnMap;
pub use commit::commit_batch;
pub use detect::SourceFormat;
pub use draft::{
    build_batch, resolve_unresolved_to_fallback, BatchSummary, DraftRow, DraftStatus, ImportBatch,
    ImportRequest,
};
pub use undo::{undo_import, UndoResult};
