use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS, UTF_16BE, UTF_16LE, UTF_8};
use sha2::{Digest, Sha256};

use crate::{ClientError, ClientResult};

/// One tokenized CSV row: an ordered sequence of string cells.
pub type RawRow = Vec<String>;

/// Decodes raw file bytes into LF-separated comma-delimited text.
///
/// Encoding probe order is fixed: UTF-8, UTF-16 (BOM), Shift-JIS,
/// EUC-JP; the first encoding that decodes without error wins. A
/// leading BOM is stripped, CRLF/CR become LF, and a tab-delimited
/// file with no commas is rewritten to comma-delimited.
pub fn decode_source(bytes: &[u8], file_name: &str) -> ClientResult<String> {
    if bytes.is_empty() {
        return Err(ClientError::empty_source(file_name));
    }

    let text = probe_encodings(bytes)
        .ok_or_else(|| ClientError::unsupported_encoding(file_name))?;

    let mut text = text.trim_start_matches('\u{feff}').to_string();
    text = text.replace("\r\n", "\n").replace('\r', "\n");

    if !text.contains(',') && text.contains('\t') {
        text = text.replace('\t', ",");
    }

    Ok(text)
}

fn probe_encodings(bytes: &[u8]) -> Option<String> {
    let probe_order: &[&'static Encoding] = if bytes.starts_with(&[0xFF, 0xFE]) {
        &[UTF_16LE]
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        &[UTF_16BE]
    } else {
        &[UTF_8, SHIFT_JIS, EUC_JP]
    };

    for encoding in probe_order {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Some(decoded.into_owned());
        }
    }
    None
}

/// Tokenizes decoded text into the raw row matrix. RFC-4180 quoting:
/// double-quote escapes, embedded delimiters and newlines inside
/// quotes. Rows may have varying widths in malformed exports, so the
/// reader is flexible and header handling is left to the caller.
pub fn tokenize(text: &str) -> ClientResult<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| {
            ClientError::invalid_argument_with_recovery(
                &format!("CSV structure is malformed: {error}"),
                vec!["Check the file for unbalanced quotes and retry.".to_string()],
            )
        })?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

/// Content hash recorded in import history; also the legacy undo key
/// for transactions imported before import ids existed.
pub fn source_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
