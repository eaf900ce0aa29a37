use chrono::{NaiveDate, NaiveDateTime};

use crate::import::columns::{ColumnMap, ColumnMapError, Field};
use crate::import::detect::SourceFormat;
use crate::import::input::RawRow;
use crate::model::TransactionType;
use crate::normalize::normalize;

/// Display direction of a parsed row. Amounts themselves are always
/// positive; this records which side of the ledger the row came from
/// and, for transfers, which leg the primary account is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSign {
    Inflow,
    Outflow,
}

/// One canonical parse result for one raw row.
#[derive(Debug, Clone)]
pub struct ParsedCandidate {
    pub date: NaiveDate,
    pub amount: i64,
    pub txn_type: TransactionType,
    pub sign: AmountSign,
    pub description: String,
    pub memo: String,
    pub raw_category: Option<String>,
    pub source_row_index: i64,
    pub raw_row: RawRow,
}

/// A row that could not be parsed. Recovered locally: the row turns
/// `invalid` and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParseFailure {
    /// 1-based row number in the source file.
    pub source_row_index: i64,
    pub reason: String,
}

impl ParseFailure {
    fn new(source_row_index: i64, reason: impl Into<String>) -> Self {
        Self {
            source_row_index,
            reason: reason.into(),
        }
    }

    pub fn display(&self) -> String {
        format!("row {}: {}", self.source_row_index, self.reason)
    }
}

impl From<(i64, ColumnMapError)> for ParseFailure {
    fn from((row, error): (i64, ColumnMapError)) -> Self {
        match error {
            ColumnMapError::OutOfRange { field, index } => Self::new(
                row,
                format!(
                    "column `{}` resolves to index {index} beyond the row's width",
                    field.as_str()
                ),
            ),
        }
    }
}

/// Parses one raw row into a candidate. `Ok(None)` means the row is
/// silently skipped (blank, or a recognized totals row), neither a
/// candidate nor a failure.
pub fn parse_row(
    row: &RawRow,
    map: &ColumnMap,
    format: SourceFormat,
    source_row_index: i64,
) -> Result<Option<ParsedCandidate>, ParseFailure> {
    if row.iter().all(|cell| cell.trim().is_empty()) {
        return Ok(None);
    }

    match format {
        SourceFormat::AppExport => parse_app_export(row, map, source_row_index),
        SourceFormat::BankGeneric => parse_bank_generic(row, map, source_row_index),
        SourceFormat::CardGeneric => parse_card_generic(row, map, source_row_index),
        SourceFormat::AmazonCard => parse_amazon_card(row, map, source_row_index),
        SourceFormat::ResonaBank => {
            // Two incompatible historical layouts from one issuer:
            // the legacy fixed-column parse is attempted first, and
            // only a non-legacy shape falls back to the column map.
            match parse_resona_legacy(row, source_row_index) {
                Some(result) => result.map(Some),
                None => parse_bank_generic(row, map, source_row_index),
            }
        }
        SourceFormat::PayPay => parse_paypay(row, map, source_row_index),
    }
}

fn parse_app_export(
    row: &RawRow,
    map: &ColumnMap,
    index: i64,
) -> Result<Option<ParsedCandidate>, ParseFailure> {
    let date = required_date(row, map, index)?;
    let type_cell = cell(row, map, Field::Type, index)?.unwrap_or_default();
    let txn_type = parse_type_label(type_cell)
        .ok_or_else(|| ParseFailure::new(index, format!("unknown type label `{type_cell}`")))?;
    let amount_cell = cell(row, map, Field::Amount, index)?.unwrap_or_default();
    let amount = parse_yen(amount_cell)
        .ok_or_else(|| ParseFailure::new(index, format!("malformed amount `{amount_cell}`")))?;
    if amount == 0 {
        return Err(ParseFailure::new(index, "zero amount"));
    }

    let sign = match txn_type {
        TransactionType::Income => AmountSign::Inflow,
        _ => AmountSign::Outflow,
    };
    Ok(Some(ParsedCandidate {
        date,
        amount: amount.abs(),
        txn_type,
        sign,
        description: text_field(row, map, Field::Description, index)?,
        memo: text_field(row, map, Field::Memo, index)?,
        raw_category: optional_text(row, map, Field::Category, index)?,
        source_row_index: index,
        raw_row: row.clone(),
    }))
}

fn parse_bank_generic(
    row: &RawRow,
    map: &ColumnMap,
    index: i64,
) -> Result<Option<ParsedCandidate>, ParseFailure> {
    let date = required_date(row, map, index)?;
    let (amount, txn_type, sign) = directed_amount(row, map, index)?;

    Ok(Some(ParsedCandidate {
        date,
        amount,
        txn_type,
        sign,
        description: text_field(row, map, Field::Description, index)?,
        memo: text_field(row, map, Field::Memo, index)?,
        raw_category: optional_text(row, map, Field::Category, index)?,
        source_row_index: index,
        raw_row: row.clone(),
    }))
}

fn parse_card_generic(
    row: &RawRow,
    map: &ColumnMap,
    index: i64,
) -> Result<Option<ParsedCandidate>, ParseFailure> {
    let date = required_date(row, map, index)?;
    let amount_cell = cell(row, map, Field::Amount, index)?.unwrap_or_default();
    let amount = parse_yen(amount_cell)
        .ok_or_else(|| ParseFailure::new(index, format!("malformed amount `{amount_cell}`")))?;
    if amount == 0 {
        return Err(ParseFailure::new(index, "zero amount"));
    }

    // Card statements list charges as positive; a negative value is a
    // refund credited back to the holder.
    let (txn_type, sign) = if amount > 0 {
        (TransactionType::Expense, AmountSign::Outflow)
    } else {
        (TransactionType::Income, AmountSign::Inflow)
    };
    Ok(Some(ParsedCandidate {
        date,
        amount: amount.abs(),
        txn_type,
        sign,
        description: text_field(row, map, Field::Description, index)?,
        memo: text_field(row, map, Field::Memo, index)?,
        raw_category: optional_text(row, map, Field::Category, index)?,
        source_row_index: index,
        raw_row: row.clone(),
    }))
}

const AMAZON_MERCHANT_CANONICAL: &str = "Amazon.co.jp";

fn parse_amazon_card(
    row: &RawRow,
    map: &ColumnMap,
    index: i64,
) -> Result<Option<ParsedCandidate>, ParseFailure> {
    // Trailing totals/summary rows are recognized and skipped, not
    // reported as failures.
    if row
        .iter()
        .any(|value| {
            let folded = normalize(value);
            folded.contains("合計") || folded.contains("ご請求")
        })
    {
        return Ok(None);
    }

    let date = required_date(row, map, index)?;
    let description_cell = cell(row, map, Field::Description, index)?
        .map(str::trim)
        .unwrap_or_default();
    if description_cell.is_empty() {
        return Err(ParseFailure::new(index, "missing merchant description"));
    }
    let amount_cell = cell(row, map, Field::Amount, index)?.unwrap_or_default();
    let amount = parse_yen(amount_cell)
        .ok_or_else(|| ParseFailure::new(index, format!("malformed amount `{amount_cell}`")))?;
    if amount == 0 {
        return Err(ParseFailure::new(index, "zero amount"));
    }

    let description = if normalize(description_cell).contains("AMAZON") {
        AMAZON_MERCHANT_CANONICAL.to_string()
    } else {
        description_cell.to_string()
    };

    let (txn_type, sign) = if amount > 0 {
        (TransactionType::Expense, AmountSign::Outflow)
    } else {
        (TransactionType::Income, AmountSign::Inflow)
    };
    Ok(Some(ParsedCandidate {
        date,
        amount: amount.abs(),
        txn_type,
        sign,
        description,
        memo: text_field(row, map, Field::Memo, index)?,
        raw_category: None,
        source_row_index: index,
        raw_row: row.clone(),
    }))
}

/// Legacy Resona layout: year/month/day in three discrete columns, a
/// description, the amount, and a direction keyword. Returns `None`
/// when the row does not have the legacy shape at all.
fn parse_resona_legacy(
    row: &RawRow,
    index: i64,
) -> Option<Result<ParsedCandidate, ParseFailure>> {
    if row.len() < 6 {
        return None;
    }
    let year: i32 = row[0].trim().parse().ok()?;
    if !(1900..=2999).contains(&year) {
        return None;
    }
    let month: u32 = row[1].trim().parse().ok()?;
    let day: u32 = row[2].trim().parse().ok()?;

    let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
        return Some(Err(ParseFailure::new(
            index,
            format!("malformed date `{}/{}/{}`", row[0], row[1], row[2]),
        )));
    };
    let amount = match parse_yen(&row[4]) {
        Some(value) if value != 0 => value.abs(),
        Some(_) => return Some(Err(ParseFailure::new(index, "zero amount"))),
        None => {
            return Some(Err(ParseFailure::new(
                index,
                format!("malformed amount `{}`", row[4]),
            )))
        }
    };

    let direction = normalize(&row[5]);
    let (txn_type, sign) = if direction.contains("入金") || direction.contains("預入") {
        (TransactionType::Income, AmountSign::Inflow)
    } else if direction.contains("出金") || direction.contains("引出") {
        (TransactionType::Expense, AmountSign::Outflow)
    } else {
        return Some(Err(ParseFailure::new(
            index,
            format!("ambiguous direction `{}`", row[5]),
        )));
    };

    Some(Ok(ParsedCandidate {
        date,
        amount,
        txn_type,
        sign,
        description: row[3].trim().to_string(),
        memo: String::new(),
        raw_category: None,
        source_row_index: index,
        raw_row: row.clone(),
    }))
}

const CHARGE_TOKEN: &str = "チャージ";

fn parse_paypay(
    row: &RawRow,
    map: &ColumnMap,
    index: i64,
) -> Result<Option<ParsedCandidate>, ParseFailure> {
    let date = required_date(row, map, index)?;
    let description = text_field(row, map, Field::Description, index)?;

    let debit = optional_yen(row, map, Field::Debit, index)?;
    let credit = optional_yen(row, map, Field::Credit, index)?;
    if debit == 0 && credit == 0 {
        return Err(ParseFailure::new(index, "zero amount in both directions"));
    }

    let (amount, mut txn_type, sign) = if debit != 0 {
        (debit.abs(), TransactionType::Expense, AmountSign::Outflow)
    } else {
        (credit.abs(), TransactionType::Income, AmountSign::Inflow)
    };

    // A wallet charge is an inter-account movement no matter which
    // column the export put the value in.
    if normalize(&description).contains(CHARGE_TOKEN) {
        txn_type = TransactionType::Transfer;
    }

    Ok(Some(ParsedCandidate {
        date,
        amount,
        txn_type,
        sign,
        description,
        memo: text_field(row, map, Field::Memo, index)?,
        raw_category: None,
        source_row_index: index,
        raw_row: row.clone(),
    }))
}

/// Resolves the amount and direction of a bank-style row: discrete
/// debit/credit columns win over a single signed amount column.
fn directed_amount(
    row: &RawRow,
    map: &ColumnMap,
    index: i64,
) -> Result<(i64, TransactionType, AmountSign), ParseFailure> {
    if map.get(Field::Debit).is_some() || map.get(Field::Credit).is_some() {
        let debit = optional_yen(row, map, Field::Debit, index)?;
        let credit = optional_yen(row, map, Field::Credit, index)?;
        return match (debit != 0, credit != 0) {
            (true, false) => Ok((debit.abs(), TransactionType::Expense, AmountSign::Outflow)),
            (false, true) => Ok((credit.abs(), TransactionType::Income, AmountSign::Inflow)),
            (true, true) => Err(ParseFailure::new(
                index,
                "both debit and credit carry a value",
            )),
            (false, false) => Err(ParseFailure::new(index, "zero amount in both directions")),
        };
    }

    let amount_cell = cell(row, map, Field::Amount, index)?
        .map(str::trim)
        .unwrap_or_default();
    if amount_cell.is_empty() {
        return Err(ParseFailure::new(index, "missing amount"));
    }
    let amount = parse_yen(amount_cell)
        .ok_or_else(|| ParseFailure::new(index, format!("malformed amount `{amount_cell}`")))?;
    if amount == 0 {
        return Err(ParseFailure::new(index, "zero amount"));
    }
    if amount < 0 {
        Ok((-amount, TransactionType::Expense, AmountSign::Outflow))
    } else {
        Ok((amount, TransactionType::Income, AmountSign::Inflow))
    }
}

fn cell<'r>(
    row: &'r RawRow,
    map: &ColumnMap,
    field: Field,
    index: i64,
) -> Result<Option<&'r str>, ParseFailure> {
    map.cell(row, field).map_err(|error| (index, error).into())
}

fn text_field(
    row: &RawRow,
    map: &ColumnMap,
    field: Field,
    index: i64,
) -> Result<String, ParseFailure> {
    Ok(cell(row, map, field, index)?
        .map(str::trim)
        .unwrap_or_default()
        .to_string())
}

fn optional_text(
    row: &RawRow,
    map: &ColumnMap,
    field: Field,
    index: i64,
) -> Result<Option<String>, ParseFailure> {
    let value = text_field(row, map, field, index)?;
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

fn required_date(
    row: &RawRow,
    map: &ColumnMap,
    index: i64,
) -> Result<NaiveDate, ParseFailure> {
    let raw = cell(row, map, Field::Date, index)?
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        return Err(ParseFailure::new(index, "missing date"));
    }
    parse_date(raw).ok_or_else(|| ParseFailure::new(index, format!("malformed date `{raw}`")))
}

fn optional_yen(
    row: &RawRow,
    map: &ColumnMap,
    field: Field,
    index: i64,
) -> Result<i64, ParseFailure> {
    let raw = cell(row, map, field, index)?
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() || raw == "-" {
        return Ok(0);
    }
    parse_yen(raw).ok_or_else(|| {
        ParseFailure::new(
            index,
            format!("malformed amount `{raw}` in column `{}`", field.as_str()),
        )
    })
}

fn parse_type_label(value: &str) -> Option<TransactionType> {
    match normalize(value).as_str() {
        "収入" | "INCOME" => Some(TransactionType::Income),
        "支出" | "EXPENSE" => Some(TransactionType::Expense),
        "振替" | "TRANSFER" => Some(TransactionType::Transfer),
        _ => None,
    }
}

/// Date formats observed across the supported exports, tried in order.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 4] = ["%Y/%m/%d", "%Y-%m-%d", "%Y年%m月%d日", "%Y%m%d"];
    const DATETIME_FORMATS: [&str; 3] =
        ["%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M", "%Y-%m-%d %H:%M:%S"];

    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// Lexes a yen amount: thousands separators, currency marks, and
/// full-width digits are tolerated; fractional yen are not. This does
/// not go through `normalize` because the minus sign must survive.
pub fn parse_yen(value: &str) -> Option<i64> {
    let mut digits = String::new();
    let mut negative = false;
    let mut seen_digit = false;

    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '－' | '−' => '-',
            '＋' => '+',
            other => other,
        })
        .collect();

    let mut chars = cleaned.chars().peekable();
    while let Some(current) = chars.next() {
        match current {
            '-' if !seen_digit && !negative => negative = true,
            '+' if !seen_digit => {}
            '0'..='9' => {
                digits.push(current);
                seen_digit = true;
            }
            ',' | '，' | '¥' | '￥' | '円' | ' ' | '\u{3000}' | '"' => {}
            '.' => {
                // Yen amounts carry no fraction; tolerate a zero one.
                if chars.any(|rest| rest != '0') {
                    return None;
                }
                break;
            }
            _ => return None,
        }
    }

    if digits.is_empty() {
        return None;
    }
    let magnitude: i64 = digits.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
