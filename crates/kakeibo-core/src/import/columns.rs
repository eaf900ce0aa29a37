use crate::import::detect::SourceFormat;
use crate::import::input::RawRow;
use crate::import::parse::parse_date;
use crate::normalize::normalize;

/// Logical fields a CSV column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Type,
    Amount,
    Credit,
    Debit,
    Description,
    Memo,
    Category,
}

impl Field {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Type => "type",
            Self::Amount => "amount",
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Description => "description",
            Self::Memo => "memo",
            Self::Category => "category",
        }
    }
}

const FIELD_COUNT: usize = 8;

const fn slot(field: Field) -> usize {
    match field {
        Field::Date => 0,
        Field::Type => 1,
        Field::Amount => 2,
        Field::Credit => 3,
        Field::Debit => 4,
        Field::Description => 5,
        Field::Memo => 6,
        Field::Category => 7,
    }
}

/// Field resolution order. Credit/debit claim their columns before
/// the broad amount labels so a wallet's `出金金額` column is never
/// mistaken for a plain amount column.
const RESOLUTION_ORDER: [Field; FIELD_COUNT] = [
    Field::Date,
    Field::Credit,
    Field::Debit,
    Field::Amount,
    Field::Type,
    Field::Description,
    Field::Memo,
    Field::Category,
];

/// Per-format resolution of which column holds which logical field.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: [Option<usize>; FIELD_COUNT],
}

/// A field resolved outside the current row's width. Surfaced at
/// dereference time because row widths vary in malformed files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMapError {
    OutOfRange { field: Field, index: usize },
}

impl ColumnMap {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.indices[slot(field)]
    }

    pub fn set(&mut self, field: Field, index: usize) {
        self.indices[slot(field)] = Some(index);
    }

    /// Dereferences a field against one row. Absent mappings yield
    /// `Ok(None)`; a mapping beyond the row's width is an error.
    pub fn cell<'r>(
        &self,
        row: &'r RawRow,
        field: Field,
    ) -> Result<Option<&'r str>, ColumnMapError> {
        let Some(index) = self.get(field) else {
            return Ok(None);
        };
        match row.get(index) {
            Some(value) => Ok(Some(value.as_str())),
            None => Err(ColumnMapError::OutOfRange { field, index }),
        }
    }
}

/// User-supplied overrides; entries always win over detection, field
/// by field. Unspecified fields keep the detected mapping.
#[derive(Debug, Clone, Default)]
pub struct ManualColumnMap {
    pub date: Option<usize>,
    pub amount: Option<usize>,
    pub credit: Option<usize>,
    pub debit: Option<usize>,
    pub description: Option<usize>,
    pub memo: Option<usize>,
    pub category: Option<usize>,
}

impl ManualColumnMap {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.credit.is_none()
            && self.debit.is_none()
            && self.description.is_none()
            && self.memo.is_none()
            && self.category.is_none()
    }

    fn apply(&self, map: &mut ColumnMap) {
        let overrides = [
            (Field::Date, self.date),
            (Field::Amount, self.amount),
            (Field::Credit, self.credit),
            (Field::Debit, self.debit),
            (Field::Description, self.description),
            (Field::Memo, self.memo),
            (Field::Category, self.category),
        ];
        for (field, index) in overrides {
            if let Some(index) = index {
                map.set(field, index);
            }
        }
    }
}

/// Builds the column map for a batch: header labels when the first
/// row looks like a header, otherwise the format's default layout.
/// Returns the map and whether a header row was consumed.
pub fn build_column_map(
    rows: &[RawRow],
    format: SourceFormat,
    manual: Option<&ManualColumnMap>,
) -> (ColumnMap, bool) {
    let header = rows.first();
    let mut map = ColumnMap::default();
    let mut has_header = false;

    if let Some(header_row) = header {
        if let Some(from_header) = map_from_header(header_row, format) {
            map = from_header;
            has_header = true;
        }
    }
    if !has_header {
        map = default_layout(format);
    }

    if let Some(manual) = manual {
        manual.apply(&mut map);
    }

    (map, has_header)
}

fn map_from_header(header: &RawRow, format: SourceFormat) -> Option<ColumnMap> {
    // Data rows carry the same vocabulary the labels use (出金, 入金,
    // 振込), so substring hits alone cannot decide. A cell holding a
    // parseable date marks a data row, never a header.
    if header.iter().any(|cell| parse_date(cell.trim()).is_some()) {
        return None;
    }

    let normalized: Vec<String> = header.iter().map(|cell| normalize(cell)).collect();
    let mut map = ColumnMap::default();
    let mut claimed = [false; 32];
    let mut matched = 0usize;

    for field in RESOLUTION_ORDER {
        let labels = header_labels(field, format);
        let found = normalized.iter().enumerate().find(|(index, cell)| {
            !cell.is_empty()
                && !claimed.get(*index).copied().unwrap_or(true)
                && labels.iter().any(|label| cell.contains(label))
        });
        if let Some((index, _)) = found {
            if index < claimed.len() {
                claimed[index] = true;
            }
            map.set(field, index);
            matched += 1;
        }
    }

    // A single hit is too weak to throw the first row away.
    if matched >= 2 {
        Some(map)
    } else {
        None
    }
}

/// Known header label variants, already in normalized form. Issuer
/// formats add their own spellings on top of the shared set.
fn header_labels(field: Field, format: SourceFormat) -> &'static [&'static str] {
    match (field, format) {
        (Field::Date, SourceFormat::AmazonCard) => &["ご利用日", "日付", "DATE"],
        (Field::Date, SourceFormat::ResonaBank) => &["取引日", "日付", "年月日", "DATE"],
        (Field::Date, _) => &["日付", "取引日", "利用日", "ご利用日", "年月日", "DATE"],
        (Field::Type, _) => &["種別", "収支", "区分", "TYPE"],
        (Field::Amount, SourceFormat::AmazonCard) => &["ご利用金額", "金額", "AMOUNT"],
        (Field::Amount, SourceFormat::ResonaBank) => &["お取引金額", "取引金額", "金額", "AMOUNT"],
        (Field::Amount, _) => &["金額", "取引金額", "ご利用金額", "AMOUNT"],
        (Field::Credit, _) => &["入金金額", "入金額", "入金", "お預り金額", "CREDIT"],
        (Field::Debit, _) => &["出金金額", "出金額", "出金", "お支払金額", "DEBIT"],
        (Field::Description, SourceFormat::AmazonCard) => {
            &["ご利用店名", "店名", "DESCRIPTION"]
        }
        (Field::Description, _) => &[
            "ご利用店名",
            "店名",
            "取引内容",
            "内容",
            "摘要",
            "DESCRIPTION",
        ],
        (Field::Memo, _) => &["メモ", "備考", "MEMO"],
        (Field::Category, _) => &["カテゴリー", "カテゴリ", "分類", "CATEGORY"],
    }
}

/// Hardcoded layouts for headerless exports.
fn default_layout(format: SourceFormat) -> ColumnMap {
    let mut map = ColumnMap::default();
    match format {
        SourceFormat::AppExport => {
            map.set(Field::Date, 0);
            map.set(Field::Type, 1);
            map.set(Field::Amount, 2);
            map.set(Field::Category, 3);
            map.set(Field::Description, 4);
            map.set(Field::Memo, 5);
        }
        SourceFormat::BankGeneric
        | SourceFormat::CardGeneric
        | SourceFormat::AmazonCard
        | SourceFormat::ResonaBank => {
            map.set(Field::Date, 0);
            map.set(Field::Description, 1);
            map.set(Field::Amount, 2);
        }
        SourceFormat::PayPay => {
            map.set(Field::Date, 0);
            map.set(Field::Description, 1);
            map.set(Field::Debit, 2);
            map.set(Field::Credit, 3);
        }
    }
    map
}
