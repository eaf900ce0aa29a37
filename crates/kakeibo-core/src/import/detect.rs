use serde::Serialize;

use crate::import::input::RawRow;
use crate::normalize::normalize;

/// Concrete source format of an import batch. Detected once per
/// batch; a generic format may be upgraded to a specific one, never
/// downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    AppExport,
    BankGeneric,
    CardGeneric,
    AmazonCard,
    ResonaBank,
    PayPay,
}

impl SourceFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppExport => "app_export",
            Self::BankGeneric => "bank_generic",
            Self::CardGeneric => "card_generic",
            Self::AmazonCard => "amazon_card",
            Self::ResonaBank => "resona_bank",
            Self::PayPay => "paypay",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "app_export" | "app" => Some(Self::AppExport),
            "bank_generic" | "bank" => Some(Self::BankGeneric),
            "card_generic" | "card" => Some(Self::CardGeneric),
            "amazon_card" | "amazon" => Some(Self::AmazonCard),
            "resona_bank" | "resona" => Some(Self::ResonaBank),
            "paypay" => Some(Self::PayPay),
            _ => None,
        }
    }

    pub const fn is_generic(self) -> bool {
        matches!(self, Self::BankGeneric | Self::CardGeneric)
    }
}

/// Upgrades a generic starting format to an issuer-specific one when
/// a structural signature matches. The detector list is fixed and
/// ordered; the first match wins, which makes detection stable. An
/// explicit specific format is returned unchanged.
pub fn detect_format(declared: SourceFormat, rows: &[RawRow]) -> SourceFormat {
    if !declared.is_generic() {
        return declared;
    }

    let sample: Vec<Vec<String>> = rows
        .iter()
        .take(5)
        .map(|row| row.iter().map(|cell| normalize(cell)).collect())
        .collect();

    const DETECTORS: [(SourceFormat, fn(&[Vec<String>]) -> bool); 3] = [
        (SourceFormat::AmazonCard, matches_amazon_card),
        (SourceFormat::ResonaBank, matches_resona_bank),
        (SourceFormat::PayPay, matches_paypay),
    ];

    for (format, matcher) in DETECTORS {
        if matcher(&sample) {
            return format;
        }
    }
    declared
}

/// Amazon Mastercard export: the header names its three columns.
fn matches_amazon_card(sample: &[Vec<String>]) -> bool {
    let Some(header) = sample.first() else {
        return false;
    };
    header.iter().any(|cell| cell.contains("ご利用店名"))
        || (header.iter().any(|cell| cell.contains("ご利用日"))
            && header.iter().any(|cell| cell.contains("ご利用金額")))
}

/// Resona's legacy export splits the date into discrete year/month/
/// day columns; the newer one labels the direction column.
fn matches_resona_bank(sample: &[Vec<String>]) -> bool {
    let Some(header) = sample.first() else {
        return false;
    };
    let has_split_date = header.iter().any(|cell| cell == "年")
        && header.iter().any(|cell| cell == "月")
        && header.iter().any(|cell| cell == "日");
    let has_labeled_direction = header.iter().any(|cell| cell.contains("お取引項目"));
    has_split_date || has_labeled_direction || header.iter().any(|cell| cell.contains("りそな"))
}

/// PayPay wallet export: separate debit/credit yen columns.
fn matches_paypay(sample: &[Vec<String>]) -> bool {
    let Some(header) = sample.first() else {
        return false;
    };
    let has_debit = header.iter().any(|cell| cell.contains("出金金額"));
    let has_credit = header.iter().any(|cell| cell.contains("入金金額"));
    (has_debit && has_credit) || header.iter().any(|cell| cell.contains("PAYPAY"))
}
