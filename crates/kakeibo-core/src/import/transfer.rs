use crate::model::TransactionType;
use crate::normalize::normalize;

/// Why a row was flagged as an inter-account movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    ExplicitType,
    CardAtm,
    ConvenienceAtm,
    Charge,
    Remittance,
    AccountMovement,
    DepositWithdrawal,
    AtmKeyword,
    BankTransfer,
    AtmLocation,
}

impl TransferReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExplicitType => "explicit_transfer_type",
            Self::CardAtm => "atm_card_transaction",
            Self::ConvenienceAtm => "convenience_store_atm",
            Self::Charge => "charge",
            Self::Remittance => "remittance",
            Self::AccountMovement => "account_movement",
            Self::DepositWithdrawal => "deposit_withdrawal",
            Self::AtmKeyword => "atm_keyword",
            Self::BankTransfer => "bank_transfer",
            Self::AtmLocation => "atm_location",
        }
    }

    /// ATM/cash-style patterns whose counter-account is always the
    /// designated cash account. These rows skip reviewer confirmation.
    pub fn auto_resolvable(self) -> bool {
        matches!(
            self,
            Self::CardAtm
                | Self::ConvenienceAtm
                | Self::AtmKeyword
                | Self::DepositWithdrawal
                | Self::AtmLocation
        )
    }
}

/// Keywords that force a negative result no matter what else the
/// description contains. Fees and interest postings mention transfer
/// vocabulary without being movements themselves.
const EXCLUSIONS: [&str; 3] = ["手数料", "利息", "利子"];

/// Issuer-specific ATM withdrawal prefix. Unambiguous, so it is
/// checked before any combined-keyword rule.
const CARD_PREFIX: &str = "カード";

const CONVENIENCE_BRANDS: [&str; 7] = [
    "セブン",
    "ローソン",
    "ファミリーマート",
    "ファミマ",
    "ミニストップ",
    "デイリーヤマザキ",
    "セイコーマート",
];

const CONVENIENCE_QUALIFIERS: [&str; 3] = ["ATM", "カード", "送金"];

/// Single keywords that are a transfer signal on their own. Note that
/// the bare bank-transfer verb is deliberately absent: it only counts
/// when a bank name accompanies it (rule 5).
const SINGLE_KEYWORDS: [(&str, TransferReason); 7] = [
    ("チャージ", TransferReason::Charge),
    ("送金", TransferReason::Remittance),
    ("振替", TransferReason::AccountMovement),
    ("入出金", TransferReason::DepositWithdrawal),
    ("預入", TransferReason::DepositWithdrawal),
    ("引出", TransferReason::DepositWithdrawal),
    ("ATM", TransferReason::AtmKeyword),
];

const BANK_NAMES: [&str; 3] = ["銀行", "バンク", "信用金庫"];
const TRANSFER_VERBS: [&str; 3] = ["振込", "振り込み", "お振込"];

const ATM_LOCATIONS: [&str; 2] = ["ゆうちょ", "郵便局"];

/// Decides whether a candidate looks like an inter-account movement.
///
/// The rules form a disambiguation cascade evaluated in fixed order,
/// first hit wins; more specific signals sit above broad keyword
/// matches.
pub fn detect(description: &str, txn_type: TransactionType) -> Option<TransferReason> {
    let text = normalize(description);

    if EXCLUSIONS.iter().any(|keyword| text.contains(keyword)) {
        return None;
    }

    if txn_type == TransactionType::Transfer {
        return Some(TransferReason::ExplicitType);
    }

    if text.starts_with(CARD_PREFIX) {
        return Some(TransferReason::CardAtm);
    }

    if CONVENIENCE_BRANDS.iter().any(|brand| text.contains(brand))
        && CONVENIENCE_QUALIFIERS
            .iter()
            .any(|keyword| text.contains(keyword))
    {
        return Some(TransferReason::ConvenienceAtm);
    }

    for (keyword, reason) in SINGLE_KEYWORDS {
        if text.contains(keyword) {
            return Some(reason);
        }
    }

    if BANK_NAMES.iter().any(|name| text.contains(name))
        && TRANSFER_VERBS.iter().any(|verb| text.contains(verb))
    {
        return Some(TransferReason::BankTransfer);
    }

    if ATM_LOCATIONS.iter().any(|place| text.contains(place)) {
        return Some(TransferReason::AtmLocation);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{detect, TransferReason};
    use crate::model::TransactionType;

    #[test]
    fn explicit_transfer_type_always_wins() {
        assert_eq!(
            detect("コーヒー", TransactionType::Transfer),
            Some(TransferReason::ExplicitType)
        );
    }

    #[test]
    fn half_width_card_prefix_is_detected() {
        assert_eq!(
            detect("ｶ-ﾄﾞ ATM引出", TransactionType::Expense),
            Some(TransferReason::CardAtm)
        );
    }

    #[test]
    fn card_prefix_outranks_convenience_combo() {
        // Both rules could match; the prefix rule is evaluated first.
        assert_eq!(
            detect("カード セブン銀行ATM", TransactionType::Expense),
            Some(TransferReason::CardAtm)
        );
    }

    #[test]
    fn convenience_brand_needs_a_qualifier() {
        assert_eq!(
            detect("セブンATM 出金", TransactionType::Expense),
            Some(TransferReason::ConvenienceAtm)
        );
        assert_eq!(detect("セブンでお菓子", TransactionType::Expense), None);
    }

    #[test]
    fn charge_keyword_is_a_candidate_on_its_own() {
        assert_eq!(
            detect("PayPayチャージ", TransactionType::Expense),
            Some(TransferReason::Charge)
        );
    }

    #[test]
    fn bare_transfer_verb_without_a_bank_name_is_negative() {
        assert_eq!(detect("振込 ﾔﾏﾀﾞ ﾀﾛｳ", TransactionType::Income), None);
        assert_eq!(
            detect("みずほ銀行 振込", TransactionType::Income),
            Some(TransferReason::BankTransfer)
        );
    }

    #[test]
    fn exclusion_keywords_force_a_negative_result() {
        assert_eq!(detect("振込手数料", TransactionType::Expense), None);
        assert_eq!(detect("ATM手数料", TransactionType::Expense), None);
    }

    #[test]
    fn post_office_counts_as_an_atm_location() {
        assert_eq!(
            detect("ゆうちょ 出張所", TransactionType::Expense),
            Some(TransferReason::AtmLocation)
        );
    }

    #[test]
    fn auto_resolvable_covers_cash_style_reasons_only() {
        assert!(TransferReason::CardAtm.auto_resolvable());
        assert!(TransferReason::AtmLocation.auto_resolvable());
        assert!(!TransferReason::Charge.auto_resolvable());
        assert!(!TransferReason::BankTransfer.auto_resolvable());
        assert!(!TransferReason::ExplicitType.auto_resolvable());
    }
}
