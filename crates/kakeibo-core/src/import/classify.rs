use crate::model::{Category, ClassificationRule, TransactionType};
use crate::normalize::normalize;

/// Outcome of automatic classification for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestion {
    pub category_id: Option<String>,
    /// Set when a keyword rule produced the suggestion.
    pub rule_id: Option<String>,
    /// Set when the suggestion came from the file's own category
    /// column rather than a rule.
    pub from_file: bool,
}

impl Suggestion {
    pub fn is_resolved(&self) -> bool {
        self.category_id.is_some()
    }
}

/// Classifies one candidate against the enabled rule set for its type.
///
/// Rules are consumed in the order the store hands them over
/// (descending priority); the first whose normalized keyword is a
/// substring of the normalized description-plus-memo text wins. A
/// matching rule outranks a category name stated in the file itself.
pub fn classify(
    description: &str,
    memo: &str,
    raw_category: Option<&str>,
    txn_type: TransactionType,
    rules: &[ClassificationRule],
    categories: &[Category],
) -> Suggestion {
    let haystack = normalize(&format!("{description} {memo}"));

    for rule in rules {
        if !rule.enabled || rule.txn_type != txn_type {
            continue;
        }
        let keyword = normalize(&rule.keyword);
        if !keyword.is_empty() && haystack.contains(&keyword) {
            return Suggestion {
                category_id: Some(rule.target_category_id.clone()),
                rule_id: Some(rule.rule_id.clone()),
                from_file: false,
            };
        }
    }

    if let Some(raw) = raw_category {
        if let Some(category) = match_category_name(raw, categories) {
            return Suggestion {
                category_id: Some(category.category_id.clone()),
                rule_id: None,
                from_file: true,
            };
        }
    }

    Suggestion::default()
}

/// Matches a file-provided category name against the master list,
/// script-insensitively.
pub fn match_category_name<'c>(name: &str, categories: &'c [Category]) -> Option<&'c Category> {
    let wanted = normalize(name);
    if wanted.is_empty() {
        return None;
    }
    categories
        .iter()
        .find(|category| normalize(&category.name) == wanted)
}
