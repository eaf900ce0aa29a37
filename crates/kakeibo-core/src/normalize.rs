//! Canonical text form used by keyword matching and fingerprinting.
//!
//! Bank and wallet exports mix half-width and full-width scripts for
//! the same merchant, so every comparison in the import pipeline goes
//! through `normalize` first. The function is pure and idempotent.

/// Folds half-width katakana to full-width, full-width alphanumerics
/// to ASCII, uppercases ASCII, unifies hyphen/long-dash variants to
/// `ー`, and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut previous_space = false;

    while let Some(current) = chars.next() {
        let widened = match fold_halfwidth_katakana(current) {
            Some(base) => {
                let combined = chars
                    .peek()
                    .copied()
                    .and_then(|mark| combine_voicing(base, mark));
                match combined {
                    Some(voiced) => {
                        chars.next();
                        voiced
                    }
                    None => base,
                }
            }
            None => fold_fullwidth_ascii(current),
        };

        let unified = unify_dash(widened);

        if unified.is_whitespace() {
            if !previous_space && !output.is_empty() {
                output.push(' ');
                previous_space = true;
            }
            continue;
        }
        previous_space = false;

        if unified.is_ascii_alphabetic() {
            output.push(unified.to_ascii_uppercase());
        } else {
            output.push(unified);
        }
    }

    while output.ends_with(' ') {
        output.pop();
    }
    output
}

const HALFWIDTH_KATAKANA_BASE: &[(char, char)] = &[
    ('｡', '。'),
    ('｢', '「'),
    ('｣', '」'),
    ('､', '、'),
    ('･', '・'),
    ('ｦ', 'ヲ'),
    ('ｧ', 'ァ'),
    ('ｨ', 'ィ'),
    ('ｩ', 'ゥ'),
    ('ｪ', 'ェ'),
    ('ｫ', 'ォ'),
    ('ｬ', 'ャ'),
    ('ｭ', 'ュ'),
    ('ｮ', 'ョ'),
    ('ｯ', 'ッ'),
    ('ｰ', 'ー'),
    ('ｱ', 'ア'),
    ('ｲ', 'イ'),
    ('ｳ', 'ウ'),
    ('ｴ', 'エ'),
    ('ｵ', 'オ'),
    ('ｶ', 'カ'),
    ('ｷ', 'キ'),
    ('ｸ', 'ク'),
    ('ｹ', 'ケ'),
    ('ｺ', 'コ'),
    ('ｻ', 'サ'),
    ('ｼ', 'シ'),
    ('ｽ', 'ス'),
    ('ｾ', 'セ'),
    ('ｿ', 'ソ'),
    ('ﾀ', 'タ'),
    ('ﾁ', 'チ'),
    ('ﾂ', 'ツ'),
    ('ﾃ', 'テ'),
    ('ﾄ', 'ト'),
    ('ﾅ', 'ナ'),
    ('ﾆ', 'ニ'),
    ('ﾇ', 'ヌ'),
    ('ﾈ', 'ネ'),
    ('ﾉ', 'ノ'),
    ('ﾊ', 'ハ'),
    ('ﾋ', 'ヒ'),
    ('ﾌ', 'フ'),
    ('ﾍ', 'ヘ'),
    ('ﾎ', 'ホ'),
    ('ﾏ', 'マ'),
    ('ﾐ', 'ミ'),
    ('ﾑ', 'ム'),
    ('ﾒ', 'メ'),
    ('ﾓ', 'モ'),
    ('ﾔ', 'ヤ'),
    ('ﾕ', 'ユ'),
    ('ﾖ', 'ヨ'),
    ('ﾗ', 'ラ'),
    ('ﾘ', 'リ'),
    ('ﾙ', 'ル'),
    ('ﾚ', 'レ'),
    ('ﾛ', 'ロ'),
    ('ﾜ', 'ワ'),
    ('ﾝ', 'ン'),
    ('ﾞ', '゛'),
    ('ﾟ', '゜'),
];

fn fold_halfwidth_katakana(value: char) -> Option<char> {
    if !('｡'..='ﾟ').contains(&value) {
        return None;
    }
    HALFWIDTH_KATAKANA_BASE
        .iter()
        .find(|(half, _)| *half == value)
        .map(|(_, full)| *full)
}

/// Combines a folded base kana with a trailing half-width voicing
/// mark into the precomposed voiced/semi-voiced form.
fn combine_voicing(base: char, mark: char) -> Option<char> {
    match mark {
        'ﾞ' => {
            if base == 'ウ' {
                return Some('ヴ');
            }
            if "カキクケコサシスセソタチツテトハヒフヘホ".contains(base) {
                return char::from_u32(base as u32 + 1);
            }
            None
        }
        'ﾟ' => {
            if "ハヒフヘホ".contains(base) {
                return char::from_u32(base as u32 + 2);
            }
            None
        }
        _ => None,
    }
}

fn fold_fullwidth_ascii(value: char) -> char {
    let code = value as u32;
    // FF01..FF5E mirrors ASCII 0x21..0x7E.
    if (0xFF01..=0xFF5E).contains(&code) {
        if let Some(ascii) = char::from_u32(code - 0xFF01 + 0x21) {
            return ascii;
        }
    }
    if value == '\u{3000}' {
        return ' ';
    }
    value
}

fn unify_dash(value: char) -> char {
    match value {
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => 'ー',
        other => other,
    }
}
