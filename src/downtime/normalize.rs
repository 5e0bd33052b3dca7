//! Reason text normalization.

/// Uppercase, strip diacritics, collapse every run of non-alphanumeric
/// characters into one space, trim.
///
/// Only ASCII letters and digits survive; other scripts become separators.
pub fn normalize_reason(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_uppercase).map(fold_diacritic) {
        if c.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Base letter of an uppercase Latin-1 / Latin Extended-A letter whose
/// canonical decomposition is base + combining mark. Anything else is
/// returned unchanged.
fn fold_diacritic(c: char) -> char {
    match c {
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
        'Ď' => 'D',
        'È'..='Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => 'G',
        'Ĥ' => 'H',
        'Ì'..='Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => 'I',
        'Ĵ' => 'J',
        'Ķ' => 'K',
        'Ĺ' | 'Ļ' | 'Ľ' => 'L',
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'N',
        'Ò'..='Ö' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
        'Ŕ' | 'Ŗ' | 'Ř' => 'R',
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => 'S',
        'Ţ' | 'Ť' => 'T',
        'Ù'..='Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'Ŵ' => 'W',
        'Ý' | 'Ÿ' | 'Ŷ' => 'Y',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_punctuation_runs() {
        assert_eq!(normalize_reason("  no-operator!!  (2nd shift) "), "NO OPERATOR 2ND SHIFT");
    }

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize_reason("Résine épuisée"), "RESINE EPUISEE");
        assert_eq!(normalize_reason("mantenimiento bomba año"), "MANTENIMIENTO BOMBA ANO");
        assert_eq!(normalize_reason("Łódź"), "ODZ");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(normalize_reason(""), "");
        assert_eq!(normalize_reason(" -- / -- "), "");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_reason("Color change / purge");
        assert_eq!(normalize_reason(&once), once);
    }
}
