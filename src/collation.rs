//! Arabic-locale string ordering for catalog listings.
//!
//! Mirrors what an `ar` collator does for the values this app shows:
//! Arabic script sorts before Latin, harakat and tatweel are ignored,
//! hamza-carrying letters fold onto their base letter, and Latin text
//! compares case- and accent-insensitively. Ties fall back to a
//! lower-cased comparison, then to the raw strings, so the order is total.

use std::cmp::Ordering;

/// Script group, in collation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Group {
    Space,
    Punctuation,
    Digit,
    Arabic,
    Latin,
    Other,
}

fn is_ignorable(c: char) -> bool {
    // Harakat, superscript alef, tatweel.
    matches!(c, '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}')
}

fn fold_arabic(c: char) -> char {
    match c {
        'أ' | 'إ' | 'آ' | 'ٱ' => 'ا',
        'ؤ' => 'و',
        'ئ' | 'ى' => 'ي',
        'ة' => 'ه',
        other => other,
    }
}

fn fold_latin(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'ç' => 'c',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

fn classify(c: char) -> Group {
    if c.is_whitespace() {
        Group::Space
    } else if c.is_ascii_digit() || ('\u{0660}'..='\u{0669}').contains(&c) {
        Group::Digit
    } else if ('\u{0600}'..='\u{06FF}').contains(&c) && c.is_alphabetic() {
        Group::Arabic
    } else if c.is_alphabetic() && (c.is_ascii() || ('\u{00C0}'..='\u{024F}').contains(&c)) {
        Group::Latin
    } else if c.is_ascii_punctuation() || !c.is_alphanumeric() {
        Group::Punctuation
    } else {
        Group::Other
    }
}

/// Numeric value of Arabic-Indic digits collates with ASCII digits.
fn fold_digit(c: char) -> char {
    match c {
        '\u{0660}'..='\u{0669}' => {
            char::from_u32('0' as u32 + (c as u32 - 0x0660)).unwrap_or(c)
        }
        other => other,
    }
}

/// Primary collation key: one (group, folded char) weight per significant char.
fn primary_key(s: &str) -> Vec<(Group, char)> {
    s.chars()
        .filter(|c| !is_ignorable(*c))
        .flat_map(char::to_lowercase)
        .map(|c| {
            let group = classify(c);
            let folded = match group {
                Group::Arabic => fold_arabic(c),
                Group::Latin => fold_latin(c),
                Group::Digit => fold_digit(c),
                Group::Space => ' ',
                _ => c,
            };
            (group, folded)
        })
        .collect()
}

/// Compare two strings the way an Arabic-locale collator orders them.
pub fn compare_ar(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Sort in place with [`compare_ar`].
pub fn sort_ar(values: &mut [String]) {
    values.sort_by(|a, b| compare_ar(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(values: &[&str]) -> Vec<String> {
        let mut owned: Vec<String> = values.iter().map(|s| s.to_string()).collect();
        sort_ar(&mut owned);
        owned
    }

    #[test]
    fn arabic_alphabetical_order() {
        assert_eq!(
            sorted(&["وهران", "باتنة", "تلمسان", "أدرار"]),
            vec!["أدرار", "باتنة", "تلمسان", "وهران"]
        );
    }

    #[test]
    fn arabic_before_latin() {
        assert_eq!(
            sorted(&["Cardiologie", "طب الأطفال", "Alger"]),
            vec!["طب الأطفال", "Alger", "Cardiologie"]
        );
    }

    #[test]
    fn hamza_forms_fold_to_alef() {
        // Primary keys match, so only the raw tie-break separates them.
        assert_eq!(primary_key("أحمد"), primary_key("احمد"));
        assert_eq!(primary_key("مدرسة"), primary_key("مدرسه"));
        assert_eq!(primary_key("إلياس"), primary_key("الياس"));
    }

    #[test]
    fn harakat_and_tatweel_ignored() {
        assert_eq!(primary_key("طِبّ"), primary_key("طب"));
        assert_eq!(primary_key("طـب"), primary_key("طب"));
    }

    #[test]
    fn latin_is_case_and_accent_insensitive_at_primary_level() {
        assert_eq!(primary_key("Béjaïa"), primary_key("bejaia"));
        assert_eq!(
            sorted(&["oran", "Béjaïa", "Alger"]),
            vec!["Alger", "Béjaïa", "oran"]
        );
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        assert_eq!(compare_ar("طب", "طب الأطفال"), Ordering::Less);
    }

    #[test]
    fn ordering_is_total_for_distinct_strings() {
        assert_ne!(compare_ar("أحمد", "احمد"), Ordering::Equal);
        assert_eq!(compare_ar("same", "same"), Ordering::Equal);
    }

    #[test]
    fn digits_before_letters() {
        assert_eq!(sorted(&["ب", "2", "A"]), vec!["2", "ب", "A"]);
        assert_eq!(primary_key("٣"), primary_key("3"));
    }
}
