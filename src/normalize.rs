use once_cell::sync::Lazy;
use regex::Regex;

use crate::reference::ABBREVIATIONS;

static DIGIT_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)(\p{L})").unwrap());
static LETTER_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\p{L})(\d)").unwrap());
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s,]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One entry of an ordered (pattern, replacement) table.
///
/// Patterns are matched case-insensitively. An alphanumeric edge of the
/// pattern only matches at a word boundary, so `st` never fires inside
/// `coast` and `n mandela` never fires inside `nelson mandela`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionRule {
    pub pattern: &'static str,
    pub replacement: &'static str,
}

impl SubstitutionRule {
    pub const fn new(pattern: &'static str, replacement: &'static str) -> Self {
        Self {
            pattern,
            replacement,
        }
    }

    fn apply(&self, input: &str) -> String {
        let pattern = self.pattern.to_ascii_lowercase();
        let (Some(first), Some(last)) = (pattern.bytes().next(), pattern.bytes().last()) else {
            return input.to_string();
        };
        let anchored_start = is_word_byte(first);
        let anchored_end = is_word_byte(last);

        let haystack = input.to_ascii_lowercase();
        let bytes = input.as_bytes();
        let mut output = String::with_capacity(input.len());
        let mut cursor = 0;
        let mut search_from = 0;

        while let Some(offset) = haystack[search_from..].find(&pattern) {
            let start = search_from + offset;
            let end = start + pattern.len();
            let clean_start = !anchored_start || start == 0 || !is_word_byte(bytes[start - 1]);
            let clean_end = !anchored_end || end == bytes.len() || !is_word_byte(bytes[end]);
            if clean_start && clean_end {
                output.push_str(&input[cursor..start]);
                output.push_str(self.replacement);
                cursor = end;
                search_from = end;
            } else {
                search_from = start + 1;
            }
        }

        output.push_str(&input[cursor..]);
        output
    }
}

/// Applies every rule in order, each over the output of the previous one.
pub fn apply_rules(input: &str, rules: &[SubstitutionRule]) -> String {
    rules
        .iter()
        .fold(input.to_string(), |acc, rule| rule.apply(&acc))
}

// Non-ASCII bytes count as word characters so accented names stay intact.
fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte >= 0x80
}

/// Returns true for cells the scraper leaves empty or writes as `nan`.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
}

/// Puts a space wherever a digit touches a letter, so `12n.mandela`
/// becomes `12 n.mandela`.
pub fn split_digits(input: &str) -> String {
    let spaced = DIGIT_LETTER.replace_all(input, "$1 $2");
    LETTER_DIGIT.replace_all(&spaced, "$1 $2").into_owned()
}

/// Canonicalizes a raw physical address.
///
/// Digits and letters are split apart, abbreviations are expanded,
/// punctuation other than commas is dropped, whitespace is collapsed and the
/// result is title-cased. Absent input yields an empty string.
pub fn normalize_address(raw: Option<&str>) -> String {
    let Some(raw) = raw.filter(|value| !is_missing(value)) else {
        return String::new();
    };

    let expanded = apply_rules(&split_digits(raw), ABBREVIATIONS);
    let stripped = PUNCTUATION.replace_all(&expanded, " ");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    title_case(collapsed.trim())
}

fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_is_letter = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            output.push(ch);
            previous_is_letter = false;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_digits_from_letters() {
        assert!(normalize_address(Some("12Main st")).contains("12 Main Street"));
        assert_eq!(normalize_address(Some("Stand4521")), "Stand 4521");
        assert_eq!(normalize_address(Some("a1b2")), "A 1 B 2");
    }

    #[test]
    fn expands_whole_tokens_only() {
        assert_eq!(normalize_address(Some("coast rd")), "Coast Road");
        assert_eq!(normalize_address(Some("Main Street")), "Main Street");
        assert_eq!(
            normalize_address(Some("cnr Fife AVE & 5th st")),
            "Corner Fife Avenue And 5 Th Street"
        );
        assert_eq!(
            normalize_address(Some("Dr. Smith Blvd, Ext 3")),
            "Drive Smith Boulevard, Extension 3"
        );
    }

    #[test]
    fn strips_punctuation_but_keeps_commas() {
        assert_eq!(
            normalize_address(Some("  No.5 (Rear) , Jason-Moyo   ave;  ")),
            "No 5 Rear , Jason Moyo Avenue"
        );
    }

    #[test]
    fn absent_input_is_empty() {
        assert_eq!(normalize_address(None), "");
        assert_eq!(normalize_address(Some("NaN")), "");
        assert_eq!(normalize_address(Some("   ")), "");
    }

    #[test]
    fn phrase_rules_respect_word_boundaries() {
        const RULES: &[SubstitutionRule] = &[SubstitutionRule::new("n mandela", "Nelson Mandela")];
        assert_eq!(apply_rules("12 N Mandela Ave", RULES), "12 Nelson Mandela Ave");
        assert_eq!(apply_rules("Nelson Mandela Ave", RULES), "Nelson Mandela Ave");
        assert_eq!(
            apply_rules("n mandela / n mandela", RULES),
            "Nelson Mandela / Nelson Mandela"
        );
    }

    #[test]
    fn symbol_rules_match_without_spaces() {
        const RULES: &[SubstitutionRule] = &[SubstitutionRule::new("&", "and")];
        assert_eq!(apply_rules("A&B", RULES), "AandB");
    }
}
