use tracing::debug;

use crate::normalize::{apply_rules, is_missing, split_digits};
use crate::reference::{KNOWN_CITIES, STREET_CORRECTIONS};

/// Minimum similarity, in percent, for a fuzzy city correction.
pub const CITY_MATCH_THRESHOLD_PERCENT: usize = 70;

/// Edit-distance similarity in `0.0..=1.0`, ignoring case.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (distance, longest) = distance_and_length(a, b);
    if longest == 0 {
        return 1.0;
    }
    1.0 - distance as f64 / longest as f64
}

// Compares in integers so a score of exactly 0.70 is never lost to rounding.
fn meets_threshold(a: &str, b: &str, threshold_percent: usize) -> bool {
    let (distance, longest) = distance_and_length(a, b);
    (longest - distance) * 100 >= threshold_percent * longest
}

fn distance_and_length(a: &str, b: &str) -> (usize, usize) {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let longest = a.chars().count().max(b.chars().count());
    (strsim::levenshtein(&a, &b), longest)
}

/// Maps a free-text city onto the reference list.
///
/// An exact case-insensitive match always wins. Otherwise the most similar
/// reference city is used if it clears the threshold; the first one listed
/// wins a tie. Anything else is returned trimmed but unchanged.
pub fn match_city(raw: &str) -> String {
    let city = raw.trim();
    if is_missing(city) {
        return String::new();
    }

    if let Some(exact) = KNOWN_CITIES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(city))
    {
        return (*exact).to_string();
    }

    let mut best: Option<(&str, f64)> = None;
    for known in KNOWN_CITIES {
        if !meets_threshold(city, known, CITY_MATCH_THRESHOLD_PERCENT) {
            continue;
        }
        let score = similarity(city, known);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((known, score));
        }
    }

    match best {
        Some((known, score)) => {
            debug!(input = city, matched = known, score, "fuzzy city match");
            known.to_string()
        }
        None => city.to_string(),
    }
}

/// Rewrites known street misspellings, leaving the rest of the address alone
/// apart from separating house numbers glued to a street name.
pub fn correct_streets(address: &str) -> String {
    apply_rules(&split_digits(address), STREET_CORRECTIONS)
}
