use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::correct::{correct_streets, match_city};
use crate::normalize::{is_missing, normalize_address};

static NUMERIC_TOKENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static STREET_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z\s]+(?:Avenue|Road|Street|Drive|Way|Crescent)\b").unwrap()
});

/// Candidate search strings for one facility, most specific first.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub address: String,
    pub city: String,
    pub candidates: Vec<String>,
}

impl QueryPlan {
    /// The city-level query every plan ends with.
    pub fn fallback(&self) -> Option<&str> {
        self.candidates.last().map(String::as_str)
    }
}

pub fn build_queries(
    facility_name: &str,
    raw_address: Option<&str>,
    raw_city: &str,
    country: &str,
) -> QueryPlan {
    let address = normalize_address(raw_address.map(correct_streets).as_deref());
    let city = match_city(raw_city);
    let mut queries = Vec::new();

    if !address.is_empty() {
        queries.push(compose(&[&address, &city, country]));

        let without_numbers = strip_numbers(&address);
        if !without_numbers.is_empty() && without_numbers != address {
            queries.push(compose(&[&without_numbers, &city, country]));
        }

        if let Some(street) = STREET_NAME.find(&address) {
            let street = street.as_str().trim();
            if !street.is_empty() {
                queries.push(compose(&[street, &city, country]));
            }
        }
    }

    let facility_name = facility_name.trim();
    if !is_missing(facility_name) {
        queries.push(compose(&[facility_name, &city, country]));
    }

    let fallback = compose(&[&city, country]);
    let fallback_key = fallback.to_lowercase();
    let mut seen = HashSet::new();
    let mut candidates: Vec<String> = queries
        .into_iter()
        .filter(|query| {
            let key = query.to_lowercase();
            key != fallback_key && seen.insert(key)
        })
        .collect();
    candidates.push(fallback);

    QueryPlan {
        address,
        city,
        candidates,
    }
}

fn strip_numbers(address: &str) -> String {
    let stripped = NUMERIC_TOKENS.replace_all(address, "");
    WHITESPACE
        .replace_all(&stripped, " ")
        .replace(" ,", ",")
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

fn compose(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_candidates_from_specific_to_coarse() {
        let plan = build_queries("City Clinic", Some("12 n.mandela ave"), "harare", "Zimbabwe");
        assert_eq!(plan.address, "12 Nelson Mandela Avenue");
        assert_eq!(plan.city, "Harare");
        assert_eq!(
            plan.candidates,
            vec![
                "12 Nelson Mandela Avenue, Harare, Zimbabwe",
                "Nelson Mandela Avenue, Harare, Zimbabwe",
                "City Clinic, Harare, Zimbabwe",
                "Harare, Zimbabwe",
            ]
        );
    }

    #[test]
    fn house_number_glued_to_street_is_still_corrected() {
        let plan = build_queries("City Clinic", Some("12n.mandela ave"), "harare", "Zimbabwe");
        assert_eq!(plan.address, "12 Nelson Mandela Avenue");
        assert_eq!(
            plan.candidates[0],
            "12 Nelson Mandela Avenue, Harare, Zimbabwe"
        );
    }

    #[test]
    fn extracts_street_from_longer_address() {
        let plan = build_queries("", Some("Stand 45, Seke rd, Hatfield"), "Harare", "Zimbabwe");
        assert_eq!(plan.candidates[0], "Stand 45, Seke Road, Hatfield, Harare, Zimbabwe");
        assert_eq!(plan.candidates[1], "Stand, Seke Road, Hatfield, Harare, Zimbabwe");
        assert_eq!(plan.candidates[2], "Seke Road, Harare, Zimbabwe");
        assert_eq!(plan.fallback(), Some("Harare, Zimbabwe"));
    }

    #[test]
    fn never_duplicates_and_always_ends_with_city() {
        let plan = build_queries("harare", Some("Harare"), "Harare", "Zimbabwe");
        assert_eq!(plan.candidates, vec!["Harare, Harare, Zimbabwe", "Harare, Zimbabwe"]);

        let plan = build_queries("Mbare Clinic", Some("MBARE CLINIC"), "Mbare", "Zimbabwe");
        let lowered: HashSet<_> = plan.candidates.iter().map(|q| q.to_lowercase()).collect();
        assert_eq!(lowered.len(), plan.candidates.len());
        assert_eq!(plan.fallback(), Some("Mbare, Zimbabwe"));
    }

    #[test]
    fn missing_address_still_yields_name_and_city() {
        let plan = build_queries("Parirenyatwa Hospital", None, "Harare", "Zimbabwe");
        assert_eq!(
            plan.candidates,
            vec!["Parirenyatwa Hospital, Harare, Zimbabwe", "Harare, Zimbabwe"]
        );

        let plan = build_queries("", None, "", "Zimbabwe");
        assert_eq!(plan.candidates, vec!["Zimbabwe"]);
    }

    #[test]
    fn numbers_only_address_skips_simplified_query() {
        let plan = build_queries("", Some("1234"), "Gweru", "Zimbabwe");
        assert_eq!(plan.candidates, vec!["1234, Gweru, Zimbabwe", "Gweru, Zimbabwe"]);
    }
}
