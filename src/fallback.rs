use tracing::debug;

use crate::reference::CITY_CENTROIDS;

/// Last-resort coordinate source consulted after every query failed.
pub trait FallbackStrategy: Send + Sync {
    fn locate(&self, city: &str) -> Option<(f64, f64)>;
}

/// Approximates a facility by the centre of its (corrected) city.
pub struct CityCentroidFallback {
    centroids: Vec<(String, f64, f64)>,
}

impl CityCentroidFallback {
    pub fn new() -> Self {
        Self::with_centroids(CITY_CENTROIDS.iter().map(|(name, lat, lon)| (*name, *lat, *lon)))
    }

    pub fn with_centroids<'a, I>(centroids: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64, f64)>,
    {
        Self {
            centroids: centroids
                .into_iter()
                .map(|(name, lat, lon)| (name.to_lowercase(), lat, lon))
                .collect(),
        }
    }
}

impl Default for CityCentroidFallback {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackStrategy for CityCentroidFallback {
    fn locate(&self, city: &str) -> Option<(f64, f64)> {
        let needle = city.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let found = self
            .centroids
            .iter()
            .find(|(name, _, _)| *name == needle)
            .map(|(_, lat, lon)| (*lat, *lon));
        if found.is_none() {
            debug!(city, "no centroid for city");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_city_case_insensitively() {
        let fallback = CityCentroidFallback::new();
        assert_eq!(fallback.locate("harare"), Some((-17.8252, 31.0335)));
        assert_eq!(fallback.locate(" Gweru "), Some((-19.4500, 29.8167)));
    }

    #[test]
    fn unknown_or_blank_city_has_no_centroid() {
        let fallback = CityCentroidFallback::new();
        assert_eq!(fallback.locate("Atlantis"), None);
        assert_eq!(fallback.locate(""), None);
    }

    #[test]
    fn custom_table_replaces_defaults() {
        let fallback = CityCentroidFallback::with_centroids([("Hwange", -18.36, 26.50)]);
        assert_eq!(fallback.locate("HWANGE"), Some((-18.36, 26.50)));
        assert_eq!(fallback.locate("Harare"), None);
    }
}
