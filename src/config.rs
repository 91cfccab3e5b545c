//! Pipeline configuration: distance unit, long-trip threshold, surcharge and
//! distance buckets.
//!
//! Can be loaded from a JSON file where every field is optional:
//! ```json
//! {
//!   "unit": "kilometers",
//!   "long_trip_threshold_seconds": 2700,
//!   "surcharge": 0.35,
//!   "buckets": { "edges": [1.0, 4.0, 9.0], "labels": ["0-1", "2-4", "4-9", "10+"] },
//!   "threads": 4
//! }
//! ```

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::PipelineError;
use crate::geo::{EARTH_RADIUS_KM, EARTH_RADIUS_MILES};

/// Unit for every distance the pipeline produces. Bucket edges are read in
/// this unit too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Miles,
    Kilometers,
}

impl DistanceUnit {
    /// Earth radius expressed in this unit.
    pub fn radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => EARTH_RADIUS_MILES,
            DistanceUnit::Kilometers => EARTH_RADIUS_KM,
        }
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            DistanceUnit::Miles => "mi",
            DistanceUnit::Kilometers => "km",
        }
    }
}

/// Ordered distance buckets.
///
/// `edges` are inclusive upper bounds: bucket `i` holds distances in
/// `(edges[i - 1], edges[i]]`, the first bucket takes everything up to
/// `edges[0]` and the last one everything above the final edge. `labels`
/// are listed in display order, one more than there are edges, and must be
/// unique. In JSON, `labels` may be left out to have them generated from the
/// edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBuckets")]
pub struct DistanceBuckets {
    edges: Vec<f64>,
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct RawBuckets {
    edges: Vec<f64>,
    labels: Option<Vec<String>>,
}

impl TryFrom<RawBuckets> for DistanceBuckets {
    type Error = PipelineError;

    fn try_from(raw: RawBuckets) -> Result<Self, Self::Error> {
        match raw.labels {
            Some(labels) => Self::new(raw.edges, labels),
            None => Self::from_edges(raw.edges),
        }
    }
}

impl Default for DistanceBuckets {
    fn default() -> Self {
        Self {
            edges: vec![1.0, 4.0, 9.0],
            labels: ["0-1", "2-4", "4-9", "10+"].map(String::from).to_vec(),
        }
    }
}

impl DistanceBuckets {
    /// Builds a validated bucket set.
    pub fn new(edges: Vec<f64>, labels: Vec<String>) -> Result<Self, PipelineError> {
        let buckets = Self { edges, labels };
        buckets.validate()?;
        Ok(buckets)
    }

    /// Builds buckets from edges alone, labelling them `0-e0`, `e0-e1`, ...,
    /// `eN+`.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self, PipelineError> {
        let mut labels = Vec::with_capacity(edges.len() + 1);
        let mut lower = 0.0;
        for &edge in &edges {
            labels.push(format!("{lower}-{edge}"));
            lower = edge;
        }
        labels.push(format!("{lower}+"));
        Self::new(edges, labels)
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Index of the single bucket `distance` belongs to.
    pub fn index_of(&self, distance: f64) -> usize {
        self.edges
            .iter()
            .position(|&edge| distance <= edge)
            .unwrap_or(self.edges.len())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.labels.len() != self.edges.len() + 1 {
            return Err(PipelineError::InvalidConfig(format!(
                "{} bucket edge(s) need {} labels, got {}",
                self.edges.len(),
                self.edges.len() + 1,
                self.labels.len()
            )));
        }
        let mut seen = HashSet::with_capacity(self.labels.len());
        if let Some(label) = self.labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(PipelineError::InvalidConfig(format!(
                "bucket label {label:?} is used more than once"
            )));
        }
        if let Some(edge) = self.edges.iter().find(|e| !e.is_finite()) {
            return Err(PipelineError::InvalidConfig(format!(
                "bucket edge {edge} is not finite"
            )));
        }
        if self.edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::InvalidConfig(
                "bucket edges must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}

/// Every tunable the pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub unit: DistanceUnit,
    /// Trips strictly longer than this count as long trips.
    pub long_trip_threshold_seconds: i64,
    /// Amount charged per long trip.
    pub surcharge: f64,
    pub buckets: DistanceBuckets,
    /// Worker threads; `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unit: DistanceUnit::Miles,
            long_trip_threshold_seconds: 1800,
            surcharge: 0.20,
            buckets: DistanceBuckets::default(),
            threads: None,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`. Missing fields take
    /// their defaults.
    pub fn load(path: &str) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn radius(&self) -> f64 {
        self.unit.radius()
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.surcharge.is_finite() || self.surcharge < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "surcharge must be a non-negative amount, got {}",
                self.surcharge
            )));
        }
        if self.threads == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "thread count must be at least 1".to_string(),
            ));
        }
        self.buckets.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.radius(), 3959.0);
        assert_eq!(config.long_trip_threshold_seconds, 1800);
        assert_eq!(config.surcharge, 0.20);
        assert_eq!(config.buckets.edges(), &[1.0, 4.0, 9.0]);
        assert_eq!(config.buckets.labels(), &["0-1", "2-4", "4-9", "10+"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kilometer_radius() {
        assert_eq!(DistanceUnit::Kilometers.radius(), 6371.0);
    }

    #[test]
    fn test_default_bucket_boundaries() {
        let buckets = DistanceBuckets::default();
        assert_eq!(buckets.index_of(0.0), 0);
        assert_eq!(buckets.index_of(1.0), 0);
        assert_eq!(buckets.index_of(1.0000001), 1);
        assert_eq!(buckets.index_of(4.0), 1);
        assert_eq!(buckets.index_of(4.5), 2);
        assert_eq!(buckets.index_of(9.0), 2);
        assert_eq!(buckets.index_of(9.01), 3);
        assert_eq!(buckets.index_of(12_000.0), 3);
    }

    #[test]
    fn test_buckets_exhaustive_and_exclusive() {
        let buckets = DistanceBuckets::default();
        let mut d = 0.0;
        while d < 20.0 {
            let predicates = [d <= 1.0, d > 1.0 && d <= 4.0, d > 4.0 && d <= 9.0, d > 9.0];
            assert_eq!(predicates.iter().filter(|p| **p).count(), 1, "d = {d}");
            let expected = predicates.iter().position(|p| *p).unwrap();
            assert_eq!(buckets.index_of(d), expected, "d = {d}");
            d += 0.05;
        }
    }

    #[test]
    fn test_from_edges_generates_labels() {
        let buckets = DistanceBuckets::from_edges(vec![2.0, 5.5]).unwrap();
        assert_eq!(buckets.labels(), &["0-2", "2-5.5", "5.5+"]);
    }

    #[test]
    fn test_rejects_unsorted_edges() {
        assert!(DistanceBuckets::from_edges(vec![4.0, 1.0]).is_err());
        assert!(DistanceBuckets::from_edges(vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_rejects_label_mismatch() {
        let result = DistanceBuckets::new(vec![1.0], vec!["a".to_string()]);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let result = DistanceBuckets::new(vec![1.0], vec!["x".to_string(), "x".to_string()]);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_json_edges_without_labels() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "buckets": { "edges": [2.0, 5.0] } }"#).unwrap();
        assert_eq!(config.buckets.edges(), &[2.0, 5.0]);
        assert_eq!(config.buckets.labels(), &["0-2", "2-5", "5+"]);
    }

    #[test]
    fn test_json_buckets_are_validated() {
        let duplicate = r#"{ "buckets": { "edges": [1.0], "labels": ["x", "x"] } }"#;
        assert!(serde_json::from_str::<PipelineConfig>(duplicate).is_err());

        let unsorted = r#"{ "buckets": { "edges": [5.0, 2.0] } }"#;
        assert!(serde_json::from_str::<PipelineConfig>(unsorted).is_err());
    }

    #[test]
    fn test_rejects_negative_surcharge() {
        let config = PipelineConfig {
            surcharge: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "unit": "kilometers", "surcharge": 0.5 }"#).unwrap();
        assert_eq!(config.unit, DistanceUnit::Kilometers);
        assert_eq!(config.surcharge, 0.5);
        assert_eq!(config.long_trip_threshold_seconds, 1800);
        assert_eq!(config.buckets, DistanceBuckets::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "long_trip_threshold_seconds": 600, "threads": 2 }"#).unwrap();

        let config = PipelineConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.long_trip_threshold_seconds, 600);
        assert_eq!(config.threads, Some(2));
    }
}
