//! Validation of untrusted request options.
//!
//! Absent values take their defaults. Clearly malformed values (negative,
//! non-finite, a threshold outside `[0, 1]`) are rejected. Well-formed values
//! past an upper bound are clamped.

use serde::Deserialize;

use crate::cluster::ClusterConfig;
use crate::error::{FeedError, Result};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_DIVERSITY_FACTOR: f64 = 0.3;
pub const DEFAULT_RECENCY_WEIGHT: f64 = 1.0;
pub const MAX_RECENCY_WEIGHT: f64 = 3.0;
pub const MAX_CLUSTERS_LIMIT: usize = 200;
pub const MAX_RELATED_LIMIT: usize = 50;

/// Raw feed options as they arrive in a query string.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub exclude_read: Option<bool>,
    pub diversity_factor: Option<f64>,
    pub recency_weight: Option<f64>,
    /// Comma separated country ids.
    pub countries: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedOptions {
    pub limit: usize,
    pub offset: usize,
    pub exclude_read: bool,
    pub diversity_factor: f64,
    pub recency_weight: f64,
    pub countries: Option<Vec<String>>,
    pub category: Option<String>,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            exclude_read: false,
            diversity_factor: DEFAULT_DIVERSITY_FACTOR,
            recency_weight: DEFAULT_RECENCY_WEIGHT,
            countries: None,
            category: None,
        }
    }
}

fn non_negative_int(field: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| FeedError::configuration(field, format!("must not be negative, got {}", value)))
}

fn non_negative_float(field: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(FeedError::configuration(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(FeedError::configuration(
            field,
            format!("must not be negative, got {}", value),
        ));
    }
    Ok(value)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl FeedOptions {
    pub fn from_query(query: FeedQuery) -> Result<Self> {
        let defaults = Self::default();

        let limit = match query.limit {
            Some(limit) => non_negative_int("limit", limit)?.clamp(1, MAX_LIMIT),
            None => defaults.limit,
        };
        let offset = match query.offset {
            Some(offset) => non_negative_int("offset", offset)?,
            None => defaults.offset,
        };
        let diversity_factor = match query.diversity_factor {
            Some(factor) => non_negative_float("diversity_factor", factor)?.min(1.0),
            None => defaults.diversity_factor,
        };
        let recency_weight = match query.recency_weight {
            Some(weight) => non_negative_float("recency_weight", weight)?.min(MAX_RECENCY_WEIGHT),
            None => defaults.recency_weight,
        };
        let countries = non_blank(query.countries)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty());

        Ok(Self {
            limit,
            offset,
            exclude_read: query.exclude_read.unwrap_or(defaults.exclude_read),
            diversity_factor,
            recency_weight,
            countries,
            category: non_blank(query.category),
        })
    }
}

/// Raw clustering options from a request body.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClusterConfigInput {
    pub similarity_threshold: Option<f64>,
    pub max_clusters: Option<i64>,
    pub max_related_per_cluster: Option<i64>,
}

impl ClusterConfigInput {
    pub fn resolve(self, defaults: &ClusterConfig) -> Result<ClusterConfig> {
        let similarity_threshold = match self.similarity_threshold {
            Some(t) if t.is_finite() && (0.0..=1.0).contains(&t) => t,
            Some(t) => {
                return Err(FeedError::configuration(
                    "similarity_threshold",
                    format!("must be within [0, 1], got {}", t),
                ))
            }
            None => defaults.similarity_threshold,
        };
        let max_clusters = match self.max_clusters {
            Some(n) => non_negative_int("max_clusters", n)?.clamp(1, MAX_CLUSTERS_LIMIT),
            None => defaults.max_clusters,
        };
        let max_related_per_cluster = match self.max_related_per_cluster {
            Some(n) => non_negative_int("max_related_per_cluster", n)?.min(MAX_RELATED_LIMIT),
            None => defaults.max_related_per_cluster,
        };

        Ok(ClusterConfig {
            similarity_threshold,
            max_clusters,
            max_related_per_cluster,
        })
    }
}
