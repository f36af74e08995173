use serde::Deserialize;
use std::path::Path;

use crate::cluster::ClusterConfig;

/// Upper bound for candidate and clustering windows: one leap year.
pub const MAX_WINDOW_HOURS: i64 = 366 * 24;
pub const MAX_HISTORY_DAYS: i64 = 366;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub clustering: ClusteringSettings,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite:feedrank.db?mode=rwc".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FeedSettings {
    /// Upper bound on candidates pulled per request.
    pub candidate_limit: i64,
    pub candidate_window_hours: i64,
    pub history_window_days: i64,
    /// Number of recently emitted articles the diversity pass looks back on.
    pub diversity_window: usize,
    /// Score subtracted per repeat at `diversity_factor = 1.0`.
    pub diversity_penalty: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            candidate_limit: 500,
            candidate_window_hours: 168,
            history_window_days: 30,
            diversity_window: 5,
            diversity_penalty: 0.1,
        }
    }
}

/// Maximum contribution of each signal to an article's score.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub recency: f64,
    pub engagement: f64,
    pub followed_source: f64,
    pub followed_author: f64,
    pub followed_category: f64,
    pub primary_country: f64,
    pub other_country: f64,
    pub category_affinity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            recency: 0.30,
            engagement: 0.20,
            followed_source: 0.15,
            followed_author: 0.10,
            followed_category: 0.10,
            primary_country: 0.10,
            other_country: 0.05,
            category_affinity: 0.15,
        }
    }
}

impl ScoringWeights {
    fn entries(&self) -> [(&'static str, f64); 8] {
        [
            ("recency", self.recency),
            ("engagement", self.engagement),
            ("followed_source", self.followed_source),
            ("followed_author", self.followed_author),
            ("followed_category", self.followed_category),
            ("primary_country", self.primary_country),
            ("other_country", self.other_country),
            ("category_affinity", self.category_affinity),
        ]
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClusteringSettings {
    pub similarity_threshold: f64,
    pub max_clusters: usize,
    pub max_related_per_cluster: usize,
    /// Age of the oldest article considered for trending and related stories.
    pub window_hours: i64,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        let defaults = ClusterConfig::default();
        Self {
            similarity_threshold: defaults.similarity_threshold,
            max_clusters: defaults.max_clusters,
            max_related_per_cluster: defaults.max_related_per_cluster,
            window_hours: 48,
        }
    }
}

impl ClusteringSettings {
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            similarity_threshold: self.similarity_threshold,
            max_clusters: self.max_clusters,
            max_related_per_cluster: self.max_related_per_cluster,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, weight) in self.weights.entries() {
            if !weight.is_finite() || weight < 0.0 {
                anyhow::bail!("weight `{}` must be a non-negative number, got {}", name, weight);
            }
        }

        let threshold = self.clustering.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("similarity_threshold must be within [0, 1], got {}", threshold);
        }

        if self.feed.candidate_limit <= 0 {
            anyhow::bail!("candidate_limit must be positive");
        }
        for (name, hours) in [
            ("candidate_window_hours", self.feed.candidate_window_hours),
            ("window_hours", self.clustering.window_hours),
        ] {
            if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
                anyhow::bail!("{} must be within [1, {}], got {}", name, MAX_WINDOW_HOURS, hours);
            }
        }
        if !(0..=MAX_HISTORY_DAYS).contains(&self.feed.history_window_days) {
            anyhow::bail!(
                "history_window_days must be within [0, {}], got {}",
                MAX_HISTORY_DAYS,
                self.feed.history_window_days
            );
        }
        if !self.feed.diversity_penalty.is_finite() || self.feed.diversity_penalty < 0.0 {
            anyhow::bail!("diversity_penalty must be a non-negative number");
        }

        Ok(())
    }
}
