//! Near-duplicate story clustering by title token overlap.
//!
//! Clustering is greedy single-linkage over the input order: each article
//! joins the first cluster whose primary headline is similar enough and which
//! has no member from the same source, or else opens a new cluster. The same
//! input and config always produce the same clusters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Article, StoryCluster};

/// Titles are truncated to this many characters before tokenizing.
pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_TITLE_TOKENS: usize = 50;
/// Articles beyond this many are ignored.
pub const MAX_CLUSTER_INPUT: usize = 1000;

const MIN_TOKEN_CHARS: usize = 4;

/// Generic newsroom vocabulary that says nothing about the event itself.
const STOP_WORDS: &[&str] = &[
    "about", "after", "amid", "analysis", "breaking", "could", "exclusive", "from", "have",
    "latest", "live", "news", "opinion", "over", "photos", "report", "reported", "reports",
    "said", "says", "than", "that", "their", "these", "they", "this", "update", "updated",
    "updates", "video", "watch", "what", "when", "where", "which", "while", "will", "with",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub similarity_threshold: f64,
    pub max_clusters: usize,
    pub max_related_per_cluster: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.4,
            max_clusters: 50,
            max_related_per_cluster: 5,
        }
    }
}

pub fn normalize_title(title: &str) -> HashSet<String> {
    let capped: String = title.chars().take(MAX_TITLE_CHARS).collect();
    let cleaned: String = capped
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|token| !STOP_WORDS.contains(token))
        .take(MAX_TITLE_TOKENS)
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two token sets; 0.0 when either is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

pub fn title_similarity(a: &str, b: &str) -> f64 {
    jaccard(&normalize_title(a), &normalize_title(b))
}

struct Candidate {
    cluster: StoryCluster,
    tokens: HashSet<String>,
}

pub fn cluster_articles(articles: &[Article], config: Option<&ClusterConfig>) -> Vec<StoryCluster> {
    let defaults = ClusterConfig::default();
    let config = config.unwrap_or(&defaults);
    let threshold = if config.similarity_threshold.is_finite() {
        config.similarity_threshold.clamp(0.0, 1.0)
    } else {
        defaults.similarity_threshold
    };

    let mut clusters: Vec<Candidate> = Vec::new();
    let mut dropped = 0usize;

    for article in articles.iter().take(MAX_CLUSTER_INPUT) {
        let tokens = normalize_title(&article.title);

        let target = if tokens.is_empty() {
            None
        } else {
            clusters.iter().position(|c| {
                !c.cluster.has_source(&article.source_id)
                    && jaccard(&c.tokens, &tokens) >= threshold
            })
        };

        match target {
            Some(index) => {
                let cluster = &mut clusters[index].cluster;
                if cluster.related_articles.len() < config.max_related_per_cluster {
                    cluster.push_related(article.clone());
                } else {
                    dropped += 1;
                }
            }
            None if clusters.len() < config.max_clusters => clusters.push(Candidate {
                cluster: StoryCluster::new(article.clone()),
                tokens,
            }),
            None => dropped += 1,
        }
    }

    debug!(
        input = articles.len(),
        clusters = clusters.len(),
        dropped,
        "Clustered articles"
    );

    clusters.into_iter().map(|c| c.cluster).collect()
}
