//! Request-scoped values flowing through the feed pipeline.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub source_id: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub country_id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub bookmarks: i64,
}

impl Article {
    /// Weighted interaction count: `views + 3*likes + 2*bookmarks`.
    pub fn engagement(&self) -> f64 {
        let views = self.views.max(0) as f64;
        let likes = self.likes.max(0) as f64;
        let bookmarks = self.bookmarks.max(0) as f64;
        views + 3.0 * likes + 2.0 * bookmarks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryPreference {
    pub country_id: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryAffinity {
    pub read_count: i64,
    /// Seconds spent reading articles in the category.
    pub total_time: f64,
    /// Mean scroll depth, 0.0 to 1.0.
    pub avg_depth: f64,
}

impl CategoryAffinity {
    pub fn interest_score(&self) -> f64 {
        let reads = self.read_count.max(0) as f64;
        let minutes = self.total_time.max(0.0) / 60.0;
        let depth = self.avg_depth.clamp(0.0, 1.0);
        reads + minutes + 5.0 * depth
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerProfile {
    pub followed_sources: HashSet<String>,
    pub followed_authors: HashSet<String>,
    pub followed_categories: HashSet<String>,
    pub countries: Vec<CountryPreference>,
    pub category_affinity: HashMap<String, CategoryAffinity>,
    pub recently_read: HashSet<String>,
}

impl ViewerProfile {
    pub fn primary_country(&self) -> Option<&str> {
        self.countries
            .iter()
            .find(|c| c.is_primary)
            .map(|c| c.country_id.as_str())
    }

    pub fn prefers_country(&self, country_id: &str) -> bool {
        self.countries.iter().any(|c| c.country_id == country_id)
    }

    /// True when the viewer has any follow, reading history or affinity.
    /// Country preferences alone do not personalize a feed.
    pub fn has_signals(&self) -> bool {
        !self.followed_sources.is_empty()
            || !self.followed_authors.is_empty()
            || !self.followed_categories.is_empty()
            || !self.category_affinity.is_empty()
            || !self.recently_read.is_empty()
    }
}

/// Per-signal contributions to an article's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub recency: f64,
    pub engagement: f64,
    pub followed_source: f64,
    pub followed_author: f64,
    pub followed_category: f64,
    pub primary_country: f64,
    pub category_affinity: f64,
    /// Zero or negative.
    pub diversity: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.recency
            + self.engagement
            + self.followed_source
            + self.followed_author
            + self.followed_category
            + self.primary_country
            + self.category_affinity
            + self.diversity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

impl ScoredArticle {
    pub fn new(article: Article, breakdown: ScoreBreakdown) -> Self {
        Self {
            article,
            score: breakdown.total(),
            breakdown,
        }
    }

    pub fn apply_diversity_penalty(&mut self, penalty: f64) {
        self.breakdown.diversity = -penalty;
        self.score = self.breakdown.total();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryCluster {
    pub id: String,
    pub primary: Article,
    pub related_articles: Vec<Article>,
    pub count: usize,
}

impl StoryCluster {
    pub fn new(primary: Article) -> Self {
        Self {
            id: format!("cluster-{}", primary.id),
            primary,
            related_articles: Vec::new(),
            count: 1,
        }
    }

    pub fn has_source(&self, source_id: &str) -> bool {
        self.primary.source_id == source_id
            || self.related_articles.iter().any(|a| a.source_id == source_id)
    }

    pub fn contains(&self, article_id: &str) -> bool {
        self.primary.id == article_id || self.related_articles.iter().any(|a| a.id == article_id)
    }

    pub(crate) fn push_related(&mut self, article: Article) {
        self.related_articles.push(article);
        self.count += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub articles: Vec<ScoredArticle>,
    pub total: usize,
    pub is_personalized: bool,
    pub countries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestSummary {
    pub category_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedExplanation {
    pub sources: Vec<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub top_interests: Vec<InterestSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, source: &str) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {}", id),
            source_id: source.to_string(),
            source_name: source.to_string(),
            category_id: None,
            country_id: None,
            author: None,
            published_at: Utc::now(),
            views: 0,
            likes: 0,
            bookmarks: 0,
        }
    }

    #[test]
    fn test_engagement_weights_likes_and_bookmarks() {
        let mut a = article("1", "s");
        a.views = 10;
        a.likes = 2;
        a.bookmarks = 1;
        assert_eq!(a.engagement(), 18.0);
    }

    #[test]
    fn test_engagement_ignores_negative_counts() {
        let mut a = article("1", "s");
        a.views = -50;
        a.likes = 1;
        assert_eq!(a.engagement(), 3.0);
    }

    #[test]
    fn test_breakdown_total_sums_fields() {
        let breakdown = ScoreBreakdown {
            recency: 0.3,
            engagement: 0.2,
            followed_source: 0.15,
            followed_author: 0.0,
            followed_category: 0.1,
            primary_country: 0.05,
            category_affinity: 0.1,
            diversity: -0.1,
        };
        assert!((breakdown.total() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_diversity_penalty_keeps_score_consistent() {
        let mut scored = ScoredArticle::new(
            article("1", "s"),
            ScoreBreakdown {
                recency: 0.5,
                ..Default::default()
            },
        );
        scored.apply_diversity_penalty(0.2);
        assert_eq!(scored.breakdown.diversity, -0.2);
        assert!((scored.score - 0.3).abs() < 1e-12);
        assert_eq!(scored.score, scored.breakdown.total());
    }

    #[test]
    fn test_primary_country() {
        let profile = ViewerProfile {
            countries: vec![
                CountryPreference {
                    country_id: "za".to_string(),
                    is_primary: false,
                },
                CountryPreference {
                    country_id: "zw".to_string(),
                    is_primary: true,
                },
            ],
            ..Default::default()
        };
        assert_eq!(profile.primary_country(), Some("zw"));
        assert!(profile.prefers_country("za"));
        assert!(!profile.prefers_country("ke"));
    }

    #[test]
    fn test_countries_alone_are_not_signals() {
        let mut profile = ViewerProfile {
            countries: vec![CountryPreference {
                country_id: "zw".to_string(),
                is_primary: true,
            }],
            ..Default::default()
        };
        assert!(!profile.has_signals());

        profile.recently_read.insert("a1".to_string());
        assert!(profile.has_signals());
    }

    #[test]
    fn test_interest_score_clamps_depth() {
        let affinity = CategoryAffinity {
            read_count: 4,
            total_time: 120.0,
            avg_depth: 3.0,
        };
        assert_eq!(affinity.interest_score(), 4.0 + 2.0 + 5.0);
    }

    #[test]
    fn test_cluster_membership_helpers() {
        let mut cluster = StoryCluster::new(article("a", "herald"));
        assert_eq!(cluster.id, "cluster-a");
        cluster.push_related(article("b", "chronicle"));
        assert_eq!(cluster.count, 2);
        assert!(cluster.has_source("chronicle"));
        assert!(!cluster.has_source("sports"));
        assert!(cluster.contains("b"));
    }
}
