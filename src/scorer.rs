//! Weighted, explainable scoring of feed candidates.

use chrono::{DateTime, Utc};

use crate::config::ScoringWeights;
use crate::model::{Article, ScoreBreakdown, ScoredArticle, ViewerProfile};

/// Articles older than this earn no recency score.
pub const RECENCY_HORIZON_HOURS: f64 = 72.0;

/// Linear decay from 1.0 at publication to 0.0 at the horizon. Future-dated
/// articles count as just published.
pub fn recency_decay(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - published_at).num_seconds().max(0) as f64 / 3600.0;
    (1.0 - age_hours / RECENCY_HORIZON_HOURS).clamp(0.0, 1.0)
}

/// Log-scaled engagement relative to the most engaged candidate.
pub fn engagement_ratio(engagement: f64, max_engagement: f64) -> f64 {
    if max_engagement <= 0.0 {
        return 0.0;
    }
    (engagement.max(0.0).ln_1p() / max_engagement.ln_1p()).clamp(0.0, 1.0)
}

pub struct Scorer<'a> {
    weights: &'a ScoringWeights,
    /// `None` selects the non-personalized policy.
    profile: Option<&'a ViewerProfile>,
    recency_weight: f64,
    now: DateTime<Utc>,
}

impl<'a> Scorer<'a> {
    pub fn new(
        weights: &'a ScoringWeights,
        profile: Option<&'a ViewerProfile>,
        recency_weight: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            weights,
            profile,
            recency_weight: recency_weight.max(0.0),
            now,
        }
    }

    pub fn score_all(&self, candidates: Vec<Article>) -> Vec<ScoredArticle> {
        let max_engagement = candidates
            .iter()
            .map(Article::engagement)
            .fold(0.0, f64::max);
        let max_interest = self
            .profile
            .map(|p| {
                p.category_affinity
                    .values()
                    .map(|a| a.interest_score())
                    .fold(0.0, f64::max)
            })
            .unwrap_or(0.0);

        candidates
            .into_iter()
            .map(|article| {
                let breakdown = self.breakdown(&article, max_engagement, max_interest);
                ScoredArticle::new(article, breakdown)
            })
            .collect()
    }

    fn breakdown(&self, article: &Article, max_engagement: f64, max_interest: f64) -> ScoreBreakdown {
        let w = self.weights;
        let mut breakdown = ScoreBreakdown {
            recency: w.recency * self.recency_weight * recency_decay(article.published_at, self.now),
            engagement: w.engagement * engagement_ratio(article.engagement(), max_engagement),
            ..Default::default()
        };

        let Some(profile) = self.profile else {
            return breakdown;
        };

        if profile.followed_sources.contains(&article.source_id) {
            breakdown.followed_source = w.followed_source;
        }
        if let Some(author) = &article.author {
            if profile.followed_authors.contains(author) {
                breakdown.followed_author = w.followed_author;
            }
        }
        if let Some(category) = &article.category_id {
            if profile.followed_categories.contains(category) {
                breakdown.followed_category = w.followed_category;
            }
            if max_interest > 0.0 {
                if let Some(affinity) = profile.category_affinity.get(category) {
                    let ratio = (affinity.interest_score() / max_interest).clamp(0.0, 1.0);
                    breakdown.category_affinity = w.category_affinity * ratio;
                }
            }
        }
        if let Some(country) = &article.country_id {
            if profile.primary_country() == Some(country.as_str()) {
                breakdown.primary_country = w.primary_country;
            } else if profile.prefers_country(country) {
                breakdown.primary_country = w.other_country;
            }
        }

        breakdown
    }
}
