//! Request-level orchestration of the feed and story operations.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::cluster::{cluster_articles, ClusterConfig, MAX_CLUSTER_INPUT};
use crate::config::{Config, FeedSettings, ScoringWeights};
use crate::error::{FeedError, Result};
use crate::model::{Article, FeedExplanation, FeedPage, InterestSummary, StoryCluster};
use crate::options::FeedOptions;
use crate::ranker::{self, RankOptions};
use crate::scorer::Scorer;
use crate::signals::SignalCollector;
use crate::store::{CandidateFilter, CandidateSource, ProfileStore};

const TOP_INTERESTS: usize = 5;

pub struct FeedService {
    candidates: Arc<dyn CandidateSource>,
    signals: SignalCollector,
    settings: FeedSettings,
    weights: ScoringWeights,
    clustering: ClusterConfig,
    cluster_window: Duration,
}

impl FeedService {
    pub fn new(
        candidates: Arc<dyn CandidateSource>,
        profiles: Arc<dyn ProfileStore>,
        config: &Config,
    ) -> Self {
        Self {
            candidates,
            signals: SignalCollector::new(
                profiles,
                Duration::days(config.feed.history_window_days),
            ),
            settings: config.feed.clone(),
            weights: config.weights.clone(),
            clustering: config.clustering.cluster_config(),
            cluster_window: Duration::hours(config.clustering.window_hours),
        }
    }

    pub fn cluster_defaults(&self) -> &ClusterConfig {
        &self.clustering
    }

    pub async fn get_personalized_feed(
        &self,
        viewer_id: Option<&str>,
        options: &FeedOptions,
    ) -> Result<FeedPage> {
        self.get_personalized_feed_at(viewer_id, options, Utc::now())
            .await
    }

    /// Ranks the feed as of `now`. Pages requested with the same `now` are
    /// slices of one ranking.
    pub async fn get_personalized_feed_at(
        &self,
        viewer_id: Option<&str>,
        options: &FeedOptions,
        now: DateTime<Utc>,
    ) -> Result<FeedPage> {
        let filter = CandidateFilter {
            category: options.category.clone(),
            countries: options.countries.clone(),
            since: Some(now - Duration::hours(self.settings.candidate_window_hours)),
        };

        let (profile, candidates) = tokio::join!(
            self.signals.collect(viewer_id),
            self.candidates
                .fetch_published(&filter, self.settings.candidate_limit, 0),
        );
        let (articles, candidate_total) = candidates.map_err(|e| {
            warn!("Candidate fetch failed: {:#}", e);
            FeedError::CandidateFetch(e)
        })?;
        let profile = profile?;

        let is_personalized = viewer_id.is_some() && profile.has_signals();
        let scorer = Scorer::new(
            &self.weights,
            is_personalized.then_some(&profile),
            options.recency_weight,
            now,
        );
        let scored = scorer.score_all(articles);

        let ranked = ranker::rank(
            scored,
            &profile.recently_read,
            &RankOptions {
                exclude_read: options.exclude_read,
                diversity_factor: options.diversity_factor,
                diversity_window: self.settings.diversity_window,
                diversity_penalty: self.settings.diversity_penalty,
            },
        );
        let total = ranked.len();
        let articles = ranker::paginate(ranked, options.limit, options.offset);

        let countries = match &options.countries {
            Some(countries) => countries.clone(),
            None => profile
                .countries
                .iter()
                .map(|c| c.country_id.clone())
                .collect(),
        };

        info!(
            viewer = viewer_id.unwrap_or("anonymous"),
            candidates = candidate_total,
            ranked = total,
            returned = articles.len(),
            is_personalized,
            "Assembled feed"
        );

        Ok(FeedPage {
            articles,
            total,
            is_personalized,
            countries,
        })
    }

    /// Summary of the signals currently shaping a viewer's feed.
    pub async fn get_feed_explanation(&self, viewer_id: &str) -> Result<FeedExplanation> {
        let profile = self.signals.collect(Some(viewer_id)).await?;

        let sorted = |set: HashSet<String>| {
            let mut items: Vec<String> = set.into_iter().collect();
            items.sort();
            items
        };

        let mut top_interests: Vec<InterestSummary> = profile
            .category_affinity
            .iter()
            .map(|(category_id, affinity)| InterestSummary {
                category_id: category_id.clone(),
                score: affinity.interest_score(),
            })
            .collect();
        top_interests.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.category_id.cmp(&b.category_id))
        });
        top_interests.truncate(TOP_INTERESTS);

        Ok(FeedExplanation {
            sources: sorted(profile.followed_sources),
            authors: sorted(profile.followed_authors),
            categories: sorted(profile.followed_categories),
            top_interests,
        })
    }

    async fn recent_window(&self, now: DateTime<Utc>) -> Result<Vec<Article>> {
        let filter = CandidateFilter {
            since: Some(now - self.cluster_window),
            ..Default::default()
        };
        let (articles, _) = self
            .candidates
            .fetch_published(&filter, MAX_CLUSTER_INPUT as i64, 0)
            .await
            .map_err(FeedError::CandidateFetch)?;
        Ok(articles)
    }

    /// Story clusters from the recent window, largest first.
    pub async fn trending_stories(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoryCluster>> {
        let articles = self.recent_window(now).await?;
        let mut clusters = cluster_articles(&articles, Some(&self.clustering));
        clusters.sort_by(|a, b| b.count.cmp(&a.count));
        clusters.truncate(limit);
        Ok(clusters)
    }

    /// Other coverage of the same story as `article_id`.
    pub async fn related_articles(
        &self,
        article_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let articles = self.recent_window(now).await?;
        let clusters = cluster_articles(&articles, Some(&self.clustering));

        let Some(cluster) = clusters.into_iter().find(|c| c.contains(article_id)) else {
            return Ok(Vec::new());
        };

        Ok(std::iter::once(cluster.primary)
            .chain(cluster.related_articles)
            .filter(|a| a.id != article_id)
            .collect())
    }
}
