//! Collaborator interfaces the feed core consumes, plus an in-memory
//! implementation of both.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::model::{Article, CategoryAffinity, CountryPreference};
use crate::signals::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FollowKind {
    Source,
    Author,
    Category,
}

impl FollowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowKind::Source => "source",
            FollowKind::Author => "author",
            FollowKind::Category => "category",
        }
    }
}

/// Base filter applied to published articles before scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilter {
    pub category: Option<String>,
    pub countries: Option<Vec<String>>,
    pub since: Option<DateTime<Utc>>,
}

impl CandidateFilter {
    pub fn matches(&self, article: &Article) -> bool {
        if let Some(category) = &self.category {
            if article.category_id.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(countries) = &self.countries {
            match &article.country_id {
                Some(country) if countries.contains(country) => {}
                _ => return false,
            }
        }
        if let Some(since) = self.since {
            if article.published_at < since {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Published articles matching `filter`, newest first, with the total
    /// number of matches before `limit`/`offset`.
    async fn fetch_published(
        &self,
        filter: &CandidateFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Article>, i64)>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_follows(&self, viewer_id: &str, kind: FollowKind) -> anyhow::Result<Vec<String>>;

    async fn get_country_preferences(
        &self,
        viewer_id: &str,
    ) -> anyhow::Result<Vec<CountryPreference>>;

    async fn get_category_affinity(
        &self,
        viewer_id: &str,
    ) -> anyhow::Result<HashMap<String, CategoryAffinity>>;

    async fn get_recently_read(
        &self,
        viewer_id: &str,
        window: Duration,
    ) -> anyhow::Result<HashSet<String>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    articles: Vec<Article>,
    follows: HashMap<(String, FollowKind), Vec<String>>,
    countries: HashMap<String, Vec<CountryPreference>>,
    affinity: HashMap<String, HashMap<String, CategoryAffinity>>,
    reads: HashMap<String, Vec<(String, DateTime<Utc>)>>,
    failing_signals: HashSet<Signal>,
    failing_candidates: bool,
}

/// In-memory store backing both collaborator traits. Individual signals and
/// the candidate fetch can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_article(&self, article: Article) {
        let mut state = self.state.write().await;
        if let Some(existing) = state.articles.iter_mut().find(|a| a.id == article.id) {
            *existing = article;
        } else {
            state.articles.push(article);
        }
    }

    pub async fn follow(&self, viewer_id: &str, kind: FollowKind, target: &str) {
        let mut state = self.state.write().await;
        let targets = state
            .follows
            .entry((viewer_id.to_string(), kind))
            .or_default();
        if !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
    }

    pub async fn set_country_preferences(&self, viewer_id: &str, prefs: Vec<CountryPreference>) {
        let mut state = self.state.write().await;
        state.countries.insert(viewer_id.to_string(), prefs);
    }

    pub async fn set_category_affinity(
        &self,
        viewer_id: &str,
        category_id: &str,
        affinity: CategoryAffinity,
    ) {
        let mut state = self.state.write().await;
        state
            .affinity
            .entry(viewer_id.to_string())
            .or_default()
            .insert(category_id.to_string(), affinity);
    }

    pub async fn record_read(&self, viewer_id: &str, article_id: &str, read_at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state
            .reads
            .entry(viewer_id.to_string())
            .or_default()
            .push((article_id.to_string(), read_at));
    }

    pub async fn fail_signal(&self, signal: Signal) {
        self.state.write().await.failing_signals.insert(signal);
    }

    pub async fn fail_candidates(&self) {
        self.state.write().await.failing_candidates = true;
    }

    async fn check_signal(&self, signal: Signal) -> anyhow::Result<()> {
        if self.state.read().await.failing_signals.contains(&signal) {
            anyhow::bail!("{} store unavailable", signal);
        }
        Ok(())
    }
}

#[async_trait]
impl CandidateSource for MemoryStore {
    async fn fetch_published(
        &self,
        filter: &CandidateFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Article>, i64)> {
        let state = self.state.read().await;
        if state.failing_candidates {
            anyhow::bail!("article store unavailable");
        }

        let mut matching: Vec<Article> = state
            .articles
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_follows(&self, viewer_id: &str, kind: FollowKind) -> anyhow::Result<Vec<String>> {
        self.check_signal(Signal::from(kind)).await?;
        let state = self.state.read().await;
        Ok(state
            .follows
            .get(&(viewer_id.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_country_preferences(
        &self,
        viewer_id: &str,
    ) -> anyhow::Result<Vec<CountryPreference>> {
        self.check_signal(Signal::Countries).await?;
        let state = self.state.read().await;
        Ok(state.countries.get(viewer_id).cloned().unwrap_or_default())
    }

    async fn get_category_affinity(
        &self,
        viewer_id: &str,
    ) -> anyhow::Result<HashMap<String, CategoryAffinity>> {
        self.check_signal(Signal::CategoryAffinity).await?;
        let state = self.state.read().await;
        Ok(state.affinity.get(viewer_id).cloned().unwrap_or_default())
    }

    async fn get_recently_read(
        &self,
        viewer_id: &str,
        window: Duration,
    ) -> anyhow::Result<HashSet<String>> {
        self.check_signal(Signal::RecentlyRead).await?;
        let cutoff = Utc::now() - window;
        let state = self.state.read().await;
        Ok(state
            .reads
            .get(viewer_id)
            .map(|reads| {
                reads
                    .iter()
                    .filter(|(_, read_at)| *read_at >= cutoff)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
