//! Builds a [`ViewerProfile`] from independent personalization signals.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, warn};

use crate::error::{FeedError, Result};
use crate::model::ViewerProfile;
use crate::store::{FollowKind, ProfileStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    FollowedSources,
    FollowedAuthors,
    FollowedCategories,
    Countries,
    CategoryAffinity,
    RecentlyRead,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::FollowedSources,
        Signal::FollowedAuthors,
        Signal::FollowedCategories,
        Signal::Countries,
        Signal::CategoryAffinity,
        Signal::RecentlyRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::FollowedSources => "followed_sources",
            Signal::FollowedAuthors => "followed_authors",
            Signal::FollowedCategories => "followed_categories",
            Signal::Countries => "countries",
            Signal::CategoryAffinity => "category_affinity",
            Signal::RecentlyRead => "recently_read",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FollowKind> for Signal {
    fn from(kind: FollowKind) -> Self {
        match kind {
            FollowKind::Source => Signal::FollowedSources,
            FollowKind::Author => Signal::FollowedAuthors,
            FollowKind::Category => Signal::FollowedCategories,
        }
    }
}

pub struct SignalCollector {
    store: Arc<dyn ProfileStore>,
    history_window: Duration,
}

impl SignalCollector {
    pub fn new(store: Arc<dyn ProfileStore>, history_window: Duration) -> Self {
        Self {
            store,
            history_window,
        }
    }

    /// Fetches all signals concurrently. A failing signal degrades to its
    /// empty default; only a viewer whose every signal failed is an error.
    /// Anonymous viewers get an empty profile without touching the store.
    pub async fn collect(&self, viewer_id: Option<&str>) -> Result<ViewerProfile> {
        let Some(viewer_id) = viewer_id else {
            return Ok(ViewerProfile::default());
        };

        let store = self.store.as_ref();
        let (sources, authors, categories, countries, affinity, recently_read) = tokio::join!(
            store.get_follows(viewer_id, FollowKind::Source),
            store.get_follows(viewer_id, FollowKind::Author),
            store.get_follows(viewer_id, FollowKind::Category),
            store.get_country_preferences(viewer_id),
            store.get_category_affinity(viewer_id),
            store.get_recently_read(viewer_id, self.history_window),
        );

        let mut failures = 0;
        let profile = ViewerProfile {
            followed_sources: resolve(viewer_id, Signal::FollowedSources, sources, &mut failures)
                .into_iter()
                .collect(),
            followed_authors: resolve(viewer_id, Signal::FollowedAuthors, authors, &mut failures)
                .into_iter()
                .collect(),
            followed_categories: resolve(
                viewer_id,
                Signal::FollowedCategories,
                categories,
                &mut failures,
            )
            .into_iter()
            .collect(),
            countries: resolve(viewer_id, Signal::Countries, countries, &mut failures),
            category_affinity: resolve(
                viewer_id,
                Signal::CategoryAffinity,
                affinity,
                &mut failures,
            ),
            recently_read: resolve(viewer_id, Signal::RecentlyRead, recently_read, &mut failures),
        };

        if failures == Signal::ALL.len() {
            error!(viewer = viewer_id, "All personalization signals failed");
            return Err(FeedError::SignalCollection {
                viewer_id: viewer_id.to_string(),
            });
        }

        debug!(
            viewer = viewer_id,
            sources = profile.followed_sources.len(),
            authors = profile.followed_authors.len(),
            categories = profile.followed_categories.len(),
            affinities = profile.category_affinity.len(),
            recently_read = profile.recently_read.len(),
            failures,
            "Collected viewer profile"
        );

        Ok(profile)
    }
}

fn resolve<T: Default>(
    viewer_id: &str,
    signal: Signal,
    result: anyhow::Result<T>,
    failures: &mut usize,
) -> T {
    match result {
        Ok(value) => value,
        Err(source) => {
            *failures += 1;
            let err = FeedError::SignalFetch { signal, source };
            warn!(viewer = viewer_id, %signal, "{}; using empty default", err);
            T::default()
        }
    }
}
