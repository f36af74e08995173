//! Orders scored candidates into a feed: sort, read exclusion, diversity
//! decay, then pagination over the final ranking.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

use crate::model::ScoredArticle;

#[derive(Debug, Clone, PartialEq)]
pub struct RankOptions {
    pub exclude_read: bool,
    /// 0.0 disables the diversity pass.
    pub diversity_factor: f64,
    pub diversity_window: usize,
    pub diversity_penalty: f64,
}

fn by_score(a: &ScoredArticle, b: &ScoredArticle) -> Ordering {
    b.score.total_cmp(&a.score)
}

/// Score descending, then newest first, then id for a total order.
fn by_score_then_recency(a: &ScoredArticle, b: &ScoredArticle) -> Ordering {
    by_score(a, b)
        .then_with(|| b.article.published_at.cmp(&a.article.published_at))
        .then_with(|| a.article.id.cmp(&b.article.id))
}

pub fn rank(
    mut scored: Vec<ScoredArticle>,
    recently_read: &HashSet<String>,
    options: &RankOptions,
) -> Vec<ScoredArticle> {
    scored.sort_by(by_score_then_recency);

    if options.exclude_read && !recently_read.is_empty() {
        scored.retain(|s| !recently_read.contains(&s.article.id));
    }

    if options.diversity_factor > 0.0 && options.diversity_window > 0 {
        apply_diversity(&mut scored, options);
        scored.sort_by(by_score);
    }

    scored
}

/// Single forward pass: each candidate is penalized once for every article in
/// the trailing window sharing its category, and once more when that article
/// also shares its source. A source repeat across categories costs nothing.
fn apply_diversity(ranked: &mut [ScoredArticle], options: &RankOptions) {
    let unit = options.diversity_factor.clamp(0.0, 1.0) * options.diversity_penalty;
    let mut window: VecDeque<(Option<String>, String)> =
        VecDeque::with_capacity(options.diversity_window + 1);

    for candidate in ranked.iter_mut() {
        let category = candidate.article.category_id.clone();
        let source = candidate.article.source_id.clone();

        let repeats = window
            .iter()
            .map(|(c, s)| {
                let same_category = category.is_some() && *c == category;
                usize::from(same_category) + usize::from(same_category && *s == source)
            })
            .sum::<usize>();

        if repeats > 0 {
            candidate.apply_diversity_penalty(unit * repeats as f64);
        }

        window.push_back((category, source));
        if window.len() > options.diversity_window {
            window.pop_front();
        }
    }
}

pub fn paginate(ranked: Vec<ScoredArticle>, limit: usize, offset: usize) -> Vec<ScoredArticle> {
    ranked.into_iter().skip(offset).take(limit).collect()
}
