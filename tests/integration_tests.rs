//! Integration tests for feedrank
//!
//! These tests drive the feed pipeline end to end against an on-disk SQLite
//! database, from configuration loading through ranking and clustering.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use chrono::{DateTime, Duration, Utc};
    use feedrank::model::Article;
    use tempfile::TempDir;

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }

    pub fn article(
        id: &str,
        source: &str,
        category: &str,
        title: &str,
        published_at: DateTime<Utc>,
    ) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            source_id: source.to_string(),
            source_name: source.to_uppercase(),
            category_id: Some(category.to_string()),
            country_id: Some("zw".to_string()),
            author: None,
            published_at,
            views: 0,
            likes: 0,
            bookmarks: 0,
        }
    }

    pub fn hours_ago(hours: i64) -> DateTime<Utc> {
        Utc::now() - Duration::hours(hours)
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use feedrank::config::Config;

    #[test]
    fn test_load_shipped_config() {
        let config = Config::load("feedrank.toml");
        assert!(config.is_ok(), "Failed to load feedrank.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(config.feed.candidate_limit > 0);
        assert!((0.0..=1.0).contains(&config.clustering.similarity_threshold));
    }

    #[test]
    fn test_config_from_file() {
        let toml_content = r#"
            database_url = "sqlite::memory:"

            [feed]
            diversity_window = 8

            [weights]
            followed_source = 0.4
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.feed.diversity_window, 8);
        assert_eq!(config.weights.followed_source, 0.4);
        assert_eq!(config.weights.recency, 0.30);
    }
}

#[cfg(test)]
mod feed_integration_tests {
    use super::common::*;
    use chrono::Utc;
    use feedrank::config::Config;
    use feedrank::db::Database;
    use feedrank::feed::FeedService;
    use feedrank::options::FeedOptions;
    use feedrank::store::FollowKind;
    use std::sync::Arc;

    async fn setup() -> (tempfile::TempDir, Arc<Database>, FeedService) {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        let db = Database::new(&db_url).await.unwrap();
        db.initialize().await.unwrap();

        for i in 0..40 {
            let category = if i % 4 == 0 { "sport" } else { "politics" };
            let mut a = article(
                &format!("a{:02}", i),
                &format!("src{}", i % 5),
                category,
                &format!("Story number {}", i),
                hours_ago(i),
            );
            a.views = (i * 13) % 200;
            a.likes = i % 7;
            db.upsert_article(&a).await.unwrap();
        }

        let db = Arc::new(db);
        let config = Config::from_str("").unwrap();
        let service = FeedService::new(db.clone(), db.clone(), &config);
        (temp_dir, db, service)
    }

    #[tokio::test]
    async fn test_anonymous_feed_from_database() {
        let (_dir, _db, service) = setup().await;

        let page = service
            .get_personalized_feed(None, &FeedOptions::default())
            .await
            .unwrap();

        assert!(!page.is_personalized);
        assert_eq!(page.total, 40);
        assert_eq!(page.articles.len(), 20);
        for scored in &page.articles {
            assert!((scored.breakdown.total() - scored.score).abs() < 1e-9);
            assert_eq!(scored.breakdown.followed_source, 0.0);
        }
    }

    #[tokio::test]
    async fn test_personalized_feed_from_database() {
        let (_dir, db, service) = setup().await;
        db.add_follow("v1", FollowKind::Category, "sport").await.unwrap();
        db.set_country_preference("v1", "zw", true).await.unwrap();
        db.record_read("v1", "a00", 300.0, 0.9, Utc::now()).await.unwrap();
        db.record_read("v1", "a04", 120.0, 0.6, Utc::now()).await.unwrap();

        let options = FeedOptions {
            exclude_read: true,
            diversity_factor: 0.0,
            limit: 100,
            ..Default::default()
        };
        let page = service
            .get_personalized_feed(Some("v1"), &options)
            .await
            .unwrap();

        assert!(page.is_personalized);
        assert_eq!(page.countries, vec!["zw".to_string()]);
        assert_eq!(page.total, 38);
        assert!(page
            .articles
            .iter()
            .all(|s| s.article.id != "a00" && s.article.id != "a04"));

        let top = &page.articles[0];
        assert_eq!(top.article.category_id.as_deref(), Some("sport"));
        assert!(top.breakdown.followed_category > 0.0);
        assert!(top.breakdown.category_affinity > 0.0);
        assert!(top.breakdown.primary_country > 0.0);
    }

    #[tokio::test]
    async fn test_page_two_matches_slice_of_page_one() {
        let (_dir, db, service) = setup().await;
        db.add_follow("v1", FollowKind::Source, "src2").await.unwrap();
        let epoch = Utc::now();

        let wide = service
            .get_personalized_feed_at(
                Some("v1"),
                &FeedOptions {
                    limit: 20,
                    offset: 0,
                    ..Default::default()
                },
                epoch,
            )
            .await
            .unwrap();
        let narrow = service
            .get_personalized_feed_at(
                Some("v1"),
                &FeedOptions {
                    limit: 10,
                    offset: 10,
                    ..Default::default()
                },
                epoch,
            )
            .await
            .unwrap();

        assert_eq!(narrow.articles, wide.articles[10..20].to_vec());
        assert_eq!(narrow.total, wide.total);
    }

    #[tokio::test]
    async fn test_explanation_from_database() {
        let (_dir, db, service) = setup().await;
        db.add_follow("v1", FollowKind::Source, "src1").await.unwrap();
        db.add_follow("v1", FollowKind::Author, "Jane Doe").await.unwrap();
        db.record_read("v1", "a01", 60.0, 0.5, Utc::now()).await.unwrap();

        let explanation = service.get_feed_explanation("v1").await.unwrap();
        assert_eq!(explanation.sources, vec!["src1".to_string()]);
        assert_eq!(explanation.authors, vec!["Jane Doe".to_string()]);
        assert_eq!(explanation.top_interests.len(), 1);
        assert_eq!(explanation.top_interests[0].category_id, "politics");
    }
}

#[cfg(test)]
mod clustering_integration_tests {
    use super::common::*;
    use feedrank::cluster::{cluster_articles, title_similarity, ClusterConfig};
    use feedrank::config::Config;
    use feedrank::db::Database;
    use feedrank::feed::FeedService;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_reference_example() {
        let articles = vec![
            article("a", "herald", "news", "Zimbabwe announces major economic reforms", hours_ago(1)),
            article("b", "chronicle", "news", "Major economic reforms announced in Zimbabwe", hours_ago(2)),
            article("c", "sportsnews", "sport", "Sports team wins championship", hours_ago(3)),
        ];

        let clusters = cluster_articles(&articles, None);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[0].primary.id, "a");
        assert_eq!(clusters[0].related_articles[0].id, "b");
        assert_eq!(clusters[1].count, 1);
        assert_eq!(clusters[1].primary.id, "c");
    }

    #[test]
    fn test_similarity_properties() {
        let x = "Parliament passes new mining law";
        let y = "Mining law passed by parliament";
        assert_eq!(title_similarity(x, x), 1.0);
        assert_eq!(title_similarity(x, y), title_similarity(y, x));
        assert_eq!(title_similarity(x, "Cricket side tours England"), 0.0);
    }

    #[test]
    fn test_large_input_respects_bounds() {
        let title = "Parliament passes new mining law";
        let articles: Vec<_> = (0..300)
            .map(|i| {
                article(
                    &format!("a{}", i),
                    &format!("src{}", i % 25),
                    "news",
                    title,
                    hours_ago(1),
                )
            })
            .collect();
        let config = ClusterConfig {
            max_related_per_cluster: 2,
            ..Default::default()
        };

        let clusters = cluster_articles(&articles, Some(&config));
        for cluster in &clusters {
            assert!(cluster.related_articles.len() <= 2);
            assert_eq!(cluster.count, cluster.related_articles.len() + 1);

            let mut sources = HashSet::new();
            assert!(sources.insert(&cluster.primary.source_id));
            for related in &cluster.related_articles {
                assert!(sources.insert(&related.source_id));
            }
        }
    }

    #[tokio::test]
    async fn test_trending_and_related_from_database() {
        let temp_dir = create_temp_dir();
        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();

        let stories = [
            ("a", "herald", "Zimbabwe announces major economic reforms", 1),
            ("b", "chronicle", "Major economic reforms announced in Zimbabwe", 2),
            ("c", "sportsnews", "Sports team wins championship", 3),
        ];
        for (id, source, title, hours) in stories {
            db.upsert_article(&article(id, source, "news", title, hours_ago(hours)))
                .await
                .unwrap();
        }

        let db = Arc::new(db);
        let config = Config::from_str("").unwrap();
        let service = FeedService::new(db.clone(), db, &config);

        let trending = service.trending_stories(5, chrono::Utc::now()).await.unwrap();
        assert_eq!(trending.len(), 2);
        assert_eq!(trending[0].id, "cluster-a");

        let related = service.related_articles("a", chrono::Utc::now()).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, "b");
    }
}
