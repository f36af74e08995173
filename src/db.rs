use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool};

use crate::model::{Article, CategoryAffinity, CountryPreference};
use crate::store::{CandidateFilter, CandidateSource, FollowKind, ProfileStore};

pub struct Database {
    pool: SqlitePool,
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a CandidateFilter) {
    builder.push(" WHERE status = 'published'");

    if let Some(category) = &filter.category {
        builder.push(" AND category_id = ").push_bind(category);
    }
    if let Some(countries) = &filter.countries {
        if countries.is_empty() {
            builder.push(" AND 0");
        } else {
            builder.push(" AND country_id IN (");
            let mut separated = builder.separated(", ");
            for country in countries {
                separated.push_bind(country);
            }
            separated.push_unseparated(")");
        }
    }
    if let Some(since) = filter.since {
        builder.push(" AND published_at >= ").push_bind(since);
    }
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                source_id TEXT NOT NULL,
                source_name TEXT NOT NULL DEFAULT '',
                category_id TEXT,
                country_id TEXT,
                author TEXT,
                published_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'published',
                views INTEGER NOT NULL DEFAULT 0,
                likes INTEGER NOT NULL DEFAULT 0,
                bookmarks INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_status_published
            ON articles(status, published_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS follows (
                viewer_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                target TEXT NOT NULL,
                PRIMARY KEY(viewer_id, kind, target)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS country_preferences (
                viewer_id TEXT NOT NULL,
                country_id TEXT NOT NULL,
                is_primary INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY(viewer_id, country_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reading_history (
                id INTEGER PRIMARY KEY,
                viewer_id TEXT NOT NULL,
                article_id TEXT NOT NULL REFERENCES articles(id),
                time_spent REAL NOT NULL DEFAULT 0,
                scroll_depth REAL NOT NULL DEFAULT 0,
                read_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_history_viewer_read
            ON reading_history(viewer_id, read_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert_article(&self, article: &Article) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles (
                id, title, source_id, source_name, category_id, country_id,
                author, published_at, views, likes, bookmarks
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                source_id = excluded.source_id,
                source_name = excluded.source_name,
                category_id = excluded.category_id,
                country_id = excluded.country_id,
                author = excluded.author,
                published_at = excluded.published_at,
                views = excluded.views,
                likes = excluded.likes,
                bookmarks = excluded.bookmarks
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.source_id)
        .bind(&article.source_name)
        .bind(&article.category_id)
        .bind(&article.country_id)
        .bind(&article.author)
        .bind(article.published_at)
        .bind(article.views)
        .bind(article.likes)
        .bind(article.bookmarks)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_article_status(&self, article_id: &str, status: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE articles SET status = ? WHERE id = ?")
            .bind(status)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_follow(
        &self,
        viewer_id: &str,
        kind: FollowKind,
        target: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO follows (viewer_id, kind, target)
            VALUES (?, ?, ?)
            ON CONFLICT(viewer_id, kind, target) DO NOTHING
            "#,
        )
        .bind(viewer_id)
        .bind(kind.as_str())
        .bind(target)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_country_preference(
        &self,
        viewer_id: &str,
        country_id: &str,
        is_primary: bool,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        // A viewer has at most one primary country.
        if is_primary {
            sqlx::query("UPDATE country_preferences SET is_primary = 0 WHERE viewer_id = ?")
                .bind(viewer_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO country_preferences (viewer_id, country_id, is_primary)
            VALUES (?, ?, ?)
            ON CONFLICT(viewer_id, country_id) DO UPDATE SET
                is_primary = excluded.is_primary
            "#,
        )
        .bind(viewer_id)
        .bind(country_id)
        .bind(is_primary)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn record_read(
        &self,
        viewer_id: &str,
        article_id: &str,
        time_spent: f64,
        scroll_depth: f64,
        read_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reading_history (viewer_id, article_id, time_spent, scroll_depth, read_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(viewer_id)
        .bind(article_id)
        .bind(time_spent)
        .bind(scroll_depth)
        .bind(read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CandidateSource for Database {
    async fn fetch_published(
        &self,
        filter: &CandidateFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Article>, i64)> {
        let mut select = QueryBuilder::<Sqlite>::new(
            "SELECT id, title, source_id, source_name, category_id, country_id, author, \
             published_at, views, likes, bookmarks FROM articles",
        );
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY published_at DESC, id ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let articles = select
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM articles");
        push_filter(&mut count, filter);
        let total: (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok((articles, total.0))
    }
}

#[async_trait]
impl ProfileStore for Database {
    async fn get_follows(&self, viewer_id: &str, kind: FollowKind) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT target FROM follows WHERE viewer_id = ? AND kind = ? ORDER BY target",
        )
        .bind(viewer_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(target,)| target).collect())
    }

    async fn get_country_preferences(
        &self,
        viewer_id: &str,
    ) -> anyhow::Result<Vec<CountryPreference>> {
        let rows: Vec<(String, bool)> = sqlx::query_as(
            r#"
            SELECT country_id, is_primary FROM country_preferences
            WHERE viewer_id = ?
            ORDER BY is_primary DESC, country_id
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(country_id, is_primary)| CountryPreference {
                country_id,
                is_primary,
            })
            .collect())
    }

    async fn get_category_affinity(
        &self,
        viewer_id: &str,
    ) -> anyhow::Result<HashMap<String, CategoryAffinity>> {
        let rows: Vec<(String, i64, f64, f64)> = sqlx::query_as(
            r#"
            SELECT a.category_id,
                   COUNT(*),
                   CAST(COALESCE(SUM(h.time_spent), 0) AS REAL),
                   CAST(COALESCE(AVG(h.scroll_depth), 0) AS REAL)
            FROM reading_history h
            JOIN articles a ON a.id = h.article_id
            WHERE h.viewer_id = ? AND a.category_id IS NOT NULL
            GROUP BY a.category_id
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category_id, read_count, total_time, avg_depth)| {
                (
                    category_id,
                    CategoryAffinity {
                        read_count,
                        total_time,
                        avg_depth,
                    },
                )
            })
            .collect())
    }

    async fn get_recently_read(
        &self,
        viewer_id: &str,
        window: Duration,
    ) -> anyhow::Result<HashSet<String>> {
        let cutoff = Utc::now() - window;
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT article_id FROM reading_history WHERE viewer_id = ? AND read_at >= ?",
        )
        .bind(viewer_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
