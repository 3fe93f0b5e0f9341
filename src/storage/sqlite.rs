use crate::models::dates;
use crate::models::{Ad, AdFilter, AdPatch, AdScope, AdSummary, AdType, Counter, NewAd};
use crate::storage::trait_def::ensure_patch;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

const AD_COLUMNS: &str = "id, package_name, name, description, ad_type, beginning_date, \
     expiration_date, ad_location, ad_link, ad_image_link, category, click_count, view_count, \
     completed_view_count, created_at, updated_at";

/// Embedded backend for local development and tests.
pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

/// Row layout of the `ads` table; timestamps are unix seconds.
#[derive(Debug, FromRow)]
struct AdRow {
    id: i64,
    package_name: String,
    name: String,
    description: String,
    ad_type: String,
    beginning_date: i64,
    expiration_date: i64,
    ad_location: String,
    ad_link: String,
    ad_image_link: String,
    category: String,
    click_count: i64,
    view_count: i64,
    completed_view_count: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<AdRow> for Ad {
    type Error = StorageError;

    fn try_from(row: AdRow) -> Result<Self, Self::Error> {
        let ad_type = row
            .ad_type
            .parse::<AdType>()
            .map_err(|e| anyhow!("ad {} has a corrupt ad_type: {e}", row.id))?;

        Ok(Ad {
            id: row.id.to_string(),
            package_name: row.package_name,
            name: row.name,
            description: row.description,
            ad_type,
            beginning_date: from_unix(row.beginning_date)?,
            expiration_date: from_unix(row.expiration_date)?,
            ad_location: row.ad_location,
            ad_link: row.ad_link,
            ad_image_link: row.ad_image_link,
            category: row.category,
            click_count: row.click_count,
            view_count: row.view_count,
            completed_view_count: row.completed_view_count,
            created_at: from_unix(row.created_at)?,
            updated_at: from_unix(row.updated_at)?,
        })
    }
}

fn from_unix(secs: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StorageError::Other(anyhow!("timestamp {secs} is out of range")))
}

/// Ids are rowids; anything that is not one cannot match.
fn parse_id(id: &str) -> Option<i64> {
    id.parse().ok()
}

fn into_ads(rows: Vec<AdRow>) -> StorageResult<Vec<Ad>> {
    rows.into_iter().map(Ad::try_from).collect()
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_name TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                ad_type TEXT NOT NULL,
                beginning_date INTEGER NOT NULL,
                expiration_date INTEGER NOT NULL,
                ad_location TEXT NOT NULL,
                ad_link TEXT NOT NULL,
                ad_image_link TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                click_count INTEGER NOT NULL DEFAULT 0 CHECK (click_count >= 0),
                view_count INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
                completed_view_count INTEGER NOT NULL DEFAULT 0 CHECK (completed_view_count >= 0),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ads_package ON ads(package_name)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ads_targeting ON ads(package_name, ad_location, category)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create(&self, ad: NewAd) -> StorageResult<Ad> {
        let now = dates::now().timestamp();

        let row = sqlx::query_as::<_, AdRow>(&format!(
            r#"
            INSERT INTO ads (package_name, name, description, ad_type, beginning_date,
                expiration_date, ad_location, ad_link, ad_image_link, category,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {AD_COLUMNS}
            "#
        ))
        .bind(&ad.package_name)
        .bind(&ad.name)
        .bind(&ad.description)
        .bind(ad.ad_type.as_str())
        .bind(ad.beginning_date.timestamp())
        .bind(ad.expiration_date.timestamp())
        .bind(&ad.ad_location)
        .bind(&ad.ad_link)
        .bind(&ad.ad_image_link)
        .bind(&ad.category)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        row.try_into()
    }

    async fn get(&self, package_name: &str, id: &str) -> StorageResult<Option<Ad>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, AdRow>(&format!(
            "SELECT {AD_COLUMNS} FROM ads WHERE id = ? AND package_name = ?"
        ))
        .bind(id)
        .bind(package_name)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Ad::try_from).transpose()
    }

    async fn list(&self, package_name: &str) -> StorageResult<Vec<Ad>> {
        let rows = sqlx::query_as::<_, AdRow>(&format!(
            "SELECT {AD_COLUMNS} FROM ads WHERE package_name = ? ORDER BY id"
        ))
        .bind(package_name)
        .fetch_all(self.pool.as_ref())
        .await?;

        into_ads(rows)
    }

    async fn filter(&self, package_name: &str, filter: &AdFilter) -> StorageResult<Vec<Ad>> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {AD_COLUMNS} FROM ads WHERE package_name = "));
        query.push_bind(package_name);

        for at in filter.instants() {
            query
                .push(" AND beginning_date <= ")
                .push_bind(at.timestamp())
                .push(" AND expiration_date >= ")
                .push_bind(at.timestamp());
        }
        if let Some(location) = filter.location.as_deref() {
            query.push(" AND ad_location = ").push_bind(location);
        }
        if let Some(category) = filter.category.as_deref() {
            query.push(" AND category = ").push_bind(category);
        }
        query.push(" ORDER BY id");

        let rows = query
            .build_query_as::<AdRow>()
            .fetch_all(self.pool.as_ref())
            .await?;

        into_ads(rows)
    }

    async fn update(&self, package_name: &str, id: &str, patch: &AdPatch) -> StorageResult<Ad> {
        ensure_patch(patch)?;
        let id = parse_id(id).ok_or(StorageError::NotFound)?;

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE ads SET updated_at = ");
        query.push_bind(dates::now().timestamp());

        if let Some(name) = patch.name.as_deref() {
            query.push(", name = ").push_bind(name);
        }
        if let Some(description) = patch.description.as_deref() {
            query.push(", description = ").push_bind(description);
        }
        if let Some(ad_type) = patch.ad_type {
            query.push(", ad_type = ").push_bind(ad_type.as_str());
        }
        if let Some(beginning_date) = patch.beginning_date {
            query
                .push(", beginning_date = ")
                .push_bind(beginning_date.timestamp());
        }
        if let Some(expiration_date) = patch.expiration_date {
            query
                .push(", expiration_date = ")
                .push_bind(expiration_date.timestamp());
        }
        if let Some(ad_location) = patch.ad_location.as_deref() {
            query.push(", ad_location = ").push_bind(ad_location);
        }
        if let Some(ad_link) = patch.ad_link.as_deref() {
            query.push(", ad_link = ").push_bind(ad_link);
        }
        if let Some(ad_image_link) = patch.ad_image_link.as_deref() {
            query.push(", ad_image_link = ").push_bind(ad_image_link);
        }
        if let Some(category) = patch.category.as_deref() {
            query.push(", category = ").push_bind(category);
        }

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND package_name = ")
            .push_bind(package_name)
            .push(format!(" RETURNING {AD_COLUMNS}"));

        let row = query
            .build_query_as::<AdRow>()
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(StorageError::NotFound)?;

        row.try_into()
    }

    async fn delete_all(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM ads")
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn increment(&self, id: &str, counter: Counter, scope: &AdScope) -> StorageResult<Ad> {
        let id = parse_id(id).ok_or(StorageError::NotFound)?;
        let field = counter.field();

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "UPDATE ads SET {field} = {field} + 1 WHERE id = "
        ));
        query.push_bind(id);

        if let Some(package_name) = scope.package_name.as_deref() {
            query.push(" AND package_name = ").push_bind(package_name);
        }
        if let Some(category) = scope.category.as_deref() {
            query.push(" AND category = ").push_bind(category);
        }
        query.push(format!(" RETURNING {AD_COLUMNS}"));

        let row = query
            .build_query_as::<AdRow>()
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(StorageError::NotFound)?;

        row.try_into()
    }

    async fn summary(&self) -> StorageResult<AdSummary> {
        let (total_clicks, total_views, total_completed_views) =
            sqlx::query_as::<_, (i64, i64, i64)>(
                r#"
                SELECT COALESCE(SUM(click_count), 0),
                       COALESCE(SUM(view_count), 0),
                       COALESCE(SUM(completed_view_count), 0)
                FROM ads
                "#,
            )
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(AdSummary {
            total_clicks,
            total_views,
            total_completed_views,
        })
    }
}
