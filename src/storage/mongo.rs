//! MongoDB backend.
//!
//! One `Client` is created at startup and every request shares the same
//! collection handle. Counters are bumped with `$inc`, so concurrent
//! increments on one ad never lose updates.

use crate::models::dates;
use crate::models::{Ad, AdFilter, AdPatch, AdScope, AdSummary, AdType, Counter, NewAd};
use crate::storage::trait_def::ensure_patch;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::{ClientOptions, ReturnDocument, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::info;

pub struct MongoStorage {
    ads: Collection<AdDocument>,
}

impl MongoStorage {
    /// Connect and ping the deployment. Fails if the server cannot be reached.
    pub async fn connect(uri: &str, db_name: &str, collection: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("invalid MongoDB connection string")?;
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());

        let client = Client::with_options(options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("failed to ping MongoDB")?;

        info!(database = %db_name, collection = %collection, "Successfully connected to MongoDB");

        let ads = client.database(db_name).collection::<AdDocument>(collection);
        Ok(Self { ads })
    }
}

impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        StorageError::Other(err.into())
    }
}

/// Stored shape of an ad.
#[derive(Debug, Serialize, Deserialize)]
struct AdDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    package_name: String,
    name: String,
    description: String,
    ad_type: AdType,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    beginning_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    expiration_date: DateTime<Utc>,
    ad_location: String,
    ad_link: String,
    #[serde(default)]
    ad_image_link: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    click_count: i64,
    #[serde(default)]
    view_count: i64,
    #[serde(default)]
    completed_view_count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl AdDocument {
    fn new(ad: NewAd, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            package_name: ad.package_name,
            name: ad.name,
            description: ad.description,
            ad_type: ad.ad_type,
            beginning_date: ad.beginning_date,
            expiration_date: ad.expiration_date,
            ad_location: ad.ad_location,
            ad_link: ad.ad_link,
            ad_image_link: ad.ad_image_link,
            category: ad.category,
            click_count: 0,
            view_count: 0,
            completed_view_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<AdDocument> for Ad {
    type Error = StorageError;

    fn try_from(document: AdDocument) -> Result<Self, Self::Error> {
        let id = document
            .id
            .ok_or_else(|| anyhow!("ad document without an _id"))?;

        Ok(Ad {
            id: id.to_hex(),
            package_name: document.package_name,
            name: document.name,
            description: document.description,
            ad_type: document.ad_type,
            beginning_date: document.beginning_date,
            expiration_date: document.expiration_date,
            ad_location: document.ad_location,
            ad_link: document.ad_link,
            ad_image_link: document.ad_image_link,
            category: document.category,
            click_count: document.click_count,
            view_count: document.view_count,
            completed_view_count: document.completed_view_count,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

fn bson_date(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_chrono(at)
}

/// Ids are ObjectId hex strings; anything else cannot match.
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn filter_document(package_name: &str, filter: &AdFilter) -> Document {
    let mut query = doc! { "package_name": package_name };

    let windows: Vec<Document> = filter
        .instants()
        .map(|at| {
            doc! {
                "beginning_date": { "$lte": bson_date(at) },
                "expiration_date": { "$gte": bson_date(at) },
            }
        })
        .collect();
    if !windows.is_empty() {
        query.insert("$and", windows);
    }
    if let Some(location) = filter.location.as_deref() {
        query.insert("ad_location", location);
    }
    if let Some(category) = filter.category.as_deref() {
        query.insert("category", category);
    }

    query
}

fn set_document(patch: &AdPatch, now: DateTime<Utc>) -> Document {
    let mut set = doc! { "updated_at": bson_date(now) };

    if let Some(name) = patch.name.as_deref() {
        set.insert("name", name);
    }
    if let Some(description) = patch.description.as_deref() {
        set.insert("description", description);
    }
    if let Some(ad_type) = patch.ad_type {
        set.insert("ad_type", ad_type.as_str());
    }
    if let Some(beginning_date) = patch.beginning_date {
        set.insert("beginning_date", bson_date(beginning_date));
    }
    if let Some(expiration_date) = patch.expiration_date {
        set.insert("expiration_date", bson_date(expiration_date));
    }
    if let Some(ad_location) = patch.ad_location.as_deref() {
        set.insert("ad_location", ad_location);
    }
    if let Some(ad_link) = patch.ad_link.as_deref() {
        set.insert("ad_link", ad_link);
    }
    if let Some(ad_image_link) = patch.ad_image_link.as_deref() {
        set.insert("ad_image_link", ad_image_link);
    }
    if let Some(category) = patch.category.as_deref() {
        set.insert("category", category);
    }

    set
}

/// `$sum` yields Int32, Int64 or Double depending on the stored values.
fn sum_field(totals: &Document, key: &str) -> i64 {
    match totals.get(key) {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

#[async_trait]
impl Storage for MongoStorage {
    async fn init(&self) -> Result<()> {
        self.ads
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "package_name": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "package_name": 1, "ad_location": 1, "category": 1 })
                    .build(),
            ])
            .await
            .context("failed to create ad indexes")?;

        Ok(())
    }

    async fn create(&self, ad: NewAd) -> StorageResult<Ad> {
        let mut document = AdDocument::new(ad, dates::now());

        let result = self.ads.insert_one(&document).await?;
        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("insert returned a non-ObjectId _id"))?;
        document.id = Some(id);

        document.try_into()
    }

    async fn get(&self, package_name: &str, id: &str) -> StorageResult<Option<Ad>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };

        self.ads
            .find_one(doc! { "_id": id, "package_name": package_name })
            .await?
            .map(Ad::try_from)
            .transpose()
    }

    async fn list(&self, package_name: &str) -> StorageResult<Vec<Ad>> {
        self.filter(package_name, &AdFilter::default()).await
    }

    async fn filter(&self, package_name: &str, filter: &AdFilter) -> StorageResult<Vec<Ad>> {
        let documents: Vec<AdDocument> = self
            .ads
            .find(filter_document(package_name, filter))
            .sort(doc! { "_id": 1 })
            .await?
            .try_collect()
            .await?;

        documents.into_iter().map(Ad::try_from).collect()
    }

    async fn update(&self, package_name: &str, id: &str, patch: &AdPatch) -> StorageResult<Ad> {
        ensure_patch(patch)?;
        let id = parse_id(id).ok_or(StorageError::NotFound)?;

        self.ads
            .find_one_and_update(
                doc! { "_id": id, "package_name": package_name },
                doc! { "$set": set_document(patch, dates::now()) },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(StorageError::NotFound)?
            .try_into()
    }

    async fn delete_all(&self) -> StorageResult<u64> {
        let result = self.ads.delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }

    async fn increment(&self, id: &str, counter: Counter, scope: &AdScope) -> StorageResult<Ad> {
        let id = parse_id(id).ok_or(StorageError::NotFound)?;

        let mut query = doc! { "_id": id };
        if let Some(package_name) = scope.package_name.as_deref() {
            query.insert("package_name", package_name);
        }
        if let Some(category) = scope.category.as_deref() {
            query.insert("category", category);
        }

        let mut inc = Document::new();
        inc.insert(counter.field(), 1_i64);

        self.ads
            .find_one_and_update(query, doc! { "$inc": inc })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(StorageError::NotFound)?
            .try_into()
    }

    async fn summary(&self) -> StorageResult<AdSummary> {
        let pipeline = [doc! {
            "$group": {
                "_id": Bson::Null,
                "total_clicks": { "$sum": "$click_count" },
                "total_views": { "$sum": "$view_count" },
                "total_completed_views": { "$sum": "$completed_view_count" },
            }
        }];

        let mut cursor = self.ads.aggregate(pipeline).await?;
        let Some(totals) = cursor.try_next().await? else {
            return Ok(AdSummary::default());
        };

        Ok(AdSummary {
            total_clicks: sum_field(&totals, "total_clicks"),
            total_views: sum_field(&totals, "total_views"),
            total_completed_views: sum_field(&totals, "total_completed_views"),
        })
    }
}
