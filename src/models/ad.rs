use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::dates::{ad_date, parse_filter_date, parse_timestamp};

/// Kind of creative an ad carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdType {
    Image,
    Video,
}

impl AdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::Image => "image",
            AdType::Video => "video",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AdType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(AdType::Image),
            "video" => Ok(AdType::Video),
            other => Err(ValidationError::InvalidAdType(other.to_string())),
        }
    }
}

/// A stored advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub package_name: String,
    pub name: String,
    pub description: String,
    pub ad_type: AdType,
    #[serde(with = "ad_date")]
    pub beginning_date: DateTime<Utc>,
    #[serde(with = "ad_date")]
    pub expiration_date: DateTime<Utc>,
    pub ad_location: String,
    pub ad_link: String,
    pub ad_image_link: String,
    pub category: String,
    pub click_count: i64,
    pub view_count: i64,
    pub completed_view_count: i64,
    #[serde(with = "ad_date")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ad_date")]
    pub updated_at: DateTime<Utc>,
}

impl Ad {
    /// Whether `at` falls inside the ad's scheduling window (both ends inclusive).
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.beginning_date <= at && at <= self.expiration_date
    }
}

/// Validated fields for a new ad. Counters and timestamps are set by the storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAd {
    pub package_name: String,
    pub name: String,
    pub description: String,
    pub ad_type: AdType,
    pub beginning_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub ad_location: String,
    pub ad_link: String,
    pub ad_image_link: String,
    pub category: String,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ad_type: Option<AdType>,
    pub beginning_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub ad_location: Option<String>,
    pub ad_link: Option<String>,
    pub ad_image_link: Option<String>,
    pub category: Option<String>,
}

impl AdPatch {
    pub fn is_empty(&self) -> bool {
        self == &AdPatch::default()
    }

    /// True when only one end of the window changes, so the stored ad is
    /// needed to check the merged window.
    pub fn changes_one_window_end(&self) -> bool {
        self.beginning_date.is_some() != self.expiration_date.is_some()
    }

    /// Check the window that results from applying this patch to `current`.
    pub fn check_window(&self, current: &Ad) -> Result<(), ValidationError> {
        let beginning = self.beginning_date.unwrap_or(current.beginning_date);
        let expiration = self.expiration_date.unwrap_or(current.expiration_date);
        check_window(beginning, expiration)
    }
}

/// Counter that an engagement event bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Click,
    View,
    CompletedView,
}

impl Counter {
    /// Field (and column) name of the counter.
    pub fn field(&self) -> &'static str {
        match self {
            Counter::Click => "click_count",
            Counter::View => "view_count",
            Counter::CompletedView => "completed_view_count",
        }
    }
}

/// Criteria for listing a package's ads. Omitted criteria are not constrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdFilter {
    /// Ads whose window contains this instant
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub category: Option<String>,
    /// Same containment check as `date`, pinned to the request time
    pub active_at: Option<DateTime<Utc>>,
}

impl AdFilter {
    /// Window instants the filter constrains on.
    pub fn instants(&self) -> impl Iterator<Item = DateTime<Utc>> {
        self.date.into_iter().chain(self.active_at)
    }

    pub fn matches(&self, ad: &Ad) -> bool {
        self.instants().all(|at| ad.is_active_at(at))
            && self.location.as_ref().map_or(true, |l| &ad.ad_location == l)
            && self.category.as_ref().map_or(true, |c| &ad.category == c)
    }
}

/// Extra predicates an increment must satisfy besides the id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AdScope {
    pub package_name: Option<String>,
    pub category: Option<String>,
}

impl AdScope {
    /// Drop blank values so `?package_name=` does not scope to the empty package.
    pub fn normalized(self) -> Self {
        Self {
            package_name: non_blank(self.package_name),
            category: non_blank(self.category),
        }
    }
}

/// Totals over every stored ad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdSummary {
    pub total_clicks: i64,
    pub total_views: i64,
    pub total_completed_views: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{field} has an invalid date format (use YYYY-MM-DD HH:MM:SS)")]
    InvalidTimestamp { field: &'static str },
    #[error("invalid date format (use YYYY-MM-DD)")]
    InvalidFilterDate,
    #[error("beginning_date must not be after expiration_date")]
    InvalidWindow,
    #[error("invalid ad_type '{0}' (expected image or video)")]
    InvalidAdType(String),
    #[error("no fields provided for update")]
    EmptyUpdate,
}

/// Body of `POST /ad_sdk`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateAdRequest {
    pub package_name: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "dicription")]
    pub description: Option<String>,
    pub ad_type: Option<String>,
    pub beginning_date: Option<String>,
    pub expiration_date: Option<String>,
    pub ad_location: Option<String>,
    pub ad_link: Option<String>,
    pub ad_image_link: Option<String>,
    pub category: Option<String>,
}

impl CreateAdRequest {
    pub fn validate(self) -> Result<NewAd, ValidationError> {
        let package_name = required(self.package_name, "package_name")?;
        let name = required(self.name, "name")?;
        let description = required(self.description, "description")?;
        let ad_type = required(self.ad_type, "ad_type")?.parse::<AdType>()?;
        let beginning_date = timestamp(
            &required(self.beginning_date, "beginning_date")?,
            "beginning_date",
        )?;
        let expiration_date = timestamp(
            &required(self.expiration_date, "expiration_date")?,
            "expiration_date",
        )?;
        let ad_location = required(self.ad_location, "ad_location")?;
        let ad_link = required(self.ad_link, "ad_link")?;

        check_window(beginning_date, expiration_date)?;

        Ok(NewAd {
            package_name,
            name,
            description,
            ad_type,
            beginning_date,
            expiration_date,
            ad_location,
            ad_link,
            ad_image_link: self.ad_image_link.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
        })
    }
}

/// Body of `PUT /ad_sdk/{package}/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAdRequest {
    pub name: Option<String>,
    #[serde(alias = "dicription")]
    pub description: Option<String>,
    pub ad_type: Option<String>,
    pub beginning_date: Option<String>,
    pub expiration_date: Option<String>,
    pub ad_location: Option<String>,
    pub ad_link: Option<String>,
    pub ad_image_link: Option<String>,
    pub category: Option<String>,
}

impl UpdateAdRequest {
    pub fn into_patch(self) -> Result<AdPatch, ValidationError> {
        let patch = AdPatch {
            name: self.name,
            description: self.description,
            ad_type: self.ad_type.as_deref().map(str::parse::<AdType>).transpose()?,
            beginning_date: self
                .beginning_date
                .as_deref()
                .map(|v| timestamp(v, "beginning_date"))
                .transpose()?,
            expiration_date: self
                .expiration_date
                .as_deref()
                .map(|v| timestamp(v, "expiration_date"))
                .transpose()?,
            ad_location: self.ad_location,
            ad_link: self.ad_link,
            ad_image_link: self.ad_image_link,
            category: self.category,
        };

        if patch.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let (Some(beginning), Some(expiration)) = (patch.beginning_date, patch.expiration_date)
        {
            check_window(beginning, expiration)?;
        }

        Ok(patch)
    }
}

/// Query string of `GET /ad_sdk/{package}`.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl FilterQuery {
    pub fn into_filter(self, now: DateTime<Utc>) -> Result<AdFilter, ValidationError> {
        let date = non_blank(self.date)
            .map(|raw| parse_filter_date(&raw).ok_or(ValidationError::InvalidFilterDate))
            .transpose()?;

        Ok(AdFilter {
            date,
            location: non_blank(self.location),
            category: non_blank(self.category),
            active_at: self.active.then_some(now),
        })
    }
}

/// Response of `DELETE /ad_sdk`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    pub message: String,
    pub deleted_count: u64,
}

fn check_window(beginning: DateTime<Utc>, expiration: DateTime<Utc>) -> Result<(), ValidationError> {
    if beginning > expiration {
        return Err(ValidationError::InvalidWindow);
    }
    Ok(())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    non_blank(value).ok_or(ValidationError::MissingField(field))
}

fn timestamp(value: &str, field: &'static str) -> Result<DateTime<Utc>, ValidationError> {
    parse_timestamp(value).ok_or(ValidationError::InvalidTimestamp { field })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
