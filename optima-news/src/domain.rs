use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use optima_assets::{RawImage, SnapshotEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewsCategory {
    Announcement,
    Event,
    Other,
}

impl NewsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::Announcement => "ANNOUNCEMENT",
            NewsCategory::Event => "EVENT",
            NewsCategory::Other => "OTHER",
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANNOUNCEMENT" => Ok(NewsCategory::Announcement),
            "EVENT" => Ok(NewsCategory::Event),
            "OTHER" => Ok(NewsCategory::Other),
            other => Err(format!("unknown news category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewsStatus {
    Active,
    Archived,
}

/// A stored news record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub category: NewsCategory,
    pub status: NewsStatus,
    /// 0 means no image; only ever moved forward by one
    pub image_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
}

impl NewsItem {
    pub fn is_active(&self) -> bool {
        self.status == NewsStatus::Active
    }

    pub fn has_image(&self) -> bool {
        self.image_version > 0
    }

    /// Last modifier, falling back to the author
    pub fn last_modified_by(&self) -> Uuid {
        self.updated_by.unwrap_or(self.created_by)
    }
}

/// Public identity of a user, embedded in views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

/// Public projection of a news record. This is what the snapshot and
/// read operations expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsView {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub category: NewsCategory,
    pub image_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<UserOverview>,
    #[serde(skip, default = "active")]
    pub status: NewsStatus,
}

fn active() -> NewsStatus {
    NewsStatus::Active
}

impl NewsView {
    pub fn from_item(item: &NewsItem, created_by: Option<UserOverview>) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            summary: item.summary.clone(),
            description: item.description.clone(),
            category: item.category,
            image_version: item.image_version,
            created_at: item.created_at,
            updated_at: item.updated_at,
            created_by,
            status: item.status,
        }
    }
}

impl SnapshotEntry for NewsView {
    type View = Self;

    fn is_active(&self) -> bool {
        self.status == NewsStatus::Active
    }

    fn view(&self) -> &Self {
        self
    }
}

/// Dashboard summary over all news
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsMetadata {
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_updated_by: Option<UserOverview>,
    pub all_active_count: u64,
    pub all_archived_count: u64,
}

#[derive(Debug, Clone)]
pub struct CreateNews {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub category: NewsCategory,
    pub image: Option<RawImage>,
}

impl CreateNews {
    pub fn new<T, S, D>(title: T, summary: S, description: D, category: NewsCategory) -> Self
    where
        T: Into<String>,
        S: Into<String>,
        D: Into<String>,
    {
        Self {
            title: title.into(),
            summary: summary.into(),
            description: description.into(),
            category,
            image: None,
        }
    }

    pub fn with_image(mut self, image: RawImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateNews {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub category: Option<NewsCategory>,
    pub image: Option<RawImage>,
}

impl UpdateNews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_summary<S: Into<String>>(mut self, summary: S) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: NewsCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_image(mut self, image: RawImage) -> Self {
        self.image = Some(image);
        self
    }

    pub(crate) fn apply(&self, item: &mut NewsItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(summary) = &self.summary {
            item.summary = summary.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
    }
}

/// Downloaded image rendition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsImage {
    pub bytes: bytes::Bytes,
    pub content_type: String,
    pub version: u32,
}
