use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage namespace of an entity type. Chosen by the caller, never
/// derived from Rust type names, so renaming a struct cannot move objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    News,
    User,
    FaqCategory,
    FaqQuestion,
}

impl EntityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::News => "news",
            EntityClass::User => "user",
            EntityClass::FaqCategory => "faq_category",
            EntityClass::FaqQuestion => "faq_question",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "news" => Ok(EntityClass::News),
            "user" => Ok(EntityClass::User),
            "faq_category" => Ok(EntityClass::FaqCategory),
            "faq_question" => Ok(EntityClass::FaqQuestion),
            other => Err(format!("unknown entity class: {other}")),
        }
    }
}

/// The two stored renditions of every image version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Original,
    Thumbnail,
}

impl Resolution {
    pub const ALL: [Resolution; 2] = [Resolution::Original, Resolution::Thumbnail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Original => "original",
            Resolution::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one stored image object.
///
/// Renders as `{entityClass}/{entityId}/{resolution}/{version}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub entity_class: EntityClass,
    pub entity_id: Uuid,
    pub version: u32,
    pub resolution: Resolution,
}

impl AssetKey {
    pub fn new(
        entity_class: EntityClass,
        entity_id: Uuid,
        version: u32,
        resolution: Resolution,
    ) -> Self {
        Self {
            entity_class,
            entity_id,
            version,
            resolution,
        }
    }

    pub fn original(entity_class: EntityClass, entity_id: Uuid, version: u32) -> Self {
        Self::new(entity_class, entity_id, version, Resolution::Original)
    }

    pub fn thumbnail(entity_class: EntityClass, entity_id: Uuid, version: u32) -> Self {
        Self::new(entity_class, entity_id, version, Resolution::Thumbnail)
    }

    /// Same entity and version, other rendition
    pub fn with_resolution(self, resolution: Resolution) -> Self {
        Self { resolution, ..self }
    }

    pub fn object_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.entity_class, self.entity_id, self.resolution, self.version
        )
    }
}
