//! Favorite item model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Stable identifier of a catalog destination.
///
/// The backend may hand out numeric or textual keys; both are normalized to
/// their string form so local and remote sets compare by the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    /// Parse an identifier, rejecting blank values.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "destination id cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DestinationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for DestinationId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Integer(i64),
        }

        let raw = match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text,
            RawId::Integer(number) => number.to_string(),
        };
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Denormalized snapshot of a catalog destination, copied when it is
/// favorited so the favorites view renders without another fetch.
///
/// Only the fields below survive a round trip through the local cache;
/// anything else present in a catalog row is dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteItem {
    pub id: DestinationId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

// Catalog rows may carry SQL NULL where the snapshot wants an empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FavoriteItem {
    /// Create a snapshot with only the required display fields.
    #[must_use]
    pub fn new(id: DestinationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: None,
            category: None,
            description: None,
            images: Vec::new(),
            rating: None,
        }
    }

    /// First image reference, used as the card cover.
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Description shortened to `max_chars`, with an ellipsis when cut.
    #[must_use]
    pub fn description_preview(&self, max_chars: usize) -> String {
        let description = self.description.as_deref().unwrap_or("").trim();
        if description.chars().count() <= max_chars {
            return description.to_string();
        }
        let mut preview: String = description.chars().take(max_chars).collect();
        preview.push_str("...");
        preview
    }
}
