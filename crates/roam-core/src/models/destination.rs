//! Admin-side destination records: a full draft for creation and a partial
//! patch for edits.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::is_http_url;

/// Every field a new catalog destination needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationDraft {
    pub name: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: f64,
    pub entry_fee: String,
    pub timings: String,
    pub official_link: String,
    pub images: Vec<String>,
}

impl DestinationDraft {
    /// Trim text fields and reject blank or malformed values.
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            name: required_text("name", &self.name)?,
            description: required_text("description", &self.description)?,
            category: required_text("category", &self.category)?,
            location: required_text("location", &self.location)?,
            latitude: finite("latitude", self.latitude)?,
            longitude: finite("longitude", self.longitude)?,
            rating: finite("rating", self.rating)?,
            entry_fee: required_text("entry_fee", &self.entry_fee)?,
            timings: required_text("timings", &self.timings)?,
            official_link: required_text("official_link", &self.official_link)?,
            images: image_urls(&self.images)?,
        })
    }
}

/// Fields to change on an existing destination. Absent fields are left as
/// they are and are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_fee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl DestinationPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the draft rules to every field present; an empty patch is rejected.
    pub fn validated(self) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }
        let text = |field: &str, value: Option<String>| {
            value.map(|value| required_text(field, &value)).transpose()
        };
        let number = |field: &str, value: Option<f64>| {
            value.map(|value| finite(field, value)).transpose()
        };
        Ok(Self {
            name: text("name", self.name)?,
            description: text("description", self.description)?,
            category: text("category", self.category)?,
            location: text("location", self.location)?,
            latitude: number("latitude", self.latitude)?,
            longitude: number("longitude", self.longitude)?,
            rating: number("rating", self.rating)?,
            entry_fee: text("entry_fee", self.entry_fee)?,
            timings: text("timings", self.timings)?,
            official_link: text("official_link", self.official_link)?,
            images: self.images.as_deref().map(image_urls).transpose()?,
        })
    }
}

fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidInput(format!("{field} must be a number")))
    }
}

/// At least one image, each an http(s) URL.
fn image_urls(images: &[String]) -> Result<Vec<String>> {
    let urls: Vec<String> = images
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        return Err(Error::InvalidInput("at least one image URL is required".to_string()));
    }
    if let Some(bad) = urls.iter().find(|url| !is_http_url(url)) {
        return Err(Error::InvalidInput(format!("image URL must start with http: {bad}")));
    }
    Ok(urls)
}
