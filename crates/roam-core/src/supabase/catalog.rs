//! The `destinations` catalog: public reads, plus admin-only writes and
//! favorite counts.

use reqwest::header::CONTENT_RANGE;
use reqwest::Method;
use thiserror::Error;

use super::{eq_filter, RestClient};
use crate::favorites::{StoreError, StoreResult};
use crate::models::{DestinationDraft, DestinationId, DestinationPatch, FavoriteItem, Identity};
use crate::role_gate::can_manage_catalog;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Only administrators can manage destinations")]
    Forbidden,
    #[error(transparent)]
    Invalid(#[from] crate::Error),
    #[error("Destination not found: {0}")]
    NotFound(DestinationId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Who is asking for an admin operation, and the token it runs under.
#[derive(Debug, Clone, Copy)]
pub struct CatalogCaller<'a> {
    pub identity: &'a Identity,
    pub access_token: &'a str,
}

/// Access token of `caller` when it may manage the catalog.
fn require_admin<'a>(caller: Option<CatalogCaller<'a>>) -> CatalogResult<&'a str> {
    match caller {
        Some(caller) if can_manage_catalog(Some(caller.identity)) => Ok(caller.access_token),
        _ => Err(CatalogError::Forbidden),
    }
}

fn destination_path(id: &DestinationId) -> String {
    format!("destinations?id={}", eq_filter(id.as_str()))
}

fn favorite_count_path(id: &DestinationId) -> String {
    format!(
        "favorites?select=destination_id&destination_id={}",
        eq_filter(id.as_str())
    )
}

/// Total from a PostgREST `Content-Range` header such as `0-24/311` or `*/0`.
fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Ordering applied by [`DestinationQuery`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DestinationSort {
    #[default]
    Name,
    Rating,
    Category,
}

/// Client-side search over a fetched catalog page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationQuery {
    /// Case-insensitive match on name, location, or category
    pub search: Option<String>,
    /// Exact category
    pub category: Option<String>,
    pub sort: DestinationSort,
}

impl DestinationQuery {
    /// Filter and order `items`.
    pub fn apply(&self, items: Vec<FavoriteItem>) -> Vec<FavoriteItem> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);

        let mut results: Vec<FavoriteItem> = items
            .into_iter()
            .filter(|item| match &self.category {
                Some(category) => item.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .filter(|item| match &needle {
                Some(needle) => [
                    Some(item.name.as_str()),
                    item.location.as_deref(),
                    item.category.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
                None => true,
            })
            .collect();

        match self.sort {
            DestinationSort::Name => results.sort_by(|a, b| a.name.cmp(&b.name)),
            DestinationSort::Rating => results.sort_by(|a, b| {
                b.rating
                    .unwrap_or(0.0)
                    .total_cmp(&a.rating.unwrap_or(0.0))
            }),
            DestinationSort::Category => results.sort_by(|a, b| a.category.cmp(&b.category)),
        }
        results
    }
}

/// Catalog access. Reads are public; writes and counts need an admin caller.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    rest: RestClient,
}

impl CatalogClient {
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Every destination, ordered by name.
    pub async fn list_destinations(&self) -> StoreResult<Vec<FavoriteItem>> {
        let request = self
            .rest
            .request(Method::GET, "destinations?select=*&order=name.asc", None);
        self.rest.fetch_json(request).await
    }

    /// One destination, or `None` when the catalog has no such id.
    pub async fn get_destination(&self, id: &DestinationId) -> StoreResult<Option<FavoriteItem>> {
        let request = self.rest.request(
            Method::GET,
            &format!("destinations?select=*&id={}&limit=1", eq_filter(id.as_str())),
            None,
        );
        let rows: Vec<FavoriteItem> = self.rest.fetch_json(request).await?;
        Ok(rows.into_iter().next())
    }

    /// Add a destination and return the stored row.
    pub async fn create_destination(
        &self,
        caller: Option<CatalogCaller<'_>>,
        draft: DestinationDraft,
    ) -> CatalogResult<FavoriteItem> {
        let token = require_admin(caller)?;
        let draft = draft.validated()?;

        let request = self
            .rest
            .request(Method::POST, "destinations", Some(token))
            .header("Prefer", "return=representation")
            .json(&[draft]);
        let rows: Vec<FavoriteItem> = self.rest.fetch_json(request).await?;
        let created = rows.into_iter().next().ok_or_else(|| {
            StoreError::Rejected("Insert returned no destination row".to_string())
        })?;
        tracing::info!("Created destination {} ({})", created.name, created.id);
        Ok(created)
    }

    /// Change the fields present in `patch` and return the updated row.
    pub async fn update_destination(
        &self,
        caller: Option<CatalogCaller<'_>>,
        id: &DestinationId,
        patch: DestinationPatch,
    ) -> CatalogResult<FavoriteItem> {
        let token = require_admin(caller)?;
        let patch = patch.validated()?;

        let request = self
            .rest
            .request(Method::PATCH, &destination_path(id), Some(token))
            .header("Prefer", "return=representation")
            .json(&patch);
        let rows: Vec<FavoriteItem> = self.rest.fetch_json(request).await?;
        let updated = rows
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        tracing::info!("Updated destination {}", id);
        Ok(updated)
    }

    /// Remove a destination and return what was deleted.
    pub async fn delete_destination(
        &self,
        caller: Option<CatalogCaller<'_>>,
        id: &DestinationId,
    ) -> CatalogResult<FavoriteItem> {
        let token = require_admin(caller)?;

        let request = self
            .rest
            .request(Method::DELETE, &destination_path(id), Some(token))
            .header("Prefer", "return=representation");
        let rows: Vec<FavoriteItem> = self.rest.fetch_json(request).await?;
        let deleted = rows
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        tracing::info!("Deleted destination {}", id);
        Ok(deleted)
    }

    /// How many accounts have favorited `id`.
    pub async fn favorite_count(
        &self,
        caller: Option<CatalogCaller<'_>>,
        id: &DestinationId,
    ) -> CatalogResult<u64> {
        let token = require_admin(caller)?;

        let request = self
            .rest
            .request(Method::HEAD, &favorite_count_path(id), Some(token))
            .header("Prefer", "count=exact");
        let response = self.rest.send(request).await?;
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| {
                StoreError::Rejected("Count response had no Content-Range total".to_string())
            })?;
        Ok(total)
    }
}
