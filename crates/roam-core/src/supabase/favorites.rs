//! `favorites` table adapter.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{eq_filter, in_filter, RestClient};
use crate::favorites::{RemoteFavoriteStore, StoreResult};
use crate::models::{DestinationId, FavoriteItem, UserId};

/// Ids per `in.(...)` filter, keeping request URLs short.
const FETCH_CHUNK_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct FavoriteRow {
    destination_id: DestinationId,
}

#[derive(Debug, Serialize)]
struct NewFavoriteRow<'a> {
    user_id: &'a str,
    destination_id: &'a str,
}

/// Remote favorites in the project's `favorites` table.
///
/// Uniqueness of `(user_id, destination_id)` is enforced by the table. A
/// batch insert is one statement, so it either commits every new row or none.
#[derive(Debug, Clone)]
pub struct SupabaseFavoriteStore {
    rest: RestClient,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseFavoriteStore {
    pub fn new(rest: RestClient) -> Self {
        Self {
            rest,
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Use `token` for subsequent requests; `None` falls back to the anon key.
    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RemoteFavoriteStore for SupabaseFavoriteStore {
    async fn list_favorite_ids(&self, user_id: &UserId) -> StoreResult<Vec<DestinationId>> {
        let token = self.token();
        let request = self.rest.request(
            Method::GET,
            &list_path(user_id),
            token.as_deref(),
        );
        let rows: Vec<FavoriteRow> = self.rest.fetch_json(request).await?;

        let mut seen = HashSet::with_capacity(rows.len());
        Ok(rows
            .into_iter()
            .map(|row| row.destination_id)
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }

    async fn insert_favorites(&self, user_id: &UserId, ids: &[DestinationId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let rows: Vec<NewFavoriteRow<'_>> = ids
            .iter()
            .map(|id| NewFavoriteRow {
                user_id: user_id.as_str(),
                destination_id: id.as_str(),
            })
            .collect();

        let token = self.token();
        let request = self
            .rest
            .request(
                Method::POST,
                "favorites?on_conflict=user_id,destination_id",
                token.as_deref(),
            )
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(&rows);
        self.rest.send(request).await?;
        tracing::debug!("Inserted {} favorites for {}", ids.len(), user_id);
        Ok(())
    }

    async fn delete_favorite(&self, user_id: &UserId, id: &DestinationId) -> StoreResult<()> {
        let token = self.token();
        let request = self
            .rest
            .request(Method::DELETE, &delete_path(user_id, id), token.as_deref())
            .header("Prefer", "return=minimal");
        self.rest.send(request).await?;
        Ok(())
    }

    async fn fetch_items_by_ids(&self, ids: &[DestinationId]) -> StoreResult<Vec<FavoriteItem>> {
        let token = self.token();
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(FETCH_CHUNK_SIZE) {
            let request = self.rest.request(
                Method::GET,
                &format!("destinations?select=*&id={}", in_filter(chunk)),
                token.as_deref(),
            );
            let mut batch: Vec<FavoriteItem> = self.rest.fetch_json(request).await?;
            items.append(&mut batch);
        }
        Ok(items)
    }
}

fn list_path(user_id: &UserId) -> String {
    format!(
        "favorites?select=destination_id&user_id={}",
        eq_filter(user_id.as_str())
    )
}

fn delete_path(user_id: &UserId, id: &DestinationId) -> String {
    format!(
        "favorites?user_id={}&destination_id={}",
        eq_filter(user_id.as_str()),
        eq_filter(id.as_str())
    )
}
