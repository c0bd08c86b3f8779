//! Favorites reconciler: routes reads and writes by session phase and merges
//! anonymous favorites into the account on sign-in.

use std::collections::{HashMap, HashSet};

use tokio::sync::{Mutex, MutexGuard};

use super::cache::LocalFavoriteCache;
use super::error::{FavoritesResult, Precondition};
use super::machine::{transition, Effect, Phase, SessionEvent};
use super::store::{RemoteFavoriteStore, StoreError};
use super::view::FavoriteView;
use crate::identity::IdentityFeed;
use crate::models::{DestinationId, FavoriteItem, Identity, UserId};
use crate::role_gate::can_mutate_favorites;

/// Result of a committed merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Ids written to the remote store by this merge
    pub inserted: Vec<DestinationId>,
    /// Local favorites the account already had
    pub already_present: usize,
}

#[derive(Debug)]
struct SessionState {
    phase: Phase,
    /// Bumped whenever the session owner changes
    epoch: u64,
    view: FavoriteView,
}

enum Route {
    Local,
    Remote(Identity),
}

struct MergeOutcome {
    report: MergeReport,
    view: FavoriteView,
}

/// Session-scoped favorites context.
///
/// Construct one per session with [`FavoritesReconciler::open`], feed it
/// identity changes, and drop it when the session ends. Reads and writes go
/// to the local cache while anonymous or merging, and to the remote store
/// once authenticated.
pub struct FavoritesReconciler<L, R> {
    local: L,
    remote: R,
    state: Mutex<SessionState>,
    /// Serializes local cache writes against merge execution. Always taken
    /// before `state` when both are needed.
    local_lock: Mutex<()>,
}

impl<L, R> FavoritesReconciler<L, R>
where
    L: LocalFavoriteCache,
    R: RemoteFavoriteStore,
{
    /// Start in the anonymous phase with the view loaded from the local cache.
    pub async fn open(local: L, remote: R) -> FavoritesResult<Self> {
        let items = local.load().await?;
        tracing::debug!("Opened favorites session with {} local favorites", items.len());
        Ok(Self {
            local,
            remote,
            state: Mutex::new(SessionState {
                phase: Phase::Anonymous,
                epoch: 0,
                view: FavoriteView::from_items(items),
            }),
            local_lock: Mutex::new(()),
        })
    }

    pub const fn local(&self) -> &L {
        &self.local
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase.clone()
    }

    /// Apply an identity notification.
    ///
    /// Returns the merge report when this notification caused a merge to
    /// commit. The phase transition applies even when the follow-up load
    /// fails; the error reports that load.
    pub async fn handle_identity(
        &self,
        identity: Option<Identity>,
    ) -> FavoritesResult<Option<MergeReport>> {
        match identity {
            None => self.apply(SessionEvent::SignedOut, None).await,
            Some(identity) => {
                // Held from the pending check through the merge so no
                // anonymous write can slip between them.
                let guard = self.local_lock.lock().await;
                let local_pending = !self.local.load().await?.is_empty();
                self.apply(
                    SessionEvent::SignedIn {
                        identity,
                        local_pending,
                    },
                    Some(guard),
                )
                .await
            }
        }
    }

    /// Rerun a merge whose last attempt failed.
    pub async fn retry_merge(&self) -> FavoritesResult<Option<MergeReport>> {
        let guard = self.local_lock.lock().await;
        self.apply(SessionEvent::RetryRequested, Some(guard)).await
    }

    /// Apply every emission of `feed` in order until its publisher is
    /// dropped. Failures are logged; the caller retries by re-emitting.
    pub async fn observe(&self, mut feed: IdentityFeed) {
        let mut next = Some(feed.current());
        while let Some(identity) = next {
            if let Err(error) = self.handle_identity(identity).await {
                tracing::warn!("Favorites reconciliation failed: {}", error);
            }
            next = feed.next().await;
        }
        tracing::debug!("Identity feed closed");
    }

    /// Favorites visible in the current phase.
    ///
    /// Anonymous and merging sessions read the local favorites; an
    /// authenticated session reads the remote store and refreshes the view.
    pub async fn list(&self) -> FavoritesResult<Vec<FavoriteItem>> {
        let (identity, epoch) = {
            let state = self.state.lock().await;
            match &state.phase {
                Phase::Authenticated { identity } => (identity.clone(), state.epoch),
                Phase::Anonymous | Phase::Merging { .. } => {
                    return Ok(state.view.items().to_vec());
                }
            }
        };

        let items = self.fetch_remote_items(&identity.user_id).await?;
        let mut state = self.state.lock().await;
        if state.epoch == epoch {
            state.view = FavoriteView::from_items(items.clone());
        }
        Ok(items)
    }

    /// Membership against the current view, without I/O.
    pub async fn is_favorite(&self, id: &DestinationId) -> bool {
        self.state.lock().await.view.contains(id)
    }

    /// Favorite `item`. Adding an existing favorite is a no-op.
    pub async fn add(&self, item: FavoriteItem) -> FavoritesResult<()> {
        match self.route().await? {
            Route::Remote(identity) => self.add_remote(&identity, item).await,
            Route::Local => {
                let guard = self.local_lock.lock().await;
                // A sign-in may have claimed the cache while we waited.
                match self.route().await? {
                    Route::Local => self.add_local(item, guard).await,
                    Route::Remote(identity) => {
                        drop(guard);
                        self.add_remote(&identity, item).await
                    }
                }
            }
        }
    }

    /// Unfavorite `id`. Removing an absent favorite is a no-op.
    pub async fn remove(&self, id: &DestinationId) -> FavoritesResult<()> {
        match self.route().await? {
            Route::Remote(identity) => self.remove_remote(&identity, id).await,
            Route::Local => {
                let guard = self.local_lock.lock().await;
                match self.route().await? {
                    Route::Local => self.remove_local(id, guard).await,
                    Route::Remote(identity) => {
                        drop(guard);
                        self.remove_remote(&identity, id).await
                    }
                }
            }
        }
    }

    async fn route(&self) -> FavoritesResult<Route> {
        match &self.state.lock().await.phase {
            Phase::Anonymous => Ok(Route::Local),
            Phase::Merging { .. } => Err(Precondition::MergeInProgress.into()),
            Phase::Authenticated { identity } => Ok(Route::Remote(identity.clone())),
        }
    }

    async fn apply(
        &self,
        event: SessionEvent,
        guard: Option<MutexGuard<'_, ()>>,
    ) -> FavoritesResult<Option<MergeReport>> {
        let (effect, epoch) = {
            let mut state = self.state.lock().await;
            let step = transition(&state.phase, event)?;
            if step.session_changed {
                state.epoch += 1;
                // A merging session keeps showing the local favorites it is merging.
                if !matches!(step.next, Phase::Merging { .. }) {
                    state.view = FavoriteView::default();
                }
            }
            if state.phase != step.next {
                tracing::info!(
                    "Favorites session {} -> {}",
                    state.phase.label(),
                    step.next.label()
                );
            }
            state.phase = step.next;
            (step.effect, state.epoch)
        };

        match effect {
            Effect::None => Ok(None),
            Effect::LoadLocal => {
                drop(guard);
                self.load_local_view(epoch).await?;
                Ok(None)
            }
            Effect::LoadRemote(identity) => {
                drop(guard);
                self.load_remote_view(&identity, epoch).await?;
                Ok(None)
            }
            Effect::RunMerge(identity) => {
                let guard = match guard {
                    Some(guard) => guard,
                    None => self.local_lock.lock().await,
                };
                self.run_merge(&identity, epoch, guard).await.map(Some)
            }
        }
    }

    async fn run_merge(
        &self,
        identity: &Identity,
        epoch: u64,
        _guard: MutexGuard<'_, ()>,
    ) -> FavoritesResult<MergeReport> {
        // Merging keeps routing reads to the local favorites; show them.
        let local_items = self.local.load().await?;
        {
            let mut state = self.state.lock().await;
            if state.epoch == epoch {
                state.view = FavoriteView::from_items(local_items.clone());
            }
        }

        let result = self.merge_into_remote(&identity.user_id, local_items).await;

        let mut state = self.state.lock().await;
        let current = state.epoch == epoch;
        match result {
            Ok(outcome) => {
                if current {
                    let step = transition(&state.phase, SessionEvent::MergeCommitted)?;
                    state.phase = step.next;
                    state.view = outcome.view;
                    tracing::info!(
                        "Merged {} local favorites into account {} ({} already present)",
                        outcome.report.inserted.len(),
                        identity.user_id,
                        outcome.report.already_present
                    );
                } else {
                    tracing::debug!("Session changed during merge; discarding merged view");
                }
                Ok(outcome.report)
            }
            Err(error) => {
                if current {
                    let step = transition(&state.phase, SessionEvent::MergeFailed)?;
                    state.phase = step.next;
                }
                tracing::warn!(
                    "Favorites merge for account {} failed; local favorites kept: {}",
                    identity.user_id,
                    error
                );
                Err(error)
            }
        }
    }

    /// Insert the local favorites the account lacks, then clear the cache.
    /// The cache is only cleared after the remote insert is confirmed.
    async fn merge_into_remote(
        &self,
        user_id: &UserId,
        local_items: Vec<FavoriteItem>,
    ) -> FavoritesResult<MergeOutcome> {
        let existing_ids = self.remote.list_favorite_ids(user_id).await?;
        let existing: HashSet<&DestinationId> = existing_ids.iter().collect();

        let (to_insert, already): (Vec<FavoriteItem>, Vec<FavoriteItem>) = local_items
            .into_iter()
            .partition(|item| !existing.contains(&item.id));
        let inserted: Vec<DestinationId> = to_insert.iter().map(|item| item.id.clone()).collect();

        if inserted.is_empty() {
            tracing::debug!("All local favorites already present remotely");
        } else {
            tracing::debug!("Inserting {} favorites for {}", inserted.len(), user_id);
            match self.remote.insert_favorites(user_id, &inserted).await {
                Ok(()) => {}
                Err(StoreError::Conflict) => {
                    // A rejected batch wrote nothing; insert the rest one by one.
                    tracing::debug!("Concurrent writer inserted some merged favorites first");
                    for id in &inserted {
                        match self
                            .remote
                            .insert_favorites(user_id, std::slice::from_ref(id))
                            .await
                        {
                            Ok(()) | Err(StoreError::Conflict) => {}
                            Err(error) => return Err(error.into()),
                        }
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }

        self.local.clear().await?;

        let already_present = already.len();
        let mut view = match self.hydrate(&existing_ids).await {
            Ok(items) => FavoriteView::from_items(items),
            Err(error) => {
                // Membership stays exact; the next list() fetches the snapshots.
                tracing::warn!(
                    "Could not load account favorites after merge, showing ids only: {}",
                    error
                );
                FavoriteView::default()
            }
        };
        view.extend(already);
        view.extend(to_insert);
        for id in existing_ids {
            view.insert_id(id);
        }

        Ok(MergeOutcome {
            report: MergeReport {
                inserted,
                already_present,
            },
            view,
        })
    }

    async fn add_local(
        &self,
        item: FavoriteItem,
        _guard: MutexGuard<'_, ()>,
    ) -> FavoritesResult<()> {
        let mut items = self.local.load().await?;
        if items.iter().any(|existing| existing.id == item.id) {
            return Ok(());
        }
        items.push(item.clone());
        self.local.store(&items).await?;

        self.state.lock().await.view.insert(item);
        Ok(())
    }

    async fn remove_local(
        &self,
        id: &DestinationId,
        _guard: MutexGuard<'_, ()>,
    ) -> FavoritesResult<()> {
        let mut items = self.local.load().await?;
        let before = items.len();
        items.retain(|item| &item.id != id);
        if items.len() == before {
            return Ok(());
        }
        if items.is_empty() {
            self.local.clear().await?;
        } else {
            self.local.store(&items).await?;
        }

        self.state.lock().await.view.remove(id);
        Ok(())
    }

    async fn add_remote(&self, identity: &Identity, item: FavoriteItem) -> FavoritesResult<()> {
        if !can_mutate_favorites(Some(identity)) {
            return Err(Precondition::RoleForbidden.into());
        }

        match self
            .remote
            .insert_favorites(&identity.user_id, std::slice::from_ref(&item.id))
            .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                tracing::debug!("Favorite {} already stored for {}", item.id, identity.user_id);
            }
            Err(error) => return Err(error.into()),
        }

        let mut state = self.state.lock().await;
        if Self::still_signed_in_as(&state.phase, identity) {
            state.view.insert(item);
        }
        Ok(())
    }

    async fn remove_remote(&self, identity: &Identity, id: &DestinationId) -> FavoritesResult<()> {
        if !can_mutate_favorites(Some(identity)) {
            return Err(Precondition::RoleForbidden.into());
        }

        self.remote.delete_favorite(&identity.user_id, id).await?;

        let mut state = self.state.lock().await;
        if Self::still_signed_in_as(&state.phase, identity) {
            state.view.remove(id);
        }
        Ok(())
    }

    fn still_signed_in_as(phase: &Phase, identity: &Identity) -> bool {
        matches!(
            phase,
            Phase::Authenticated { identity: current } if current.same_account(identity)
        )
    }

    async fn load_local_view(&self, epoch: u64) -> FavoritesResult<()> {
        // Waits for a merge that outlived its session to finish with the cache.
        let _guard = self.local_lock.lock().await;
        let items = self.local.load().await?;
        let mut state = self.state.lock().await;
        if state.epoch == epoch {
            state.view = FavoriteView::from_items(items);
        }
        Ok(())
    }

    async fn load_remote_view(&self, identity: &Identity, epoch: u64) -> FavoritesResult<()> {
        let items = self.fetch_remote_items(&identity.user_id).await?;
        let mut state = self.state.lock().await;
        if state.epoch == epoch {
            state.view = FavoriteView::from_items(items);
        }
        Ok(())
    }

    async fn fetch_remote_items(&self, user_id: &UserId) -> FavoritesResult<Vec<FavoriteItem>> {
        let ids = self.remote.list_favorite_ids(user_id).await?;
        self.hydrate(&ids).await
    }

    /// Display snapshots for `ids`, in the order of `ids`.
    async fn hydrate(&self, ids: &[DestinationId]) -> FavoritesResult<Vec<FavoriteItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut items = self.remote.fetch_items_by_ids(ids).await?;
        let position: HashMap<&DestinationId, usize> =
            ids.iter().enumerate().map(|(index, id)| (id, index)).collect();
        items.sort_by_key(|item| position.get(&item.id).copied().unwrap_or(usize::MAX));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::{
        FavoritesError, InsertFailure, MemoryFavoriteCache, MemoryFavoriteStore, MergeAttempt,
    };
    use crate::identity::identity_channel;
    use crate::models::Role;
    use pretty_assertions::assert_eq;

    type TestReconciler = FavoritesReconciler<MemoryFavoriteCache, MemoryFavoriteStore>;

    fn id(raw: &str) -> DestinationId {
        DestinationId::parse(raw).unwrap()
    }

    fn item(raw: &str) -> FavoriteItem {
        let mut item = FavoriteItem::new(id(raw), format!("Destination {raw}"));
        item.category = Some("Beaches".to_string());
        item
    }

    fn user_id() -> UserId {
        UserId::parse("u1").unwrap()
    }

    fn user() -> Identity {
        Identity::new(user_id(), Role::User)
    }

    fn admin() -> Identity {
        Identity::new(UserId::parse("admin-1").unwrap(), Role::Admin)
    }

    fn ids(items: &[FavoriteItem]) -> Vec<DestinationId> {
        items.iter().map(|item| item.id.clone()).collect()
    }

    async fn setup(local: &[&str], remote: &[&str]) -> TestReconciler {
        let cache = MemoryFavoriteCache::with_items(local.iter().map(|raw| item(raw)).collect());
        let store = MemoryFavoriteStore::new();
        store.add_catalog_items(["a", "b", "c", "d1", "x"].map(item));
        for raw in remote {
            store.seed(&user_id(), &id(raw));
        }
        FavoritesReconciler::open(cache, store).await.unwrap()
    }

    #[tokio::test]
    async fn anonymous_add_is_idempotent() {
        let reconciler = setup(&[], &[]).await;

        reconciler.add(item("x")).await.unwrap();
        reconciler.add(item("x")).await.unwrap();

        assert_eq!(reconciler.local().load().await.unwrap(), vec![item("x")]);
        assert_eq!(ids(&reconciler.list().await.unwrap()), vec![id("x")]);
        assert!(reconciler.is_favorite(&id("x")).await);
        assert_eq!(reconciler.remote().insert_calls(), 0);
    }

    #[tokio::test]
    async fn authenticated_add_is_idempotent() {
        let reconciler = setup(&[], &[]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();

        reconciler.add(item("x")).await.unwrap();
        reconciler.add(item("x")).await.unwrap();

        assert_eq!(reconciler.remote().favorites_of(&user_id()), vec![id("x")]);
        assert!(reconciler.is_favorite(&id("x")).await);
        assert!(!reconciler.local().has_record());
    }

    #[tokio::test]
    async fn anonymous_remove_of_last_favorite_clears_record() {
        let reconciler = setup(&["a"], &[]).await;

        reconciler.remove(&id("missing")).await.unwrap();
        reconciler.remove(&id("a")).await.unwrap();

        assert!(!reconciler.local().has_record());
        assert!(!reconciler.is_favorite(&id("a")).await);
    }

    #[tokio::test]
    async fn merge_skips_favorites_already_in_account() {
        let reconciler = setup(&["a", "b", "c"], &["b"]).await;

        let report = reconciler
            .handle_identity(Some(user()))
            .await
            .unwrap()
            .expect("merge should run");

        assert_eq!(report.inserted, vec![id("a"), id("c")]);
        assert_eq!(report.already_present, 1);
        assert_eq!(
            reconciler.remote().favorites_of(&user_id()),
            vec![id("a"), id("b"), id("c")]
        );
        assert_eq!(reconciler.remote().row_count(&user_id(), &id("b")), 1);
        assert!(reconciler.local().load().await.unwrap().is_empty());
        assert!(matches!(
            reconciler.phase().await,
            Phase::Authenticated { .. }
        ));
        for raw in ["a", "b", "c"] {
            assert!(reconciler.is_favorite(&id(raw)).await);
        }
    }

    #[tokio::test]
    async fn catalog_outage_after_merge_keeps_account_membership() {
        let reconciler = setup(&["a"], &["b"]).await;
        reconciler.remote().set_catalog_unavailable(true);

        let report = reconciler.handle_identity(Some(user())).await.unwrap().unwrap();

        assert_eq!(report.inserted, vec![id("a")]);
        assert!(matches!(reconciler.phase().await, Phase::Authenticated { .. }));
        assert!(reconciler.is_favorite(&id("a")).await);
        assert!(reconciler.is_favorite(&id("b")).await);
        assert!(!reconciler.local().has_record());

        reconciler.remote().set_catalog_unavailable(false);
        assert_eq!(ids(&reconciler.list().await.unwrap()), vec![id("a"), id("b")]);
    }

    #[tokio::test]
    async fn failed_merge_keeps_local_favorites() {
        let reconciler = setup(&["a", "b", "c"], &[]).await;
        reconciler.remote().fail_next_insert(InsertFailure::Unavailable);

        let error = reconciler.handle_identity(Some(user())).await.unwrap_err();

        assert!(matches!(error, FavoritesError::Unavailable(_)));
        assert!(error.is_retryable());
        assert_eq!(
            reconciler.local().load().await.unwrap(),
            vec![item("a"), item("b"), item("c")]
        );
        assert_eq!(
            ids(&reconciler.list().await.unwrap()),
            vec![id("a"), id("b"), id("c")]
        );
        assert_eq!(
            reconciler.phase().await,
            Phase::Merging {
                identity: user(),
                attempt: MergeAttempt::Failed,
            }
        );
    }

    #[tokio::test]
    async fn mutations_are_rejected_while_merge_is_unfinished() {
        let reconciler = setup(&["a"], &[]).await;
        reconciler.remote().fail_next_insert(InsertFailure::Unavailable);
        reconciler.handle_identity(Some(user())).await.unwrap_err();

        let error = reconciler.add(item("x")).await.unwrap_err();
        assert!(matches!(
            error,
            FavoritesError::PreconditionFailed(Precondition::MergeInProgress)
        ));
        let error = reconciler.remove(&id("a")).await.unwrap_err();
        assert!(matches!(
            error,
            FavoritesError::PreconditionFailed(Precondition::MergeInProgress)
        ));
        assert_eq!(reconciler.local().load().await.unwrap(), vec![item("a")]);
    }

    #[tokio::test]
    async fn partial_failure_then_retry_converges() {
        let reconciler = setup(&["a", "b", "c"], &[]).await;
        reconciler.remote().fail_next_insert(InsertFailure::Partial { applied: 1 });

        let error = reconciler.handle_identity(Some(user())).await.unwrap_err();
        assert!(matches!(
            error,
            FavoritesError::PartialFailure { ref committed, .. } if committed == &vec![id("a")]
        ));
        assert_eq!(reconciler.local().load().await.unwrap().len(), 3);

        let report = reconciler.retry_merge().await.unwrap().unwrap();
        assert_eq!(report.inserted, vec![id("b"), id("c")]);
        assert_eq!(report.already_present, 1);
        for raw in ["a", "b", "c"] {
            assert_eq!(reconciler.remote().row_count(&user_id(), &id(raw)), 1);
        }
        assert!(!reconciler.local().has_record());
    }

    #[tokio::test]
    async fn failed_merge_reruns_on_next_identity_notification() {
        let reconciler = setup(&["a"], &[]).await;
        reconciler.remote().fail_next_insert(InsertFailure::Unavailable);
        reconciler.handle_identity(Some(user())).await.unwrap_err();

        let report = reconciler.handle_identity(Some(user())).await.unwrap();
        assert_eq!(report.map(|report| report.inserted), Some(vec![id("a")]));
        assert!(matches!(
            reconciler.phase().await,
            Phase::Authenticated { .. }
        ));
    }

    #[tokio::test]
    async fn retry_while_anonymous_is_rejected() {
        let reconciler = setup(&["a"], &[]).await;
        let error = reconciler.retry_merge().await.unwrap_err();
        assert!(matches!(
            error,
            FavoritesError::PreconditionFailed(Precondition::NotAuthenticated)
        ));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn concurrent_adds_store_one_row() {
        let reconciler = setup(&[], &[]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();
        reconciler.remote().set_strict_conflicts(true);

        let (first, second) = tokio::join!(reconciler.add(item("x")), reconciler.add(item("x")));
        first.unwrap();
        second.unwrap();

        assert_eq!(reconciler.remote().row_count(&user_id(), &id("x")), 1);
        assert!(reconciler.is_favorite(&id("x")).await);
    }

    #[tokio::test]
    async fn rejected_merge_batch_falls_back_to_single_inserts() {
        let reconciler = setup(&["a", "b", "c"], &[]).await;
        reconciler.remote().set_strict_conflicts(true);
        let hold = reconciler.remote().hold_next_insert();

        let sign_in = reconciler.handle_identity(Some(user()));
        let racing_writer = async {
            hold.wait_started().await;
            reconciler.remote().seed(&user_id(), &id("b"));
            hold.release();
        };
        let (merged, ()) = tokio::join!(sign_in, racing_writer);

        merged.unwrap().unwrap();
        assert_eq!(
            reconciler.remote().favorites_of(&user_id()),
            vec![id("a"), id("b"), id("c")]
        );
        assert_eq!(reconciler.remote().row_count(&user_id(), &id("b")), 1);
        assert!(!reconciler.local().has_record());
    }

    #[tokio::test]
    async fn admin_never_mutates_remote_store() {
        let reconciler = setup(&[], &[]).await;
        reconciler.handle_identity(Some(admin())).await.unwrap();

        let error = reconciler.add(item("x")).await.unwrap_err();
        assert!(matches!(
            error,
            FavoritesError::PreconditionFailed(Precondition::RoleForbidden)
        ));
        let error = reconciler.remove(&id("x")).await.unwrap_err();
        assert!(matches!(
            error,
            FavoritesError::PreconditionFailed(Precondition::RoleForbidden)
        ));

        assert_eq!(reconciler.remote().insert_calls(), 0);
        assert_eq!(reconciler.remote().delete_calls(), 0);
        assert!(!reconciler.is_favorite(&id("x")).await);
    }

    #[tokio::test]
    async fn role_downgrade_to_admin_blocks_further_writes() {
        let reconciler = setup(&[], &[]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();
        reconciler.add(item("x")).await.unwrap();

        reconciler
            .handle_identity(Some(Identity::new(user_id(), Role::Admin)))
            .await
            .unwrap();
        let error = reconciler.remove(&id("x")).await.unwrap_err();
        assert!(matches!(
            error,
            FavoritesError::PreconditionFailed(Precondition::RoleForbidden)
        ));
        assert_eq!(reconciler.remote().favorites_of(&user_id()), vec![id("x")]);
    }

    #[tokio::test]
    async fn repeated_sign_in_does_not_replay_merge() {
        let reconciler = setup(&["a"], &[]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();
        assert_eq!(reconciler.remote().insert_calls(), 1);

        let report = reconciler.handle_identity(Some(user())).await.unwrap();
        assert_eq!(report, None);
        assert_eq!(reconciler.remote().insert_calls(), 1);
    }

    #[tokio::test]
    async fn first_favorite_merges_into_empty_account() {
        let reconciler = setup(&["d1"], &[]).await;

        reconciler.handle_identity(Some(user())).await.unwrap();

        assert_eq!(reconciler.remote().favorites_of(&user_id()), vec![id("d1")]);
        assert!(reconciler.local().load().await.unwrap().is_empty());
        assert_eq!(reconciler.list().await.unwrap(), vec![item("d1")]);
    }

    #[tokio::test]
    async fn favorite_already_in_account_is_not_duplicated() {
        let reconciler = setup(&["d1"], &["d1"]).await;

        let report = reconciler.handle_identity(Some(user())).await.unwrap().unwrap();

        assert!(report.inserted.is_empty());
        assert_eq!(reconciler.remote().insert_calls(), 0);
        assert_eq!(reconciler.remote().row_count(&user_id(), &id("d1")), 1);
        assert!(reconciler.local().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_in_without_local_favorites_loads_account() {
        let reconciler = setup(&[], &["a", "b"]).await;

        let report = reconciler.handle_identity(Some(user())).await.unwrap();

        assert_eq!(report, None);
        assert_eq!(reconciler.remote().insert_calls(), 0);
        assert!(reconciler.is_favorite(&id("a")).await);
        assert!(reconciler.is_favorite(&id("b")).await);
    }

    #[tokio::test]
    async fn sign_out_does_not_copy_account_favorites_locally() {
        let reconciler = setup(&["a"], &["b"]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();

        reconciler.handle_identity(None).await.unwrap();

        assert_eq!(reconciler.phase().await, Phase::Anonymous);
        assert!(reconciler.list().await.unwrap().is_empty());
        assert!(!reconciler.is_favorite(&id("b")).await);
        assert!(!reconciler.local().has_record());
    }

    #[tokio::test]
    async fn second_anonymous_period_merges_again() {
        let reconciler = setup(&["a"], &[]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();
        reconciler.handle_identity(None).await.unwrap();

        reconciler.add(item("b")).await.unwrap();
        let report = reconciler.handle_identity(Some(user())).await.unwrap().unwrap();

        assert_eq!(report.inserted, vec![id("b")]);
        assert_eq!(
            reconciler.remote().favorites_of(&user_id()),
            vec![id("a"), id("b")]
        );
        assert_eq!(reconciler.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn account_switch_replaces_view() {
        let reconciler = setup(&[], &["a"]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();
        assert!(reconciler.is_favorite(&id("a")).await);

        let other = Identity::new(UserId::parse("u2").unwrap(), Role::User);
        reconciler
            .remote()
            .seed(&other.user_id, &id("c"));
        reconciler.handle_identity(Some(other)).await.unwrap();

        assert!(!reconciler.is_favorite(&id("a")).await);
        assert!(reconciler.is_favorite(&id("c")).await);
    }

    #[tokio::test]
    async fn failed_remote_add_leaves_status_unchanged() {
        let reconciler = setup(&[], &[]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();
        reconciler.remote().set_unavailable(true);

        let error = reconciler.add(item("x")).await.unwrap_err();

        assert!(matches!(error, FavoritesError::Unavailable(_)));
        assert!(!reconciler.is_favorite(&id("x")).await);
    }

    #[tokio::test]
    async fn remote_remove_is_idempotent() {
        let reconciler = setup(&[], &["a"]).await;
        reconciler.handle_identity(Some(user())).await.unwrap();

        reconciler.remove(&id("a")).await.unwrap();
        reconciler.remove(&id("a")).await.unwrap();

        assert!(reconciler.remote().favorites_of(&user_id()).is_empty());
        assert!(!reconciler.is_favorite(&id("a")).await);
    }

    #[tokio::test]
    async fn sign_out_mid_merge_routes_locally_and_discards_view() {
        let reconciler = setup(&["a"], &[]).await;
        let hold = reconciler.remote().hold_next_insert();

        let sign_in = reconciler.handle_identity(Some(user()));
        let sign_out = async {
            hold.wait_started().await;
            let observe_then_release = async {
                tokio::task::yield_now().await;
                assert_eq!(reconciler.phase().await, Phase::Anonymous);
                hold.release();
            };
            let (signed_out, ()) =
                tokio::join!(reconciler.handle_identity(None), observe_then_release);
            signed_out
        };
        let (merged, signed_out) = tokio::join!(sign_in, sign_out);

        let report = merged.unwrap().unwrap();
        signed_out.unwrap();
        assert_eq!(report.inserted, vec![id("a")]);
        assert_eq!(reconciler.phase().await, Phase::Anonymous);
        assert_eq!(reconciler.remote().favorites_of(&user_id()), vec![id("a")]);
        assert!(!reconciler.local().has_record());
        assert!(!reconciler.is_favorite(&id("a")).await);

        reconciler.add(item("x")).await.unwrap();
        assert_eq!(reconciler.local().load().await.unwrap(), vec![item("x")]);
    }

    #[tokio::test]
    async fn observe_applies_feed_in_order() {
        let reconciler = setup(&["a"], &[]).await;
        let (publisher, feed) = identity_channel(None);

        let drive = async {
            publisher.sign_in(user());
            drop(publisher);
        };
        tokio::join!(reconciler.observe(feed), drive);

        assert!(matches!(
            reconciler.phase().await,
            Phase::Authenticated { .. }
        ));
        assert_eq!(reconciler.remote().favorites_of(&user_id()), vec![id("a")]);
    }
}
