use std::env;
use std::path::{Path, PathBuf};

use roam_core::auth::AuthSession;
use roam_core::config::BackendConfig;
use roam_core::db::{Database, LibSqlFavoriteCache};
use roam_core::favorites::{FavoritesReconciler, FavoritesResult, MergeReport, Phase};
use roam_core::supabase::{
    CatalogCaller, CatalogClient, RestClient, SupabaseFavoriteStore, SupabaseProfileClient,
};
use roam_core::{DestinationId, FavoriteItem, Identity};

use crate::auth::auth_client;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub const DB_PATH_ENV: &str = "ROAM_DB_PATH";

pub type Reconciler = FavoritesReconciler<LibSqlFavoriteCache, SupabaseFavoriteStore>;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("roam").join("roam.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Profile name and backend settings, from the profile file or environment.
pub fn resolve_backend(global_profile: Option<&str>) -> Result<(String, BackendConfig), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);

    let from_profile = match config.profile(&profile_name) {
        Some(profile) => profile
            .backend_config()
            .map_err(|error| CliError::Config(format!("Profile '{profile_name}': {error}")))?,
        None => None,
    };
    let backend = match from_profile {
        Some(backend) => Some(backend),
        None => BackendConfig::from_env()?,
    };

    backend
        .map(|backend| (profile_name.clone(), backend))
        .ok_or(CliError::NotConfigured(profile_name))
}

/// Everything one command needs to read and change favorites.
pub struct FavoritesSession {
    pub profile_name: String,
    pub reconciler: Reconciler,
    pub catalog: CatalogClient,
    pub session: Option<AuthSession>,
    pub identity: Option<Identity>,
    /// Outcome of applying the restored identity, including any merge
    pub reconciled: FavoritesResult<Option<MergeReport>>,
    _db: Database,
}

impl FavoritesSession {
    pub const fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    pub async fn phase(&self) -> Phase {
        self.reconciler.phase().await
    }

    /// The signed-in identity with its token, for admin catalog calls.
    pub fn catalog_caller(&self) -> Option<CatalogCaller<'_>> {
        match (&self.identity, &self.session) {
            (Some(identity), Some(session)) => Some(CatalogCaller {
                identity,
                access_token: &session.access_token,
            }),
            _ => None,
        }
    }
}

/// Open the local database, restore the stored session, and apply it to a
/// fresh reconciler. A pending anonymous merge runs here.
pub async fn open_favorites_session(
    global_profile: Option<&str>,
    db_path: &Path,
) -> Result<FavoritesSession, CliError> {
    let (profile_name, backend) = resolve_backend(global_profile)?;
    let db = Database::open(db_path).await?;
    let rest = RestClient::new(&backend)?;
    let store = SupabaseFavoriteStore::new(rest.clone());
    let auth = auth_client(&profile_name, &backend)
        .map_err(|error| CliError::Auth(error.to_string()))?;

    let session = auth
        .restore_session()
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;
    let identity = match &session {
        Some(session) => {
            store.set_access_token(Some(session.access_token.clone()));
            let user_id = session
                .user_id()
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let role = SupabaseProfileClient::new(rest.clone())
                .fetch_role(&user_id, &session.access_token)
                .await?;
            Some(Identity::new(user_id, role))
        }
        None => None,
    };

    let reconciler =
        FavoritesReconciler::open(LibSqlFavoriteCache::from_database(&db), store).await?;
    let reconciled = reconciler.handle_identity(identity.clone()).await;
    if let Err(error) = &reconciled {
        tracing::warn!("Favorites not reconciled for profile '{}': {}", profile_name, error);
    }

    Ok(FavoritesSession {
        profile_name,
        reconciler,
        catalog: CatalogClient::new(rest),
        session,
        identity,
        reconciled,
        _db: db,
    })
}

pub fn parse_destination_id(raw: &str) -> Result<DestinationId, CliError> {
    Ok(DestinationId::parse(raw)?)
}

pub fn describe_merge(report: &MergeReport) -> String {
    let moved = report.inserted.len();
    let noun = if moved == 1 { "favorite" } else { "favorites" };
    if report.already_present == 0 {
        format!("Moved {moved} {noun} from this device into your account")
    } else {
        format!(
            "Moved {moved} {noun} from this device into your account ({} already saved)",
            report.already_present
        )
    }
}

pub fn format_destination_line(item: &FavoriteItem, favorite: bool) -> String {
    let marker = if favorite { "*" } else { " " };
    let mut line = format!("{marker} {:<8} {}", item.id.as_str(), item.name);
    if let Some(location) = item.location.as_deref().filter(|value| !value.is_empty()) {
        line.push_str(&format!(" - {location}"));
    }
    if let Some(category) = item.category.as_deref().filter(|value| !value.is_empty()) {
        line.push_str(&format!(" [{category}]"));
    }
    if let Some(rating) = item.rating {
        line.push_str(&format!(" {rating:.1}"));
    }
    line
}

pub fn format_destination_details(item: &FavoriteItem, favorite: bool) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", item.name, item.id)];
    if let Some(location) = &item.location {
        lines.push(format!("Location: {location}"));
    }
    if let Some(category) = &item.category {
        lines.push(format!("Category: {category}"));
    }
    if let Some(rating) = item.rating {
        lines.push(format!("Rating: {rating:.1}"));
    }
    if let Some(cover) = item.cover_image() {
        lines.push(format!("Image: {cover}"));
    }
    let description = item.description_preview(280);
    if !description.is_empty() {
        lines.push(String::new());
        lines.push(description);
    }
    lines.push(String::new());
    lines.push(if favorite {
        "In your favorites".to_string()
    } else {
        "Not in your favorites".to_string()
    });
    lines
}
