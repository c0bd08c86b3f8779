use std::path::Path;

use chrono::{TimeZone, Utc};
use roam_core::auth::{AuthSession, SessionPersistence, SignUpOutcome};

use crate::auth::{auth_client, clear_stored_session, SessionStore};
use crate::cli::AuthCommands;
use crate::commands::common::{describe_merge, open_favorites_session, resolve_backend};
use crate::error::CliError;

pub async fn run_auth(
    command: AuthCommands,
    global_profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email, password } => {
            let (profile_name, backend) = resolve_backend(global_profile)?;
            let client = auth_client(&profile_name, &backend)
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let session = client
                .sign_in(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!(
                "Signed in profile '{}' as {}",
                profile_name,
                email_label(&session)
            );
            report_reconcile(global_profile, db_path).await
        }
        AuthCommands::Signup { email, password } => {
            let (profile_name, backend) = resolve_backend(global_profile)?;
            let client = auth_client(&profile_name, &backend)
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let outcome = client
                .sign_up(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match outcome {
                SignUpOutcome::SignedIn(session) => {
                    println!(
                        "Created account and signed in profile '{}' as {}",
                        profile_name,
                        email_label(&session)
                    );
                    report_reconcile(global_profile, db_path).await
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!(
                        "Account created. Confirm your email, then run `roam auth login`."
                    );
                    Ok(())
                }
            }
        }
        AuthCommands::Status => {
            let favorites = open_favorites_session(global_profile, db_path).await?;
            match (&favorites.session, &favorites.identity) {
                (Some(session), Some(identity)) => {
                    println!(
                        "Profile '{}' is signed in as {} (role: {}, session expires {})",
                        favorites.profile_name,
                        email_label(session),
                        identity.role,
                        format_expiry(session.expires_at)
                    );
                }
                _ => println!("Profile '{}' is not signed in.", favorites.profile_name),
            }
            println!("Favorites: {}", favorites.phase().await.label());
            Ok(())
        }
        AuthCommands::Logout => {
            let (profile_name, backend) = resolve_backend(global_profile)?;
            let stored = SessionStore::new(&profile_name)
                .load_session()
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match stored {
                Some(session) => {
                    let client = auth_client(&profile_name, &backend)
                        .map_err(|error| CliError::Auth(error.to_string()))?;
                    // The stored session is cleared even when revocation fails.
                    if let Err(error) = client.sign_out(&session).await {
                        tracing::warn!("Session revocation failed: {}", error);
                    }
                }
                None => clear_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?,
            }
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

async fn report_reconcile(global_profile: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let favorites = open_favorites_session(global_profile, db_path).await?;
    match &favorites.reconciled {
        Ok(Some(report)) => println!("{}", describe_merge(report)),
        Ok(None) => {}
        Err(error) => println!(
            "Favorites saved on this device were kept but not merged yet ({error}). Run `roam favorites sync` to retry."
        ),
    }
    Ok(())
}

fn email_label(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or("(no email)")
}

pub fn format_expiry(expires_at: i64) -> String {
    Utc.timestamp_opt(expires_at, 0).single().map_or_else(
        || expires_at.to_string(),
        |time| time.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}
