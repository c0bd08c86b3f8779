use std::path::Path;

use roam_core::favorites::{MergeAttempt, Phase};

use crate::cli::FavoriteCommands;
use crate::commands::common::{
    describe_merge, format_destination_line, open_favorites_session, parse_destination_id,
};
use crate::error::CliError;

pub async fn run_favorites(
    command: FavoriteCommands,
    global_profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let favorites = open_favorites_session(global_profile, db_path).await?;
    let reconciler = &favorites.reconciler;

    match command {
        FavoriteCommands::List { json } => {
            let items = reconciler.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No favorites yet.");
            } else {
                for item in &items {
                    println!("{}", format_destination_line(item, true));
                }
            }
            Ok(())
        }
        FavoriteCommands::Add { id } => {
            let id = parse_destination_id(&id)?;
            let item = favorites
                .catalog
                .get_destination(&id)
                .await?
                .ok_or_else(|| CliError::DestinationNotFound(id.to_string()))?;
            let name = item.name.clone();
            reconciler.add(item).await?;
            println!("Added {name} ({id}) to {}", favorites_label(favorites.is_signed_in()));
            Ok(())
        }
        FavoriteCommands::Remove { id } => {
            let id = parse_destination_id(&id)?;
            reconciler.remove(&id).await?;
            println!("Removed {id} from {}", favorites_label(favorites.is_signed_in()));
            Ok(())
        }
        FavoriteCommands::Check { id } => {
            let id = parse_destination_id(&id)?;
            if reconciler.is_favorite(&id).await {
                println!("{id} is a favorite");
            } else {
                println!("{id} is not a favorite");
            }
            Ok(())
        }
        FavoriteCommands::Sync => {
            match favorites.phase().await {
                Phase::Anonymous => {
                    let count = reconciler.list().await?.len();
                    println!(
                        "Not signed in; {count} favorites are kept on this device until you run `roam auth login`."
                    );
                }
                Phase::Merging {
                    attempt: MergeAttempt::Failed,
                    ..
                } => match reconciler.retry_merge().await? {
                    Some(report) => println!("{}", describe_merge(&report)),
                    None => println!("Favorites are in sync."),
                },
                Phase::Merging {
                    attempt: MergeAttempt::InFlight,
                    ..
                } => println!("A favorites merge is already running."),
                Phase::Authenticated { .. } => match &favorites.reconciled {
                    Ok(Some(report)) => println!("{}", describe_merge(report)),
                    _ => println!("Favorites are in sync."),
                },
            }
            Ok(())
        }
    }
}

const fn favorites_label(signed_in: bool) -> &'static str {
    if signed_in {
        "your account favorites"
    } else {
        "favorites on this device"
    }
}
