use std::collections::HashSet;
use std::path::Path;

use roam_core::models::{DestinationDraft, DestinationPatch};
use roam_core::supabase::DestinationQuery;
use roam_core::DestinationId;

use crate::cli::{DestinationCommands, DestinationFields};
use crate::commands::common::{
    format_destination_details, format_destination_line, open_favorites_session,
    parse_destination_id,
};
use crate::error::CliError;

pub async fn run_destinations(
    command: DestinationCommands,
    global_profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let favorites = open_favorites_session(global_profile, db_path).await?;

    match command {
        DestinationCommands::List {
            search,
            category,
            sort,
            json,
        } => {
            let query = DestinationQuery {
                search,
                category,
                sort: sort.into(),
            };
            let destinations = query.apply(favorites.catalog.list_destinations().await?);

            if json {
                println!("{}", serde_json::to_string_pretty(&destinations)?);
                return Ok(());
            }

            let favorite_ids: HashSet<DestinationId> = favorites
                .reconciler
                .list()
                .await?
                .into_iter()
                .map(|item| item.id)
                .collect();
            for destination in &destinations {
                println!(
                    "{}",
                    format_destination_line(destination, favorite_ids.contains(&destination.id))
                );
            }
            let noun = if destinations.len() == 1 {
                "destination"
            } else {
                "destinations"
            };
            println!("Showing {} {noun}", destinations.len());
            Ok(())
        }
        DestinationCommands::Show { id, json } => {
            let id = parse_destination_id(&id)?;
            let destination = favorites
                .catalog
                .get_destination(&id)
                .await?
                .ok_or_else(|| CliError::DestinationNotFound(id.to_string()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&destination)?);
            } else {
                let favorite = favorites.reconciler.is_favorite(&id).await;
                for line in format_destination_details(&destination, favorite) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        DestinationCommands::Create { fields } => {
            let draft = draft_from_fields(fields)?;
            let created = favorites
                .catalog
                .create_destination(favorites.catalog_caller(), draft)
                .await?;
            println!("Created destination {} ({})", created.name, created.id);
            Ok(())
        }
        DestinationCommands::Edit { id, fields } => {
            let id = parse_destination_id(&id)?;
            let updated = favorites
                .catalog
                .update_destination(favorites.catalog_caller(), &id, patch_from_fields(fields))
                .await?;
            println!("Updated destination {} ({})", updated.name, updated.id);
            Ok(())
        }
        DestinationCommands::Delete { id, yes } => {
            let id = parse_destination_id(&id)?;
            if !yes {
                return Err(CliError::Unconfirmed(id.to_string()));
            }
            let deleted = favorites
                .catalog
                .delete_destination(favorites.catalog_caller(), &id)
                .await?;
            println!("Deleted destination {} ({})", deleted.name, deleted.id);
            Ok(())
        }
        DestinationCommands::Stats { id } => {
            let id = parse_destination_id(&id)?;
            let count = favorites
                .catalog
                .favorite_count(favorites.catalog_caller(), &id)
                .await?;
            let noun = if count == 1 { "account" } else { "accounts" };
            println!("Destination {id} is a favorite of {count} {noun}");
            Ok(())
        }
    }
}

/// A full draft from `create` flags; every field must be given.
pub fn draft_from_fields(fields: DestinationFields) -> Result<DestinationDraft, CliError> {
    fn required<T>(value: Option<T>, flag: &str) -> Result<T, CliError> {
        value.ok_or_else(|| roam_core::Error::InvalidInput(format!("--{flag} is required")).into())
    }

    Ok(DestinationDraft {
        name: required(fields.name, "name")?,
        description: required(fields.description, "description")?,
        category: required(fields.category, "category")?,
        location: required(fields.location, "location")?,
        latitude: required(fields.latitude, "latitude")?,
        longitude: required(fields.longitude, "longitude")?,
        rating: required(fields.rating, "rating")?,
        entry_fee: required(fields.entry_fee, "entry-fee")?,
        timings: required(fields.timings, "timings")?,
        official_link: required(fields.official_link, "official-link")?,
        images: required(fields.images, "images")?,
    })
}

pub fn patch_from_fields(fields: DestinationFields) -> DestinationPatch {
    DestinationPatch {
        name: fields.name,
        description: fields.description,
        category: fields.category,
        location: fields.location,
        latitude: fields.latitude,
        longitude: fields.longitude,
        rating: fields.rating,
        entry_fee: fields.entry_fee,
        timings: fields.timings,
        official_link: fields.official_link,
        images: fields.images,
    }
}
