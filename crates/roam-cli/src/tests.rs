use std::path::PathBuf;

use clap::Parser;
use pretty_assertions::assert_eq;
use roam_core::favorites::MergeReport;
use roam_core::supabase::DestinationSort;
use roam_core::{DestinationId, FavoriteItem};

use crate::cli::{
    Cli, Commands, DestinationCommands, DestinationFields, FavoriteCommands, SortOrder,
};
use crate::commands::auth_cmd::format_expiry;
use crate::commands::common::{
    describe_merge, format_destination_details, format_destination_line, parse_destination_id,
    resolve_db_path,
};
use crate::commands::config::{mask_key, merge_profile};
use crate::commands::destinations::{draft_from_fields, patch_from_fields};
use crate::config_profiles::CliProfile;

fn id(raw: &str) -> DestinationId {
    DestinationId::parse(raw).unwrap()
}

fn destination() -> FavoriteItem {
    let mut item = FavoriteItem::new(id("12"), "Lake Bled");
    item.location = Some("Slovenia".to_string());
    item.category = Some("Lakes".to_string());
    item.rating = Some(4.8);
    item.images = vec!["https://img.example.com/bled.jpg".to_string()];
    item
}

#[test]
fn explicit_db_path_wins() {
    let resolved = resolve_db_path(Some(PathBuf::from("/tmp/custom.db"))).unwrap();
    assert_eq!(resolved, PathBuf::from("/tmp/custom.db"));
}

#[test]
fn parse_destination_id_rejects_blank() {
    assert!(parse_destination_id("  ").is_err());
    assert_eq!(parse_destination_id(" 12 ").unwrap(), id("12"));
}

#[test]
fn destination_line_marks_favorites() {
    assert_eq!(
        format_destination_line(&destination(), true),
        "* 12       Lake Bled - Slovenia [Lakes] 4.8"
    );
    let bare = FavoriteItem::new(id("7"), "Somewhere");
    assert_eq!(format_destination_line(&bare, false), "  7        Somewhere");
}

#[test]
fn destination_details_show_favorite_status() {
    let lines = format_destination_details(&destination(), false);
    assert_eq!(lines[0], "Lake Bled (12)");
    assert!(lines.contains(&"Image: https://img.example.com/bled.jpg".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("Not in your favorites"));
}

#[test]
fn merge_summary_mentions_existing_favorites() {
    let report = MergeReport {
        inserted: vec![id("a"), id("c")],
        already_present: 1,
    };
    assert_eq!(
        describe_merge(&report),
        "Moved 2 favorites from this device into your account (1 already saved)"
    );
    let single = MergeReport {
        inserted: vec![id("a")],
        already_present: 0,
    };
    assert_eq!(
        describe_merge(&single),
        "Moved 1 favorite from this device into your account"
    );
}

#[test]
fn merge_profile_prefers_flags_then_env_then_existing() {
    let existing = CliProfile {
        supabase_url: Some("https://old.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
    };
    let merged = merge_profile(
        &existing,
        Some(" https://new.supabase.co ".to_string()),
        None,
        |key| (key == "SUPABASE_ANON_KEY").then(|| "env-key".to_string()),
    );
    assert_eq!(merged.supabase_url.as_deref(), Some("https://new.supabase.co"));
    assert_eq!(merged.supabase_anon_key.as_deref(), Some("env-key"));

    let kept = merge_profile(&existing, None, None, |_| None);
    assert_eq!(kept, existing);
}

#[test]
fn mask_key_hides_most_characters() {
    assert_eq!(mask_key("short"), "*****");
    assert_eq!(mask_key("eyJhbGciOiJIUzI1NiJ9.abcd"), "********abcd");
}

#[test]
fn format_expiry_renders_utc() {
    assert_eq!(format_expiry(1_700_000_000), "2023-11-14 22:13 UTC");
}

#[test]
fn cli_parses_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "roam",
        "favorites",
        "add",
        "42",
        "--profile",
        "work",
        "--db-path",
        "/tmp/roam.db",
    ])
    .unwrap();
    assert_eq!(cli.profile.as_deref(), Some("work"));
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/roam.db")));
    assert!(matches!(
        cli.command,
        Commands::Favorites {
            command: FavoriteCommands::Add { ref id }
        } if id == "42"
    ));
}

#[test]
fn cli_parses_destination_sort() {
    let cli = Cli::try_parse_from([
        "roam",
        "destinations",
        "list",
        "--sort",
        "rating",
        "--category",
        "Beaches",
    ])
    .unwrap();
    let Commands::Destinations {
        command: DestinationCommands::List { sort, category, .. },
    } = cli.command
    else {
        panic!("expected destinations list");
    };
    assert_eq!(sort, SortOrder::Rating);
    assert_eq!(DestinationSort::from(sort), DestinationSort::Rating);
    assert_eq!(category.as_deref(), Some("Beaches"));
}

#[test]
fn cli_requires_a_command() {
    assert!(Cli::try_parse_from(["roam"]).is_err());
}

fn destination_command(args: &[&str]) -> DestinationCommands {
    let argv = ["roam", "destinations"].into_iter().chain(args.iter().copied());
    let cli = Cli::try_parse_from(argv).unwrap();
    let Commands::Destinations { command } = cli.command else {
        panic!("expected destinations command");
    };
    command
}

#[test]
fn cli_parses_destination_create_flags() {
    let command = destination_command(&[
        "create",
        "--name",
        "Banff",
        "--longitude",
        "-115.57",
        "--images",
        "https://img.example.com/a.jpg,https://img.example.com/b.jpg",
    ]);
    let DestinationCommands::Create { fields } = command else {
        panic!("expected destinations create");
    };
    assert_eq!(fields.name.as_deref(), Some("Banff"));
    assert_eq!(fields.longitude, Some(-115.57));
    assert_eq!(
        fields.images,
        Some(vec![
            "https://img.example.com/a.jpg".to_string(),
            "https://img.example.com/b.jpg".to_string(),
        ])
    );
}

#[test]
fn cli_parses_destination_edit_and_delete() {
    let DestinationCommands::Edit { id, fields } =
        destination_command(&["edit", "42", "--rating", "4.5"])
    else {
        panic!("expected destinations edit");
    };
    assert_eq!(id, "42");
    assert_eq!(fields.rating, Some(4.5));
    assert_eq!(fields.name, None);

    assert!(matches!(
        destination_command(&["delete", "42"]),
        DestinationCommands::Delete { yes: false, .. }
    ));
    assert!(matches!(
        destination_command(&["delete", "42", "--yes"]),
        DestinationCommands::Delete { yes: true, .. }
    ));
    assert!(matches!(
        destination_command(&["stats", "42"]),
        DestinationCommands::Stats { id } if id == "42"
    ));
}

#[test]
fn create_requires_every_field() {
    let fields = DestinationFields {
        name: Some("Banff".to_string()),
        ..DestinationFields::default()
    };
    let error = draft_from_fields(fields).unwrap_err();
    assert_eq!(error.to_string(), "Invalid input: --description is required");
}

#[test]
fn edit_sends_only_given_fields() {
    let patch = patch_from_fields(DestinationFields {
        timings: Some("9am-5pm".to_string()),
        ..DestinationFields::default()
    });
    assert_eq!(patch.timings.as_deref(), Some("9am-5pm"));
    assert_eq!(patch.name, None);
    assert!(patch_from_fields(DestinationFields::default()).is_empty());
}
