use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use crate::app::App;
use crate::identity::UserId;
use crate::links::{catalog, parse_payload, StoredLink};
use crate::preview;
use crate::profile::ProfileDetails;
use crate::storage::{LinkRepository, StorageHandle};

#[derive(Subcommand, Debug, Clone)]
pub enum LinksCommand {
    /// Print the saved links in display order
    List,
    /// Replace the saved list with a JSON array of {platform, link} objects
    Import(ImportArgs),
    /// Print the saved list as JSON
    Export,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// JSON file to read. If omitted, reads from stdin.
    #[arg()]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    /// Emit the page as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// Print the saved profile details
    Show(ProfileShowArgs),
    /// Create or update profile details
    Set(ProfileSetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProfileShowArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileSetArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    /// Keeps the stored picture when omitted
    #[arg(long)]
    pub picture_url: Option<String>,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn handle_links_command(
    storage: &StorageHandle,
    user: &UserId,
    command: LinksCommand,
) -> Result<()> {
    match command {
        LinksCommand::List => print!("{}", list_links(storage, user)?),
        LinksCommand::Import(args) => {
            let raw = read_payload(args.file.as_deref())?;
            let count = import_links(storage, user, &raw)?;
            println!("Imported {count} link(s)");
        }
        LinksCommand::Export => println!("{}", export_links(storage, user)?),
    }
    Ok(())
}

pub fn show_preview(storage: &StorageHandle, user: &UserId, args: PreviewArgs) -> Result<()> {
    let profile = storage.get_profile(user).context("loading profile")?;
    let links = storage
        .get_links_for_user(user)
        .context("loading saved links")?;
    if args.json {
        let page = preview::build(profile.as_ref(), &links)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&page).context("serializing preview")?
        );
    } else {
        println!("{}", preview::render(profile.as_ref(), &links)?);
    }
    Ok(())
}

pub fn handle_profile_command(
    storage: &StorageHandle,
    user: &UserId,
    command: ProfileCommand,
) -> Result<()> {
    match command {
        ProfileCommand::Show(args) => {
            let Some(profile) = storage.get_profile(user).context("loading profile")? else {
                println!("No profile details saved; set them with `devlinks profile set`.");
                return Ok(());
            };
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&profile).context("serializing profile")?
                );
            } else {
                print!("{}", format_profile(&profile));
            }
        }
        ProfileCommand::Set(args) => {
            let details = ProfileDetails {
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                picture_url: args.picture_url,
            };
            storage
                .set_profile(user, &details)
                .context("saving profile details")?;
            println!("Saved profile for {}", details.display_name());
        }
    }
    Ok(())
}

fn list_links(repo: &dyn LinkRepository, user: &UserId) -> Result<String> {
    let stored = repo
        .get_links_for_user(user)
        .context("loading saved links")?;
    Ok(format_links(&stored))
}

fn format_links(stored: &[StoredLink]) -> String {
    if stored.is_empty() {
        return "No links saved.\n".to_string();
    }
    let mut out = String::new();
    for (idx, link) in stored.iter().enumerate() {
        let label = match catalog::lookup(&link.platform) {
            Ok(info) => info.label.to_string(),
            Err(_) => format!("{} (retired)", link.platform),
        };
        let _ = writeln!(&mut out, "#{}  {:<15} {}", idx + 1, label, link.link);
    }
    out
}

fn import_links(repo: &dyn LinkRepository, user: &UserId, raw: &str) -> Result<usize> {
    let records = parse_payload(raw).context("validating link payload")?;
    repo.set_links_for_user(user, &records)
        .context("saving imported links")?;
    tracing::info!(user = %user, count = records.len(), "links imported");
    Ok(records.len())
}

fn export_links(repo: &dyn LinkRepository, user: &UserId) -> Result<String> {
    let stored = repo
        .get_links_for_user(user)
        .context("loading saved links")?;
    serde_json::to_string_pretty(&stored).context("serializing links")
}

fn format_profile(profile: &ProfileDetails) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "Name     {}", profile.display_name());
    let _ = writeln!(&mut out, "Email    {}", profile.email);
    if let Some(picture) = &profile.picture_url {
        let _ = writeln!(&mut out, "Picture  {picture}");
    }
    out
}

fn read_payload(file: Option<&Path>) -> Result<String> {
    if let Some(path) = file {
        return fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    match read_stdin()? {
        Some(raw) => Ok(raw),
        None => bail!("no links to import: pass a FILE or pipe JSON on stdin"),
    }
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}
