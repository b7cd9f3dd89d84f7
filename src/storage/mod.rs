use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::config::DbConfig;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};
use crate::identity::UserId;
use crate::links::{validate_records, LinkRecord, StoredLink};
use crate::profile::ProfileDetails;

pub mod memory;
mod schema;

/// The persistence boundary for link lists. Saves are a full, order-preserving
/// replacement of the user's list; there is no partial update.
pub trait LinkRepository: Send + Sync {
    fn set_links_for_user(&self, user_id: &UserId, links: &[LinkRecord]) -> Result<()>;

    /// Returns an empty list when nothing has been saved yet.
    fn get_links_for_user(&self, user_id: &UserId) -> Result<Vec<StoredLink>>;
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ensure_user(&self, email: &str) -> Result<UserId> {
        let email = email.trim().to_lowercase();
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                    params![UserId::generate().as_str(), email, now],
                )
                .context("inserting user")?;
            if inserted > 0 {
                tracing::info!(%email, "created local user");
            }
            let id: String = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )
                .context("looking up user id")?;
            Ok(UserId::new(id))
        })
    }

    pub fn get_profile(&self, user_id: &UserId) -> Result<Option<ProfileDetails>> {
        self.with_connection(|conn| {
            let profile = conn
                .query_row(
                    "SELECT first_name, last_name, email, picture_url
                     FROM profiles
                     WHERE user_id = ?1",
                    params![user_id.as_str()],
                    |row| {
                        Ok(ProfileDetails {
                            first_name: row.get(0)?,
                            last_name: row.get(1)?,
                            email: row.get(2)?,
                            picture_url: row.get(3)?,
                        })
                    },
                )
                .optional()
                .context("fetching profile details")?;
            Ok(profile)
        })
    }

    /// Upserts profile details. An absent picture keeps whatever was stored.
    pub fn set_profile(&self, user_id: &UserId, details: &ProfileDetails) -> Result<()> {
        let details = details.validated().context("validating profile details")?;
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO profiles (user_id, first_name, last_name, email, picture_url, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id) DO UPDATE SET
                     first_name = excluded.first_name,
                     last_name = excluded.last_name,
                     email = excluded.email,
                     picture_url = COALESCE(excluded.picture_url, profiles.picture_url),
                     updated_at = excluded.updated_at",
                params![
                    user_id.as_str(),
                    details.first_name,
                    details.last_name,
                    details.email,
                    details.picture_url,
                    now
                ],
            )
            .context("upserting profile details")?;
            Ok(())
        })
    }
}

impl LinkRepository for StorageHandle {
    fn set_links_for_user(&self, user_id: &UserId, links: &[LinkRecord]) -> Result<()> {
        validate_records(links).context("rejecting links payload")?;
        let json = serde_json::to_string(links).context("serialising links")?;
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO links (id, user_id, list_of_links, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     list_of_links = excluded.list_of_links,
                     updated_at = excluded.updated_at",
                params![UserId::generate().as_str(), user_id.as_str(), json, now],
            )
            .context("upserting links")?;
            Ok(())
        })?;
        tracing::info!(user = %user_id, count = links.len(), "links saved");
        Ok(())
    }

    fn get_links_for_user(&self, user_id: &UserId) -> Result<Vec<StoredLink>> {
        let raw: Option<String> = self.with_connection(|conn| {
            conn.query_row(
                "SELECT list_of_links FROM links WHERE user_id = ?1",
                params![user_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("fetching links")
        })?;
        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing stored links for user {user_id}")),
            None => Ok(Vec::new()),
        }
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
        .context("enabling foreign keys")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::links::Platform;
    use tempfile::TempDir;

    pub(crate) fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        let state_dir = base.join("state");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            database_path: data_dir.join("devlinks.db"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub(crate) fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let storage = init(&paths, &StorageOptions::default())?;
        Ok((temp, storage))
    }

    fn record(platform: Platform, link: &str) -> LinkRecord {
        LinkRecord {
            platform,
            link: link.into(),
        }
    }

    #[test]
    fn links_default_to_empty_list() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let user = storage.ensure_user("dev@example.com")?;
        assert!(storage.get_links_for_user(&user)?.is_empty());
        Ok(())
    }

    #[test]
    fn save_replaces_whole_list_and_preserves_order() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let user = storage.ensure_user("dev@example.com")?;
        storage.set_links_for_user(
            &user,
            &[
                record(Platform::Github, "https://github.com/a"),
                record(Platform::Youtube, "https://youtube.com/@a"),
                record(Platform::Gitlab, "https://gitlab.com/a"),
            ],
        )?;
        storage.set_links_for_user(
            &user,
            &[
                record(Platform::Gitlab, "https://gitlab.com/a"),
                record(Platform::Github, "https://github.com/a"),
            ],
        )?;

        let stored = storage.get_links_for_user(&user)?;
        assert_eq!(
            stored,
            vec![
                StoredLink {
                    platform: "gitlab".into(),
                    link: "https://gitlab.com/a".into()
                },
                StoredLink {
                    platform: "github".into(),
                    link: "https://github.com/a".into()
                },
            ]
        );
        let rows: i64 = storage.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?)
        })?;
        assert_eq!(rows, 1);
        Ok(())
    }

    #[test]
    fn save_rejects_empty_links_and_keeps_previous_list() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let user = storage.ensure_user("dev@example.com")?;
        storage.set_links_for_user(&user, &[record(Platform::Twitch, "https://twitch.tv/a")])?;

        let result = storage.set_links_for_user(
            &user,
            &[
                record(Platform::Github, "https://github.com/a"),
                record(Platform::Twitter, ""),
            ],
        );
        assert!(result.is_err());
        assert_eq!(storage.get_links_for_user(&user)?.len(), 1);
        Ok(())
    }

    #[test]
    fn lists_are_isolated_per_user() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let alice = storage.ensure_user("alice@example.com")?;
        let bob = storage.ensure_user("bob@example.com")?;
        storage.set_links_for_user(&alice, &[record(Platform::Devto, "https://dev.to/a")])?;
        assert!(storage.get_links_for_user(&bob)?.is_empty());
        assert_eq!(storage.get_links_for_user(&alice)?.len(), 1);
        Ok(())
    }

    #[test]
    fn ensure_user_normalises_email() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let first = storage.ensure_user("Dev@Example.com")?;
        let second = storage.ensure_user(" dev@example.com ")?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn profile_upsert_keeps_picture_when_not_supplied() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let user = storage.ensure_user("dev@example.com")?;
        assert!(storage.get_profile(&user)?.is_none());

        let mut details = ProfileDetails {
            first_name: "Ben".into(),
            last_name: "Wright".into(),
            email: "ben@example.com".into(),
            picture_url: Some("https://cdn.example.com/ben.png".into()),
        };
        storage.set_profile(&user, &details)?;

        details.first_name = "Benjamin".into();
        details.picture_url = None;
        storage.set_profile(&user, &details)?;

        let stored = storage.get_profile(&user)?.expect("profile present");
        assert_eq!(stored.first_name, "Benjamin");
        assert_eq!(
            stored.picture_url.as_deref(),
            Some("https://cdn.example.com/ben.png")
        );
        Ok(())
    }

    #[test]
    fn invalid_profile_is_not_written() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let user = storage.ensure_user("dev@example.com")?;
        let details = ProfileDetails {
            first_name: "".into(),
            last_name: "Wright".into(),
            email: "ben@example.com".into(),
            picture_url: None,
        };
        assert!(storage.set_profile(&user, &details).is_err());
        assert!(storage.get_profile(&user)?.is_none());
        Ok(())
    }
}
