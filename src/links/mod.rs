use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod catalog;
pub mod store;

pub use catalog::{CatalogError, Platform, PlatformInfo};
pub use store::{LinkStore, StoreChange, StoreError, StoreNotice};

/// Client-side identity of a row. Generated at creation, never derived from
/// position and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(Uuid);

impl LinkId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub id: LinkId,
    pub platform: Platform,
    pub link: Option<String>,
}

impl LinkEntry {
    pub fn new() -> Self {
        Self {
            id: LinkId::generate(),
            platform: Platform::default(),
            link: None,
        }
    }

    pub fn from_record(record: LinkRecord) -> Self {
        Self {
            id: LinkId::generate(),
            platform: record.platform,
            link: Some(record.link),
        }
    }

    /// A link is filled once it holds any text at all.
    pub fn has_link(&self) -> bool {
        self.link.as_deref().is_some_and(|link| !link.is_empty())
    }

    pub fn to_record(&self) -> LinkRecord {
        LinkRecord {
            platform: self.platform,
            link: self.link.clone().unwrap_or_default(),
        }
    }
}

impl Default for LinkEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire shape of one saved link. Position in the enclosing array is the only
/// source of display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub platform: Platform,
    pub link: String,
}

/// A link as read back from persistence, before the platform identifier has
/// been checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLink {
    pub platform: String,
    pub link: String,
}

impl StoredLink {
    pub fn resolve(&self) -> Result<LinkRecord, CatalogError> {
        let info = catalog::lookup(&self.platform)?;
        Ok(LinkRecord {
            platform: info.platform,
            link: self.link.clone(),
        })
    }
}

impl From<&LinkRecord> for StoredLink {
    fn from(record: &LinkRecord) -> Self {
        Self {
            platform: record.platform.id().to_string(),
            link: record.link.clone(),
        }
    }
}

pub fn resolve_all(stored: &[StoredLink]) -> Result<Vec<LinkRecord>, CatalogError> {
    stored.iter().map(StoredLink::resolve).collect()
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid links payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("link #{position}: {source}")]
    Platform {
        position: usize,
        #[source]
        source: CatalogError,
    },
    #[error("link #{position}: can't be empty")]
    EmptyLink { position: usize },
}

/// Structural check applied on receipt of a save. Positions are 1-based to
/// match the editor's "Link #n" labels.
pub fn validate_records(records: &[LinkRecord]) -> Result<(), PayloadError> {
    for (idx, record) in records.iter().enumerate() {
        if record.link.is_empty() {
            return Err(PayloadError::EmptyLink { position: idx + 1 });
        }
    }
    Ok(())
}

/// Parses and validates a raw JSON array of `{platform, link}` objects.
pub fn parse_payload(raw: &str) -> Result<Vec<LinkRecord>, PayloadError> {
    let stored: Vec<StoredLink> = serde_json::from_str(raw)?;
    let records = stored
        .iter()
        .enumerate()
        .map(|(idx, link)| {
            link.resolve().map_err(|source| PayloadError::Platform {
                position: idx + 1,
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    validate_records(&records)?;
    Ok(records)
}
