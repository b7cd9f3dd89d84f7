use std::fmt;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StorageHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the user every request in this process acts on behalf of.
pub trait IdentityProvider {
    fn current_user(&self) -> Result<UserId>;
}

/// Resolves the configured email to a local user row, creating it on first use.
pub struct LocalIdentity {
    storage: StorageHandle,
    email: String,
}

impl LocalIdentity {
    pub fn new(storage: StorageHandle, email: impl Into<String>) -> Self {
        Self {
            storage,
            email: email.into(),
        }
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Result<UserId> {
        let email = self.email.trim();
        if email.is_empty() {
            bail!("no identity configured; set identity.email or pass --user");
        }
        self.storage
            .ensure_user(email)
            .with_context(|| format!("resolving local user for {email}"))
    }
}
