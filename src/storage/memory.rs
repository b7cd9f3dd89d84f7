use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Result};
use parking_lot::Mutex;

use super::LinkRepository;
use crate::identity::UserId;
use crate::links::{validate_records, LinkRecord, StoredLink};

/// Process-local repository. Applies the same validation and full-replace
/// contract as the SQLite handle.
#[derive(Default)]
pub struct InMemoryLinks {
    lists: Mutex<HashMap<UserId, Vec<StoredLink>>>,
    saves: AtomicUsize,
    reject_next: Mutex<Option<String>>,
}

impl InMemoryLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_links_for_user` calls received, including rejected ones.
    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes the next save fail with `message`, as an unreachable backend would.
    pub fn fail_next_save(&self, message: impl Into<String>) {
        *self.reject_next.lock() = Some(message.into());
    }

    pub fn seed(&self, user_id: &UserId, links: Vec<StoredLink>) {
        self.lists.lock().insert(user_id.clone(), links);
    }
}

impl LinkRepository for InMemoryLinks {
    fn set_links_for_user(&self, user_id: &UserId, links: &[LinkRecord]) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.reject_next.lock().take() {
            bail!(message);
        }
        validate_records(links)?;
        let stored = links.iter().map(StoredLink::from).collect();
        self.lists.lock().insert(user_id.clone(), stored);
        Ok(())
    }

    fn get_links_for_user(&self, user_id: &UserId) -> Result<Vec<StoredLink>> {
        Ok(self.lists.lock().get(user_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::Platform;

    #[test]
    fn replaces_list_wholesale() -> anyhow::Result<()> {
        let repo = InMemoryLinks::new();
        let user = UserId::new("u1");
        let first = vec![
            LinkRecord {
                platform: Platform::Github,
                link: "a".into(),
            },
            LinkRecord {
                platform: Platform::Gitlab,
                link: "b".into(),
            },
        ];
        repo.set_links_for_user(&user, &first)?;
        repo.set_links_for_user(&user, &first[1..])?;
        let stored = repo.get_links_for_user(&user)?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].platform, "gitlab");
        assert_eq!(repo.save_calls(), 2);
        Ok(())
    }

    #[test]
    fn injected_failure_applies_once() -> anyhow::Result<()> {
        let repo = InMemoryLinks::new();
        let user = UserId::new("u1");
        let links = [LinkRecord {
            platform: Platform::Github,
            link: "a".into(),
        }];
        repo.fail_next_save("backend unreachable");
        assert!(repo.set_links_for_user(&user, &links).is_err());
        assert!(repo.get_links_for_user(&user)?.is_empty());
        repo.set_links_for_user(&user, &links)?;
        assert_eq!(repo.get_links_for_user(&user)?.len(), 1);
        Ok(())
    }
}
