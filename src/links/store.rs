use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use super::{LinkEntry, LinkId, LinkRecord, Platform};

/// Stale or invalid positions are caller bugs; they are reported, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{operation}: index {index} out of range for {len} link(s)")]
    OutOfRange {
        operation: &'static str,
        index: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Added { id: LinkId, index: usize },
    PlatformChanged { index: usize, platform: Platform },
    LinkChanged { index: usize },
    Removed { id: LinkId, index: usize },
    Reordered { from: usize, to: usize },
    Replaced { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNotice {
    pub revision: u64,
    pub change: StoreChange,
}

/// Ordered link collection owned by one editing session.
///
/// Every mutation publishes a fresh `Arc<[LinkEntry]>`; snapshots handed out
/// earlier keep their contents, so observers can compare by pointer.
#[derive(Debug)]
pub struct LinkStore {
    entries: Arc<[LinkEntry]>,
    revision: u64,
    subscribers: Vec<Sender<StoreNotice>>,
}

impl Default for LinkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
            revision: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = LinkRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(LinkEntry::from_record)
            .collect::<Vec<_>>();
        Self {
            entries: entries.into(),
            revision: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[LinkEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Arc<[LinkEntry]> {
        Arc::clone(&self.entries)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LinkEntry> {
        self.entries.get(index)
    }

    pub fn position_of(&self, id: LinkId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    pub fn ids(&self) -> Vec<LinkId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn records(&self) -> Vec<LinkRecord> {
        self.entries.iter().map(LinkEntry::to_record).collect()
    }

    pub fn subscribe(&mut self) -> Receiver<StoreNotice> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn add_entry(&mut self) -> LinkId {
        let entry = LinkEntry::new();
        let id = entry.id;
        let mut next = self.entries.to_vec();
        next.push(entry);
        let index = next.len() - 1;
        self.commit(next, StoreChange::Added { id, index });
        id
    }

    pub fn set_platform(&mut self, index: usize, platform: Platform) -> Result<(), StoreError> {
        self.check("set_platform", index)?;
        let mut next = self.entries.to_vec();
        next[index].platform = platform;
        self.commit(next, StoreChange::PlatformChanged { index, platform });
        Ok(())
    }

    pub fn set_link(&mut self, index: usize, link: impl Into<String>) -> Result<(), StoreError> {
        self.check("set_link", index)?;
        let mut next = self.entries.to_vec();
        next[index].link = Some(link.into());
        self.commit(next, StoreChange::LinkChanged { index });
        Ok(())
    }

    pub fn remove_entry(&mut self, index: usize) -> Result<LinkEntry, StoreError> {
        self.check("remove_entry", index)?;
        let mut next = self.entries.to_vec();
        let removed = next.remove(index);
        self.commit(
            next,
            StoreChange::Removed {
                id: removed.id,
                index,
            },
        );
        Ok(removed)
    }

    /// Moves the entry at `from` to `to`, shifting everything in between by
    /// one. Both positions refer to the sequence before the move.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        self.check("reorder", from)?;
        self.check("reorder", to)?;
        if from == to {
            return Ok(());
        }
        let mut next = self.entries.to_vec();
        if from < to {
            next[from..=to].rotate_left(1);
        } else {
            next[to..=from].rotate_right(1);
        }
        self.commit(next, StoreChange::Reordered { from, to });
        Ok(())
    }

    /// Replaces the whole collection, e.g. after reloading from persistence.
    /// Every entry gets a fresh id.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = LinkRecord>) {
        let next = records
            .into_iter()
            .map(LinkEntry::from_record)
            .collect::<Vec<_>>();
        let len = next.len();
        self.commit(next, StoreChange::Replaced { len });
    }

    fn check(&self, operation: &'static str, index: usize) -> Result<(), StoreError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(StoreError::OutOfRange {
                operation,
                index,
                len: self.entries.len(),
            })
        }
    }

    fn commit(&mut self, next: Vec<LinkEntry>, change: StoreChange) {
        self.entries = next.into();
        self.revision += 1;
        tracing::debug!(revision = self.revision, ?change, "link store mutated");
        let notice = StoreNotice {
            revision: self.revision,
            change,
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(notice.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    fn store_with(n: usize) -> (LinkStore, Vec<LinkId>) {
        let mut store = LinkStore::new();
        let ids = (0..n).map(|_| store.add_entry()).collect();
        (store, ids)
    }

    /// Small deterministic generator so the sequence tests stay reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: usize) -> usize {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 33) as usize) % bound.max(1)
        }
    }

    #[test]
    fn add_appends_with_defaults() {
        let (store, ids) = store_with(2);
        assert_eq!(store.ids(), ids);
        let last = store.get(1).expect("entry");
        assert_eq!(last.platform, Platform::Github);
        assert!(last.link.is_none());
    }

    #[test]
    fn set_platform_and_link_leave_identity_untouched() -> anyhow::Result<()> {
        let (mut store, ids) = store_with(2);
        store.set_platform(1, Platform::Twitch)?;
        store.set_link(1, "https://twitch.tv/x")?;
        let entry = store.get(1).expect("entry");
        assert_eq!(entry.id, ids[1]);
        assert_eq!(entry.platform, Platform::Twitch);
        assert_eq!(entry.link.as_deref(), Some("https://twitch.tv/x"));
        assert_eq!(store.get(0).expect("entry").platform, Platform::Github);
        Ok(())
    }

    #[test]
    fn reorder_moves_first_to_last() -> anyhow::Result<()> {
        let (mut store, ids) = store_with(3);
        store.reorder(0, 2)?;
        assert_eq!(store.ids(), vec![ids[1], ids[2], ids[0]]);
        Ok(())
    }

    #[test]
    fn reorder_moves_last_to_first() -> anyhow::Result<()> {
        let (mut store, ids) = store_with(4);
        store.reorder(3, 1)?;
        assert_eq!(store.ids(), vec![ids[0], ids[3], ids[1], ids[2]]);
        Ok(())
    }

    #[test]
    fn reorder_to_same_index_is_silent_noop() -> anyhow::Result<()> {
        let (mut store, ids) = store_with(3);
        let rx = store.subscribe();
        let revision = store.revision();
        store.reorder(1, 1)?;
        assert_eq!(store.ids(), ids);
        assert_eq!(store.revision(), revision);
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn reorder_round_trip_restores_order() -> anyhow::Result<()> {
        let (mut store, ids) = store_with(6);
        for (i, j) in [(0, 5), (4, 1), (2, 3), (5, 0)] {
            store.reorder(i, j)?;
            store.reorder(j, i)?;
            assert_eq!(store.ids(), ids, "reorder({i}, {j}) not undone");
        }
        Ok(())
    }

    #[test]
    fn remove_preserves_relative_order_of_survivors() -> anyhow::Result<()> {
        let (mut store, ids) = store_with(5);
        let removed = store.remove_entry(2)?;
        assert_eq!(removed.id, ids[2]);
        assert_eq!(store.ids(), vec![ids[0], ids[1], ids[3], ids[4]]);
        Ok(())
    }

    #[test]
    fn out_of_range_indices_fail_fast() {
        let (mut store, _) = store_with(2);
        assert_matches!(
            store.set_platform(2, Platform::Gitlab),
            Err(StoreError::OutOfRange { operation: "set_platform", index: 2, len: 2 })
        );
        assert_matches!(
            store.set_link(5, "x"),
            Err(StoreError::OutOfRange { operation: "set_link", .. })
        );
        assert_matches!(
            store.remove_entry(2),
            Err(StoreError::OutOfRange { operation: "remove_entry", .. })
        );
        assert_matches!(
            store.reorder(0, 2),
            Err(StoreError::OutOfRange { operation: "reorder", index: 2, .. })
        );
        assert_matches!(
            LinkStore::new().reorder(0, 0),
            Err(StoreError::OutOfRange { len: 0, .. })
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn snapshots_are_not_mutated_by_later_changes() -> anyhow::Result<()> {
        let (mut store, ids) = store_with(3);
        let before = store.snapshot();
        store.reorder(0, 2)?;
        store.set_link(0, "changed")?;
        assert_eq!(before.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
        assert!(before.iter().all(|e| e.link.is_none()));
        assert!(!Arc::ptr_eq(&before, &store.snapshot()));
        Ok(())
    }

    #[test]
    fn subscribers_receive_one_notice_per_mutation() -> anyhow::Result<()> {
        let mut store = LinkStore::new();
        let rx = store.subscribe();
        let id = store.add_entry();
        store.set_link(0, "https://x.dev")?;
        store.remove_entry(0)?;
        let notices = rx.try_iter().collect::<Vec<_>>();
        assert_eq!(
            notices,
            vec![
                StoreNotice {
                    revision: 1,
                    change: StoreChange::Added { id, index: 0 }
                },
                StoreNotice {
                    revision: 2,
                    change: StoreChange::LinkChanged { index: 0 }
                },
                StoreNotice {
                    revision: 3,
                    change: StoreChange::Removed { id, index: 0 }
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut store = LinkStore::new();
        let rx = store.subscribe();
        drop(rx);
        store.add_entry();
        assert!(store.subscribers.is_empty());
    }

    #[test]
    fn random_mutation_sequences_keep_ids_unique_and_accounted() -> anyhow::Result<()> {
        for seed in 1..=25u64 {
            let mut rng = Lcg(seed);
            let mut store = LinkStore::new();
            let mut added = HashSet::new();
            let mut removed = HashSet::new();
            for _ in 0..200 {
                let len = store.len();
                match rng.next(5) {
                    0 => {
                        added.insert(store.add_entry());
                    }
                    1 if len > 0 => {
                        let entry = store.remove_entry(rng.next(len))?;
                        removed.insert(entry.id);
                    }
                    2 if len > 0 => {
                        store.set_platform(rng.next(len), Platform::Codewars)?;
                    }
                    3 if len > 0 => {
                        store.set_link(rng.next(len), format!("https://x/{seed}"))?;
                    }
                    4 if len > 0 => {
                        store.reorder(rng.next(len), rng.next(len))?;
                    }
                    _ => {}
                }
            }
            let live = store.ids().into_iter().collect::<HashSet<_>>();
            assert_eq!(live.len(), store.len(), "duplicate ids for seed {seed}");
            let expected = added.difference(&removed).copied().collect::<HashSet<_>>();
            assert_eq!(live, expected, "id accounting broke for seed {seed}");
            assert_eq!(store.len(), added.len() - removed.len());
        }
        Ok(())
    }

    #[test]
    fn replace_all_assigns_fresh_ids() {
        let (mut store, ids) = store_with(1);
        store.replace_all(vec![LinkRecord {
            platform: Platform::Hashnode,
            link: "https://hashnode.com/@x".into(),
        }]);
        assert_eq!(store.len(), 1);
        assert_ne!(store.ids()[0], ids[0]);
        assert_eq!(store.get(0).expect("entry").platform, Platform::Hashnode);
    }
}
