//! The tracker's dual ledger: whole-file ownership and per-block possession.
//!
//! Both tables are guarded by their own mutex; [`TrackerState::lookup`]
//! takes both locks to compose a consistent snapshot, per spec §5 ("cross-peer
//! reads must be performed under a single critical section").

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct TrackerState {
    file_ownership: Mutex<HashMap<String, HashSet<String>>>,
    block_ledger: Mutex<HashMap<(String, String), HashSet<u64>>>,
}

/// Result of a `GET` directory query, before the handler decides which wire
/// replies to send.
#[derive(Debug, PartialEq)]
pub struct Lookup {
    pub already_owned: bool,
    pub owners: Vec<String>,
    pub holders: Vec<(String, u64)>,
}

impl TrackerState {
    pub fn new() -> Self {
        TrackerState::default()
    }

    /// REGISTER: replaces the peer's full ownership set.
    pub fn register(&self, peer: &str, files: Vec<String>) {
        let files: HashSet<String> = files.into_iter().filter(|f| !f.is_empty()).collect();
        self.file_ownership.lock().unwrap().insert(peer.to_string(), files);
    }

    /// GET: computes the owners of `filename` and the peers holding partial
    /// blocks of it, plus whether `peer` already owns it.
    pub fn lookup(&self, peer: &str, filename: &str) -> Lookup {
        let ownership = self.file_ownership.lock().unwrap();
        let ledger = self.block_ledger.lock().unwrap();

        let already_owned = ownership.get(peer).is_some_and(|files| files.contains(filename));

        let mut owners: Vec<String> = ownership
            .iter()
            .filter(|(_, files)| files.contains(filename))
            .map(|(name, _)| name.clone())
            .collect();
        owners.sort();

        let mut holders: Vec<(String, u64)> = ledger
            .iter()
            .filter(|((_, f), blocks)| f == filename && !blocks.is_empty())
            .flat_map(|((name, _), blocks)| blocks.iter().map(move |idx| (name.clone(), *idx)))
            .collect();
        holders.sort();

        Lookup {
            already_owned,
            owners,
            holders,
        }
    }

    /// GOT_BLOCK: records that `peer` now holds `index` of `filename`.
    pub fn got_block(&self, peer: &str, filename: &str, index: u64) {
        self.block_ledger
            .lock()
            .unwrap()
            .entry((peer.to_string(), filename.to_string()))
            .or_default()
            .insert(index);
    }

    /// DONE: partial progress for (peer, filename) is subsumed by ownership.
    pub fn done(&self, peer: &str, filename: &str) {
        self.block_ledger.lock().unwrap().remove(&(peer.to_string(), filename.to_string()));
        self.file_ownership
            .lock()
            .unwrap()
            .entry(peer.to_string())
            .or_default()
            .insert(filename.to_string());
    }

    /// EXIT (or stream drop): removes every table entry keyed on `peer`.
    pub fn exit(&self, peer: &str) {
        self.file_ownership.lock().unwrap().remove(peer);
        self.block_ledger.lock().unwrap().retain(|(name, _), _| name != peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_replaces_rather_than_merges() {
        let state = TrackerState::new();
        state.register("A", vec!["a.txt".into()]);
        state.register("A", vec!["b.txt".into()]);
        let lookup = state.lookup("B", "a.txt");
        assert!(lookup.owners.is_empty());
        let lookup = state.lookup("B", "b.txt");
        assert_eq!(lookup.owners, vec!["A".to_string()]);
    }

    #[test]
    fn already_owned_is_reported_to_the_owner_only() {
        let state = TrackerState::new();
        state.register("A", vec!["a.txt".into()]);
        assert!(state.lookup("A", "a.txt").already_owned);
        assert!(!state.lookup("B", "a.txt").already_owned);
    }

    #[test]
    fn file_not_found_when_nobody_owns_it() {
        let state = TrackerState::new();
        let lookup = state.lookup("B", "missing.txt");
        assert!(lookup.owners.is_empty());
        assert!(!lookup.already_owned);
    }

    #[test]
    fn got_block_populates_holders_flattened_per_index() {
        let state = TrackerState::new();
        state.got_block("A", "f", 1);
        state.got_block("A", "f", 3);
        let mut holders = state.lookup("B", "f").holders;
        holders.sort();
        assert_eq!(holders, vec![("A".to_string(), 1), ("A".to_string(), 3)]);
    }

    #[test]
    fn done_moves_peer_from_ledger_to_ownership() {
        let state = TrackerState::new();
        state.got_block("A", "f", 1);
        state.got_block("A", "f", 2);
        state.done("A", "f");

        let lookup = state.lookup("B", "f");
        assert!(lookup.holders.is_empty());
        assert_eq!(lookup.owners, vec!["A".to_string()]);
        assert!(state.lookup("A", "f").already_owned);
    }

    #[test]
    fn exit_clears_every_table_entry_for_the_peer() {
        let state = TrackerState::new();
        state.register("A", vec!["a.txt".into()]);
        state.got_block("A", "b.txt", 1);
        state.exit("A");

        assert!(state.lookup("B", "a.txt").owners.is_empty());
        assert!(state.lookup("B", "b.txt").holders.is_empty());
    }

    #[test]
    fn empty_register_list_is_tolerated() {
        let state = TrackerState::new();
        state.register("A", vec![]);
        assert!(state.lookup("B", "anything").owners.is_empty());
    }
}
