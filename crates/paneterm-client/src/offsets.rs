//! Session offset table.
//!
//! Maps a session id to the number of bytes of its durable output log already
//! delivered to a display. After a reconnect the pane asks the server to
//! replay from that offset. Offsets only move forward.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Process-wide replay offsets, shared by every pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionOffsetTable {
    offsets: BTreeMap<String, u64>,
}

impl SessionOffsetTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored offset for `session`, if any.
    #[must_use]
    pub fn get(&self, session: &str) -> Option<u64> {
        self.offsets.get(session).copied()
    }

    /// Create an entry at 0 if the session has none.
    pub fn ensure(&mut self, session: &str) {
        if !self.offsets.contains_key(session) {
            self.offsets.insert(session.to_string(), 0);
        }
    }

    /// Raise the stored offset to `offset`; lower values are ignored.
    ///
    /// Returns the offset now stored.
    pub fn observe(&mut self, session: &str, offset: u64) -> u64 {
        let entry = self.offsets.entry(session.to_string()).or_insert(0);
        *entry = (*entry).max(offset);
        *entry
    }

    /// Forget a session known to be gone.
    pub fn remove(&mut self, session: &str) -> Option<u64> {
        self.offsets.remove(session)
    }

    /// Drop every session not in `live`. Returns how many were removed.
    pub fn prune<S: AsRef<str>>(&mut self, live: &[S]) -> usize {
        let live: HashSet<&str> = live.iter().map(AsRef::as_ref).collect();
        let before = self.offsets.len();
        self.offsets.retain(|session, _| live.contains(session.as_str()));
        before - self.offsets.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.offsets.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Serialize for host persistence.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Restore a persisted table.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_is_monotonic() {
        let mut table = SessionOffsetTable::new();
        assert_eq!(table.observe("a", 10), 10);
        assert_eq!(table.observe("a", 4), 10);
        assert_eq!(table.observe("a", 12), 12);
        assert_eq!(table.get("a"), Some(12));
    }

    #[test]
    fn ensure_does_not_reset() {
        let mut table = SessionOffsetTable::new();
        table.ensure("a");
        assert_eq!(table.get("a"), Some(0));
        table.observe("a", 7);
        table.ensure("a");
        assert_eq!(table.get("a"), Some(7));
    }

    #[test]
    fn prune_keeps_live_sessions() {
        let mut table = SessionOffsetTable::new();
        table.observe("a", 1);
        table.observe("b", 2);
        table.observe("c", 3);
        assert_eq!(table.prune(&["b", "zzz"]), 2);
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![("b", 2)]);
    }

    #[test]
    fn json_roundtrip() {
        let mut table = SessionOffsetTable::new();
        table.observe("build", 4096);
        let json = table.to_json();
        assert_eq!(json, r#"{"build":4096}"#);
        assert_eq!(SessionOffsetTable::from_json(&json).unwrap(), table);
    }
}
