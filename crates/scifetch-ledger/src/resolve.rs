//! Status map and the per-record status lookup

use std::collections::BTreeMap;

use crate::key::ArtifactKey;
use crate::record::{KeyMode, Record, Status};

/// Control key → status, rebuilt at the start of every run.
///
/// Updates are monotonic: once a key is terminal it keeps its status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMap {
    entries: BTreeMap<String, Status>,
}

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Status> {
        self.entries.get(key).copied()
    }

    /// Record `status` for `key` unless the key is already terminal.
    ///
    /// Returns `true` if the stored status changed.
    pub fn record(&mut self, key: &str, status: Status) -> bool {
        match self.entries.get(key) {
            Some(current) if current.is_terminal() || *current == status => false,
            _ => {
                self.entries.insert(key.to_string(), status);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Status)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), *s))
    }

    /// Number of entries with the given status.
    pub fn count(&self, status: Status) -> usize {
        self.entries.values().filter(|s| **s == status).count()
    }
}

impl FromIterator<(String, Status)> for StatusMap {
    fn from_iter<I: IntoIterator<Item = (String, Status)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, status) in iter {
            map.record(&key, status);
        }
        map
    }
}

/// Current status of a record; `None` means never attempted and nothing
/// found, i.e. attempt now.
pub fn resolve(record: &Record, mode: KeyMode, statuses: &StatusMap) -> Option<Status> {
    statuses.get(&ArtifactKey::for_record(record, mode).key)
}
