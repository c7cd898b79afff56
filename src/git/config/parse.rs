use std::collections::{btree_map, BTreeMap};

use crate::git::repository::cache::CacheValue;

/// Parsed view of `git config -l -z`: dotted key to value.
///
/// Multi-valued keys keep the last assignment, matching what
/// `git config --get` reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMap {
    entries: BTreeMap<String, String>,
}

impl ConfigMap {
    /// Parse a NUL-separated dump whose records look like `key\nvalue`.
    ///
    /// Records without the newline separator are skipped. Keys and values are
    /// trimmed, and a record with an empty key is dropped.
    pub fn parse(dump: &[u8]) -> Self {
        let mut entries = BTreeMap::new();

        for record in dump.split(|b| *b == 0) {
            let record = String::from_utf8_lossy(record);
            let Some((key, value)) = record.split_once('\n') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.insert(key.to_string(), value.trim().to_string());
        }

        Self { entries }
    }

    /// Look up `key` the way git does: section and variable names are case
    /// insensitive, subsection names are not.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&canonical_key(key)).map(String::as_str)
    }

    /// Every entry whose key starts with `prefix`.
    ///
    /// The section part of `prefix` is matched case-insensitively, as is the
    /// part after its last dot when it has a subsection in between.
    pub fn find(&self, prefix: &str) -> BTreeMap<String, String> {
        let prefix = canonical_prefix(prefix);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(prefix.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a ConfigMap {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl CacheValue for ConfigMap {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

/// `key` as `git config -l` prints it: `Section.Sub.Name` becomes
/// `section.Sub.name`.
pub(crate) fn canonical_key(key: &str) -> String {
    match (key.find('.'), key.rfind('.')) {
        (Some(first), Some(last)) if first != last => format!(
            "{}{}{}",
            key[..first].to_ascii_lowercase(),
            &key[first..last],
            key[last..].to_ascii_lowercase()
        ),
        _ => key.to_ascii_lowercase(),
    }
}

/// Like [`canonical_key`] for a partial key. With a single dot the rest may
/// be the start of a subsection, so only the section is lowercased.
fn canonical_prefix(prefix: &str) -> String {
    match (prefix.find('.'), prefix.rfind('.')) {
        (Some(first), Some(last)) if first == last => format!(
            "{}{}",
            prefix[..first].to_ascii_lowercase(),
            &prefix[first..]
        ),
        _ => canonical_key(prefix),
    }
}

/// The section (or subsection) that owns `key`: everything before the last dot.
pub(crate) fn section_of(key: &str) -> Option<&str> {
    key.rsplit_once('.')
        .map(|(section, _)| section)
        .filter(|section| !section.is_empty())
}
