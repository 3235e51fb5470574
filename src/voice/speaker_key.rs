//! Speaker keys
//!
//! The TTS model family and the converter's precomputed embedding store name the
//! same base speakers differently (`EN_US` vs `en-us`). Keys coming out of a TTS
//! speaker table must go through [`normalize`] before they are used to build an
//! embedding file path.

use std::fmt;

/// Separator used by the embedding store file names
pub const CANONICAL_SEPARATOR: char = '-';

/// Canonicalize a raw speaker key: lower-case, `_` and whitespace become `-`.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c == '_' || c.is_whitespace() {
                CANONICAL_SEPARATOR
            } else {
                c
            }
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Speaker key as emitted by a TTS model's speaker table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpeakerKey(String);

impl SpeakerKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key in the embedding store's naming convention
    pub fn normalized(&self) -> String {
        normalize(&self.0)
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpeakerKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Model-specific numeric speaker id
pub type SpeakerId = i64;

/// Ordered speaker name -> id mapping owned by a TTS model.
///
/// Order is whatever the model supplied; the first entry is the default speaker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerTable {
    entries: Vec<(SpeakerKey, SpeakerId)>,
}

impl SpeakerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a speaker. A repeated key keeps its original position and takes the new id.
    pub fn insert(&mut self, key: impl Into<SpeakerKey>, id: SpeakerId) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = id,
            None => self.entries.push((key, id)),
        }
    }

    /// Default speaker (first entry)
    pub fn first(&self) -> Option<(&SpeakerKey, SpeakerId)> {
        self.entries.first().map(|(k, id)| (k, *id))
    }

    pub fn get(&self, key: &str) -> Option<SpeakerId> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, id)| *id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SpeakerKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<SpeakerKey>> FromIterator<(K, SpeakerId)> for SpeakerTable {
    fn from_iter<I: IntoIterator<Item = (K, SpeakerId)>>(iter: I) -> Self {
        let mut table = SpeakerTable::new();
        for (key, id) in iter {
            table.insert(key, id);
        }
        table
    }
}
