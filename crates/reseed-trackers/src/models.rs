// SPDX-License-Identifier: GPL-3.0-or-later

use reseed_domain::DuplicateCandidate;
use serde::Deserialize;

/// Result of a credential check against a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCheck {
    Rejected,
    Accepted,
    /// Accepted, and the tracker handed back a secret token for later requests.
    Token(String),
}

/// Outcome of asking a tracker how it would name the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameNegotiation {
    NoRename,
    RenamedTo(String),
}

impl NameNegotiation {
    /// Build from a raw name, treating blank values as no rename.
    pub fn from_name(name: Option<String>) -> Self {
        match name {
            Some(name) if !name.trim().is_empty() => Self::RenamedTo(name),
            _ => Self::NoRename,
        }
    }

    /// The tracker-side name, if it actually differs from `current`.
    pub fn changed_name(&self, current: &str) -> Option<&str> {
        match self {
            Self::RenamedTo(name) if name != current => Some(name.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateSearch {
    pub candidates: Vec<DuplicateCandidate>,
    /// Informational condition reported by the tracker; never blocks an upload.
    pub other: bool,
}

impl From<Vec<DuplicateCandidate>> for DuplicateSearch {
    fn from(candidates: Vec<DuplicateCandidate>) -> Self {
        Self {
            candidates,
            other: false,
        }
    }
}

// UNIT3D API wire models

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentListResponse {
    #[serde(default)]
    pub data: Vec<TorrentEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentEntry {
    pub attributes: TorrentAttributes,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentAttributes {
    pub name: String,
    #[serde(default)]
    pub details_link: Option<String>,
    #[serde(default)]
    pub files: Vec<TorrentFile>,
    #[serde(default)]
    pub num_file: Option<usize>,
    #[serde(default)]
    pub trumpable: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentFile {
    pub name: String,
}

impl From<TorrentEntry> for DuplicateCandidate {
    fn from(entry: TorrentEntry) -> Self {
        let attributes = entry.attributes;
        let files: Vec<String> = attributes.files.into_iter().map(|file| file.name).collect();
        let file_count = attributes
            .num_file
            .or_else(|| (!files.is_empty()).then_some(files.len()));

        DuplicateCandidate {
            name: attributes.name,
            link: attributes.details_link,
            trumpable: attributes.trumpable.unwrap_or(false),
            files,
            file_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_negotiated_name_means_no_rename() {
        assert_eq!(NameNegotiation::from_name(None), NameNegotiation::NoRename);
        assert_eq!(
            NameNegotiation::from_name(Some("  ".to_string())),
            NameNegotiation::NoRename
        );
        let renamed = NameNegotiation::from_name(Some("Other Name".to_string()));
        assert_eq!(renamed.changed_name("Release"), Some("Other Name"));
        assert_eq!(renamed.changed_name("Other Name"), None);
    }

    #[test]
    fn torrent_entry_maps_to_candidate() {
        let entry: TorrentEntry = serde_json::from_value(serde_json::json!({
            "attributes": {
                "name": "Movie 2020 1080p BluRay x264-GRP",
                "details_link": "https://aaa.example/torrents/1",
                "files": [{"name": "Movie.2020.mkv"}, {"name": "Movie.2020.nfo"}],
                "trumpable": true
            }
        }))
        .expect("entry should parse");

        let candidate = DuplicateCandidate::from(entry);
        assert_eq!(candidate.name, "Movie 2020 1080p BluRay x264-GRP");
        assert!(candidate.trumpable);
        assert_eq!(candidate.file_count, Some(2));
        assert_eq!(candidate.files[0], "Movie.2020.mkv");
    }
}
