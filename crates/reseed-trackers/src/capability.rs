// SPDX-License-Identifier: GPL-3.0-or-later

use async_trait::async_trait;
use reseed_domain::{DiscType, ImdbId, ReleaseMetadata};

use crate::error::{Result, TrackerError};
use crate::models::{CredentialCheck, DuplicateSearch, NameNegotiation};

/// Uniform contract every tracker integration implements.
///
/// Implementations own their retry behaviour; callers treat each result as final.
#[async_trait]
pub trait TrackerCapability: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the tracker needs an authenticated session before it can be searched.
    fn requires_credentials(&self) -> bool {
        false
    }

    /// Whether the tracker refuses releases without an IMDb id.
    fn requires_imdb(&self) -> bool {
        false
    }

    /// Whether duplicates are looked up by a tracker-side group resolved from the IMDb id.
    fn keyed_by_group(&self) -> bool {
        false
    }

    fn supports_anonymous(&self) -> bool {
        true
    }

    /// Whether the tracker refuses torrents with oversized pieces.
    fn enforces_piece_size_limit(&self) -> bool {
        false
    }

    fn banned_groups(&self) -> &[String] {
        &[]
    }

    async fn validate_credentials(&self, meta: &ReleaseMetadata) -> Result<CredentialCheck>;

    async fn check_banned_group(&self, meta: &ReleaseMetadata) -> Result<bool> {
        Ok(is_banned_group(self.name(), self.banned_groups(), meta))
    }

    /// Whether someone already holds an exclusive claim on this release at the tracker.
    async fn torrent_claims(&self, _meta: &ReleaseMetadata) -> Result<bool> {
        Ok(false)
    }

    async fn search_duplicates(
        &self,
        meta: &ReleaseMetadata,
        disc_type: Option<DiscType>,
    ) -> Result<DuplicateSearch>;

    async fn negotiate_name(&self, _meta: &ReleaseMetadata) -> Result<NameNegotiation> {
        Ok(NameNegotiation::NoRename)
    }

    async fn group_by_external_id(&self, _imdb: Option<ImdbId>) -> Result<Option<String>> {
        Err(TrackerError::Unsupported(format!(
            "{} does not group releases",
            self.name()
        )))
    }
}

/// Case-insensitive match of the release group against a tracker's ban list.
pub fn is_banned_group(tracker: &str, banned_groups: &[String], meta: &ReleaseMetadata) -> bool {
    let Some(group) = meta.release_group.as_deref() else {
        return false;
    };
    let group = group.trim().trim_start_matches('-');
    if group.is_empty() {
        return false;
    }

    let banned = banned_groups
        .iter()
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(group));
    if banned {
        tracing::info!(target: "trackers", tracker, group, "release group is banned");
    }
    banned
}

#[cfg(test)]
mod tests {
    use super::is_banned_group;
    use reseed_domain::ReleaseMetadata;

    #[test]
    fn banned_group_matches_case_insensitively() {
        let mut meta = ReleaseMetadata::new("Movie 2020 1080p BluRay x264-BadGrp");
        meta.release_group = Some("-BadGrp".to_string());
        let banned = vec!["EVO".to_string(), "badgrp".to_string()];

        assert!(is_banned_group("AAA", &banned, &meta));
        assert!(!is_banned_group("AAA", &["EVO".to_string()], &meta));
    }

    #[test]
    fn missing_group_is_never_banned() {
        let meta = ReleaseMetadata::new("Movie 2020");
        assert!(!is_banned_group("AAA", &["".to_string()], &meta));
    }
}
