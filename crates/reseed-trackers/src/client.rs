// SPDX-License-Identifier: GPL-3.0-or-later

use crate::capability::TrackerCapability;
use crate::error::{Result, TrackerError};
use crate::models::{CredentialCheck, DuplicateSearch, TorrentListResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use reseed_config::TrackerConfig;
use reseed_domain::{DiscType, DuplicateCandidate, ReleaseMetadata};
use tracing::{debug, trace};
use url::Url;

const SEARCH_PAGE_SIZE: &str = "100";

/// Tracker running the UNIT3D codebase, searched through its JSON API.
#[derive(Debug, Clone)]
pub struct Unit3dTracker {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    settings: TrackerConfig,
}

impl Unit3dTracker {
    pub fn new(name: impl Into<String>, settings: &TrackerConfig, client: Client) -> Result<Self> {
        let name = name.into();
        let base_url = settings
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| TrackerError::MissingConfig(format!("{name}: base_url")))?;

        Ok(Self {
            name,
            client,
            base_url,
            api_key: settings.api_key.clone().filter(|key| !key.trim().is_empty()),
            settings: settings.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| TrackerError::InvalidBaseUrl(e.to_string()))
    }

    fn filter_url(&self, api_key: &str) -> Result<Url> {
        let mut url = self.endpoint("/api/torrents/filter")?;
        url.query_pairs_mut().append_pair("api_token", api_key);
        Ok(url)
    }

    fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| TrackerError::MissingConfig(format!("{}: api_key", self.name)))
    }
}

#[async_trait]
impl TrackerCapability for Unit3dTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_credentials(&self) -> bool {
        self.settings.requires_credentials
    }

    fn requires_imdb(&self) -> bool {
        self.settings.requires_imdb
    }

    fn supports_anonymous(&self) -> bool {
        self.settings.supports_anonymous
    }

    fn enforces_piece_size_limit(&self) -> bool {
        self.settings.enforce_piece_size_limit
    }

    fn banned_groups(&self) -> &[String] {
        &self.settings.banned_groups
    }

    async fn validate_credentials(&self, _meta: &ReleaseMetadata) -> Result<CredentialCheck> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!(target: "trackers", tracker = %self.name, "no api key configured");
            return Ok(CredentialCheck::Rejected);
        };

        let mut url = self.filter_url(api_key)?;
        url.query_pairs_mut().append_pair("perPage", "1");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(target: "trackers", tracker = %self.name, %status, "api key rejected");
            return Ok(CredentialCheck::Rejected);
        }
        if !status.is_success() {
            return Err(TrackerError::HttpStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(CredentialCheck::Accepted)
    }

    async fn search_duplicates(
        &self,
        meta: &ReleaseMetadata,
        disc_type: Option<DiscType>,
    ) -> Result<DuplicateSearch> {
        let api_key = self.require_api_key()?;
        let mut url = self.filter_url(api_key)?;
        {
            let mut query = url.query_pairs_mut();
            match (meta.ids.tmdb, meta.ids.imdb) {
                (Some(tmdb), _) => {
                    query.append_pair("tmdbId", &tmdb.to_string());
                }
                (None, Some(imdb)) => {
                    query.append_pair("imdbId", &imdb.0.to_string());
                }
                (None, None) => {
                    query.append_pair("name", &meta.name);
                }
            }
            query.append_pair("perPage", SEARCH_PAGE_SIZE);
        }

        trace!(
            target: "trackers",
            tracker = %self.name,
            disc_type = disc_type.map(|d| d.as_str()).unwrap_or("none"),
            "searching for existing torrents"
        );

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TrackerError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TorrentListResponse = serde_json::from_str(&body)
            .map_err(|e| TrackerError::InvalidResponse(e.to_string()))?;

        let candidates: Vec<DuplicateCandidate> =
            parsed.data.into_iter().map(DuplicateCandidate::from).collect();
        debug!(
            target: "trackers",
            tracker = %self.name,
            count = candidates.len(),
            "duplicate search finished"
        );

        Ok(candidates.into())
    }
}
