// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use reseed_domain::ReleaseMetadata;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// A torrent as the client reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTorrent {
    pub hash: String,
    pub name: String,
    pub content_path: Option<String>,
    pub complete: bool,
}

impl ClientTorrent {
    /// Whether this finished torrent holds the release's payload.
    fn seeds(&self, meta: &ReleaseMetadata) -> bool {
        let content_name = self
            .content_path
            .as_deref()
            .and_then(|path| path.trim_end_matches(['/', '\\']).rsplit(['/', '\\']).next());
        self.complete
            && (self.name == meta.name
                || meta.primary_file() == Some(self.name.as_str())
                || content_name == Some(meta.name.as_str()))
    }
}

#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("torrent client request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("torrent client rejected the login")]
    Authentication,
    #[error("invalid torrent client url: {0}")]
    InvalidBaseUrl(String),
    #[error("torrent client responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("unexpected torrent list: {0}")]
    Deserialization(String),
}

/// A torrent client that may already be seeding the release.
#[async_trait]
pub trait ExistingTorrentSource: Send + Sync {
    /// Hash of a completed torrent matching the release, if the client has one.
    async fn find_existing_torrent(
        &self,
        meta: &ReleaseMetadata,
    ) -> Result<Option<String>, TorrentClientError>;

    /// Raw `.torrent` bytes for the given hash.
    async fn export_torrent(&self, hash: &str) -> Result<Vec<u8>, TorrentClientError>;
}

/// qBittorrent Web API (v2). The session cookie from `auth/login` is kept by the HTTP client.
pub struct QBittorrentClient {
    http: Client,
    api_root: String,
    login: Option<(String, String)>,
}

impl QBittorrentClient {
    pub fn new(base_url: String, username: Option<String>, password: Option<String>) -> Self {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            api_root: format!("{}/api/v2/", base_url.trim_end_matches('/')),
            login: username.zip(password),
        }
    }

    fn url(&self, method: &str) -> Result<Url, TorrentClientError> {
        Url::parse(&format!("{}{method}", self.api_root))
            .map_err(|e| TorrentClientError::InvalidBaseUrl(e.to_string()))
    }

    /// Send `request`; any non-2xx reply becomes `HttpStatus` with the body attached.
    async fn call(&self, request: RequestBuilder) -> Result<Response, TorrentClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(TorrentClientError::HttpStatus {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    async fn log_in(&self) -> Result<(), TorrentClientError> {
        let Some((username, password)) = &self.login else {
            return Ok(());
        };
        let request = self
            .http
            .post(self.url("auth/login")?)
            .form(&[("username", username.as_str()), ("password", password.as_str())]);
        // bad credentials still answer 200, with "Fails."
        let reply = self.call(request).await?.text().await?;
        if reply.trim() != "Ok." {
            return Err(TorrentClientError::Authentication);
        }
        Ok(())
    }

    pub async fn list_torrents(&self) -> Result<Vec<ClientTorrent>, TorrentClientError> {
        self.log_in().await?;
        let body = self
            .call(self.http.get(self.url("torrents/info")?))
            .await?
            .text()
            .await?;
        let listed: Vec<QBittorrentTorrent> = serde_json::from_str(&body)
            .map_err(|e| TorrentClientError::Deserialization(e.to_string()))?;
        Ok(listed.into_iter().map(ClientTorrent::from).collect())
    }
}

#[async_trait]
impl ExistingTorrentSource for QBittorrentClient {
    async fn find_existing_torrent(
        &self,
        meta: &ReleaseMetadata,
    ) -> Result<Option<String>, TorrentClientError> {
        let found = self
            .list_torrents()
            .await?
            .into_iter()
            .find(|torrent| torrent.seeds(meta));
        debug!(target: "torrent", found = found.is_some(), "qbittorrent lookup finished");
        Ok(found.map(|torrent| torrent.hash))
    }

    async fn export_torrent(&self, hash: &str) -> Result<Vec<u8>, TorrentClientError> {
        self.log_in().await?;
        let mut url = self.url("torrents/export")?;
        url.query_pairs_mut().append_pair("hash", hash);
        let bytes = self.call(self.http.get(url)).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct QBittorrentTorrent {
    hash: String,
    name: String,
    #[serde(default)]
    progress: f32,
    #[serde(default)]
    content_path: Option<String>,
}

impl From<QBittorrentTorrent> for ClientTorrent {
    fn from(torrent: QBittorrentTorrent) -> Self {
        Self {
            hash: torrent.hash,
            name: torrent.name,
            content_path: torrent.content_path.filter(|path| !path.trim().is_empty()),
            complete: torrent.progress >= 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExistingTorrentSource, QBittorrentClient, TorrentClientError};
    use reseed_domain::ReleaseMetadata;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn torrents_body() -> &'static str {
        r#"[
            {
                "hash": "partial",
                "name": "Movie 2020 1080p BluRay x264-GRP",
                "progress": 0.4,
                "content_path": "/data/partial"
            },
            {
                "hash": "abc123",
                "name": "Movie 2020 1080p BluRay x264-GRP",
                "progress": 1.0,
                "content_path": "/data/Movie 2020 1080p BluRay x264-GRP"
            }
        ]"#
    }

    #[tokio::test]
    async fn finds_completed_torrent_by_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/torrents/info"))
            .respond_with(ResponseTemplate::new(200).set_body_string(torrents_body()))
            .mount(&server)
            .await;

        let client = QBittorrentClient::new(server.uri(), None, None);
        let meta = ReleaseMetadata::new("Movie 2020 1080p BluRay x264-GRP");
        let found = client
            .find_existing_torrent(&meta)
            .await
            .expect("lookup should succeed");

        assert_eq!(found.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn no_match_returns_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/torrents/info"))
            .respond_with(ResponseTemplate::new(200).set_body_string(torrents_body()))
            .mount(&server)
            .await;

        let client = QBittorrentClient::new(server.uri(), None, None);
        let found = client
            .find_existing_torrent(&ReleaseMetadata::new("Something Else"))
            .await
            .expect("lookup should succeed");

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn login_failure_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v2/auth/login"))
            .and(body_string_contains("username=admin"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Fails."))
            .mount(&server)
            .await;

        let client = QBittorrentClient::new(
            server.uri(),
            Some("admin".to_string()),
            Some("wrong".to_string()),
        );
        let result = client.list_torrents().await;

        assert!(matches!(result, Err(TorrentClientError::Authentication)));
    }

    #[tokio::test]
    async fn export_returns_raw_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/torrents/export"))
            .and(query_param("hash", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"d4:infod12:piece lengthi16384eee".to_vec()))
            .mount(&server)
            .await;

        let client = QBittorrentClient::new(server.uri(), None, None);
        let bytes = client.export_torrent("abc123").await.expect("export");

        assert!(bytes.starts_with(b"d4:info"));
    }

    #[tokio::test]
    async fn matches_release_by_content_folder() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/torrents/info"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"hash":"def456","name":"renamed","progress":1.0,"content_path":"/data/Show S01 1080p WEB-DL/"}]"#,
            ))
            .mount(&server)
            .await;

        let client = QBittorrentClient::new(format!("{}/", server.uri()), None, None);
        let found = client
            .find_existing_torrent(&ReleaseMetadata::new("Show S01 1080p WEB-DL"))
            .await
            .expect("lookup should succeed");

        assert_eq!(found.as_deref(), Some("def456"));
    }

    #[tokio::test]
    async fn error_status_keeps_the_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/torrents/export"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let client = QBittorrentClient::new(server.uri(), None, None);
        let result = client.export_torrent("missing").await;

        assert!(matches!(
            result,
            Err(TorrentClientError::HttpStatus { status: 404, ref body }) if body == "Not Found"
        ));
    }
}
