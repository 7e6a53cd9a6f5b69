// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(test)]
mod tests {
    use crate::{CredentialCheck, TrackerCapability, TrackerError, Unit3dTracker};
    use reqwest::Client;
    use reseed_config::TrackerConfig;
    use reseed_domain::{ImdbId, ReleaseMetadata};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-api-key";

    fn tracker(server: &MockServer, api_key: Option<&str>) -> Unit3dTracker {
        let settings = TrackerConfig {
            base_url: Some(format!("{}/", server.uri())),
            api_key: api_key.map(str::to_string),
            ..TrackerConfig::default()
        };
        Unit3dTracker::new("AAA", &settings, Client::new()).expect("tracker should build")
    }

    fn search_response() -> serde_json::Value {
        serde_json::json!({
            "data": [
                {
                    "type": "torrent",
                    "id": "101",
                    "attributes": {
                        "name": "Movie 2020 1080p BluRay x264-GRP",
                        "details_link": "https://aaa.example/torrents/101",
                        "files": [{"index": 0, "name": "Movie.2020.1080p.BluRay.x264-GRP.mkv", "size": 1}],
                        "num_file": 1
                    }
                },
                {
                    "type": "torrent",
                    "id": "102",
                    "attributes": {
                        "name": "Movie 2020 1080p BluRay x264-OLD",
                        "trumpable": true
                    }
                }
            ]
        })
    }

    fn release() -> ReleaseMetadata {
        let mut meta = ReleaseMetadata::new("Movie 2020 1080p BluRay x264-GRP");
        meta.ids.imdb = Some(ImdbId(1234567));
        meta
    }

    #[tokio::test]
    async fn validate_credentials_accepts_working_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/torrents/filter"))
            .and(query_param("api_token", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let result = tracker(&server, Some(API_KEY))
            .validate_credentials(&release())
            .await
            .expect("validation should succeed");

        assert_eq!(result, CredentialCheck::Accepted);
    }

    #[tokio::test]
    async fn validate_credentials_rejects_unauthorized_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/torrents/filter"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = tracker(&server, Some("wrong"))
            .validate_credentials(&release())
            .await
            .expect("a rejection is not an error");

        assert_eq!(result, CredentialCheck::Rejected);
    }

    #[tokio::test]
    async fn validate_credentials_without_key_skips_request() {
        let server = MockServer::start().await;

        let result = tracker(&server, None)
            .validate_credentials(&release())
            .await
            .expect("missing key is a rejection");

        assert_eq!(result, CredentialCheck::Rejected);
        assert!(server
            .received_requests()
            .await
            .unwrap_or_default()
            .is_empty());
    }

    #[tokio::test]
    async fn search_duplicates_maps_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/torrents/filter"))
            .and(query_param("imdbId", "1234567"))
            .and(query_param("perPage", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_response()))
            .mount(&server)
            .await;

        let search = tracker(&server, Some(API_KEY))
            .search_duplicates(&release(), None)
            .await
            .expect("search should succeed");

        assert_eq!(search.candidates.len(), 2);
        assert!(!search.other);

        let first = &search.candidates[0];
        assert_eq!(first.name, "Movie 2020 1080p BluRay x264-GRP");
        assert_eq!(first.link.as_deref(), Some("https://aaa.example/torrents/101"));
        assert_eq!(first.file_count, Some(1));
        assert!(!first.trumpable);

        let second = &search.candidates[1];
        assert!(second.trumpable);
        assert_eq!(second.file_count, None);
    }

    #[tokio::test]
    async fn search_duplicates_falls_back_to_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/torrents/filter"))
            .and(query_param("name", "Untagged Release"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let search = tracker(&server, Some(API_KEY))
            .search_duplicates(&ReleaseMetadata::new("Untagged Release"), None)
            .await
            .expect("search should succeed");

        assert!(search.candidates.is_empty());
    }

    #[tokio::test]
    async fn search_duplicates_surfaces_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/torrents/filter"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = tracker(&server, Some(API_KEY))
            .search_duplicates(&release(), None)
            .await
            .expect_err("server error should surface");

        match err {
            TrackerError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn search_duplicates_rejects_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/torrents/filter"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = tracker(&server, Some(API_KEY))
            .search_duplicates(&release(), None)
            .await
            .expect_err("html body should not parse");

        assert!(matches!(err, TrackerError::InvalidResponse(_)));
    }
}
