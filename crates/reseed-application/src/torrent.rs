// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reseed_domain::ReleaseMetadata;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::torrent_client::{ExistingTorrentSource, TorrentClientError};

/// Largest piece size accepted by trackers that refuse rehashed torrents (8 MiB).
pub const MAX_PIECE_SIZE: u64 = 8 * 1024 * 1024;

const BASE_TORRENT: &str = "BASE.torrent";

#[derive(Debug, Error)]
pub enum TorrentError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid torrent file: {0}")]
    Decode(String),
    #[error(transparent)]
    Client(#[from] TorrentClientError),
}

#[derive(Debug, Deserialize)]
struct MetaInfo {
    info: InfoDictionary,
}

#[derive(Debug, Deserialize)]
struct InfoDictionary {
    #[serde(rename = "piece length")]
    piece_length: u64,
}

/// Piece length declared in a bencoded `.torrent` file.
pub fn piece_size(bytes: &[u8]) -> Result<u64, TorrentError> {
    let meta: MetaInfo =
        serde_bencode::from_bytes(bytes).map_err(|e| TorrentError::Decode(e.to_string()))?;
    Ok(meta.info.piece_length)
}

pub async fn read_piece_size(path: &Path) -> Result<u64, TorrentError> {
    let bytes = tokio::fs::read(path).await?;
    piece_size(&bytes)
}

/// Skips trackers whose piece-size limit the release's base torrent would exceed.
pub struct PieceSizeGuard {
    base_dir: PathBuf,
    limit: u64,
    source: Option<Arc<dyn ExistingTorrentSource>>,
}

impl PieceSizeGuard {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            limit: MAX_PIECE_SIZE,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ExistingTorrentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn base_torrent_path(&self, meta: &ReleaseMetadata) -> PathBuf {
        self.base_dir
            .join("tmp")
            .join(meta.id.to_string())
            .join(BASE_TORRENT)
    }

    /// `true` when the base torrent (existing, or derived from one the torrent client already
    /// has) uses pieces larger than the limit. No torrent at all is not a violation.
    pub async fn exceeds_limit(&self, meta: &ReleaseMetadata) -> Result<bool, TorrentError> {
        let path = self.base_torrent_path(meta);

        if tokio::fs::try_exists(&path).await? {
            let size = read_piece_size(&path).await?;
            if size > self.limit {
                warn!(target: "torrent", piece_size = size, "existing torrent has pieces larger than 8 MiB");
                return Ok(true);
            }
            return Ok(false);
        }

        let Some(source) = &self.source else {
            return Ok(false);
        };
        let Some(hash) = source.find_existing_torrent(meta).await? else {
            return Ok(false);
        };
        info!(target: "torrent", %hash, "existing torrent found in client");

        self.create_base_from_existing(source.as_ref(), &hash, &path)
            .await?;
        let size = read_piece_size(&path).await?;
        if size > self.limit {
            warn!(target: "torrent", piece_size = size, "no existing torrent with pieces of 8 MiB or less");
            return Ok(true);
        }
        Ok(false)
    }

    async fn create_base_from_existing(
        &self,
        source: &dyn ExistingTorrentSource,
        hash: &str,
        path: &Path,
    ) -> Result<(), TorrentError> {
        let bytes = source.export_torrent(hash).await?;
        // validate before writing so a bad export never becomes the base torrent
        piece_size(&bytes)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    pub(crate) fn torrent_bytes(piece_length: u64) -> Vec<u8> {
        format!(
            "d8:announce20:http://t.example/ann4:infod6:lengthi1024e4:name4:file12:piece lengthi{piece_length}e6:pieces0:ee"
        )
        .into_bytes()
    }

    struct FakeClient {
        piece_length: Option<u64>,
    }

    #[async_trait]
    impl ExistingTorrentSource for FakeClient {
        async fn find_existing_torrent(
            &self,
            _meta: &ReleaseMetadata,
        ) -> Result<Option<String>, TorrentClientError> {
            Ok(self.piece_length.map(|_| "abc123".to_string()))
        }

        async fn export_torrent(&self, _hash: &str) -> Result<Vec<u8>, TorrentClientError> {
            Ok(torrent_bytes(self.piece_length.unwrap_or_default()))
        }
    }

    #[test]
    fn reads_piece_length() {
        assert_eq!(piece_size(&torrent_bytes(16_777_216)).unwrap(), 16_777_216);
        assert!(matches!(piece_size(b"not bencode"), Err(TorrentError::Decode(_))));
    }

    #[tokio::test]
    async fn existing_base_torrent_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PieceSizeGuard::new(dir.path());
        let meta = ReleaseMetadata::new("Movie");
        let path = guard.base_torrent_path(&meta);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, torrent_bytes(MAX_PIECE_SIZE * 2)).unwrap();

        assert!(guard.exceeds_limit(&meta).await.unwrap());
    }

    #[tokio::test]
    async fn limit_itself_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PieceSizeGuard::new(dir.path());
        let meta = ReleaseMetadata::new("Movie");
        let path = guard.base_torrent_path(&meta);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, torrent_bytes(MAX_PIECE_SIZE)).unwrap();

        assert!(!guard.exceeds_limit(&meta).await.unwrap());
    }

    #[tokio::test]
    async fn no_torrent_anywhere_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PieceSizeGuard::new(dir.path())
            .with_source(Arc::new(FakeClient { piece_length: None }));

        assert!(!guard.exceeds_limit(&ReleaseMetadata::new("Movie")).await.unwrap());
    }

    #[tokio::test]
    async fn derives_base_torrent_from_client() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PieceSizeGuard::new(dir.path()).with_source(Arc::new(FakeClient {
            piece_length: Some(MAX_PIECE_SIZE * 2),
        }));
        let meta = ReleaseMetadata::new("Movie");

        assert!(guard.exceeds_limit(&meta).await.unwrap());
        assert!(guard.base_torrent_path(&meta).exists());
    }
}
