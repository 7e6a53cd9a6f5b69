// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Default run-mode flags; command line switches take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub unattended: bool,
    pub unattended_confirm: bool,
    pub debug: bool,
    pub ask_dupe: bool,
    pub allow_dupes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Working root; per-release scratch files live under `tmp/<release id>/`.
    pub base_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorrentClientConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    #[default]
    Unit3d,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub kind: TrackerKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub requires_credentials: bool,
    pub requires_imdb: bool,
    pub banned_groups: Vec<String>,
    pub enforce_piece_size_limit: bool,
    pub supports_anonymous: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            kind: TrackerKind::Unit3d,
            base_url: None,
            api_key: None,
            requires_credentials: true,
            requires_imdb: false,
            banned_groups: Vec::new(),
            enforce_piece_size_limit: false,
            supports_anonymous: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub run: RunConfig,
    pub paths: PathsConfig,
    pub torrent_client: TorrentClientConfig,
    pub trackers: BTreeMap<String, TrackerConfig>,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: RESEED_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("RESEED_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(
        target: "config",
        trackers = config.trackers.len(),
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = load(None).expect("defaults should load");
            assert_eq!(config.telemetry.log_level, "info");
            assert!(!config.run.unattended);
            assert!(config.trackers.is_empty());
            assert_eq!(config.paths.base_dir, PathBuf::from("."));
            Ok(())
        });
    }

    #[test]
    fn toml_file_and_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "reseed.toml",
                r#"
                    [run]
                    unattended = true

                    [trackers.AAA]
                    base_url = "https://aaa.example"
                    api_key = "from-file"
                    banned_groups = ["BADGRP"]

                    [trackers.MAN]
                    kind = "manual"
                "#,
            )?;
            jail.set_env("RESEED_TELEMETRY__LOG_LEVEL", "debug");
            jail.set_env("RESEED_RUN__DEBUG", "true");

            let config = load(Some(Path::new("reseed.toml"))).expect("config should load");
            assert_eq!(config.telemetry.log_level, "debug");
            assert!(config.run.unattended);
            assert!(config.run.debug);

            let aaa = &config.trackers["AAA"];
            assert_eq!(aaa.kind, TrackerKind::Unit3d);
            assert_eq!(aaa.api_key.as_deref(), Some("from-file"));
            assert_eq!(aaa.banned_groups, vec!["BADGRP".to_string()]);
            assert!(aaa.requires_credentials);
            assert!(aaa.supports_anonymous);

            let manual = &config.trackers["MAN"];
            assert_eq!(manual.kind, TrackerKind::Manual);
            Ok(())
        });
    }
}
