// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use reqwest::Client;
use reseed_config::AppConfig;
use reseed_trackers::TrackerRegistry;
use tracing::info;

pub mod confirmation;
pub mod dupes;
pub mod events;
pub mod orchestrator;
pub mod prompt;
pub mod torrent;
pub mod torrent_client;
pub mod tracker_run;

pub use confirmation::{ConfirmationGate, DupeDecision, GateInputs};
pub use dupes::ClassifiedDuplicates;
pub use events::{EventPublisher, InMemoryEventBus};
pub use orchestrator::{OrchestrationError, OrchestrationReport, Orchestrator};
pub use prompt::{PromptError, Prompter, ScriptedAnswer, ScriptedPrompter, TerminalPrompter};
pub use torrent::{PieceSizeGuard, TorrentError, MAX_PIECE_SIZE};
pub use torrent_client::{ExistingTorrentSource, QBittorrentClient, TorrentClientError};
pub use tracker_run::{RunState, TrackerStateMachine};

pub fn http_client() -> reseed_trackers::Result<Client> {
    Ok(Client::builder().pool_max_idle_per_host(8).build()?)
}

/// Wire an orchestrator from configuration: tracker registry, piece-size guard backed by the
/// configured torrent client, and the given prompter.
pub fn build_orchestrator(
    config: &AppConfig,
    prompter: Arc<dyn Prompter>,
) -> reseed_trackers::Result<Orchestrator> {
    let registry = TrackerRegistry::from_config(config, http_client()?)?;

    let mut guard = PieceSizeGuard::new(config.paths.base_dir.clone());
    if let Some(url) = config.torrent_client.url.clone() {
        info!(target: "application", %url, "existing-torrent lookup enabled");
        guard = guard.with_source(Arc::new(QBittorrentClient::new(
            url,
            config.torrent_client.username.clone(),
            config.torrent_client.password.clone(),
        )));
    }

    let machine = TrackerStateMachine::new(prompter).with_piece_size_guard(guard);
    Ok(Orchestrator::new(registry, machine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reseed_config::{TorrentClientConfig, TrackerConfig};

    #[test]
    fn builds_from_config() {
        let mut config = AppConfig::default();
        config.trackers.insert(
            "AAA".to_string(),
            TrackerConfig {
                base_url: Some("https://aaa.example".to_string()),
                ..TrackerConfig::default()
            },
        );
        config.torrent_client = TorrentClientConfig {
            url: Some("http://127.0.0.1:8080".to_string()),
            ..TorrentClientConfig::default()
        };

        assert!(build_orchestrator(&config, Arc::new(ScriptedPrompter::default())).is_ok());
    }
}
