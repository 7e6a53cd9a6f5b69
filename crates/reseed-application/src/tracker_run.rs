// SPDX-License-Identifier: GPL-3.0-or-later

//! Drives a single tracker from credential check to the final upload decision.
//!
//! The run always walks the same states in order:
//! `Start → CredentialCheck → BanClaimCheck → DuplicateSearch → Classify → Confirm → Decide → Done`.
//! A soft failure (rejected credentials, ban, claim, capability error) only sets a flag on the
//! outcome; later states see the flag and do nothing, so every tracker still ends in `Done` with
//! exactly one classification. Only a cancelled prompt ends the run early.

use std::sync::Arc;

use reseed_domain::{DuplicateCandidate, ImdbId, ReleaseMetadata, TrackerOutcome};
use reseed_trackers::{CredentialCheck, TrackerCapability, TrackerHandle};
use tracing::{debug, info, trace, warn};

use crate::confirmation::{ConfirmationGate, GateInputs};
use crate::dupes;
use crate::prompt::{PromptError, Prompter};
use crate::torrent::PieceSizeGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    CredentialCheck,
    BanClaimCheck,
    DuplicateSearch,
    Classify,
    Confirm,
    Decide,
    Done,
}

/// Shared collaborators for tracker runs. Cheap to share between concurrent runs.
pub struct TrackerStateMachine {
    prompter: Arc<dyn Prompter>,
    gate: ConfirmationGate,
    piece_size: Option<PieceSizeGuard>,
}

impl TrackerStateMachine {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self {
            prompter,
            gate: ConfirmationGate,
            piece_size: None,
        }
    }

    pub fn with_piece_size_guard(mut self, guard: PieceSizeGuard) -> Self {
        self.piece_size = Some(guard);
        self
    }

    /// Process `tracker` against `meta`. `meta` is either a private copy (concurrent runs) or
    /// the shared instance (sequential runs); values this run discovers are stored under the
    /// tracker's name.
    pub async fn run(
        &self,
        tracker: &str,
        handle: TrackerHandle,
        meta: &mut ReleaseMetadata,
    ) -> Result<TrackerOutcome, PromptError> {
        meta.strip_dupe_marker();

        let outcome = match handle {
            TrackerHandle::Manual => {
                debug!(target: "tracker_run", tracker, "manual tracker approved");
                TrackerOutcome {
                    upload: true,
                    ..TrackerOutcome::default()
                }
            }
            TrackerHandle::Unknown => {
                warn!(target: "tracker_run", tracker, "no capability registered; skipping");
                TrackerOutcome {
                    skipped: true,
                    ..TrackerOutcome::default()
                }
            }
            TrackerHandle::Capability(capability) => {
                let mut run = Run {
                    machine: self,
                    tracker,
                    capability,
                    meta: &mut *meta,
                    outcome: TrackerOutcome::default(),
                    we_asked: false,
                    state: RunState::Start,
                };
                run.drive().await?;
                run.outcome
            }
        };

        meta.release_names
            .insert(tracker.to_string(), meta.name.clone());
        Ok(outcome)
    }
}

struct Run<'a> {
    machine: &'a TrackerStateMachine,
    tracker: &'a str,
    capability: Arc<dyn TrackerCapability>,
    meta: &'a mut ReleaseMetadata,
    outcome: TrackerOutcome,
    we_asked: bool,
    state: RunState,
}

impl Run<'_> {
    async fn drive(&mut self) -> Result<(), PromptError> {
        self.enter(RunState::CredentialCheck);
        self.credential_check().await?;

        self.enter(RunState::BanClaimCheck);
        self.ban_claim_check().await;

        self.enter(RunState::DuplicateSearch);
        let candidates = self.duplicate_search().await;

        if let Some(candidates) = candidates {
            self.enter(RunState::Classify);
            let classified = dupes::classify(candidates, self.meta);
            if !classified.trumpable.is_empty() {
                warn!(
                    target: "tracker_run",
                    tracker = self.tracker,
                    "trumpable entries found:\n{}",
                    dupes::summary(&classified.trumpable)
                );
                self.meta
                    .trumpable_matches
                    .insert(self.tracker.to_string(), classified.trumpable.clone());
            }

            self.enter(RunState::Confirm);
            if classified.is_empty() {
                debug!(target: "tracker_run", tracker = self.tracker, "no duplicates found");
            } else {
                self.negotiate_name().await;
                let inputs = GateInputs::new(&self.meta.mode);
                let decision = self
                    .machine
                    .gate
                    .confirm_duplicates(
                        self.tracker,
                        &classified,
                        &inputs,
                        self.machine.prompter.as_ref(),
                    )
                    .await?;
                self.we_asked |= decision.asked;
                if decision.upload {
                    dupes::apply_dupe_suffix(self.meta, &classified.ordinary);
                } else {
                    self.outcome.dupe = true;
                }
            }

            self.piece_size_check().await;
        }

        self.enter(RunState::Decide);
        self.decide().await?;

        self.enter(RunState::Done);
        Ok(())
    }

    fn enter(&mut self, state: RunState) {
        trace!(
            target: "tracker_run",
            tracker = self.tracker,
            from = ?self.state,
            to = ?state,
            "state transition"
        );
        self.state = state;
    }

    fn skip(&mut self, reason: &str) {
        info!(target: "tracker_run", tracker = self.tracker, reason, "tracker skipped");
        self.outcome.skipped = true;
    }

    async fn credential_check(&mut self) -> Result<(), PromptError> {
        if self.capability.requires_credentials() {
            match self.capability.validate_credentials(self.meta).await {
                Ok(CredentialCheck::Accepted) => {}
                Ok(CredentialCheck::Token(token)) => {
                    self.meta
                        .secret_tokens
                        .insert(self.tracker.to_string(), token);
                }
                Ok(CredentialCheck::Rejected) => self.skip("credentials rejected"),
                Err(error) => {
                    warn!(target: "tracker_run", tracker = self.tracker, %error, "credential check failed");
                    self.skip("credential check failed");
                }
            }
        }

        if self.capability.requires_imdb() && self.meta.ids.imdb.is_none() && !self.outcome.skipped
        {
            self.require_imdb().await?;
        }
        Ok(())
    }

    async fn require_imdb(&mut self) -> Result<(), PromptError> {
        if self.meta.mode.unattended {
            self.skip("imdb id unknown");
            return Ok(());
        }

        let question = format!(
            "Unable to find an IMDb id. Enter one (e.g. tt1234567) or press Enter to skip uploading to {}:",
            self.tracker
        );
        let answer = self
            .machine
            .prompter
            .ask_until_valid(
                &question,
                &|value: &str| ImdbId::parse(value).is_some(),
                "invalid IMDb id, expected tt1234567",
            )
            .await?;

        match ImdbId::parse(&answer) {
            Some(imdb) => {
                info!(target: "tracker_run", tracker = self.tracker, %imdb, "imdb id supplied");
                self.meta.ids.imdb = Some(imdb);
            }
            None => self.skip("no imdb id supplied"),
        }
        Ok(())
    }

    async fn ban_claim_check(&mut self) {
        if self.outcome.skipped {
            return;
        }

        match self.capability.check_banned_group(self.meta).await {
            Ok(banned) => self.outcome.banned = banned,
            Err(error) => {
                warn!(target: "tracker_run", tracker = self.tracker, %error, "banned group check failed");
                self.skip("banned group check failed");
            }
        }

        let preset = self
            .meta
            .skip_upload
            .iter()
            .any(|name| name.eq_ignore_ascii_case(self.tracker));
        if preset {
            self.skip("upload disabled for this release");
        }

        if self.outcome.banned || self.outcome.skipped {
            return;
        }

        match self.capability.torrent_claims(self.meta).await {
            Ok(true) => self.skip("release is claimed"),
            Ok(false) => {}
            Err(error) => {
                warn!(target: "tracker_run", tracker = self.tracker, %error, "claim lookup failed");
                self.skip("claim lookup failed");
            }
        }
    }

    async fn duplicate_search(&mut self) -> Option<Vec<DuplicateCandidate>> {
        if self.outcome.banned || self.outcome.skipped {
            return None;
        }

        if self.meta.anonymous && !self.capability.supports_anonymous() {
            warn!(
                target: "tracker_run",
                tracker = self.tracker,
                "anonymous upload requested but not supported; the upload will not be anonymous"
            );
        }

        if self.capability.keyed_by_group() {
            match self
                .capability
                .group_by_external_id(self.meta.ids.imdb)
                .await
            {
                Ok(Some(group_id)) => {
                    self.meta
                        .group_ids
                        .insert(self.tracker.to_string(), group_id);
                }
                Ok(None) => debug!(target: "tracker_run", tracker = self.tracker, "no existing group"),
                Err(error) => {
                    warn!(target: "tracker_run", tracker = self.tracker, %error, "group lookup failed");
                    self.skip("group lookup failed");
                    return None;
                }
            }
        }

        let disc_type = self.meta.disc_type;
        match self.capability.search_duplicates(self.meta, disc_type).await {
            Ok(search) => {
                self.outcome.other |= search.other;
                Some(search.candidates)
            }
            Err(error) => {
                warn!(target: "tracker_run", tracker = self.tracker, %error, "duplicate search failed");
                self.skip("duplicate search failed");
                None
            }
        }
    }

    async fn piece_size_check(&mut self) {
        if !self.outcome.passed_checks() || !self.capability.enforces_piece_size_limit() {
            return;
        }
        let machine = self.machine;
        let Some(guard) = machine.piece_size.as_ref() else {
            return;
        };

        match guard.exceeds_limit(self.meta).await {
            Ok(true) => self.skip("torrent piece size above limit"),
            Ok(false) => {}
            Err(error) => {
                warn!(target: "tracker_run", tracker = self.tracker, %error, "piece size check failed");
                self.skip("piece size check failed");
            }
        }
    }

    async fn negotiate_name(&mut self) {
        match self.capability.negotiate_name(self.meta).await {
            Ok(negotiated) => {
                if let Some(name) = negotiated.changed_name(&self.meta.name) {
                    info!(
                        target: "tracker_run",
                        tracker = self.tracker,
                        name,
                        "tracker applies a name change to this release"
                    );
                    self.meta
                        .negotiated_names
                        .insert(self.tracker.to_string(), name.to_string());
                }
            }
            Err(error) => {
                debug!(target: "tracker_run", tracker = self.tracker, %error, "name negotiation unavailable");
            }
        }
    }

    async fn decide(&mut self) -> Result<(), PromptError> {
        if !self.outcome.passed_checks() {
            return Ok(());
        }

        if self.meta.mode.debug {
            debug!(target: "tracker_run", tracker = self.tracker, "debug mode: marking upload without submitting");
            self.outcome.upload = true;
            return Ok(());
        }

        if !self.meta.mode.unattended {
            info!(target: "tracker_run", tracker = self.tracker, "tracker passed all checks");
        }

        if self.meta.mode.confirms_interactively() && !self.we_asked {
            self.negotiate_name().await;
            let mode = self.meta.mode;
            let approved = self
                .machine
                .gate
                .confirm_upload(self.tracker, &mode, self.machine.prompter.as_ref())
                .await?;
            if approved {
                self.outcome.upload = true;
            } else {
                self.skip("declined by operator");
            }
        } else {
            self.outcome.upload = true;
        }
        Ok(())
    }
}
