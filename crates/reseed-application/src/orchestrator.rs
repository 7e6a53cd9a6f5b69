// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::BTreeMap;
use std::sync::Arc;

use reseed_domain::{
    DomainEvent, ReleaseMetadata, TrackerOutcome, TrackerProcessed, TrackerProcessedPayload,
};
use reseed_trackers::TrackerRegistry;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::events::EventPublisher;
use crate::prompt::PromptError;
use crate::tracker_run::TrackerStateMachine;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("run cancelled by operator")]
    Cancelled,
    #[error("tracker task failed: {0}")]
    TaskFailed(String),
}

impl From<PromptError> for OrchestrationError {
    fn from(_: PromptError) -> Self {
        Self::Cancelled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationReport {
    pub outcomes: BTreeMap<String, TrackerOutcome>,
    /// Trackers approved for upload.
    pub successful: usize,
}

impl OrchestrationReport {
    fn from_outcomes(outcomes: BTreeMap<String, TrackerOutcome>) -> Self {
        let successful = outcomes.values().filter(|outcome| outcome.upload).count();
        Self {
            outcomes,
            successful,
        }
    }
}

/// Runs every requested tracker and merges the results into the release metadata.
///
/// Unattended runs process trackers concurrently, each on its own copy of the metadata; attended
/// runs go one tracker at a time against the shared instance so prompts never interleave.
pub struct Orchestrator {
    registry: TrackerRegistry,
    machine: Arc<TrackerStateMachine>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl Orchestrator {
    pub fn new(registry: TrackerRegistry, machine: TrackerStateMachine) -> Self {
        Self {
            registry,
            machine: Arc::new(machine),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn process_all(
        &self,
        meta: &mut ReleaseMetadata,
    ) -> Result<OrchestrationReport, OrchestrationError> {
        let trackers = requested_trackers(meta);

        let outcomes = if meta.mode.unattended {
            let searching: Vec<&str> = trackers
                .iter()
                .filter(|name| self.registry.is_known(name))
                .map(String::as_str)
                .collect();
            if !searching.is_empty() {
                info!(
                    target: "orchestrator",
                    trackers = %searching.join(", "),
                    "searching for existing torrents"
                );
            }
            self.run_concurrently(&trackers, meta).await?
        } else {
            self.run_sequentially(&trackers, meta).await?
        };

        self.log_summary(&outcomes, meta);
        for (tracker, outcome) in &outcomes {
            self.publish(tracker, outcome, meta);
        }

        meta.tracker_status = outcomes.clone();
        Ok(OrchestrationReport::from_outcomes(outcomes))
    }

    async fn run_concurrently(
        &self,
        trackers: &[String],
        meta: &mut ReleaseMetadata,
    ) -> Result<BTreeMap<String, TrackerOutcome>, OrchestrationError> {
        let mut tasks = JoinSet::new();
        for tracker in trackers {
            let tracker = tracker.clone();
            let handle = self.registry.lookup(&tracker);
            let machine = Arc::clone(&self.machine);
            let mut local = meta.clone();

            tasks.spawn(async move {
                let result = machine.run(&tracker, handle, &mut local).await;
                (tracker, local, result)
            });
        }

        // results are held back until every task has finished so a cancellation discards all
        let mut completed = Vec::with_capacity(trackers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((tracker, local, Ok(outcome))) => completed.push((tracker, local, outcome)),
                Ok((tracker, _, Err(cancelled))) => {
                    warn!(target: "orchestrator", %tracker, "prompt cancelled; aborting run");
                    tasks.abort_all();
                    return Err(cancelled.into());
                }
                Err(join_error) => {
                    error!(target: "orchestrator", error = %join_error, "tracker task failed");
                    tasks.abort_all();
                    return Err(OrchestrationError::TaskFailed(join_error.to_string()));
                }
            }
        }

        let mut outcomes = BTreeMap::new();
        for (tracker, local, outcome) in completed {
            meta.absorb_tracker(&tracker, &local);
            outcomes.insert(tracker, outcome);
        }
        Ok(outcomes)
    }

    async fn run_sequentially(
        &self,
        trackers: &[String],
        meta: &mut ReleaseMetadata,
    ) -> Result<BTreeMap<String, TrackerOutcome>, OrchestrationError> {
        let mut outcomes = BTreeMap::new();
        for tracker in trackers {
            let handle = self.registry.lookup(tracker);
            if self.registry.is_known(tracker) {
                info!(target: "orchestrator", %tracker, "searching for existing torrents");
            }
            let outcome = self.machine.run(tracker, handle, meta).await?;
            outcomes.insert(tracker.clone(), outcome);
        }
        Ok(outcomes)
    }

    fn log_summary(&self, outcomes: &BTreeMap<String, TrackerOutcome>, meta: &ReleaseMetadata) {
        let mut passed = Vec::new();
        let mut dupes = Vec::new();
        let mut skipped = Vec::new();
        for (tracker, outcome) in outcomes {
            if outcome.passed_checks() {
                passed.push(tracker.as_str());
            } else if outcome.dupe {
                dupes.push(tracker.as_str());
            } else if outcome.skipped {
                skipped.push(tracker.as_str());
            }
        }

        if !skipped.is_empty() {
            warn!(target: "orchestrator", trackers = %skipped.join(", "), "trackers skipped due to conditions");
        }
        if !dupes.is_empty() {
            warn!(target: "orchestrator", trackers = %dupes.join(", "), "potential duplicates found");
        }
        if !passed.is_empty() {
            info!(target: "orchestrator", trackers = %passed.join(", "), "trackers passed all checks");
        }

        if meta.mode.debug {
            for (tracker, outcome) in outcomes {
                info!(
                    target: "orchestrator",
                    %tracker,
                    banned = outcome.banned,
                    skipped = outcome.skipped,
                    dupe = outcome.dupe,
                    upload = outcome.upload,
                    "tracker summary"
                );
            }
            let successful = outcomes.values().filter(|outcome| outcome.upload).count();
            info!(target: "orchestrator", successful, "trackers passing all checks");
            warn!(target: "orchestrator", "debug mode does not upload to any site");
        }
    }

    fn publish(&self, tracker: &str, outcome: &TrackerOutcome, meta: &ReleaseMetadata) {
        let Some(events) = &self.events else {
            return;
        };
        let release_name = meta
            .release_names
            .get(tracker)
            .cloned()
            .unwrap_or_else(|| meta.name.clone());
        let event: TrackerProcessed = DomainEvent::new(
            "tracker.processed",
            TrackerProcessedPayload {
                release_id: meta.id,
                tracker: tracker.to_string(),
                release_name,
                classification: outcome.classification(),
                outcome: *outcome,
            },
        );
        events.publish(&event);
    }
}

/// Requested trackers in order, without repeats.
fn requested_trackers(meta: &ReleaseMetadata) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    meta.trackers
        .iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.to_uppercase()))
        .collect()
}
