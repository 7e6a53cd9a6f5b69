// SPDX-License-Identifier: GPL-3.0-or-later
use reseed_domain::RunMode;
use tracing::{info, warn};

use crate::dupes::{summary, ClassifiedDuplicates};
use crate::prompt::{PromptError, Prompter};

/// Run-mode switches the gate consults before settling a duplicate question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateInputs {
    pub unattended: bool,
    pub unattended_confirm: bool,
    pub ask_dupe: bool,
    pub allow_dupes: bool,
}

impl GateInputs {
    pub fn new(mode: &RunMode) -> Self {
        Self {
            unattended: mode.unattended,
            unattended_confirm: mode.unattended_confirm,
            ask_dupe: mode.ask_dupe,
            allow_dupes: mode.allow_dupes,
        }
    }

    /// No human is consulted about duplicates.
    pub fn is_autonomous(&self) -> bool {
        (self.unattended && !self.unattended_confirm) || self.ask_dupe
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DupeDecision {
    pub upload: bool,
    /// A question was put to the operator.
    pub asked: bool,
}

impl DupeDecision {
    fn automatic(upload: bool) -> Self {
        Self {
            upload,
            asked: false,
        }
    }

    fn answered(upload: bool) -> Self {
        Self { upload, asked: true }
    }
}

/// Decides whether an upload goes ahead despite duplicates, and runs the final per-tracker
/// confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationGate;

impl ConfirmationGate {
    pub async fn confirm_duplicates(
        &self,
        tracker: &str,
        classified: &ClassifiedDuplicates,
        inputs: &GateInputs,
        prompter: &dyn Prompter,
    ) -> Result<DupeDecision, PromptError> {
        if classified.is_empty() {
            return Ok(DupeDecision::automatic(true));
        }

        if inputs.is_autonomous() {
            // trumpable entries alone never block
            let upload = inputs.allow_dupes || classified.ordinary.is_empty();
            info!(
                target: "dupes",
                tracker,
                upload,
                "duplicate decision taken without asking"
            );
            return Ok(DupeDecision::automatic(upload));
        }

        let question = format!("Upload to {tracker} anyway?");

        if classified.only_trumpable() {
            warn!(
                target: "dupes",
                tracker,
                trumpable = %summary(&classified.trumpable),
                "only trumpable entries found; report the trumpable torrent if you upload"
            );
            if inputs.allow_dupes {
                return Ok(DupeDecision::automatic(true));
            }
            let upload = prompter.ask_yes_no(&question, false).await?;
            return Ok(DupeDecision::answered(upload));
        }

        if classified.exact_file_match() {
            warn!(
                target: "dupes",
                tracker,
                matched = classified.filename_match.as_deref().unwrap_or_default(),
                "exact filename matches found"
            );
            let upload = prompter.ask_yes_no(&question, false).await?;
            return Ok(DupeDecision::answered(upload));
        }

        info!(
            target: "dupes",
            tracker,
            "check whether these are actually duplicates:\n{}",
            summary(&classified.ordinary)
        );
        if inputs.allow_dupes {
            return Ok(DupeDecision::automatic(true));
        }
        let upload = prompter.ask_yes_no(&question, false).await?;
        Ok(DupeDecision::answered(upload))
    }

    /// Final go/no-go for a tracker that passed every check. Unattended runs approve
    /// automatically unless they asked to confirm anyway.
    pub async fn confirm_upload(
        &self,
        tracker: &str,
        mode: &RunMode,
        prompter: &dyn Prompter,
    ) -> Result<bool, PromptError> {
        if !mode.confirms_interactively() {
            return Ok(true);
        }
        prompter
            .ask_yes_no(&format!("Upload to {tracker}?"), false)
            .await
    }
}
