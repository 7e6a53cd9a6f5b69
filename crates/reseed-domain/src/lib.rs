// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Marker appended to a release name when an identically named entry already exists on a tracker
/// and the upload goes ahead anyway.
pub const DUPE_MARKER: &str = " DUPE?";

// ============================================================================
// Value Objects & IDs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseId(pub Uuid);

impl ReleaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReleaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IMDb title identifier, stored numerically and rendered as `tt` plus at least seven digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImdbId(pub u32);

impl ImdbId {
    /// Parse operator input in the `tt1234567` form. Case and surrounding whitespace are ignored.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_lowercase();
        let digits = normalized.strip_prefix("tt")?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok().map(Self)
    }

    /// Zero-padded numeric part, e.g. `0012345`.
    pub fn padded(&self) -> String {
        format!("{:07}", self.0)
    }
}

impl std::fmt::Display for ImdbId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tt{}", self.padded())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    pub imdb: Option<ImdbId>,
    pub tmdb: Option<u64>,
    pub tvdb: Option<u64>,
    pub mal: Option<u64>,
}

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Movie,
    Tv,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie => write!(f, "MOVIE"),
            Self::Tv => write!(f, "TV"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscType {
    Bdmv,
    Dvd,
    Hddvd,
}

impl DiscType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bdmv => "BDMV",
            Self::Dvd => "DVD",
            Self::Hddvd => "HDDVD",
        }
    }
}

/// Terminal classification of a tracker once its run has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Banned,
    Dupe,
    Skipped,
    Upload,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Banned => write!(f, "banned"),
            Self::Dupe => write!(f, "dupe"),
            Self::Skipped => write!(f, "skipped"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

// ============================================================================
// Run mode
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMode {
    /// No operator is expected to answer prompts.
    #[serde(default)]
    pub unattended: bool,
    /// Still ask for confirmation even though the run is unattended.
    #[serde(default)]
    pub unattended_confirm: bool,
    /// Run the whole pipeline without submitting anything.
    #[serde(default)]
    pub debug: bool,
    /// Never ask about duplicates; decide them automatically.
    #[serde(default)]
    pub ask_dupe: bool,
    /// Upload even when ordinary duplicates were found.
    #[serde(default)]
    pub allow_dupes: bool,
}

impl RunMode {
    /// Whether yes/no questions may be put to an operator during this run.
    pub fn confirms_interactively(&self) -> bool {
        !self.unattended || self.unattended_confirm
    }
}

// ============================================================================
// Tracker outcomes & duplicates
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerOutcome {
    pub banned: bool,
    pub skipped: bool,
    pub dupe: bool,
    pub upload: bool,
    pub other: bool,
}

impl TrackerOutcome {
    /// None of the gating flags is set.
    pub fn passed_checks(&self) -> bool {
        !self.banned && !self.skipped && !self.dupe
    }

    pub fn classification(&self) -> Classification {
        if self.banned {
            Classification::Banned
        } else if self.dupe {
            Classification::Dupe
        } else if self.skipped {
            Classification::Skipped
        } else if self.upload {
            Classification::Upload
        } else {
            // a run that passed every check but was not approved counts as skipped
            Classification::Skipped
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub trumpable: bool,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub file_count: Option<usize>,
}

impl DuplicateCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn trumpable(mut self) -> Self {
        self.trumpable = true;
        self
    }
}

impl std::fmt::Display for DuplicateCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.link {
            Some(link) => write!(f, "{} - {}", self.name, link),
            None => write!(f, "{}", self.name),
        }
    }
}

// ============================================================================
// Release metadata
// ============================================================================

/// Everything known about the release being submitted, shared across tracker runs.
///
/// Values discovered by a single tracker run are kept in maps keyed by tracker name so that
/// concurrent runs never write the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(default)]
    pub id: ReleaseId,
    pub name: String,
    pub category: Option<Category>,
    #[serde(default)]
    pub ids: ExternalIds,
    /// Release group tag, without the leading dash.
    #[serde(default)]
    pub release_group: Option<String>,
    #[serde(default)]
    pub disc_type: Option<DiscType>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub filelist: Vec<String>,
    #[serde(default)]
    pub image_list: Vec<String>,
    #[serde(default)]
    pub trackers: Vec<String>,
    #[serde(default)]
    pub mode: RunMode,
    /// Trackers the operator asked to leave out of this release.
    #[serde(default)]
    pub skip_upload: BTreeSet<String>,
    #[serde(default)]
    pub secret_tokens: BTreeMap<String, String>,
    #[serde(default)]
    pub group_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub trumpable_matches: BTreeMap<String, Vec<DuplicateCandidate>>,
    #[serde(default)]
    pub negotiated_names: BTreeMap<String, String>,
    /// Name the release carried when each tracker's run finished.
    #[serde(default)]
    pub release_names: BTreeMap<String, String>,
    #[serde(default)]
    pub tracker_status: BTreeMap<String, TrackerOutcome>,
}

impl ReleaseMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_dupe_marker(&self) -> bool {
        self.name.ends_with(DUPE_MARKER)
    }

    pub fn strip_dupe_marker(&mut self) {
        while let Some(stripped) = self.name.strip_suffix(DUPE_MARKER) {
            self.name = stripped.to_string();
        }
    }

    /// Append the duplicate marker unless the name already carries it.
    pub fn mark_possible_dupe(&mut self) {
        if !self.has_dupe_marker() {
            self.name.push_str(DUPE_MARKER);
        }
    }

    /// Name of the primary payload file, used to spot exact filename matches.
    pub fn primary_file(&self) -> Option<&str> {
        self.filelist.first().map(|path| {
            path.rsplit(['/', '\\'])
                .next()
                .unwrap_or(path.as_str())
        })
    }

    /// Copy every tracker-qualified value `tracker` produced in `local` into this instance.
    pub fn absorb_tracker(&mut self, tracker: &str, local: &ReleaseMetadata) {
        if let Some(token) = local.secret_tokens.get(tracker) {
            self.secret_tokens.insert(tracker.to_string(), token.clone());
        }
        if let Some(group_id) = local.group_ids.get(tracker) {
            self.group_ids.insert(tracker.to_string(), group_id.clone());
        }
        if let Some(matches) = local.trumpable_matches.get(tracker) {
            self.trumpable_matches
                .insert(tracker.to_string(), matches.clone());
        }
        if let Some(name) = local.negotiated_names.get(tracker) {
            self.negotiated_names.insert(tracker.to_string(), name.clone());
        }
        if let Some(name) = local.release_names.get(tracker) {
            self.release_names.insert(tracker.to_string(), name.clone());
        }
    }
}

// ============================================================================
// Domain Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<TPayload> {
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub payload: TPayload,
}

impl<TPayload> DomainEvent<TPayload> {
    pub fn new(name: &'static str, payload: TPayload) -> Self {
        Self {
            name,
            occurred_at: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerProcessedPayload {
    pub release_id: ReleaseId,
    pub tracker: String,
    pub release_name: String,
    pub classification: Classification,
    pub outcome: TrackerOutcome,
}

pub type TrackerProcessed = DomainEvent<TrackerProcessedPayload>;
