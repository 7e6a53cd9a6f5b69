// SPDX-License-Identifier: GPL-3.0-or-later
use reseed_domain::{DuplicateCandidate, ReleaseMetadata};
use tracing::debug;

/// Duplicate search results split by how they affect the upload decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedDuplicates {
    /// Entries that block the upload unless someone overrides them.
    pub ordinary: Vec<DuplicateCandidate>,
    /// Entries that may be superseded; reported, never blocking on their own.
    pub trumpable: Vec<DuplicateCandidate>,
    /// Name of an ordinary entry containing the release's primary file.
    pub filename_match: Option<String>,
    /// The entry behind `filename_match` has the same number of files as the release.
    pub file_count_match: bool,
}

impl ClassifiedDuplicates {
    pub fn is_empty(&self) -> bool {
        self.ordinary.is_empty() && self.trumpable.is_empty()
    }

    pub fn only_trumpable(&self) -> bool {
        self.ordinary.is_empty() && !self.trumpable.is_empty()
    }

    pub fn exact_file_match(&self) -> bool {
        self.filename_match.is_some() && self.file_count_match
    }
}

pub fn classify(candidates: Vec<DuplicateCandidate>, meta: &ReleaseMetadata) -> ClassifiedDuplicates {
    let (trumpable, ordinary): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|candidate| candidate.trumpable);

    let mut classified = ClassifiedDuplicates {
        ordinary,
        trumpable,
        ..ClassifiedDuplicates::default()
    };

    if let Some(primary) = meta.primary_file() {
        let matched = classified.ordinary.iter().find(|candidate| {
            candidate
                .files
                .iter()
                .any(|file| file_name(file).eq_ignore_ascii_case(primary))
        });
        if let Some(candidate) = matched {
            let count = candidate
                .file_count
                .unwrap_or(candidate.files.len());
            classified.filename_match = Some(candidate.name.clone());
            classified.file_count_match = count == meta.filelist.len();
        }
    }

    debug!(
        target: "dupes",
        ordinary = classified.ordinary.len(),
        trumpable = classified.trumpable.len(),
        filename_match = classified.filename_match.is_some(),
        "classified duplicate candidates"
    );
    classified
}

/// One candidate per line, with its link when known.
pub fn summary(candidates: &[DuplicateCandidate]) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mark the release name when an ordinary duplicate carries exactly the same name.
pub fn apply_dupe_suffix(meta: &mut ReleaseMetadata, ordinary: &[DuplicateCandidate]) -> bool {
    let clashes = ordinary.iter().any(|candidate| candidate.name == meta.name);
    if clashes {
        meta.mark_possible_dupe();
    }
    clashes
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
