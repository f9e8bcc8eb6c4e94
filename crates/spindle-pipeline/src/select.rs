//! Candidate selection

use spindle_pricing::Candidate;

/// How the candidate was picked: the first concrete sellable release when one
/// exists, otherwise the first result overall.
#[derive(Debug, Clone)]
pub enum Selected {
    Release(Candidate),
    FirstResult(Candidate),
}

impl Selected {
    pub fn candidate(&self) -> &Candidate {
        match self {
            Self::Release(c) | Self::FirstResult(c) => c,
        }
    }

    /// Tag recorded in the result extras.
    pub fn match_kind(&self) -> &'static str {
        match self {
            Self::Release(_) => "release",
            Self::FirstResult(_) => "first_result",
        }
    }
}

/// Pick a candidate from a result list. `None` only for an empty list.
pub fn select_candidate(results: &[Candidate]) -> Option<Selected> {
    if let Some(release) = results.iter().find(|c| c.is_release()) {
        return Some(Selected::Release(release.clone()));
    }
    results.first().cloned().map(Selected::FirstResult)
}
