// src/report.rs
// =============================================================================
// Serializable summary of a finished run, for --json output and for anyone
// who wants to store results.
// =============================================================================

use serde::Serialize;

use crate::checker::{Completion, Outcome, ResourceProbe};

/// One resource and how it ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    pub source: String,
    /// `None` only if the run was read before this probe confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<bool>,
}

impl From<&ResourceProbe> for ResourceReport {
    fn from(probe: &ResourceProbe) -> Self {
        Self {
            source: probe.source().to_string(),
            loaded: probe.loaded(),
        }
    }
}

/// A whole run: the aggregate outcome and every resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Where the resources came from (page URL, file path, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub outcome: Outcome,
    pub checked_count: usize,
    pub has_any_broken: bool,
    pub resources: Vec<ResourceReport>,
}

impl RunReport {
    pub fn new(origin: Option<String>, completion: &Completion) -> Self {
        Self {
            origin,
            outcome: completion.outcome,
            checked_count: completion.checked_count,
            has_any_broken: completion.has_any_broken,
            resources: completion.probes.iter().map(ResourceReport::from).collect(),
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.resources
            .iter()
            .filter(|resource| resource.loaded == Some(true))
            .count()
    }

    pub fn broken_count(&self) -> usize {
        self.resources
            .iter()
            .filter(|resource| resource.loaded == Some(false))
            .count()
    }
}
