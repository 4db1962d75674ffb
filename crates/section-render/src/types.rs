//! Core data types for fetched sections and patch results.

use std::collections::HashMap;

/// Section id to raw markup, as returned by the multi-section endpoint.
pub type SectionMap = HashMap<String, String>;

/// What happened to a single selector during a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorOutcome {
    /// The live element was replaced by the fetched one.
    Replaced,
    /// The fetched document has no element matching the selector.
    MissingInFetched,
    /// The live page has no element matching the selector.
    MissingInPage,
    /// The selector did not compile.
    InvalidSelector(String),
}

/// Per-selector results of one patch, in the order the selectors were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub entries: Vec<(String, SelectorOutcome)>,
}

impl PatchReport {
    /// Record the outcome for a selector.
    pub fn push(&mut self, selector: &str, outcome: SelectorOutcome) {
        self.entries.push((selector.to_string(), outcome));
    }

    /// Selectors whose live element was replaced.
    pub fn replaced(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, o)| *o == SelectorOutcome::Replaced)
            .map(|(s, _)| s.as_str())
            .collect()
    }

    /// Selectors that were skipped for any reason.
    pub fn skipped(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, o)| *o != SelectorOutcome::Replaced)
            .map(|(s, _)| s.as_str())
            .collect()
    }

    /// True when every selector led to a replacement.
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, o)| *o == SelectorOutcome::Replaced)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a fetch-and-patch operation. Fetch failures are reported here
/// instead of being returned as `Err`.
#[derive(Debug)]
pub enum RenderOutcome {
    Patched(PatchReport),
    FetchFailed(SectionError),
}

impl RenderOutcome {
    /// The patch report, if the fetch succeeded.
    pub fn report(&self) -> Option<&PatchReport> {
        match self {
            RenderOutcome::Patched(report) => Some(report),
            RenderOutcome::FetchFailed(_) => None,
        }
    }

    /// The fetch error, if the fetch failed.
    pub fn error(&self) -> Option<&SectionError> {
        match self {
            RenderOutcome::Patched(_) => None,
            RenderOutcome::FetchFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur while fetching or patching sections.
#[derive(thiserror::Error, Debug)]
pub enum SectionError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! Status: {status}")]
    HttpStatus { status: u16 },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl SectionError {
    /// True when this is a non-success response with the given status code.
    pub fn is_http_status(&self, code: u16) -> bool {
        matches!(self, SectionError::HttpStatus { status } if *status == code)
    }
}

/// Convenience result type.
pub type SectionResult<T> = Result<T, SectionError>;
