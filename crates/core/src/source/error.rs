use std::fmt;

/// Attached to snapshot source failures so callers can log the upstream body.
#[derive(Debug, Clone)]
pub struct SourceDiagnosticsError {
    pub source_name: &'static str,
    pub stage: &'static str,
    pub detail: String,
    /// Upstream HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    pub raw_body: Option<String>,
}

impl SourceDiagnosticsError {
    /// Client errors other than 429 will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self.status {
            Some(429) => true,
            Some(code) => !(400..500).contains(&code),
            None => true,
        }
    }
}

impl fmt::Display for SourceDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "snapshot source error (source={}, stage={}): {}",
            self.source_name, self.stage, self.detail
        )
    }
}

impl std::error::Error for SourceDiagnosticsError {}
