use std::time::Duration;

use chromiumoxide::error::CdpError;
use thiserror::Error;

/// Failure of a single interaction with the report document.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("timed out after {after:?} waiting for {action}")]
    Timeout { action: &'static str, after: Duration },
    #[error("element not found: {0}")]
    NotFound(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("devtools protocol error: {0}")]
    Cdp(#[from] CdpError),
}

impl NavError {
    pub fn timeout(action: &'static str, after: Duration) -> Self {
        NavError::Timeout { action, after }
    }

    /// Timeouts and missing elements are what a reload can fix; everything
    /// else means the browser session itself is broken. A devtools request
    /// that outlived chromiumoxide's own request timeout counts as a timeout.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NavError::Timeout { .. }
                | NavError::NotFound(_)
                | NavError::Cdp(CdpError::Timeout | CdpError::NotFound)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(NavError::timeout("settle", Duration::from_secs(1)).is_transient());
        assert!(NavError::NotFound("tr[3]//a".into()).is_transient());
        assert!(!NavError::Script("boom".into()).is_transient());
        assert!(!NavError::Launch("no chrome".into()).is_transient());
    }

    #[test]
    fn devtools_request_timeout_is_transient() {
        assert!(NavError::from(CdpError::Timeout).is_transient());
        assert!(NavError::from(CdpError::NotFound).is_transient());
    }

    #[test]
    fn dead_browser_is_not_transient() {
        assert!(!NavError::from(CdpError::NoResponse).is_transient());
        assert!(!NavError::from(CdpError::msg("Target closed")).is_transient());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "websocket closed");
        assert!(!NavError::from(CdpError::from(io)).is_transient());
    }

    #[test]
    fn timeout_message_names_action() {
        let e = NavError::timeout("detail view", Duration::from_secs(30));
        assert_eq!(e.to_string(), "timed out after 30s waiting for detail view");
    }
}
