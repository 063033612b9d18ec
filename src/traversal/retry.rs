use std::time::Duration;

use tracing::{debug, warn};

use crate::document::Document;
use crate::error::NavError;
use crate::extract::{self, ProviderRecord};
use crate::report::Locator;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What happened to one leaf row.
#[derive(Debug)]
pub enum LeafOutcome {
    Extracted(ProviderRecord),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Exhausted { attempts: u32, last_error: String },
}

/// Per-leaf retry states. `attempt` counts from 1.
#[derive(Debug)]
pub enum LeafState {
    Attempting { attempt: u32 },
    Recovering { attempt: u32, cause: NavError },
    Succeeded(ProviderRecord),
    Exhausted { attempts: u32, cause: NavError },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub open_timeout: Duration,
    pub settle_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            open_timeout: Duration::from_secs(30),
            settle_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Where to go once recovery after a failed `attempt` is done.
    pub fn after_recovery(&self, attempt: u32, cause: NavError) -> LeafState {
        if attempt >= self.max_attempts {
            LeafState::Exhausted {
                attempts: attempt,
                cause,
            }
        } else {
            LeafState::Attempting {
                attempt: attempt + 1,
            }
        }
    }
}

/// Opens leaf detail views, retrying through reloads of the report page.
pub struct LeafRetrier {
    policy: RetryPolicy,
}

impl LeafRetrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Drive one leaf to an outcome. Only non-transient errors escape.
    pub async fn attempt_leaf<D: Document>(
        &self,
        doc: &mut D,
        target_index: usize,
    ) -> Result<LeafOutcome, NavError> {
        let mut state = LeafState::Attempting { attempt: 1 };
        loop {
            state = match state {
                LeafState::Attempting { attempt } => match self.try_once(doc, target_index).await {
                    Ok(record) => LeafState::Succeeded(record),
                    Err(cause) if cause.is_transient() => LeafState::Recovering { attempt, cause },
                    Err(e) => return Err(e),
                },
                LeafState::Recovering { attempt, cause } => {
                    warn!(
                        "Leaf at row {} failed (attempt {}/{}): {}",
                        target_index, attempt, self.policy.max_attempts, cause
                    );
                    self.recover(doc).await?;
                    self.policy.after_recovery(attempt, cause)
                }
                LeafState::Succeeded(record) => return Ok(LeafOutcome::Extracted(record)),
                LeafState::Exhausted { attempts, cause } => {
                    warn!(
                        "Giving up on leaf at row {} after {} attempts",
                        target_index, attempts
                    );
                    return Ok(LeafOutcome::Skipped(SkipReason::Exhausted {
                        attempts,
                        last_error: cause.to_string(),
                    }));
                }
            };
        }
    }

    async fn try_once<D: Document>(
        &self,
        doc: &mut D,
        target_index: usize,
    ) -> Result<ProviderRecord, NavError> {
        let detail = doc
            .open_detail_view(Locator::RowLink(target_index), self.policy.open_timeout)
            .await?;
        let extracted = extract::extract(&detail).await;
        if let Err(e) = doc.close_detail_view(detail).await {
            warn!("Failed to close detail view for row {}: {}", target_index, e);
        }
        extracted
    }

    /// Reload the report; if the reload itself times out, fall back to
    /// waiting for the page to settle as it is.
    async fn recover<D: Document>(&self, doc: &mut D) -> Result<(), NavError> {
        match doc.reload(self.policy.settle_timeout).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => {
                warn!("Reload failed ({}), waiting for page to settle instead", e);
                match doc.wait_until_settled(self.policy.settle_timeout).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_transient() => {
                        debug!("Page still not settled after fallback wait: {}", e);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

// ── Tests ──
