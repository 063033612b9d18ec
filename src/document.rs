use std::time::Duration;

use async_trait::async_trait;

use crate::error::NavError;
use crate::report::{DetailField, Locator};

/// The report page the traversal drives. One interaction at a time; callers
/// must settle the view before counting rows after any click.
#[async_trait]
pub trait Document: Send {
    type Detail: DetailView + Send;

    async fn count(&mut self, locator: Locator) -> Result<usize, NavError>;

    async fn click(&mut self, locator: Locator) -> Result<(), NavError>;

    /// Fails with `NavError::Timeout` if the view is still busy after `timeout`.
    async fn wait_until_settled(&mut self, timeout: Duration) -> Result<(), NavError>;

    /// Click the link at `locator` and wait for the detail view it opens to load.
    async fn open_detail_view(
        &mut self,
        locator: Locator,
        timeout: Duration,
    ) -> Result<Self::Detail, NavError>;

    async fn close_detail_view(&mut self, detail: Self::Detail) -> Result<(), NavError>;

    /// Reload the report page and wait for it to settle.
    async fn reload(&mut self, timeout: Duration) -> Result<(), NavError>;
}

/// An open provider detail view.
#[async_trait]
pub trait DetailView {
    async fn read_text(&self, field: DetailField) -> Result<String, NavError>;
}
