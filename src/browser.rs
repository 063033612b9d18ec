//! Chromium-backed report document.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Element, Page};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::document::{DetailView, Document};
use crate::error::NavError;
use crate::report::{self, DetailField, Locator};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long the resource count must stay flat before a page counts as idle.
const QUIET_WINDOW: Duration = Duration::from_millis(500);

const PROBE_JS: &str = "(() => ({ ready: document.readyState, resources: performance.getEntriesByType('resource').length }))()";

const FINGERPRINT_JS: &str = "(() => ({ user_agent: window.navigator.userAgent, is_nav: window.is_nav ?? null, is_nav5up: window.is_nav5up ?? null, is_ie: window.is_ie ?? null }))()";

#[derive(Deserialize)]
struct LoadProbe {
    ready: String,
    resources: u64,
}

#[derive(Deserialize)]
struct Fingerprint {
    user_agent: String,
    is_nav: Option<serde_json::Value>,
    is_nav5up: Option<serde_json::Value>,
    is_ie: Option<serde_json::Value>,
}

/// The report page inside a launched Chromium, plus the browser that owns it.
pub struct ChromeDocument {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    dialogs: JoinHandle<()>,
}

impl ChromeDocument {
    pub async fn launch(headless: bool) -> Result<Self, NavError> {
        let mut builder = BrowserConfig::builder();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(NavError::Launch)?;
        let (browser, mut events) = Browser::launch(config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("Browser handler: {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        let dialogs = accept_dialogs(&page).await?;

        Ok(Self {
            browser,
            page,
            handler,
            dialogs,
        })
    }

    /// Navigate to the report and select the reporting year.
    pub async fn open_report(&mut self, url: &str, year: &str, timeout: Duration) -> Result<(), NavError> {
        self.log_fingerprint("before report setup").await;

        if let Err(e) = self.open_section(url, timeout).await {
            if !e.is_transient() {
                return Err(e);
            }
            warn!("Report section did not open ({}), retrying navigation", e);
            self.open_section(url, timeout).await?;
        }

        self.click_xpath(report::ACTIVE_COUNT_LINK_XPATH).await?;
        self.wait_until_settled(timeout).await?;
        self.select_option(report::YEAR_TYPE_SELECT_XPATH, report::CALENDAR_YEAR).await?;
        self.select_option(report::BEGIN_YEAR_SELECT_XPATH, year).await?;
        self.select_option(report::END_YEAR_SELECT_XPATH, year).await?;
        self.click_xpath(report::SUBMIT_XPATH).await?;
        self.wait_until_settled(timeout).await?;

        self.log_fingerprint("after report setup").await;
        info!("Report ready for year {}", year);
        Ok(())
    }

    pub async fn shutdown(mut self) {
        self.dialogs.abort();
        if let Err(e) = self.browser.close().await {
            warn!("Browser did not close cleanly: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    async fn open_section(&mut self, url: &str, timeout: Duration) -> Result<(), NavError> {
        info!("Navigating to {}", url);
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| NavError::timeout("report navigation", timeout))??;
        self.wait_until_settled(timeout).await?;
        self.click_xpath(report::SECTION_LINK_XPATH).await?;
        self.wait_until_settled(timeout).await
    }

    async fn click_xpath(&self, xpath: &str) -> Result<(), NavError> {
        find_element(&self.page, xpath).await?.click().await?;
        Ok(())
    }

    async fn select_option(&self, xpath: &str, value: &str) -> Result<(), NavError> {
        let js = format!(
            "(() => {{ const el = document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; \
             if (!el) return false; el.value = {}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
            js_string(xpath),
            js_string(value)
        );
        let found: bool = evaluate(&self.page, js).await?;
        if !found {
            return Err(NavError::NotFound(xpath.to_string()));
        }
        Ok(())
    }

    async fn log_fingerprint(&self, stage: &str) {
        match evaluate::<Fingerprint>(&self.page, FINGERPRINT_JS.to_string()).await {
            Ok(fp) => debug!(
                "{}: userAgent={} is_nav={:?} is_nav5up={:?} is_ie={:?}",
                stage, fp.user_agent, fp.is_nav, fp.is_nav5up, fp.is_ie
            ),
            Err(e) => debug!("{}: fingerprint unavailable: {}", stage, e),
        }
    }

    async fn page_ids(&self) -> Result<HashSet<TargetId>, NavError> {
        Ok(self
            .browser
            .pages()
            .await?
            .iter()
            .map(|p| p.target_id().clone())
            .collect())
    }

    async fn wait_for_popup(&self, known: &HashSet<TargetId>) -> Result<Page, NavError> {
        loop {
            let pages = self.browser.pages().await?;
            if let Some(page) = unseen(known, pages, Page::target_id).into_iter().next() {
                return Ok(page);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Close popups that showed up after we stopped waiting for them, so the
    /// next attempt does not count them as already known.
    async fn close_late_popups(&self, known: &HashSet<TargetId>) {
        let pages = match self.browser.pages().await {
            Ok(pages) => pages,
            Err(e) => {
                debug!("Could not list pages after popup timeout: {}", e);
                return;
            }
        };
        for page in unseen(known, pages, Page::target_id) {
            debug!("Closing late popup {:?}", page.target_id());
            if let Err(e) = page.close().await {
                warn!("Failed to close late popup: {}", e);
            }
        }
    }
}

#[async_trait]
impl Document for ChromeDocument {
    type Detail = ChromeDetail;

    async fn count(&mut self, locator: Locator) -> Result<usize, NavError> {
        count_xpath(&self.page, &locator.xpath()).await
    }

    async fn click(&mut self, locator: Locator) -> Result<(), NavError> {
        self.click_xpath(&locator.xpath()).await
    }

    async fn wait_until_settled(&mut self, timeout: Duration) -> Result<(), NavError> {
        settle(&self.page, timeout).await
    }

    async fn open_detail_view(
        &mut self,
        locator: Locator,
        timeout: Duration,
    ) -> Result<ChromeDetail, NavError> {
        let known = self.page_ids().await?;
        self.click_xpath(&locator.xpath()).await?;

        let popup = match tokio::time::timeout(timeout, self.wait_for_popup(&known)).await {
            Ok(popup) => popup?,
            Err(_) => {
                self.close_late_popups(&known).await;
                return Err(NavError::timeout("detail view", timeout));
            }
        };
        if let Err(e) = settle(&popup, timeout).await {
            let _ = popup.close().await;
            return Err(e);
        }
        Ok(ChromeDetail { page: popup })
    }

    async fn close_detail_view(&mut self, detail: ChromeDetail) -> Result<(), NavError> {
        detail.page.close().await?;
        Ok(())
    }

    async fn reload(&mut self, timeout: Duration) -> Result<(), NavError> {
        let started = Instant::now();
        tokio::time::timeout(timeout, self.page.reload())
            .await
            .map_err(|_| NavError::timeout("reload", timeout))??;
        let remaining = timeout.saturating_sub(started.elapsed());
        settle(&self.page, remaining).await
    }
}

pub struct ChromeDetail {
    page: Page,
}

#[async_trait]
impl DetailView for ChromeDetail {
    async fn read_text(&self, field: DetailField) -> Result<String, NavError> {
        let element = find_element(&self.page, &field.xpath()).await?;
        let text = element.inner_text().await?.unwrap_or_default();
        Ok(text.trim().to_string())
    }
}

// ── Helpers ──

async fn accept_dialogs(page: &Page) -> Result<JoinHandle<()>, NavError> {
    let mut opened = page.event_listener::<EventJavascriptDialogOpening>().await?;
    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = opened.next().await {
            debug!("Accepting dialog: {}", event.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                warn!("Failed to accept dialog: {}", e);
            }
        }
    }))
}

async fn count_xpath(page: &Page, xpath: &str) -> Result<usize, NavError> {
    let js = format!(
        "document.evaluate({}, document, null, XPathResult.NUMBER_TYPE, null).numberValue",
        js_string(&format!("count({})", xpath))
    );
    let n: f64 = evaluate(page, js).await?;
    Ok(n as usize)
}

/// First element matching `xpath`. Only an empty match is `NotFound`; a
/// failing devtools call keeps its own error.
async fn find_element(page: &Page, xpath: &str) -> Result<Element, NavError> {
    require_match(count_xpath(page, xpath).await?, xpath)?;
    page.find_xpaths(xpath)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| NavError::NotFound(xpath.to_string()))
}

fn require_match(matches: usize, xpath: &str) -> Result<(), NavError> {
    if matches == 0 {
        return Err(NavError::NotFound(xpath.to_string()));
    }
    Ok(())
}

/// Items whose target was not in the `known` snapshot, in their original order.
fn unseen<T>(known: &HashSet<TargetId>, items: Vec<T>, id: impl Fn(&T) -> &TargetId) -> Vec<T> {
    items.into_iter().filter(|item| !known.contains(id(item))).collect()
}

/// Wait until the document has loaded and no new resources were fetched for
/// `QUIET_WINDOW`.
async fn settle(page: &Page, timeout: Duration) -> Result<(), NavError> {
    let wait = async {
        let mut last: Option<u64> = None;
        let mut quiet_since = Instant::now();
        loop {
            // Probes fail while a navigation swaps the execution context.
            if let Ok(probe) = evaluate::<LoadProbe>(page, PROBE_JS.to_string()).await {
                if probe.ready == "complete" && last == Some(probe.resources) {
                    if quiet_since.elapsed() >= QUIET_WINDOW {
                        return;
                    }
                } else {
                    last = (probe.ready == "complete").then_some(probe.resources);
                    quiet_since = Instant::now();
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| NavError::timeout("page to settle", timeout))
}

/// Evaluate an expression and decode its JSON-serialised result.
async fn evaluate<T: serde::de::DeserializeOwned>(page: &Page, js: String) -> Result<T, NavError> {
    let raw: String = page
        .evaluate(format!("JSON.stringify({})", js))
        .await?
        .into_value()
        .map_err(|e| NavError::Script(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| NavError::Script(e.to_string()))
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
