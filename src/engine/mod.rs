//! Step-level operations over the resolution and interaction engine
//!
//! Every operation resolves data references in all of its inputs, runs the
//! interaction, and emits a pass/fail report event. Failures abort the
//! current step and propagate with enough context to reproduce; nothing is
//! silently swallowed here except cosmetic highlight trouble.

pub mod calendar;
pub mod controls;
pub mod finder;

pub use calendar::{CalendarNavigator, CalendarTarget};
pub use controls::{ControlDriver, ControlKind};
pub use finder::{ControlHandle, Finder};

use crate::config::RunConfig;
use crate::context::TestCaseContext;
use crate::data::{DataResolver, DataStore};
use crate::driver::common::{wait_until, PollConfig};
use crate::driver::{BrowserSession, Locator};
use crate::report::Reporter;
use crate::repository::ObjectRepository;
use anyhow::{bail, Result};
use std::sync::Arc;

/// Overlay/spinner shapes that can intercept a click while fading out.
const OVERLAY_SELECTORS: &str =
    ".loading, .overlay, .spinner, [class*='loading'], [class*='overlay']";

/// One scenario's engine: a browser session, the loaded repository and data
/// sheets, and the execution-scoped test-case context.
pub struct Engine {
    session: Arc<dyn BrowserSession>,
    config: RunConfig,
    context: TestCaseContext,
    reporter: Reporter,
    resolver: DataResolver,
    finder: Finder,
    controls: ControlDriver,
    calendar: CalendarNavigator,
}

impl Engine {
    pub fn new(
        session: Arc<dyn BrowserSession>,
        repository: Arc<ObjectRepository>,
        store: Arc<DataStore>,
        config: RunConfig,
    ) -> Self {
        let context = TestCaseContext::new();
        let resolver = DataResolver::new(store, context.clone());
        let finder = Finder::new(session.clone(), repository, resolver.clone());
        let controls = ControlDriver::new(session.clone());
        let calendar = CalendarNavigator::new(session.clone(), config.calendar_max_attempts);
        Self {
            session,
            config,
            context,
            reporter: Reporter::new(),
            resolver,
            finder,
            controls,
            calendar,
        }
    }

    /// The execution-scoped test-case context; `set` at scenario start and
    /// `clear` at scenario end (or use [`TestCaseContext::enter_scenario`]).
    pub fn context(&self) -> &TestCaseContext {
        &self.context
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Resolve (page, element) to a live control with the default timeout.
    pub async fn find(&self, page: &str, element: &str) -> Result<ControlHandle> {
        self.finder
            .find(page, element, self.config.default_timeout_ms)
            .await
    }

    /// Navigate to a URL. The target may be a data reference; relative
    /// targets are joined with the configured base URL.
    pub async fn navigate_to(&self, url: &str) -> Result<()> {
        let step = "Navigate to URL";
        let result = async {
            let resolved = self.resolver.resolve(url)?;
            let full = self.config.full_url(&resolved);
            log::info!("Navigating to URL: {} (resolved from: {})", full, url);
            self.session.goto(&full).await?;
            Ok(full)
        }
        .await;

        match result {
            Ok(full) => {
                self.reporter
                    .log_pass(step, format!("Successfully navigated to: {}", full));
                Ok(())
            }
            Err(e) => {
                self.reporter
                    .log_fail(step, format!("Failed to navigate to: {} - {}", url, e));
                Err(e)
            }
        }
    }

    /// Clear a field and type text into it.
    pub async fn enter_text(&self, text: &str, element: &str, page: &str) -> Result<()> {
        let step = "Enter text";
        let result = async {
            let resolved = self.resolver.resolve(text)?;
            let handle = self.find(page, element).await?;
            log::info!(
                "Entering text '{}' into field: {} on {} page",
                resolved,
                handle.element,
                handle.page
            );
            self.controls.set_text(handle.node, &resolved).await?;
            Ok((resolved, handle))
        }
        .await;

        match result {
            Ok((resolved, handle)) => {
                self.reporter.log_pass(
                    step,
                    format!("Text '{}' entered in {} field", resolved, handle.element),
                );
                Ok(())
            }
            Err(e) => {
                self.reporter.log_fail(step, format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Click an element, guarding against overlays and mid-fade spinners.
    pub async fn click_on(&self, element: &str, page: &str) -> Result<()> {
        let step = "Click element";
        let result = async {
            let handle = self.find(page, element).await?;

            if let Err(e) = self.session.scroll_into_view(handle.node).await {
                log::debug!("Scroll into view failed: {}", e);
            }
            self.wait_clickable(&handle).await?;
            self.wait_for_overlays_to_clear().await?;

            if let Err(e) = self.session.highlight(handle.node).await {
                log::debug!("Error highlighting element: {}", e);
            }
            self.session.click(handle.node).await?;
            log::info!(
                "Successfully clicked element: {} on {} page",
                handle.element,
                handle.page
            );
            Ok(handle)
        }
        .await;

        match result {
            Ok(handle) => {
                self.reporter.log_pass(
                    step,
                    format!("Clicked on: {} on {} page", handle.element, handle.page),
                );
                Ok(())
            }
            Err(e) => {
                self.reporter.log_fail(step, format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Current value of a field: live value for inputs, visible text otherwise.
    pub async fn read_value(&self, element: &str, page: &str) -> Result<String> {
        let handle = self.find(page, element).await?;
        self.controls.read_value(handle.node).await
    }

    /// Fail unless the element is present and becomes displayed.
    pub async fn verify_visible(&self, element: &str, page: &str) -> Result<()> {
        let step = "Verify element visibility";
        let result = async {
            let handle = self.find(page, element).await?;
            let session = self.session.clone();
            let node = handle.node;
            let displayed = wait_until(
                move || {
                    let session = session.clone();
                    async move { session.is_displayed(node).await }
                },
                PollConfig::with_timeout(self.config.default_timeout_ms),
            )
            .await?;
            if !displayed {
                bail!(
                    "Element {} on {} page was found but never became visible",
                    handle.element,
                    handle.page
                );
            }
            Ok(handle)
        }
        .await;

        match result {
            Ok(handle) => {
                self.reporter.log_pass(
                    step,
                    format!(
                        "Element '{}' on page '{}' is visible",
                        handle.element, handle.page
                    ),
                );
                Ok(())
            }
            Err(e) => {
                self.reporter.log_fail(step, format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Non-failing visibility probe.
    pub async fn is_visible(&self, element: &str, page: &str) -> bool {
        match self.find(page, element).await {
            Ok(handle) => self.session.is_displayed(handle.node).await.unwrap_or(false),
            Err(e) => {
                log::debug!("Element {} on {} page is not visible: {}", element, page, e);
                false
            }
        }
    }

    /// Fail unless the element's text contains the expected fragment.
    pub async fn verify_text_contains(
        &self,
        element: &str,
        page: &str,
        expected: &str,
    ) -> Result<()> {
        let step = "Verify element text";
        let result = async {
            let expected = self.resolver.resolve(expected)?;
            let handle = self.find(page, element).await?;
            let actual = self.session.text(handle.node).await?;
            if !actual.contains(&expected) {
                bail!(
                    "Element text mismatch. Expected to contain: '{}', Actual: '{}'",
                    expected,
                    actual
                );
            }
            Ok((handle, expected))
        }
        .await;

        match result {
            Ok((handle, expected)) => {
                self.reporter.log_pass(
                    step,
                    format!("Element {} contains text: {}", handle.element, expected),
                );
                Ok(())
            }
            Err(e) => {
                self.reporter.log_fail(step, format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Poll until the page title contains the expected fragment.
    pub async fn verify_title_contains(&self, expected: &str) -> Result<()> {
        let step = "Verify page title";
        let expected = self.resolver.resolve(expected)?;
        log::info!("Verifying page title contains: {}", expected);

        let session = self.session.clone();
        let wanted = expected.clone();
        let matched = wait_until(
            move || {
                let session = session.clone();
                let wanted = wanted.clone();
                async move { Ok(session.title().await?.contains(&wanted)) }
            },
            PollConfig::with_timeout(self.config.title_timeout_ms),
        )
        .await?;

        if matched {
            let actual = self.session.title().await?;
            self.reporter.log_pass(
                step,
                format!("Title matches: '{}' contains '{}'", actual, expected),
            );
            Ok(())
        } else {
            let actual = self.session.title().await.unwrap_or_default();
            self.reporter.log_fail(
                step,
                format!("Title mismatch. Expected: '{}', Actual: '{}'", expected, actual),
            );
            bail!(
                "Page title verification failed. Expected: {}, Actual: {}",
                expected,
                actual
            );
        }
    }

    /// Select one or more comma-separated values from a list control of any
    /// family. The whole list may itself be a data reference.
    pub async fn select_values(&self, values: &str, element: &str, page: &str) -> Result<()> {
        let step = "Multi-select dropdown";
        let result = async {
            let resolved = self.resolver.resolve(values)?;
            let list: Vec<String> = resolved
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if list.is_empty() {
                bail!("No values provided for selection");
            }

            let handle = self.find(page, element).await?;
            log::info!(
                "Selecting values {:?} from {} on {} page",
                list,
                handle.element,
                handle.page
            );
            self.controls.select_values(handle.node, &list).await?;
            Ok((handle, list))
        }
        .await;

        match result {
            Ok((handle, list)) => {
                self.reporter.log_pass(
                    step,
                    format!(
                        "Successfully selected {} values from dropdown: {}",
                        list.len(),
                        handle.element
                    ),
                );
                Ok(())
            }
            Err(e) => {
                self.reporter.log_fail(step, format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Drive a toggle to "ON" or "OFF" (anything other than "ON" means OFF).
    pub async fn set_toggle(&self, element: &str, page: &str, state: &str) -> Result<()> {
        let step = "Toggle state change";
        let result = async {
            let state = self.resolver.resolve(state)?;
            let desired = state.eq_ignore_ascii_case("on");
            let handle = self.find(page, element).await?;
            self.controls.set_toggle(handle.node, desired).await?;
            Ok((handle, state))
        }
        .await;

        match result {
            Ok((handle, state)) => {
                self.reporter.log_pass(
                    step,
                    format!("Set '{}' toggle to {}", handle.element, state),
                );
                Ok(())
            }
            Err(e) => {
                self.reporter.log_fail(step, format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Select a `DD/MM/YYYY` date in a date-picker field.
    pub async fn select_date(&self, date: &str, element: &str, page: &str) -> Result<()> {
        let step = "Select date";
        let result = async {
            let resolved = self.resolver.resolve(date)?;
            let target = CalendarTarget::parse(&resolved)?;
            log::info!(
                "Selecting date {}/{}/{} in picker {} on {} page",
                target.day,
                target.month,
                target.year,
                element,
                page
            );

            let handle = self.find(page, element).await?;
            if let Err(e) = self.session.scroll_into_view(handle.node).await {
                log::debug!("Scroll into view failed: {}", e);
            }
            self.wait_clickable(&handle).await?;
            self.calendar.select(handle.node, &target).await?;
            Ok((handle, resolved))
        }
        .await;

        match result {
            Ok((handle, resolved)) => {
                self.reporter.log_pass(
                    step,
                    format!("Date '{}' selected in {} date picker", resolved, handle.element),
                );
                Ok(())
            }
            Err(e) => {
                self.reporter.log_fail(step, format!("Error: {}", e));
                Err(e)
            }
        }
    }

    async fn wait_clickable(&self, handle: &ControlHandle) -> Result<()> {
        let session = self.session.clone();
        let node = handle.node;
        let clickable = wait_until(
            move || {
                let session = session.clone();
                async move {
                    Ok(session.is_displayed(node).await? && session.is_enabled(node).await?)
                }
            },
            PollConfig::with_timeout(self.config.default_timeout_ms),
        )
        .await?;

        if !clickable {
            bail!(
                "Element {} on {} page did not become clickable within {}ms",
                handle.element,
                handle.page,
                self.config.default_timeout_ms
            );
        }
        Ok(())
    }

    /// Wait for known overlay/spinner shapes to clear before a click. An
    /// overlay that never clears is logged and tolerated; the click itself
    /// will surface the real failure if one is still intercepting.
    async fn wait_for_overlays_to_clear(&self) -> Result<()> {
        let overlays = self
            .session
            .query(&Locator::css(OVERLAY_SELECTORS))
            .await?;
        if overlays.is_empty() {
            return Ok(());
        }

        log::info!("Found potential overlay elements, waiting for them to disappear");
        let session = self.session.clone();
        let cleared = wait_until(
            move || {
                let session = session.clone();
                async move {
                    for node in session.query(&Locator::css(OVERLAY_SELECTORS)).await? {
                        if session.is_displayed(node).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
            },
            PollConfig::with_timeout(self.config.overlay_timeout_ms),
        )
        .await?;

        if !cleared {
            log::warn!("Overlay elements still visible after wait; attempting click anyway");
        }
        Ok(())
    }
}
