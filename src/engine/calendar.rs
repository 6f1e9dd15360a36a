//! Date-picker navigation
//!
//! Date pickers have no standard markup, so the navigator is deliberately
//! heuristic and bounded: it reads whatever header-ish element carries a
//! year, steps month by month through next/previous controls, and gives up
//! after a fixed number of attempts rather than risking an unbounded walk.

use crate::driver::common::{wait_until, PollConfig};
use crate::driver::{BrowserSession, Locator, NodeId};
use crate::error::EngineError;
use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap())
}

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{4}").unwrap())
}

/// A validated calendar target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTarget {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl CalendarTarget {
    /// Parse a `DD/MM/YYYY` date string, validating ranges up front so a
    /// malformed date fails before any browser interaction.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let captures = date_pattern().captures(input).ok_or_else(|| {
            EngineError::InvalidDate {
                input: input.to_string(),
                reason: "expected DD/MM/YYYY".to_string(),
            }
        })?;

        let day: u32 = captures[1].parse().unwrap();
        let month: u32 = captures[2].parse().unwrap();
        let year: i32 = captures[3].parse().unwrap();

        if !(1..=31).contains(&day) {
            return Err(EngineError::InvalidDate {
                input: input.to_string(),
                reason: format!("day {} out of range 1..=31", day),
            }
            .into());
        }
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidDate {
                input: input.to_string(),
                reason: format!("month {} out of range 1..=12", month),
            }
            .into());
        }
        if !(1900..=2100).contains(&year) {
            return Err(EngineError::InvalidDate {
                input: input.to_string(),
                reason: format!("year {} out of range 1900..=2100", year),
            }
            .into());
        }

        Ok(Self { day, month, year })
    }

    fn month_name(&self) -> Option<&'static str> {
        chrono::Month::try_from(self.month as u8).ok().map(|m| m.name())
    }
}

/// Ordered selector lists for the navigator's heuristics.
#[derive(Clone)]
pub struct CalendarHeuristics {
    pub header_selectors: &'static str,
    pub next_selectors: &'static str,
    pub prev_selectors: &'static str,
    /// Tags searched for a day cell by exact text.
    pub day_cell_selectors: &'static str,
    /// Class tokens excluding a day cell from selection.
    pub inactive_tokens: Vec<&'static str>,
}

impl Default for CalendarHeuristics {
    fn default() -> Self {
        Self {
            header_selectors: ".datepicker-switch, .ui-datepicker-title, \
                 .react-datepicker__current-month, [class*='month'], [class*='year'], \
                 [class*='header'], [class*='title']",
            next_selectors: ".next, .datepicker-next, .ui-datepicker-next, \
                 .react-datepicker__navigation--next, [class*='next'], [title*='next'], \
                 [aria-label*='next']",
            prev_selectors: ".prev, .datepicker-prev, .ui-datepicker-prev, \
                 .react-datepicker__navigation--previous, [class*='prev'], [title*='prev'], \
                 [aria-label*='prev']",
            day_cell_selectors: "td, div, span, button",
            inactive_tokens: vec!["disabled", "inactive", "other-month"],
        }
    }
}

/// Navigation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavState {
    Closed,
    Searching,
    Found,
    Failed,
}

pub struct CalendarNavigator {
    session: Arc<dyn BrowserSession>,
    heuristics: CalendarHeuristics,
    max_attempts: u32,
    settle_ms: u64,
}

impl CalendarNavigator {
    pub fn new(session: Arc<dyn BrowserSession>, max_attempts: u32) -> Self {
        Self {
            session,
            heuristics: CalendarHeuristics::default(),
            max_attempts,
            settle_ms: 500,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_settle(mut self, settle_ms: u64) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Open the picker attached to `field` and drive the calendar to the
    /// target date.
    pub async fn select(&self, field: NodeId, target: &CalendarTarget) -> Result<()> {
        let mut state = NavState::Closed;
        loop {
            state = match state {
                NavState::Closed => {
                    self.open(field).await?;
                    NavState::Searching
                }
                NavState::Searching => {
                    if self.search(target).await? {
                        NavState::Found
                    } else {
                        NavState::Failed
                    }
                }
                NavState::Found => {
                    self.click_day(target.day).await?;
                    return Ok(());
                }
                NavState::Failed => {
                    return Err(EngineError::NavigationTimeout {
                        month: target.month,
                        year: target.year,
                        attempts: self.max_attempts,
                    }
                    .into());
                }
            };
        }
    }

    /// Click the host field and wait for a calendar header to appear, which
    /// is the observable "picker is open" condition.
    pub async fn open(&self, field: NodeId) -> Result<()> {
        self.session.click(field).await?;
        log::info!("Clicked date picker field, waiting for calendar to open");

        let session = self.session.clone();
        let heuristics = self.heuristics.clone();
        let opened = wait_until(
            move || {
                let session = session.clone();
                let heuristics = heuristics.clone();
                async move {
                    Ok(read_header(session.as_ref(), &heuristics).await?.is_some())
                }
            },
            PollConfig::with_timeout(3000),
        )
        .await?;

        if !opened {
            log::warn!("No calendar header appeared after opening the picker field");
        }
        Ok(())
    }

    /// Navigate until the header encodes the target, bounded by
    /// `max_attempts`. Public for direct use on an already-open picker.
    pub async fn navigate(&self, target: &CalendarTarget) -> Result<()> {
        if self.search(target).await? {
            Ok(())
        } else {
            Err(EngineError::NavigationTimeout {
                month: target.month,
                year: target.year,
                attempts: self.max_attempts,
            }
            .into())
        }
    }

    async fn search(&self, target: &CalendarTarget) -> Result<bool> {
        for attempt in 0..self.max_attempts {
            let header = read_header(self.session.as_ref(), &self.heuristics).await?;
            log::debug!("Calendar header text being checked: {:?}", header);

            if let Some(ref header) = header {
                if self.matches_target(header, target) {
                    log::info!("Reached target month/year: {}/{}", target.month, target.year);
                    return Ok(true);
                }
            }

            if !self.step(header.as_deref()).await? {
                log::warn!("No calendar navigation controls found");
                return Ok(false);
            }
            log::debug!("Navigation attempt {} complete", attempt + 1);
        }
        Ok(false)
    }

    /// Header matches when it carries the target year. Month matching is
    /// best-effort: a recognizable month name that contradicts the target
    /// keeps the search going, an unrecognizable format does not.
    fn matches_target(&self, header: &str, target: &CalendarTarget) -> bool {
        let header = header.to_lowercase();
        if !header.contains(&target.year.to_string()) {
            return false;
        }
        let shown_month = (1..=12u32).find(|&m| {
            chrono::Month::try_from(m as u8)
                .map(|name| header.contains(&name.name().to_lowercase()[..3]))
                .unwrap_or(false)
        });
        match (shown_month, target.month_name()) {
            (Some(shown), Some(_)) => shown == target.month,
            _ => true,
        }
    }

    /// Click a next control if one is present and displayed, else a
    /// previous control; then wait for the header to change (the observable
    /// effect of a navigation step). Returns false when neither control
    /// exists.
    async fn step(&self, header_before: Option<&str>) -> Result<bool> {
        let nav = match self.first_displayed(self.heuristics.next_selectors).await? {
            Some(next) => {
                log::debug!("Clicked next navigation button");
                Some(next)
            }
            None => {
                let prev = self.first_displayed(self.heuristics.prev_selectors).await?;
                if prev.is_some() {
                    log::debug!("Clicked previous navigation button");
                }
                prev
            }
        };

        let Some(control) = nav else {
            return Ok(false);
        };
        self.session.click(control).await?;

        if let Some(before) = header_before {
            let before = before.to_string();
            let session = self.session.clone();
            let heuristics = self.heuristics.clone();
            let _ = wait_until(
                move || {
                    let session = session.clone();
                    let heuristics = heuristics.clone();
                    let before = before.clone();
                    async move {
                        Ok(read_header(session.as_ref(), &heuristics).await?.as_deref()
                            != Some(before.as_str()))
                    }
                },
                PollConfig {
                    timeout_ms: self.settle_ms,
                    initial_interval_ms: 50,
                    max_interval_ms: 100,
                    use_exponential_backoff: true,
                },
            )
            .await?;
        }
        Ok(true)
    }

    async fn first_displayed(&self, selectors: &str) -> Result<Option<NodeId>> {
        for node in self.session.query(&Locator::css(selectors)).await? {
            if self.session.is_displayed(node).await? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Click a day cell. Candidates come from a cascade of shapes; among
    /// matches the first that is displayed, enabled and not marked
    /// disabled/inactive/other-month wins.
    pub async fn click_day(&self, day: u32) -> Result<()> {
        let day_text = day.to_string();
        let mut candidates = Vec::new();

        for node in self
            .session
            .query(&Locator::css(self.heuristics.day_cell_selectors))
            .await?
        {
            if self.session.text(node).await?.trim() == day_text {
                candidates.push(node);
            }
        }
        candidates.extend(
            self.session
                .query(&Locator::css(format!("[data-day='{}']", day_text)))
                .await?,
        );
        for node in self.session.query(&Locator::css("[class*='day']")).await? {
            if self.session.text(node).await?.trim() == day_text && !candidates.contains(&node) {
                candidates.push(node);
            }
        }

        if candidates.is_empty() {
            return Err(EngineError::ValueSelection {
                value: day_text,
                reason: "no day cell matched in the calendar".to_string(),
            }
            .into());
        }

        for candidate in candidates {
            if !self.session.is_displayed(candidate).await?
                || !self.session.is_enabled(candidate).await?
            {
                continue;
            }
            let class = self
                .session
                .attribute(candidate, "class")
                .await?
                .unwrap_or_default();
            if self
                .heuristics
                .inactive_tokens
                .iter()
                .any(|token| class.contains(token))
            {
                continue;
            }

            if let Err(e) = self.session.highlight(candidate).await {
                log::debug!("Error highlighting element: {}", e);
            }
            self.session.click(candidate).await?;
            log::info!("Successfully clicked on day: {}", day);
            return Ok(());
        }

        Err(EngineError::ValueSelection {
            value: day_text,
            reason: "day cells matched but none were clickable".to_string(),
        }
        .into())
    }
}

async fn read_header(
    session: &dyn BrowserSession,
    heuristics: &CalendarHeuristics,
) -> Result<Option<String>> {
    for node in session
        .query(&Locator::css(heuristics.header_selectors))
        .await?
    {
        if !session.is_displayed(node).await? {
            continue;
        }
        let text = session.text(node).await?.trim().to_lowercase();
        if year_pattern().is_match(&text) {
            return Ok(Some(text));
        }
    }
    Ok(None)
}
