//! Control classification and interaction protocols
//!
//! A located control's implementation family is unknown a priori: the same
//! logical "dropdown" may be a native `<select>`, a framework widget, or a
//! pile of divs. The classifier decides the family once, producing a closed
//! [`ControlKind`]; every interaction then dispatches over that variant
//! instead of re-inspecting attributes at each call site.
//!
//! The widget conventions the driver speaks (trigger shapes, option shapes,
//! open-list probes, toggle class tokens) are ordered heuristic lists held
//! as data on [`ControlHeuristics`], evaluated left to right with early
//! exit, so a new convention is a list entry rather than a control-flow
//! change.

use crate::driver::common::{wait_until, PollConfig};
use crate::driver::{BrowserSession, Locator, NodeId};
use crate::error::EngineError;
use anyhow::Result;
use std::sync::Arc;

/// Interaction family of a control, decided once per interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// Native `<select>`; multi-select only if the control declares it.
    NativeList { multiple: bool },
    /// Checkbox or class/attribute-based on-off switch.
    Toggle,
    /// Dropdown-like widget with no native semantics, driven heuristically.
    CustomList,
    /// Plain text entry (the default family).
    TextField,
}

/// How one option-shape heuristic locates a candidate option.
#[derive(Debug, Clone)]
pub enum OptionShape {
    /// Query `selector`, match on exact trimmed visible text.
    ByText(&'static str),
    /// Query `[attribute='<value>']` directly.
    ByAttribute(&'static str),
}

/// Ordered heuristic lists for classification and interaction.
#[derive(Clone)]
pub struct ControlHeuristics {
    /// Class tokens that mark a toggle (and, when present, its ON state).
    pub toggle_class_tokens: Vec<&'static str>,
    /// Expansion trigger candidates inside a custom list, in priority order.
    /// The control itself is always tried first.
    pub trigger_selectors: Vec<&'static str>,
    /// Option shapes, in priority order.
    pub option_shapes: Vec<OptionShape>,
    /// Probes that decide whether a custom list is currently open:
    /// (selector, required class token, forbidden class token).
    pub open_list_probes: Vec<(&'static str, Option<&'static str>, Option<&'static str>)>,
}

impl Default for ControlHeuristics {
    fn default() -> Self {
        Self {
            toggle_class_tokens: vec!["active", "on", "checked", "enabled"],
            trigger_selectors: vec![
                "button",
                "[class*='dropdown-toggle']",
                "[class*='select']",
                "[class*='arrow']",
                "[class*='trigger']",
                "[class*='control']",
            ],
            option_shapes: vec![
                OptionShape::ByText("option"),
                OptionShape::ByText("li"),
                OptionShape::ByText("div[class*='option']"),
                OptionShape::ByText("span[class*='option']"),
                OptionShape::ByAttribute("data-value"),
                OptionShape::ByText("[class*='dropdown-item']"),
                OptionShape::ByText("mat-option"),
                OptionShape::ByText("[class*='select-option']"),
                OptionShape::ByText("a"),
            ],
            open_list_probes: vec![
                ("[class*='dropdown-menu']", Some("show"), None),
                ("ul[class*='dropdown-menu']", None, Some("hidden")),
                ("[class*='select-dropdown']", Some("open"), None),
                ("[class*='options']", None, None),
            ],
        }
    }
}

/// Executes semantically-named operations against controls of any family.
pub struct ControlDriver {
    session: Arc<dyn BrowserSession>,
    heuristics: ControlHeuristics,
}

impl ControlDriver {
    pub fn new(session: Arc<dyn BrowserSession>) -> Self {
        Self {
            session,
            heuristics: ControlHeuristics::default(),
        }
    }

    pub fn with_heuristics(session: Arc<dyn BrowserSession>, heuristics: ControlHeuristics) -> Self {
        Self { session, heuristics }
    }

    /// Classify a control. Rules are evaluated in order; first match wins.
    pub async fn classify(&self, node: NodeId) -> Result<ControlKind> {
        let tag = self.session.tag_name(node).await?;

        if tag == "select" {
            let multiple = self.session.attribute(node, "multiple").await?.is_some();
            return Ok(ControlKind::NativeList { multiple });
        }

        if self.has_toggle_markers(node).await? {
            return Ok(ControlKind::Toggle);
        }

        if self.find_visible_trigger(node).await?.is_some() {
            return Ok(ControlKind::CustomList);
        }

        Ok(ControlKind::TextField)
    }

    async fn has_toggle_markers(&self, node: NodeId) -> Result<bool> {
        if self.session.attribute(node, "type").await?.as_deref() == Some("checkbox") {
            return Ok(true);
        }
        if self.session.attribute(node, "aria-checked").await?.is_some() {
            return Ok(true);
        }
        if let Some(value) = self.session.attribute(node, "value").await? {
            let value = value.to_lowercase();
            if value == "on" || value == "true" {
                return Ok(true);
            }
        }
        if let Some(class) = self.session.attribute(node, "class").await? {
            if self
                .heuristics
                .toggle_class_tokens
                .iter()
                .any(|token| class.split_whitespace().any(|t| t == *token))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// First displayed expansion trigger for a custom list: the control
    /// itself if it is clickable-looking, else trigger-like descendants in
    /// priority order.
    async fn find_visible_trigger(&self, node: NodeId) -> Result<Option<NodeId>> {
        for selector in &self.heuristics.trigger_selectors {
            let candidates = self
                .session
                .query_within(node, &Locator::css(*selector))
                .await?;
            for candidate in candidates {
                if self.session.is_displayed(candidate).await? {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Text fields
    // ------------------------------------------------------------------

    /// Clear the field (select-all + delete, which JS-managed inputs cannot
    /// ignore), type the text, then dispatch synthetic input/change events
    /// for frameworks that only observe the value through them.
    pub async fn set_text(&self, node: NodeId, text: &str) -> Result<()> {
        log::debug!(
            "set_text on <{}> (current value: {:?})",
            self.session.tag_name(node).await?,
            self.session.text(node).await?
        );

        self.cosmetic_highlight(node).await;
        self.session.clear_text(node).await?;
        self.session.type_text(node, text).await?;
        self.session.dispatch_input_events(node).await?;
        Ok(())
    }

    /// Current value of a field: the live value for inputs and textareas,
    /// the visible text for anything acting like a field.
    pub async fn read_value(&self, node: NodeId) -> Result<String> {
        Ok(self.session.text(node).await?.trim().to_string())
    }

    // ------------------------------------------------------------------
    // Toggles
    // ------------------------------------------------------------------

    /// Whether a toggle is ON. Signals checked in order; the first
    /// determinable one decides.
    pub async fn is_toggle_on(&self, node: NodeId) -> Result<bool> {
        // Native checkboxes have an explicit state; it decides either way.
        if self.session.attribute(node, "type").await?.as_deref() == Some("checkbox") {
            return self.session.is_checked(node).await;
        }

        if self.session.attribute(node, "aria-checked").await?.as_deref() == Some("true") {
            return Ok(true);
        }

        if let Some(checked) = self.session.attribute(node, "checked").await? {
            if !checked.is_empty() && checked != "false" {
                return Ok(true);
            }
        }

        if let Some(value) = self.session.attribute(node, "value").await? {
            let value = value.to_lowercase();
            if value == "on" || value == "true" {
                return Ok(true);
            }
        }

        if let Some(class) = self.session.attribute(node, "class").await? {
            if self
                .heuristics
                .toggle_class_tokens
                .iter()
                .any(|token| class.split_whitespace().any(|t| t == *token))
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Drive a toggle to the desired state.
    ///
    /// A no-op when the state already matches (verified before any click).
    /// Otherwise clicks once and re-reads; not reaching the desired state
    /// after that one click is a hard failure so an oscillating control
    /// surfaces as a failure instead of being hidden by blind retries.
    pub async fn set_toggle(&self, node: NodeId, desired: bool) -> Result<()> {
        let current = self.is_toggle_on(node).await?;
        if current == desired {
            log::info!(
                "Toggle already in desired state: {}",
                if desired { "ON" } else { "OFF" }
            );
            return Ok(());
        }

        self.cosmetic_highlight(node).await;
        self.session.click(node).await?;

        // The state is observable, so wait on it instead of a fixed pause.
        let session = self.session.clone();
        let heuristics = self.heuristics.clone();
        let reached = wait_until(
            move || {
                let driver = ControlDriver::with_heuristics(session.clone(), heuristics.clone());
                async move { Ok(driver.is_toggle_on(node).await? == desired) }
            },
            PollConfig::with_timeout(2000),
        )
        .await?;

        if !reached {
            return Err(EngineError::ToggleState { desired }.into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    /// Select `values`, in order, on a list control of either family.
    ///
    /// All requested values are located before anything is clicked, so a
    /// missing value fails the whole operation with no partial selection
    /// left dangling.
    pub async fn select_values(&self, node: NodeId, values: &[String]) -> Result<()> {
        match self.classify(node).await? {
            ControlKind::NativeList { multiple } => {
                self.select_native(node, values, multiple).await
            }
            _ => self.select_custom(node, values).await,
        }
    }

    async fn select_native(&self, node: NodeId, values: &[String], multiple: bool) -> Result<()> {
        if !multiple && values.len() > 1 {
            log::warn!(
                "Select element does not support multiple selection; later selections replace earlier ones"
            );
        }

        let options = self.session.query_within(node, &Locator::css("option")).await?;

        // Resolve every requested value to an option before clicking any:
        // exact visible text first, underlying value token as fallback.
        let mut picked = Vec::with_capacity(values.len());
        for value in values {
            let mut found = None;
            for &option in &options {
                if self.session.text(option).await?.trim() == value {
                    found = Some(option);
                    break;
                }
            }
            if found.is_none() {
                for &option in &options {
                    if self.session.attribute(option, "value").await?.as_deref() == Some(value) {
                        found = Some(option);
                        break;
                    }
                }
            }
            match found {
                Some(option) => picked.push((value, option)),
                None => {
                    return Err(EngineError::ValueSelection {
                        value: value.clone(),
                        reason: "no option matched by visible text or value attribute".to_string(),
                    }
                    .into())
                }
            }
        }

        for (value, option) in picked {
            self.session.click(option).await?;
            log::info!("Selected native option: {}", value);
        }
        Ok(())
    }

    async fn select_custom(&self, node: NodeId, values: &[String]) -> Result<()> {
        self.open_custom_list(node, values).await?;

        // Atomicity: every value must be locatable before the first click.
        for value in values {
            if self.find_option(value).await?.is_none() {
                return Err(EngineError::ValueSelection {
                    value: value.clone(),
                    reason: "no option matched by any heuristic".to_string(),
                }
                .into());
            }
        }

        for (i, value) in values.iter().enumerate() {
            // Re-locate: the list may have re-rendered after the last click.
            let option = self
                .find_option(value)
                .await?
                .ok_or_else(|| EngineError::ValueSelection {
                    value: value.clone(),
                    reason: "option disappeared before it could be clicked".to_string(),
                })?;
            self.session.click(option).await?;
            log::info!("Selected option: {}", value);

            // Some widgets close after each selection; reopen before the
            // next value if so.
            if i + 1 < values.len() && !self.is_list_open().await? {
                log::debug!("List closed after selection; reopening");
                self.open_custom_list(node, values).await?;
            }
        }
        Ok(())
    }

    /// Open a custom list by trying trigger candidates in priority order
    /// (the control itself first, then trigger-like descendants), accepting
    /// the first that produces an open list.
    async fn open_custom_list(&self, node: NodeId, values: &[String]) -> Result<()> {
        if self.is_list_open().await? {
            return Ok(());
        }

        let mut candidates = vec![node];
        for selector in &self.heuristics.trigger_selectors {
            for candidate in self
                .session
                .query_within(node, &Locator::css(*selector))
                .await?
            {
                if self.session.is_displayed(candidate).await? {
                    candidates.push(candidate);
                }
            }
        }

        for candidate in candidates {
            if self.session.click(candidate).await.is_err() {
                continue;
            }
            // Opening is observable through the open-list probes.
            let session = self.session.clone();
            let heuristics = self.heuristics.clone();
            let opened = wait_until(
                move || {
                    let driver =
                        ControlDriver::with_heuristics(session.clone(), heuristics.clone());
                    async move { driver.is_list_open().await }
                },
                PollConfig::with_timeout(1000),
            )
            .await?;
            if opened {
                return Ok(());
            }
        }

        Err(EngineError::ValueSelection {
            value: values.join(", "),
            reason: "could not open the list with any trigger candidate".to_string(),
        }
        .into())
    }

    /// Locate a displayed option matching `value`, via the option shapes in
    /// priority order.
    async fn find_option(&self, value: &str) -> Result<Option<NodeId>> {
        for shape in &self.heuristics.option_shapes {
            let candidates = match shape {
                OptionShape::ByText(selector) => {
                    self.session.query(&Locator::css(*selector)).await?
                }
                OptionShape::ByAttribute(attribute) => {
                    self.session
                        .query(&Locator::css(format!("[{}='{}']", attribute, value)))
                        .await?
                }
            };
            for candidate in candidates {
                if !self.session.is_displayed(candidate).await? {
                    continue;
                }
                let matched = match shape {
                    OptionShape::ByText(_) => self.session.text(candidate).await?.trim() == value,
                    OptionShape::ByAttribute(_) => true,
                };
                if matched {
                    return Ok(Some(candidate));
                }
            }
        }
        log::debug!("Option '{}' not found with any selector strategy", value);
        Ok(None)
    }

    /// Whether any open-list probe finds a displayed match.
    pub async fn is_list_open(&self) -> Result<bool> {
        for (selector, required, forbidden) in &self.heuristics.open_list_probes {
            for candidate in self.session.query(&Locator::css(*selector)).await? {
                let class = self
                    .session
                    .attribute(candidate, "class")
                    .await?
                    .unwrap_or_default();
                if required.is_some_and(|token| !class.contains(token)) {
                    continue;
                }
                if forbidden.is_some_and(|token| class.contains(token)) {
                    continue;
                }
                if self.session.is_displayed(candidate).await? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Highlight is cosmetic; failing to flash (or restore) a style must
    /// never fail the step.
    async fn cosmetic_highlight(&self, node: NodeId) {
        if let Err(e) = self.session.highlight(node).await {
            log::debug!("Error highlighting element: {}", e);
        }
    }
}
