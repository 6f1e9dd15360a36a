//! Web session implementation using Playwright
//!
//! Elements are addressed by their base selector plus an `nth=` position
//! rather than by retained element handles, so every operation re-resolves
//! against the current document. A page that re-renders a structurally
//! identical node between steps therefore keeps working instead of raising
//! a stale-handle failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use playwright::api::{Browser, BrowserContext, Page};
use playwright::Playwright;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::driver::traits::{BrowserSession, NodeId};
use crate::driver::Locator;

/// Browser engine to launch
#[derive(Debug, Clone, Copy, Default)]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

/// Web session configuration
#[derive(Debug, Clone)]
pub struct WebSessionConfig {
    pub browser: BrowserKind,
    pub headless: bool,
}

impl Default for WebSessionConfig {
    fn default() -> Self {
        let headless = std::env::var("PAGEFLOW_HEADLESS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);
        Self {
            browser: BrowserKind::Chromium,
            headless,
        }
    }
}

/// Playwright-backed [`BrowserSession`].
pub struct WebSession {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    #[allow(dead_code)]
    browser: Arc<Browser>,
    #[allow(dead_code)]
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    /// NodeId -> playwright selector address (`base >> nth=i`)
    addresses: std::sync::Mutex<HashMap<u64, String>>,
    next_id: AtomicU64,
}

impl WebSession {
    pub async fn launch(config: WebSessionConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser {
            BrowserKind::Chromium => {
                playwright
                    .chromium()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserKind::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserKind::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            addresses: std::sync::Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn register(&self, address: String) -> NodeId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.addresses.lock().unwrap().insert(id, address);
        NodeId(id)
    }

    fn address(&self, node: NodeId) -> Result<String> {
        self.addresses
            .lock()
            .unwrap()
            .get(&node.0)
            .cloned()
            .with_context(|| format!("Unknown element reference: {:?}", node))
    }

    fn locator_to_selector(locator: &Locator) -> String {
        match locator {
            Locator::Css(css) => css.clone(),
            Locator::XPath(xpath) => format!("xpath={}", xpath),
            Locator::Id(id) => format!("#{}", id),
            Locator::Name(name) => format!("[name=\"{}\"]", name),
            Locator::Tag(tag) => tag.clone(),
        }
    }

    async fn query_addressed(&self, base: &str) -> Result<Vec<NodeId>> {
        let page = self.page.lock().await;
        let matches = page.query_selector_all(base).await?;
        drop(page);

        Ok((0..matches.len())
            .map(|i| self.register(format!("{} >> nth={}", base, i)))
            .collect())
    }
}

#[async_trait]
impl BrowserSession for WebSession {
    async fn goto(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .context("Failed to navigate to URL")?;
        // Addresses are positions in the previous document; drop them.
        self.addresses.lock().unwrap().clear();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        let url: String = page.evaluate("() => window.location.href", ()).await?;
        Ok(url)
    }

    async fn title(&self) -> Result<String> {
        let page = self.page.lock().await;
        let title: String = page.evaluate("() => document.title", ()).await?;
        Ok(title)
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<NodeId>> {
        let base = Self::locator_to_selector(locator);
        self.query_addressed(&base).await
    }

    async fn query_within(&self, node: NodeId, locator: &Locator) -> Result<Vec<NodeId>> {
        let base = format!(
            "{} >> {}",
            self.address(node)?,
            Self::locator_to_selector(locator)
        );
        self.query_addressed(&base).await
    }

    async fn tag_name(&self, node: NodeId) -> Result<String> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        let tag = page
            .evaluate_on_selector::<String, _>(&addr, "el => el.tagName.toLowerCase()", None::<String>)
            .await?;
        Ok(tag)
    }

    async fn text(&self, node: NodeId) -> Result<String> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        let js = "el => el.value || el.innerText || el.textContent || ''";
        let text = page
            .evaluate_on_selector::<String, _>(&addr, js, None::<String>)
            .await?;
        Ok(text)
    }

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        let value = page
            .evaluate_on_selector::<String, Option<String>>(
                &addr,
                "(el, name) => el.getAttribute(name)",
                Some(name.to_string()),
            )
            .await?;
        Ok(value)
    }

    async fn is_displayed(&self, node: NodeId) -> Result<bool> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        match page.query_selector(&addr).await? {
            Some(el) => Ok(el.is_visible().await?),
            None => Ok(false),
        }
    }

    async fn is_enabled(&self, node: NodeId) -> Result<bool> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        let enabled = page
            .evaluate_on_selector::<String, bool>(&addr, "el => !(el.disabled === true)", None::<String>)
            .await?;
        Ok(enabled)
    }

    async fn is_checked(&self, node: NodeId) -> Result<bool> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        let checked = page
            .evaluate_on_selector::<String, bool>(&addr, "el => el.checked === true", None::<String>)
            .await?;
        Ok(checked)
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        page.click_builder(&addr)
            .click()
            .await
            .with_context(|| format!("Failed to click: {}", addr))?;
        Ok(())
    }

    async fn clear_text(&self, node: NodeId) -> Result<()> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;

        // Focus the field, then select-all + delete.
        page.click_builder(&addr).click().await?;
        page.keyboard.down("Control").await?;
        page.keyboard.down("a").await?;
        page.keyboard.up("a").await?;
        page.keyboard.up("Control").await?;
        page.keyboard.down("Delete").await?;
        page.keyboard.up("Delete").await?;
        Ok(())
    }

    async fn type_text(&self, node: NodeId, text: &str) -> Result<()> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        // Make sure keystrokes land in the target field.
        page.click_builder(&addr).click().await?;
        page.keyboard.input_text(text).await?;
        Ok(())
    }

    async fn dispatch_input_events(&self, node: NodeId) -> Result<()> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        let js = "el => { \
            el.dispatchEvent(new Event('input', { bubbles: true })); \
            el.dispatchEvent(new Event('change', { bubbles: true })); \
            return true; }";
        page.evaluate_on_selector::<String, bool>(&addr, js, None::<String>)
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<()> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        if let Some(el) = page.query_selector(&addr).await? {
            el.scroll_into_view_if_needed(None).await?;
        }
        Ok(())
    }

    async fn highlight(&self, node: NodeId) -> Result<()> {
        let addr = self.address(node)?;
        let page = self.page.lock().await;
        let js = "el => { \
            const prev = el.getAttribute('style'); \
            el.setAttribute('style', 'border: 2px solid red; background-color: yellow;'); \
            setTimeout(() => { \
                if (prev === null) { el.removeAttribute('style'); } \
                else { el.setAttribute('style', prev); } \
            }, 300); \
            return true; }";
        page.evaluate_on_selector::<String, bool>(&addr, js, None::<String>)
            .await?;
        Ok(())
    }
}
