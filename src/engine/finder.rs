//! Element resolution: logical (page, element) names to live controls
//!
//! Resolution always goes name -> registry -> live poll; handles are never
//! cached across steps, so a page that re-renders a node between steps keeps
//! resolving to the same logical control.

use crate::data::DataResolver;
use crate::driver::common::{wait_until, PollConfig};
use crate::driver::{BrowserSession, NodeId};
use crate::error::EngineError;
use crate::repository::ObjectRepository;
use anyhow::Result;
use std::sync::Arc;

/// A live, located control. Valid for one interaction; re-resolve rather
/// than hold across steps.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    pub node: NodeId,
    pub page: String,
    pub element: String,
    /// Raw locator expression, carried for diagnostics.
    pub expression: String,
}

pub struct Finder {
    session: Arc<dyn BrowserSession>,
    repository: Arc<ObjectRepository>,
    resolver: DataResolver,
}

impl Finder {
    pub fn new(
        session: Arc<dyn BrowserSession>,
        repository: Arc<ObjectRepository>,
        resolver: DataResolver,
    ) -> Self {
        Self {
            session,
            repository,
            resolver,
        }
    }

    /// Resolve (page, element) to a live control, waiting up to `timeout_ms`
    /// for it to appear.
    ///
    /// Callers may pass data references as either name. Failures are
    /// terminal for the current step; retrying belongs to the caller, not
    /// here.
    pub async fn find(&self, page: &str, element: &str, timeout_ms: u64) -> Result<ControlHandle> {
        let page = self.resolver.resolve(page)?;
        let element = self.resolver.resolve(element)?;

        log::info!("Attempting to find element: {} on page: {}", element, page);

        // Existence checks up front: "page not registered" and "element not
        // registered" are caller mistakes and must stay distinguishable from
        // a slow page.
        let descriptor = self.repository.locator(&page, &element)?;
        let locator = descriptor.to_locator();
        log::debug!("Using locator for {}.{}: {}", page, element, locator);

        let session = self.session.clone();
        let probe_locator = locator.clone();
        let appeared = wait_until(
            move || {
                let session = session.clone();
                let locator = probe_locator.clone();
                async move { Ok(!session.query(&locator).await?.is_empty()) }
            },
            PollConfig::with_timeout(timeout_ms),
        )
        .await?;

        if !appeared {
            let url = self.session.current_url().await.unwrap_or_default();
            let title = self.session.title().await.unwrap_or_default();
            log::error!(
                "Timeout waiting for element {} on page {} (locator: {}, url: {}, title: {})",
                element,
                page,
                descriptor.expression,
                url,
                title
            );
            return Err(EngineError::ElementNotFound {
                page,
                element,
                expression: descriptor.expression.clone(),
                timeout_ms,
                url,
                title,
            }
            .into());
        }

        // Re-query after the wait so the handle points at the current render
        // of the node, not the one the probe saw.
        let nodes = self.session.query(&locator).await?;
        let node = *nodes.first().ok_or_else(|| EngineError::ElementNotFound {
            page: page.clone(),
            element: element.clone(),
            expression: descriptor.expression.clone(),
            timeout_ms,
            url: String::new(),
            title: String::new(),
        })?;

        log::info!("Successfully found element: {} on page: {}", element, page);
        Ok(ControlHandle {
            node,
            page,
            element,
            expression: descriptor.expression.clone(),
        })
    }
}
