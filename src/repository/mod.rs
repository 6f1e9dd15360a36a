//! Object repository: logical (page, element) names to locator descriptors
//!
//! Pages live as JSON files in a repository directory, one file per page:
//!
//! ```json
//! {
//!   "page": "LoginPage",
//!   "elements": {
//!     "Username": { "strategy": "xpath", "expression": "//input[@id='username']" }
//!   }
//! }
//! ```
//!
//! The repository is read-mostly after load and safe to share read-only
//! across execution units.

use crate::driver::Locator;
use crate::error::EngineError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// How a locator expression is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Xpath,
    Css,
    Id,
    Name,
    Tag,
}

/// Declarative recipe for finding one control. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct LocatorDescriptor {
    pub strategy: Strategy,
    pub expression: String,
}

impl LocatorDescriptor {
    pub fn to_locator(&self) -> Locator {
        match self.strategy {
            Strategy::Xpath => Locator::XPath(self.expression.clone()),
            Strategy::Css => Locator::Css(self.expression.clone()),
            Strategy::Id => Locator::Id(self.expression.clone()),
            Strategy::Name => Locator::Name(self.expression.clone()),
            Strategy::Tag => Locator::Tag(self.expression.clone()),
        }
    }
}

#[derive(Deserialize)]
struct PageFile {
    page: String,
    elements: HashMap<String, LocatorDescriptor>,
}

/// All loaded pages, keyed by page name, then element name.
#[derive(Default)]
pub struct ObjectRepository {
    pages: HashMap<String, HashMap<String, LocatorDescriptor>>,
}

impl ObjectRepository {
    /// Load every `*.json` page file under `dir`. Loading is idempotent:
    /// entries are keyed by (page, element), so reloading the same directory
    /// replaces rather than duplicates. A page name appearing in two files
    /// merges its element maps, later file winning per element.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut repo = Self::default();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read object repository dir: {}", dir.display()))?;

        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for path in files {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read page file: {}", path.display()))?;
            let page_file: PageFile = serde_json::from_str(&content)
                .with_context(|| format!("Invalid page file: {}", path.display()))?;
            log::info!(
                "Loaded page '{}' with {} elements from {}",
                page_file.page,
                page_file.elements.len(),
                path.display()
            );
            repo.pages
                .entry(page_file.page)
                .or_default()
                .extend(page_file.elements);
        }

        log::info!("Object repository loaded: {} pages", repo.pages.len());
        Ok(repo)
    }

    pub fn is_page_loaded(&self, page: &str) -> bool {
        self.pages.contains_key(page)
    }

    pub fn is_element_registered(&self, page: &str, element: &str) -> bool {
        self.pages
            .get(page)
            .is_some_and(|elements| elements.contains_key(element))
    }

    /// Locator for (page, element). Distinguishes an unknown page from an
    /// unknown element on a known page; both are caller mistakes, never
    /// retried.
    pub fn locator(&self, page: &str, element: &str) -> Result<&LocatorDescriptor> {
        let elements = self.pages.get(page).ok_or_else(|| {
            log::error!(
                "Page {} not found in Object Repository (loaded pages: {:?})",
                page,
                self.page_names()
            );
            EngineError::UnknownPage {
                page: page.to_string(),
            }
        })?;
        elements.get(element).ok_or_else(|| {
            log::error!(
                "Element {} not found on page {} (registered: {:?})",
                element,
                page,
                elements.keys().collect::<Vec<_>>()
            );
            EngineError::UnknownElement {
                page: page.to_string(),
                element: element.to_string(),
            }
            .into()
        })
    }

    /// Raw locator expression, for diagnostics only.
    pub fn raw_expression(&self, page: &str, element: &str) -> Result<&str> {
        Ok(self.locator(page, element)?.expression.as_str())
    }

    pub fn page_names(&self) -> Vec<&str> {
        self.pages.keys().map(String::as_str).collect()
    }

    pub fn element_names(&self, page: &str) -> Vec<&str> {
        self.pages
            .get(page)
            .map(|e| e.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<(&str, &str, Strategy, &str)>) -> Self {
        let mut repo = Self::default();
        for (page, element, strategy, expression) in entries {
            repo.pages.entry(page.to_string()).or_default().insert(
                element.to_string(),
                LocatorDescriptor {
                    strategy,
                    expression: expression.to_string(),
                },
            );
        }
        repo
    }
}
