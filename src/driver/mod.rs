//! Browser driver abstraction
//!
//! The engine talks to the live document exclusively through the
//! [`BrowserSession`] trait so the interaction logic never assumes a
//! specific rendering technology. The production implementation drives a
//! Playwright browser; tests use an in-memory DOM.

pub mod common;
pub mod traits;
pub mod web;

#[cfg(test)]
pub(crate) mod fake;

pub use traits::{BrowserSession, NodeId};
pub use web::{WebSession, WebSessionConfig};

use std::fmt;

/// Locator for querying the live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
    /// Element id attribute
    Id(String),
    /// Element name attribute
    Name(String),
    /// Tag name
    Tag(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
            Locator::Id(s) => write!(f, "id={}", s),
            Locator::Name(s) => write!(f, "name={}", s),
            Locator::Tag(s) => write!(f, "tag={}", s),
        }
    }
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }
}
