//! Error taxonomy for the control resolution and interaction engine
//!
//! Every failure the engine can produce falls into one of these variants so
//! callers can tell a caller-fixable mistake (unknown page, unknown element)
//! from a timeout-bounded resolution failure or a missing-data problem.
//! Errors travel through `anyhow` and can be recovered with `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The page name has no entry in the object repository. Never retried.
    #[error("Page {page} not found in Object Repository")]
    UnknownPage { page: String },

    /// The page is known but the element is not registered on it. Never retried.
    #[error("Element {element} not found on page {page} in Object Repository")]
    UnknownElement { page: String, element: String },

    /// The locator is registered but nothing on the live page matched it
    /// before the timeout. Carries the resolved expression and the page
    /// identity so a tester can tell "wrong locator" from "slow page".
    #[error(
        "Timeout after {timeout_ms}ms waiting for element {element} on {page} page \
         with locator: {expression} (current url: {url}, title: {title})"
    )]
    ElementNotFound {
        page: String,
        element: String,
        expression: String,
        timeout_ms: u64,
        url: String,
        title: String,
    },

    /// The calendar never reached the target month/year within the attempt bound.
    #[error("Failed to navigate to {month}/{year} after {attempts} calendar navigation attempts")]
    NavigationTimeout { month: u32, year: i32, attempts: u32 },

    /// A reference-shaped placeholder named a column the active test case's
    /// data row does not have.
    #[error("No test data value for reference {reference} (test case: {test_case})")]
    DataNotFound { reference: String, test_case: String },

    /// A data reference was resolved before any test case id was set.
    #[error("No test case id is set; data references cannot be resolved")]
    ContextNotSet,

    /// A requested selection value matched none of the option heuristics.
    #[error("Could not select value '{value}': {reason}")]
    ValueSelection { value: String, reason: String },

    /// A toggle did not reach the desired state after one verified click.
    #[error("Toggle state did not change as expected (wanted on={desired})")]
    ToggleState { desired: bool },

    /// A date string failed shape or range validation.
    #[error("Invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },
}
