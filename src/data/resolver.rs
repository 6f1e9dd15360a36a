//! Placeholder resolution against per-test-case data
//!
//! A string of the exact shape `Sheet.Key` is a data reference and resolves
//! to the named column of the active test case's data row. Anything else
//! passes through unchanged, so literal text and already-resolved values
//! flow through the same call site.

use crate::context::TestCaseContext;
use crate::data::store::DataStore;
use crate::error::EngineError;
use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+\.[A-Za-z0-9_]+$").unwrap())
}

/// Resolves `Sheet.Key` references for one execution unit.
#[derive(Clone)]
pub struct DataResolver {
    store: Arc<DataStore>,
    context: TestCaseContext,
}

impl DataResolver {
    pub fn new(store: Arc<DataStore>, context: TestCaseContext) -> Self {
        Self { store, context }
    }

    pub fn context(&self) -> &TestCaseContext {
        &self.context
    }

    /// Resolve a possible data reference.
    ///
    /// Reference-shaped strings must resolve or fail; returning the input
    /// unchanged would let downstream steps mistake an unresolved reference
    /// for a literal value. Non-reference strings are the identity.
    pub fn resolve(&self, input: &str) -> Result<String> {
        if !reference_pattern().is_match(input) {
            log::debug!("Skipping placeholder resolution for non-reference input: {}", input);
            return Ok(input.to_string());
        }

        let test_case = self.context.validate_set()?;
        let Some((sheet, row)) = self.store.row_for(&test_case) else {
            log::error!("No test data row for test case {} in any sheet", test_case);
            return Err(EngineError::DataNotFound {
                reference: input.to_string(),
                test_case,
            }
            .into());
        };

        // Sheets may name columns with the full dotted token or with just
        // the part after the dot; accept both.
        let suffix = input.split_once('.').map(|(_, s)| s).unwrap_or(input);
        let value = row
            .get(input)
            .or_else(|| row.get(suffix))
            .ok_or_else(|| EngineError::DataNotFound {
                reference: input.to_string(),
                test_case: test_case.clone(),
            })?;

        log::debug!(
            "Resolved data reference '{}' -> '{}' (test case {}, sheet {})",
            input,
            value,
            test_case,
            sheet
        );
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::DataStore;

    fn resolver() -> (DataResolver, TestCaseContext) {
        let store = DataStore::from_rows(vec![(
            "Login",
            vec![(
                "TC-001",
                vec![
                    ("LoginPage.Username", "qa1"),
                    ("LoginPage.Password", "secret"),
                    ("Role", "admin"),
                ],
            )],
        )]);
        let context = TestCaseContext::new();
        (DataResolver::new(Arc::new(store), context.clone()), context)
    }

    #[test]
    fn resolves_reference_to_stored_value() {
        let (resolver, ctx) = resolver();
        ctx.set("TC-001");
        assert_eq!(resolver.resolve("LoginPage.Username").unwrap(), "qa1");
        assert_eq!(resolver.resolve("LoginPage.Password").unwrap(), "secret");
    }

    #[test]
    fn falls_back_to_column_suffix() {
        let (resolver, ctx) = resolver();
        ctx.set("TC-001");
        assert_eq!(resolver.resolve("Users.Role").unwrap(), "admin");
    }

    #[test]
    fn non_reference_input_is_identity() {
        let (resolver, ctx) = resolver();
        ctx.set("TC-001");
        for literal in ["plain text", "a.b.c", "no_dot", "", "12 Main St."] {
            assert_eq!(resolver.resolve(literal).unwrap(), literal);
        }
    }

    #[test]
    fn missing_column_raises_data_not_found() {
        let (resolver, ctx) = resolver();
        ctx.set("TC-001");
        let err = resolver.resolve("LoginPage.Missing").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::DataNotFound { reference, .. }) if reference == "LoginPage.Missing"
        ));
    }

    #[test]
    fn reference_before_context_set_raises() {
        let (resolver, _ctx) = resolver();
        let err = resolver.resolve("LoginPage.Username").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::ContextNotSet)
        ));
    }

    #[test]
    fn resolution_is_deterministic() {
        let (resolver, ctx) = resolver();
        ctx.set("TC-001");
        let first = resolver.resolve("LoginPage.Username").unwrap();
        let second = resolver.resolve("LoginPage.Username").unwrap();
        assert_eq!(first, second);
    }
}
