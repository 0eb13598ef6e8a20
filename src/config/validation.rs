//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (handlers, certificates and web ACLs name
//!   constructs of the right type declared earlier)
//! - Validate the stack context and construct ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Construct-level prop checks stay in the constructs; this pass only covers
//!   what needs the whole file

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::schema::{AppConfig, ConstructConfig};

static STACK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("valid regex"));

static ACCOUNT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12}$").expect("valid regex"));

static CONSTRUCT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid regex"));

/// A semantic problem in an app file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("stack.name `{0}` must start with a letter and contain only letters, digits and hyphens (max 128)")]
    InvalidStackName(String),

    #[error("stack.region must not be empty")]
    MissingRegion,

    #[error("stack.account `{0}` must be 12 digits")]
    InvalidAccount(String),

    #[error("constructs[{index}] has an empty id")]
    MissingId { index: usize },

    #[error("construct id `{0}` may only contain letters, digits, `-` and `_`")]
    InvalidId(String),

    #[error("construct id `{0}` is declared more than once")]
    DuplicateId(String),

    #[error("{construct}.{field}: `{target}` is not a {expected} declared before it")]
    UnresolvedReference {
        construct: String,
        field: &'static str,
        target: String,
        expected: &'static str,
    },
}

/// Validate a parsed app file, collecting every problem.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let stack = &config.stack;
    if !STACK_NAME.is_match(&stack.name) {
        errors.push(ValidationError::InvalidStackName(stack.name.clone()));
    }
    if stack.region.trim().is_empty() {
        errors.push(ValidationError::MissingRegion);
    }
    if let Some(account) = &stack.account {
        if !ACCOUNT_ID.is_match(account) {
            errors.push(ValidationError::InvalidAccount(account.clone()));
        }
    }

    // Kind of every id declared so far.
    let mut declared: HashMap<&str, &'static str> = HashMap::new();
    for (index, entry) in config.constructs.iter().enumerate() {
        validate_references(entry, &declared, &mut errors);

        let id = entry.id();
        if id.is_empty() {
            errors.push(ValidationError::MissingId { index });
            continue;
        }
        if !CONSTRUCT_ID.is_match(id) {
            errors.push(ValidationError::InvalidId(id.to_string()));
        }
        if declared.insert(id, entry.kind()).is_some() {
            errors.push(ValidationError::DuplicateId(id.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_references(
    entry: &ConstructConfig,
    declared: &HashMap<&str, &'static str>,
    errors: &mut Vec<ValidationError>,
) {
    for reference in entry.references() {
        let expected = reference.kind.construct_type();
        if declared.get(reference.target) != Some(&expected) {
            errors.push(ValidationError::UnresolvedReference {
                construct: entry.id().to_string(),
                field: reference.field,
                target: reference.target.to_string(),
                expected,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> AppConfig {
        toml::from_str(source).unwrap()
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r#"
            [stack]
            name = "checkout"
            region = "us-east-1"
            account = "123456789012"

            [[constructs]]
            type = "function"
            id = "api"

            [[constructs]]
            type = "http_api"
            id = "public"
            handler = "api"
            "#,
        );
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let config = parse(
            r#"
            [stack]
            name = "9lives"
            region = ""
            account = "1234"

            [[constructs]]
            type = "function"
            id = "api"

            [[constructs]]
            type = "function"
            id = "api"

            [[constructs]]
            type = "queue"
            id = "jobs queue"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidStackName("9lives".into()),
                ValidationError::MissingRegion,
                ValidationError::InvalidAccount("1234".into()),
                ValidationError::DuplicateId("api".into()),
                ValidationError::InvalidId("jobs queue".into()),
            ]
        );
    }

    #[test]
    fn test_references_resolve_backwards_only() {
        let config = parse(
            r#"
            [stack]
            name = "app"
            region = "us-east-1"

            [[constructs]]
            type = "table"
            id = "orders"
            functions = ["api"]

            [[constructs]]
            type = "function"
            id = "api"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnresolvedReference {
                construct: "orders".into(),
                field: "functions",
                target: "api".into(),
                expected: "function",
            }]
        );
    }

    #[test]
    fn test_reference_kind_must_match() {
        let config = parse(
            r#"
            [stack]
            name = "app"
            region = "us-east-1"

            [[constructs]]
            type = "function"
            id = "site"

            [[constructs]]
            type = "distribution"
            id = "cdn"
            backend_url = "https://origin.example.com"
            web_acl = "site"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[..],
            [ValidationError::UnresolvedReference { field: "web_acl", expected: "web_acl", .. }]
        ));
        assert_eq!(
            errors[0].to_string(),
            "cdn.web_acl: `site` is not a web_acl declared before it"
        );
    }
}
