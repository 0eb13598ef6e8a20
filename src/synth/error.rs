//! Construct error definitions.

use thiserror::Error;

/// Errors raised while a construct validates its props or emits resources.
///
/// Every variant is an operator configuration mistake; none is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructError {
    /// A required field is absent or empty.
    #[error("{construct} requires {field}")]
    MissingField {
        construct: String,
        field: &'static str,
    },

    /// Exactly one of two alternative fields must be supplied.
    #[error("{construct} requires either {first} or {second}")]
    MissingOneOf {
        construct: String,
        first: &'static str,
        second: &'static str,
    },

    /// Two mutually exclusive fields are both set.
    #[error("{construct} accepts {first} or {second}, not both")]
    Conflict {
        construct: String,
        first: &'static str,
        second: &'static str,
    },

    /// A field is only valid together with another setting.
    #[error("{construct}: {field} requires {requires}")]
    Dependency {
        construct: String,
        field: &'static str,
        requires: String,
    },

    /// A field holds a value outside its accepted domain.
    #[error("{construct}: invalid {field}: {reason}")]
    Invalid {
        construct: String,
        field: &'static str,
        reason: String,
    },

    /// A backend location could not be turned into an origin.
    #[error("cannot derive an origin from `{input}`: {reason}")]
    InvalidOrigin { input: String, reason: String },

    /// Two routing behaviors share a character-identical path pattern.
    #[error("{construct}: path pattern `{pattern}` is declared more than once")]
    DuplicatePathPattern { construct: String, pattern: String },

    /// A construct references an id that no earlier construct registered.
    #[error("{construct} references unknown {kind} `{id}`")]
    UnknownReference {
        construct: String,
        kind: &'static str,
        id: String,
    },

    /// Two resources resolved to the same logical id.
    #[error("duplicate logical id `{0}`")]
    DuplicateLogicalId(String),

    /// Two outputs resolved to the same name.
    #[error("duplicate output `{0}`")]
    DuplicateOutput(String),
}

impl ConstructError {
    pub fn missing(construct: &str, field: &'static str) -> Self {
        Self::MissingField {
            construct: construct.to_string(),
            field,
        }
    }

    pub fn missing_one_of(construct: &str, first: &'static str, second: &'static str) -> Self {
        Self::MissingOneOf {
            construct: construct.to_string(),
            first,
            second,
        }
    }

    pub fn conflict(construct: &str, first: &'static str, second: &'static str) -> Self {
        Self::Conflict {
            construct: construct.to_string(),
            first,
            second,
        }
    }

    pub fn dependency(construct: &str, field: &'static str, requires: impl Into<String>) -> Self {
        Self::Dependency {
            construct: construct.to_string(),
            field,
            requires: requires.into(),
        }
    }

    pub fn invalid(construct: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            construct: construct.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for construct synthesis.
pub type ConstructResult<T> = Result<T, ConstructError>;

/// Return the trimmed value of a required string field.
pub fn require<'a>(
    construct: &str,
    field: &'static str,
    value: Option<&'a str>,
) -> ConstructResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConstructError::missing(construct, field)),
    }
}

/// Resolve a pair of mutually exclusive optional fields where exactly one is required.
pub fn exactly_one<'a, A, B>(
    construct: &str,
    first: (&'static str, Option<&'a A>),
    second: (&'static str, Option<&'a B>),
) -> ConstructResult<Either<&'a A, &'a B>>
where
    A: ?Sized,
    B: ?Sized,
{
    match (first.1, second.1) {
        (Some(_), Some(_)) => Err(ConstructError::conflict(construct, first.0, second.0)),
        (Some(a), None) => Ok(Either::First(a)),
        (None, Some(b)) => Ok(Either::Second(b)),
        (None, None) => Err(ConstructError::missing_one_of(construct, first.0, second.0)),
    }
}

/// One of two alternatives picked by [`exactly_one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Either<A, B> {
    First(A),
    Second(B),
}
