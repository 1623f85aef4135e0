// core/src/error.rs

/// Rejected configuration changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no categories available: repository has not been validated")]
    CategoriesUnavailable,

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown mapping: {0}")]
    UnknownMapping(String),

    #[error("unknown theme: {0}")]
    UnknownTheme(String),
}

/// Why an inline validation ended in the `Error` state. The validator itself
/// never distinguishes these; callers use them to explain the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("repository identifier is empty")]
    EmptyIdentifier,

    #[error("{0}")]
    Rejected(String),

    #[error("repository has no discussion categories")]
    NoCategories,
}
