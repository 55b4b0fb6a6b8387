use std::convert::Infallible;

/// Malformed caller input, always detected before any network access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Domain must be an array")]
    DomainNotArray,

    #[error("Domain must contain '&', '|' or an array of 3 elements")]
    DomainTerm { index: usize },

    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Report name is required")]
    MissingReportName,

    #[error("IDs must be a non-empty array")]
    MissingIds,
}

// Lets an already-typed `Domain` pass through `TryInto<Domain>` bounds.
impl From<Infallible> for ValidationError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
