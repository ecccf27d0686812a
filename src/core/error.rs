use thiserror::Error;

/// Build-phase failures raised while registering or configuring routes.
///
/// Every variant is a programmer/configuration error: a table that produced one
/// of these must not be used to serve requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("Invalid controller prefix '{prefix}'")]
    InvalidPrefix { prefix: String },

    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Filter '{name}' is already registered")]
    DuplicateFilter { name: String },

    #[error("Policy field '{field}' has already been set")]
    AlreadySet { field: &'static str },

    #[error("Cannot combine an IP allow list with an IP deny list")]
    ConflictingPolicy,

    #[error("Unknown {field} value '{value}'")]
    UnknownValue { field: &'static str, value: String },

    #[error("Policy field '{field}' cannot be empty")]
    EmptyValue { field: &'static str },

    #[error("Invalid network specification '{spec}'")]
    InvalidNetworkSpec { spec: String },

    #[error("Invalid parameter '{name}' in pattern '{pattern}': {reason}")]
    InvalidPatternParameter {
        pattern: String,
        name: String,
        reason: String,
    },

    #[error("Unsupported HTTP method '{method}'")]
    UnsupportedMethod { method: String },

    #[error("Unknown controller '{name}'")]
    UnknownController { name: String },

    #[error("Unknown action '{action}' in controller '{controller}'")]
    UnknownAction { controller: String, action: String },

    #[error("Route table is frozen; no further registration is permitted")]
    AlreadyFrozen,
}

/// Result alias for build-phase operations.
pub type RouteResult<T> = Result<T, RouteError>;
