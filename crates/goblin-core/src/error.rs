use thiserror::Error;

/// Errors returned by [`crate::manager::LeaseManager::acquire`] and
/// [`crate::manager::LeaseManager::resolve`].
///
/// `Display` output for `SubdomainInUse` and `NoAvailableIPs` is sent
/// verbatim as the HTTP error body, so the wording here is part of the
/// external contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    #[error("subdomain already in-use")]
    SubdomainInUse,

    #[error("no available IPs")]
    NoAvailableIPs,

    #[error("no record for subdomain")]
    NoRecord,
}

/// Startup preconditions the operator must fix by hand, plus transport-level
/// failures from the listeners. `UserFixable` carries the remediation text
/// that the binary prints before exiting non-zero.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("{cause}")]
    UserFixable { cause: String, instructions: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl StartupError {
    pub fn user_fixable(cause: impl Into<String>, instructions: impl Into<String>) -> Self {
        StartupError::UserFixable {
            cause: cause.into(),
            instructions: instructions.into(),
        }
    }

    /// Remediation text to print before exiting, if this is a user-fixable error.
    pub fn instructions(&self) -> Option<&str> {
        match self {
            StartupError::UserFixable { instructions, .. } => Some(instructions),
            _ => None,
        }
    }
}
