use thiserror::Error;

/// Rejections of the shorthand edit grammar accepted by `edit`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditParseError {
    #[error("invalid shorthand edit: '{0}' (expected TARGET=VALUE)")]
    MissingAssignment(String),
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("unknown attribute '{attribute}' in '{entry}'")]
    UnknownAttribute { attribute: String, entry: String },
    #[error("attribute '{attribute}' does not apply to {target}")]
    WrongTarget { attribute: String, target: String },
    #[error("invalid value '{value}' for '{attribute}'")]
    InvalidValue { attribute: String, value: String },
}
