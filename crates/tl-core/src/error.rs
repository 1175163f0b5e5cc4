use thiserror::Error;

pub type TlResult<T> = Result<T, TlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TlError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown unit '{unit}'")]
    UnknownUnit { unit: String },

    #[error("Unit '{given}' is not compatible with '{expected}'")]
    IncompatibleUnit { given: String, expected: String },
}
