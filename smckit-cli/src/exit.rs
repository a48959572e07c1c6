use std::{fmt, io};

use smckit::SmcError;

pub const SUCCESS: i32 = 0;
pub const NOT_FOUND: i32 = 2;
pub const CHANNEL_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn smc_error(context: &str, err: SmcError) -> CliError {
    let code = match err {
        SmcError::KeyNotFound { .. } => NOT_FOUND,
        SmcError::ChannelError(_) => CHANNEL_ERROR,
        SmcError::UnsupportedType { .. }
        | SmcError::SizeMismatch { .. }
        | SmcError::TypeMismatch { .. }
        | SmcError::Value { .. } => DATA_INVALID,
        SmcError::AlreadyOpen | SmcError::AlreadyClosed | SmcError::NotOpen => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(INTERNAL, format!("{context}: {err}"))
}
