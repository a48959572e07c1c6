use std::fmt;

use crate::{key::SmcKey, structs::DataTypeCode, value::DataType};

/// Result type for SMC transactions.
pub type Result<T> = std::result::Result<T, SmcError>;

/// Errors returned by connection and transaction operations.
///
/// Protocol-level failures (`KeyNotFound`, `UnsupportedType`, `SizeMismatch`,
/// `TypeMismatch`, `Value`) describe a request that can never succeed for
/// that key. [`SmcError::ChannelError`] means the channel itself failed and
/// the caller may decide to retry.
#[derive(Debug, thiserror::Error)]
pub enum SmcError {
    #[error("SMC connection is already open")]
    AlreadyOpen,

    #[error("SMC connection is already closed")]
    AlreadyClosed,

    #[error("SMC connection is not open")]
    NotOpen,

    /// The key is malformed or the controller does not know it.
    #[error("key {key:?} not found")]
    KeyNotFound { key: String },

    /// The key exists but no codec is registered for its data type.
    #[error("key {key} has unsupported data type {data_type:?}")]
    UnsupportedType { key: SmcKey, data_type: DataTypeCode },

    /// The value does not fit the size the controller declared for the key.
    #[error("key {key} holds {expected} bytes but the value is {actual} bytes")]
    SizeMismatch {
        key: SmcKey,
        expected: usize,
        actual: usize,
    },

    /// The value kind cannot be stored in the key's data type.
    #[error("cannot store a {value} value in key {key} of type {data_type:?}")]
    TypeMismatch {
        key: SmcKey,
        data_type: DataTypeCode,
        value: &'static str,
    },

    #[error("bad value for key {key}: {source}")]
    Value {
        key: SmcKey,
        #[source]
        source: ValueError,
    },

    #[error("SMC channel error: {0}")]
    ChannelError(ChannelStatus),
}

impl SmcError {
    /// `true` when the failure came from the channel rather than the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, SmcError::ChannelError(_))
    }

    pub(crate) fn key_not_found(key: impl fmt::Display) -> Self {
        SmcError::KeyNotFound {
            key: key.to_string(),
        }
    }
}

/// Why a key name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key must be exactly 4 bytes, got {0}")]
    Length(usize),

    #[error("illegal byte {byte:#04x} at position {position}")]
    IllegalChar { position: usize, byte: u8 },

    #[error("key must not start with a space")]
    LeadingSpace,
}

/// Codec failures for a single value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("need {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("{value} is outside the representable range {min}..={max}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("value is not a number")]
    NotANumber,

    #[error("string is not ASCII")]
    NotAscii,

    #[error("a {value} value cannot be encoded as {data_type}")]
    Incompatible {
        value: &'static str,
        data_type: DataType,
    },
}

/// Failure status reported by an [`SmcChannel`](crate::channel::SmcChannel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// A Mach / IOKit call returned a non-success `kern_return_t`.
    Kern(i32),
    /// The call succeeded but the controller firmware reported a result code.
    Firmware(u8),
    /// No controller service exists on this machine.
    Unavailable,
}

/// Firmware result code for an unknown key.
pub const SMC_RESULT_KEY_NOT_FOUND: u8 = 0x84;

impl ChannelStatus {
    pub fn is_key_not_found(self) -> bool {
        self == ChannelStatus::Firmware(SMC_RESULT_KEY_NOT_FOUND)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Kern(code) => {
                write!(f, "{:#010x} ({})", code, crate::iokit::err_str(*code))
            }
            ChannelStatus::Firmware(code) => write!(f, "SMC result {:#04x}", code),
            ChannelStatus::Unavailable => write!(f, "no AppleSMC service available"),
        }
    }
}

impl From<ChannelStatus> for SmcError {
    fn from(status: ChannelStatus) -> Self {
        SmcError::ChannelError(status)
    }
}
