use std::{fmt, str::FromStr};

/// Name of the IOKit service that exposes the controller.
pub const DEFAULT_SERVICE: &str = "AppleSMC";

/// Byte order of the integer, `flt ` and `ioft` types.
///
/// Intel controllers store integers big-endian, Apple silicon stores them
/// little-endian. The fixed-point family (`fpe2`, `sp78`, ...) is always
/// big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the controller on the machine this was compiled for.
    pub const fn native() -> Self {
        if cfg!(target_arch = "x86_64") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Converts between big-endian and this order. The conversion is its own inverse.
    pub(crate) fn arrange<const N: usize>(self, mut bytes: [u8; N]) -> [u8; N] {
        if self == ByteOrder::Little {
            bytes.reverse();
        }
        bytes
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Little => f.write_str("little"),
            ByteOrder::Big => f.write_str("big"),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(ByteOrder::Little),
            "big" | "be" => Ok(ByteOrder::Big),
            "native" | "auto" => Ok(ByteOrder::native()),
            other => Err(format!("unknown byte order {other:?}")),
        }
    }
}

/// Connection settings.
///
/// ```
/// use smckit::config::{ByteOrder, SmcConfig};
///
/// let config = SmcConfig::default().with_byte_order(ByteOrder::Big);
/// assert_eq!(config.service, "AppleSMC");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmcConfig {
    /// IOKit service class to match.
    pub service: String,
    pub byte_order: ByteOrder,
}

impl Default for SmcConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            byte_order: ByteOrder::native(),
        }
    }
}

impl SmcConfig {
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }
}
