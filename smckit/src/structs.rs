use std::fmt;

use crate::{
    config::ByteOrder,
    error::{SmcError, ValueError},
    key::SmcKey,
    value::{DataType, SmcValue},
};

/// Byte array type for SMC data.
///
/// SMC values are stored as byte arrays with a maximum length of [`SMC_BYTES_LEN`].
pub type SmcBytes = [u8; SMC_BYTES_LEN];

/// Maximum size in bytes for SMC data.
pub const SMC_BYTES_LEN: usize = 32;

/// Four-byte data type tag as reported by the controller, e.g. `fpe2` or `ui8 `.
///
/// Tags shorter than four characters are padded with a trailing space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataTypeCode(pub [u8; 4]);

impl DataTypeCode {
    pub const fn from_u32(raw: u32) -> Self {
        Self(raw.to_be_bytes())
    }

    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// The closed codec table entry for this tag, if there is one.
    pub fn data_type(self) -> Option<DataType> {
        DataType::from_code(self)
    }
}

impl fmt::Display for DataTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for DataTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

/// Metadata about a SMC key.
///
/// Contains the data type, size and attribute byte of a key without its
/// value. Fetched from the controller on every transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyInfo {
    pub data_size: u32,
    pub data_type: DataTypeCode,
    /// attribute / version byte
    pub data_attributes: u8,
}

impl KeyInfo {
    pub fn new(data_type: &[u8; 4], data_size: u32) -> Self {
        Self {
            data_size,
            data_type: DataTypeCode(*data_type),
            data_attributes: 0,
        }
    }
}

/// Raw bytes read for a key, with the metadata needed to interpret them.
///
/// # Example
///
/// ```no_run
/// use smckit::connection::Smc;
///
/// let smc = Smc::open_default().unwrap();
/// let val = smc.read_raw("TB0T").unwrap();
///
/// println!("Key: {}", val.key);
/// println!("Data type: {}", val.info.data_type);
/// println!("Size: {} bytes", val.info.data_size);
///
/// if let Ok(parsed) = val.decode() {
///     println!("Parsed value: {}", parsed);
/// }
/// ```
#[derive(Clone, Copy, Debug)]
pub struct RawValue {
    pub key: SmcKey,
    pub info: KeyInfo,
    pub bytes: SmcBytes,
    pub byte_order: ByteOrder,
}

impl RawValue {
    /// Returns the valid portion of the byte data.
    ///
    /// The declared size may be less than the full 32-byte buffer; only the
    /// leading bytes carry data.
    pub fn valid_bytes(&self) -> &[u8] {
        let size = std::cmp::min(self.info.data_size as usize, self.bytes.len());
        &self.bytes[..size]
    }

    /// Interprets the bytes according to the declared data type.
    ///
    /// Fails with [`DecodeError::Unsupported`] when no codec exists for the type.
    pub fn decode(&self) -> Result<SmcValue, DecodeError> {
        let Some(data_type) = self.info.data_type.data_type() else {
            return Err(DecodeError::Unsupported(self.info.data_type));
        };
        data_type
            .decode(self.valid_bytes(), self.byte_order)
            .map_err(DecodeError::Value)
    }

    /// Like [`RawValue::decode`], with the failure reported against the key.
    pub fn value(&self) -> crate::error::Result<SmcValue> {
        self.decode().map_err(|err| match err {
            DecodeError::Unsupported(data_type) => SmcError::UnsupportedType {
                key: self.key,
                data_type,
            },
            DecodeError::Value(source) => SmcError::Value {
                key: self.key,
                source,
            },
        })
    }
}

/// Why a [`RawValue`] could not be decoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported data type {0:?}")]
    Unsupported(DataTypeCode),
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.info.data_size == 0 {
            return write!(f, "{} no data", self.key);
        }
        write!(
            f,
            "{} {} size: {}(bytes",
            self.key, self.info.data_type, self.info.data_size
        )?;
        for c in self.valid_bytes() {
            write!(f, " {:02x}", c)?;
        }
        write!(f, ")")?;
        if let Ok(val) = self.decode() {
            write!(f, " value: {}", val)?;
        }
        Ok(())
    }
}
