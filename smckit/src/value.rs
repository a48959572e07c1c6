//! Codecs for the value formats used by the controller.
//!
//! See [AsahiLinux Docs](https://asahilinux.org/docs/hw/soc/smc) for the
//! common data types.

use std::fmt;

use crate::{config::ByteOrder, error::ValueError, structs::DataTypeCode};

/// A fixed-point format from the `fpXY` / `spXY` family.
///
/// `X` is the number of integer bits and `Y` the number of fraction bits,
/// both as a hex digit. `sp` formats spend one more bit on the sign. Every
/// member is 16 bits wide and stored big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedPoint {
    signed: bool,
    fraction_bits: u8,
}

impl FixedPoint {
    /// Unsigned 14.2, used for fan speeds.
    pub const FPE2: FixedPoint = FixedPoint {
        signed: false,
        fraction_bits: 2,
    };
    /// Signed 7.8, used for temperatures.
    pub const SP78: FixedPoint = FixedPoint {
        signed: true,
        fraction_bits: 8,
    };

    pub const fn signed(&self) -> bool {
        self.signed
    }

    pub const fn fraction_bits(&self) -> u8 {
        self.fraction_bits
    }

    pub const fn integer_bits(&self) -> u8 {
        16 - self.fraction_bits - self.signed as u8
    }

    fn from_code(code: &[u8; 4]) -> Option<Self> {
        let signed = match &code[..2] {
            b"fp" => false,
            b"sp" => true,
            _ => return None,
        };
        let int = hex_digit(code[2])?;
        let frac = hex_digit(code[3])?;
        if int + frac + u8::from(signed) != 16 {
            return None;
        }
        Some(Self {
            signed,
            fraction_bits: frac,
        })
    }

    fn code(&self) -> DataTypeCode {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let prefix = if self.signed { b's' } else { b'f' };
        DataTypeCode([
            prefix,
            b'p',
            HEX[self.integer_bits() as usize],
            HEX[self.fraction_bits as usize],
        ])
    }

    fn scale(&self) -> f64 {
        f64::from(1u32 << self.fraction_bits)
    }

    /// Smallest representable value.
    pub fn min(&self) -> f64 {
        if self.signed {
            f64::from(i16::MIN) / self.scale()
        } else {
            0.0
        }
    }

    /// Largest representable value.
    pub fn max(&self) -> f64 {
        if self.signed {
            f64::from(i16::MAX) / self.scale()
        } else {
            f64::from(u16::MAX) / self.scale()
        }
    }

    pub fn decode(&self, bytes: [u8; 2]) -> f64 {
        if self.signed {
            f64::from(i16::from_be_bytes(bytes)) / self.scale()
        } else {
            f64::from(u16::from_be_bytes(bytes)) / self.scale()
        }
    }

    /// Encodes `value`, rounding to the nearest step.
    ///
    /// Values outside [`FixedPoint::min`]..=[`FixedPoint::max`] are rejected,
    /// never wrapped.
    pub fn encode(&self, value: f64) -> Result<[u8; 2], ValueError> {
        if value.is_nan() {
            return Err(ValueError::NotANumber);
        }
        let raw = (value * self.scale()).round();
        let out_of_range = || ValueError::OutOfRange {
            value,
            min: self.min(),
            max: self.max(),
        };
        if self.signed {
            if raw < f64::from(i16::MIN) || raw > f64::from(i16::MAX) {
                return Err(out_of_range());
            }
            Ok((raw as i16).to_be_bytes())
        } else {
            if raw < 0.0 || raw > f64::from(u16::MAX) {
                return Err(out_of_range());
            }
            Ok((raw as u16).to_be_bytes())
        }
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Largest integer `fpe2` can carry.
pub const FPE2_MAX: u16 = u16::MAX >> 2;

/// Encodes an integer (typically a fan RPM) as `fpe2`.
///
/// ```
/// assert_eq!(smckit::value::encode_fpe2(2000), Ok([31, 64]));
/// ```
pub fn encode_fpe2(value: u16) -> Result<[u8; 2], ValueError> {
    if value > FPE2_MAX {
        return Err(ValueError::OutOfRange {
            value: f64::from(value),
            min: 0.0,
            max: f64::from(FPE2_MAX),
        });
    }
    Ok([(value >> 6) as u8, ((value << 2) & 0xff) as u8])
}

/// Decodes `fpe2`, dropping the two fraction bits.
pub fn decode_fpe2(bytes: [u8; 2]) -> u16 {
    (u16::from(bytes[0]) << 6) + (u16::from(bytes[1]) >> 2)
}

/// Encodes a temperature in degrees Celsius as `sp78`.
pub fn encode_sp78(celsius: f64) -> Result<[u8; 2], ValueError> {
    FixedPoint::SP78.encode(celsius)
}

pub fn decode_sp78(bytes: [u8; 2]) -> f64 {
    FixedPoint::SP78.decode(bytes)
}

/// Represents a decoded SMC value.
///
/// ```no_run
/// use smckit::connection::Smc;
/// use smckit::value::SmcValue;
///
/// let smc = Smc::open_default().unwrap();
/// if let Ok(SmcValue::Fixed(celsius)) = smc.read("TB0T") {
///     println!("battery temperature: {}", celsius);
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SmcValue {
    /// `flag`
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    /// `flt `, a 32-bit IEEE float
    F32(f32),
    /// Any `fpXY` / `spXY` fixed-point value
    Fixed(f64),
    /// `ch8*`, maybe ascii
    Chars(String),
    /// Fixed-point value (48.16 format)
    Ioft48_16(u64),
    /// Opaque payload, written as-is
    Bytes(Vec<u8>),
}

impl SmcValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SmcValue::Bool(_) => "flag",
            SmcValue::U8(_) => "u8",
            SmcValue::I8(_) => "i8",
            SmcValue::U16(_) => "u16",
            SmcValue::I16(_) => "i16",
            SmcValue::U32(_) => "u32",
            SmcValue::I32(_) => "i32",
            SmcValue::U64(_) => "u64",
            SmcValue::I64(_) => "i64",
            SmcValue::F32(_) => "f32",
            SmcValue::Fixed(_) => "fixed-point",
            SmcValue::Chars(_) => "string",
            SmcValue::Ioft48_16(_) => "ioft",
            SmcValue::Bytes(_) => "bytes",
        }
    }

    /// Number of bytes the value occupies when encoded.
    pub fn natural_size(&self) -> usize {
        match self {
            SmcValue::Bool(_) | SmcValue::U8(_) | SmcValue::I8(_) => 1,
            SmcValue::U16(_) | SmcValue::I16(_) | SmcValue::Fixed(_) => 2,
            SmcValue::U32(_) | SmcValue::I32(_) | SmcValue::F32(_) => 4,
            SmcValue::U64(_) | SmcValue::I64(_) | SmcValue::Ioft48_16(_) => 8,
            SmcValue::Chars(s) => s.len(),
            SmcValue::Bytes(b) => b.len(),
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match *self {
            SmcValue::Bool(b) => f64::from(u8::from(b)),
            SmcValue::U8(v) => f64::from(v),
            SmcValue::I8(v) => f64::from(v),
            SmcValue::U16(v) => f64::from(v),
            SmcValue::I16(v) => f64::from(v),
            SmcValue::U32(v) => f64::from(v),
            SmcValue::I32(v) => f64::from(v),
            SmcValue::U64(v) => v as f64,
            SmcValue::I64(v) => v as f64,
            SmcValue::F32(v) => f64::from(v),
            SmcValue::Fixed(v) => v,
            SmcValue::Ioft48_16(raw) => ioft_to_f64(raw),
            SmcValue::Chars(_) | SmcValue::Bytes(_) => return None,
        };
        Some(v)
    }

    /// Unsigned integer view; `None` for negative, fractional or non-numeric values.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            SmcValue::Bool(b) => Some(u64::from(b)),
            SmcValue::U8(v) => Some(u64::from(v)),
            SmcValue::U16(v) => Some(u64::from(v)),
            SmcValue::U32(v) => Some(u64::from(v)),
            SmcValue::U64(v) => Some(v),
            SmcValue::I8(v) => u64::try_from(v).ok(),
            SmcValue::I16(v) => u64::try_from(v).ok(),
            SmcValue::I32(v) => u64::try_from(v).ok(),
            SmcValue::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Truth value of a flag; integers count as true when nonzero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SmcValue::Bool(b) => Some(*b),
            other => other.as_u64().map(|v| v != 0),
        }
    }
}

fn ioft_to_f64(raw: u64) -> f64 {
    ((raw >> 16) as f64) + ((raw & 0xFFFF) as f64 / 65536.0)
}

impl fmt::Display for SmcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmcValue::Bool(v) => write!(f, "{}", v),
            SmcValue::U8(v) => write!(f, "{}", v),
            SmcValue::I8(v) => write!(f, "{}", v),
            SmcValue::U16(v) => write!(f, "{}", v),
            SmcValue::I16(v) => write!(f, "{}", v),
            SmcValue::U32(v) => write!(f, "{}", v),
            SmcValue::I32(v) => write!(f, "{}", v),
            SmcValue::U64(v) => write!(f, "{}", v),
            SmcValue::I64(v) => write!(f, "{}", v),
            SmcValue::F32(v) => write!(f, "{}", v),
            SmcValue::Fixed(v) => write!(f, "{}", v),

            SmcValue::Chars(s) => write!(f, "{}", s),

            SmcValue::Ioft48_16(raw) => write!(f, "{}", ioft_to_f64(*raw)),

            SmcValue::Bytes(bytes) => {
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// The closed table of data types this crate can decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Flag,
    Ui8,
    Si8,
    Ui16,
    Si16,
    Ui32,
    Si32,
    Ui64,
    Si64,
    Flt,
    Chars,
    Ioft,
    Fixed(FixedPoint),
}

trait TakeN {
    fn take<const N: usize>(&self) -> Result<[u8; N], ValueError>;
}

impl TakeN for [u8] {
    fn take<const N: usize>(&self) -> Result<[u8; N], ValueError> {
        let src = self.get(..N).ok_or(ValueError::Truncated {
            needed: N,
            available: self.len(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(src);
        Ok(out)
    }
}

impl DataType {
    /// Looks up the codec for a type tag; `None` for tags outside the table.
    pub fn from_code(code: DataTypeCode) -> Option<Self> {
        let data_type = match &code.0 {
            b"flag" => Self::Flag,
            b"ui8 " => Self::Ui8,
            b"si8 " => Self::Si8,
            b"ui16" => Self::Ui16,
            b"si16" => Self::Si16,
            b"ui32" => Self::Ui32,
            b"si32" => Self::Si32,
            b"ui64" => Self::Ui64,
            b"si64" => Self::Si64,
            b"flt " => Self::Flt,
            b"ch8*" => Self::Chars,
            b"ioft" => Self::Ioft,
            other => Self::Fixed(FixedPoint::from_code(other)?),
        };
        Some(data_type)
    }

    pub fn code(&self) -> DataTypeCode {
        let bytes = match self {
            Self::Flag => b"flag",
            Self::Ui8 => b"ui8 ",
            Self::Si8 => b"si8 ",
            Self::Ui16 => b"ui16",
            Self::Si16 => b"si16",
            Self::Ui32 => b"ui32",
            Self::Si32 => b"si32",
            Self::Ui64 => b"ui64",
            Self::Si64 => b"si64",
            Self::Flt => b"flt ",
            Self::Chars => b"ch8*",
            Self::Ioft => b"ioft",
            Self::Fixed(fp) => return fp.code(),
        };
        DataTypeCode(*bytes)
    }

    /// Encoded size, or `None` for variable-length strings.
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Flag | Self::Ui8 | Self::Si8 => Some(1),
            Self::Ui16 | Self::Si16 | Self::Fixed(_) => Some(2),
            Self::Ui32 | Self::Si32 | Self::Flt => Some(4),
            Self::Ui64 | Self::Si64 | Self::Ioft => Some(8),
            Self::Chars => None,
        }
    }

    /// Interprets `data`, which must hold at least [`DataType::size`] bytes.
    pub fn decode(&self, data: &[u8], order: ByteOrder) -> Result<SmcValue, ValueError> {
        let value = match self {
            Self::Flag => SmcValue::Bool(data.take::<1>()?[0] != 0),
            Self::Ui8 => SmcValue::U8(data.take::<1>()?[0]),
            Self::Si8 => SmcValue::I8(i8::from_be_bytes(data.take::<1>()?)),

            Self::Ui16 => SmcValue::U16(u16::from_be_bytes(order.arrange(data.take()?))),
            Self::Si16 => SmcValue::I16(i16::from_be_bytes(order.arrange(data.take()?))),
            Self::Ui32 => SmcValue::U32(u32::from_be_bytes(order.arrange(data.take()?))),
            Self::Si32 => SmcValue::I32(i32::from_be_bytes(order.arrange(data.take()?))),
            Self::Ui64 => SmcValue::U64(u64::from_be_bytes(order.arrange(data.take()?))),
            Self::Si64 => SmcValue::I64(i64::from_be_bytes(order.arrange(data.take()?))),

            Self::Flt => SmcValue::F32(f32::from_be_bytes(order.arrange(data.take()?))),
            Self::Ioft => {
                SmcValue::Ioft48_16(u64::from_be_bytes(order.arrange(data.take()?)))
            }

            Self::Fixed(fp) => SmcValue::Fixed(fp.decode(data.take()?)),

            Self::Chars => {
                // Treat as ASCII; trim at first NUL if present.
                let end = data.iter().position(|&c| c == 0).unwrap_or(data.len());
                SmcValue::Chars(String::from_utf8_lossy(&data[..end]).into_owned())
            }
        };
        Ok(value)
    }

    /// Encodes `value` as this type.
    ///
    /// 16-bit integers may be stored in fixed-point types, which share
    /// their width; everything else must match the type's own variant.
    /// [`SmcValue::Bytes`] is passed through untouched.
    pub fn encode(&self, value: &SmcValue, order: ByteOrder) -> Result<Vec<u8>, ValueError> {
        let incompatible = || ValueError::Incompatible {
            value: value.kind(),
            data_type: *self,
        };
        let bytes = match (self, value) {
            (_, SmcValue::Bytes(bytes)) => bytes.clone(),

            (Self::Flag, SmcValue::Bool(b)) => vec![u8::from(*b)],
            (Self::Flag, SmcValue::U8(v)) => vec![u8::from(*v != 0)],
            (Self::Ui8, SmcValue::U8(v)) => vec![*v],
            (Self::Si8, SmcValue::I8(v)) => v.to_be_bytes().to_vec(),

            (Self::Ui16, SmcValue::U16(v)) => order.arrange(v.to_be_bytes()).to_vec(),
            (Self::Si16, SmcValue::I16(v)) => order.arrange(v.to_be_bytes()).to_vec(),
            (Self::Ui32, SmcValue::U32(v)) => order.arrange(v.to_be_bytes()).to_vec(),
            (Self::Si32, SmcValue::I32(v)) => order.arrange(v.to_be_bytes()).to_vec(),
            (Self::Ui64, SmcValue::U64(v)) => order.arrange(v.to_be_bytes()).to_vec(),
            (Self::Si64, SmcValue::I64(v)) => order.arrange(v.to_be_bytes()).to_vec(),
            (Self::Ioft, SmcValue::Ioft48_16(v)) => order.arrange(v.to_be_bytes()).to_vec(),

            (Self::Flt, SmcValue::F32(v)) => order.arrange(v.to_be_bytes()).to_vec(),

            (Self::Fixed(fp), SmcValue::Fixed(_) | SmcValue::U16(_) | SmcValue::I16(_)) => {
                let v = value.as_f64().ok_or_else(incompatible)?;
                fp.encode(v)?.to_vec()
            }

            (Self::Chars, SmcValue::Chars(s)) => {
                if !s.is_ascii() {
                    return Err(ValueError::NotAscii);
                }
                s.as_bytes().to_vec()
            }

            _ => return Err(incompatible()),
        };
        Ok(bytes)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
