//! Four-character SMC key names and their packed `u32` form.
//!
//! The controller addresses every register by a key such as `TC0P` or
//! `#KEY`. On the wire a key is a big-endian `u32`: character 0 lands in
//! bits 31..24 and character 3 in bits 7..0.

use std::{borrow::Cow, fmt, str::FromStr};

use crate::error::KeyError;

/// Number of characters in an SMC key.
pub const KEY_LEN: usize = 4;

/// A validated four-character SMC key.
///
/// # Example
///
/// ```
/// use smckit::key::SmcKey;
///
/// let key: SmcKey = "F0Ac".parse().unwrap();
/// assert_eq!(key.to_u32(), 1177567587);
/// assert_eq!(SmcKey::from_u32(1177567587), key);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SmcKey([u8; KEY_LEN]);

impl SmcKey {
    /// Parses and validates a key name.
    pub fn new(name: &str) -> Result<Self, KeyError> {
        Self::try_from(name.as_bytes())
    }

    /// Builds a key from bytes known at compile time, e.g. `SmcKey::from_static(b"FNum")`.
    pub const fn from_static(bytes: &[u8; KEY_LEN]) -> Self {
        Self(*bytes)
    }

    /// Unpacks a key from its wire representation.
    ///
    /// Every `u32` unpacks to some key, so this never fails; use
    /// [`SmcKey::is_well_formed`] if the source is untrusted.
    pub const fn from_u32(packed: u32) -> Self {
        Self(packed.to_be_bytes())
    }

    /// Packs the key into its wire representation.
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// `true` if the key would be accepted by [`SmcKey::new`].
    pub fn is_well_formed(&self) -> bool {
        validate(&self.0).is_ok()
    }

    /// The key as text; non-printable bytes are replaced.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

fn validate(bytes: &[u8]) -> Result<(), KeyError> {
    if bytes.len() != KEY_LEN {
        return Err(KeyError::Length(bytes.len()));
    }
    if let Some(pos) = bytes.iter().position(|b| !(0x20..=0x7e).contains(b)) {
        return Err(KeyError::IllegalChar {
            position: pos,
            byte: bytes[pos],
        });
    }
    if bytes[0] == b' ' {
        return Err(KeyError::LeadingSpace);
    }
    Ok(())
}

impl TryFrom<&[u8]> for SmcKey {
    type Error = KeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        validate(bytes)?;
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }
}

impl TryFrom<&[u8; KEY_LEN]> for SmcKey {
    type Error = KeyError;

    fn try_from(bytes: &[u8; KEY_LEN]) -> Result<Self, Self::Error> {
        Self::try_from(bytes.as_slice())
    }
}

impl FromStr for SmcKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<SmcKey> for u32 {
    fn from(key: SmcKey) -> Self {
        key.to_u32()
    }
}

impl fmt::Display for SmcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for SmcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SmcKey({:?})", self.as_str())
    }
}

/// Packs a key into its `u32` wire form.
pub fn encode_key(key: &SmcKey) -> u32 {
    key.to_u32()
}

/// Unpacks a `u32` wire value into a key.
pub fn decode_key(packed: u32) -> SmcKey {
    SmcKey::from_u32(packed)
}
