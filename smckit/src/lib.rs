//! A library for interacting with the Apple System Management Controller (SMC).
//!
//! The controller exposes hardware state (temperatures, fan speeds, battery
//! and AC status, and more) as typed values addressed by four-character keys.
//! This crate provides the key and value codecs, a session type that owns the
//! privileged IOKit channel, and read/write transactions on top of it.
//!
//! ```no_run
//! use smckit::connection::Smc;
//!
//! let smc = Smc::open_default().unwrap();
//! let fans = smc.sensors().fans().unwrap();
//! for fan in fans {
//!     println!("fan {}: {} rpm", fan.index, fan.current_rpm);
//! }
//! ```
//!
//! Everything except [`iokit`] is portable; [`memory::MemoryChannel`] stands
//! in for the controller where there is none.

#![deny(clippy::unwrap_used)]

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod iokit;
pub mod key;
pub mod memory;
pub mod sensors;
pub mod structs;
pub mod transaction;
pub mod value;

pub use config::{ByteOrder, SmcConfig};
pub use connection::{ConnectionState, Smc};
pub use error::{ChannelStatus, Result, SmcError};
pub use key::{SmcKey, decode_key, encode_key};
pub use structs::{KeyInfo, RawValue};
pub use value::{DataType, FixedPoint, SmcValue, decode_fpe2, encode_fpe2};
