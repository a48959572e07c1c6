//! The boundary to the privileged controller channel.

use crate::{
    error::ChannelStatus,
    structs::{KeyInfo, SmcBytes},
};

/// A privileged, stateful channel to the controller.
///
/// Implementations do no session bookkeeping of their own beyond what the
/// underlying handle needs; [`Smc`](crate::connection::Smc) guarantees that
/// `open` and `close` alternate and that no call is made while closed.
/// Keys are passed in their packed `u32` form.
pub trait SmcChannel: Send {
    /// Acquires the underlying handle.
    fn open(&mut self) -> Result<(), ChannelStatus>;

    /// Releases the underlying handle.
    fn close(&mut self) -> Result<(), ChannelStatus>;

    /// Fetches type, size and attributes for a key.
    ///
    /// An unknown key is reported as
    /// [`ChannelStatus::Firmware`]`(`[`SMC_RESULT_KEY_NOT_FOUND`](crate::error::SMC_RESULT_KEY_NOT_FOUND)`)`.
    fn key_info(&mut self, key: u32) -> Result<KeyInfo, ChannelStatus>;

    /// Reads `info.data_size` bytes for a key.
    fn read_bytes(&mut self, key: u32, info: &KeyInfo) -> Result<SmcBytes, ChannelStatus>;

    /// Writes `bytes`, whose length equals `info.data_size`, to a key.
    fn write_bytes(&mut self, key: u32, info: &KeyInfo, bytes: &[u8])
    -> Result<(), ChannelStatus>;

    /// Returns the packed key stored at `index` in the controller's key table.
    fn key_at_index(&mut self, index: u32) -> Result<u32, ChannelStatus>;
}
