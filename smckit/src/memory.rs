//! An in-memory [`SmcChannel`] for exercising the protocol without hardware.
//!
//! The channel is a cheap handle over shared state, so a clone kept by the
//! caller can seed keys, inject failures and inspect transfer counters while
//! an [`Smc`](crate::connection::Smc) owns the other clone.
//!
//! ```
//! use smckit::{config::SmcConfig, connection::Smc, memory::MemoryChannel};
//!
//! let channel = MemoryChannel::new().with_key("FNum", b"ui8 ", &[2]);
//! let smc = Smc::connect(channel.clone(), SmcConfig::default()).unwrap();
//! assert_eq!(smc.read("FNum").unwrap().as_u64(), Some(2));
//! assert_eq!(channel.stats().reads, 1);
//! ```

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    channel::SmcChannel,
    error::{ChannelStatus, SMC_RESULT_KEY_NOT_FOUND},
    key::SmcKey,
    structs::{KeyInfo, SMC_BYTES_LEN, SmcBytes},
};

/// Firmware result for a write to a read-only key.
pub const SMC_RESULT_NOT_WRITABLE: u8 = 0x86;

/// `MACH_SEND_INVALID_DEST`, what a call on a released connection returns.
pub const MACH_SEND_INVALID_DEST: i32 = 0x1000_0003;

const KERN_INVALID_ARGUMENT: i32 = 4;

const KEY_COUNT: SmcKey = SmcKey::from_static(b"#KEY");

/// Counters of calls that reached the channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub opens: usize,
    pub closes: usize,
    pub key_infos: usize,
    pub reads: usize,
    pub writes: usize,
}

#[derive(Clone, Debug)]
struct Entry {
    info: KeyInfo,
    bytes: SmcBytes,
    writable: bool,
}

#[derive(Debug)]
struct State {
    entries: BTreeMap<SmcKey, Entry>,
    open: bool,
    fail_next: Option<ChannelStatus>,
    stats: ChannelStats,
}

#[derive(Clone, Debug)]
pub struct MemoryChannel {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    /// An empty controller holding only `#KEY`.
    ///
    /// Multi-byte integer values are stored as given, so callers seed them in
    /// the byte order their [`SmcConfig`](crate::config::SmcConfig) uses.
    pub fn new() -> Self {
        let channel = Self {
            state: Arc::new(Mutex::new(State {
                entries: BTreeMap::new(),
                open: false,
                fail_next: None,
                stats: ChannelStats::default(),
            })),
        };
        channel.lock().refresh_key_count();
        channel
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a writable key.
    ///
    /// # Panics
    ///
    /// If `name` is not a valid key or `bytes` exceeds [`SMC_BYTES_LEN`].
    pub fn with_key(self, name: &str, data_type: &[u8; 4], bytes: &[u8]) -> Self {
        self.insert(name, data_type, bytes, true);
        self
    }

    /// Adds a key that rejects writes.
    pub fn with_read_only_key(self, name: &str, data_type: &[u8; 4], bytes: &[u8]) -> Self {
        self.insert(name, data_type, bytes, false);
        self
    }

    pub fn insert(&self, name: &str, data_type: &[u8; 4], bytes: &[u8], writable: bool) {
        let key = SmcKey::new(name).unwrap_or_else(|e| panic!("bad key {name:?}: {e}"));
        assert!(bytes.len() <= SMC_BYTES_LEN, "value for {name} too long");
        let mut buf = SmcBytes::default();
        buf[..bytes.len()].copy_from_slice(bytes);
        let entry = Entry {
            info: KeyInfo::new(data_type, bytes.len() as u32),
            bytes: buf,
            writable,
        };
        let mut state = self.lock();
        state.entries.insert(key, entry);
        state.refresh_key_count();
    }

    /// The stored bytes of a key, if present.
    pub fn value(&self, name: &str) -> Option<Vec<u8>> {
        let key = SmcKey::new(name).ok()?;
        let state = self.lock();
        let entry = state.entries.get(&key)?;
        Some(entry.bytes[..entry.info.data_size as usize].to_vec())
    }

    /// Makes the next channel call, whatever it is, fail with `status`.
    pub fn fail_next(&self, status: ChannelStatus) {
        self.lock().fail_next = Some(status);
    }

    pub fn stats(&self) -> ChannelStats {
        self.lock().stats
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }
}

impl State {
    /// `#KEY` is big-endian whatever the order of the other integers.
    fn refresh_key_count(&mut self) {
        let count = self.entries.len() as u32 + u32::from(!self.entries.contains_key(&KEY_COUNT));
        let mut bytes = SmcBytes::default();
        bytes[..4].copy_from_slice(&count.to_be_bytes());
        self.entries.insert(
            KEY_COUNT,
            Entry {
                info: KeyInfo::new(b"ui32", 4),
                bytes,
                writable: false,
            },
        );
    }

    /// Consumes an injected failure and checks the handle is live.
    fn precheck(&mut self) -> Result<(), ChannelStatus> {
        if let Some(status) = self.fail_next.take() {
            return Err(status);
        }
        if !self.open {
            return Err(ChannelStatus::Kern(MACH_SEND_INVALID_DEST));
        }
        Ok(())
    }

    fn entry(&self, key: u32) -> Result<&Entry, ChannelStatus> {
        self.entries
            .get(&SmcKey::from_u32(key))
            .ok_or(ChannelStatus::Firmware(SMC_RESULT_KEY_NOT_FOUND))
    }
}

impl SmcChannel for MemoryChannel {
    fn open(&mut self) -> Result<(), ChannelStatus> {
        let mut state = self.lock();
        state.stats.opens += 1;
        if let Some(status) = state.fail_next.take() {
            return Err(status);
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ChannelStatus> {
        let mut state = self.lock();
        state.stats.closes += 1;
        state.precheck()?;
        state.open = false;
        Ok(())
    }

    fn key_info(&mut self, key: u32) -> Result<KeyInfo, ChannelStatus> {
        let mut state = self.lock();
        state.stats.key_infos += 1;
        state.precheck()?;
        Ok(state.entry(key)?.info)
    }

    fn read_bytes(&mut self, key: u32, info: &KeyInfo) -> Result<SmcBytes, ChannelStatus> {
        let mut state = self.lock();
        state.stats.reads += 1;
        state.precheck()?;
        let entry = state.entry(key)?;
        let mut out = SmcBytes::default();
        let len = (info.data_size as usize).min(SMC_BYTES_LEN);
        out[..len].copy_from_slice(&entry.bytes[..len]);
        Ok(out)
    }

    fn write_bytes(
        &mut self,
        key: u32,
        info: &KeyInfo,
        bytes: &[u8],
    ) -> Result<(), ChannelStatus> {
        let mut state = self.lock();
        state.stats.writes += 1;
        state.precheck()?;
        let entry = state.entry(key)?;
        if !entry.writable {
            return Err(ChannelStatus::Firmware(SMC_RESULT_NOT_WRITABLE));
        }
        if bytes.len() != entry.info.data_size as usize || info.data_size != entry.info.data_size
        {
            return Err(ChannelStatus::Kern(KERN_INVALID_ARGUMENT));
        }
        let slot = state
            .entries
            .get_mut(&SmcKey::from_u32(key))
            .ok_or(ChannelStatus::Firmware(SMC_RESULT_KEY_NOT_FOUND))?;
        slot.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn key_at_index(&mut self, index: u32) -> Result<u32, ChannelStatus> {
        let mut state = self.lock();
        state.precheck()?;
        state
            .entries
            .keys()
            .nth(index as usize)
            .map(|key| key.to_u32())
            .ok_or(ChannelStatus::Firmware(SMC_RESULT_KEY_NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_count_tracks_inserts() {
        let channel = MemoryChannel::new()
            .with_key("FNum", b"ui8 ", &[1])
            .with_key("TC0P", b"sp78", &[0x28, 0x00]);
        assert_eq!(channel.value("#KEY"), Some(vec![0, 0, 0, 3]));
    }

    #[test]
    fn calls_fail_while_closed() {
        let mut channel = MemoryChannel::new().with_key("FNum", b"ui8 ", &[1]);
        let key = SmcKey::from_static(b"FNum").to_u32();
        assert_eq!(
            channel.key_info(key),
            Err(ChannelStatus::Kern(MACH_SEND_INVALID_DEST))
        );
        channel.open().expect("open");
        assert_eq!(channel.key_info(key).map(|i| i.data_size), Ok(1));
    }

    #[test]
    fn injected_failure_hits_one_call() {
        let mut channel = MemoryChannel::new();
        channel.open().expect("open");
        channel.fail_next(ChannelStatus::Kern(-1));
        let key = KEY_COUNT.to_u32();
        assert_eq!(channel.key_info(key), Err(ChannelStatus::Kern(-1)));
        assert!(channel.key_info(key).is_ok());
    }

    #[test]
    fn read_only_keys_reject_writes() {
        let mut channel = MemoryChannel::new().with_read_only_key("BNum", b"ui8 ", &[1]);
        channel.open().expect("open");
        let key = SmcKey::from_static(b"BNum").to_u32();
        let info = channel.key_info(key).expect("info");
        assert_eq!(
            channel.write_bytes(key, &info, &[2]),
            Err(ChannelStatus::Firmware(SMC_RESULT_NOT_WRITABLE))
        );
        assert_eq!(channel.value("BNum"), Some(vec![1]));
    }
}
