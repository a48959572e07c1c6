//! Key lookup and the read/write transactions.
//!
//! Every transaction re-fetches the key's metadata from the controller, then
//! moves exactly `data_size` bytes and converts them with the codec selected
//! by the key's data type.

use std::fmt;

use tracing::debug;

use crate::{
    channel::SmcChannel,
    connection::Smc,
    error::{ChannelStatus, Result, SmcError, ValueError},
    key::SmcKey,
    structs::{KeyInfo, RawValue, SMC_BYTES_LEN},
    value::SmcValue,
};

/// Key holding the number of keys the controller exposes.
pub const KEY_COUNT: SmcKey = SmcKey::from_static(b"#KEY");

fn parse_key(name: &str) -> Result<SmcKey> {
    SmcKey::new(name).map_err(|_| SmcError::key_not_found(name))
}

fn map_status(key: SmcKey, status: ChannelStatus) -> SmcError {
    if status.is_key_not_found() {
        SmcError::key_not_found(key)
    } else {
        SmcError::ChannelError(status)
    }
}

fn check_size(key: SmcKey, expected: usize, value: &SmcValue) -> Result<()> {
    let actual = value.natural_size();
    if actual != expected {
        return Err(SmcError::SizeMismatch {
            key,
            expected,
            actual,
        });
    }
    Ok(())
}

fn lookup<C: SmcChannel>(channel: &mut C, key: SmcKey) -> Result<KeyInfo> {
    channel
        .key_info(key.to_u32())
        .map_err(|status| map_status(key, status))
}

impl<C: SmcChannel> Smc<C> {
    /// Fetches the type, size and attributes of a key.
    ///
    /// Names that are not valid keys fail with [`SmcError::KeyNotFound`]
    /// without reaching the controller.
    pub fn key_info(&self, name: &str) -> Result<KeyInfo> {
        self.key_info_for(parse_key(name)?)
    }

    pub fn key_info_for(&self, key: SmcKey) -> Result<KeyInfo> {
        self.transact(|channel| lookup(channel, key))
    }

    /// `true` if the controller knows the key.
    pub fn is_key_valid(&self, name: &str) -> bool {
        self.key_info(name).is_ok()
    }

    /// Reads a key's bytes without interpreting them.
    pub fn read_raw(&self, name: &str) -> Result<RawValue> {
        self.read_raw_for(parse_key(name)?)
    }

    pub fn read_raw_for(&self, key: SmcKey) -> Result<RawValue> {
        self.transact(|channel| {
            let info = lookup(channel, key)?;
            let size = info.data_size as usize;
            if size > SMC_BYTES_LEN {
                return Err(SmcError::SizeMismatch {
                    key,
                    expected: size,
                    actual: SMC_BYTES_LEN,
                });
            }
            let bytes = channel
                .read_bytes(key.to_u32(), &info)
                .map_err(|status| map_status(key, status))?;
            debug!(%key, data_type = %info.data_type, size, "read key");
            Ok(RawValue {
                key,
                info,
                bytes,
                byte_order: self.config().byte_order,
            })
        })
    }

    /// Reads and decodes a key.
    ///
    /// ```no_run
    /// use smckit::connection::Smc;
    ///
    /// let smc = Smc::open_default().unwrap();
    /// println!("fans: {}", smc.read("FNum").unwrap());
    /// ```
    pub fn read(&self, name: &str) -> Result<SmcValue> {
        self.read_for(parse_key(name)?)
    }

    pub fn read_for(&self, key: SmcKey) -> Result<SmcValue> {
        self.read_raw_for(key)?.value()
    }

    /// Encodes `value` with the key's codec and writes it.
    ///
    /// The encoded size must equal the size the controller declares for the
    /// key; a mismatch is rejected before anything is sent.
    /// [`SmcValue::Bytes`] skips the codec and is written as-is.
    pub fn write(&self, name: &str, value: &SmcValue) -> Result<()> {
        self.write_for(parse_key(name)?, value)
    }

    pub fn write_for(&self, key: SmcKey, value: &SmcValue) -> Result<()> {
        let byte_order = self.config().byte_order;
        self.transact(|channel| {
            let info = lookup(channel, key)?;
            let expected = info.data_size as usize;
            let bytes = match (value, info.data_type.data_type()) {
                (SmcValue::Bytes(bytes), _) => {
                    check_size(key, expected, value)?;
                    bytes.clone()
                }
                (_, None) => {
                    return Err(SmcError::UnsupportedType {
                        key,
                        data_type: info.data_type,
                    });
                }
                (_, Some(data_type)) => {
                    check_size(key, expected, value)?;
                    data_type
                        .encode(value, byte_order)
                        .map_err(|err| match err {
                            ValueError::Incompatible { value, .. } => SmcError::TypeMismatch {
                                key,
                                data_type: info.data_type,
                                value,
                            },
                            source => SmcError::Value { key, source },
                        })?
                }
            };
            channel
                .write_bytes(key.to_u32(), &info, &bytes)
                .map_err(|status| map_status(key, status))?;
            debug!(%key, data_type = %info.data_type, size = expected, "wrote key");
            Ok(())
        })
    }

    /// Writes raw bytes; their length must match the key's declared size.
    pub fn write_raw(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.write(name, &SmcValue::Bytes(bytes.to_vec()))
    }

    /// Number of keys the controller exposes (`#KEY`).
    ///
    /// `#KEY` is big-endian on every controller, independent of
    /// [`SmcConfig::byte_order`](crate::config::SmcConfig::byte_order).
    pub fn key_count(&self) -> Result<u32> {
        let raw = self.read_raw_for(KEY_COUNT)?;
        let valid = raw.valid_bytes();
        let Some(bytes) = valid.first_chunk::<4>() else {
            return Err(SmcError::Value {
                key: KEY_COUNT,
                source: ValueError::Truncated {
                    needed: 4,
                    available: valid.len(),
                },
            });
        };
        Ok(u32::from_be_bytes(*bytes))
    }

    /// The key at position `index` of the controller's key table.
    pub fn key_at_index(&self, index: u32) -> Result<SmcKey> {
        self.transact(|channel| {
            channel
                .key_at_index(index)
                .map(SmcKey::from_u32)
                .map_err(SmcError::ChannelError)
        })
    }

    /// Every key the controller exposes, in table order.
    pub fn all_keys(&self) -> Result<Vec<SmcKey>> {
        let total = self.key_count()?;
        (0..total).map(|i| self.key_at_index(i)).collect()
    }

    /// Iterates over every key and its raw value.
    ///
    /// Keys that fail to read yield an error item and iteration continues.
    pub fn values(&self) -> Result<Values<'_, C>> {
        let total_count = self.key_count()?;
        Ok(Values {
            smc: self,
            total_count,
            current: 0,
        })
    }
}

pub struct Values<'a, C: SmcChannel> {
    smc: &'a Smc<C>,
    total_count: u32,
    current: u32,
}

/// A failure while reading one entry of the key table.
#[derive(Debug)]
pub struct IndexedError {
    pub index: u32,
    pub key: Option<SmcKey>,
    pub source: SmcError,
}

impl std::error::Error for IndexedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl fmt::Display for IndexedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = self.key {
            write!(f, "{} ", key)?;
        }
        write!(f, "index: {}, error: {}", self.index, self.source)
    }
}

impl<C: SmcChannel> Iterator for Values<'_, C> {
    type Item = std::result::Result<RawValue, IndexedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.total_count {
            return None;
        }
        let index = self.current;
        self.current += 1;
        let key = match self.smc.key_at_index(index) {
            Ok(key) => key,
            Err(source) => {
                return Some(Err(IndexedError {
                    index,
                    key: None,
                    source,
                }));
            }
        };
        Some(self.smc.read_raw_for(key).map_err(|source| IndexedError {
            index,
            key: Some(key),
            source,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total_count - self.current) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ByteOrder, SmcConfig},
        memory::{MemoryChannel, SMC_RESULT_NOT_WRITABLE},
        structs::SmcBytes,
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn channel() -> MemoryChannel {
        MemoryChannel::new()
            .with_key("FNum", b"ui8 ", &[2])
            .with_key("F0Mn", b"fpe2", &[31, 64])
            .with_key("TC0P", b"sp78", &[0x2a, 0x80])
            .with_key("MSDI", b"flag", &[1])
            .with_key("LSOF", b"{lso", &[0, 1, 2])
            .with_read_only_key("RPlt", b"ch8*", b"j314\0\0\0\0")
    }

    fn connect(channel: &MemoryChannel) -> Smc<MemoryChannel> {
        let config = SmcConfig::default().with_byte_order(ByteOrder::Big);
        Smc::connect(channel.clone(), config).expect("open")
    }

    #[rstest]
    #[case("FNum", SmcValue::U8(2))]
    #[case("F0Mn", SmcValue::Fixed(2000.0))]
    #[case("TC0P", SmcValue::Fixed(42.5))]
    #[case("MSDI", SmcValue::Bool(true))]
    #[case("RPlt", SmcValue::Chars("j314".into()))]
    fn reads_decode_by_type(channel: MemoryChannel, #[case] key: &str, #[case] expected: SmcValue) {
        let smc = connect(&channel);
        assert_eq!(smc.read(key).expect("read"), expected);
    }

    #[rstest]
    fn unknown_type_is_unsupported_but_raw_readable(channel: MemoryChannel) {
        let smc = connect(&channel);
        let err = smc.read("LSOF").expect_err("no codec");
        assert!(matches!(err, SmcError::UnsupportedType { .. }));
        assert_eq!(smc.read_raw("LSOF").expect("raw").valid_bytes(), &[0, 1, 2]);
    }

    #[rstest]
    #[case("")]
    #[case("Vim")]
    #[case("What is this new devilry?")]
    fn malformed_names_never_reach_the_channel(channel: MemoryChannel, #[case] name: &str) {
        let smc = connect(&channel);
        assert!(matches!(smc.read(name), Err(SmcError::KeyNotFound { .. })));
        assert_eq!(channel.stats().key_infos, 0);
    }

    #[rstest]
    fn missing_key_is_not_found(channel: MemoryChannel) {
        let smc = connect(&channel);
        let err = smc.key_info("ZZZZ").expect_err("missing");
        assert!(matches!(err, SmcError::KeyNotFound { ref key } if key == "ZZZZ"));
        assert!(!err.is_transient());
    }

    #[rstest]
    fn channel_failures_are_distinguishable(channel: MemoryChannel) {
        let smc = connect(&channel);
        channel.fail_next(ChannelStatus::Kern(-536870212));
        let err = smc.read("FNum").expect_err("channel down");
        assert!(matches!(err, SmcError::ChannelError(ChannelStatus::Kern(_))));
        assert!(err.is_transient());
        assert!(smc.read("FNum").is_ok());
    }

    #[rstest]
    fn write_then_read_returns_value(channel: MemoryChannel) {
        let smc = connect(&channel);
        smc.write("F0Mn", &SmcValue::U16(3645)).expect("write");
        assert_eq!(channel.value("F0Mn"), Some(vec![56, 244]));
        assert_eq!(smc.read("F0Mn").expect("read"), SmcValue::Fixed(3645.0));
    }

    #[rstest]
    fn size_mismatch_is_rejected_before_transfer(channel: MemoryChannel) {
        let smc = connect(&channel);
        let err = smc.write("FNum", &SmcValue::U16(3)).expect_err("too wide");
        assert!(matches!(
            err,
            SmcError::SizeMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(channel.stats().writes, 0);
        assert_eq!(channel.value("FNum"), Some(vec![2]));
    }

    #[rstest]
    fn incompatible_kind_is_a_type_mismatch(channel: MemoryChannel) {
        let smc = connect(&channel);
        let err = smc.write("FNum", &SmcValue::I8(-1)).expect_err("signed into ui8");
        assert!(matches!(err, SmcError::TypeMismatch { value: "i8", .. }));
        assert_eq!(channel.stats().writes, 0);
    }

    #[rstest]
    fn out_of_range_fixed_point_is_a_value_error(channel: MemoryChannel) {
        let smc = connect(&channel);
        let err = smc.write("TC0P", &SmcValue::Fixed(300.0)).expect_err("too hot");
        assert!(matches!(
            err,
            SmcError::Value {
                source: ValueError::OutOfRange { .. },
                ..
            }
        ));
    }

    #[rstest]
    fn unsupported_type_only_accepts_raw_bytes(channel: MemoryChannel) {
        let smc = connect(&channel);
        assert!(matches!(
            smc.write("LSOF", &SmcValue::U8(1)),
            Err(SmcError::UnsupportedType { .. })
        ));
        smc.write_raw("LSOF", &[9, 8, 7]).expect("raw write");
        assert_eq!(channel.value("LSOF"), Some(vec![9, 8, 7]));
    }

    #[rstest]
    fn read_only_key_reports_firmware_status(channel: MemoryChannel) {
        let smc = connect(&channel);
        let err = smc
            .write("RPlt", &SmcValue::Chars("m1m1\0\0\0\0".into()))
            .expect_err("read only");
        assert!(matches!(
            err,
            SmcError::ChannelError(ChannelStatus::Firmware(SMC_RESULT_NOT_WRITABLE))
        ));
    }

    #[rstest]
    fn counts_and_enumerates_keys(channel: MemoryChannel) {
        let smc = connect(&channel);
        assert_eq!(smc.key_count().expect("count"), 7);
        let keys = smc.all_keys().expect("keys");
        assert_eq!(keys.first(), Some(&KEY_COUNT));
        assert!(keys.contains(&SmcKey::from_static(b"TC0P")));

        let values: Vec<_> = smc.values().expect("iter").collect();
        assert_eq!(values.len(), 7);
        assert!(values.iter().all(|v| v.is_ok()));
    }

    #[rstest]
    fn key_count_is_big_endian_under_little_endian_config(channel: MemoryChannel) {
        let config = SmcConfig::default().with_byte_order(ByteOrder::Little);
        let smc = Smc::connect(channel.clone(), config).expect("open");
        assert_eq!(channel.value("#KEY"), Some(vec![0, 0, 0, 7]));
        assert_eq!(smc.key_count().expect("count"), 7);
        assert_eq!(smc.all_keys().expect("keys").len(), 7);
    }

    /// Declares `#KEY` two bytes wide.
    struct ShortKeyCount;

    impl SmcChannel for ShortKeyCount {
        fn open(&mut self) -> std::result::Result<(), ChannelStatus> {
            Ok(())
        }

        fn close(&mut self) -> std::result::Result<(), ChannelStatus> {
            Ok(())
        }

        fn key_info(&mut self, _key: u32) -> std::result::Result<KeyInfo, ChannelStatus> {
            Ok(KeyInfo::new(b"ui32", 2))
        }

        fn read_bytes(
            &mut self,
            _key: u32,
            _info: &KeyInfo,
        ) -> std::result::Result<SmcBytes, ChannelStatus> {
            Ok([0x05; SMC_BYTES_LEN])
        }

        fn write_bytes(
            &mut self,
            _key: u32,
            _info: &KeyInfo,
            _bytes: &[u8],
        ) -> std::result::Result<(), ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }

        fn key_at_index(&mut self, _index: u32) -> std::result::Result<u32, ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }
    }

    #[test]
    fn short_key_count_is_truncated() {
        let smc = Smc::connect(ShortKeyCount, SmcConfig::default()).expect("open");
        let err = smc.key_count().expect_err("two bytes");
        assert!(matches!(
            err,
            SmcError::Value {
                key: KEY_COUNT,
                source: ValueError::Truncated {
                    needed: 4,
                    available: 2
                },
            }
        ));
    }

    #[rstest]
    fn enumeration_reports_failures_per_index(channel: MemoryChannel) {
        let smc = connect(&channel);
        let mut values = smc.values().expect("iter");
        channel.fail_next(ChannelStatus::Kern(-1));
        let first = values.next().expect("item");
        let err = first.expect_err("injected");
        assert_eq!(err.index, 0);
        assert_eq!(err.key, None);
        assert!(values.next().expect("item").is_ok());
    }

    #[test]
    fn transactions_need_an_open_session() {
        let smc = Smc::new(MemoryChannel::new(), SmcConfig::default());
        assert!(matches!(smc.key_count(), Err(SmcError::NotOpen)));
        assert!(matches!(smc.write_raw("#KEY", &[0; 4]), Err(SmcError::NotOpen)));
        assert!(!smc.is_key_valid("#KEY"));
    }
}
