//! [`SmcChannel`](crate::channel::SmcChannel) over the IOKit `AppleSMC` user client.
//!
//! On targets other than macOS the channel exists but can never be opened.

#[cfg(target_os = "macos")]
pub use self::macos::{IoKitChannel, err_str};
#[cfg(not(target_os = "macos"))]
pub use self::unsupported::{IoKitChannel, err_str};

#[cfg(target_os = "macos")]
#[allow(non_camel_case_types, dead_code)]
mod macos {
    use std::{
        borrow::Cow,
        ffi::{CStr, CString, c_char, c_void},
    };

    use libc::{KERN_SUCCESS, kern_return_t, mach_error_string, mach_port_t};
    use objc2_io_kit::{
        IOConnectCallStructMethod, IOIteratorNext, IOMainPort, IOObjectRelease, IOServiceClose,
        IOServiceGetMatchingServices, IOServiceMatching, IOServiceOpen, io_connect_t,
    };

    use crate::{
        channel::SmcChannel,
        config::SmcConfig,
        error::ChannelStatus,
        structs::{DataTypeCode, KeyInfo, SMC_BYTES_LEN, SmcBytes},
    };

    const KERNEL_INDEX_SMC: u32 = 2;
    const SMC_CMD_READ_BYTES: u8 = 5;
    const SMC_CMD_WRITE_BYTES: u8 = 6;
    const SMC_CMD_READ_INDEX: u8 = 8;
    const SMC_CMD_READ_KEYINFO: u8 = 9;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default)]
    struct SMCKeyData_vers {
        major: c_char,
        minor: c_char,
        build: c_char,
        reserved: [c_char; 1],
        release: u16,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default)]
    struct SMCKeyData_plimitData {
        version: u16,
        length: u16,
        cpu_plimit: u32,
        gpu_plimit: u32,
        mem_plimit: u32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default)]
    struct SMCKeyData_keyInfo {
        data_size: u32,
        data_type: u32,
        data_attributes: u8,
    }

    /// Parameter block exchanged with the user client, in and out.
    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default)]
    struct SMCKeyData {
        key: u32,
        vers: SMCKeyData_vers,
        plimit_data: SMCKeyData_plimitData,
        key_info: SMCKeyData_keyInfo,
        result: u8,
        status: u8,
        data8: u8,
        data32: u32,
        bytes: SmcBytes,
    }

    unsafe extern "C" {
        static mach_task_self_: mach_port_t;
    }

    fn mach_task_self() -> mach_port_t {
        unsafe { mach_task_self_ }
    }

    pub fn err_str(error_value: kern_return_t) -> Cow<'static, str> {
        unsafe { CStr::from_ptr(mach_error_string(error_value)).to_string_lossy() }
    }

    /// Connection to the `AppleSMC` IOKit service.
    pub struct IoKitChannel {
        service: CString,
        /// zero while closed
        conn: io_connect_t,
    }

    impl IoKitChannel {
        pub fn new(config: &SmcConfig) -> Self {
            // An interior NUL can never name a service; open() reports it.
            let service = CString::new(config.service.as_str()).unwrap_or_default();
            Self { service, conn: 0 }
        }

        fn smc_call(
            &self,
            input_struct: &SMCKeyData,
            output_struct: &mut SMCKeyData,
        ) -> Result<(), ChannelStatus> {
            let res = unsafe {
                let mut output_struct_cnt = size_of::<SMCKeyData>();
                IOConnectCallStructMethod(
                    self.conn,
                    KERNEL_INDEX_SMC,
                    input_struct as *const _ as *const c_void,
                    size_of::<SMCKeyData>(),
                    output_struct as *mut _ as *mut c_void,
                    &raw mut output_struct_cnt,
                )
            };
            if res != KERN_SUCCESS {
                return Err(ChannelStatus::Kern(res));
            }
            if output_struct.result != 0 {
                return Err(ChannelStatus::Firmware(output_struct.result));
            }
            Ok(())
        }
    }

    impl SmcChannel for IoKitChannel {
        fn open(&mut self) -> Result<(), ChannelStatus> {
            if self.service.as_bytes().is_empty() {
                return Err(ChannelStatus::Unavailable);
            }
            unsafe {
                let mut main_port = 0;
                let res = IOMainPort(0, &raw mut main_port);
                if res != KERN_SUCCESS {
                    tracing::error!("can not initialize IO main port: {}", err_str(res));
                    return Err(ChannelStatus::Kern(res));
                }
                let matching_dict =
                    IOServiceMatching(self.service.as_ptr()).and_then(|d| d.downcast().ok());
                let mut iterator = 0;
                let res = IOServiceGetMatchingServices(main_port, matching_dict, &raw mut iterator);
                if res != KERN_SUCCESS {
                    tracing::error!(
                        "can not get matching service {:?}: {}",
                        self.service,
                        err_str(res)
                    );
                    return Err(ChannelStatus::Kern(res));
                }
                let device = IOIteratorNext(iterator);
                IOObjectRelease(iterator);
                if device == 0 {
                    return Err(ChannelStatus::Unavailable);
                }
                let mut conn = 0;
                let res = IOServiceOpen(device, mach_task_self(), 0, &raw mut conn);
                IOObjectRelease(device);
                if res != KERN_SUCCESS {
                    tracing::error!("IOServiceOpen() = {:08x}: {}", res, err_str(res));
                    return Err(ChannelStatus::Kern(res));
                }
                self.conn = conn;
            }
            Ok(())
        }

        fn close(&mut self) -> Result<(), ChannelStatus> {
            let conn = std::mem::take(&mut self.conn);
            let res = IOServiceClose(conn);
            if res != KERN_SUCCESS {
                return Err(ChannelStatus::Kern(res));
            }
            Ok(())
        }

        fn key_info(&mut self, key: u32) -> Result<KeyInfo, ChannelStatus> {
            let input_struct = SMCKeyData {
                key,
                data8: SMC_CMD_READ_KEYINFO,
                ..Default::default()
            };
            let mut output_struct = SMCKeyData::default();
            self.smc_call(&input_struct, &mut output_struct)?;
            let info = output_struct.key_info;
            Ok(KeyInfo {
                data_size: info.data_size,
                data_type: DataTypeCode::from_u32(info.data_type),
                data_attributes: info.data_attributes,
            })
        }

        fn read_bytes(&mut self, key: u32, info: &KeyInfo) -> Result<SmcBytes, ChannelStatus> {
            let input_struct = SMCKeyData {
                key,
                data8: SMC_CMD_READ_BYTES,
                key_info: SMCKeyData_keyInfo {
                    data_size: info.data_size,
                    data_type: info.data_type.to_u32(),
                    data_attributes: info.data_attributes,
                },
                ..Default::default()
            };
            let mut output_struct = SMCKeyData::default();
            self.smc_call(&input_struct, &mut output_struct)?;
            Ok(output_struct.bytes)
        }

        fn write_bytes(
            &mut self,
            key: u32,
            info: &KeyInfo,
            bytes: &[u8],
        ) -> Result<(), ChannelStatus> {
            if bytes.len() > SMC_BYTES_LEN {
                return Err(ChannelStatus::Kern(libc::KERN_INVALID_ARGUMENT));
            }
            let mut write_bytes = SmcBytes::default();
            write_bytes[..bytes.len()].copy_from_slice(bytes);
            let input_struct = SMCKeyData {
                key,
                data8: SMC_CMD_WRITE_BYTES,
                key_info: SMCKeyData_keyInfo {
                    data_size: info.data_size,
                    ..Default::default()
                },
                bytes: write_bytes,
                ..Default::default()
            };
            let mut output_struct = SMCKeyData::default();
            self.smc_call(&input_struct, &mut output_struct)
        }

        fn key_at_index(&mut self, index: u32) -> Result<u32, ChannelStatus> {
            let input_struct = SMCKeyData {
                data8: SMC_CMD_READ_INDEX,
                data32: index,
                ..Default::default()
            };
            let mut output_struct = SMCKeyData::default();
            self.smc_call(&input_struct, &mut output_struct)?;
            Ok(output_struct.key)
        }
    }

    impl Drop for IoKitChannel {
        fn drop(&mut self) {
            if self.conn != 0 {
                IOServiceClose(self.conn);
            }
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod unsupported {
    use std::borrow::Cow;

    use crate::{
        channel::SmcChannel,
        config::SmcConfig,
        error::ChannelStatus,
        structs::{KeyInfo, SmcBytes},
    };

    pub fn err_str(error_value: i32) -> Cow<'static, str> {
        Cow::Owned(format!("kern_return_t {error_value}"))
    }

    /// Stub: there is no `AppleSMC` service outside macOS.
    pub struct IoKitChannel;

    impl IoKitChannel {
        pub fn new(_config: &SmcConfig) -> Self {
            Self
        }
    }

    impl SmcChannel for IoKitChannel {
        fn open(&mut self) -> Result<(), ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }

        fn close(&mut self) -> Result<(), ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }

        fn key_info(&mut self, _key: u32) -> Result<KeyInfo, ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }

        fn read_bytes(&mut self, _key: u32, _info: &KeyInfo) -> Result<SmcBytes, ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }

        fn write_bytes(
            &mut self,
            _key: u32,
            _info: &KeyInfo,
            _bytes: &[u8],
        ) -> Result<(), ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }

        fn key_at_index(&mut self, _index: u32) -> Result<u32, ChannelStatus> {
            Err(ChannelStatus::Unavailable)
        }
    }

}
