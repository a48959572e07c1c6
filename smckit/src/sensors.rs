//! Named readings built from well-known keys.
//!
//! Which keys exist varies by model. Accessors for counts and flags treat a
//! missing key as "none" (zero fans, no battery, no disc) instead of an
//! error; accessors for a specific sensor propagate [`SmcError::KeyNotFound`].

use crate::{
    channel::SmcChannel,
    connection::Smc,
    error::{Result, SmcError},
    iokit::IoKitChannel,
    structs::RawValue,
    value::{DataType, SmcValue},
};

pub const KEY_FAN_COUNT: &str = "FNum";
pub const KEY_BATTERY_POWERED: &str = "BATP";
pub const KEY_BATTERY_COUNT: &str = "BNum";
pub const KEY_BATTERY_INFO: &str = "BSIn";
pub const KEY_CHARGING: &str = "CHBI";
pub const KEY_AC_PRESENT: &str = "AC-W";
pub const KEY_DISC_IN_DRIVE: &str = "MSDI";

/// Bit of `BSIn` set while the battery reports healthy.
const BATTERY_OK_BIT: u64 = 1 << 6;

/// A temperature sensor key with a human readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureSensor {
    pub key: &'static str,
    pub name: &'static str,
}

const fn sensor(key: &'static str, name: &'static str) -> TemperatureSensor {
    TemperatureSensor { key, name }
}

/// Temperature keys seen across Mac models. No machine has all of them.
pub const TEMPERATURE_SENSORS: &[TemperatureSensor] = &[
    sensor("TA0P", "Ambient"),
    sensor("TA1P", "Ambient 2"),
    sensor("TB0T", "Battery"),
    sensor("TB1T", "Battery 1"),
    sensor("TB2T", "Battery 2"),
    sensor("TC0D", "CPU diode"),
    sensor("TC0E", "CPU diode virtual"),
    sensor("TC0F", "CPU diode filtered"),
    sensor("TC0H", "CPU heatsink"),
    sensor("TC0P", "CPU proximity"),
    sensor("TCXC", "PECI CPU"),
    sensor("TG0D", "GPU diode"),
    sensor("TG0H", "GPU heatsink"),
    sensor("TG0P", "GPU proximity"),
    sensor("TH0P", "HDD proximity"),
    sensor("TL0P", "LCD proximity"),
    sensor("TM0P", "Memory proximity"),
    sensor("TN0P", "Northbridge proximity"),
    sensor("TO0P", "Optical drive proximity"),
    sensor("TW0P", "Airport proximity"),
    sensor("Tm0P", "Misc proximity"),
    sensor("Tp0P", "Power supply proximity"),
    sensor("Ts0P", "Palm rest"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub sensor: TemperatureSensor,
    pub celsius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanReading {
    pub index: u32,
    pub current_rpm: u32,
    pub min_rpm: u32,
    pub max_rpm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerStatus {
    pub battery_powered: bool,
    pub ac_present: bool,
    pub charging: bool,
    pub battery_ok: bool,
    pub battery_count: u32,
}

/// Typed accessors over a session, see [`Smc::sensors`].
pub struct Sensors<'a, C: SmcChannel = IoKitChannel> {
    smc: &'a Smc<C>,
}

impl<C: SmcChannel> Smc<C> {
    pub fn sensors(&self) -> Sensors<'_, C> {
        Sensors { smc: self }
    }
}

fn fan_key(index: u32, suffix: &str) -> String {
    format!("F{index}{suffix}")
}

fn rpm(value: f64) -> u32 {
    value.max(0.0).round() as u32
}

fn missing_as<T>(result: Result<T>, default: T) -> Result<T> {
    match result {
        Err(SmcError::KeyNotFound { .. }) => Ok(default),
        other => other,
    }
}

impl<C: SmcChannel> Sensors<'_, C> {
    fn decoded(&self, name: &str) -> Result<(RawValue, SmcValue)> {
        let raw = self.smc.read_raw(name)?;
        let value = raw.value()?;
        Ok((raw, value))
    }

    fn numeric(&self, name: &str) -> Result<f64> {
        let (raw, value) = self.decoded(name)?;
        value.as_f64().ok_or(SmcError::UnsupportedType {
            key: raw.key,
            data_type: raw.info.data_type,
        })
    }

    fn flag(&self, name: &str) -> Result<bool> {
        let (raw, value) = self.decoded(name)?;
        value.as_bool().ok_or(SmcError::UnsupportedType {
            key: raw.key,
            data_type: raw.info.data_type,
        })
    }

    fn bits(&self, name: &str) -> Result<u64> {
        let (raw, value) = self.decoded(name)?;
        value.as_u64().ok_or(SmcError::UnsupportedType {
            key: raw.key,
            data_type: raw.info.data_type,
        })
    }

    fn count(&self, name: &str) -> Result<u32> {
        let value = self.numeric(name)?;
        Ok(value.max(0.0) as u32)
    }

    /// Temperature in degrees Celsius.
    pub fn temperature(&self, key: &str) -> Result<f64> {
        self.numeric(key)
    }

    /// Reads every sensor in [`TEMPERATURE_SENSORS`] this machine has.
    pub fn all_temperatures(&self) -> Result<Vec<TemperatureReading>> {
        let mut readings = Vec::new();
        for sensor in TEMPERATURE_SENSORS {
            match self.temperature(sensor.key) {
                Ok(celsius) => readings.push(TemperatureReading {
                    sensor: *sensor,
                    celsius,
                }),
                Err(SmcError::KeyNotFound { .. } | SmcError::UnsupportedType { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(readings)
    }

    /// Number of fans; 0 when the controller has no fan keys.
    pub fn fan_count(&self) -> Result<u32> {
        missing_as(self.count(KEY_FAN_COUNT), 0)
    }

    pub fn fan_speed(&self, index: u32) -> Result<u32> {
        self.numeric(&fan_key(index, "Ac")).map(rpm)
    }

    pub fn fan_min_speed(&self, index: u32) -> Result<u32> {
        self.numeric(&fan_key(index, "Mn")).map(rpm)
    }

    pub fn fan_max_speed(&self, index: u32) -> Result<u32> {
        self.numeric(&fan_key(index, "Mx")).map(rpm)
    }

    pub fn fan_target_speed(&self, index: u32) -> Result<u32> {
        self.numeric(&fan_key(index, "Tg")).map(rpm)
    }

    /// Current, min and max speed of every fan; empty on fanless machines.
    pub fn fans(&self) -> Result<Vec<FanReading>> {
        (0..self.fan_count()?)
            .map(|index| {
                Ok(FanReading {
                    index,
                    current_rpm: self.fan_speed(index)?,
                    min_rpm: self.fan_min_speed(index)?,
                    max_rpm: self.fan_max_speed(index)?,
                })
            })
            .collect()
    }

    /// Sets the speed floor of a fan. Usually needs root.
    pub fn set_fan_min_speed(&self, index: u32, rpm: u32) -> Result<()> {
        let name = fan_key(index, "Mn");
        let info = self.smc.key_info(&name)?;
        let value = match info.data_type.data_type() {
            Some(DataType::Flt) => SmcValue::F32(rpm as f32),
            _ => SmcValue::Fixed(f64::from(rpm)),
        };
        self.smc.write(&name, &value)
    }

    pub fn is_battery_powered(&self) -> Result<bool> {
        missing_as(self.flag(KEY_BATTERY_POWERED), false)
    }

    /// Batteries the machine supports; 0 on desktops.
    pub fn battery_count(&self) -> Result<u32> {
        missing_as(self.count(KEY_BATTERY_COUNT), 0)
    }

    pub fn is_charging(&self) -> Result<bool> {
        missing_as(self.flag(KEY_CHARGING), false)
    }

    /// `false` on machines without a battery.
    pub fn is_battery_ok(&self) -> Result<bool> {
        let ok = self.bits(KEY_BATTERY_INFO).map(|b| b & BATTERY_OK_BIT != 0);
        missing_as(ok, false)
    }

    pub fn is_ac_present(&self) -> Result<bool> {
        // AC-W is a flag on some models and an si8 that is -1 without AC on others.
        match self.numeric(KEY_AC_PRESENT) {
            Ok(v) => Ok(v > 0.0),
            // A machine with no battery can only be running on AC.
            Err(SmcError::KeyNotFound { .. }) => Ok(self.battery_count()? == 0),
            Err(e) => Err(e),
        }
    }

    pub fn power(&self) -> Result<PowerStatus> {
        Ok(PowerStatus {
            battery_powered: self.is_battery_powered()?,
            ac_present: self.is_ac_present()?,
            charging: self.is_charging()?,
            battery_ok: self.is_battery_ok()?,
            battery_count: self.battery_count()?,
        })
    }

    /// `true` if there is a disc in the internal optical drive.
    pub fn is_optical_drive_full(&self) -> Result<bool> {
        missing_as(self.flag(KEY_DISC_IN_DRIVE), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ByteOrder, SmcConfig},
        memory::MemoryChannel,
    };

    fn connect(channel: MemoryChannel) -> Smc<MemoryChannel> {
        let config = SmcConfig::default().with_byte_order(ByteOrder::Little);
        Smc::connect(channel, config).expect("open")
    }

    fn laptop() -> MemoryChannel {
        MemoryChannel::new()
            .with_key("FNum", b"ui8 ", &[1])
            .with_key("F0Ac", b"fpe2", &[31, 64])
            .with_key("F0Mn", b"fpe2", &[18, 192])
            .with_key("F0Mx", b"fpe2", &[96, 220])
            .with_key("TC0P", b"sp78", &[0x33, 0x40])
            .with_key("TB0T", b"flt ", &31.5f32.to_le_bytes())
            .with_key("BATP", b"flag", &[0])
            .with_key("BNum", b"ui8 ", &[1])
            .with_key("CHBI", b"ui32", &[0, 0, 0, 0])
            .with_key("AC-W", b"si8 ", &[1])
            .with_key("BSIn", b"ui8 ", &[0x41])
    }

    #[test]
    fn reads_temperatures_from_fixed_and_float_keys() {
        let smc = connect(laptop());
        let sensors = smc.sensors();
        assert_eq!(sensors.temperature("TC0P").expect("sp78"), 51.25);
        assert_eq!(sensors.temperature("TB0T").expect("flt"), 31.5);

        let all = sensors.all_temperatures().expect("all");
        let keys: Vec<_> = all.iter().map(|r| r.sensor.key).collect();
        assert_eq!(keys, ["TB0T", "TC0P"]);
    }

    #[test]
    fn reports_fans() {
        let smc = connect(laptop());
        let fans = smc.sensors().fans().expect("fans");
        assert_eq!(
            fans,
            [FanReading {
                index: 0,
                current_rpm: 2000,
                min_rpm: 1200,
                max_rpm: 6199,
            }]
        );
    }

    #[test]
    fn fanless_machines_report_no_fans() {
        let smc = connect(MemoryChannel::new().with_key("FNum", b"ui8 ", &[0]));
        assert_eq!(smc.sensors().fan_count().expect("count"), 0);
        assert!(smc.sensors().fans().expect("fans").is_empty());

        let smc = connect(MemoryChannel::new());
        assert_eq!(smc.sensors().fan_count().expect("count"), 0);
    }

    #[test]
    fn sets_fan_floor() {
        let channel = laptop();
        let smc = connect(channel.clone());
        smc.sensors().set_fan_min_speed(0, 3645).expect("write");
        assert_eq!(channel.value("F0Mn"), Some(vec![56, 244]));
        assert_eq!(smc.sensors().fan_min_speed(0).expect("read"), 3645);
    }

    #[test]
    fn power_snapshot() {
        let smc = connect(laptop());
        assert_eq!(
            smc.sensors().power().expect("power"),
            PowerStatus {
                battery_powered: false,
                ac_present: true,
                charging: false,
                battery_ok: true,
                battery_count: 1,
            }
        );
    }

    #[test]
    fn desktops_have_no_battery_and_no_disc() {
        let smc = connect(MemoryChannel::new());
        let sensors = smc.sensors();
        assert_eq!(sensors.battery_count().expect("count"), 0);
        assert!(!sensors.is_battery_powered().expect("flag"));
        assert!(!sensors.is_battery_ok().expect("flag"));
        assert!(sensors.is_ac_present().expect("flag"));
        assert!(!sensors.is_optical_drive_full().expect("flag"));
        assert_eq!(
            sensors.power().expect("power"),
            PowerStatus {
                battery_powered: false,
                ac_present: true,
                charging: false,
                battery_ok: false,
                battery_count: 0,
            }
        );
    }

    #[test]
    fn laptop_without_ac_key_is_not_assumed_plugged_in() {
        let smc = connect(MemoryChannel::new().with_key("BNum", b"ui8 ", &[1]));
        assert!(!smc.sensors().is_ac_present().expect("flag"));
    }

    #[test]
    fn battery_ok_reads_its_status_bit() {
        let smc = connect(MemoryChannel::new().with_key("BSIn", b"ui8 ", &[0x03]));
        assert!(!smc.sensors().is_battery_ok().expect("flag"));
    }

    #[test]
    fn specific_sensor_must_exist() {
        let smc = connect(MemoryChannel::new());
        assert!(matches!(
            smc.sensors().fan_speed(3),
            Err(SmcError::KeyNotFound { .. })
        ));
    }
}
